// src/ingest/types.rs
use serde::{Deserialize, Serialize};

use crate::ingest::classify;

/// One posting as published by the upstream feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub company_name: String,
    pub url: String,
    #[serde(default)]
    pub terms: Vec<String>, // e.g. "Summer 2026"
    #[serde(default)]
    pub locations: Vec<String>,
    pub date_posted: i64, // unix seconds
    pub active: bool,
    pub is_visible: bool,
    #[serde(default)]
    pub sponsorship: Option<String>,
}

impl Listing {
    pub fn is_summer(&self) -> bool {
        classify::is_summer(&self.terms)
    }

    pub fn is_offseason(&self) -> bool {
        classify::is_offseason(&self.terms)
    }

    pub fn in_category(&self, category: Category) -> bool {
        match category {
            Category::Summer => self.is_summer(),
            Category::Offseason => self.is_offseason(),
        }
    }

    /// Active and visible upstream.
    pub fn is_postable(&self) -> bool {
        self.active && self.is_visible
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Summer,
    Offseason,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Summer, Category::Offseason];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Summer => "summer",
            Category::Offseason => "offseason",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "summer" => Ok(Category::Summer),
            "offseason" | "off-season" => Ok(Category::Offseason),
            other => Err(format!("unknown category '{other}'")),
        }
    }
}

/// Listings split by category, each list newest-first. A listing whose terms
/// match both categories sits in both lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ListingBatch {
    pub summer: Vec<Listing>,
    pub offseason: Vec<Listing>,
}

impl ListingBatch {
    pub fn from_listings(listings: impl IntoIterator<Item = Listing>) -> Self {
        let mut batch = Self::default();
        for l in listings {
            if l.is_summer() {
                batch.summer.push(l.clone());
            }
            if l.is_offseason() {
                batch.offseason.push(l);
            }
        }
        batch
    }

    pub fn get(&self, category: Category) -> &[Listing] {
        match category {
            Category::Summer => &self.summer,
            Category::Offseason => &self.offseason,
        }
    }

    pub fn get_mut(&mut self, category: Category) -> &mut Vec<Listing> {
        match category {
            Category::Summer => &mut self.summer,
            Category::Offseason => &mut self.offseason,
        }
    }

    pub fn ids(&self, category: Category) -> Vec<String> {
        self.get(category).iter().map(|l| l.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.summer.len() + self.offseason.len()
    }

    pub fn is_empty(&self) -> bool {
        self.summer.is_empty() && self.offseason.is_empty()
    }
}
