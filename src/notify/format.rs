// src/notify/format.rs
use chrono::DateTime;

use super::{ListingMessage, MessageField};
use crate::ingest::types::{Category, Listing};

const SUMMER_COLOR: u32 = 0xF1C40F; // gold
const OFFSEASON_COLOR: u32 = 0x3498DB; // blue

pub fn location_str(listing: &Listing) -> String {
    if listing.locations.is_empty() {
        "Location not specified".to_string()
    } else {
        listing.locations.join(", ")
    }
}

/// e.g. "November 19, 2024" (UTC).
pub fn posted_date_str(listing: &Listing) -> String {
    DateTime::from_timestamp(listing.date_posted, 0)
        .map(|dt| dt.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Render a listing for the channel of `category`.
pub fn listing_message(listing: &Listing, category: Category) -> ListingMessage {
    let (color, marker) = match category {
        Category::Summer => (SUMMER_COLOR, "\u{2600}\u{FE0F}"),
        Category::Offseason => (OFFSEASON_COLOR, "\u{2744}\u{FE0F}"),
    };

    let mut fields = vec![
        MessageField {
            name: "Location".into(),
            value: location_str(listing),
        },
        MessageField {
            name: "Posted".into(),
            value: posted_date_str(listing),
        },
    ];
    if let Some(s) = listing.sponsorship.as_deref().filter(|s| !s.trim().is_empty()) {
        fields.push(MessageField {
            name: "Sponsorship".into(),
            value: s.to_string(),
        });
    }

    ListingMessage {
        title: format!("{} - {}", listing.company_name, listing.title),
        url: listing.url.clone(),
        description: format!("{marker} {}", listing.terms.join(", ")),
        color,
        fields,
        footer: format!("ID: {}", listing.id),
    }
}
