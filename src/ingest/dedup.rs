// src/ingest/dedup.rs
//! Persisted set of listing ids already considered, one set per category.
//! Grows monotonically; only an explicit `reset` shrinks it.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::PersistError;
use crate::ingest::types::Category;
use crate::persist;

/// On-disk shape: `{"summer": [...], "offseason": [...]}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupState {
    #[serde(default)]
    pub summer: BTreeSet<String>,
    #[serde(default)]
    pub offseason: BTreeSet<String>,
}

impl DedupState {
    pub fn ids(&self, category: Category) -> &BTreeSet<String> {
        match category {
            Category::Summer => &self.summer,
            Category::Offseason => &self.offseason,
        }
    }

    fn ids_mut(&mut self, category: Category) -> &mut BTreeSet<String> {
        match category {
            Category::Summer => &mut self.summer,
            Category::Offseason => &mut self.offseason,
        }
    }

    pub fn contains(&self, category: Category, id: &str) -> bool {
        self.ids(category).contains(id)
    }

    /// Returns how many ids were not already present.
    pub fn add_all<I, S>(&mut self, category: Category, ids: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = self.ids_mut(category);
        let mut added = 0;
        for id in ids {
            if set.insert(id.into()) {
                added += 1;
            }
        }
        added
    }

    pub fn clear(&mut self, category: Category) {
        self.ids_mut(category).clear();
    }
}

#[derive(Debug)]
pub struct DedupStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl DedupStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current persisted state. A missing file is created empty.
    pub async fn load(&self) -> Result<DedupState, PersistError> {
        match persist::read_json::<DedupState>(&self.path).await? {
            Some(state) => Ok(state),
            None => {
                let state = DedupState::default();
                persist::write_json_atomic(&self.path, &state).await?;
                Ok(state)
            }
        }
    }

    pub async fn contains(&self, category: Category, id: &str) -> Result<bool, PersistError> {
        Ok(self.load().await?.contains(category, id))
    }

    pub async fn add_all<I, S>(&self, category: Category, ids: I) -> Result<usize, PersistError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        let added = state.add_all(category, ids);
        persist::write_json_atomic(&self.path, &state).await?;
        Ok(added)
    }

    /// Union `additions` into whatever is on disk now. Returns how many ids
    /// were new. A reset that lands while a run is in flight stays in effect
    /// for everything that run did not itself fetch.
    pub async fn merge(&self, additions: &DedupState) -> Result<usize, PersistError> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        let mut added = 0;
        for category in Category::ALL {
            added += state.add_all(category, additions.ids(category).iter().cloned());
        }
        persist::write_json_atomic(&self.path, &state).await?;
        Ok(added)
    }

    /// Operator reset. `None` clears both categories.
    pub async fn reset(&self, category: Option<Category>) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;
        let mut state = self.load().await?;
        match category {
            Some(c) => state.clear(c),
            None => state = DedupState::default(),
        }
        tracing::warn!(target: "ingest", category = ?category, "dedup state reset");
        persist::write_json_atomic(&self.path, &state).await
    }
}
