// src/config/registry.rs
//! Group registry: per-group destinations plus the process-wide polling
//! configuration, persisted together in one JSON document:
//!
//! ```json
//! { "global": { "scrape_interval_hours": 6.0, "scrape_start_timestamp": 1760000000 },
//!   "<group id>": { "summer_destination": "https://...", "offseason_destination": null } }
//! ```
//!
//! Every accessor re-reads the file, so a pipeline run always sees the latest
//! committed values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{ConfigError, PersistError};
use crate::ingest::types::Category;
use crate::persist;

pub const MIN_INTERVAL_HOURS: f64 = 0.5;
pub const MAX_INTERVAL_HOURS: f64 = 168.0;
pub const MIN_WINDOW_DAYS: u32 = 1;
pub const MAX_WINDOW_DAYS: u32 = 365;

const GLOBAL_KEY: &str = "global";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    pub scrape_interval_hours: f64,
    /// Absolute cutoff (unix seconds). Listings posted at or before it are ignored.
    pub scrape_start_timestamp: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(default)]
    pub summer_destination: Option<String>,
    #[serde(default)]
    pub offseason_destination: Option<String>,
}

impl GroupConfig {
    pub fn destination(&self, category: Category) -> Option<&str> {
        match category {
            Category::Summer => self.summer_destination.as_deref(),
            Category::Offseason => self.offseason_destination.as_deref(),
        }
    }

    fn slot(&mut self, category: Category) -> &mut Option<String> {
        match category {
            Category::Summer => &mut self.summer_destination,
            Category::Offseason => &mut self.offseason_destination,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawDocument {
    #[serde(default)]
    global: Option<GlobalConfig>,
    #[serde(flatten)]
    groups: BTreeMap<String, GroupConfig>,
}

/// One consistent read of the whole registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySnapshot {
    pub global: GlobalConfig,
    pub groups: BTreeMap<String, GroupConfig>,
}

impl RegistrySnapshot {
    /// Every group's destination for `category`; unsubscribed groups are skipped.
    pub fn destinations(&self, category: Category) -> Vec<String> {
        self.groups
            .values()
            .filter_map(|g| g.destination(category).map(str::to_string))
            .collect()
    }

    pub fn has_any_destination(&self) -> bool {
        Category::ALL
            .iter()
            .any(|c| !self.destinations(*c).is_empty())
    }

    fn into_raw(self) -> RawDocument {
        RawDocument {
            global: Some(self.global),
            groups: self.groups,
        }
    }
}

/// What `viewConfig` hands back to the command surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigView {
    pub group_id: String,
    pub group: GroupConfig,
    pub global: GlobalConfig,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryDefaults {
    pub interval_hours: f64,
    pub start_window_days: u32,
}

impl Default for RegistryDefaults {
    fn default() -> Self {
        Self {
            interval_hours: 6.0,
            start_window_days: 1,
        }
    }
}

#[derive(Debug)]
pub struct ConfigRegistry {
    path: PathBuf,
    defaults: RegistryDefaults,
    write_lock: Mutex<()>,
}

impl ConfigRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_defaults(path, RegistryDefaults::default())
    }

    pub fn with_defaults(path: impl Into<PathBuf>, defaults: RegistryDefaults) -> Self {
        Self {
            path: path.into(),
            defaults,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn default_global(&self) -> GlobalConfig {
        let interval = if (MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS)
            .contains(&self.defaults.interval_hours)
        {
            self.defaults.interval_hours
        } else {
            tracing::warn!(
                target: "config",
                hours = self.defaults.interval_hours,
                "default interval out of range, clamping"
            );
            self.defaults
                .interval_hours
                .clamp(MIN_INTERVAL_HOURS, MAX_INTERVAL_HOURS)
        };
        let days = self.defaults.start_window_days.clamp(MIN_WINDOW_DAYS, MAX_WINDOW_DAYS);
        GlobalConfig {
            scrape_interval_hours: interval,
            scrape_start_timestamp: start_timestamp_for(days, Utc::now()),
        }
    }

    /// Read the document, seeding and persisting the `global` entry (and the
    /// file itself) when absent. Callers mutating state must hold `write_lock`.
    async fn read(&self) -> Result<RegistrySnapshot, PersistError> {
        let raw = persist::read_json::<RawDocument>(&self.path).await?;
        let needs_write = raw.as_ref().map_or(true, |r| r.global.is_none());
        let raw = raw.unwrap_or(RawDocument {
            global: None,
            groups: BTreeMap::new(),
        });

        let snapshot = RegistrySnapshot {
            global: raw.global.unwrap_or_else(|| self.default_global()),
            groups: raw.groups,
        };
        if needs_write {
            persist::write_json_atomic(&self.path, &snapshot.clone().into_raw()).await?;
            tracing::info!(target: "config", path = %self.path.display(), "seeded configuration defaults");
        }
        Ok(snapshot)
    }

    /// Atomic read-modify-write.
    async fn update<R, F>(&self, f: F) -> Result<R, ConfigError>
    where
        F: FnOnce(&mut RegistrySnapshot) -> Result<R, ConfigError>,
    {
        let _guard = self.write_lock.lock().await;
        let mut snapshot = self.read().await?;
        let out = f(&mut snapshot)?;
        persist::write_json_atomic(&self.path, &snapshot.into_raw()).await?;
        Ok(out)
    }

    pub async fn snapshot(&self) -> Result<RegistrySnapshot, PersistError> {
        let _guard = self.write_lock.lock().await;
        self.read().await
    }

    pub async fn global(&self) -> Result<GlobalConfig, PersistError> {
        Ok(self.snapshot().await?.global)
    }

    /// Config for `group_id`, creating an empty entry if absent. Never fails:
    /// storage problems are logged and an empty config is returned.
    /// Invalid ids (blank, or the reserved `global` key) get an empty config
    /// and nothing is written.
    pub async fn group_config(&self, group_id: &str) -> GroupConfig {
        if let Err(e) = validate_group_id(group_id) {
            tracing::warn!(target: "config", group = group_id, error = %e, "rejected group id");
            return GroupConfig::default();
        }
        let res = self
            .update(|s| {
                Ok(s.groups
                    .entry(group_id.to_string())
                    .or_default()
                    .clone())
            })
            .await;
        match res {
            Ok(g) => g,
            Err(e) => {
                tracing::error!(target: "config", group = group_id, error = %e, "reading group config failed");
                GroupConfig::default()
            }
        }
    }

    /// Destinations across all groups for `category`. Order is not significant.
    pub async fn all_destinations(&self, category: Category) -> Result<Vec<String>, PersistError> {
        Ok(self.snapshot().await?.destinations(category))
    }

    pub async fn set_destination(
        &self,
        group_id: &str,
        category: Category,
        handle: &str,
    ) -> Result<GroupConfig, ConfigError> {
        validate_group_id(group_id)?;
        let handle = validate_destination(handle)?;
        let out = self
            .update(|s| {
                let g = s.groups.entry(group_id.to_string()).or_default();
                *g.slot(category) = Some(handle.clone());
                Ok(g.clone())
            })
            .await?;
        tracing::info!(target: "config", group = group_id, %category, destination = %handle, "destination set");
        Ok(out)
    }

    pub async fn clear_destination(
        &self,
        group_id: &str,
        category: Category,
    ) -> Result<GroupConfig, ConfigError> {
        validate_group_id(group_id)?;
        self.update(|s| {
            let g = s.groups.entry(group_id.to_string()).or_default();
            *g.slot(category) = None;
            Ok(g.clone())
        })
        .await
    }

    pub async fn set_interval(&self, hours: f64) -> Result<(), ConfigError> {
        validate_interval(hours)?;
        self.update(|s| {
            s.global.scrape_interval_hours = hours;
            Ok(())
        })
        .await?;
        tracing::info!(target: "config", hours, "scrape interval updated");
        Ok(())
    }

    /// Store `now - days_back` as an absolute cutoff and return it. The cutoff
    /// does not advance by itself afterwards.
    pub async fn set_start_window(&self, days_back: u32) -> Result<i64, ConfigError> {
        validate_window(days_back)?;
        let ts = start_timestamp_for(days_back, Utc::now());
        self.update(|s| {
            s.global.scrape_start_timestamp = ts;
            Ok(())
        })
        .await?;
        tracing::info!(target: "config", days_back, start_timestamp = ts, "start window updated");
        Ok(ts)
    }

    pub async fn set_start_timestamp(&self, timestamp: i64) -> Result<(), ConfigError> {
        if timestamp <= 0 {
            return Err(ConfigError::Validation(format!(
                "start timestamp must be positive, got {timestamp}"
            )));
        }
        self.update(|s| {
            s.global.scrape_start_timestamp = timestamp;
            Ok(())
        })
        .await
    }

    pub async fn view(&self, group_id: &str) -> Result<ConfigView, PersistError> {
        let snapshot = self.snapshot().await?;
        Ok(ConfigView {
            group_id: group_id.to_string(),
            group: snapshot.groups.get(group_id).cloned().unwrap_or_default(),
            global: snapshot.global,
        })
    }
}

pub fn start_timestamp_for(days_back: u32, now: DateTime<Utc>) -> i64 {
    (now - ChronoDuration::days(i64::from(days_back))).timestamp()
}

pub fn validate_interval(hours: f64) -> Result<(), ConfigError> {
    if hours.is_finite() && (MIN_INTERVAL_HOURS..=MAX_INTERVAL_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "interval must be within {MIN_INTERVAL_HOURS}-{MAX_INTERVAL_HOURS} hours, got {hours}"
        )))
    }
}

pub fn validate_window(days_back: u32) -> Result<(), ConfigError> {
    if (MIN_WINDOW_DAYS..=MAX_WINDOW_DAYS).contains(&days_back) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "days_back must be within {MIN_WINDOW_DAYS}-{MAX_WINDOW_DAYS}, got {days_back}"
        )))
    }
}

fn validate_group_id(group_id: &str) -> Result<(), ConfigError> {
    let g = group_id.trim();
    if g.is_empty() || g == GLOBAL_KEY {
        return Err(ConfigError::Validation(format!("invalid group id '{group_id}'")));
    }
    Ok(())
}

/// Destination handles are webhook URLs.
pub fn validate_destination(handle: &str) -> Result<String, ConfigError> {
    let trimmed = handle.trim();
    let url = reqwest::Url::parse(trimmed)
        .map_err(|e| ConfigError::Validation(format!("destination is not a URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ConfigError::Validation(format!(
            "destination must be an http(s) URL, got '{trimmed}'"
        )));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_timestamp_is_absolute_days_back() {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 12, 0, 0).unwrap();
        let ts = start_timestamp_for(7, now);
        assert_eq!(ts, Utc.with_ymd_and_hms(2026, 1, 3, 12, 0, 0).unwrap().timestamp());
    }

    #[test]
    fn interval_bounds_are_inclusive() {
        assert!(validate_interval(0.5).is_ok());
        assert!(validate_interval(168.0).is_ok());
        assert!(validate_interval(0.49).is_err());
        assert!(validate_interval(168.5).is_err());
        assert!(validate_interval(f64::NAN).is_err());
    }

    #[test]
    fn window_bounds_are_inclusive() {
        assert!(validate_window(1).is_ok());
        assert!(validate_window(365).is_ok());
        assert!(validate_window(0).is_err());
        assert!(validate_window(366).is_err());
    }

    #[test]
    fn destination_must_be_http_url() {
        assert!(validate_destination(" https://discord.com/api/webhooks/1/abc ").is_ok());
        assert!(validate_destination("123456789").is_err());
        assert!(validate_destination("ftp://example.com/x").is_err());
    }

    #[test]
    fn snapshot_document_round_trips_with_global_key() {
        let raw = r#"{
            "global": {"scrape_interval_hours": 3.5, "scrape_start_timestamp": 100},
            "g1": {"summer_destination": "https://a.test/hook"},
            "g2": {"offseason_destination": "https://b.test/hook"}
        }"#;
        let doc: RawDocument = serde_json::from_str(raw).unwrap();
        assert_eq!(doc.global.as_ref().unwrap().scrape_interval_hours, 3.5);
        assert_eq!(doc.groups.len(), 2);
        assert!(!doc.groups.contains_key("global"));
    }
}
