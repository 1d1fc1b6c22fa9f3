// src/config/settings.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ingest::source::DEFAULT_FEED_URL;

const ENV_SETTINGS_PATH: &str = "SEEKER_SETTINGS_PATH";
const DEFAULT_SETTINGS_PATH: &str = "config/seeker.toml";

/// Process-wide settings. Precedence: defaults < TOML file < environment.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub feed_url: String,
    pub github_token: Option<String>,
    /// Seeds the persisted interval the first time the config file is created.
    pub scrape_interval_hours: f64,
    /// Seeds the persisted start timestamp the first time the config file is created.
    pub default_start_window_days: u32,
    pub config_file: PathBuf,
    pub last_scrape_file: PathBuf,
    pub fetch_timeout_secs: u64,
    pub delivery_min_spacing_ms: u64,
    pub scrape_on_start: bool,
    pub admin_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            github_token: None,
            scrape_interval_hours: 6.0,
            default_start_window_days: 1,
            config_file: PathBuf::from("config.json"),
            last_scrape_file: PathBuf::from("last_scrape.json"),
            fetch_timeout_secs: 30,
            delivery_min_spacing_ms: 1_000,
            scrape_on_start: false,
            admin_token: None,
        }
    }
}

impl Settings {
    /// Resolve the settings file:
    /// 1) $SEEKER_SETTINGS_PATH (must exist)
    /// 2) config/seeker.toml if present
    /// 3) built-in defaults
    ///
    /// then overlay environment variables.
    pub fn load() -> Result<Self> {
        let mut settings = if let Ok(p) = std::env::var(ENV_SETTINGS_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_SETTINGS_PATH} points to non-existent path"));
            }
            Self::from_path(&pb)?
        } else if Path::new(DEFAULT_SETTINGS_PATH).exists() {
            Self::from_path(Path::new(DEFAULT_SETTINGS_PATH))?
        } else {
            Self::default()
        };
        settings.apply_env(|k| std::env::var(k).ok())?;
        Ok(settings)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn apply_env<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let val = |k: &str| get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = val("GITHUB_REPO_URL") {
            self.feed_url = v;
        }
        if let Some(v) = val("GITHUB_TOKEN") {
            self.github_token = Some(v);
        }
        if let Some(v) = val("SCRAPE_INTERVAL_HOURS") {
            self.scrape_interval_hours = v
                .parse()
                .with_context(|| format!("SCRAPE_INTERVAL_HOURS={v}"))?;
        }
        if let Some(v) = val("DEFAULT_START_WINDOW_DAYS") {
            self.default_start_window_days = v
                .parse()
                .with_context(|| format!("DEFAULT_START_WINDOW_DAYS={v}"))?;
        }
        if let Some(v) = val("CONFIG_FILE") {
            self.config_file = PathBuf::from(v);
        }
        if let Some(v) = val("LAST_SCRAPE_FILE") {
            self.last_scrape_file = PathBuf::from(v);
        }
        if let Some(v) = val("FETCH_TIMEOUT_SECS") {
            self.fetch_timeout_secs = v.parse().with_context(|| format!("FETCH_TIMEOUT_SECS={v}"))?;
        }
        if let Some(v) = val("DELIVERY_MIN_SPACING_MS") {
            self.delivery_min_spacing_ms = v
                .parse()
                .with_context(|| format!("DELIVERY_MIN_SPACING_MS={v}"))?;
        }
        if let Some(v) = val("SCRAPE_ON_START") {
            self.scrape_on_start = matches!(v.as_str(), "1" | "true" | "TRUE" | "True");
        }
        if let Some(v) = val("ADMIN_TOKEN") {
            self.admin_token = Some(v);
        }
        Ok(())
    }
}
