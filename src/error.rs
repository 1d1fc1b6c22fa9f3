// src/error.rs
//! Error taxonomy for one pipeline run and the command boundary.

use std::path::PathBuf;

use thiserror::Error;

/// Upstream feed could not be fetched or decoded. The run is aborted before
/// delivery and dedup state is left untouched.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feed rate limited (http 429) for {url}")]
    RateLimited { url: String },

    #[error("feed returned http {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("feed body is not a JSON array: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Config or dedup state could not be read or written.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("i/o on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt state file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serializing state: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl PersistError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors raised by reconfiguration commands.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Out-of-range or malformed input. Core state is unchanged.
    #[error("invalid configuration: {0}")]
    Validation(String),

    #[error(transparent)]
    Persistence(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetch failed: {0}")]
    FetchFailed(#[from] FetchError),

    #[error("persistence failed: {0}")]
    PersistenceFailed(#[from] PersistError),
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("interval must be a positive number of hours, got {0}")]
    InvalidInterval(f64),

    #[error("scheduler is already running every {0}h")]
    AlreadyRunning(f64),
}
