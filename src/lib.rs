// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod persist;

// ---- Re-exports for stable public API ----
pub use crate::api::{router, AppState};
pub use crate::config::{ConfigRegistry, Settings};
pub use crate::error::{ConfigError, FetchError, PersistError, PipelineError, SchedulerError};
pub use crate::ingest::dedup::DedupStore;
pub use crate::ingest::scheduler::{ReadyGate, Scheduler, TriggerOutcome};
pub use crate::ingest::source::{GithubListingsClient, ListingSource};
pub use crate::ingest::types::{Category, Listing, ListingBatch};
pub use crate::ingest::{Pipeline, RunReport, RunStatus, RunTrigger};
pub use crate::notify::{FanOut, Transport, TransportMux};
