// src/ingest/mod.rs
pub mod classify;
pub mod dedup;
pub mod scheduler;
pub mod source;
pub mod types;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::ConfigRegistry;
use crate::error::{PersistError, PipelineError};
use crate::ingest::dedup::{DedupState, DedupStore};
use crate::ingest::scheduler::ScheduledJob;
use crate::ingest::source::ListingSource;
use crate::ingest::types::{Category, ListingBatch};
use crate::notify::{DeliveryStats, FanOut};

/// One-time metrics registration (so series show up on /metrics).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Pipeline runs that reached the fetch step.");
        describe_counter!(
            "pipeline_runs_skipped_total",
            "Ticks skipped (no destinations, or a run already in progress)."
        );
        describe_counter!("pipeline_fetch_errors_total", "Feed fetch/parse failures.");
        describe_counter!(
            "pipeline_persist_errors_total",
            "Failed attempts to persist dedup state."
        );
        describe_counter!("listings_fetched_total", "Listings retained from the feed.");
        describe_counter!("listings_new_total", "Listings not seen before, per category.");
        describe_counter!("delivery_sent_total", "Successful sends, per category.");
        describe_counter!("delivery_failed_total", "Failed sends, per category.");
        describe_histogram!("feed_fetch_ms", "Feed fetch + parse time in milliseconds.");
        describe_gauge!("pipeline_last_run_ts", "Unix ts when a pipeline run last completed.");
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunTrigger {
    Scheduled,
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    SkippedNoDestinations,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub trigger: RunTrigger,
    pub status: RunStatus,
    pub fetched: usize,
    pub new_summer: usize,
    pub new_offseason: usize,
    pub summer: DeliveryStats,
    pub offseason: DeliveryStats,
}

impl RunReport {
    fn empty(trigger: RunTrigger, status: RunStatus) -> Self {
        Self {
            trigger,
            status,
            fetched: 0,
            new_summer: 0,
            new_offseason: 0,
            summer: DeliveryStats::default(),
            offseason: DeliveryStats::default(),
        }
    }

    pub fn delivery_errors(&self) -> usize {
        self.summer.failed + self.offseason.failed
    }
}

/// Retry schedule for the end-of-run dedup write.
#[derive(Debug, Clone, Copy)]
pub struct PersistRetry {
    pub attempts: u32,
    pub base_delay: Duration,
}

impl Default for PersistRetry {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

/// `base * 2^(attempt-1)`, saturating instead of overflowing.
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
}

/// fetch -> classify -> dedup-filter -> deliver -> persist.
pub struct Pipeline {
    source: Arc<dyn ListingSource>,
    registry: Arc<ConfigRegistry>,
    dedup: Arc<DedupStore>,
    fanout: FanOut,
    persist_retry: PersistRetry,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn ListingSource>,
        registry: Arc<ConfigRegistry>,
        dedup: Arc<DedupStore>,
        fanout: FanOut,
    ) -> Self {
        Self {
            source,
            registry,
            dedup,
            fanout,
            persist_retry: PersistRetry::default(),
        }
    }

    pub fn with_persist_retry(mut self, retry: PersistRetry) -> Self {
        self.persist_retry = retry;
        self
    }

    pub fn registry(&self) -> &Arc<ConfigRegistry> {
        &self.registry
    }

    pub fn dedup(&self) -> &Arc<DedupStore> {
        &self.dedup
    }

    /// One complete cycle. Config and dedup state are re-read from disk at the
    /// start; dedup state is written once, after every delivery was attempted.
    pub async fn run_once(&self, trigger: RunTrigger) -> Result<RunReport, PipelineError> {
        ensure_metrics_described();

        let snapshot = self.registry.snapshot().await?;
        if trigger == RunTrigger::Scheduled && !snapshot.has_any_destination() {
            tracing::info!(target: "ingest", "no destinations configured, skipping scheduled run");
            counter!("pipeline_runs_skipped_total", "reason" => "no_destinations").increment(1);
            return Ok(RunReport::empty(trigger, RunStatus::SkippedNoDestinations));
        }

        let seen = self.dedup.load().await?;
        let start = snapshot.global.scrape_start_timestamp;
        tracing::info!(
            target: "ingest",
            ?trigger,
            source = self.source.name(),
            start_timestamp = start,
            posted_after = %chrono::DateTime::from_timestamp(start, 0)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            "starting run"
        );
        counter!("pipeline_runs_total").increment(1);

        let (new, all) = match self.source.get_new_listings(&seen, Some(start)).await {
            Ok(v) => v,
            Err(e) => {
                counter!("pipeline_fetch_errors_total").increment(1);
                return Err(e.into());
            }
        };

        let mut report = RunReport::empty(trigger, RunStatus::Completed);
        report.fetched = all
            .summer
            .iter()
            .chain(&all.offseason)
            .map(|l| l.id.as_str())
            .collect::<BTreeSet<_>>()
            .len();
        report.new_summer = new.summer.len();
        report.new_offseason = new.offseason.len();
        tracing::info!(
            target: "ingest",
            new_summer = report.new_summer,
            new_offseason = report.new_offseason,
            "new listings found"
        );

        for category in Category::ALL {
            let listings = new.get(category);
            counter!("listings_new_total", "category" => category.as_str())
                .increment(listings.len() as u64);
            let destinations = snapshot.destinations(category);
            let stats = self.fanout.deliver(category, listings, &destinations).await;
            match category {
                Category::Summer => report.summer = stats,
                Category::Offseason => report.offseason = stats,
            }
        }

        // Everything fetched is marked seen, delivered or not. Only this run's
        // ids are merged so a reset made mid-run is not overwritten.
        let mut fetched = DedupState::default();
        for category in Category::ALL {
            fetched.add_all(category, all.ids(category));
        }
        self.persist_seen(&fetched).await?;

        gauge!("pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);
        tracing::info!(
            target: "ingest",
            summer_sent = report.summer.sent,
            offseason_sent = report.offseason.sent,
            errors = report.delivery_errors(),
            "run completed"
        );
        Ok(report)
    }

    async fn persist_seen(&self, fetched: &DedupState) -> Result<(), PersistError> {
        let attempts = self.persist_retry.attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.dedup.merge(fetched).await {
                Ok(_) => return Ok(()),
                Err(e) => {
                    counter!("pipeline_persist_errors_total").increment(1);
                    tracing::error!(
                        target: "ingest",
                        attempt,
                        attempts,
                        path = %self.dedup.path().display(),
                        error = %e,
                        "persisting dedup state failed"
                    );
                    if attempt >= attempts {
                        return Err(e);
                    }
                    tokio::time::sleep(retry_delay(self.persist_retry.base_delay, attempt)).await;
                }
            }
        }
    }

    /// Newest `limit` listings per category under the current start timestamp.
    /// Nothing is delivered and dedup state is not touched.
    pub async fn preview(&self, limit: usize) -> Result<ListingBatch, PipelineError> {
        let global = self.registry.global().await?;
        let listings = self.source.fetch(Some(global.scrape_start_timestamp)).await?;
        let mut batch = ListingBatch::from_listings(listings);
        for category in Category::ALL {
            batch.get_mut(category).truncate(limit);
        }
        Ok(batch)
    }
}

#[async_trait]
impl ScheduledJob for Pipeline {
    async fn run(&self, trigger: RunTrigger) -> Result<RunReport, PipelineError> {
        self.run_once(trigger).await
    }
}
