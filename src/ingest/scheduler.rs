// src/ingest/scheduler.rs
//! Periodic trigger for pipeline runs.
//!
//! States: Stopped, Running(interval). A reschedule cancels the pending timer
//! and starts a fresh period from the moment of the call. At most one run is
//! in progress at any time; ticks and manual triggers that find a run in
//! flight are skipped, never queued.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use tokio::sync::{watch, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::error::{PipelineError, SchedulerError};
use crate::ingest::{RunReport, RunTrigger};

/// Work executed on each tick.
#[async_trait]
pub trait ScheduledJob: Send + Sync + 'static {
    async fn run(&self, trigger: RunTrigger) -> Result<RunReport, PipelineError>;
}

/// Closed until the host reports it is ready to deliver. No run, scheduled
/// or manual, starts before the gate opens.
#[derive(Clone, Debug)]
pub struct ReadyGate {
    tx: Arc<watch::Sender<bool>>,
}

impl ReadyGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn opened() -> Self {
        let gate = Self::new();
        gate.open();
        gate
    }

    pub fn open(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_open(&self) -> bool {
        *self.tx.borrow()
    }

    pub async fn wait(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as `self`, so this only returns once open.
        let _ = rx.wait_for(|ready| *ready).await;
    }
}

impl Default for ReadyGate {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum SchedulerStatus {
    Stopped,
    Running { interval_hours: f64 },
}

#[derive(Debug)]
pub enum TriggerOutcome {
    Completed(Result<RunReport, PipelineError>),
    /// Another run was in progress; nothing was started.
    Busy,
}

enum State {
    Stopped,
    Running {
        interval_hours: f64,
        timer: JoinHandle<()>,
    },
}

pub struct Scheduler {
    job: Arc<dyn ScheduledJob>,
    run_lock: Arc<AsyncMutex<()>>,
    ready: ReadyGate,
    run_on_start: bool,
    state: Mutex<State>,
}

impl Scheduler {
    pub fn new(job: Arc<dyn ScheduledJob>, ready: ReadyGate) -> Self {
        Self {
            job,
            run_lock: Arc::new(AsyncMutex::new(())),
            ready,
            run_on_start: false,
            state: Mutex::new(State::Stopped),
        }
    }

    /// Run once as soon as the ready gate opens, before the first full period.
    pub fn with_run_on_start(mut self, yes: bool) -> Self {
        self.run_on_start = yes;
        self
    }

    pub fn ready_gate(&self) -> &ReadyGate {
        &self.ready
    }

    pub fn status(&self) -> SchedulerStatus {
        match &*self.lock_state() {
            State::Stopped => SchedulerStatus::Stopped,
            State::Running { interval_hours, .. } => SchedulerStatus::Running {
                interval_hours: *interval_hours,
            },
        }
    }

    pub fn is_running_job(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    pub fn start(&self, interval_hours: f64) -> Result<(), SchedulerError> {
        let period = period_from_hours(interval_hours)?;
        let mut state = self.lock_state();
        if let State::Running { interval_hours: current, .. } = &*state {
            return Err(SchedulerError::AlreadyRunning(*current));
        }
        *state = State::Running {
            interval_hours,
            timer: self.spawn_timer(period, self.run_on_start),
        };
        tracing::info!(target: "scheduler", interval_hours, "scheduler started");
        Ok(())
    }

    /// Cancel any pending timer and start a new period of `interval_hours`
    /// counted from now. An in-flight run is left to finish.
    pub fn restart(&self, interval_hours: f64) -> Result<(), SchedulerError> {
        let period = period_from_hours(interval_hours)?;
        let mut state = self.lock_state();
        if let State::Running { timer, .. } = &*state {
            timer.abort();
        }
        *state = State::Running {
            interval_hours,
            timer: self.spawn_timer(period, false),
        };
        tracing::info!(target: "scheduler", interval_hours, "scheduler rescheduled");
        Ok(())
    }

    pub fn stop(&self) {
        let mut state = self.lock_state();
        if let State::Running { timer, .. } = std::mem::replace(&mut *state, State::Stopped) {
            timer.abort();
            tracing::info!(target: "scheduler", "scheduler stopped");
        }
    }

    /// Run now, outside the timer. Respects the single-run guard.
    pub async fn trigger_now(&self) -> TriggerOutcome {
        self.ready.wait().await;
        match run_guarded(self.job.clone(), self.run_lock.clone(), RunTrigger::Manual).await {
            Some(result) => TriggerOutcome::Completed(result),
            None => TriggerOutcome::Busy,
        }
    }

    fn spawn_timer(&self, period: Duration, immediate: bool) -> JoinHandle<()> {
        let job = self.job.clone();
        let lock = self.run_lock.clone();
        let ready = self.ready.clone();
        let called_at = Instant::now();
        let gate_was_open = ready.is_open();

        tokio::spawn(async move {
            ready.wait().await;
            // The period counts from the call, or from the gate opening if
            // the call had to wait for it.
            let first_tick = if gate_was_open {
                called_at + period
            } else {
                Instant::now() + period
            };
            if immediate {
                tokio::spawn(run_guarded(job.clone(), lock.clone(), RunTrigger::Scheduled));
            }

            let mut ticker = tokio::time::interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // Runs live in their own task so cancelling the timer never
                // interrupts one that already started.
                tokio::spawn(run_guarded(job.clone(), lock.clone(), RunTrigger::Scheduled));
            }
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn period_from_hours(hours: f64) -> Result<Duration, SchedulerError> {
    if !(hours.is_finite() && hours > 0.0) {
        return Err(SchedulerError::InvalidInterval(hours));
    }
    Ok(Duration::from_secs_f64(hours * 3600.0))
}

/// `None` when another run holds the guard.
async fn run_guarded(
    job: Arc<dyn ScheduledJob>,
    lock: Arc<AsyncMutex<()>>,
    trigger: RunTrigger,
) -> Option<Result<RunReport, PipelineError>> {
    let Ok(_permit) = lock.try_lock_owned() else {
        tracing::info!(target: "scheduler", ?trigger, "run already in progress, skipping");
        counter!("pipeline_runs_skipped_total", "reason" => "busy").increment(1);
        return None;
    };

    let result = job.run(trigger).await;
    match &result {
        Ok(report) => tracing::debug!(target: "scheduler", ?trigger, status = ?report.status, "run finished"),
        Err(PipelineError::FetchFailed(e)) => {
            tracing::warn!(target: "scheduler", ?trigger, error = %e, "run aborted, retrying next tick")
        }
        Err(e @ PipelineError::PersistenceFailed(_)) => {
            tracing::error!(target: "scheduler", ?trigger, error = %e, "run failed to persist state")
        }
    }
    Some(result)
}
