//! Refresh scheduler
//!
//! Owns the single published [`PortfolioSnapshot`] and drives refresh passes
//! on a fixed interval or on request. Passes never overlap: a request made
//! while one is in flight is coalesced into at most one follow-up pass. A
//! pass that fails leaves the previous snapshot in place and is retried on
//! the next tick.

mod pass;

pub use pass::{run_pass, PassState};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::error::PortfolioError;
use crate::portfolio::{HoldingStatic, PortfolioSnapshot, SeriesOptions};
use crate::pricing::{FetchOptions, QuoteSource};

/// Timing and shaping of refresh passes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub fetch: FetchOptions,
    pub series: SeriesOptions,
    pub declared_sectors: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(crate::config::DEFAULT_REFRESH_INTERVAL_SECS),
            fetch: FetchOptions::default(),
            series: SeriesOptions::default(),
            declared_sectors: Vec::new(),
        }
    }
}

/// Point-in-time view of the scheduler for consumers
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: PassState,
    pub last_success_at: Option<DateTime<Utc>>,
    #[serde(serialize_with = "serialize_error")]
    pub last_error: Option<PortfolioError>,
    /// Time since the last committed snapshot
    #[serde(skip)]
    pub staleness: Option<chrono::Duration>,
    pub passes_committed: u64,
    pub passes_failed: u64,
}

fn serialize_error<S: serde::Serializer>(
    value: &Option<PortfolioError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match value {
        Some(err) => serializer.collect_str(err),
        None => serializer.serialize_none(),
    }
}

impl SchedulerStatus {
    /// True from a failed pass until the next commit, even while a retry runs
    pub fn is_stale(&self) -> bool {
        self.last_error.is_some()
    }
}

#[derive(Debug)]
struct Shared {
    snapshot: Option<Arc<PortfolioSnapshot>>,
    state: PassState,
    trace: Vec<PassState>,
    last_success_at: Option<DateTime<Utc>>,
    last_error: Option<PortfolioError>,
    passes_committed: u64,
    passes_failed: u64,
    closed: bool,
}

struct Inner {
    source: Arc<dyn QuoteSource>,
    holdings: Arc<[HoldingStatic]>,
    config: SchedulerConfig,
    shared: RwLock<Shared>,
    /// Held for the whole of a pass; only one pass runs at a time
    in_flight: tokio::sync::Mutex<()>,
    trigger: Notify,
    /// Count of finished passes, committed or failed
    passes: watch::Sender<u64>,
    shutdown: watch::Sender<bool>,
}

impl Inner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, Shared> {
        self.shared.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Shared> {
        self.shared.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn transition(&self, state: PassState) {
        let mut shared = self.write();
        if state == PassState::Fetching {
            shared.trace.clear();
        }
        shared.state = state;
        shared.trace.push(state);
        debug!("Refresh pass → {}", state.as_str());
    }

    async fn refresh(&self) -> Result<Arc<PortfolioSnapshot>, PortfolioError> {
        let _guard = self.in_flight.lock().await;

        let previous_series = {
            let shared = self.read();
            if shared.closed {
                return Err(PortfolioError::ShutDown);
            }
            shared
                .snapshot
                .as_ref()
                .map(|s| s.performance.clone())
                .unwrap_or_else(VecDeque::new)
        };

        let outcome = run_pass(
            self.source.clone(),
            &self.holdings,
            &self.config,
            &previous_series,
            |state| self.transition(state),
        )
        .await;

        let mut shared = self.write();
        if shared.closed {
            return Err(PortfolioError::ShutDown);
        }

        match outcome {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                shared.snapshot = Some(snapshot.clone());
                shared.last_success_at = Some(snapshot.updated_at);
                shared.last_error = None;
                shared.passes_committed += 1;
                shared.state = PassState::Committed;
                shared.trace.push(PassState::Committed);
                let finished = shared.passes_committed + shared.passes_failed;
                drop(shared);

                self.passes.send_replace(finished);
                info!(
                    "Committed snapshot: {} holdings, {} skipped, value {}",
                    snapshot.holdings.len(),
                    snapshot.skipped.len(),
                    snapshot.present_value
                );
                Ok(snapshot)
            }
            Err(err) => {
                shared.last_error = Some(err.clone());
                shared.passes_failed += 1;
                let finished = shared.passes_committed + shared.passes_failed;
                drop(shared);

                self.passes.send_replace(finished);
                warn!("Refresh failed, keeping previous data: {}", err);
                Err(err)
            }
        }
    }
}

/// Periodic refresher publishing portfolio snapshots
pub struct RefreshScheduler {
    inner: Arc<Inner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl RefreshScheduler {
    pub fn new(
        source: Arc<dyn QuoteSource>,
        holdings: Vec<HoldingStatic>,
        config: SchedulerConfig,
    ) -> Self {
        let (passes, _) = watch::channel(0);
        let (shutdown, _) = watch::channel(false);

        let inner = Inner {
            source,
            holdings: holdings.into(),
            config,
            shared: RwLock::new(Shared {
                snapshot: None,
                state: PassState::Idle,
                trace: Vec::new(),
                last_success_at: None,
                last_error: None,
                passes_committed: 0,
                passes_failed: 0,
                closed: false,
            }),
            in_flight: tokio::sync::Mutex::new(()),
            trigger: Notify::new(),
            passes,
            shutdown,
        };

        Self {
            inner: Arc::new(inner),
            task: Mutex::new(None),
        }
    }

    /// Spawn the refresh loop on the current runtime.
    ///
    /// The first pass starts immediately. Calling `start` again is a no-op.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() || self.inner.read().closed {
            return;
        }

        let inner = self.inner.clone();
        let mut shutdown = self.inner.shutdown.subscribe();

        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => debug!("Scheduled refresh"),
                    _ = inner.trigger.notified() => debug!("Requested refresh"),
                    _ = shutdown.changed() => break,
                }

                tokio::select! {
                    _ = inner.refresh() => {}
                    _ = shutdown.changed() => break,
                }
            }

            info!("Refresh loop stopped");
        }));
    }

    /// Ask for a pass as soon as possible without waiting for it.
    ///
    /// While a pass is running, repeated requests collapse into one follow-up.
    pub fn request_refresh(&self) {
        self.inner.trigger.notify_one();
    }

    /// Run a pass now, waiting behind any pass already in flight
    pub async fn refresh_now(&self) -> Result<Arc<PortfolioSnapshot>, PortfolioError> {
        self.inner.refresh().await
    }

    /// The last committed snapshot, if any pass has succeeded yet
    pub fn current_snapshot(&self) -> Option<Arc<PortfolioSnapshot>> {
        self.inner.read().snapshot.clone()
    }

    /// Reason the most recent pass failed; cleared by the next commit
    pub fn last_error(&self) -> Option<PortfolioError> {
        self.inner.read().last_error.clone()
    }

    /// States visited by the most recent pass
    pub fn last_pass_trace(&self) -> Vec<PassState> {
        self.inner.read().trace.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        let shared = self.inner.read();
        SchedulerStatus {
            state: shared.state,
            last_success_at: shared.last_success_at,
            last_error: shared.last_error.clone(),
            staleness: shared.last_success_at.map(|at| Utc::now() - at),
            passes_committed: shared.passes_committed,
            passes_failed: shared.passes_failed,
        }
    }

    /// Receiver that changes every time a pass finishes, committed or not.
    ///
    /// Check [`status`](Self::status) to tell the two apart.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.passes.subscribe()
    }

    /// Stop the loop and abandon any in-flight pass.
    ///
    /// Once this returns no snapshot will be published again.
    pub async fn shutdown(&self) {
        self.inner.write().closed = true;
        self.inner.shutdown.send_replace(true);

        let task = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!("Refresh loop ended abnormally: {}", e);
            }
        }
        info!("Scheduler shut down");
    }
}

impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        self.inner.write().closed = true;
        if let Some(task) = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}
