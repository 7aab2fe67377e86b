use crate::engine::fetcher::{FetchOutcome, WatchMode};
use crate::engine::identity::ViewerIdentity;
use crate::engine::transport::ViewerTransport;
use crate::error::{ViewerError, ViewerResult};
use crate::metrics;
use crate::parser::catalog::{self, ContentDescriptor};
use futures::FutureExt;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use swarm_common::{ViewerConfig, WatchPolicy};
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

struct ActiveViewerGuard;

impl ActiveViewerGuard {
    fn new() -> Self {
        metrics::ACTIVE_VIEWERS.inc();
        Self
    }
}

impl Drop for ActiveViewerGuard {
    fn drop(&mut self) {
        metrics::ACTIVE_VIEWERS.dec();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerPhase {
    Starting,
    Running,
    Stopped,
}

/// Running totals for one viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewerStats {
    pub iterations: u64,
    pub heartbeats_attempted: u64,
    pub heartbeat_failures: u64,
    /// Catalog queries that failed count as failed fetch attempts.
    pub fetches_attempted: u64,
    pub fetch_failures: u64,
    pub bytes_consumed: u64,
    pub watches_skipped: u64,
    pub unexpected_errors: u64,
}

/// Mutable state owned by a single viewer loop.
#[derive(Debug)]
pub struct ViewerState {
    pub phase: ViewerPhase,
    pub last_heartbeat: Option<Instant>,
    /// Iterations in a row that ended in a boundary error.
    pub consecutive_failures: u32,
    pub stats: ViewerStats,
}

impl ViewerState {
    fn new() -> Self {
        Self {
            phase: ViewerPhase::Starting,
            last_heartbeat: None,
            consecutive_failures: 0,
            stats: ViewerStats::default(),
        }
    }
}

/// Handed back by a viewer once its loop has stopped.
#[derive(Debug, Clone)]
pub struct ViewerReport {
    pub worker: usize,
    pub identity: ViewerIdentity,
    pub stats: ViewerStats,
}

/// One watch decision of the probabilistic policy.
pub fn should_watch<R>(rng: &mut R, probability: f64) -> bool
where
    R: Rng + ?Sized,
{
    rng.gen::<f64>() < probability
}

pub struct Viewer<T> {
    worker: usize,
    identity: ViewerIdentity,
    config: Arc<ViewerConfig>,
    transport: T,
    state: ViewerState,
    rng: StdRng,
}

impl<T: ViewerTransport> Viewer<T> {
    pub fn new(worker: usize, config: Arc<ViewerConfig>, transport: T) -> Self {
        Self {
            worker,
            identity: ViewerIdentity::generate(),
            config,
            transport,
            state: ViewerState::new(),
            rng: StdRng::from_entropy(),
        }
    }

    pub fn identity(&self) -> &ViewerIdentity {
        &self.identity
    }

    pub fn state(&self) -> &ViewerState {
        &self.state
    }

    /// Runs until `shutdown` is cancelled, then reports what this viewer did.
    pub async fn run(self, shutdown: CancellationToken) -> ViewerReport {
        let span = info_span!("viewer", worker = self.worker, client_id = %self.identity);
        self.run_loop(shutdown).instrument(span).await
    }

    async fn run_loop(mut self, shutdown: CancellationToken) -> ViewerReport {
        let _guard = ActiveViewerGuard::new();
        self.state.phase = ViewerPhase::Running;
        info!("Viewer started");

        while !shutdown.is_cancelled() {
            let iteration = AssertUnwindSafe(self.iterate()).catch_unwind();
            let result = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                res = iteration => res.unwrap_or_else(|panic| Err(ViewerError::Panicked(panic_message(panic)))),
            };

            if let Err(e) = result {
                self.state.consecutive_failures += 1;
                self.state.stats.unexpected_errors += 1;
                metrics::UNEXPECTED_ERRORS.inc();
                error!(
                    error = %e,
                    consecutive_failures = self.state.consecutive_failures,
                    cooldown_ms = self.config.error_cooldown_ms,
                    "Unexpected viewer error, cooling down"
                );

                tokio::select! {
                    biased;
                    _ = shutdown.cancelled() => break,
                    _ = sleep(self.config.error_cooldown()) => {}
                }
            }
        }

        self.state.phase = ViewerPhase::Stopped;
        let stats = self.state.stats.clone();
        info!(
            heartbeats = stats.heartbeats_attempted,
            heartbeat_failures = stats.heartbeat_failures,
            fetches = stats.fetches_attempted,
            fetch_failures = stats.fetch_failures,
            bytes = stats.bytes_consumed,
            "Viewer stopped"
        );

        ViewerReport {
            worker: self.worker,
            identity: self.identity,
            stats,
        }
    }

    async fn iterate(&mut self) -> ViewerResult<()> {
        self.step().await?;
        self.state.consecutive_failures = 0;
        let pause = self.next_pause();
        self.idle(pause).await
    }

    /// Heartbeat if due, then watch. Only non-network errors escape.
    pub async fn step(&mut self) -> ViewerResult<()> {
        self.state.stats.iterations += 1;
        self.heartbeat_if_due().await?;
        self.watch().await
    }

    fn heartbeat_due(&self, now: Instant) -> bool {
        match self.state.last_heartbeat {
            Some(last) => now.duration_since(last) >= self.config.heartbeat_interval(),
            None => true,
        }
    }

    async fn heartbeat_if_due(&mut self) -> ViewerResult<()> {
        let now = Instant::now();
        if !self.heartbeat_due(now) {
            return Ok(());
        }

        // Gate on the attempt, not on success, so a dead endpoint still gets one try per interval.
        self.state.last_heartbeat = Some(now);
        self.state.stats.heartbeats_attempted += 1;

        match self.transport.heartbeat(&self.identity).await {
            Ok(()) => {
                metrics::HEARTBEATS_SENT.inc();
                Ok(())
            }
            Err(e) if e.is_transient() => {
                self.state.stats.heartbeat_failures += 1;
                metrics::HEARTBEAT_FAILURES.inc();
                warn!(error = %e, "Heartbeat failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn watch(&mut self) -> ViewerResult<()> {
        let config = Arc::clone(&self.config);
        let (content, mode) = match &config.watch {
            WatchPolicy::AlwaysStream { video } => {
                (ContentDescriptor::new(video.as_str()), WatchMode::Full)
            }
            WatchPolicy::Probabilistic { probability } => {
                if !should_watch(&mut self.rng, *probability) {
                    self.state.stats.watches_skipped += 1;
                    return Ok(());
                }
                match self.pick_from_catalog().await? {
                    Some(content) => (content, WatchMode::Probe),
                    None => return Ok(()),
                }
            }
        };

        self.state.stats.fetches_attempted += 1;
        match self.transport.fetch(&content, mode).await {
            Ok(outcome) => {
                self.record_fetch(mode, outcome);
                Ok(())
            }
            Err(e) if e.is_transient() => {
                self.state.stats.fetch_failures += 1;
                metrics::FETCH_FAILURES.inc();
                warn!(video = %content.name, error = %e, "Streaming failed");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn pick_from_catalog(&mut self) -> ViewerResult<Option<ContentDescriptor>> {
        match self.transport.catalog().await {
            Ok(listing) => {
                let picked = catalog::choose(&listing, &mut self.rng).cloned();
                if picked.is_none() {
                    self.state.stats.watches_skipped += 1;
                    debug!("Catalog is empty, skipping watch");
                }
                Ok(picked)
            }
            Err(e) if e.is_transient() => {
                self.state.stats.fetches_attempted += 1;
                self.state.stats.fetch_failures += 1;
                metrics::FETCH_FAILURES.inc();
                warn!(error = %e, "Catalog query failed");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn record_fetch(&mut self, mode: WatchMode, outcome: FetchOutcome) {
        self.state.stats.bytes_consumed += outcome.bytes;
        metrics::BYTES_CONSUMED.inc_by(outcome.bytes);
        let label = match mode {
            WatchMode::Full => "full",
            WatchMode::Probe => "probe",
        };
        metrics::FETCHES_COMPLETED.with_label_values(&[label]).inc();
    }

    fn next_pause(&mut self) -> Duration {
        let mut pause = self.config.iteration_sleep();
        if self.config.iteration_jitter_ms > 0 {
            pause += Duration::from_millis(self.rng.gen_range(0..=self.config.iteration_jitter_ms));
        }
        pause
    }

    /// Sleeps for the whole `pause`, sending any heartbeat that falls due meanwhile.
    async fn idle(&mut self, pause: Duration) -> ViewerResult<()> {
        let wake = Instant::now() + pause;
        loop {
            match self.state.last_heartbeat {
                Some(last) if last + self.config.heartbeat_interval() < wake => {
                    sleep_until(last + self.config.heartbeat_interval()).await;
                    self.heartbeat_if_due().await?;
                }
                _ => {
                    sleep_until(wake).await;
                    return Ok(());
                }
            }
        }
    }
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
