use crate::engine::transport::ViewerTransport;
use crate::engine::viewer::{Viewer, ViewerReport, ViewerStats};
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use swarm_common::ViewerConfig;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Reports of every viewer that ran, in spawn order.
#[derive(Debug, Clone, Default)]
pub struct PopulationReport {
    pub viewers: Vec<ViewerReport>,
}

impl PopulationReport {
    pub fn totals(&self) -> ViewerStats {
        self.viewers
            .iter()
            .fold(ViewerStats::default(), |mut acc, report| {
                let s = &report.stats;
                acc.iterations += s.iterations;
                acc.heartbeats_attempted += s.heartbeats_attempted;
                acc.heartbeat_failures += s.heartbeat_failures;
                acc.fetches_attempted += s.fetches_attempted;
                acc.fetch_failures += s.fetch_failures;
                acc.bytes_consumed += s.bytes_consumed;
                acc.watches_skipped += s.watches_skipped;
                acc.unexpected_errors += s.unexpected_errors;
                acc
            })
    }
}

/// Spawns `worker_count` viewers, `stagger` apart, and keeps them running
/// until `shutdown` is cancelled.
///
/// `make_transport` is called once per viewer (with its 1-based worker
/// number) so every viewer owns its own connections. Viewers never stop on
/// their own, so nothing is restarted; after cancellation this waits for each
/// loop to wind down and collects its report.
pub async fn run<T, F>(
    worker_count: usize,
    config: Arc<ViewerConfig>,
    stagger: Duration,
    mut make_transport: F,
    shutdown: CancellationToken,
) -> PopulationReport
where
    T: ViewerTransport,
    F: FnMut(usize) -> T,
{
    info!(workers = worker_count, "Starting viewer population");

    let mut handles: Vec<JoinHandle<ViewerReport>> = Vec::with_capacity(worker_count);

    for worker in 1..=worker_count {
        if worker > 1 {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = sleep(stagger) => {}
            }
        }

        let viewer = Viewer::new(worker, Arc::clone(&config), make_transport(worker));
        info!(worker = worker, client_id = %viewer.identity(), "Spawning viewer");
        handles.push(tokio::spawn(viewer.run(shutdown.clone())));
    }

    info!(spawned = handles.len(), "Viewer population online");
    shutdown.cancelled().await;
    info!("Stopping viewer population");

    let mut report = PopulationReport::default();
    for handle in handles {
        match handle.await {
            Ok(viewer) => report.viewers.push(viewer),
            Err(e) => error!(error = %e, "Viewer task failed"),
        }
    }
    report
}

/// Cancels `shutdown` once `signal` resolves, including when the signal
/// handler could not be installed.
pub async fn cancel_on<F>(signal: F, shutdown: CancellationToken)
where
    F: Future<Output = io::Result<()>>,
{
    match signal.await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => error!(error = %e, "Could not listen for shutdown signal, stopping"),
    }
    shutdown.cancel();
}
