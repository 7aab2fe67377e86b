use lazy_static::lazy_static;
use prometheus::{IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    /// Maintained by each viewer loop for as long as it runs
    pub static ref ACTIVE_VIEWERS: IntGauge = IntGauge::new(
        "swarm_active_viewers",
        "Number of viewer loops currently running"
    )
    .expect("metric can be created");
    pub static ref HEARTBEATS_SENT: IntCounter = IntCounter::new(
        "swarm_heartbeats_sent_total",
        "Total number of heartbeats accepted by the server"
    )
    .expect("metric can be created");
    pub static ref HEARTBEAT_FAILURES: IntCounter = IntCounter::new(
        "swarm_heartbeat_failures_total",
        "Total number of heartbeat attempts that failed"
    )
    .expect("metric can be created");
    /// Completed fetches, labelled by watch mode (`full` or `probe`)
    pub static ref FETCHES_COMPLETED: IntCounterVec = IntCounterVec::new(
        Opts::new(
            "swarm_fetches_completed_total",
            "Total number of content fetches that completed"
        ),
        &["mode"]
    )
    .expect("metric can be created");
    /// Includes failed catalog queries
    pub static ref FETCH_FAILURES: IntCounter = IntCounter::new(
        "swarm_fetch_failures_total",
        "Total number of content fetches that failed"
    )
    .expect("metric can be created");
    pub static ref BYTES_CONSUMED: IntCounter = IntCounter::new(
        "swarm_bytes_consumed_total",
        "Total number of content bytes read and discarded"
    )
    .expect("metric can be created");
    pub static ref UNEXPECTED_ERRORS: IntCounter = IntCounter::new(
        "swarm_unexpected_errors_total",
        "Total number of iterations that ended in the error cooldown"
    )
    .expect("metric can be created");
}

pub fn register_metrics() {
    let _ = REGISTRY.register(Box::new(ACTIVE_VIEWERS.clone()));
    let _ = REGISTRY.register(Box::new(HEARTBEATS_SENT.clone()));
    let _ = REGISTRY.register(Box::new(HEARTBEAT_FAILURES.clone()));
    let _ = REGISTRY.register(Box::new(FETCHES_COMPLETED.clone()));
    let _ = REGISTRY.register(Box::new(FETCH_FAILURES.clone()));
    let _ = REGISTRY.register(Box::new(BYTES_CONSUMED.clone()));
    let _ = REGISTRY.register(Box::new(UNEXPECTED_ERRORS.clone()));
}

/// Text exposition of every registered metric.
pub fn render_metrics() -> String {
    TextEncoder::new()
        .encode_to_string(&REGISTRY.gather())
        .unwrap_or_else(|e| format!("# Error encoding metrics: {}", e))
}

/// Body for an observability route, or `None` when the path is unknown.
pub fn serve(path: &str) -> Option<String> {
    match path {
        "/health" => Some("OK".to_string()),
        "/metrics" => Some(render_metrics()),
        _ => None,
    }
}
