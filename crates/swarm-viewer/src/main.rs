use clap::Parser;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode, Uri,
};
use std::convert::Infallible;
use std::error::Error;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use swarm_common::{Config, LoggingConfig};
use swarm_viewer::{cancel_on, metrics, run_population, HttpTransport};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "config/swarm_config.yaml";

/// Viewer bot for streaming server load testing.
#[derive(Debug, Parser)]
#[command(name = "swarm-viewer", version)]
struct Args {
    /// YAML config file (defaults to config/swarm_config.yaml when present)
    #[arg(long, env = "SWARM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of concurrent viewers to simulate
    #[arg(short, long)]
    workers: Option<usize>,

    /// Base address of the streaming server
    #[arg(long)]
    base_url: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

fn load_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => Config::from_yaml(&fs::read_to_string(path)?)?,
        None => match fs::read_to_string(DEFAULT_CONFIG_PATH) {
            Ok(data) => Config::from_yaml(&data)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        },
    };

    if let Some(workers) = args.workers {
        config.population.workers = workers;
    }
    if let Some(base_url) = &args.base_url {
        config.viewer.base_url = base_url.clone();
    }
    if args.json_logs {
        config.logging.json = true;
    }

    config.validate()?;
    config.viewer.base_url.parse::<Uri>()?;
    Ok(config)
}

fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json {
        registry.with(fmt::layer().json().with_target(true)).init();
    } else {
        registry.with(fmt::layer().with_target(false)).init();
    }
}

async fn metrics_handler(req: Request<Body>) -> Result<Response<Body>, Infallible> {
    let response = match metrics::serve(req.uri().path()) {
        Some(body) => Response::new(Body::from(body)),
        None => {
            let mut missing = Response::new(Body::empty());
            *missing.status_mut() = StatusCode::NOT_FOUND;
            missing
        }
    };
    Ok(response)
}

async fn run_metrics_server(port: u16, shutdown: CancellationToken) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics::register_metrics();

    let make_svc =
        make_service_fn(|_conn| async { Ok::<_, Infallible>(service_fn(metrics_handler)) });

    let server = match Server::try_bind(&addr) {
        Ok(builder) => builder.serve(make_svc),
        Err(e) => {
            error!(port = port, error = %e, "Observability server could not bind");
            return;
        }
    };

    info!(port = port, "Observability server online");

    let graceful = server.with_graceful_shutdown(async move { shutdown.cancelled().await });
    if let Err(e) = graceful.await {
        error!(error = %e, "Observability server failed");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_logging(&config.logging);

    let viewer_cfg = Arc::new(config.viewer.clone());
    let master_token = CancellationToken::new();

    if config.metrics.enabled {
        let port = config.metrics.port;
        let metrics_token = master_token.clone();
        tokio::spawn(async move {
            run_metrics_server(port, metrics_token).await;
        });
    }

    tokio::spawn(cancel_on(tokio::signal::ctrl_c(), master_token.clone()));

    info!(
        workers = config.population.workers,
        base_url = %viewer_cfg.base_url,
        "Viewer swarm starting"
    );

    let transport_cfg = Arc::clone(&viewer_cfg);
    let report = run_population(
        config.population.workers,
        viewer_cfg,
        config.population.stagger(),
        move |_worker| HttpTransport::new(Arc::clone(&transport_cfg)),
        master_token,
    )
    .await;

    let totals = report.totals();
    info!(
        viewers = report.viewers.len(),
        heartbeats = totals.heartbeats_attempted,
        heartbeat_failures = totals.heartbeat_failures,
        fetches = totals.fetches_attempted,
        fetch_failures = totals.fetch_failures,
        bytes = totals.bytes_consumed,
        unexpected_errors = totals.unexpected_errors,
        "Viewer swarm stopped"
    );

    Ok(())
}
