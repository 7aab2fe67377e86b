#![allow(dead_code)]

use async_trait::async_trait;
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use swarm_common::{ViewerConfig, WatchPolicy};
use swarm_viewer::engine::fetcher::{FetchOutcome, WatchMode};
use swarm_viewer::parser::catalog::ContentDescriptor;
use swarm_viewer::{NetworkError, ViewerError, ViewerIdentity, ViewerTransport};
use tokio::time::Instant;

/// Config with the defaults used by the looping tests: 5s heartbeats, 1s iterations,
/// 5s cooldown, no jitter.
pub fn test_config(base_url: &str) -> ViewerConfig {
    ViewerConfig {
        base_url: base_url.to_string(),
        watch: WatchPolicy::AlwaysStream {
            video: "sample.mp4".to_string(),
        },
        ..ViewerConfig::default()
    }
}

/// Serves every connection with `handler` on an ephemeral loopback port.
pub fn spawn_server<F, Fut>(handler: F) -> SocketAddr
where
    F: Fn(Request<Body>) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = Result<Response<Body>, Infallible>> + Send + 'static,
{
    let make_svc = make_service_fn(move |_conn| {
        let handler = handler.clone();
        async move { Ok::<_, Infallible>(service_fn(handler)) }
    });

    let server = Server::bind(&SocketAddr::from(([127, 0, 0, 1], 0))).serve(make_svc);
    let addr = server.local_addr();
    tokio::spawn(server);
    addr
}

pub fn invalid_request_error() -> ViewerError {
    let err = Request::builder()
        .uri("not a valid uri")
        .body(())
        .unwrap_err();
    ViewerError::InvalidRequest(err)
}

#[derive(Clone, Copy, Debug)]
pub enum HeartbeatBehavior {
    Accept,
    Fail,
}

#[derive(Clone, Copy, Debug)]
pub enum FetchBehavior {
    /// Succeeds instantly, reporting this many bytes.
    Deliver(u64),
    /// Fails with a transient stream error.
    DropMidStream,
    /// Fails with an error that is not a network error.
    Unexpected,
    /// Panics on the first call, then delivers.
    PanicOnce,
    /// Never completes.
    Hang,
    /// Delivers after streaming for this long.
    Slow(Duration),
}

#[derive(Clone, Debug)]
pub enum CatalogBehavior {
    List(Vec<&'static str>),
    Fail,
}

#[derive(Debug, Default)]
pub struct CallLog {
    pub heartbeats: Vec<(String, Instant)>,
    pub fetches: Vec<(String, WatchMode)>,
    pub fetch_started: Vec<Instant>,
    pub catalog_queries: usize,
}

pub struct FakeTransport {
    pub heartbeat: HeartbeatBehavior,
    pub fetch: FetchBehavior,
    pub catalog: CatalogBehavior,
    pub log: Arc<Mutex<CallLog>>,
    panicked: bool,
}

impl FakeTransport {
    pub fn new(heartbeat: HeartbeatBehavior, fetch: FetchBehavior) -> Self {
        Self {
            heartbeat,
            fetch,
            catalog: CatalogBehavior::List(Vec::new()),
            log: Arc::new(Mutex::new(CallLog::default())),
            panicked: false,
        }
    }

    pub fn healthy() -> Self {
        Self::new(HeartbeatBehavior::Accept, FetchBehavior::Deliver(0))
    }

    pub fn with_catalog(mut self, catalog: CatalogBehavior) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_log(mut self, log: Arc<Mutex<CallLog>>) -> Self {
        self.log = log;
        self
    }
}

#[async_trait]
impl ViewerTransport for FakeTransport {
    async fn heartbeat(&mut self, identity: &ViewerIdentity) -> Result<(), ViewerError> {
        self.log
            .lock()
            .unwrap()
            .heartbeats
            .push((identity.to_string(), Instant::now()));
        match self.heartbeat {
            HeartbeatBehavior::Accept => Ok(()),
            HeartbeatBehavior::Fail => Err(NetworkError::Timeout(Duration::from_secs(2)).into()),
        }
    }

    async fn catalog(&mut self) -> Result<Vec<ContentDescriptor>, ViewerError> {
        self.log.lock().unwrap().catalog_queries += 1;
        match &self.catalog {
            CatalogBehavior::List(names) => {
                Ok(names.iter().map(|n| ContentDescriptor::new(*n)).collect())
            }
            CatalogBehavior::Fail => Err(NetworkError::Timeout(Duration::from_secs(10)).into()),
        }
    }

    async fn fetch(
        &mut self,
        content: &ContentDescriptor,
        mode: WatchMode,
    ) -> Result<FetchOutcome, ViewerError> {
        {
            let mut log = self.log.lock().unwrap();
            log.fetches.push((content.name.clone(), mode));
            log.fetch_started.push(Instant::now());
        }
        match self.fetch {
            FetchBehavior::Deliver(bytes) => Ok(FetchOutcome { bytes, chunks: 1 }),
            FetchBehavior::DropMidStream => Err(NetworkError::Stalled {
                bytes: 4096,
                idle: Duration::from_secs(10),
            }
            .into()),
            FetchBehavior::Unexpected => Err(invalid_request_error()),
            FetchBehavior::PanicOnce => {
                if !self.panicked {
                    self.panicked = true;
                    panic!("decoder blew up");
                }
                Ok(FetchOutcome::default())
            }
            FetchBehavior::Hang => std::future::pending().await,
            FetchBehavior::Slow(duration) => {
                tokio::time::sleep(duration).await;
                Ok(FetchOutcome {
                    bytes: 1,
                    chunks: 1,
                })
            }
        }
    }
}
