use crate::engine::fetcher::{self, FetchOutcome, WatchMode};
use crate::engine::heartbeat;
use crate::engine::identity::ViewerIdentity;
use crate::error::ViewerResult;
use crate::parser::catalog::ContentDescriptor;
use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::Client;
use std::sync::Arc;
use std::time::Duration;
use swarm_common::{ViewerConfig, MIN_CHUNK_SIZE_BYTES};

/// The server-facing operations a viewer performs.
///
/// Each viewer owns its transport exclusively; nothing here is shared
/// across viewers.
#[async_trait]
pub trait ViewerTransport: Send + 'static {
    async fn heartbeat(&mut self, identity: &ViewerIdentity) -> ViewerResult<()>;

    async fn catalog(&mut self) -> ViewerResult<Vec<ContentDescriptor>>;

    async fn fetch(
        &mut self,
        content: &ContentDescriptor,
        mode: WatchMode,
    ) -> ViewerResult<FetchOutcome>;
}

/// hyper-backed transport holding one viewer's connection pool.
pub struct HttpTransport {
    client: Client<HttpConnector>,
    config: Arc<ViewerConfig>,
}

impl HttpTransport {
    pub fn new(config: Arc<ViewerConfig>) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(config.request_timeout()));

        let client = Client::builder()
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(30))
            .http1_max_buf_size(config.chunk_size_bytes.max(MIN_CHUNK_SIZE_BYTES))
            .build(connector);

        Self { client, config }
    }
}

#[async_trait]
impl ViewerTransport for HttpTransport {
    async fn heartbeat(&mut self, identity: &ViewerIdentity) -> ViewerResult<()> {
        heartbeat::emit(&self.client, identity, &self.config).await
    }

    async fn catalog(&mut self) -> ViewerResult<Vec<ContentDescriptor>> {
        fetcher::query_catalog(&self.client, &self.config).await
    }

    async fn fetch(
        &mut self,
        content: &ContentDescriptor,
        mode: WatchMode,
    ) -> ViewerResult<FetchOutcome> {
        fetcher::fetch(&self.client, content, mode, &self.config).await
    }
}
