use crate::engine::fetcher::drain_body;
use crate::engine::identity::ViewerIdentity;
use crate::error::{NetworkError, ViewerError, ViewerResult};
use hyper::client::HttpConnector;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Client, Method, Request};
use serde::Serialize;
use swarm_common::ViewerConfig;
use tokio::time::timeout;
use tracing::debug;

pub const HEARTBEAT_PATH: &str = "heartbeat";

#[derive(Debug, Serialize)]
struct HeartbeatPayload<'a> {
    client_id: &'a str,
}

/// Sends one heartbeat for `identity`, bounded by the heartbeat timeout.
/// The reply body is discarded chunk by chunk so the connection can be pooled.
pub async fn emit(
    client: &Client<HttpConnector>,
    identity: &ViewerIdentity,
    config: &ViewerConfig,
) -> ViewerResult<()> {
    let payload = serde_json::to_vec(&HeartbeatPayload {
        client_id: identity.as_str(),
    })
    .map_err(ViewerError::Encode)?;

    let request = Request::builder()
        .method(Method::POST)
        .uri(config.endpoint(HEARTBEAT_PATH))
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(payload))?;

    let deadline = config.heartbeat_timeout();
    let exchange = async {
        let response = client.request(request).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::Status(status));
        }
        drain_body(response.into_body(), deadline).await?;
        Ok::<_, NetworkError>(status)
    };

    match timeout(deadline, exchange).await {
        Ok(Ok(status)) => {
            debug!(status = %status, "Heartbeat accepted");
            Ok(())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(NetworkError::Timeout(deadline).into()),
    }
}
