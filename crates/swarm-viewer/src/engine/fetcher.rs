use crate::error::{NetworkError, ViewerError, ViewerResult};
use crate::parser::catalog::{parse_catalog, ContentDescriptor};
use bytes::Bytes;
use hyper::body::HttpBody;
use hyper::client::HttpConnector;
use hyper::{Body, Client, Request, Response};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::time::Duration;
use swarm_common::ViewerConfig;
use tokio::time::timeout;
use tracing::debug;

pub const VIDEO_PATH: &str = "video";
pub const CATALOG_PATH: &str = "videos";

/// Characters that cannot appear raw inside a single path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Consume the entire body before returning.
    Full,
    /// Return as soon as the response headers arrive.
    Probe,
}

/// What a single fetch consumed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FetchOutcome {
    pub bytes: u64,
    pub chunks: u64,
}

async fn get(
    client: &Client<HttpConnector>,
    uri: String,
    deadline: Duration,
) -> ViewerResult<Response<Body>> {
    let request = Request::get(uri).body(Body::empty())?;
    let response = match timeout(deadline, client.request(request)).await {
        Ok(res) => res.map_err(NetworkError::from)?,
        Err(_) => return Err(NetworkError::Timeout(deadline).into()),
    };

    let status = response.status();
    if !status.is_success() {
        return Err(NetworkError::Status(status).into());
    }
    Ok(response)
}

/// URI of `name` under `/video/`, encoded as one path segment.
pub fn video_uri(config: &ViewerConfig, name: &str) -> String {
    config.endpoint(&format!(
        "{}/{}",
        VIDEO_PATH,
        utf8_percent_encode(name, PATH_SEGMENT)
    ))
}

/// Fetches `content` in the given mode.
///
/// Headers, and then each body chunk, must arrive within `request_timeout`.
/// A full watch throws every chunk away as it arrives; the client's read
/// buffer cap keeps each chunk at most `chunk_size_bytes`.
pub async fn fetch(
    client: &Client<HttpConnector>,
    content: &ContentDescriptor,
    mode: WatchMode,
    config: &ViewerConfig,
) -> ViewerResult<FetchOutcome> {
    let uri = video_uri(config, &content.name);
    let idle = config.request_timeout();
    let response = get(client, uri, idle).await?;

    match mode {
        WatchMode::Probe => {
            debug!(video = %content.name, status = %response.status(), "Probe watch answered");
            // Dropping the undrained body closes this connection instead of pooling it.
            Ok(FetchOutcome::default())
        }
        WatchMode::Full => {
            let outcome = drain_body(response.into_body(), idle).await?;
            debug!(
                video = %content.name,
                bytes = outcome.bytes,
                chunks = outcome.chunks,
                "Full watch finished"
            );
            Ok(outcome)
        }
    }
}

/// Reads `body` to the end, discarding each chunk as it arrives.
///
/// Fails with `Stalled` if no chunk arrives within `idle`, and with
/// `Interrupted` if the stream breaks partway through.
pub async fn drain_body<B>(mut body: B, idle: Duration) -> Result<FetchOutcome, NetworkError>
where
    B: HttpBody<Data = Bytes, Error = hyper::Error> + Unpin,
{
    let mut outcome = FetchOutcome::default();

    loop {
        match timeout(idle, body.data()).await {
            Ok(Some(Ok(chunk))) => {
                outcome.bytes += chunk.len() as u64;
                outcome.chunks += 1;
            }
            Ok(Some(Err(source))) => {
                return Err(NetworkError::Interrupted {
                    bytes: outcome.bytes,
                    source,
                })
            }
            Ok(None) => return Ok(outcome),
            Err(_) => {
                return Err(NetworkError::Stalled {
                    bytes: outcome.bytes,
                    idle,
                })
            }
        }
    }
}

/// Lists the server's catalog via `GET {base}/videos`.
pub async fn query_catalog(
    client: &Client<HttpConnector>,
    config: &ViewerConfig,
) -> ViewerResult<Vec<ContentDescriptor>> {
    let deadline = config.request_timeout();
    let uri = config.endpoint(CATALOG_PATH);

    let listing = async {
        let response = get(client, uri, deadline).await?;
        let body = hyper::body::to_bytes(response.into_body())
            .await
            .map_err(NetworkError::from)?;
        Ok::<_, ViewerError>(parse_catalog(&body).map_err(NetworkError::from)?)
    };

    match timeout(deadline, listing).await {
        Ok(res) => res,
        Err(_) => Err(NetworkError::Timeout(deadline).into()),
    }
}
