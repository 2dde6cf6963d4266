//! WebSocket event stream transport.
//!
//! Opens the backend's `/ws` endpoint and exposes the connection as a
//! stream of [`StreamFrame`]s. Reconnection policy is not decided here;
//! callers drive it through the [`Connector`] trait, which also lets them
//! substitute scripted connections in tests.
//!
//! # Example
//!
//! ```rust,ignore
//! use devdash_api::websocket::{Connector, StreamFrame, TungsteniteConnector};
//! use futures_util::StreamExt;
//!
//! let url = client.stream_url("dashboard")?;
//! let mut frames = TungsteniteConnector.connect(&url).await?;
//!
//! while let Some(frame) = frames.next().await {
//!     if let StreamFrame::Text(text) = frame {
//!         println!("{text}");
//!     }
//! }
//! ```

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::{self, Message};
use url::Url;

use crate::error::Error;

// ── Frames ───────────────────────────────────────────────────────────

/// Close frame payload sent by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
}

/// One observable event on an open connection.
///
/// The frame stream ends after [`Closed`](Self::Closed) or
/// [`Error`](Self::Error); a stream that ends without either was dropped
/// abnormally by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A text frame.
    Text(String),
    /// Transport failure on an open connection.
    Error(String),
    /// Close handshake from the peer.
    Closed(Option<CloseInfo>),
}

/// Frames of a single open connection.
pub type FrameStream = BoxStream<'static, StreamFrame>;

// ── Connector ────────────────────────────────────────────────────────

/// Opens push connections.
///
/// Implementations resolve once the connection is established (the
/// equivalent of a WebSocket `open` event) or fail with
/// [`Error::WebSocketConnect`].
pub trait Connector: Send + Sync + 'static {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<FrameStream, Error>>;
}

/// Production connector backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

impl Connector for TungsteniteConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<FrameStream, Error>> {
        let url = url.clone();
        async move {
            tracing::info!(url = %url, "Connecting to WebSocket");

            let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
                .await
                .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

            tracing::info!("WebSocket connected");
            Ok(into_frames(ws_stream))
        }
        .boxed()
    }
}

// ── Message mapping ──────────────────────────────────────────────────

/// Map raw tungstenite messages to [`StreamFrame`]s, ending the stream
/// after a close frame or a read error.
fn into_frames<S>(ws: S) -> FrameStream
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Send + Unpin + 'static,
{
    stream::unfold(Some(ws), |state| async move {
        let mut ws = state?;
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Some((StreamFrame::Text(text.as_str().to_owned()), Some(ws)));
                }
                Some(Ok(Message::Close(frame))) => {
                    let info = frame.map(|cf| CloseInfo {
                        code: cf.code.into(),
                        reason: cf.reason.as_str().to_owned(),
                    });
                    if let Some(ref cf) = info {
                        tracing::info!(code = cf.code, reason = %cf.reason, "WebSocket close frame received");
                    } else {
                        tracing::info!("WebSocket close frame received (no payload)");
                    }
                    return Some((StreamFrame::Closed(info), None));
                }
                Some(Ok(Message::Ping(_))) => {
                    // tungstenite queues the pong reply itself
                    tracing::trace!("WebSocket ping");
                }
                Some(Ok(_)) => {
                    // Binary, Pong, Frame -- ignore
                }
                Some(Err(e)) => {
                    return Some((StreamFrame::Error(e.to_string()), None));
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    return None;
                }
            }
        }
    })
    .boxed()
}

// ── Tests ────────────────────────────────────────────────────────────
