// ── Push stream client ──
//
// Owns the single event-stream connection to the backend and its reconnect
// loop. One background task drives the whole state machine, so there is
// never more than one open connection, one pending connection attempt, or
// one armed reconnect timer.

use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use devdash_api::StreamMessage;
use devdash_api::websocket::{Connector, FrameStream, StreamFrame};

use crate::convert::devices_from_records;
use crate::store::{DeviceRepository, SyncOperation};

// ── StreamState ──────────────────────────────────────────────────

/// Lifecycle of the push connection, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum StreamState {
    /// Not started, or shut down.
    Idle,
    /// A connection attempt is in flight.
    Connecting,
    /// The connection is open and messages are being applied.
    Connected,
    /// The last connection closed; a reconnect is scheduled.
    Disconnected,
}

// ── StreamClient ─────────────────────────────────────────────────

/// Keeps one push connection alive and merges its snapshots into the
/// [`DeviceRepository`].
///
/// After any close (including a failed open) the client waits a fixed
/// `reconnect_delay` and tries again, forever, until [`shutdown`](Self::shutdown).
pub struct StreamClient {
    session: Session,
    task: Mutex<Option<RunningTask>>,
}

struct RunningTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

/// Everything the background task needs; cloned into it on start.
#[derive(Clone)]
struct Session {
    connector: Arc<dyn Connector>,
    url: Url,
    reconnect_delay: Duration,
    repo: Arc<DeviceRepository>,
    state: Arc<watch::Sender<StreamState>>,
    attempts: Arc<AtomicU64>,
    connections: Arc<watch::Sender<u64>>,
}

impl StreamClient {
    pub fn new(
        connector: Arc<dyn Connector>,
        url: Url,
        reconnect_delay: Duration,
        repo: Arc<DeviceRepository>,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Idle);
        let (connections, _) = watch::channel(0);
        Self {
            session: Session {
                connector,
                url,
                reconnect_delay,
                repo,
                state: Arc::new(state),
                attempts: Arc::new(AtomicU64::new(0)),
                connections: Arc::new(connections),
            },
            task: Mutex::new(None),
        }
    }

    /// Start the connection task. A no-op while the task is already running.
    pub fn start(&self) {
        let mut task = self.task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!("event stream already running");
            return;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(self.session.clone().run(cancel.clone()));
        *task = Some(RunningTask { handle, cancel });
    }

    /// Close the connection, disarm any pending reconnect, and wait for the
    /// task to finish. The state returns to [`StreamState::Idle`].
    pub async fn shutdown(&self) {
        let running = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(RunningTask { handle, cancel }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "event stream task did not exit cleanly");
            }
            debug!("event stream stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    pub fn state(&self) -> StreamState {
        *self.session.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.session.state.subscribe()
    }

    /// Connection attempts made since creation.
    pub fn attempts(&self) -> u64 {
        self.session.attempts.load(Ordering::Relaxed)
    }

    /// Successful opens since creation. Any value above one means the
    /// stream has reconnected at least once.
    pub fn connections(&self) -> u64 {
        *self.session.connections.borrow()
    }

    pub fn watch_connections(&self) -> watch::Receiver<u64> {
        self.session.connections.subscribe()
    }

    pub fn url(&self) -> &Url {
        &self.session.url
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        let running = self
            .task
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(task) = running {
            task.cancel.cancel();
        }
    }
}

// ── Connection task ──────────────────────────────────────────────

impl Session {
    async fn run(self, cancel: CancellationToken) {
        loop {
            self.state.send_replace(StreamState::Connecting);
            let attempt = self.attempts.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(attempt, url = %self.url, "opening event stream");

            let opened = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                result = self.connector.connect(&self.url) => result,
            };

            match opened {
                Ok(frames) => {
                    self.state.send_replace(StreamState::Connected);
                    self.repo.set_stream_connected(true);
                    self.repo.clear_error();
                    self.connections.send_modify(|n| *n += 1);
                    info!(attempt, "event stream connected");

                    if self.pump(frames, &cancel).await.is_break() {
                        break;
                    }
                }
                Err(e) => {
                    // a failed open is an error followed by a close
                    warn!(attempt, error = %e, "event stream connection failed");
                    self.repo.record_failure(SyncOperation::Stream);
                }
            }

            self.repo.set_stream_connected(false);
            self.state.send_replace(StreamState::Disconnected);
            info!(delay = ?self.reconnect_delay, "event stream closed, reconnect scheduled");

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                () = tokio::time::sleep(self.reconnect_delay) => {}
            }
        }

        self.repo.set_stream_connected(false);
        self.state.send_replace(StreamState::Idle);
    }

    /// Apply frames until the connection closes (`Continue`) or the task is
    /// cancelled (`Break`).
    async fn pump(&self, mut frames: FrameStream, cancel: &CancellationToken) -> ControlFlow<()> {
        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => return ControlFlow::Break(()),
                frame = frames.next() => frame,
            };

            match frame {
                Some(StreamFrame::Text(text)) => self.dispatch(&text),
                Some(StreamFrame::Error(e)) => {
                    warn!(error = %e, "event stream transport error");
                    self.repo.record_failure(SyncOperation::Stream);
                }
                Some(StreamFrame::Closed(info)) => {
                    debug!(?info, "event stream closed by peer");
                    return ControlFlow::Continue(());
                }
                None => return ControlFlow::Continue(()),
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match StreamMessage::decode(text) {
            Ok(StreamMessage::DeviceList { devices }) => {
                debug!(devices = devices.len(), "applying stream snapshot");
                self.repo.replace_all(devices_from_records(devices));
            }
            Ok(other) => debug!(kind = other.kind(), "ignoring stream message"),
            Err(e) => warn!(error = %e, "discarding malformed stream payload"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
