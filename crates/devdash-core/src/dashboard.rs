// ── Dashboard facade ──
//
// Entry point for consumers. Wires the REST client, the repository and the
// push stream together and exposes the synchronization actions. Every
// action records its outcome in the repository's advisory `SyncStatus`
// and also returns the typed cause to the caller.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use devdash_api::DeviceClient;
use devdash_api::websocket::{Connector, TungsteniteConnector};

use crate::config::DashboardConfig;
use crate::convert::{NewDevice, devices_from_records};
use crate::error::CoreError;
use crate::model::{Device, DeviceId};
use crate::store::{DeviceRepository, DeviceSnapshot, SyncOperation, SyncStatus};
use crate::stream::DeviceStream;
use crate::stream_client::{StreamClient, StreamState};

// ── Dashboard ────────────────────────────────────────────────────

/// Cheaply cloneable handle to one dashboard session.
#[derive(Clone)]
pub struct Dashboard {
    inner: Arc<DashboardInner>,
}

struct DashboardInner {
    config: DashboardConfig,
    repo: Arc<DeviceRepository>,
    client: DeviceClient,
    stream: StreamClient,
    resync: Mutex<Option<ResyncTask>>,
}

struct ResyncTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl Dashboard {
    /// Create a dashboard using the WebSocket connector. Nothing touches the
    /// network until an action runs or [`connect_stream`](Self::connect_stream)
    /// is called.
    pub fn new(config: DashboardConfig) -> Result<Self, CoreError> {
        Self::with_connector(config, Arc::new(TungsteniteConnector))
    }

    /// Create a dashboard with a caller-supplied push transport.
    pub fn with_connector(
        config: DashboardConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, CoreError> {
        let client = DeviceClient::new(config.backend_url.clone(), &config.transport())?;
        let stream_url = client.stream_url(&config.subscriber_id)?;
        let repo = Arc::new(DeviceRepository::new());
        let stream = StreamClient::new(
            connector,
            stream_url,
            config.reconnect_delay,
            Arc::clone(&repo),
        );

        Ok(Self {
            inner: Arc::new(DashboardInner {
                config,
                repo,
                client,
                stream,
                resync: Mutex::new(None),
            }),
        })
    }

    pub fn config(&self) -> &DashboardConfig {
        &self.inner.config
    }

    pub fn repository(&self) -> &Arc<DeviceRepository> {
        &self.inner.repo
    }

    pub fn stream_client(&self) -> &StreamClient {
        &self.inner.stream
    }

    // ── Synchronization actions ──────────────────────────────────

    /// `GET /api/devices` and replace the collection.
    pub async fn fetch_all(&self) -> Result<(), CoreError> {
        let repo = &self.inner.repo;
        let _loading = repo.loading();

        match self.inner.client.list_devices().await {
            Ok(records) => {
                repo.replace_all(devices_from_records(records));
                repo.clear_error();
                Ok(())
            }
            Err(e) => Err(self.fail(SyncOperation::FetchAll, e.into())),
        }
    }

    /// `GET /api/devices/{id}` into the selected slot. On failure the
    /// previous selection is kept.
    pub async fn fetch_one(&self, id: &DeviceId) -> Result<(), CoreError> {
        let repo = &self.inner.repo;
        let _loading = repo.loading();

        match self.inner.client.get_device(id.as_str()).await {
            Ok(record) => {
                repo.set_selected(Some(Device::from(record)));
                repo.clear_error();
                Ok(())
            }
            Err(e) => Err(self.fail(SyncOperation::FetchOne, CoreError::for_device(id.as_str(), e))),
        }
    }

    /// `POST /api/devices`, then reconcile with a full fetch. The collection
    /// is never updated optimistically.
    ///
    /// The result reflects the registration only; a failed reconcile is
    /// recorded in the sync status by [`fetch_all`](Self::fetch_all).
    pub async fn register(&self, device: NewDevice) -> Result<(), CoreError> {
        let repo = &self.inner.repo;
        let _loading = repo.loading();
        let id = device.id.clone();

        if let Err(e) = self.inner.client.register_device(&device.into()).await {
            return Err(self.fail(SyncOperation::Register, e.into()));
        }
        repo.clear_error();
        info!(%id, "device registered");

        self.reconcile().await;
        Ok(())
    }

    /// `DELETE /api/devices/{id}`, then reconcile with a full fetch.
    pub async fn unregister(&self, id: &DeviceId) -> Result<(), CoreError> {
        let repo = &self.inner.repo;
        let _loading = repo.loading();

        if let Err(e) = self.inner.client.unregister_device(id.as_str()).await {
            return Err(self.fail(
                SyncOperation::Unregister,
                CoreError::for_device(id.as_str(), e),
            ));
        }
        repo.clear_error();
        info!(%id, "device unregistered");

        self.reconcile().await;
        Ok(())
    }

    /// `POST /api/devices/{id}/data`. Leaves `loading` alone.
    pub async fn push_data(&self, id: &DeviceId, data: &Value) -> Result<(), CoreError> {
        match self.inner.client.push_device_data(id.as_str(), data).await {
            Ok(()) => {
                self.inner.repo.clear_error();
                debug!(%id, "device data pushed");
                Ok(())
            }
            Err(e) => Err(self.fail(
                SyncOperation::PushData,
                CoreError::for_device(id.as_str(), e),
            )),
        }
    }

    /// Start the push stream (no-op if already running). With
    /// `resync_on_reconnect`, every re-established connection after the
    /// first also triggers [`fetch_all`](Self::fetch_all).
    pub fn connect_stream(&self) {
        self.inner.stream.start();

        if self.inner.config.resync_on_reconnect {
            let mut resync = self
                .inner
                .resync
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if resync.as_ref().is_none_or(|t| t.handle.is_finished()) {
                let cancel = CancellationToken::new();
                let handle = tokio::spawn(resync_task(
                    Arc::downgrade(&self.inner),
                    self.inner.stream.watch_connections(),
                    cancel.clone(),
                ));
                *resync = Some(ResyncTask { handle, cancel });
            }
        }
    }

    /// Stop the push stream and any resync watcher, disarming the pending
    /// reconnect timer.
    pub async fn shutdown(&self) {
        let resync = self
            .inner
            .resync
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(ResyncTask { handle, cancel }) = resync {
            cancel.cancel();
            let _ = handle.await;
        }
        self.inner.stream.shutdown().await;
    }

    // ── Reads (delegate to the repository) ───────────────────────

    pub fn query(&self) -> DeviceSnapshot {
        self.inner.repo.query()
    }

    pub fn selected(&self) -> Option<Arc<Device>> {
        self.inner.repo.selected()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.inner.repo.sync_status()
    }

    pub fn stream_connected(&self) -> bool {
        self.inner.repo.stream_connected()
    }

    pub fn stream_state(&self) -> StreamState {
        self.inner.stream.state()
    }

    pub fn devices(&self) -> DeviceStream {
        self.inner.repo.subscribe_devices()
    }

    // ── Helpers ──────────────────────────────────────────────────

    async fn reconcile(&self) {
        if let Err(e) = self.fetch_all().await {
            warn!(error = %e, "reconcile after write failed");
        }
    }

    fn fail(&self, op: SyncOperation, err: CoreError) -> CoreError {
        warn!(operation = %op, error = %err, "{}", op.failure_message());
        self.inner.repo.record_failure(op);
        err
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Re-fetch the collection after every reconnect. Holds the dashboard
/// weakly so an abandoned session can still be dropped.
async fn resync_task(
    inner: Weak<DashboardInner>,
    mut opened: watch::Receiver<u64>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            changed = opened.changed() => {
                if changed.is_err() {
                    break;
                }
                // the first open is seeded by the caller's initial fetch
                let connections = *opened.borrow_and_update();
                if connections < 2 {
                    continue;
                }
                let Some(inner) = inner.upgrade() else { break };
                debug!(connections, "stream reconnected, resyncing devices");
                let _ = Dashboard { inner }.fetch_all().await;
            }
        }
    }
}
