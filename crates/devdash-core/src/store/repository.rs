// ── Device repository ──
//
// The single owner of all synchronized state. Pull actions and the push
// stream both write through the methods below; every field is private and
// each mutation is applied atomically and broadcast to subscribers via
// `watch` channels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tracing::debug;

use super::collection::{DeviceCollection, DeviceSnapshot};
use super::status::{SyncOperation, SyncStatus};
use crate::model::Device;
use crate::stream::DeviceStream;

/// Central reactive store for the device dashboard.
pub struct DeviceRepository {
    devices: DeviceCollection,
    selected: watch::Sender<Option<Arc<Device>>>,
    sync_status: watch::Sender<SyncStatus>,
    stream_connected: watch::Sender<bool>,
    last_snapshot_at: watch::Sender<Option<DateTime<Utc>>>,
}

impl DeviceRepository {
    pub fn new() -> Self {
        let (selected, _) = watch::channel(None);
        let (sync_status, _) = watch::channel(SyncStatus::default());
        let (stream_connected, _) = watch::channel(false);
        let (last_snapshot_at, _) = watch::channel(None);

        Self {
            devices: DeviceCollection::new(),
            selected,
            sync_status,
            stream_connected,
            last_snapshot_at,
        }
    }

    // ── Collection mutations ─────────────────────────────────────────

    /// Replace the entire collection (full fetch or stream snapshot).
    ///
    /// Duplicate IDs in `devices` collapse to one entry: the last value wins
    /// and keeps the position of the first occurrence.
    pub fn replace_all(&self, devices: impl IntoIterator<Item = Device>) {
        // stamp first so subscribers woken by the collection see the new time
        self.last_snapshot_at.send_replace(Some(Utc::now()));
        let len = self.devices.replace_all(devices);
        debug!(devices = len, "collection replaced");
    }

    /// Replace the device with the same ID in place.
    ///
    /// An unknown ID leaves the collection untouched and returns `false`.
    pub fn upsert(&self, device: Device) -> bool {
        let id = device.id.clone();
        let applied = self.devices.upsert(device);
        if !applied {
            debug!(%id, "ignoring update for unknown device");
        }
        applied
    }

    pub fn set_selected(&self, device: Option<Device>) {
        self.selected.send_replace(device.map(Arc::new));
    }

    // ── Status mutations ─────────────────────────────────────────────

    pub fn set_loading(&self, loading: bool) {
        self.sync_status.send_if_modified(|s| {
            let changed = s.loading != loading;
            s.loading = loading;
            changed
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.sync_status.send_if_modified(|s| {
            if s.error.as_deref() == Some(message.as_str()) {
                return false;
            }
            s.error = Some(message);
            true
        });
    }

    /// Record the fixed failure message for `op`.
    pub fn record_failure(&self, op: SyncOperation) {
        self.set_error(op.failure_message());
    }

    pub fn clear_error(&self) {
        self.sync_status.send_if_modified(|s| s.error.take().is_some());
    }

    pub fn set_stream_connected(&self, connected: bool) {
        self.stream_connected.send_if_modified(|c| {
            let changed = *c != connected;
            *c = connected;
            changed
        });
    }

    /// Mark loading for the lifetime of the returned guard.
    pub(crate) fn loading(&self) -> LoadingGuard<'_> {
        self.set_loading(true);
        LoadingGuard { repo: self }
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Point-in-time view of the collection for `by_id`/`online`/`offline`.
    pub fn query(&self) -> DeviceSnapshot {
        self.devices.snapshot()
    }

    pub fn selected(&self) -> Option<Arc<Device>> {
        self.selected.borrow().clone()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.sync_status.borrow().clone()
    }

    pub fn stream_connected(&self) -> bool {
        *self.stream_connected.borrow()
    }

    /// When the collection was last replaced wholesale.
    pub fn last_snapshot_at(&self) -> Option<DateTime<Utc>> {
        *self.last_snapshot_at.borrow()
    }

    pub fn snapshot_age(&self) -> Option<chrono::Duration> {
        self.last_snapshot_at().map(|t| Utc::now() - t)
    }

    // ── Subscriptions ────────────────────────────────────────────────

    pub fn subscribe_devices(&self) -> DeviceStream {
        DeviceStream::new(self.devices.subscribe())
    }

    pub fn watch_selected(&self) -> watch::Receiver<Option<Arc<Device>>> {
        self.selected.subscribe()
    }

    pub fn watch_sync_status(&self) -> watch::Receiver<SyncStatus> {
        self.sync_status.subscribe()
    }

    pub fn watch_stream_connected(&self) -> watch::Receiver<bool> {
        self.stream_connected.subscribe()
    }
}

impl Default for DeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

// ── LoadingGuard ────────────────────────────────────────────────────

/// Clears `loading` when dropped, including when the owning future is
/// cancelled mid-request.
pub(crate) struct LoadingGuard<'a> {
    repo: &'a DeviceRepository,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.repo.set_loading(false);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty_and_disconnected() {
        let repo = DeviceRepository::new();
        assert!(repo.query().is_empty());
        assert!(repo.selected().is_none());
        assert_eq!(repo.sync_status(), SyncStatus::default());
        assert!(!repo.stream_connected());
        assert!(repo.last_snapshot_at().is_none());
        assert!(repo.snapshot_age().is_none());
    }

    #[test]
    fn replace_all_stamps_snapshot_time() {
        let repo = DeviceRepository::new();
        repo.replace_all([Device::new("a", true)]);
        assert!(repo.last_snapshot_at().is_some());
        assert!(repo.snapshot_age().unwrap() >= chrono::Duration::zero());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn collection_subscribers_observe_the_new_snapshot_time() {
        let repo = Arc::new(DeviceRepository::new());
        let mut devices = repo.subscribe_devices();

        let watcher = tokio::spawn({
            let repo = Arc::clone(&repo);
            async move {
                let snap = devices.changed().await.unwrap();
                (snap.len(), repo.last_snapshot_at())
            }
        });

        let before = Utc::now();
        repo.replace_all([Device::new("a", true)]);

        let (len, stamp) = watcher.await.unwrap();
        assert_eq!(len, 1);
        assert!(stamp.is_some_and(|t| t >= before));
    }

    #[test]
    fn upsert_does_not_touch_snapshot_time() {
        let repo = DeviceRepository::new();
        assert!(!repo.upsert(Device::new("a", true)));
        assert!(repo.last_snapshot_at().is_none());
    }

    #[test]
    fn selected_is_decoupled_from_collection() {
        let repo = DeviceRepository::new();
        repo.replace_all([Device::new("a", true)]);
        repo.set_selected(Some(Device::new("a", true)));

        repo.upsert(Device::new("a", false));

        assert!(repo.selected().unwrap().connected);
        assert!(!repo.query().by_id("a").unwrap().connected);
    }

    #[test]
    fn error_is_last_writer_wins_and_clearable() {
        let repo = DeviceRepository::new();
        repo.record_failure(SyncOperation::FetchAll);
        repo.record_failure(SyncOperation::Register);
        assert_eq!(
            repo.sync_status().error.as_deref(),
            Some("Failed to register device")
        );

        repo.clear_error();
        assert!(repo.sync_status().error.is_none());
    }

    #[test]
    fn loading_guard_clears_on_drop() {
        let repo = DeviceRepository::new();
        {
            let _guard = repo.loading();
            assert!(repo.sync_status().loading);
        }
        assert!(!repo.sync_status().loading);
    }

    #[test]
    fn redundant_status_writes_do_not_notify() {
        let repo = DeviceRepository::new();
        let mut status = repo.watch_sync_status();
        let mut connected = repo.watch_stream_connected();

        repo.set_loading(false);
        repo.clear_error();
        repo.set_stream_connected(false);

        assert!(!status.has_changed().unwrap());
        assert!(!connected.has_changed().unwrap());

        repo.set_stream_connected(true);
        assert!(connected.has_changed().unwrap());
        assert!(*connected.borrow_and_update());
    }
}
