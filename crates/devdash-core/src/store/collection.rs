// ── Reactive device collection ──
//
// Ordered, keyed device storage published through a `watch` channel.
// Every mutation swaps in a new snapshot under the channel lock, so readers
// always observe a complete collection, never a half-applied update.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::watch;

use crate::model::{Device, DeviceId};
use crate::stream::DeviceFilter;

type DeviceMap = IndexMap<DeviceId, Arc<Device>>;

// ── DeviceSnapshot ──────────────────────────────────────────────────

/// Immutable point-in-time view of the device collection.
///
/// Cloning is an `Arc` bump. Derived views (`online`, `offline`, filters)
/// are computed from this one snapshot on demand, so they always partition
/// exactly what `all` returns.
#[derive(Debug, Clone, Default)]
pub struct DeviceSnapshot {
    devices: Arc<DeviceMap>,
}

impl DeviceSnapshot {
    /// Look up a device by ID.
    pub fn by_id(&self, id: &str) -> Option<&Arc<Device>> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// All devices in collection order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<Device>> {
        self.devices.values()
    }

    /// Devices whose `connected` flag is set, in collection order.
    pub fn online(&self) -> Vec<Arc<Device>> {
        self.filter(&DeviceFilter::Online)
    }

    /// Devices whose `connected` flag is clear, in collection order.
    pub fn offline(&self) -> Vec<Arc<Device>> {
        self.filter(&DeviceFilter::Offline)
    }

    pub fn filter(&self, filter: &DeviceFilter) -> Vec<Arc<Device>> {
        self.devices
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &DeviceId> {
        self.devices.keys()
    }

    /// Owned copy of every device, in collection order.
    pub fn to_vec(&self) -> Vec<Device> {
        self.devices.values().map(|d| Device::clone(d)).collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

// ── DeviceCollection ────────────────────────────────────────────────

/// Write side of the collection. Owned by the repository; nothing else
/// holds the sender.
pub(crate) struct DeviceCollection {
    snapshot: watch::Sender<DeviceSnapshot>,
}

impl DeviceCollection {
    pub(crate) fn new() -> Self {
        let (snapshot, _) = watch::channel(DeviceSnapshot::default());
        Self { snapshot }
    }

    /// Replace the whole collection. A repeated ID keeps the position of its
    /// first occurrence and the value of its last. Returns the resulting size.
    pub(crate) fn replace_all(&self, devices: impl IntoIterator<Item = Device>) -> usize {
        let mut map = DeviceMap::new();
        for device in devices {
            map.insert(device.id.clone(), Arc::new(device));
        }
        let len = map.len();
        // `send_replace` updates unconditionally, even with zero receivers.
        self.snapshot.send_replace(DeviceSnapshot {
            devices: Arc::new(map),
        });
        len
    }

    /// Replace an existing device in place. Returns `false` (and leaves the
    /// collection untouched) if the ID is unknown.
    pub(crate) fn upsert(&self, device: Device) -> bool {
        self.snapshot.send_if_modified(|snap| {
            if !snap.devices.contains_key(&device.id) {
                return false;
            }
            let map = Arc::make_mut(&mut snap.devices);
            if let Some(slot) = map.get_mut(&device.id) {
                *slot = Arc::new(device);
            }
            true
        })
    }

    /// Current snapshot (cheap `Arc` clone).
    pub(crate) fn snapshot(&self) -> DeviceSnapshot {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<DeviceSnapshot> {
        self.snapshot.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ids(snap: &DeviceSnapshot) -> Vec<&str> {
        snap.ids().map(DeviceId::as_str).collect()
    }

    #[test]
    fn replace_all_keeps_input_order() {
        let col = DeviceCollection::new();
        col.replace_all([Device::new("b", false), Device::new("a", true)]);
        assert_eq!(ids(&col.snapshot()), vec!["b", "a"]);
    }

    #[test]
    fn duplicate_ids_last_wins_at_first_position() {
        let col = DeviceCollection::new();
        let len = col.replace_all([
            Device::new("x", false),
            Device::new("y", true),
            Device::new("x", true),
        ]);

        let snap = col.snapshot();
        assert_eq!(len, 2);
        assert_eq!(ids(&snap), vec!["x", "y"]);
        assert!(snap.by_id("x").unwrap().connected);
    }

    #[test]
    fn upsert_replaces_in_place() {
        let col = DeviceCollection::new();
        col.replace_all([
            Device::new("a", true),
            Device::new("b", true),
            Device::new("c", true),
        ]);

        assert!(col.upsert(Device::new("b", false).with_name("renamed")));

        let snap = col.snapshot();
        assert_eq!(ids(&snap), vec!["a", "b", "c"]);
        assert_eq!(snap.by_id("b").unwrap().name.as_deref(), Some("renamed"));
        assert!(!snap.by_id("b").unwrap().connected);
    }

    #[test]
    fn upsert_unknown_id_is_a_no_op() {
        let col = DeviceCollection::new();
        col.replace_all([Device::new("a", true)]);
        let mut rx = col.subscribe();
        rx.mark_unchanged();

        assert!(!col.upsert(Device::new("ghost", true)));
        assert_eq!(ids(&col.snapshot()), vec!["a"]);
        assert!(!rx.has_changed().unwrap());
    }

    #[test]
    fn snapshots_are_isolated_from_later_writes() {
        let col = DeviceCollection::new();
        col.replace_all([Device::new("a", true)]);
        let before = col.snapshot();

        col.upsert(Device::new("a", false));

        assert!(before.by_id("a").unwrap().connected);
        assert!(!col.snapshot().by_id("a").unwrap().connected);
    }

    #[test]
    fn subscribers_see_replacement() {
        let col = DeviceCollection::new();
        let mut rx = col.subscribe();
        col.replace_all([Device::new("c", true)]);
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().len(), 1);
    }

    // ── Properties ──────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Replace(Vec<(u8, bool)>),
        Upsert(u8, bool),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            prop::collection::vec((0u8..8, any::<bool>()), 0..12).prop_map(Op::Replace),
            (0u8..8, any::<bool>()).prop_map(|(id, c)| Op::Upsert(id, c)),
        ]
    }

    fn device(id: u8, connected: bool) -> Device {
        Device::new(format!("d{id}"), connected)
    }

    proptest! {
        #[test]
        fn never_holds_duplicate_ids(ops in prop::collection::vec(op(), 0..24)) {
            let col = DeviceCollection::new();
            for op in ops {
                match op {
                    Op::Replace(items) => {
                        col.replace_all(items.into_iter().map(|(id, c)| device(id, c)));
                    }
                    Op::Upsert(id, c) => {
                        col.upsert(device(id, c));
                    }
                }
                let snap = col.snapshot();
                let mut seen: Vec<&str> = ids(&snap);
                let total = seen.len();
                seen.sort_unstable();
                seen.dedup();
                prop_assert_eq!(seen.len(), total);
            }
        }

        #[test]
        fn online_and_offline_partition_the_collection(
            items in prop::collection::vec((0u8..16, any::<bool>()), 0..20),
            upserts in prop::collection::vec((0u8..16, any::<bool>()), 0..8),
        ) {
            let col = DeviceCollection::new();
            col.replace_all(items.into_iter().map(|(id, c)| device(id, c)));
            for (id, c) in upserts {
                col.upsert(device(id, c));
            }

            let snap = col.snapshot();
            let online = snap.online();
            let offline = snap.offline();

            prop_assert!(online.iter().all(|d| d.connected));
            prop_assert!(offline.iter().all(|d| !d.connected));
            prop_assert_eq!(online.len() + offline.len(), snap.len());
            for d in snap.all() {
                let in_online = online.iter().any(|o| o.id == d.id);
                let in_offline = offline.iter().any(|o| o.id == d.id);
                prop_assert!(in_online != in_offline);
            }
        }

        #[test]
        fn by_id_reflects_last_replacement(
            items in prop::collection::vec((0u8..8, any::<bool>()), 0..12),
        ) {
            let col = DeviceCollection::new();
            col.replace_all([device(200, true)]);
            col.replace_all(items.iter().map(|&(id, c)| device(id, c)));

            let snap = col.snapshot();
            prop_assert!(snap.by_id("d200").is_none());
            for id in 0u8..8 {
                let key = format!("d{id}");
                let expected = items.iter().rev().find(|(i, _)| *i == id).map(|&(_, c)| c);
                prop_assert_eq!(snap.by_id(&key).map(|d| d.connected), expected);
            }
        }
    }
}
