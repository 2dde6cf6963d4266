// ── Filter predicates for device snapshots ──
//
// Used by consumers to narrow a snapshot without re-querying the backend.

use crate::model::{Device, DeviceStatus};

/// Filter predicate for device collections.
pub enum DeviceFilter {
    All,
    /// `connected == true`.
    Online,
    /// `connected == false`.
    Offline,
    ByStatus(DeviceStatus),
    ByType(String),
    Custom(Box<dyn Fn(&Device) -> bool + Send + Sync>),
}

impl DeviceFilter {
    pub fn matches(&self, device: &Device) -> bool {
        match self {
            Self::All => true,
            Self::Online => device.connected,
            Self::Offline => !device.connected,
            Self::ByStatus(status) => device.status == *status,
            Self::ByType(ty) => device.device_type.as_deref() == Some(ty.as_str()),
            Self::Custom(f) => f(device),
        }
    }
}
