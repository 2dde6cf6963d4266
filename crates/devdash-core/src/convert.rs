// ── API-to-domain type conversions ──
//
// Bridges raw `devdash_api` wire types into canonical `devdash_core::model`
// types. Typed fields are parsed leniently: an unparseable timestamp or an
// unexpected status string degrades to `None`/`Unknown` instead of rejecting
// the whole device.

use chrono::{DateTime, Utc};

use devdash_api::{DeviceRecord, DeviceRegistration};

use crate::model::{Device, DeviceId, DeviceStatus};

// ── Helpers ────────────────────────────────────────────────────────

/// Parse an RFC 3339 timestamp. The registry reports Go's zero time
/// (`0001-01-01T00:00:00Z`) for devices that never reported; treat it as absent.
fn parse_datetime(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .filter(|dt| dt.timestamp() > 0)
}

fn parse_status(raw: Option<&str>) -> DeviceStatus {
    raw.and_then(|s| s.parse().ok()).unwrap_or_default()
}

// ── Device ─────────────────────────────────────────────────────────

impl From<DeviceRecord> for Device {
    fn from(record: DeviceRecord) -> Self {
        Self {
            id: DeviceId::from(record.id),
            connected: record.connected,
            status: parse_status(record.status.as_deref()),
            last_seen: parse_datetime(record.last_seen.as_deref()),
            name: record.name,
            device_type: record.device_type,
            attributes: record.extra,
        }
    }
}

/// Convert a batch of wire records, preserving order.
pub(crate) fn devices_from_records(records: Vec<DeviceRecord>) -> Vec<Device> {
    records.into_iter().map(Device::from).collect()
}

// ── Registration ───────────────────────────────────────────────────

/// Input for [`Dashboard::register`](crate::Dashboard::register).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub id: DeviceId,
    pub name: String,
    pub device_type: String,
}

impl From<NewDevice> for DeviceRegistration {
    fn from(new: NewDevice) -> Self {
        Self {
            id: new.id.as_str().to_owned(),
            name: new.name,
            device_type: new.device_type,
        }
    }
}
