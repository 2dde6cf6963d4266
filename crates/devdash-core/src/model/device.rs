// ── Device domain types ──

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── DeviceId ────────────────────────────────────────────────────────

/// Opaque, immutable device identifier assigned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for DeviceId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(s))
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for DeviceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// Lets keyed collections be queried with a plain `&str`.
impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// ── DeviceStatus ────────────────────────────────────────────────────

/// Health reported by the registry, independent of the `connected` flag.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
    #[default]
    Unknown,
}

// ── Device ──────────────────────────────────────────────────────────

/// A managed remote endpoint.
///
/// Identity is `id`; every other field may change between snapshots.
/// Fields the registry sends that have no typed slot are kept verbatim in
/// `attributes`, so nothing reported by a device is dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub connected: bool,
    pub name: Option<String>,
    pub device_type: Option<String>,
    pub status: DeviceStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub attributes: Map<String, Value>,
}

impl Device {
    /// Minimal device with no reported attributes.
    pub fn new(id: impl Into<DeviceId>, connected: bool) -> Self {
        Self {
            id: id.into(),
            connected,
            name: None,
            device_type: None,
            status: DeviceStatus::Unknown,
            last_seen: None,
            attributes: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Display label: the name when present, otherwise the ID.
    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.is_empty())
            .unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn device_id_round_trips_as_plain_string() {
        let id = DeviceId::new("sensor-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sensor-7\"");
        assert_eq!(id.to_string(), "sensor-7");
    }

    #[test]
    fn status_parses_lowercase() {
        assert_eq!("online".parse::<DeviceStatus>().unwrap(), DeviceStatus::Online);
        assert_eq!(DeviceStatus::Error.to_string(), "error");
        assert!("rebooting".parse::<DeviceStatus>().is_err());
    }

    #[test]
    fn label_falls_back_to_id() {
        let bare = Device::new("a", true);
        assert_eq!(bare.label(), "a");

        let named = Device::new("a", true).with_name("Boiler");
        assert_eq!(named.label(), "Boiler");

        let blank = Device::new("a", true).with_name("");
        assert_eq!(blank.label(), "a");
    }
}
