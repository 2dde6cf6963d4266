// Backend wire types
//
// Models for the device registry's JSON API and its event stream. Fields use
// `#[serde(default)]` liberally because the backend omits empty values
// (`omitempty`) and attaches free-form telemetry to every device.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Optional text field that reads any non-string value as `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        _ => None,
    })
}

// ── Device ───────────────────────────────────────────────────────────

/// Device object as returned by `GET /api/devices` and carried in
/// `device_list` stream messages.
///
/// The well-known fields are modelled explicitly; everything else
/// (telemetry, attributes, timestamps) lands in `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    #[serde(default)]
    pub connected: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub device_type: Option<String>,
    /// `"online"`, `"offline"` or `"error"`.
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    /// RFC 3339 timestamp of the last report.
    #[serde(default, deserialize_with = "lenient_string")]
    pub last_seen: Option<String>,
    /// Catch-all for device-reported fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Body of `POST /api/devices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRegistration {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub device_type: String,
}

// ── Stream messages ──────────────────────────────────────────────────

/// Inbound message on the `/ws` event stream, keyed by its `type` field.
///
/// Only [`DeviceList`](Self::DeviceList) carries state for subscribers.
/// The other known types are device-facing traffic relayed by the hub;
/// they are decoded so logs can tell them apart from garbage.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamMessage {
    /// Full snapshot of the registry. The backend omits `devices`
    /// entirely when the registry is empty.
    DeviceList {
        #[serde(default)]
        devices: Vec<DeviceRecord>,
    },
    DeviceData {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        data: Map<String, Value>,
    },
    Command {
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        command: Option<String>,
    },
    DeviceRegister {
        #[serde(default)]
        device_id: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl StreamMessage {
    /// Decode a text frame.
    ///
    /// Fails only when the frame is not JSON at all. Valid JSON that does
    /// not match any known message shape decodes as [`Unknown`](Self::Unknown).
    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        match Self::deserialize(&value) {
            Ok(message) => Ok(message),
            Err(e) => {
                match value.get("type").and_then(Value::as_str) {
                    Some(kind @ ("device_list" | "device_data" | "command" | "device_register")) => {
                        tracing::warn!(kind, error = %e, "malformed stream message dropped");
                    }
                    _ => tracing::debug!(error = %e, "unrecognized stream message shape"),
                }
                Ok(Self::Unknown)
            }
        }
    }

    /// The `type` tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceList { .. } => "device_list",
            Self::DeviceData { .. } => "device_data",
            Self::Command { .. } => "command",
            Self::DeviceRegister { .. } => "device_register",
            Self::Unknown => "unknown",
        }
    }
}
