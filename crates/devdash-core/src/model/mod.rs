// ── Domain model ──
//
// Canonical representation of a registry device, decoupled from the
// backend's wire format (see `convert.rs`).

pub mod device;

pub use device::{Device, DeviceId, DeviceStatus};
