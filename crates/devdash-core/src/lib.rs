// devdash-core: Reactive device state between devdash-api and consumers (CLI).

pub mod config;
pub mod convert;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod store;
pub mod stream;
pub mod stream_client;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DashboardConfig, TlsVerification};
pub use convert::NewDevice;
pub use dashboard::Dashboard;
pub use error::CoreError;
pub use store::{DeviceRepository, DeviceSnapshot, SyncOperation, SyncStatus};
pub use stream::{DeviceFilter, DeviceStream};
pub use stream_client::{StreamClient, StreamState};

// Re-export model types at the crate root for ergonomics.
pub use model::{Device, DeviceId, DeviceStatus};
