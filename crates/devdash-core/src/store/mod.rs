// ── Reactive device store ──
//
// Ordered device storage and advisory status with push-based change
// notification.

mod collection;
mod repository;
mod status;

pub use collection::DeviceSnapshot;
pub use repository::DeviceRepository;
pub use status::{SyncOperation, SyncStatus};
