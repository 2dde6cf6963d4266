// ── Advisory sync status ──

/// Loading/error state shared by every pull operation.
///
/// `loading` is a flag, not a counter: when two operations overlap, the
/// first to finish clears it while the other is still in flight. `error` is
/// last-writer-wins across all operations and is cleared by the next
/// success of any kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub loading: bool,
    pub error: Option<String>,
}

/// Operation kinds that can record a failure in [`SyncStatus::error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SyncOperation {
    FetchAll,
    FetchOne,
    Register,
    Unregister,
    PushData,
    Stream,
}

impl SyncOperation {
    /// Fixed, human-readable message recorded when this operation fails.
    pub fn failure_message(self) -> &'static str {
        match self {
            Self::FetchAll => "Failed to fetch devices",
            Self::FetchOne => "Failed to fetch device details",
            Self::Register => "Failed to register device",
            Self::Unregister => "Failed to unregister device",
            Self::PushData => "Failed to update device data",
            Self::Stream => "WebSocket connection error",
        }
    }
}
