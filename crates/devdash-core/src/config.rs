// ── Runtime connection configuration ──
//
// These types describe *how* to reach the device backend. They never touch
// disk: the CLI (or any embedding application) constructs a
// `DashboardConfig` and hands it to `Dashboard::new`.

use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use devdash_api::transport::{TlsMode, TransportConfig};

/// Subscriber identity sent on the push channel (`/ws?device_id=...`).
pub const DEFAULT_SUBSCRIBER_ID: &str = "dashboard";

/// Fixed delay between a stream close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs on a lab backend).
    DangerAcceptInvalid,
}

/// Configuration for one dashboard session against one backend.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    /// Backend base URL (e.g., `http://localhost:8080`).
    pub backend_url: Url,
    /// Identity announced on the push channel.
    pub subscriber_id: String,
    /// Delay before reopening a closed push channel.
    pub reconnect_delay: Duration,
    /// Request timeout for API calls.
    pub timeout: Duration,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Re-fetch the full device list whenever the push channel reconnects.
    /// Off by default. Callers seed the list with `fetch_all` when they
    /// connect; pushed snapshots keep it current while the stream is up.
    pub resync_on_reconnect: bool,
}

impl DashboardConfig {
    /// Defaults for the given backend.
    pub fn new(backend_url: Url) -> Self {
        Self {
            backend_url,
            subscriber_id: DEFAULT_SUBSCRIBER_ID.to_owned(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
            resync_on_reconnect: false,
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}
