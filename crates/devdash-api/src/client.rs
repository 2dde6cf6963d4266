// Device registry HTTP client
//
// Wraps `reqwest::Client` with backend URL construction and status/body
// handling. Endpoint methods live in `devices.rs` as inherent methods to
// keep this module focused on transport mechanics.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Raw HTTP client for the device registry backend.
///
/// All paths are resolved against `base_url`, so the backend may be mounted
/// under a prefix behind a reverse proxy (`https://host/registry/`).
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DeviceClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(http, base_url)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Result<Self, Error> {
        if base_url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(base_url.to_string()));
        }
        Ok(Self { http, base_url })
    }

    /// Convenience constructor for tests and scripts: parse `base` and use
    /// the given client.
    pub fn from_reqwest(base: &str, http: reqwest::Client) -> Result<Self, Error> {
        Self::with_client(http, Url::parse(base)?)
    }

    /// The backend base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// Build `{base}/{segments...}`, percent-encoding each segment.
    ///
    /// Device IDs are opaque, so `a/b` must stay one segment.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// URL of the push stream for the given subscriber:
    /// `ws(s)://{host}{prefix}/ws?device_id={subscriber}`.
    pub fn stream_url(&self, subscriber_id: &str) -> Result<Url, Error> {
        let mut url = self.endpoint(&["ws"])?;
        let scheme = match url.scheme() {
            "https" | "wss" => "wss",
            _ => "ws",
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::InvalidBaseUrl(self.base_url.to_string()))?;
        url.query_pairs_mut()
            .clear()
            .append_pair("device_id", subscriber_id);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Send a GET request and decode the JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);

        let resp = self.http.get(url).send().await.map_err(Error::Transport)?;
        let body = Self::check_status(resp).await?;

        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }

    /// Send a POST request with JSON body; only the status matters.
    pub(crate) async fn post_json(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", url);

        let resp = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(Error::Transport)?;

        Self::check_status(resp).await.map(drop)
    }

    /// Send a DELETE request; only the status matters.
    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);

        let resp = self.http.delete(url).send().await.map_err(Error::Transport)?;

        Self::check_status(resp).await.map(drop)
    }

    /// Read the body, turning non-2xx responses into [`Error::Http`].
    async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await.map_err(Error::Transport)?;

        if status.is_success() {
            Ok(body)
        } else {
            debug!(status = status.as_u16(), "backend rejected request");
            Err(Error::Http {
                status: status.as_u16(),
                body: body.trim().to_owned(),
            })
        }
    }
}
