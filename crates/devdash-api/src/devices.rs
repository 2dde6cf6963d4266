// Device registry endpoints
//
// Listing, detail lookup, registration, removal, and telemetry push.

use tracing::debug;

use crate::client::DeviceClient;
use crate::error::Error;
use crate::models::{DeviceRecord, DeviceRegistration};

impl DeviceClient {
    /// List all registered devices.
    ///
    /// `GET /api/devices`
    pub async fn list_devices(&self) -> Result<Vec<DeviceRecord>, Error> {
        let url = self.endpoint(&["api", "devices"])?;
        debug!("listing devices");
        self.get_json(url).await
    }

    /// Get a single device by ID.
    ///
    /// `GET /api/devices/{id}`. An unknown ID surfaces as [`Error::Http`]
    /// with status 404.
    pub async fn get_device(&self, id: &str) -> Result<DeviceRecord, Error> {
        let url = self.endpoint(&["api", "devices", id])?;
        debug!(id, "fetching device");
        self.get_json(url).await
    }

    /// Register a new device (or refresh an existing one).
    ///
    /// `POST /api/devices`
    pub async fn register_device(&self, registration: &DeviceRegistration) -> Result<(), Error> {
        let url = self.endpoint(&["api", "devices"])?;
        debug!(id = %registration.id, "registering device");
        self.post_json(url, registration).await
    }

    /// Remove a device from the registry.
    ///
    /// `DELETE /api/devices/{id}`
    pub async fn unregister_device(&self, id: &str) -> Result<(), Error> {
        let url = self.endpoint(&["api", "devices", id])?;
        debug!(id, "unregistering device");
        self.delete(url).await
    }

    /// Push a telemetry/update payload for a device.
    ///
    /// `POST /api/devices/{id}/data` with an arbitrary JSON body.
    pub async fn push_device_data(&self, id: &str, data: &serde_json::Value) -> Result<(), Error> {
        let url = self.endpoint(&["api", "devices", id, "data"])?;
        debug!(id, "pushing device data");
        self.post_json(url, data).await
    }
}
