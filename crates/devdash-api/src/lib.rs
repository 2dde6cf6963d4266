// devdash-api: Async Rust client for the device registry backend (REST + event stream)

pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::DeviceClient;
pub use error::Error;
pub use models::{DeviceRecord, DeviceRegistration, StreamMessage};
