// d42-api: Async Rust client for the Device42 inventory REST API

pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod passwords;
pub mod transport;

pub use client::Device42Client;
pub use error::Error;
pub use models::{
    ApiResponse, CustomFieldRecord, DeviceRecord, LooseValue, PasswordList, PasswordRecord,
    RemoteId, Scalar,
};
pub use passwords::PasswordFields;
pub use transport::{BasicAuth, TlsMode, TransportConfig};
