// Device endpoints
//
// The device surface mixes an unversioned create path with versioned
// read/delete/custom-field paths. Custom fields are written by device name,
// everything else by numeric id.

use tracing::debug;

use crate::client::Device42Client;
use crate::error::Error;
use crate::models::{DeviceRecord, RemoteId};

/// Create-or-update by name.
pub const DEVICE_PATH: &str = "device/";
/// Bulk and single custom-field writes.
pub const DEVICE_CUSTOM_FIELD_PATH: &str = "1.0/device/custom_field/";

impl Device42Client {
    /// Create a device and return its assigned id.
    ///
    /// `POST device/` with `name`, `type`
    pub async fn create_device(&self, name: &str, device_type: &str) -> Result<RemoteId, Error> {
        debug!(name, device_type, "creating device");
        self.create(DEVICE_PATH, &[("name", name), ("type", device_type)])
            .await
    }

    /// Rewrite the fixed-schema fields of an existing device.
    ///
    /// The create endpoint matches on `name`, so posting again updates in place.
    pub async fn upsert_device(&self, name: &str, device_type: &str) -> Result<(), Error> {
        debug!(name, device_type, "updating device");
        self.upsert(DEVICE_PATH, &[("name", name), ("type", device_type)])
            .await?;
        Ok(())
    }

    /// Fetch a device by id.
    ///
    /// `GET 1.0/devices/id/{id}/`
    pub async fn get_device(&self, id: RemoteId) -> Result<DeviceRecord, Error> {
        self.read(&format!("1.0/devices/id/{id}/"), &[]).await
    }

    /// Write all custom fields of a device in one call.
    ///
    /// `PUT 1.0/device/custom_field/` with `name`, `bulk_fields`
    pub async fn set_device_custom_fields(
        &self,
        name: &str,
        bulk_fields: &str,
    ) -> Result<(), Error> {
        debug!(name, "writing device custom fields (bulk)");
        self.update(
            DEVICE_CUSTOM_FIELD_PATH,
            &[("name", name), ("bulk_fields", bulk_fields)],
        )
        .await?;
        Ok(())
    }

    /// Write a single custom field of a device.
    ///
    /// `PUT 1.0/device/custom_field/` with `name`, `key`, `value`
    pub async fn set_device_custom_field(
        &self,
        name: &str,
        key: &str,
        value: &str,
    ) -> Result<(), Error> {
        debug!(name, key, "writing device custom field");
        self.update(
            DEVICE_CUSTOM_FIELD_PATH,
            &[("name", name), ("key", key), ("value", value)],
        )
        .await?;
        Ok(())
    }

    /// Delete a device.
    ///
    /// `DELETE 1.0/devices/{id}/`
    pub async fn delete_device(&self, id: RemoteId) -> Result<(), Error> {
        debug!(%id, "deleting device");
        self.delete(&format!("1.0/devices/{id}/")).await?;
        Ok(())
    }
}
