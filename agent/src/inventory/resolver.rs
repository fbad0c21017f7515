//! Inventory resolvers

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use crate::errors::ZtpError;
use crate::inventory::model_table::ModelTable;
use crate::inventory::{InventoryApi, InventoryResolver};
use crate::models::device::DeviceIdentity;
use crate::models::inventory::{DeviceRecord, InventoryRecord};

/// Find the device by serial and check its declared model.
///
/// Only the first search result is used.
async fn lookup_device(
    api: &dyn InventoryApi,
    identity: &DeviceIdentity,
) -> Result<DeviceRecord, ZtpError> {
    info!(
        "Searching for Device in Netbox using Serial Number: {}",
        identity.serial
    );

    let device = api
        .find_devices_by_serial(&identity.serial)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ZtpError::NotFound(format!(
                "no device with serial number {}. Verify that this device's serial number is in Netbox.",
                identity.serial
            ))
        })?;

    let declared_model = device.device_type.model.clone().unwrap_or_default();
    info!("Device With This Serial Number Located in Netbox");
    info!("Device Name: {}", device.name.as_deref().unwrap_or("<unnamed>"));
    info!("Netbox Device ID: {}", device.id);
    info!("Device Model: {}", declared_model);

    if !declared_model.eq_ignore_ascii_case(&identity.model) {
        return Err(ZtpError::ModelMismatch {
            declared: declared_model,
            actual: identity.model.clone(),
        });
    }

    Ok(device)
}

fn log_directive(record: &InventoryRecord) -> Result<(), ZtpError> {
    let directive = record.directive()?;
    info!(
        "Located Target Version for this model: {}",
        directive.target_version
    );
    Ok(())
}

/// Directives from the device's configuration context
pub struct ConfigContextResolver {
    api: Arc<dyn InventoryApi>,
}

impl ConfigContextResolver {
    pub fn new(api: Arc<dyn InventoryApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl InventoryResolver for ConfigContextResolver {
    async fn resolve(&self, identity: &DeviceIdentity) -> Result<InventoryRecord, ZtpError> {
        let device = lookup_device(self.api.as_ref(), identity).await?;
        let context = &device.config_context;
        let text = |key: &str| context.get(key).and_then(Value::as_str).map(String::from);
        let flag = |key: &str| context.get(key) == Some(&Value::Bool(true));

        let record = InventoryRecord {
            device_name: device.name.clone().unwrap_or_default(),
            device_id: device.id.clone(),
            declared_model: device.device_type.model.clone().unwrap_or_default(),
            target_package: text("pkg"),
            target_version: text("target_version"),
            is_vm_host: flag("vmhost"),
            force_host_mode: flag("force_host"),
        };

        log_directive(&record)?;
        Ok(record)
    }
}

/// Directives from a local model table, device lookup from the inventory
pub struct ModelTableResolver {
    api: Arc<dyn InventoryApi>,
    table: ModelTable,
}

impl ModelTableResolver {
    pub fn new(api: Arc<dyn InventoryApi>, table: ModelTable) -> Self {
        Self { api, table }
    }
}

#[async_trait]
impl InventoryResolver for ModelTableResolver {
    async fn resolve(&self, identity: &DeviceIdentity) -> Result<InventoryRecord, ZtpError> {
        let device = lookup_device(self.api.as_ref(), identity).await?;
        let entry = self.table.lookup(&identity.model).ok_or_else(|| {
            ZtpError::IncompleteDirective(format!(
                "no model table entry matches {}",
                identity.model
            ))
        })?;

        let record = InventoryRecord {
            device_name: device.name.clone().unwrap_or_default(),
            device_id: device.id.clone(),
            declared_model: device.device_type.model.clone().unwrap_or_default(),
            target_package: entry.package.clone(),
            target_version: entry.target_version.clone(),
            is_vm_host: entry.vmhost,
            force_host_mode: entry.force_host,
        };

        log_directive(&record)?;
        Ok(record)
    }
}
