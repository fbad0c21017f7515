//! Inventory resolution
//!
//! [`InventoryApi`] is the raw source-of-truth interface; [`InventoryResolver`]
//! turns a device identity into the single [`InventoryRecord`] a run uses.

pub mod model_table;
pub mod resolver;

use async_trait::async_trait;

use crate::errors::ZtpError;
use crate::models::device::DeviceIdentity;
use crate::models::inventory::{DeviceId, DeviceRecord, InventoryRecord};

/// Source-of-truth API
#[async_trait]
pub trait InventoryApi: Send + Sync {
    /// All device records registered with this serial number
    async fn find_devices_by_serial(&self, serial: &str) -> Result<Vec<DeviceRecord>, ZtpError>;

    /// Rendered configuration text for a device
    async fn render_config(&self, device_id: &DeviceId) -> Result<String, ZtpError>;
}

/// Resolves a device to its inventory record and provisioning directives
#[async_trait]
pub trait InventoryResolver: Send + Sync {
    /// Fails with `Fetch`, `NotFound`, `ModelMismatch` or `IncompleteDirective`
    async fn resolve(&self, identity: &DeviceIdentity) -> Result<InventoryRecord, ZtpError>;
}
