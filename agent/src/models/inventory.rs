//! Inventory (source-of-truth) models

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::errors::ZtpError;

/// Placeholder in a package name that is replaced with the target version
pub const TARGET_VERSION_PLACEHOLDER: &str = "{target_version}";

/// Opaque inventory identifier; the inventory may send it as a number or a string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for DeviceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => DeviceId(n.to_string()),
            Raw::Text(s) => DeviceId(s),
        })
    }
}

/// Device type reference embedded in a device record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceTypeRef {
    #[serde(default)]
    pub model: Option<String>,
}

/// Device record as returned by the inventory search endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: DeviceId,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub device_type: DeviceTypeRef,

    /// Rendered configuration context (`pkg`, `target_version`, `vmhost`, `force_host`)
    #[serde(default)]
    pub config_context: serde_json::Map<String, serde_json::Value>,
}

/// Paginated search response
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSearchResponse {
    #[serde(default)]
    pub results: Vec<DeviceRecord>,
}

/// The single inventory record used for a provisioning run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventoryRecord {
    pub device_name: String,
    pub device_id: DeviceId,
    pub declared_model: String,
    pub target_package: Option<String>,
    pub target_version: Option<String>,
    pub is_vm_host: bool,
    pub force_host_mode: bool,
}

impl InventoryRecord {
    /// Extract the complete provisioning directive, substituting the version placeholder
    pub fn directive(&self) -> Result<ProvisioningDirective, ZtpError> {
        let package = non_empty(self.target_package.as_deref());
        let target_version = non_empty(self.target_version.as_deref());

        match (package, target_version) {
            (Some(package), Some(target_version)) => Ok(ProvisioningDirective {
                package: package.replace(TARGET_VERSION_PLACEHOLDER, target_version),
                target_version: target_version.to_string(),
                is_vm_host: self.is_vm_host,
                force_host_mode: self.force_host_mode,
            }),
            (None, _) => Err(ZtpError::IncompleteDirective(format!(
                "no target package for {} ({})",
                self.device_name, self.declared_model
            ))),
            (_, None) => Err(ZtpError::IncompleteDirective(format!(
                "no target version for {} ({})",
                self.device_name, self.declared_model
            ))),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// What to install and how, resolved for one device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningDirective {
    pub package: String,
    pub target_version: String,
    pub is_vm_host: bool,
    pub force_host_mode: bool,
}
