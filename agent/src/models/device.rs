//! Device identity models

use serde::{Deserialize, Serialize};

/// Identity of the device being provisioned, read once per run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    /// Chassis serial number
    pub serial: String,

    /// Hardware model, upper case (e.g. "EX4300-48T")
    pub model: String,

    /// Software version currently running
    pub running_version: String,
}

/// Raw facts as reported by a device session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFacts {
    pub hostname: Option<String>,
    pub serial: Option<String>,
    pub model: Option<String>,
    pub version: Option<String>,
}

/// Configuration text loaded inside a transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLoad {
    /// Replace the entire candidate configuration with this text
    Override(String),

    /// Apply set-style statements on top of the candidate
    Set(String),
}

/// Install mode for a software package
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    Standard,
    VmHost,
    ForceHost,
}

impl InstallMode {
    /// Force-host wins over plain VM host when both flags are set
    pub fn select(is_vm_host: bool, force_host_mode: bool) -> Self {
        if force_host_mode {
            InstallMode::ForceHost
        } else if is_vm_host {
            InstallMode::VmHost
        } else {
            InstallMode::Standard
        }
    }
}

/// Software install request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallRequest {
    /// Location the device downloads the package from
    pub package_url: String,

    pub mode: InstallMode,

    /// Install straight from the URL without staging a local copy
    pub no_copy: bool,
}

/// Reboot request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebootRequest {
    pub in_minutes: u32,
    pub vm_host: bool,
}

impl RebootRequest {
    pub fn immediate(vm_host: bool) -> Self {
        Self {
            in_minutes: 0,
            vm_host,
        }
    }
}
