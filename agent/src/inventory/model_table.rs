//! Declarative model table
//!
//! Maps hardware models to provisioning directives. Loaded from JSON:
//!
//! ```json
//! {
//!   "entries": [
//!     {"match": "EX4300", "package": "jinstall-ex-4300-{target_version}-signed.tgz", "target_version": "21.4R3-S5"},
//!     {"match": "MX204", "package": "junos-vmhost-install-mx-x86-64-{target_version}.tgz", "target_version": "22.2R3", "vmhost": true}
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::errors::ZtpError;
use crate::filesys::file::File;

/// One model table entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Case-insensitive substring of the device model
    #[serde(rename = "match")]
    pub pattern: String,

    #[serde(default)]
    pub package: Option<String>,

    #[serde(default)]
    pub target_version: Option<String>,

    #[serde(default)]
    pub vmhost: bool,

    #[serde(default)]
    pub force_host: bool,
}

impl ModelEntry {
    pub fn matches(&self, model: &str) -> bool {
        !self.pattern.is_empty() && model.to_uppercase().contains(&self.pattern.to_uppercase())
    }
}

/// Ordered model table; the first matching entry wins
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelTable {
    #[serde(default)]
    pub entries: Vec<ModelEntry>,
}

impl ModelTable {
    pub fn new(entries: Vec<ModelEntry>) -> Self {
        Self { entries }
    }

    /// Load the table from a JSON file
    pub async fn load(file: &File) -> Result<Self, ZtpError> {
        file.read_json().await.map_err(|e| {
            ZtpError::Settings(format!(
                "unable to load model table {:?}: {}",
                file.path(),
                e
            ))
        })
    }

    /// First entry matching the model
    pub fn lookup(&self, model: &str) -> Option<&ModelEntry> {
        self.entries.iter().find(|entry| entry.matches(model))
    }
}
