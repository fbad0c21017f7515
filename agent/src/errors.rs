//! Error types for the ZTP agent

use thiserror::Error;

/// Main error type for the ZTP agent
#[derive(Error, Debug)]
pub enum ZtpError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration lock error: {0}")]
    Lock(String),

    #[error("Configuration load error: {0}")]
    ConfigLoad(String),

    #[error("Commit error: {0}")]
    Commit(String),

    #[error("Device not found in inventory: {0}")]
    NotFound(String),

    #[error("Device model in inventory ({declared}) does not match this device ({actual})")]
    ModelMismatch { declared: String, actual: String },

    #[error("Incomplete provisioning directive: {0}")]
    IncompleteDirective(String),

    #[error("Software install error: {0}")]
    Install(String),

    #[error("Fetch error: {0}")]
    Fetch(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ZtpError {
    /// Errors raised by the inventory data itself. They are retried but will
    /// not clear up without an operator fixing the inventory.
    pub fn needs_operator(&self) -> bool {
        matches!(
            self,
            ZtpError::NotFound(_)
                | ZtpError::ModelMismatch { .. }
                | ZtpError::IncompleteDirective(_)
        )
    }
}

impl From<reqwest::Error> for ZtpError {
    fn from(err: reqwest::Error) -> Self {
        ZtpError::Fetch(err.to_string())
    }
}
