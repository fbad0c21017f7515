//! Deployment files: settings and model table

pub mod layout;
pub mod settings;
