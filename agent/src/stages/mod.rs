//! Provisioning stages

pub mod configure;
pub mod upgrade;
