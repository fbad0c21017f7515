//! HTTP clients

pub mod client;
pub mod netbox;
