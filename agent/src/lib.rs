//! ZTP Agent Library
//!
//! Core modules for zero-touch provisioning of Junos devices.

pub mod app;
pub mod device;
pub mod errors;
pub mod filesys;
pub mod http;
pub mod inventory;
pub mod logs;
pub mod models;
pub mod retry;
pub mod stages;
pub mod storage;
pub mod utils;
pub mod workflow;
