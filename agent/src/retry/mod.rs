//! Retry trigger management

pub mod controller;
