//! Provisioning workflow

pub mod controller;
pub mod fsm;
