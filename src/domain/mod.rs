//! Core domain types and rebalancing logic.

pub mod bar;
pub mod position;
pub mod execution;
pub mod strategy;
pub mod engine;
pub mod projection;
pub mod metrics;
pub mod session;
pub mod config_validation;
pub mod error;
