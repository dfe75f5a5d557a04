//! Route handlers

pub mod checks;
pub mod health;
pub mod metrics;
