//! Self-hosted monitoring agent
//!
//! Checks query time-series datasources on an interval, hand the results to
//! a pluggable algorithm and, when it reports a failure, dispatch remediation
//! actions. Every run and action is recorded in a history store that the
//! read API serves.

pub mod actors;
#[cfg(feature = "api")]
pub mod api;
pub mod check;
pub mod config;
pub mod datasource;
pub mod error;
pub mod metrics;
pub mod plugins;
pub mod storage;
pub mod util;
