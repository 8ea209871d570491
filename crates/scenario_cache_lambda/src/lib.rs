//! AWS-oriented adapters and handlers for the scenario result cache.
//!
//! This crate owns runtime integration details (Lambda handler, engine
//! invocation, storage adapters, configuration and logging) and the
//! orchestration that ties them to the deterministic primitives in
//! `scenario_cache_core`.

pub mod adapters;
pub mod config;
pub mod handlers;
pub mod observability;
