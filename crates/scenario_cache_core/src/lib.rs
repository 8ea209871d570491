//! Deterministic domain primitives for the scenario result cache.
//!
//! This crate owns request validation, scenario fingerprinting, the storage
//! layout of every artifact a run reads or writes, percentile summaries and
//! the result manifest. It intentionally excludes storage backends, engine
//! invocation and the Lambda runtime.

pub mod contract;
pub mod error;
pub mod fingerprint;
pub mod intervention;
pub mod manifest;
pub mod storage_keys;
pub mod summary;
