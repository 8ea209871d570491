//! Seams to the external collaborators: blob storage and simulation engines.

pub mod engine;
pub mod object_store;
