//! Shared table replication domain primitives.
//!
//! This crate owns deterministic replication behavior: run configuration
//! contracts, tag parsing, key-schema filtering, and the retry schedule for
//! partial batch failures. It intentionally excludes cloud SDK concerns.

pub mod contract;
pub mod retry;
pub mod schema;
pub mod tags;
