//! AWS-oriented adapters and replication engine.
//!
//! This crate owns cloud integration details (STS role assumption, the
//! DynamoDB table client, and the `tablesync` binary) and the replication
//! flow written against the adapter trait seams. Deterministic contracts
//! and pure computation live in `tablesync_core`.

pub mod adapters;
pub mod engine;
pub mod error;
pub mod logging;
