use std::time::Instant;

use serde::Serialize;
use serde_json::json;
use tablesync_core::contract::ReplicationConfig;
use tablesync_core::retry::RetryConfig;

use crate::adapters::credentials::SessionCredentials;
use crate::adapters::table::{TableDestination, TableSource};
use crate::engine::batch_write::write_all;
use crate::engine::scan::scan_all;
use crate::engine::schema_clone::ensure_destination;
use crate::error::ReplicationError;
use crate::logging::log_info;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReplicationOutcome {
    pub records_copied: usize,
    pub batches_submitted: usize,
    pub duration_ms: u64,
}

/// Runs the table stages of the pipeline: [CLONE_SCHEMA] → SCAN → WRITE.
/// The caller has already assumed both roles and connected the clients; any
/// stage error aborts the run immediately, leaving no partial-success
/// state beyond the writes already applied (which reruns overwrite by key).
pub async fn run_replication(
    config: &ReplicationConfig,
    source: &impl TableSource,
    dest: &impl TableDestination,
    source_session: &SessionCredentials,
    dest_session: &SessionCredentials,
    retry: &RetryConfig,
) -> Result<ReplicationOutcome, ReplicationError> {
    let started_at = Instant::now();

    if config.create_dest_table {
        let stage_started = Instant::now();
        log_stage_started(config, "clone_schema");
        let descriptor = source
            .describe_table(&config.source_table)
            .await
            .map_err(|error| ReplicationError::SchemaCreation {
                table: config.source_table.clone(),
                message: format!("failed to describe source table: {error}"),
            })?;
        log_info(
            "orchestrator",
            "table_described",
            json!({
                "table": config.source_table,
                "key_attributes": descriptor
                    .key_schema
                    .iter()
                    .map(|key| key.attribute_name.as_str())
                    .collect::<Vec<_>>(),
            }),
        );
        ensure_destination(&descriptor, config, dest).await?;
        log_stage_completed(config, "clone_schema", stage_started);
    }

    let stage_started = Instant::now();
    log_stage_started(config, "scan");
    let records = scan_all(&config.source_table, source, source_session).await?;
    log_stage_completed(config, "scan", stage_started);

    let stage_started = Instant::now();
    log_stage_started(config, "write");
    let records_copied = records.len();
    let batches_submitted = write_all(
        records,
        &config.dest_table,
        dest,
        dest_session,
        retry,
    )
    .await?;
    log_stage_completed(config, "write", stage_started);

    Ok(ReplicationOutcome {
        records_copied,
        batches_submitted,
        duration_ms: started_at.elapsed().as_millis() as u64,
    })
}

fn log_stage_started(config: &ReplicationConfig, stage: &str) {
    log_info(
        "orchestrator",
        "stage_started",
        json!({
            "stage": stage,
            "source_table": config.source_table,
            "dest_table": config.dest_table,
        }),
    );
}

fn log_stage_completed(config: &ReplicationConfig, stage: &str, started_at: Instant) {
    log_info(
        "orchestrator",
        "stage_completed",
        json!({
            "stage": stage,
            "source_table": config.source_table,
            "dest_table": config.dest_table,
            "duration_ms": started_at.elapsed().as_millis() as u64,
        }),
    );
}
