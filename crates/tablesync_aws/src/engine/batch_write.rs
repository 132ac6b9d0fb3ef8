use serde_json::json;
use tablesync_core::contract::{
    AccountSide, MAX_BATCH_PUT_ITEMS, SESSION_EXPIRY_MARGIN_SECONDS,
};
use tablesync_core::retry::RetryConfig;

use crate::adapters::credentials::SessionCredentials;
use crate::adapters::table::{Record, TableDestination};
use crate::error::ReplicationError;
use crate::logging::log_info;

/// Writes every record to the destination table in chunks of at most 25
/// puts. Each chunk is an at-least-once write; puts overwrite by primary
/// key, so reruns converge on the source content set.
///
/// Returns the number of batch calls submitted.
pub async fn write_all(
    records: Vec<Record>,
    table: &str,
    dest: &impl TableDestination,
    session: &SessionCredentials,
    retry: &RetryConfig,
) -> Result<usize, ReplicationError> {
    let total = records.len();
    let mut written = 0usize;
    let mut batches = 0usize;

    for chunk in records.chunks(MAX_BATCH_PUT_ITEMS) {
        if session.expires_within(SESSION_EXPIRY_MARGIN_SECONDS) {
            return Err(ReplicationError::CredentialExpired {
                account: AccountSide::Destination,
            });
        }

        submit_chunk(chunk.to_vec(), table, dest, retry).await?;
        batches += 1;
        written += chunk.len();
        log_info(
            "batch_writer",
            "batch_submitted",
            json!({
                "table": table,
                "batch": batches,
                "size": chunk.len(),
                "written_so_far": written,
                "total": total,
            }),
        );
    }

    Ok(batches)
}

/// Submits one chunk, resubmitting whatever subset the provider reports as
/// unprocessed until it drains or the retry budget runs out. A hard error
/// from the call itself is immediately fatal.
async fn submit_chunk(
    records: Vec<Record>,
    table: &str,
    dest: &impl TableDestination,
    retry: &RetryConfig,
) -> Result<(), ReplicationError> {
    let mut pending = records;
    let mut attempt = 0usize;

    loop {
        let outcome = dest
            .batch_put(table, pending)
            .await
            .map_err(|error| ReplicationError::BatchWrite {
                table: table.to_string(),
                message: error,
            })?;

        if outcome.unprocessed.is_empty() {
            return Ok(());
        }

        attempt += 1;
        if attempt > retry.max_attempts {
            return Err(ReplicationError::BatchWrite {
                table: table.to_string(),
                message: format!(
                    "{} items still unprocessed after {} retries",
                    outcome.unprocessed.len(),
                    retry.max_attempts
                ),
            });
        }

        let delay = retry.delay_for_attempt(attempt, rand::random::<f64>());
        log_info(
            "batch_writer",
            "batch_retry",
            json!({
                "table": table,
                "attempt": attempt,
                "unprocessed": outcome.unprocessed.len(),
                "delay_ms": delay.as_millis(),
            }),
        );
        tokio::time::sleep(delay).await;
        pending = outcome.unprocessed;
    }
}
