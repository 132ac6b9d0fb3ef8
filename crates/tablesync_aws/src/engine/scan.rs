use serde_json::json;
use tablesync_core::contract::{AccountSide, SESSION_EXPIRY_MARGIN_SECONDS};

use crate::adapters::credentials::SessionCredentials;
use crate::adapters::table::{Record, ScanCursor, TableSource};
use crate::error::ReplicationError;
use crate::logging::log_info;

/// Reads every record in the source table by following the provider's
/// continuation cursor until none is returned. Ordering follows the
/// provider's internal scan order; concurrent writes during a long scan may
/// or may not be reflected.
pub async fn scan_all(
    table: &str,
    source: &impl TableSource,
    session: &SessionCredentials,
) -> Result<Vec<Record>, ReplicationError> {
    let mut records: Vec<Record> = Vec::new();
    let mut cursor: Option<ScanCursor> = None;
    let mut page_index = 0usize;

    loop {
        if session.expires_within(SESSION_EXPIRY_MARGIN_SECONDS) {
            return Err(ReplicationError::CredentialExpired {
                account: AccountSide::Source,
            });
        }

        let page = source
            .scan_page(table, cursor.take())
            .await
            .map_err(|error| ReplicationError::ScanPage {
                table: table.to_string(),
                message: error,
            })?;

        records.extend(page.records);
        log_info(
            "table_scanner",
            "scan_page",
            json!({
                "table": table,
                "page": page_index,
                "items_so_far": records.len(),
            }),
        );
        page_index += 1;

        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    Ok(records)
}
