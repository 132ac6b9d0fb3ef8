use std::time::{Duration, Instant};

use serde_json::json;
use tablesync_core::contract::ReplicationConfig;
use tablesync_core::schema::TableKeyModel;

use crate::adapters::table::{CreateTableOutcome, TableDestination};
use crate::error::ReplicationError;
use crate::logging::log_info;

pub const TABLE_ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(1);
pub const TABLE_ACTIVE_TIMEOUT: Duration = Duration::from_secs(60);

/// Creates the destination table from the source's key schema and blocks
/// until it is usable. Finding the table already present is expected on
/// reruns and continues the run; any other creation failure is fatal, since
/// writing past it would target a nonexistent or misconfigured table.
pub async fn ensure_destination(
    descriptor: &TableKeyModel,
    config: &ReplicationConfig,
    dest: &impl TableDestination,
) -> Result<(), ReplicationError> {
    let filtered = TableKeyModel {
        key_schema: descriptor.key_schema.clone(),
        attribute_definitions: descriptor.key_attribute_definitions(),
    };

    let outcome = dest
        .create_table(&config.dest_table, &filtered, &config.tags)
        .await
        .map_err(|error| ReplicationError::SchemaCreation {
            table: config.dest_table.clone(),
            message: error,
        })?;

    match outcome {
        CreateTableOutcome::AlreadyExists => {
            log_info(
                "schema_cloner",
                "table_already_exists",
                json!({ "table": config.dest_table }),
            );
            Ok(())
        }
        CreateTableOutcome::Created => {
            log_info(
                "schema_cloner",
                "table_created",
                json!({
                    "table": config.dest_table,
                    "key_attributes": filtered
                        .key_schema
                        .iter()
                        .map(|key| key.attribute_name.as_str())
                        .collect::<Vec<_>>(),
                    "tags": config.tags.len(),
                }),
            );
            wait_until_active(
                &config.dest_table,
                dest,
                TABLE_ACTIVE_POLL_INTERVAL,
                TABLE_ACTIVE_TIMEOUT,
            )
            .await
        }
    }
}

/// Polls the destination until it reports ACTIVE, up to `timeout`.
pub async fn wait_until_active(
    table: &str,
    dest: &impl TableDestination,
    poll_interval: Duration,
    timeout: Duration,
) -> Result<(), ReplicationError> {
    let started_at = Instant::now();

    loop {
        let status = dest
            .table_status(table)
            .await
            .map_err(|error| ReplicationError::SchemaCreation {
                table: table.to_string(),
                message: error,
            })?;

        if status.as_deref() == Some("ACTIVE") {
            log_info(
                "schema_cloner",
                "table_active",
                json!({
                    "table": table,
                    "waited_ms": started_at.elapsed().as_millis(),
                }),
            );
            return Ok(());
        }

        if started_at.elapsed() >= timeout {
            return Err(ReplicationError::SchemaCreation {
                table: table.to_string(),
                message: format!(
                    "table did not become active within {}s (last status: {})",
                    timeout.as_secs(),
                    status.as_deref().unwrap_or("absent")
                ),
            });
        }

        tokio::time::sleep(poll_interval).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use tablesync_core::contract::{normalize_request, ReplicationRequest};
    use tablesync_core::schema::{AttributeSpec, AttributeType, KeyElement, KeyRole};
    use tablesync_core::tags::TagSet;

    use crate::adapters::table::{BatchPutOutcome, Record};

    use super::*;

    struct RecordingDestination {
        create_result: Result<CreateTableOutcome, String>,
        statuses: Mutex<Vec<Option<String>>>,
        created_with: Mutex<Option<(String, TableKeyModel, TagSet)>>,
    }

    impl RecordingDestination {
        fn new(create_result: Result<CreateTableOutcome, String>) -> Self {
            Self {
                create_result,
                statuses: Mutex::new(vec![Some("ACTIVE".to_string())]),
                created_with: Mutex::new(None),
            }
        }

        fn with_statuses(mut self, statuses: Vec<Option<String>>) -> Self {
            self.statuses = Mutex::new(statuses);
            self
        }

        fn created_with(&self) -> Option<(String, TableKeyModel, TagSet)> {
            self.created_with.lock().expect("poisoned mutex").clone()
        }
    }

    #[async_trait]
    impl TableDestination for RecordingDestination {
        async fn create_table(
            &self,
            table: &str,
            model: &TableKeyModel,
            tags: &TagSet,
        ) -> Result<CreateTableOutcome, String> {
            *self.created_with.lock().expect("poisoned mutex") =
                Some((table.to_string(), model.clone(), tags.clone()));
            self.create_result.clone()
        }

        async fn table_status(&self, _table: &str) -> Result<Option<String>, String> {
            let mut statuses = self.statuses.lock().expect("poisoned mutex");
            if statuses.len() > 1 {
                Ok(statuses.remove(0))
            } else {
                Ok(statuses[0].clone())
            }
        }

        async fn batch_put(
            &self,
            _table: &str,
            _records: Vec<Record>,
        ) -> Result<BatchPutOutcome, String> {
            Ok(BatchPutOutcome::default())
        }
    }

    fn sample_descriptor() -> TableKeyModel {
        TableKeyModel {
            key_schema: vec![
                KeyElement {
                    attribute_name: "A".to_string(),
                    role: KeyRole::Partition,
                },
                KeyElement {
                    attribute_name: "B".to_string(),
                    role: KeyRole::Sort,
                },
            ],
            attribute_definitions: vec![
                AttributeSpec {
                    attribute_name: "A".to_string(),
                    attribute_type: AttributeType::String,
                },
                AttributeSpec {
                    attribute_name: "B".to_string(),
                    attribute_type: AttributeType::Number,
                },
                AttributeSpec {
                    attribute_name: "C".to_string(),
                    attribute_type: AttributeType::String,
                },
            ],
        }
    }

    fn sample_config() -> ReplicationConfig {
        normalize_request(ReplicationRequest {
            source_table: "Orders".to_string(),
            dest_table: None,
            create_dest_table: true,
            tags: TagSet::new(),
            region: None,
        })
        .expect("request should pass")
    }

    #[tokio::test]
    async fn creates_table_with_only_key_attribute_definitions() {
        let dest = RecordingDestination::new(Ok(CreateTableOutcome::Created));

        ensure_destination(&sample_descriptor(), &sample_config(), &dest)
            .await
            .expect("clone should succeed");

        let (table, model, _tags) = dest.created_with().expect("create should be called");
        assert_eq!(table, "Orders");
        let names: Vec<&str> = model
            .attribute_definitions
            .iter()
            .map(|definition| definition.attribute_name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(model.key_schema, sample_descriptor().key_schema);
    }

    #[tokio::test]
    async fn existing_table_is_not_fatal() {
        let dest = RecordingDestination::new(Ok(CreateTableOutcome::AlreadyExists));

        ensure_destination(&sample_descriptor(), &sample_config(), &dest)
            .await
            .expect("clone should continue with the existing table");
    }

    #[tokio::test]
    async fn other_creation_failures_are_fatal() {
        let dest = RecordingDestination::new(Err("ValidationException: bad schema".to_string()));

        let error = ensure_destination(&sample_descriptor(), &sample_config(), &dest)
            .await
            .expect_err("clone should fail");

        assert!(matches!(
            error,
            ReplicationError::SchemaCreation { ref table, ref message }
                if table == "Orders" && message.contains("ValidationException")
        ));
    }

    #[tokio::test]
    async fn waits_through_creating_status_until_active() {
        let dest = RecordingDestination::new(Ok(CreateTableOutcome::Created)).with_statuses(vec![
            Some("CREATING".to_string()),
            Some("CREATING".to_string()),
            Some("ACTIVE".to_string()),
        ]);

        wait_until_active(
            "Orders",
            &dest,
            Duration::from_millis(1),
            Duration::from_secs(5),
        )
        .await
        .expect("table should become active");
    }

    #[tokio::test]
    async fn times_out_when_table_never_becomes_active() {
        let dest = RecordingDestination::new(Ok(CreateTableOutcome::Created))
            .with_statuses(vec![Some("CREATING".to_string())]);

        let error = wait_until_active(
            "Orders",
            &dest,
            Duration::from_millis(1),
            Duration::from_millis(5),
        )
        .await
        .expect_err("wait should time out");

        assert!(matches!(
            error,
            ReplicationError::SchemaCreation { ref message, .. }
                if message.contains("did not become active")
        ));
    }
}
