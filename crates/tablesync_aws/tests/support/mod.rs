//! In-memory stand-in for one account's table service, implementing both
//! seam traits so flow tests can drive the engine without the network.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{Duration, Utc};
use tablesync_core::contract::MAX_BATCH_PUT_ITEMS;
use tablesync_core::schema::{KeyRole, TableKeyModel};
use tablesync_core::tags::TagSet;
use tablesync_aws::adapters::credentials::SessionCredentials;
use tablesync_aws::adapters::table::{
    BatchPutOutcome, CreateTableOutcome, Record, ScanCursor, ScanPage, TableDestination,
    TableSource,
};

pub struct FakeTable {
    pub model: TableKeyModel,
    pub tags: TagSet,
    /// Rows keyed by their rendered partition-key value so scan order is
    /// deterministic and puts overwrite by key.
    pub rows: BTreeMap<String, Record>,
}

pub struct FakeTableService {
    tables: Mutex<HashMap<String, FakeTable>>,
    page_size: usize,
    scan_calls: Mutex<usize>,
    batch_calls: Mutex<Vec<usize>>,
    create_calls: Mutex<Vec<String>>,
    /// Per-call counts of items to bounce back as unprocessed.
    unprocessed_schedule: Mutex<Vec<usize>>,
}

impl FakeTableService {
    pub fn new(page_size: usize) -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            page_size,
            scan_calls: Mutex::new(0),
            batch_calls: Mutex::new(Vec::new()),
            create_calls: Mutex::new(Vec::new()),
            unprocessed_schedule: Mutex::new(Vec::new()),
        }
    }

    pub fn with_unprocessed_schedule(self, schedule: Vec<usize>) -> Self {
        *self.unprocessed_schedule.lock().expect("poisoned mutex") = schedule;
        self
    }

    pub fn seed_table(&self, name: &str, model: TableKeyModel) {
        self.tables.lock().expect("poisoned mutex").insert(
            name.to_string(),
            FakeTable {
                model,
                tags: TagSet::new(),
                rows: BTreeMap::new(),
            },
        );
    }

    pub fn insert_row(&self, table: &str, record: Record) {
        let mut tables = self.tables.lock().expect("poisoned mutex");
        let entry = tables.get_mut(table).expect("table should be seeded");
        let key = partition_key_of(&entry.model, &record).expect("record should carry its key");
        entry.rows.insert(key, record);
    }

    pub fn rows(&self, table: &str) -> BTreeMap<String, Record> {
        self.tables
            .lock()
            .expect("poisoned mutex")
            .get(table)
            .map(|entry| entry.rows.clone())
            .unwrap_or_default()
    }

    pub fn model(&self, table: &str) -> Option<TableKeyModel> {
        self.tables
            .lock()
            .expect("poisoned mutex")
            .get(table)
            .map(|entry| entry.model.clone())
    }

    pub fn tags(&self, table: &str) -> Option<TagSet> {
        self.tables
            .lock()
            .expect("poisoned mutex")
            .get(table)
            .map(|entry| entry.tags.clone())
    }

    pub fn scan_calls(&self) -> usize {
        *self.scan_calls.lock().expect("poisoned mutex")
    }

    pub fn batch_calls(&self) -> Vec<usize> {
        self.batch_calls.lock().expect("poisoned mutex").clone()
    }

    pub fn create_calls(&self) -> Vec<String> {
        self.create_calls.lock().expect("poisoned mutex").clone()
    }
}

#[async_trait]
impl TableSource for FakeTableService {
    async fn describe_table(&self, table: &str) -> Result<TableKeyModel, String> {
        self.model(table)
            .ok_or_else(|| format!("table {table} not found"))
    }

    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<ScanCursor>,
    ) -> Result<ScanPage, String> {
        *self.scan_calls.lock().expect("poisoned mutex") += 1;

        let tables = self.tables.lock().expect("poisoned mutex");
        let entry = tables
            .get(table)
            .ok_or_else(|| format!("table {table} not found"))?;
        let partition_attr = partition_attribute(&entry.model)?;

        let keys: Vec<String> = entry.rows.keys().cloned().collect();
        let start = match cursor {
            Some(cursor) => {
                let resume_after = cursor
                    .get(&partition_attr)
                    .map(render_key)
                    .ok_or_else(|| "cursor is missing the partition key".to_string())?;
                keys.iter()
                    .position(|key| key > &resume_after)
                    .unwrap_or(keys.len())
            }
            None => 0,
        };
        let end = (start + self.page_size).min(keys.len());

        let records: Vec<Record> = keys[start..end]
            .iter()
            .map(|key| entry.rows[key].clone())
            .collect();
        let next_cursor = if end < keys.len() {
            let last = &entry.rows[&keys[end - 1]];
            Some(HashMap::from([(
                partition_attr.clone(),
                last[&partition_attr].clone(),
            )]))
        } else {
            None
        };

        Ok(ScanPage {
            records,
            next_cursor,
        })
    }
}

#[async_trait]
impl TableDestination for FakeTableService {
    async fn create_table(
        &self,
        table: &str,
        model: &TableKeyModel,
        tags: &TagSet,
    ) -> Result<CreateTableOutcome, String> {
        self.create_calls
            .lock()
            .expect("poisoned mutex")
            .push(table.to_string());

        let mut tables = self.tables.lock().expect("poisoned mutex");
        if tables.contains_key(table) {
            return Ok(CreateTableOutcome::AlreadyExists);
        }

        tables.insert(
            table.to_string(),
            FakeTable {
                model: model.clone(),
                tags: tags.clone(),
                rows: BTreeMap::new(),
            },
        );
        Ok(CreateTableOutcome::Created)
    }

    async fn table_status(&self, table: &str) -> Result<Option<String>, String> {
        let tables = self.tables.lock().expect("poisoned mutex");
        Ok(tables.get(table).map(|_| "ACTIVE".to_string()))
    }

    async fn batch_put(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BatchPutOutcome, String> {
        if records.len() > MAX_BATCH_PUT_ITEMS {
            return Err(format!(
                "batch of {} exceeds the {MAX_BATCH_PUT_ITEMS}-item limit",
                records.len()
            ));
        }

        self.batch_calls
            .lock()
            .expect("poisoned mutex")
            .push(records.len());

        let bounce = {
            let mut schedule = self.unprocessed_schedule.lock().expect("poisoned mutex");
            if schedule.is_empty() {
                0
            } else {
                schedule.remove(0)
            }
        };
        let applied = records.len().saturating_sub(bounce);

        let mut tables = self.tables.lock().expect("poisoned mutex");
        let entry = tables
            .get_mut(table)
            .ok_or_else(|| format!("table {table} not found"))?;
        for record in &records[..applied] {
            let key = partition_key_of(&entry.model, record)?;
            entry.rows.insert(key, record.clone());
        }

        Ok(BatchPutOutcome {
            unprocessed: records[applied..].to_vec(),
        })
    }
}

pub fn live_session() -> SessionCredentials {
    SessionCredentials {
        access_key_id: "ASIAEXAMPLE".to_string(),
        secret_access_key: "secret".to_string(),
        session_token: "token".to_string(),
        expires_at: Utc::now() + Duration::seconds(3600),
    }
}

fn partition_attribute(model: &TableKeyModel) -> Result<String, String> {
    model
        .key_schema
        .iter()
        .find(|key| key.role == KeyRole::Partition)
        .map(|key| key.attribute_name.clone())
        .ok_or_else(|| "table has no partition key".to_string())
}

fn partition_key_of(model: &TableKeyModel, record: &Record) -> Result<String, String> {
    let attribute = partition_attribute(model)?;
    record
        .get(&attribute)
        .map(render_key)
        .ok_or_else(|| format!("record is missing partition key {attribute}"))
}

fn render_key(value: &AttributeValue) -> String {
    format!("{value:?}")
}
