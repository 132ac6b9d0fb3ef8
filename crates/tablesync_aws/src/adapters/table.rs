use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::operation::create_table::CreateTableError;
use aws_sdk_dynamodb::operation::describe_table::DescribeTableError;
use aws_sdk_dynamodb::types::{
    AttributeDefinition, AttributeValue, BillingMode, KeySchemaElement, KeyType, PutRequest,
    ScalarAttributeType, Select, Tag, WriteRequest,
};
use tablesync_core::schema::{AttributeSpec, AttributeType, KeyElement, KeyRole, TableKeyModel};
use tablesync_core::tags::TagSet;

use crate::adapters::credentials::SessionCredentials;

/// One full row of the source table, copied value-for-value.
pub type Record = HashMap<String, AttributeValue>;

/// Opaque continuation token from a paginated scan.
pub type ScanCursor = HashMap<String, AttributeValue>;

#[derive(Debug, Clone)]
pub struct ScanPage {
    pub records: Vec<Record>,
    pub next_cursor: Option<ScanCursor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateTableOutcome {
    Created,
    AlreadyExists,
}

#[derive(Debug, Clone, Default)]
pub struct BatchPutOutcome {
    /// Items the provider did not apply, typically due to throttling. The
    /// caller resubmits exactly this subset.
    pub unprocessed: Vec<Record>,
}

/// Read-only view of the table being replicated from.
#[async_trait]
pub trait TableSource {
    async fn describe_table(&self, table: &str) -> Result<TableKeyModel, String>;
    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<ScanCursor>,
    ) -> Result<ScanPage, String>;
}

/// Write-side view of the table being replicated into.
#[async_trait]
pub trait TableDestination {
    async fn create_table(
        &self,
        table: &str,
        model: &TableKeyModel,
        tags: &TagSet,
    ) -> Result<CreateTableOutcome, String>;
    async fn table_status(&self, table: &str) -> Result<Option<String>, String>;
    async fn batch_put(&self, table: &str, records: Vec<Record>)
        -> Result<BatchPutOutcome, String>;
}

/// DynamoDB client bound to one account's session credentials. Implements
/// both seam traits; a run holds one instance per account.
#[derive(Debug, Clone)]
pub struct DynamoTableClient {
    client: aws_sdk_dynamodb::Client,
}

impl DynamoTableClient {
    pub async fn connect(session: &SessionCredentials, region: Option<&str>) -> Self {
        let credentials = Credentials::new(
            session.access_key_id.clone(),
            session.secret_access_key.clone(),
            Some(session.session_token.clone()),
            None,
            "tablesync-session",
        );

        let base = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_dynamodb::config::Builder::from(&base).credentials_provider(credentials);
        if let Some(region) = region {
            builder = builder.region(Region::new(region.to_string()));
        }

        Self {
            client: aws_sdk_dynamodb::Client::from_conf(builder.build()),
        }
    }
}

#[async_trait]
impl TableSource for DynamoTableClient {
    async fn describe_table(&self, table: &str) -> Result<TableKeyModel, String> {
        let output = self
            .client
            .describe_table()
            .table_name(table)
            .send()
            .await
            .map_err(|error| format!("DescribeTable failed: {error}"))?;

        let description = output
            .table
            .ok_or_else(|| "DescribeTable returned no table description".to_string())?;

        let key_schema = description
            .key_schema
            .unwrap_or_default()
            .into_iter()
            .map(key_element_from_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let attribute_definitions = description
            .attribute_definitions
            .unwrap_or_default()
            .into_iter()
            .map(attribute_spec_from_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableKeyModel {
            key_schema,
            attribute_definitions,
        })
    }

    async fn scan_page(
        &self,
        table: &str,
        cursor: Option<ScanCursor>,
    ) -> Result<ScanPage, String> {
        let mut request = self
            .client
            .scan()
            .table_name(table)
            .select(Select::AllAttributes);
        if let Some(cursor) = cursor {
            request = request.set_exclusive_start_key(Some(cursor));
        }

        let output = request
            .send()
            .await
            .map_err(|error| format!("Scan failed: {error}"))?;

        let next_cursor = match output.last_evaluated_key {
            Some(key) if !key.is_empty() => Some(key),
            _ => None,
        };

        Ok(ScanPage {
            records: output.items.unwrap_or_default(),
            next_cursor,
        })
    }
}

#[async_trait]
impl TableDestination for DynamoTableClient {
    async fn create_table(
        &self,
        table: &str,
        model: &TableKeyModel,
        tags: &TagSet,
    ) -> Result<CreateTableOutcome, String> {
        let key_schema = model
            .key_schema
            .iter()
            .map(key_element_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;
        let attribute_definitions = model
            .attribute_definitions
            .iter()
            .map(attribute_spec_to_sdk)
            .collect::<Result<Vec<_>, _>>()?;

        let mut request = self
            .client
            .create_table()
            .table_name(table)
            .set_key_schema(Some(key_schema))
            .set_attribute_definitions(Some(attribute_definitions))
            .billing_mode(BillingMode::PayPerRequest);

        if !tags.is_empty() {
            let tag_list = tags
                .iter()
                .map(|(key, value)| {
                    Tag::builder()
                        .key(key)
                        .value(value)
                        .build()
                        .map_err(|error| format!("invalid tag {key}: {error}"))
                })
                .collect::<Result<Vec<_>, _>>()?;
            request = request.set_tags(Some(tag_list));
        }

        match request.send().await {
            Ok(_) => Ok(CreateTableOutcome::Created),
            Err(SdkError::ServiceError(context))
                if matches!(context.err(), CreateTableError::ResourceInUseException(_)) =>
            {
                Ok(CreateTableOutcome::AlreadyExists)
            }
            Err(error) => Err(format!("CreateTable failed: {error}")),
        }
    }

    async fn table_status(&self, table: &str) -> Result<Option<String>, String> {
        match self.client.describe_table().table_name(table).send().await {
            Ok(output) => Ok(output
                .table
                .and_then(|description| description.table_status)
                .map(|status| status.as_str().to_string())),
            Err(SdkError::ServiceError(context))
                if matches!(
                    context.err(),
                    DescribeTableError::ResourceNotFoundException(_)
                ) =>
            {
                Ok(None)
            }
            Err(error) => Err(format!("DescribeTable failed: {error}")),
        }
    }

    async fn batch_put(
        &self,
        table: &str,
        records: Vec<Record>,
    ) -> Result<BatchPutOutcome, String> {
        let writes = records
            .into_iter()
            .map(|record| {
                let put = PutRequest::builder()
                    .set_item(Some(record))
                    .build()
                    .map_err(|error| format!("invalid put request: {error}"))?;
                Ok(WriteRequest::builder().put_request(put).build())
            })
            .collect::<Result<Vec<_>, String>>()?;

        let output = self
            .client
            .batch_write_item()
            .request_items(table.to_string(), writes)
            .send()
            .await
            .map_err(|error| format!("BatchWriteItem failed: {error}"))?;

        let unprocessed = output
            .unprocessed_items
            .unwrap_or_default()
            .remove(table)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|write| write.put_request.map(|put| put.item))
            .collect();

        Ok(BatchPutOutcome { unprocessed })
    }
}

fn key_element_from_sdk(element: KeySchemaElement) -> Result<KeyElement, String> {
    let role = match element.key_type {
        KeyType::Hash => KeyRole::Partition,
        KeyType::Range => KeyRole::Sort,
        other => return Err(format!("unsupported key type {other:?}")),
    };
    Ok(KeyElement {
        attribute_name: element.attribute_name,
        role,
    })
}

fn key_element_to_sdk(element: &KeyElement) -> Result<KeySchemaElement, String> {
    let key_type = match element.role {
        KeyRole::Partition => KeyType::Hash,
        KeyRole::Sort => KeyType::Range,
    };
    KeySchemaElement::builder()
        .attribute_name(&element.attribute_name)
        .key_type(key_type)
        .build()
        .map_err(|error| format!("invalid key schema element: {error}"))
}

fn attribute_spec_from_sdk(definition: AttributeDefinition) -> Result<AttributeSpec, String> {
    let attribute_type = match definition.attribute_type {
        ScalarAttributeType::S => AttributeType::String,
        ScalarAttributeType::N => AttributeType::Number,
        ScalarAttributeType::B => AttributeType::Binary,
        other => return Err(format!("unsupported attribute type {other:?}")),
    };
    Ok(AttributeSpec {
        attribute_name: definition.attribute_name,
        attribute_type,
    })
}

fn attribute_spec_to_sdk(spec: &AttributeSpec) -> Result<AttributeDefinition, String> {
    let attribute_type = match spec.attribute_type {
        AttributeType::String => ScalarAttributeType::S,
        AttributeType::Number => ScalarAttributeType::N,
        AttributeType::Binary => ScalarAttributeType::B,
    };
    AttributeDefinition::builder()
        .attribute_name(&spec.attribute_name)
        .attribute_type(attribute_type)
        .build()
        .map_err(|error| format!("invalid attribute definition: {error}"))
}
