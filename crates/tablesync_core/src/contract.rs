use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::tags::TagSet;

/// Hard provider limit on the number of put requests in one batch write.
pub const MAX_BATCH_PUT_ITEMS: usize = 25;
/// Lifetime requested for assumed-role session credentials.
pub const SESSION_DURATION_SECONDS: i64 = 3600;
/// Remaining session lifetime below which the run fails fast instead of
/// issuing another remote call that would be rejected mid-flight.
pub const SESSION_EXPIRY_MARGIN_SECONDS: i64 = 30;

/// Which of the two accounts an operation or failure belongs to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountSide {
    Source,
    Destination,
}

impl AccountSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountSide::Source => "source",
            AccountSide::Destination => "destination",
        }
    }
}

impl std::fmt::Display for AccountSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Long-lived key/secret/role triple for one account, supplied once at
/// startup and never mutated afterwards.
#[derive(Clone, PartialEq, Eq)]
pub struct AccountCredentials {
    pub access_key: String,
    pub secret_key: String,
    pub role_arn: String,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountCredentials")
            .field("access_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("role_arn", &self.role_arn)
            .finish()
    }
}

/// Raw replication inputs as collected from the command surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplicationRequest {
    pub source_table: String,
    pub dest_table: Option<String>,
    pub create_dest_table: bool,
    pub tags: TagSet,
    pub region: Option<String>,
}

/// Normalized, immutable run configuration. The destination table name is
/// resolved exactly once here and never changes for the rest of the run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReplicationConfig {
    pub source_table: String,
    pub dest_table: String,
    pub create_dest_table: bool,
    pub tags: TagSet,
    pub region: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn normalize_request(request: ReplicationRequest) -> Result<ReplicationConfig, ValidationError> {
    let source_table = request.source_table.trim().to_string();
    if source_table.is_empty() {
        return Err(ValidationError::new("source table name cannot be empty"));
    }

    let dest_table = match request.dest_table {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => source_table.clone(),
    };

    let region = match request.region {
        Some(region) if !region.trim().is_empty() => Some(region.trim().to_string()),
        _ => None,
    };

    Ok(ReplicationConfig {
        source_table,
        dest_table,
        create_dest_table: request.create_dest_table,
        tags: request.tags,
        region,
    })
}

/// Reject credential triples with missing fields before any remote call is
/// attempted. Anything beyond non-emptiness is left to the provider.
pub fn validate_credentials(
    account: AccountSide,
    credentials: &AccountCredentials,
) -> Result<(), ValidationError> {
    if credentials.access_key.trim().is_empty() {
        return Err(ValidationError::new(format!(
            "{account} access key cannot be empty"
        )));
    }
    if credentials.secret_key.trim().is_empty() {
        return Err(ValidationError::new(format!(
            "{account} secret key cannot be empty"
        )));
    }
    if credentials.role_arn.trim().is_empty() {
        return Err(ValidationError::new(format!(
            "{account} role ARN cannot be empty"
        )));
    }
    Ok(())
}

/// Stable identity of a run configuration, logged at startup so reruns
/// against the same tables are recognizable in operator logs. Credentials
/// never feed the fingerprint.
pub fn run_fingerprint(config: &ReplicationConfig) -> String {
    let mut hasher = Sha256::new();
    hasher.update(stable_contract_json(config));
    format!("{:x}", hasher.finalize())
}

pub fn stable_contract_json(value: impl Serialize) -> String {
    serde_json::to_string(&value).expect("serialization of contract value should not fail")
}
