use tablesync_core::contract::AccountSide;

/// Errors that abort a replication run. Every variant names the account or
/// table involved so the terminal diagnostics identify where the pipeline
/// stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationError {
    /// The provider rejected the long-lived key/secret pair.
    Authentication {
        account: AccountSide,
        message: String,
    },
    /// The role could not be assumed (trust policy, permissions).
    Authorization {
        account: AccountSide,
        role_arn: String,
        message: String,
    },
    /// Destination table creation failed for a reason other than the table
    /// already existing.
    SchemaCreation { table: String, message: String },
    /// A scan page read failed; no partial record set is acceptable.
    ScanPage { table: String, message: String },
    /// A batch write failed hard, or its unprocessed items survived every
    /// retry.
    BatchWrite { table: String, message: String },
    /// The session for one account ran out before the run finished.
    CredentialExpired { account: AccountSide },
}

impl ReplicationError {
    /// Pipeline stage the error belongs to, for terminal diagnostics.
    pub fn stage(&self) -> &'static str {
        match self {
            ReplicationError::Authentication { account, .. }
            | ReplicationError::Authorization { account, .. } => match account {
                AccountSide::Source => "auth_source",
                AccountSide::Destination => "auth_dest",
            },
            ReplicationError::SchemaCreation { .. } => "clone_schema",
            ReplicationError::ScanPage { .. } => "scan",
            ReplicationError::BatchWrite { .. } => "write",
            ReplicationError::CredentialExpired { account } => match account {
                AccountSide::Source => "scan",
                AccountSide::Destination => "write",
            },
        }
    }
}

impl std::fmt::Display for ReplicationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReplicationError::Authentication { account, message } => {
                write!(f, "{account} account authentication failed: {message}")
            }
            ReplicationError::Authorization {
                account,
                role_arn,
                message,
            } => write!(
                f,
                "{account} account could not assume role {role_arn}: {message}"
            ),
            ReplicationError::SchemaCreation { table, message } => {
                write!(f, "failed to create destination table {table}: {message}")
            }
            ReplicationError::ScanPage { table, message } => {
                write!(f, "failed to scan source table {table}: {message}")
            }
            ReplicationError::BatchWrite { table, message } => {
                write!(f, "failed to write batch to table {table}: {message}")
            }
            ReplicationError::CredentialExpired { account } => {
                write!(f, "{account} account session credentials expired mid-run")
            }
        }
    }
}

impl std::error::Error for ReplicationError {}
