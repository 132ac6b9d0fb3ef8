use async_trait::async_trait;
use aws_sdk_sts::config::{Credentials, Region};
use aws_sdk_sts::error::ProvideErrorMetadata;
use chrono::{DateTime, Duration, Utc};
use tablesync_core::contract::{AccountCredentials, AccountSide, SESSION_DURATION_SECONDS};

use crate::error::ReplicationError;

/// Session name attached to every assumed role, visible in provider audit
/// logs.
pub const ROLE_SESSION_NAME: &str = "tablesync";

/// Short-lived credentials for one account. Never persisted, never logged;
/// must not outlive a single run.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionCredentials {
    /// True when fewer than `margin_seconds` of session lifetime remain.
    pub fn expires_within(&self, margin_seconds: i64) -> bool {
        Utc::now() + Duration::seconds(margin_seconds) >= self.expires_at
    }
}

impl std::fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("access_key_id", &"<redacted>")
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Exchanges a long-lived key/secret/role triple for session credentials
/// scoped to one account.
#[async_trait]
pub trait CredentialBroker {
    async fn assume(
        &self,
        account: AccountSide,
        identity: &AccountCredentials,
    ) -> Result<SessionCredentials, ReplicationError>;
}

/// STS-backed broker. A fresh one-off STS client is built per call from the
/// supplied long-lived credentials; no retry is performed, since proceeding
/// with any other credential would be unsafe.
#[derive(Debug, Clone, Default)]
pub struct StsCredentialBroker {
    region: Option<String>,
}

impl StsCredentialBroker {
    pub fn new(region: Option<String>) -> Self {
        Self { region }
    }
}

#[async_trait]
impl CredentialBroker for StsCredentialBroker {
    async fn assume(
        &self,
        account: AccountSide,
        identity: &AccountCredentials,
    ) -> Result<SessionCredentials, ReplicationError> {
        let static_credentials = Credentials::new(
            identity.access_key.clone(),
            identity.secret_key.clone(),
            None,
            None,
            "tablesync-long-lived",
        );

        let base = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        let mut builder =
            aws_sdk_sts::config::Builder::from(&base).credentials_provider(static_credentials);
        if let Some(region) = &self.region {
            builder = builder.region(Region::new(region.clone()));
        }
        let client = aws_sdk_sts::Client::from_conf(builder.build());

        let requested_at = Utc::now();
        let output = client
            .assume_role()
            .role_arn(&identity.role_arn)
            .role_session_name(ROLE_SESSION_NAME)
            .duration_seconds(SESSION_DURATION_SECONDS as i32)
            .send()
            .await
            .map_err(|error| map_assume_role_error(account, &identity.role_arn, &error))?;

        let granted = output
            .credentials
            .ok_or_else(|| ReplicationError::Authorization {
                account,
                role_arn: identity.role_arn.clone(),
                message: "provider returned no session credentials".to_string(),
            })?;

        let expires_at = DateTime::from_timestamp(
            granted.expiration.secs(),
            granted.expiration.subsec_nanos(),
        )
        .unwrap_or(requested_at + Duration::seconds(SESSION_DURATION_SECONDS));

        Ok(SessionCredentials {
            access_key_id: granted.access_key_id,
            secret_access_key: granted.secret_access_key,
            session_token: granted.session_token,
            expires_at,
        })
    }
}

fn map_assume_role_error(
    account: AccountSide,
    role_arn: &str,
    error: &(impl ProvideErrorMetadata + std::fmt::Display),
) -> ReplicationError {
    let message = match error.message() {
        Some(message) => message.to_string(),
        None => error.to_string(),
    };

    match error.code() {
        Some("InvalidClientTokenId")
        | Some("SignatureDoesNotMatch")
        | Some("IncompleteSignature")
        | Some("UnrecognizedClientException") => {
            ReplicationError::Authentication { account, message }
        }
        Some(code) => ReplicationError::Authorization {
            account,
            role_arn: role_arn.to_string(),
            message: format!("{code}: {message}"),
        },
        None => ReplicationError::Authentication { account, message },
    }
}
