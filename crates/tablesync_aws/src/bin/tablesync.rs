use clap::Parser;
use serde_json::json;
use tablesync_core::contract::{
    normalize_request, run_fingerprint, validate_credentials, AccountCredentials, AccountSide,
    ReplicationConfig, ReplicationRequest,
};
use tablesync_core::retry::RetryConfig;
use tablesync_core::tags::parse_tag_list;
use tablesync_aws::adapters::credentials::{
    CredentialBroker, SessionCredentials, StsCredentialBroker,
};
use tablesync_aws::adapters::table::DynamoTableClient;
use tablesync_aws::engine::run::run_replication;
use tablesync_aws::error::ReplicationError;
use tablesync_aws::logging::{log_error, log_info, log_warn};

#[derive(Parser)]
#[command(
    name = "tablesync",
    about = "Replicate a DynamoDB table across two accounts via assumed roles"
)]
struct Cli {
    /// Access key for the source account
    #[arg(long, env = "TABLESYNC_SOURCE_KEY")]
    source_key: String,
    /// Secret access key for the source account
    #[arg(long, env = "TABLESYNC_SOURCE_SECRET")]
    source_secret: String,
    /// Role ARN to assume in the source account
    #[arg(long, env = "TABLESYNC_SOURCE_ROLE")]
    source_role: String,
    /// Access key for the destination account
    #[arg(long, env = "TABLESYNC_DEST_KEY")]
    dest_key: String,
    /// Secret access key for the destination account
    #[arg(long, env = "TABLESYNC_DEST_SECRET")]
    dest_secret: String,
    /// Role ARN to assume in the destination account
    #[arg(long, env = "TABLESYNC_DEST_ROLE")]
    dest_role: String,
    /// Name of the table to replicate
    #[arg(long)]
    table_name: String,
    /// Create the destination table from the source's key schema
    #[arg(long)]
    create_table: bool,
    /// Destination table name, when it differs from the source name
    #[arg(long)]
    dest_table: Option<String>,
    /// Tags for the created table, comma separated: environment=dev,project=demo
    #[arg(long, default_value = "")]
    tags: String,
    /// AWS region; falls back to the SDK default provider chain
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,
}

struct Accounts {
    source: AccountCredentials,
    dest: AccountCredentials,
}

fn build_request(cli: &Cli) -> (ReplicationRequest, Accounts) {
    let parsed = parse_tag_list(&cli.tags);
    for entry in &parsed.skipped {
        log_warn("cli", "tag_skipped", json!({ "entry": entry }));
    }

    let request = ReplicationRequest {
        source_table: cli.table_name.clone(),
        dest_table: cli.dest_table.clone(),
        create_dest_table: cli.create_table,
        tags: parsed.tags,
        region: cli.region.clone(),
    };
    let accounts = Accounts {
        source: AccountCredentials {
            access_key: cli.source_key.clone(),
            secret_key: cli.source_secret.clone(),
            role_arn: cli.source_role.clone(),
        },
        dest: AccountCredentials {
            access_key: cli.dest_key.clone(),
            secret_key: cli.dest_secret.clone(),
            role_arn: cli.dest_role.clone(),
        },
    };

    (request, accounts)
}

async fn assume_account(
    broker: &StsCredentialBroker,
    account: AccountSide,
    identity: &AccountCredentials,
    config: &ReplicationConfig,
) -> Result<SessionCredentials, ReplicationError> {
    let session = broker.assume(account, identity).await?;
    log_info(
        "credential_broker",
        "role_assumed",
        json!({
            "account": account.as_str(),
            "role_arn": identity.role_arn,
            "expires_at": session.expires_at.to_rfc3339(),
            "source_table": config.source_table,
        }),
    );
    Ok(session)
}

fn fail_run(config: &ReplicationConfig, error: &ReplicationError) -> ! {
    log_error(
        "orchestrator",
        "run_failed",
        json!({
            "stage": error.stage(),
            "source_table": config.source_table,
            "dest_table": config.dest_table,
            "error": error.to_string(),
        }),
    );
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let (request, accounts) = build_request(&cli);

    let config = match normalize_request(request) {
        Ok(config) => config,
        Err(error) => {
            log_error("cli", "invalid_request", json!({ "error": error.message() }));
            std::process::exit(2);
        }
    };
    for (account, credentials) in [
        (AccountSide::Source, &accounts.source),
        (AccountSide::Destination, &accounts.dest),
    ] {
        if let Err(error) = validate_credentials(account, credentials) {
            log_error("cli", "invalid_request", json!({ "error": error.message() }));
            std::process::exit(2);
        }
    }

    log_info(
        "orchestrator",
        "run_started",
        json!({
            "source_table": config.source_table,
            "dest_table": config.dest_table,
            "create_dest_table": config.create_dest_table,
            "tags": config.tags.len(),
            "fingerprint": run_fingerprint(&config),
        }),
    );

    let broker = StsCredentialBroker::new(config.region.clone());

    let source_session =
        match assume_account(&broker, AccountSide::Source, &accounts.source, &config).await {
            Ok(session) => session,
            Err(error) => fail_run(&config, &error),
        };
    let dest_session =
        match assume_account(&broker, AccountSide::Destination, &accounts.dest, &config).await {
            Ok(session) => session,
            Err(error) => fail_run(&config, &error),
        };

    let source_client = DynamoTableClient::connect(&source_session, config.region.as_deref()).await;
    let dest_client = DynamoTableClient::connect(&dest_session, config.region.as_deref()).await;

    let outcome = match run_replication(
        &config,
        &source_client,
        &dest_client,
        &source_session,
        &dest_session,
        &RetryConfig::default(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(error) => fail_run(&config, &error),
    };

    log_info(
        "orchestrator",
        "run_completed",
        json!({
            "source_table": config.source_table,
            "dest_table": config.dest_table,
            "records_copied": outcome.records_copied,
            "batches_submitted": outcome.batches_submitted,
            "duration_ms": outcome.duration_ms,
        }),
    );
}
