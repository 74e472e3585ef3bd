use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use gcloud_gax::grpc::{Code, Status};
use gcloud_googleapis::spanner::admin::database::v1::{
    CreateDatabaseRequest, GetDatabaseDdlRequest, GetDatabaseRequest, UpdateDatabaseDdlRequest,
};
use gcloud_googleapis::spanner::admin::instance::v1::{
    CreateInstanceRequest, GetInstanceRequest, Instance,
};
use gcloud_spanner::admin::client::Client as AdminClient;
use gcloud_spanner::admin::AdminClientConfig;
use gcloud_spanner::client::{Client, ClientConfig};
use gcloud_spanner::mutation::insert_or_update;
use gcloud_spanner::statement::Statement;
use gcloud_spanner::value::CommitTimestamp;
use serde_json::Value as JsonValue;
use std::sync::Arc;

use super::{RecordKey, RecordStore};
use crate::config::SpannerConfig;

const TABLE: &str = "records";

/// Record store backed by a Cloud Spanner table
///
/// Each record is one row keyed by `(namespace, record_index)`; the JSON
/// document lives in a `JSON` column.
#[derive(Clone)]
pub struct SpannerStore {
    inner: Arc<Client>,
}

impl SpannerStore {
    /// Connect to the configured database
    ///
    /// The gcloud-spanner library picks up `SPANNER_EMULATOR_HOST` from the
    /// environment and talks to the emulator when it is set.
    ///
    /// The instance, database and `records` table are created first if they
    /// don't exist yet.
    pub async fn from_config(config: &SpannerConfig) -> Result<Self> {
        auto_provision(config).await?;

        let database_path = config.database_path();

        match &config.emulator_host {
            Some(host) => tracing::info!("Connecting to Spanner emulator at: {}", host),
            None => tracing::info!("Connecting to production Spanner"),
        }

        let client = Client::new(&database_path, ClientConfig::default())
            .await
            .context("Failed to create Spanner client")?;

        tracing::info!(
            "Successfully connected to Spanner database: {}",
            database_path
        );

        Ok(Self {
            inner: Arc::new(client),
        })
    }
}

#[async_trait]
impl RecordStore for SpannerStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<JsonValue>> {
        let mut statement = Statement::new(&format!(
            "SELECT data FROM {} WHERE namespace = @namespace AND record_index = @record_index",
            TABLE
        ));
        statement.add_param("namespace", &key.namespace().to_string());
        statement.add_param("record_index", &key.index().to_string());

        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create read transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to query record from Spanner")?;

        if let Some(row) = result_set.next().await? {
            let data_str: String = row.column_by_name("data")?;
            let data: JsonValue = serde_json::from_str(&data_str)
                .context("Failed to deserialize stored record")?;

            tracing::debug!("Read record {}", key);
            Ok(Some(data))
        } else {
            tracing::debug!("Record not found: {}", key);
            Ok(None)
        }
    }

    /// Inserts the row, or replaces `data` when it already exists.
    async fn set(&self, key: &RecordKey, value: JsonValue) -> Result<()> {
        let data_str = serde_json::to_string(&value)
            .context("Failed to serialize record")?;

        let mutation = insert_or_update(
            TABLE,
            &["namespace", "record_index", "data", "updated_at"],
            &[
                &key.namespace().to_string(),
                &key.index().to_string(),
                &data_str,
                &CommitTimestamp::new(),
            ],
        );

        self.inner
            .apply(vec![mutation])
            .await
            .context("Failed to write record to Spanner")?;

        tracing::debug!("Stored record {}", key);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        let statement = Statement::new("SELECT 1");

        let mut tx = self.inner
            .single()
            .await
            .context("Failed to create health check transaction")?;

        let mut result_set = tx
            .query(statement)
            .await
            .context("Failed to execute health check query")?;

        if result_set.next().await?.is_some() {
            tracing::debug!("Health check query succeeded");
            Ok(())
        } else {
            Err(anyhow!("Health check query returned no results"))
        }
    }
}

/// Create the Spanner instance, database and table when missing
///
/// Instances are only created on the emulator; against production Spanner a
/// missing instance is a startup error. Databases and the `records` table are
/// created in both cases.
async fn auto_provision(config: &SpannerConfig) -> Result<()> {
    tracing::info!("Starting auto-provisioning checks...");

    let admin_client = AdminClient::new(AdminClientConfig::default())
        .await
        .context("Failed to create Spanner admin client")?;

    let project_path = format!("projects/{}", config.project);
    let instance_path = format!("{}/instances/{}", project_path, config.instance);
    let database_path = config.database_path();

    let instance = admin_client
        .instance()
        .get_instance(
            GetInstanceRequest {
                name: instance_path.clone(),
                field_mask: None,
            },
            None,
        )
        .await;
    if !found(instance, "instance")? {
        if config.emulator_host.is_none() {
            bail!("Spanner instance does not exist: {}", instance_path);
        }
        create_emulator_instance(&admin_client, config, &project_path, &instance_path).await?;
    }

    let database = admin_client
        .database()
        .get_database(
            GetDatabaseRequest {
                name: database_path.clone(),
            },
            None,
        )
        .await;
    if !found(database, "database")? {
        create_database(&admin_client, &instance_path, &config.database).await?;
    }

    ensure_table_exists(&admin_client, &database_path).await?;

    tracing::info!("Auto-provisioning complete");
    Ok(())
}

/// Map an admin lookup to "exists?", keeping NotFound apart from real failures
fn found<T>(lookup: std::result::Result<T, Status>, what: &str) -> Result<bool> {
    match lookup {
        Ok(_) => Ok(true),
        Err(status) if status.code() == Code::NotFound => Ok(false),
        Err(status) => Err(anyhow!(
            "Failed to check {} existence: {}",
            what,
            status.message()
        )),
    }
}

async fn create_emulator_instance(
    admin_client: &AdminClient,
    config: &SpannerConfig,
    project_path: &str,
    instance_path: &str,
) -> Result<()> {
    tracing::info!("Creating emulator instance: {}", instance_path);

    let request = CreateInstanceRequest {
        parent: project_path.to_string(),
        instance_id: config.instance.clone(),
        instance: Some(Instance {
            name: instance_path.to_string(),
            config: format!("{}/instanceConfigs/emulator-config", project_path),
            display_name: config.instance.clone(),
            node_count: 1,
            ..Default::default()
        }),
    };

    admin_client
        .instance()
        .create_instance(request, None)
        .await
        .context("Failed to start instance creation")?
        .wait(None)
        .await
        .context("Failed to create instance")?;
    Ok(())
}

async fn create_database(
    admin_client: &AdminClient,
    instance_path: &str,
    database_id: &str,
) -> Result<()> {
    tracing::info!("Creating database {} in {}", database_id, instance_path);

    let request = CreateDatabaseRequest {
        parent: instance_path.to_string(),
        create_statement: format!("CREATE DATABASE `{}`", database_id),
        extra_statements: vec![],
        encryption_config: None,
        database_dialect: 1, // Google Standard SQL
        proto_descriptors: vec![],
    };

    admin_client
        .database()
        .create_database(request, None)
        .await
        .context("Failed to start database creation")?
        .wait(None)
        .await
        .context("Failed to create database")?;
    Ok(())
}

fn table_declared(statements: &[String]) -> bool {
    statements.iter().any(|stmt| {
        stmt.contains(&format!("CREATE TABLE {} ", TABLE))
            || stmt.contains(&format!("CREATE TABLE `{}`", TABLE))
    })
}

async fn ensure_table_exists(admin_client: &AdminClient, database_path: &str) -> Result<()> {
    let get_ddl_request = GetDatabaseDdlRequest {
        database: database_path.to_string(),
    };

    let ddl_response = admin_client
        .database()
        .get_database_ddl(get_ddl_request, None)
        .await
        .context("Failed to get database DDL")?;

    if table_declared(&ddl_response.into_inner().statements) {
        tracing::info!("Table '{}' already exists", TABLE);
        return Ok(());
    }

    tracing::info!("Table '{}' not found, creating...", TABLE);

    let create_table_ddl = format!(
        "CREATE TABLE {} (
    namespace STRING(64) NOT NULL,
    record_index STRING(MAX) NOT NULL,
    data JSON NOT NULL,
    updated_at TIMESTAMP NOT NULL OPTIONS (allow_commit_timestamp=true),
) PRIMARY KEY (namespace, record_index)",
        TABLE
    );

    let update_request = UpdateDatabaseDdlRequest {
        database: database_path.to_string(),
        statements: vec![create_table_ddl],
        operation_id: String::new(),
        proto_descriptors: vec![],
        throughput_mode: false,
    };

    let mut operation = admin_client
        .database()
        .update_database_ddl(update_request, None)
        .await
        .context("Failed to start table creation")?;

    operation
        .wait(None)
        .await
        .context("Failed to create table")?;

    tracing::info!("Table '{}' created successfully", TABLE);
    Ok(())
}
