use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::info;

use pedibot_agent::{ClassifierError, HttpChatClassifier};
use pedibot_channel::{LogEscalationNotifier, NoopReplySender};
use pedibot_core::config::{AppConfig, ConfigError, LoadOptions};
use pedibot_db::repositories::{JobQueue, SqlCatalogRepository, SqlJobQueue, SqlMessageStore, SqlOrderStore};
use pedibot_db::{connect_with_settings, migrations, DbPool};
use pedibot_pipeline::{MessagePipeline, OrderAssembler, PipelineOptions};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<MessagePipeline>,
    pub queue: Arc<dyn JobQueue>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("classifier construction failed: {0}")]
    Classifier(#[source] ClassifierError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        "starting application bootstrap"
    );

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let classifier =
        HttpChatClassifier::from_config(&config.classifier).map_err(BootstrapError::Classifier)?;

    // The per-job classification deadline covers the adapter's own retries.
    let classifier_deadline = Duration::from_secs(
        config.classifier.timeout_secs * (u64::from(config.classifier.max_retries) + 1),
    );

    let pipeline = Arc::new(MessagePipeline::new(
        Arc::new(SqlCatalogRepository::new(db_pool.clone())),
        Arc::new(SqlMessageStore::new(db_pool.clone())),
        OrderAssembler::new(Arc::new(SqlOrderStore::new(db_pool.clone()))),
        Arc::new(classifier),
        Arc::new(NoopReplySender),
        Arc::new(LogEscalationNotifier),
        PipelineOptions {
            classifier_timeout: classifier_deadline,
            history_limit: config.worker.history_limit,
        },
    ));

    let queue: Arc<dyn JobQueue> = Arc::new(SqlJobQueue::new(db_pool.clone()));

    Ok(Application { config, db_pool, pipeline, queue })
}
