use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use sopforge_agent::graph::topology_mermaid;
use sopforge_agent::{artifacts, AgentRuntime};
use sopforge_core::config::{AppConfig, ConfigError, LoadOptions};
use sopforge_db::{connect_with_settings, migrations, DbPool};

use crate::routes::AppState;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub runtime: Arc<AgentRuntime>,
}

impl Application {
    pub fn into_state(self) -> AppState {
        AppState { runtime: self.runtime, db_pool: self.db_pool }
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("artifacts directory setup failed: {0}")]
    Artifacts(#[source] std::io::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    artifacts::ensure_artifacts_dir(&config.artifacts.dir).map_err(BootstrapError::Artifacts)?;
    artifacts::write_mermaid_topology(&config.artifacts.dir, &topology_mermaid())
        .map_err(BootstrapError::Artifacts)?;
    info!(
        event_name = "system.bootstrap.artifacts_ready",
        dir = %config.artifacts.dir.display(),
        "artifacts directory prepared"
    );

    let runtime = Arc::new(AgentRuntime::new(&db_pool, config.artifacts.dir.clone()));
    Ok(Application { config, db_pool, runtime })
}
