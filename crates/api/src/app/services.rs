//! Startup wiring: repositories, marketplace client and seed data.

use std::sync::Arc;

use thiserror::Error;

use terminal_infra::config::AppConfig;
use terminal_infra::marketplace::{LoggingSmsSender, SignedupClient};
use terminal_infra::repository::Repositories;
use terminal_infra::seed::{SeedData, SeedError};
use terminal_infra::workflows::AppServices;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("DATABASE_URL must be set when USE_PERSISTENT_STORES=true")]
    MissingDatabaseUrl,

    #[error("USE_PERSISTENT_STORES=true requires building with the `postgres` feature")]
    PersistenceUnavailable,

    #[cfg(feature = "postgres")]
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Repository(#[from] terminal_infra::repository::RepositoryError),

    #[error(transparent)]
    Seed(#[from] SeedError),
}

pub async fn build_services(config: AppConfig) -> Result<AppServices, StartupError> {
    let repos = build_repositories(&config).await?;

    if let Some(path) = &config.seed_file {
        let seed = SeedData::load(path).await?;
        seed.apply(&repos).await?;
    }

    let signedup = Arc::new(SignedupClient::from_config(&config));
    Ok(AppServices::new(
        repos,
        signedup.clone(),
        signedup,
        Arc::new(LoggingSmsSender),
        config,
    ))
}

async fn build_repositories(config: &AppConfig) -> Result<Repositories, StartupError> {
    if !config.use_persistent_stores {
        tracing::info!("using in-memory repositories");
        return Ok(Repositories::in_memory());
    }
    if config.database_url.is_none() {
        return Err(StartupError::MissingDatabaseUrl);
    }
    persistent_repositories(config).await
}

#[cfg(feature = "postgres")]
async fn persistent_repositories(config: &AppConfig) -> Result<Repositories, StartupError> {
    let url = config
        .database_url
        .as_deref()
        .ok_or(StartupError::MissingDatabaseUrl)?;
    let pool = sqlx::PgPool::connect(url).await?;
    terminal_infra::repository::postgres::ensure_schema(&pool).await?;
    tracing::info!("using postgres repositories");
    Ok(Repositories::postgres(pool))
}

#[cfg(not(feature = "postgres"))]
async fn persistent_repositories(_config: &AppConfig) -> Result<Repositories, StartupError> {
    Err(StartupError::PersistenceUnavailable)
}
