//! Daypoll service binary.
//!
//! Loads configuration, connects the live-poll store and the question
//! archive, and serves the poll API until `Ctrl-C`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `daypoll.yaml` (defaults if absent), then
//!    apply environment overrides
//! 2. Initialize structured logging (tracing) and refuse to start without
//!    a JWT secret
//! 3. Connect the live-poll store (`Dragonfly`, or in-process when the URL
//!    is `memory`)
//! 4. Connect and migrate the archive database, or fall back to an
//!    in-process archive when no database URL is configured
//! 5. Build application state and serve HTTP

mod error;

use std::path::Path;
use std::sync::Arc;

use daypoll_api::{AppState, JwtDirectory, start_server};
use daypoll_core::config::LoggingConfig;
use daypoll_core::{ServiceConfig, UtcCalendar};
use daypoll_db::{
    ArchiveBackend, DragonflyStore, KeyValueStore, MemoryArchive, MemoryStore, PostgresArchive,
    PostgresPool,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::ServiceError;

/// Configuration file read from the working directory.
const CONFIG_FILE: &str = "daypoll.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, a backing service, or the HTTP
/// server fails.
#[tokio::main]
async fn main() -> Result<(), ServiceError> {
    let config = load_config()?;
    init_tracing(&config.logging);
    let directory = Arc::new(JwtDirectory::new(config.auth.secret()?));

    info!(
        http = %config.http.bind_address(),
        poll_ttl_secs = config.voting.poll_ttl_secs,
        atomic_tally = config.voting.atomic_tally,
        "daypoll-server starting"
    );

    let archive = connect_archive(&config).await?;
    info!(backend = archive.name(), "Archive ready");

    if config.infrastructure.uses_memory_store() {
        tracing::warn!("Using in-process store; polls are lost on restart");
        serve(MemoryStore::new(), &config, archive, directory).await
    } else {
        let store = DragonflyStore::connect(&config.infrastructure.dragonfly_url)
            .await?
            .with_timeout(config.voting.store_timeout());
        store.health_check().await?;
        serve(store, &config, archive, directory).await
    }
}

async fn serve<S: KeyValueStore>(
    store: S,
    config: &ServiceConfig,
    archive: ArchiveBackend,
    directory: Arc<JwtDirectory>,
) -> Result<(), ServiceError> {
    let state = Arc::new(AppState::new(
        store,
        &config.voting,
        Arc::new(UtcCalendar),
        archive,
        directory,
    ));
    start_server(&config.http, state).await?;
    Ok(())
}

/// Load `daypoll.yaml` if present, otherwise defaults. Environment
/// overrides apply either way.
fn load_config() -> Result<ServiceConfig, ServiceError> {
    let path = Path::new(CONFIG_FILE);
    if path.exists() {
        return Ok(ServiceConfig::from_file(path)?);
    }
    let mut config = ServiceConfig::default();
    config.apply_env_overrides();
    Ok(config)
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn connect_archive(config: &ServiceConfig) -> Result<ArchiveBackend, ServiceError> {
    let Some(url) = config.infrastructure.postgres_url.as_deref() else {
        tracing::warn!("No database URL configured; archive is in-process only");
        return Ok(ArchiveBackend::Memory(MemoryArchive::new()));
    };
    let pool = PostgresPool::connect_url(url).await?;
    pool.run_migrations().await?;
    Ok(ArchiveBackend::Postgres(PostgresArchive::new(&pool)))
}
