//! Startup: open the activity database and spawn the calendar workers.

use std::{path::Path, sync::Arc};

use anyhow::{Context, Result};

use crate::config::Config;

/// The database URL without credentials, safe to log.
pub fn redact_db_url(db_url: &str) -> String {
    match url::Url::parse(db_url) {
        Ok(url) => format!(
            "{}://{}{}{}",
            url.scheme(),
            url.host_str().unwrap_or(""),
            url.port().map(|p| format!(":{}", p)).unwrap_or_default(),
            url.path()
        ),
        Err(_) => match db_url.rsplit_once('@') {
            Some((_, rest)) => format!("(redacted)@{}", rest),
            None => "(redacted)".to_string(),
        },
    }
}

/// File backing a SQLite URL. `None` for in-memory databases.
fn sqlite_file(db_url: &str) -> Option<&Path> {
    let rest = db_url
        .strip_prefix("sqlite://")
        .or_else(|| db_url.strip_prefix("sqlite:"))
        .unwrap_or(db_url);
    let file = rest.split('?').next().unwrap_or(rest);
    if file.is_empty() || file == ":memory:" {
        None
    } else {
        Some(Path::new(file))
    }
}

/// Open the SQLite pool, creating the file and its directory on first start,
/// and bring the schema up to date.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", redact_db_url(db_url));

    let file = sqlite_file(db_url);
    let existed = file.map(Path::exists).unwrap_or(false);
    if let Some(dir) = file.and_then(Path::parent).filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }

    let connect_options = match file {
        Some(path) => sqlx::sqlite::SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true),
        None => db_url.parse::<sqlx::sqlite::SqliteConnectOptions>()?,
    };

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    match file {
        Some(path) if existed => tracing::info!("Opened database file {}", path.display()),
        Some(path) => tracing::info!("Created database file {}", path.display()),
        None => tracing::info!("Using in-memory database"),
    }

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Spawn background workers:
/// - periodic sweep of expired per-viewer calendar snapshots
///
/// Workers are spawned as `tokio::spawn` tasks and returned as `JoinHandle<()>`s
/// so callers can await shutdown. Each worker listens for a shutdown
/// notification via a `tokio::sync::broadcast::Sender<()>`.
pub fn spawn_background_workers(
    state: Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // Calendar snapshot sweeper
    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        let interval = std::time::Duration::from_secs(state.config.calendar.sweep_interval_seconds);
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Calendar snapshot sweeper shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }

                let dropped = state.calendar.sweep_expired().await;
                if dropped > 0 {
                    tracing::debug!("Dropped {} expired calendar snapshots", dropped);
                }
            }
        }));
    }

    handles
}
