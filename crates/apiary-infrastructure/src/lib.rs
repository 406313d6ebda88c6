// SPDX-License-Identifier: GPL-3.0-or-later
pub mod memory_adapters;
pub mod repositories;
pub mod sqlite_adapters;

pub use memory_adapters::InMemorySnatchHistoryRepository;
pub use repositories::SnatchHistoryRepository;
pub use sqlite_adapters::SqliteSnatchHistoryRepository;

use anyhow::Result;
use apiary_config::DatabaseConfig;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

/// Open the history database, creating the file and its directory when needed, and run migrations.
pub async fn init_database(config: &DatabaseConfig) -> Result<SqlitePool> {
    info!(target: "infrastructure", "initializing database");

    let db_url = normalize_sqlite_url(&config.url, &std::env::current_dir()?);
    if let Some(parent) = sqlite_file_path(&config.url).and_then(Path::parent) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
            info!(target: "infrastructure", path = %parent.display(), "created database directory");
        }
    }

    info!(target: "infrastructure", db_url = %db_url, "connecting to database");
    let pool = SqlitePoolOptions::new()
        .max_connections(config.pool_max_size.max(1))
        .connect(&db_url)
        .await?;

    info!(target: "infrastructure", "running migrations");
    sqlx::migrate!("../../migrations").run(&pool).await?;

    info!(target: "infrastructure", "database initialized successfully");
    Ok(pool)
}

fn sqlite_file_path(url: &str) -> Option<&Path> {
    let path = url.strip_prefix("sqlite://")?;
    if path.starts_with(":memory:") || path.is_empty() {
        return None;
    }
    Some(Path::new(path.split('?').next().unwrap_or(path)))
}

/// File-backed SQLite URLs become absolute, with forward slashes and create mode.
fn normalize_sqlite_url(url: &str, cwd: &Path) -> String {
    let Some(path) = sqlite_file_path(url) else {
        return url.to_string();
    };
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    };
    let path_str = absolute.to_string_lossy().replace('\\', "/");
    format!("sqlite://{}?mode=rwc", path_str)
}
