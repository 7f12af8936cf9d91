use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

/// Name under which the live game document is stored.
pub const GAME_DOCUMENT: &str = "gameState";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub version: u64,
    pub body: Value,
    pub updated_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // every connection to an in-memory database is a separate database
        let max_connections = if is_memory_url(database_url) { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn load_document(&self, name: &str) -> Result<Option<StoredDocument>> {
        let row = sqlx::query("SELECT version, body, updated_at FROM game_documents WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("failed to load document '{name}'"))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let version: i64 = row.try_get("version")?;
        let body: String = row.try_get("body")?;
        let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
        let body = serde_json::from_str(&body)
            .with_context(|| format!("stored document '{name}' is not valid json"))?;

        Ok(Some(StoredDocument {
            version: u64::try_from(version).unwrap_or_default(),
            body,
            updated_at,
        }))
    }

    /// Upserts a document. A write carrying an older version than the stored
    /// one is ignored; returns whether the row was written.
    pub async fn save_document(&self, name: &str, version: u64, body: &Value) -> Result<bool> {
        let version = i64::try_from(version).context("document version overflows i64")?;
        let result = sqlx::query(
            "INSERT INTO game_documents (name, version, body, updated_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET
                version = excluded.version,
                body = excluded.body,
                updated_at = excluded.updated_at
             WHERE excluded.version >= game_documents.version",
        )
        .bind(name)
        .bind(version)
        .bind(body.to_string())
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save document '{name}'"))?;

        let written = result.rows_affected() > 0;
        if !written {
            debug!(document = name, version, "skipped stale document write");
        }
        Ok(written)
    }
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.starts_with("sqlite::memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
