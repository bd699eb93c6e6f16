use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use crate::core::errors::{AppError, AppResult};

#[derive(Debug, Clone)]
pub struct StoredBundle {
    pub key: String,
    pub value: Value,
    pub updated_at: DateTime<Utc>,
}

fn parse_timestamp(value: String) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|err| AppError::Database(format!("invalid timestamp {value}: {err}")))
}

pub async fn get_bundle(pool: &SqlitePool, key: &str) -> AppResult<Option<StoredBundle>> {
    let maybe_row = sqlx::query("SELECT key, value_json, updated_at FROM bundles WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    maybe_row.map(map_bundle).transpose()
}

pub async fn put_bundle(pool: &SqlitePool, key: &str, value: &Value) -> AppResult<()> {
    sqlx::query(
        r#"
        INSERT INTO bundles (key, value_json)
        VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET
          value_json = excluded.value_json,
          updated_at = (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        "#,
    )
    .bind(key)
    .bind(value.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn delete_bundle(pool: &SqlitePool, key: &str) -> AppResult<bool> {
    let affected = sqlx::query("DELETE FROM bundles WHERE key = ?1")
        .bind(key)
        .execute(pool)
        .await?
        .rows_affected();
    Ok(affected > 0)
}

/// Prefix match without LIKE so keys containing `%` or `_` stay literal.
pub async fn list_bundles_by_prefix(pool: &SqlitePool, prefix: &str) -> AppResult<Vec<StoredBundle>> {
    let rows = sqlx::query(
        r#"
        SELECT key, value_json, updated_at
        FROM bundles
        WHERE substr(key, 1, length(?1)) = ?1
        ORDER BY key ASC
        "#,
    )
    .bind(prefix)
    .fetch_all(pool)
    .await?;

    rows.into_iter().map(map_bundle).collect()
}

fn map_bundle(row: sqlx::sqlite::SqliteRow) -> AppResult<StoredBundle> {
    let value_json: String = row.try_get("value_json")?;
    let updated_at: String = row.try_get("updated_at")?;
    Ok(StoredBundle {
        key: row.try_get("key")?,
        value: serde_json::from_str(&value_json)?,
        updated_at: parse_timestamp(updated_at)?,
    })
}
