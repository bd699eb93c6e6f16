use std::path::Path;
use std::str::FromStr;

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous},
    SqlitePool,
};

use crate::core::errors::{AppError, AppResult};

pub mod repositories;

use repositories::bundles;

/// Durable keyed storage for opaque JSON bundles.
pub trait BundleStore: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Option<Value>>>;
    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, AppResult<()>>;
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<bool>>;
    fn list_by_prefix<'a>(&'a self, prefix: &'a str)
        -> BoxFuture<'a, AppResult<Vec<(String, Value)>>>;
}

#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(app_data_dir: &Path) -> AppResult<Self> {
        std::fs::create_dir_all(app_data_dir)?;
        let db_path = app_data_dir.join("lumi-reader.sqlite");
        let connect_options = SqliteConnectOptions::from_str(&format!(
            "sqlite:{}",
            db_path.to_string_lossy().replace('\\', "/")
        ))
        .map_err(|err| AppError::Database(err.to_string()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./src/db/migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn in_memory() -> AppResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./src/db/migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl BundleStore for Database {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<Option<Value>>> {
        async move {
            let stored = bundles::get_bundle(&self.pool, key).await?;
            Ok(stored.map(|bundle| bundle.value))
        }
        .boxed()
    }

    fn set<'a>(&'a self, key: &'a str, value: Value) -> BoxFuture<'a, AppResult<()>> {
        async move { bundles::put_bundle(&self.pool, key, &value).await }.boxed()
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, AppResult<bool>> {
        async move { bundles::delete_bundle(&self.pool, key).await }.boxed()
    }

    fn list_by_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> BoxFuture<'a, AppResult<Vec<(String, Value)>>> {
        async move {
            let stored = bundles::list_bundles_by_prefix(&self.pool, prefix).await?;
            Ok(stored
                .into_iter()
                .map(|bundle| (bundle.key, bundle.value))
                .collect())
        }
        .boxed()
    }
}
