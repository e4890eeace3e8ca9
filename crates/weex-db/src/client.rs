//! Database client and connection management

use crate::DbResult;
use chrono_tz::Tz;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Database client wrapping a sqlx SQLite pool
#[derive(Debug, Clone)]
pub struct DbClient {
    pool: SqlitePool,
    tz: Tz,
}

impl DbClient {
    /// Open an existing database read-only
    pub async fn new(database_url: &str) -> DbResult<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?.read_only(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(opts)
            .await?;

        Ok(Self { pool, tz: Tz::UTC })
    }

    /// Private in-memory database, writable
    pub async fn in_memory() -> DbResult<Self> {
        // Every connection to :memory: is a separate database, so keep exactly one alive
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Ok(Self { pool, tz: Tz::UTC })
    }

    /// Station time zone used to align aggregation intervals
    pub fn with_timezone(mut self, tz: Tz) -> Self {
        self.tz = tz;
        self
    }

    pub fn timezone(&self) -> &Tz {
        &self.tz
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Test the database connection
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_ping() {
        let client = DbClient::in_memory()
            .await
            .unwrap()
            .with_timezone(chrono_tz::Europe::London);
        client.ping().await.unwrap();
        assert_eq!(client.timezone(), &chrono_tz::Europe::London);
        client.close().await;
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let result = DbClient::new("sqlite:///nonexistent/dir/weewx.sdb").await;
        assert!(result.is_err());
    }
}
