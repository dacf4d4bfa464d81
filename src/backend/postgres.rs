//! Postgres client backed by a lazily connecting sqlx pool.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection};

use crate::backend::{BackendError, SqlClient, SqlValue};
use crate::config::DatabaseConfig;

const MAX_CONNECTIONS: u32 = 4;

/// Pooled Postgres connection.
///
/// Construction performs no I/O; the first statement opens a connection, so
/// an unreachable server surfaces as an error from `execute`.
#[derive(Debug, Clone)]
pub struct PgClient {
    pool: PgPool,
    options: PgConnectOptions,
    connect_timeout: Duration,
}

impl PgClient {
    pub fn new(config: &DatabaseConfig) -> Self {
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(PgSslMode::Disable);

        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(connect_timeout)
            .connect_lazy_with(options.clone());

        Self {
            pool,
            options,
            connect_timeout,
        }
    }
}

#[async_trait]
impl SqlClient for PgClient {
    async fn execute(&self, sql: &str, args: &[SqlValue]) -> Result<u64, BackendError> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = match arg {
                SqlValue::BigInt(value) => query.bind(*value),
                SqlValue::Text(value) => query.bind(value.as_str()),
            };
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn query_strings(&self, sql: &str) -> Result<Vec<String>, BackendError> {
        let rows = sqlx::query_scalar::<_, String>(sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    /// Bypasses the pool: its acquire loop retries refused connections and
    /// reports only `PoolTimedOut`, hiding the I/O error.
    async fn provision(&self, sql: &str) -> Result<(), BackendError> {
        let mut connection = tokio::time::timeout(self.connect_timeout, self.options.connect())
            .await
            .map_err(|_| BackendError::Timeout(self.connect_timeout))??;
        sqlx::query(sql).execute(&mut connection).await?;
        connection.close().await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
