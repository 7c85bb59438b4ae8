//! Database connection lifecycle.
//!
//! One provider is created per process and shared by every component. The
//! pool is opened lazily on first `acquire`; a connection goes back to the
//! pool when the returned guard is dropped.

use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Postgres;
use tokio::sync::OnceCell;

use crate::config::DatabaseConfig;
use crate::error::ChatbotError;

pub type PooledConnection = PoolConnection<Postgres>;

#[derive(Debug)]
pub struct PgConnectionProvider {
    options: PgConnectOptions,
    max_connections: u32,
    timeout: Duration,
    pool: OnceCell<PgPool>,
}

impl PgConnectionProvider {
    #[must_use]
    pub fn new(
        options: PgConnectOptions,
        max_connections: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            options,
            max_connections,
            timeout,
            pool: OnceCell::new(),
        }
    }

    /// # Errors
    ///
    /// Returns `ChatbotError::Config` if the connection parameters are invalid.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self, ChatbotError> {
        Ok(Self::new(config.connect_options()?, config.max_connections, config.timeout))
    }

    /// Upper bound applied to every statement issued through this provider.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn pool(&self) -> Result<&PgPool, ChatbotError> {
        self.pool
            .get_or_try_init(|| async {
                tracing::info!(
                    "Connecting to database {}:{}",
                    self.options.get_host(),
                    self.options.get_port()
                );
                PgPoolOptions::new()
                    .max_connections(self.max_connections)
                    .acquire_timeout(self.timeout)
                    .connect_with(self.options.clone())
                    .await
                    .map_err(|e| ChatbotError::connection(format!("Failed to connect to database: {e}")))
            })
            .await
    }

    /// Checks out a connection. Dropping it releases it back to the pool.
    ///
    /// # Errors
    ///
    /// Returns `ChatbotError::Connection` if the database cannot be reached.
    pub async fn acquire(&self) -> Result<PooledConnection, ChatbotError> {
        let pool = self.pool().await?;
        pool.acquire()
            .await
            .map_err(|e| ChatbotError::connection(format!("Failed to acquire connection: {e}")))
    }

    /// Closes the pool if it was ever opened.
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

/// Runs a database future under `limit`, turning expiry into an execution error.
///
/// # Errors
///
/// Returns the future's own error, or `ChatbotError::Execution` on timeout.
pub async fn with_timeout<T, F>(
    limit: Duration,
    fut: F,
) -> Result<T, ChatbotError>
where
    F: std::future::Future<Output = Result<T, ChatbotError>>,
{
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| ChatbotError::execution(format!("Database call timed out after {}s", limit.as_secs())))?
}
