/// Database connection pool using bb8 over tokio-postgres.
use bb8::{ErrorSink, PooledConnection};
use bb8_postgres::PostgresConnectionManager;
use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use std::time::{Duration, Instant};
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row, Transaction};

use crate::config::DbConfig;
use crate::store::StoreError;

type Manager = PostgresConnectionManager<NoTls>;

/// A checked-out client, returned to the pool on drop.
pub type Connection<'a> = PooledConnection<'a, Manager>;

/// Forwards background connection failures to the log.
#[derive(Debug, Clone, Copy)]
struct LogSink;

impl ErrorSink<tokio_postgres::Error> for LogSink {
    fn sink(&self, error: tokio_postgres::Error) {
        tracing::error!(error = %error, "database connection error");
    }

    fn boxed_clone(&self) -> Box<dyn ErrorSink<tokio_postgres::Error>> {
        Box::new(*self)
    }
}

/// Connection pool plus the query helpers the stores use.
///
/// Connections open lazily. Idle ones are reaped after the idle timeout;
/// waiting for a connection gives up after the connect timeout.
#[derive(Clone)]
pub struct Pool {
    inner: bb8::Pool<Manager>,
}

impl Pool {
    /// Must be called inside a tokio runtime; the idle reaper is spawned here.
    pub fn new(config: &DbConfig) -> Result<Self, crate::config::ConfigError> {
        Ok(Self::with_pg_config(
            config.pg_config()?,
            config.max_connections,
            config.idle_timeout,
            config.connect_timeout,
        ))
    }

    pub fn with_pg_config(
        config: tokio_postgres::Config,
        max_connections: usize,
        idle_timeout: Duration,
        connect_timeout: Duration,
    ) -> Self {
        let max_size = u32::try_from(max_connections.max(1)).unwrap_or(u32::MAX);
        let inner = bb8::Pool::builder()
            .max_size(max_size)
            .idle_timeout(Some(idle_timeout))
            .connection_timeout(connect_timeout)
            .error_sink(Box::new(LogSink))
            .build_unchecked(Manager::new(config, NoTls));
        Self { inner }
    }

    pub async fn get(&self) -> Result<Connection<'_>, StoreError> {
        Ok(self.inner.get().await?)
    }

    /// Open and idle connection counts.
    pub fn state(&self) -> (u32, u32) {
        let state = self.inner.state();
        (state.connections, state.idle_connections)
    }

    /// Run a parameterized query, logging statement, duration and row count.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        let client = self.get().await?;
        let started = Instant::now();
        let result = client.query(sql, params).await;
        log_query(sql, started, result.as_ref().map(|rows| rows.len() as u64));
        Ok(result?)
    }

    pub async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, StoreError> {
        let client = self.get().await?;
        let started = Instant::now();
        let result = client.query_opt(sql, params).await;
        log_query(sql, started, result.as_ref().map(|row| u64::from(row.is_some())));
        Ok(result?)
    }

    /// Run `f` inside BEGIN/COMMIT. Any error rolls back; the client goes
    /// back to the pool either way.
    pub async fn with_transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: for<'c> FnOnce(&'c Transaction<'c>) -> BoxFuture<'c, Result<T, StoreError>> + Send,
        T: Send,
    {
        let mut client = self.get().await?;
        let tx = client.transaction().await?;

        let result = f(&tx).await;
        match result {
            Ok(value) => {
                tx.commit().await?;
                Ok(value)
            }
            Err(e) => {
                tracing::error!(error = %e, "transaction failed, rolling back");
                if let Err(rollback) = tx.rollback().await {
                    tracing::warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Startup connectivity check.
    pub async fn probe(&self) -> Result<DateTime<Utc>, StoreError> {
        let row = self.query_opt("SELECT NOW()", &[]).await?;
        match row {
            Some(row) => Ok(row.try_get(0)?),
            None => Ok(Utc::now()),
        }
    }
}

/// Collapse whitespace so multi-line SQL logs on one line.
fn compact(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn log_query(sql: &str, started: Instant, rows: Result<u64, &tokio_postgres::Error>) {
    let duration_ms = started.elapsed().as_millis() as u64;
    match rows {
        Ok(rows) => tracing::debug!(sql = %compact(sql), duration_ms, rows, "query executed"),
        Err(e) => tracing::error!(sql = %compact(sql), duration_ms, error = %e, "query failed"),
    }
}
