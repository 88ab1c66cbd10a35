//! Postgres-backed event store.

mod catalogue;
mod util;

pub use util::map_sqlx_error;

use std::time::Duration;

use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Connection, Postgres};

use crate::application::repos::{QuakeStore, ReadIsolation, StoreError, StoreSession};
use crate::config::DatabaseSettings;
use crate::domain::{QuakeUpdate, QueryRequest, QueryResult};

/// Slack on top of the server-side statement timeout before the client gives up.
const CLIENT_TIMEOUT_GRACE: Duration = Duration::from_secs(2);

#[derive(Clone)]
pub struct PgQuakeStore {
    pool: PgPool,
    query_timeout: Duration,
}

impl PgQuakeStore {
    pub fn new(pool: PgPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(settings.max_connections.get())
            .acquire_timeout(settings.acquire_timeout)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        let mut session = self.acquire().await?;
        session.ping().await
    }
}

#[async_trait]
impl QuakeStore for PgQuakeStore {
    async fn acquire(&self) -> Result<Box<dyn StoreSession>, StoreError> {
        let conn = self.pool.acquire().await.map_err(map_sqlx_error)?;
        Ok(Box::new(PgSession {
            conn,
            query_timeout: self.query_timeout,
        }))
    }
}

pub struct PgSession {
    conn: PoolConnection<Postgres>,
    query_timeout: Duration,
}

impl PgSession {
    fn statement_timeout(&self) -> String {
        format!("{}ms", self.query_timeout.as_millis())
    }

    fn client_timeout(&self) -> Duration {
        self.query_timeout + CLIENT_TIMEOUT_GRACE
    }
}

async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreError>
where
    F: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(map_sqlx_error),
        Err(_) => Err(StoreError::Timeout(limit)),
    }
}

async fn fetch_in_transaction(
    conn: &mut PoolConnection<Postgres>,
    request: &QueryRequest,
    isolation: ReadIsolation,
    statement_timeout: String,
) -> Result<QueryResult, sqlx::Error> {
    let template = catalogue::template(request.kind());
    let mut tx = conn.begin().await?;

    sqlx::query(catalogue::set_isolation_sql(isolation))
        .execute(&mut *tx)
        .await?;
    sqlx::query(catalogue::STATEMENT_TIMEOUT_SQL)
        .bind(statement_timeout)
        .execute(&mut *tx)
        .await?;

    let rows = catalogue::bind(request).fetch_all(&mut *tx).await?;
    tx.commit().await?;

    let rows = rows
        .iter()
        .map(|row| catalogue::decode_row(template, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(QueryResult::new(catalogue::column_names(template), rows))
}

async fn update_in_transaction(
    conn: &mut PoolConnection<Postgres>,
    update: &QuakeUpdate,
    statement_timeout: String,
) -> Result<u64, sqlx::Error> {
    let mut tx = conn.begin().await?;
    sqlx::query(catalogue::STATEMENT_TIMEOUT_SQL)
        .bind(statement_timeout)
        .execute(&mut *tx)
        .await?;

    let mut qb = catalogue::build_update(update);
    let outcome = qb.build().execute(&mut *tx).await?;
    tx.commit().await?;
    Ok(outcome.rows_affected())
}

#[async_trait]
impl StoreSession for PgSession {
    async fn ping(&mut self) -> Result<(), StoreError> {
        let limit = self.client_timeout();
        bounded(
            limit,
            sqlx::query(catalogue::PING_SQL).execute(&mut *self.conn),
        )
        .await
        .map(|_| ())
    }

    async fn fetch(
        &mut self,
        request: &QueryRequest,
        isolation: ReadIsolation,
    ) -> Result<QueryResult, StoreError> {
        let limit = self.client_timeout();
        let statement_timeout = self.statement_timeout();
        bounded(
            limit,
            fetch_in_transaction(&mut self.conn, request, isolation, statement_timeout),
        )
        .await
    }

    async fn update(&mut self, update: &QuakeUpdate) -> Result<u64, StoreError> {
        let limit = self.client_timeout();
        let statement_timeout = self.statement_timeout();
        bounded(
            limit,
            update_in_transaction(&mut self.conn, update, statement_timeout),
        )
        .await
    }
}
