//! Store traits describing the relational persistence adapter.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{QuakeUpdate, QueryRequest, QueryResult};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store temporarily unavailable: {message}")]
    Transient { message: String },
    #[error("store call exceeded {0:?}")]
    Timeout(Duration),
    #[error("write violates constraint `{constraint}`: {message}")]
    Constraint { constraint: String, message: String },
    #[error("store error: {message}")]
    Fatal { message: String },
}

impl StoreError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self::Transient {
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
        }
    }

    /// Whether a second attempt might succeed without any change on the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. } | StoreError::Timeout(_))
    }
}

/// Transaction isolation for read templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadIsolation {
    #[default]
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl ReadIsolation {
    pub fn as_sql(self) -> &'static str {
        match self {
            ReadIsolation::ReadUncommitted => "READ UNCOMMITTED",
            ReadIsolation::ReadCommitted => "READ COMMITTED",
            ReadIsolation::RepeatableRead => "REPEATABLE READ",
            ReadIsolation::Serializable => "SERIALIZABLE",
        }
    }
}

/// One checked-out connection. Dropping the session returns it to the pool.
#[async_trait]
pub trait StoreSession: Send {
    async fn ping(&mut self) -> Result<(), StoreError>;

    /// Run the template for `request` and return its declared columns with every row.
    async fn fetch(
        &mut self,
        request: &QueryRequest,
        isolation: ReadIsolation,
    ) -> Result<QueryResult, StoreError>;

    /// Apply `update` in its own transaction, returning the number of rows changed.
    async fn update(&mut self, update: &QuakeUpdate) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait QuakeStore: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn StoreSession>, StoreError>;
}
