//! Narrow capability traits over the document store.
//!
//! Components depend on the smallest capability they need (`Upserter` for the
//! registrars, `Counter` for stats, ...). Production wiring hands them a
//! [`MongoCollection`](super::gateway::MongoCollection); tests hand them a
//! [`MemoryCollection`](super::memory::MemoryCollection).

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::core::error::{StoreError, StoreResult};

/// Result of an update-style write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched: u64,
    pub modified: u64,
    /// True when the write inserted a new document.
    pub upserted: bool,
}

/// Liveness check against the store.
#[async_trait]
pub trait Pinger: Send + Sync {
    async fn ping(&self) -> StoreResult<()>;
}

/// Atomic conditional writes.
#[async_trait]
pub trait Upserter: Send + Sync {
    /// Applies `update` (`$set` / `$setOnInsert`) to the first document
    /// matching `filter`, inserting one when nothing matches and `upsert` is set.
    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome>;

    /// Applies `update` (`$set`) to every document matching `filter`.
    async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome>;
}

/// Document counts.
#[async_trait]
pub trait Counter: Send + Sync {
    async fn count(&self, filter: Document) -> StoreResult<u64>;
}

/// Plain insert and point lookup.
#[async_trait]
pub trait Records: Send + Sync {
    async fn insert_one(&self, document: Document) -> StoreResult<()>;
    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>>;
}

/// Index management for startup.
#[async_trait]
pub trait IndexManager: Send + Sync {
    async fn create_unique_index(&self, collection: &str, field: &str, name: &str) -> StoreResult<()>;
}

/// Connection teardown.
#[async_trait]
pub trait Closer: Send + Sync {
    async fn close(&self, timeout: Duration) -> StoreResult<()>;
}

/// Runs `fut` with a deadline, mapping expiry to [`StoreError::Timeout`].
pub async fn bounded<T, F>(operation: &'static str, timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout {
            operation,
            timeout_ms: timeout.as_millis(),
        }),
    }
}
