//! MongoDB connection lifecycle and collection handles.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, Database, IndexModel};

use super::ports::{Closer, Counter, IndexManager, Pinger, Records, UpdateOutcome, Upserter, bounded};
use crate::core::error::{StoreError, StoreResult};
use crate::core::types::{GROUPS_COLLECTION, USERS_COLLECTION};

/// Owns the MongoDB client and the configured database handle.
///
/// The client is released exactly once by [`Closer::close`]; further calls are
/// no-ops and store operations issued afterwards fail with
/// [`StoreError::Closed`].
pub struct Gateway {
    client: Mutex<Option<Client>>,
    db: Database,
}

impl Gateway {
    /// Connects and verifies connectivity with a ping. A failed ping releases
    /// the client before returning the error.
    pub async fn connect(uri: &str, db_name: &str, timeout: Duration) -> StoreResult<Self> {
        if db_name.trim().is_empty() {
            return Err(StoreError::InvalidArgument("database name"));
        }

        let started = Instant::now();
        let client = bounded("connect mongo", timeout, async {
            Client::with_uri_str(uri).await.map_err(StoreError::from)
        })
        .await?;
        let db = client.database(db_name);

        let remaining = timeout.saturating_sub(started.elapsed());
        if let Err(err) = bounded("ping mongo", remaining, ping_database(&db)).await {
            let _ = tokio::time::timeout(timeout, client.shutdown()).await;
            return Err(err);
        }

        Ok(Self {
            client: Mutex::new(Some(client)),
            db,
        })
    }

    /// Handle for an arbitrary collection.
    pub fn collection(&self, name: &str) -> MongoCollection {
        MongoCollection::new(self.db.collection(name))
    }

    pub fn users(&self) -> MongoCollection {
        self.collection(USERS_COLLECTION)
    }

    pub fn groups(&self) -> MongoCollection {
        self.collection(GROUPS_COLLECTION)
    }

    fn is_open(&self) -> bool {
        self.client.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }
}

async fn ping_database(db: &Database) -> StoreResult<()> {
    db.run_command(doc! { "ping": 1 }).await?;
    Ok(())
}

#[async_trait]
impl Pinger for Gateway {
    async fn ping(&self) -> StoreResult<()> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        ping_database(&self.db).await
    }
}

#[async_trait]
impl IndexManager for Gateway {
    async fn create_unique_index(&self, collection: &str, field: &str, name: &str) -> StoreResult<()> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }

        let mut keys = Document::new();
        keys.insert(field, 1_i32);
        let model = IndexModel::builder()
            .keys(keys)
            .options(IndexOptions::builder().name(name.to_string()).unique(true).build())
            .build();

        self.db.collection::<Document>(collection).create_index(model).await?;
        Ok(())
    }
}

#[async_trait]
impl Closer for Gateway {
    async fn close(&self, timeout: Duration) -> StoreResult<()> {
        let client = self.client.lock().unwrap_or_else(PoisonError::into_inner).take();
        let Some(client) = client else {
            return Ok(());
        };

        bounded("disconnect mongo", timeout, async {
            client.shutdown().await;
            Ok(())
        })
        .await
    }
}

/// A MongoDB collection exposed through the store ports.
#[derive(Clone)]
pub struct MongoCollection {
    inner: Collection<Document>,
}

impl MongoCollection {
    pub fn new(inner: Collection<Document>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl Upserter for MongoCollection {
    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        let result = self.inner.update_one(filter, update).upsert(upsert).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        let result = self.inner.update_many(filter, update).await?;
        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted: result.upserted_id.is_some(),
        })
    }
}

#[async_trait]
impl Counter for MongoCollection {
    async fn count(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.inner.count_documents(filter).await?)
    }
}

#[async_trait]
impl Records for MongoCollection {
    async fn insert_one(&self, document: Document) -> StoreResult<()> {
        self.inner.insert_one(document).await?;
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        Ok(self.inner.find_one(filter).await?)
    }
}

/// Creates the unique `users.user_id` and `groups.chat_id` indexes, in that
/// order. The groups index is not attempted when the users index fails.
pub async fn ensure_indexes(indexes: &dyn IndexManager, timeout: Duration) -> StoreResult<()> {
    bounded(
        "create users indexes",
        timeout,
        indexes.create_unique_index(USERS_COLLECTION, "user_id", "user_id_unique"),
    )
    .await?;

    bounded(
        "create groups indexes",
        timeout,
        indexes.create_unique_index(GROUPS_COLLECTION, "chat_id", "chat_id_unique"),
    )
    .await?;

    Ok(())
}
