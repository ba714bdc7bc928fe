//! In-process document collection used by tests and local runs.
//!
//! Supports the subset of MongoDB semantics the bot relies on: equality and
//! `$ne` filters, `$set` and `$setOnInsert` updates, and upserts that seed the
//! new document from the filter's equality fields.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{Bson, Document};

use super::ports::{Closer, Counter, IndexManager, Pinger, Records, UpdateOutcome, Upserter};
use crate::core::error::{StoreError, StoreResult};

/// Store call recorded by [`MemoryCollection`], in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Ping,
    UpdateOne,
    UpdateMany,
    Count,
    InsertOne,
    FindOne,
    CreateIndex(String),
    Close,
}

#[derive(Default)]
pub struct MemoryCollection {
    documents: Mutex<Vec<Document>>,
    operations: Mutex<Vec<Operation>>,
    failing: AtomicBool,
    closed: AtomicBool,
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
            ..Self::default()
        }
    }

    /// Makes every subsequent call fail with a backend error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn documents(&self) -> Vec<Document> {
        self.docs().clone()
    }

    pub fn operations(&self) -> Vec<Operation> {
        self.operations.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn docs(&self) -> MutexGuard<'_, Vec<Document>> {
        self.documents.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self, operation: Operation) -> StoreResult<()> {
        self.operations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(operation);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store unavailable".to_string()));
        }
        Ok(())
    }
}

fn matches(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| {
        let actual = document.get(key);
        match condition {
            Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')) => ops.iter().all(|(op, expected)| match op.as_str() {
                "$ne" => actual != Some(expected),
                "$eq" => actual == Some(expected),
                _ => false,
            }),
            expected => actual == Some(expected),
        }
    })
}

fn apply_set(document: &mut Document, update: &Document, operator: &str) {
    if let Ok(fields) = update.get_document(operator) {
        for (key, value) in fields {
            document.insert(key.clone(), value.clone());
        }
    }
}

fn seed_from_filter(filter: &Document) -> Document {
    let mut seeded = Document::new();
    for (key, value) in filter {
        let is_operator = matches!(value, Bson::Document(ops) if ops.keys().any(|k| k.starts_with('$')));
        if !is_operator {
            seeded.insert(key.clone(), value.clone());
        }
    }
    seeded
}

#[async_trait]
impl Pinger for MemoryCollection {
    async fn ping(&self) -> StoreResult<()> {
        self.begin(Operation::Ping)?;
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Upserter for MemoryCollection {
    async fn update_one(&self, filter: Document, update: Document, upsert: bool) -> StoreResult<UpdateOutcome> {
        self.begin(Operation::UpdateOne)?;
        let mut docs = self.docs();

        if let Some(existing) = docs.iter_mut().find(|doc| matches(doc, &filter)) {
            let before = existing.clone();
            apply_set(existing, &update, "$set");
            return Ok(UpdateOutcome {
                matched: 1,
                modified: u64::from(*existing != before),
                upserted: false,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut inserted = seed_from_filter(&filter);
        apply_set(&mut inserted, &update, "$set");
        apply_set(&mut inserted, &update, "$setOnInsert");
        docs.push(inserted);

        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted: true,
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.begin(Operation::UpdateMany)?;
        let mut outcome = UpdateOutcome::default();

        for doc in self.docs().iter_mut().filter(|doc| matches(doc, &filter)) {
            let before = doc.clone();
            apply_set(doc, &update, "$set");
            outcome.matched += 1;
            if *doc != before {
                outcome.modified += 1;
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl Counter for MemoryCollection {
    async fn count(&self, filter: Document) -> StoreResult<u64> {
        self.begin(Operation::Count)?;
        Ok(self.docs().iter().filter(|doc| matches(doc, &filter)).count() as u64)
    }
}

#[async_trait]
impl Records for MemoryCollection {
    async fn insert_one(&self, document: Document) -> StoreResult<()> {
        self.begin(Operation::InsertOne)?;
        self.docs().push(document);
        Ok(())
    }

    async fn find_one(&self, filter: Document) -> StoreResult<Option<Document>> {
        self.begin(Operation::FindOne)?;
        Ok(self.docs().iter().find(|doc| matches(doc, &filter)).cloned())
    }
}

#[async_trait]
impl IndexManager for MemoryCollection {
    async fn create_unique_index(&self, collection: &str, _field: &str, _name: &str) -> StoreResult<()> {
        self.begin(Operation::CreateIndex(collection.to_string()))
    }
}

#[async_trait]
impl Closer for MemoryCollection {
    async fn close(&self, _timeout: Duration) -> StoreResult<()> {
        self.begin(Operation::Close)?;
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
