//! Aggregate counts reported by `/status`.

use std::sync::Arc;

use mongodb::bson::doc;

use super::ports::Counter;
use crate::core::error::StoreResult;

/// Counts over the users and groups collections.
#[derive(Clone)]
pub struct StatsProvider {
    users: Arc<dyn Counter>,
    groups: Arc<dyn Counter>,
}

impl StatsProvider {
    pub fn new(users: Arc<dyn Counter>, groups: Arc<dyn Counter>) -> Self {
        Self { users, groups }
    }

    pub async fn count_users(&self) -> StoreResult<u64> {
        self.users.count(doc! {}).await
    }

    pub async fn count_groups(&self) -> StoreResult<u64> {
        self.groups.count(doc! {}).await
    }
}
