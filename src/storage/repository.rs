//! Typed create/read access to user and group records.

use std::sync::Arc;

use mongodb::bson::{self, DateTime, doc};

use super::ports::Records;
use crate::core::error::{StoreError, StoreResult};
use crate::core::types::{Group, User, now};

/// User records keyed by `user_id`.
#[derive(Clone)]
pub struct UserRepository {
    records: Arc<dyn Records>,
}

impl UserRepository {
    pub fn new(records: Arc<dyn Records>) -> Self {
        Self { records }
    }

    /// Inserts `user`, stamping any timestamp still at its placeholder value
    /// with the current time. Returns the record as stored.
    pub async fn create(&self, mut user: User) -> StoreResult<User> {
        if user.user_id == 0 {
            return Err(StoreError::InvalidArgument("user_id"));
        }

        let ts = now();
        if user.created_at == DateTime::MIN {
            user.created_at = ts;
        }
        if user.updated_at == DateTime::MIN {
            user.updated_at = ts;
        }
        if user.last_seen_at.is_none() {
            user.last_seen_at = Some(ts);
        }

        self.records.insert_one(bson::to_document(&user)?).await?;
        Ok(user)
    }

    pub async fn get_by_id(&self, user_id: i64) -> StoreResult<User> {
        if user_id == 0 {
            return Err(StoreError::InvalidArgument("user_id"));
        }

        let document = self
            .records
            .find_one(doc! { "user_id": user_id })
            .await?
            .ok_or(StoreError::NotFound { entity: "user" })?;
        Ok(bson::from_document(document)?)
    }
}

/// Group records keyed by `chat_id`.
#[derive(Clone)]
pub struct GroupRepository {
    records: Arc<dyn Records>,
}

impl GroupRepository {
    pub fn new(records: Arc<dyn Records>) -> Self {
        Self { records }
    }

    /// Inserts `group`. `joined_at` defaults to now and `last_seen_at`
    /// defaults to `joined_at`.
    pub async fn create(&self, mut group: Group) -> StoreResult<Group> {
        if group.chat_id == 0 {
            return Err(StoreError::InvalidArgument("chat_id"));
        }

        if group.joined_at == DateTime::MIN {
            group.joined_at = now();
        }
        if group.last_seen_at == DateTime::MIN {
            group.last_seen_at = group.joined_at;
        }

        self.records.insert_one(bson::to_document(&group)?).await?;
        Ok(group)
    }

    pub async fn get_by_chat_id(&self, chat_id: i64) -> StoreResult<Group> {
        if chat_id == 0 {
            return Err(StoreError::InvalidArgument("chat_id"));
        }

        let document = self
            .records
            .find_one(doc! { "chat_id": chat_id })
            .await?
            .ok_or(StoreError::NotFound { entity: "group" })?;
        Ok(bson::from_document(document)?)
    }
}
