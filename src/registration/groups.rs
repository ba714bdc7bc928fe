use std::sync::Arc;

use mongodb::bson::doc;
use tracing::{debug, info};

use crate::core::error::{StoreError, StoreResult};
use crate::core::types::now;
use crate::storage::ports::Upserter;

/// Tracks groups the bot has been seen in.
#[derive(Clone)]
pub struct GroupRegistrar {
    groups: Arc<dyn Upserter>,
}

impl GroupRegistrar {
    pub fn new(groups: Arc<dyn Upserter>) -> Self {
        Self { groups }
    }

    /// Upserts `chat_id` and returns `true` when the call inserted the record.
    ///
    /// The title is trimmed and only written when something is left, so a
    /// blank title never replaces a known one.
    pub async fn ensure_group(&self, chat_id: i64, title: &str) -> StoreResult<bool> {
        if chat_id == 0 {
            return Err(StoreError::InvalidArgument("chat id"));
        }

        let ts = now();
        let title = title.trim();

        let mut set = doc! { "last_seen_at": ts };
        if !title.is_empty() {
            set.insert("title", title);
        }

        let outcome = self
            .groups
            .update_one(
                doc! { "chat_id": chat_id },
                doc! {
                    "$set": set,
                    "$setOnInsert": { "chat_id": chat_id, "joined_at": ts },
                },
                true,
            )
            .await?;

        if outcome.upserted {
            info!(event = "group_registered", chat_id, title, "registered new group");
        } else {
            debug!(event = "group_seen", chat_id, title, "updated group last seen");
        }

        Ok(outcome.upserted)
    }
}
