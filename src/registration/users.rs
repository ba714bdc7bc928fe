use std::sync::Arc;

use mongodb::bson::doc;
use tracing::{debug, info};

use crate::core::error::{StoreError, StoreResult};
use crate::core::types::{Role, now};
use crate::storage::ports::Upserter;

/// Creates users on first sight and refreshes `last_seen_at` afterwards.
#[derive(Clone)]
pub struct UserRegistrar {
    users: Arc<dyn Upserter>,
}

impl UserRegistrar {
    pub fn new(users: Arc<dyn Upserter>) -> Self {
        Self { users }
    }

    /// Upserts `user_id` and returns `true` when the call inserted the record.
    ///
    /// New users get `role = user` and identical `created_at`, `updated_at`
    /// and `last_seen_at`. Existing users only have `updated_at` and
    /// `last_seen_at` refreshed; their role and `created_at` are untouched.
    pub async fn ensure_user(&self, user_id: i64) -> StoreResult<bool> {
        if user_id == 0 {
            return Err(StoreError::InvalidArgument("user id"));
        }

        let ts = now();
        let outcome = self
            .users
            .update_one(
                doc! { "user_id": user_id },
                doc! {
                    "$set": { "updated_at": ts, "last_seen_at": ts },
                    "$setOnInsert": {
                        "user_id": user_id,
                        "role": Role::User.as_ref(),
                        "created_at": ts,
                    },
                },
                true,
            )
            .await?;

        if outcome.upserted {
            info!(event = "user_registered", user_id, "registered new user");
        } else {
            debug!(event = "user_seen", user_id, "updated user last seen");
        }

        Ok(outcome.upserted)
    }
}
