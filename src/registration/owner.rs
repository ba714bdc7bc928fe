use std::sync::Arc;

use mongodb::bson::doc;
use tracing::info;

use crate::core::error::{StoreError, StoreResult};
use crate::core::types::{Role, now};
use crate::storage::ports::Upserter;

/// Startup step that pins the configured owner.
///
/// Any other user still holding the owner role is demoted to admin first, then
/// the configured id is upserted as owner. The two writes are not
/// transactional; a failed demotion stops before the upsert.
#[derive(Clone)]
pub struct OwnerBootstrapper {
    users: Arc<dyn Upserter>,
}

impl OwnerBootstrapper {
    pub fn new(users: Arc<dyn Upserter>) -> Self {
        Self { users }
    }

    pub async fn ensure_owner(&self, owner_id: i64) -> StoreResult<()> {
        if owner_id == 0 {
            return Err(StoreError::InvalidArgument("owner id"));
        }

        let ts = now();

        let demoted = self
            .users
            .update_many(
                doc! { "role": Role::Owner.as_ref(), "user_id": { "$ne": owner_id } },
                doc! { "$set": { "role": Role::Admin.as_ref(), "updated_at": ts } },
            )
            .await?;

        let upserted = self
            .users
            .update_one(
                doc! { "user_id": owner_id },
                doc! {
                    "$set": { "user_id": owner_id, "role": Role::Owner.as_ref(), "updated_at": ts },
                    "$setOnInsert": { "created_at": ts },
                },
                true,
            )
            .await?;

        info!(
            event = "owner_bootstrap",
            owner_id,
            demoted_owners = demoted.modified,
            matched_owner = upserted.matched,
            upserted_owner = u64::from(upserted.upserted),
            "ensured bot owner"
        );

        Ok(())
    }
}
