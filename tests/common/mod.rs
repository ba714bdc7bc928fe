//! Common test utilities
//!
//! Shared by the integration tests: Bot API update fixtures and a fully wired
//! dispatcher over in-memory collections.

#![allow(dead_code, clippy::expect_used)]

pub mod fixtures;

pub use fixtures::{group_chat, message_update, private_chat};

use std::sync::Arc;

use tg_gatekeeper::core::AppEnv;
use tg_gatekeeper::registration::{GroupRegistrar, UserRegistrar};
use tg_gatekeeper::storage::{MemoryCollection, StatsProvider, UserRepository};
use tg_gatekeeper::testing::{FakePinger, RecordingSender};
use tg_gatekeeper::{CommandHandlers, UpdateDispatcher};

/// Dispatcher wired the way `lifecycle::run` wires it, minus Telegram and Mongo.
pub struct BotHarness {
    pub users: Arc<MemoryCollection>,
    pub groups: Arc<MemoryCollection>,
    pub pinger: Arc<FakePinger>,
    pub sender: RecordingSender,
    pub dispatcher: UpdateDispatcher,
}

impl BotHarness {
    pub fn new(owner_id: i64) -> Self {
        Self::with_users(owner_id, Arc::new(MemoryCollection::new()))
    }

    pub fn with_users(owner_id: i64, users: Arc<MemoryCollection>) -> Self {
        let groups = Arc::new(MemoryCollection::new());
        let pinger = Arc::new(FakePinger::healthy());

        let commands = CommandHandlers::new(
            owner_id,
            AppEnv::Development,
            pinger.clone(),
            UserRepository::new(users.clone()),
            StatsProvider::new(users.clone(), groups.clone()),
        );
        let dispatcher = UpdateDispatcher::new(
            UserRegistrar::new(users.clone()),
            GroupRegistrar::new(groups.clone()),
            Arc::new(commands),
        );

        Self {
            users,
            groups,
            pinger,
            sender: RecordingSender::new(),
            dispatcher,
        }
    }

    /// Feeds a `message` update and returns the reply it produced, if any.
    pub async fn send(&self, user_id: i64, chat: serde_json::Value, text: &str) -> Option<String> {
        let before = self.sender.sent().len();
        self.dispatcher
            .handle(&message_update(user_id, chat, text), Some(&self.sender))
            .await;
        let sent = self.sender.sent();
        (sent.len() > before).then(|| sent[sent.len() - 1].1.clone())
    }
}
