//! tg-gatekeeper - Telegram bot that keeps a registry of its users and groups
//!
//! Every incoming update registers the sender (and the group, for group
//! chats) in MongoDB before it is routed to a command handler.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging and the health endpoint
//! - `storage`: MongoDB gateway, capability ports and repositories
//! - `registration`: idempotent user/group upserts and owner bootstrap
//! - `telegram`: update dispatch, command handlers and long polling
//! - `lifecycle`: startup ordering and graceful shutdown
//! - `testing`: log capture and fakes shared by unit and integration tests

pub mod cli;
pub mod core;
pub mod lifecycle;
pub mod registration;
pub mod storage;
pub mod telegram;
pub mod testing;

// Re-export commonly used types for convenience
pub use core::{AppEnv, Config, ConfigError, SendError, StoreError, StoreResult};
pub use telegram::{CommandHandlers, UpdateDispatcher};
