//! Telegram bot integration and handlers

pub mod bot;
pub mod commands;
pub mod dispatcher;
pub mod sender;

// Re-exports for convenience
pub use bot::{Command, TelegramClient};
pub use commands::CommandHandlers;
pub use dispatcher::{ChatType, Route, UpdateDispatcher, UpdateMeta, UpdateType, extract_update_meta};
pub use sender::{MessageSender, SentMessage};
