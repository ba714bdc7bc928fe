//! Outbound message delivery.

use async_trait::async_trait;
use teloxide::Bot;
use teloxide::prelude::Requester;
use teloxide::types::ChatId;

use crate::core::error::SendError;

/// Identifies a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentMessage {
    pub chat_id: i64,
    pub message_id: i32,
}

/// Sends a plain text message to a chat.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str) -> Result<SentMessage, SendError>;
}

#[async_trait]
impl MessageSender for Bot {
    async fn send(&self, chat_id: i64, text: &str) -> Result<SentMessage, SendError> {
        let message = Requester::send_message(self, ChatId(chat_id), text).await?;
        Ok(SentMessage {
            chat_id: message.chat.id.0,
            message_id: message.id.0,
        })
    }
}
