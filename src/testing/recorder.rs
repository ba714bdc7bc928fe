//! Scripted stand-ins for the Telegram client and the store ping

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::core::error::{SendError, StoreError, StoreResult};
use crate::storage::ports::Pinger;
use crate::telegram::sender::{MessageSender, SentMessage};

/// Message sender that records every call instead of talking to Telegram.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(i64, String)>>,
    failing: AtomicBool,
    next_id: AtomicI32,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails after being recorded.
    pub fn failing() -> Self {
        let sender = Self::default();
        sender.failing.store(true, Ordering::SeqCst);
        sender
    }

    /// `(chat_id, text)` pairs in send order.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Text of the most recent message.
    pub fn last_text(&self) -> Option<String> {
        self.sent().last().map(|(_, text)| text.clone())
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send(&self, chat_id: i64, text: &str) -> Result<SentMessage, SendError> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((chat_id, text.to_string()));

        if self.failing.load(Ordering::SeqCst) {
            return Err(SendError::Other("telegram unavailable".to_string()));
        }

        Ok(SentMessage {
            chat_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}

/// Pinger returning a fixed verdict and counting calls.
#[derive(Debug, Default)]
pub struct FakePinger {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakePinger {
    pub fn healthy() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let pinger = Self::default();
        pinger.failing.store(true, Ordering::SeqCst);
        pinger
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Pinger for FakePinger {
    async fn ping(&self) -> StoreResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("ping failed".to_string()));
        }
        Ok(())
    }
}
