//! Test doubles shared by unit and integration tests
//!
//! - [`LogCapture`] collects `tracing` records so tests can assert on the
//!   `event` field of what the bot logged.
//! - [`RecordingSender`] stands in for the Telegram client and keeps every
//!   outbound message.
//! - [`FakePinger`] answers store pings with a scripted result.
//!
//! ```rust,ignore
//! #[tokio::test]
//! async fn test_ping_reply() {
//!     let (logs, _guard) = LogCapture::install();
//!     let sender = RecordingSender::new();
//!     // drive a handler ...
//!     assert!(logs.contains("command_ping_sent"));
//!     assert_eq!(sender.sent().len(), 1);
//! }
//! ```

pub mod logs;
pub mod recorder;

pub use logs::{CapturedEvent, LogCapture};
pub use recorder::{FakePinger, RecordingSender};
