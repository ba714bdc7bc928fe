//! Core utilities, configuration, and common functionality

pub mod config;
pub mod error;
pub mod logging;
pub mod types;
pub mod web_server;

// Re-exports for convenience
pub use config::{AppEnv, Config};
pub use error::{ConfigError, SendError, StoreError, StoreResult};
pub use logging::init_logger;
