//! Document store access: MongoDB gateway, capability ports, repositories

pub mod gateway;
pub mod memory;
pub mod ports;
pub mod repository;
pub mod stats;

// Re-exports for convenience
pub use gateway::{Gateway, MongoCollection, ensure_indexes};
pub use memory::MemoryCollection;
pub use ports::{Closer, Counter, IndexManager, Pinger, Records, UpdateOutcome, Upserter};
pub use repository::{GroupRepository, UserRepository};
pub use stats::StatsProvider;
