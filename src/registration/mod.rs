//! Idempotent registration of users and groups, and owner bootstrap
//!
//! Every write here is a single `update_one`/`update_many` against the store,
//! so concurrent deliveries of the same Telegram update never produce
//! duplicate records.

pub mod groups;
pub mod owner;
pub mod users;

pub use groups::GroupRegistrar;
pub use owner::OwnerBootstrapper;
pub use users::UserRegistrar;
