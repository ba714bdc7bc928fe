//! Identity records persisted in the document store.
//!
//! Field names match the stored document keys verbatim (`user_id`,
//! `created_at`, ...). Timestamps use `bson::DateTime`, which carries
//! millisecond precision, so values read back compare equal to the ones
//! written.

use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Collection holding [`User`] documents.
pub const USERS_COLLECTION: &str = "users";
/// Collection holding [`Group`] documents.
pub const GROUPS_COLLECTION: &str = "groups";

/// Authorization tier of a user.
///
/// Stored as a lowercase string. Anything the bot does not recognise is read
/// back as [`Role::Unknown`] instead of failing the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(from = "String", into = "String")]
pub enum Role {
    Owner,
    Admin,
    #[default]
    User,
    Unknown,
}

impl Role {
    /// Total order used for authorization checks: owner > admin > user > unknown.
    pub fn priority(self) -> u8 {
        match self {
            Role::Owner => 3,
            Role::Admin => 2,
            Role::User => 1,
            Role::Unknown => 0,
        }
    }
}

impl From<String> for Role {
    fn from(value: String) -> Self {
        value.trim().parse().unwrap_or(Role::Unknown)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_ref().to_string()
    }
}

/// A Telegram user known to the bot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    #[serde(default)]
    pub role: Role,
    pub created_at: DateTime,
    pub updated_at: DateTime,
    /// Absent on records created by the owner bootstrap before the owner
    /// ever talked to the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime>,
}

impl User {
    /// A user with only the id set; timestamps are stamped on insert.
    pub fn new(user_id: i64, role: Role) -> Self {
        Self {
            user_id,
            role,
            created_at: DateTime::MIN,
            updated_at: DateTime::MIN,
            last_seen_at: None,
        }
    }
}

/// A group or supergroup the bot participates in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub chat_id: i64,
    #[serde(default)]
    pub title: String,
    pub joined_at: DateTime,
    pub last_seen_at: DateTime,
}

impl Group {
    pub fn new(chat_id: i64, title: impl Into<String>) -> Self {
        Self {
            chat_id,
            title: title.into(),
            joined_at: DateTime::MIN,
            last_seen_at: DateTime::MIN,
        }
    }
}

/// Current time at the store's millisecond precision.
pub fn now() -> DateTime {
    DateTime::now()
}
