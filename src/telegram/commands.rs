//! `/start`, `/ping` and `/status` handlers
//!
//! Handlers never fail: store problems degrade the reply (`mongo: error`,
//! `error` counts) and delivery problems are logged. Each handler first logs
//! `command_handler` with its own name.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info, warn};

use super::dispatcher::{ChatType, UpdateMeta};
use super::sender::{MessageSender, SentMessage};
use crate::core::config::{AppEnv, timeouts};
use crate::core::error::SendError;
use crate::core::types::Role;
use crate::storage::ports::{Pinger, bounded};
use crate::storage::{StatsProvider, UserRepository};

/// Reply sent to callers who may not use `/status`.
pub const PERMISSION_DENIED: &str = "permission denied";

/// Dependencies shared by the command handlers.
pub struct CommandHandlers {
    owner_id: i64,
    app_env: AppEnv,
    started_at: Instant,
    pinger: Arc<dyn Pinger>,
    users: UserRepository,
    stats: StatsProvider,
}

impl CommandHandlers {
    pub fn new(
        owner_id: i64,
        app_env: AppEnv,
        pinger: Arc<dyn Pinger>,
        users: UserRepository,
        stats: StatsProvider,
    ) -> Self {
        Self {
            owner_id,
            app_env,
            started_at: Instant::now(),
            pinger,
            users,
            stats,
        }
    }

    /// Uses `started_at` as the process start for uptime reporting.
    pub fn with_started_at(mut self, started_at: Instant) -> Self {
        self.started_at = started_at;
        self
    }

    /// Welcome message, private chats only.
    pub async fn start(&self, meta: &UpdateMeta, sender: Option<&dyn MessageSender>) {
        log_command_handled("command_start", meta);

        if meta.chat_type != ChatType::Private {
            info!(
                event = "command_start_ignored",
                chat_type = %meta.chat_type,
                user_id = meta.user_id,
                chat_id = meta.chat_id,
                "ignored /start outside private chat"
            );
            return;
        }

        let Some(chat_id) = meta.chat_id else {
            error!(event = "command_start_send_failed", user_id = meta.user_id, "cannot send start response without chat_id");
            return;
        };

        let text = start_message(meta.user_id, self.owner_id);
        match deliver(sender, chat_id, &text).await {
            Ok(_) => info!(event = "command_start_sent", user_id = meta.user_id, chat_id, "sent start response"),
            Err(err) => error!(
                event = "command_start_send_failed",
                user_id = meta.user_id,
                chat_id,
                error = %err,
                "failed to send start response"
            ),
        }
    }

    /// Liveness reply with uptime and a store check. Always answers.
    pub async fn ping(&self, meta: &UpdateMeta, sender: Option<&dyn MessageSender>) {
        log_command_handled("command_ping", meta);

        let Some(chat_id) = meta.chat_id else {
            error!(
                event = "command_ping_send_failed",
                user_id = meta.user_id,
                chat_type = %meta.chat_type,
                "cannot send ping response without chat_id"
            );
            return;
        };

        let mongo = match bounded("ping mongo", timeouts::PING_MONGO, self.pinger.ping()).await {
            Ok(()) => "ok",
            Err(err) => {
                error!(
                    event = "command_ping_mongo_error",
                    user_id = meta.user_id,
                    chat_id,
                    chat_type = %meta.chat_type,
                    error = %err,
                    "mongo ping failed during /ping"
                );
                "error"
            }
        };

        let text = ping_message(self.app_env, self.started_at.elapsed(), mongo);
        match deliver(sender, chat_id, &text).await {
            Ok(_) => info!(
                event = "command_ping_sent",
                user_id = meta.user_id,
                chat_id,
                chat_type = %meta.chat_type,
                mongo,
                "sent ping response"
            ),
            Err(err) => error!(
                event = "command_ping_send_failed",
                user_id = meta.user_id,
                chat_id,
                chat_type = %meta.chat_type,
                mongo,
                error = %err,
                "failed to send ping response"
            ),
        }
    }

    /// Owner-only counts of registered users and connected groups.
    pub async fn status(&self, meta: &UpdateMeta, sender: Option<&dyn MessageSender>) {
        log_command_handled("command_status", meta);

        let Some(chat_id) = meta.chat_id else {
            error!(
                event = "command_status_send_failed",
                user_id = meta.user_id,
                chat_type = %meta.chat_type,
                "cannot send status response without chat_id"
            );
            return;
        };

        let role = match self.authorize(meta, chat_id).await {
            Ok(role) => role,
            Err(denial) => {
                self.deny(meta, chat_id, denial, sender).await;
                return;
            }
        };

        let (users, groups) = tokio::join!(
            bounded("count users", timeouts::STATUS_COUNT, self.stats.count_users()),
            bounded("count groups", timeouts::STATUS_COUNT, self.stats.count_groups())
        );

        let users = users.map(|n| n.to_string()).unwrap_or_else(|err| {
            error!(
                event = "command_status_user_count_error",
                user_id = meta.user_id,
                chat_id,
                role = %role,
                error = %err,
                "failed to count users for /status"
            );
            "error".to_string()
        });
        let groups = groups.map(|n| n.to_string()).unwrap_or_else(|err| {
            error!(
                event = "command_status_group_count_error",
                user_id = meta.user_id,
                chat_id,
                role = %role,
                error = %err,
                "failed to count groups for /status"
            );
            "error".to_string()
        });

        let text = status_message(self.app_env, &users, &groups);
        match deliver(sender, chat_id, &text).await {
            Ok(_) => info!(
                event = "command_status_sent",
                user_id = meta.user_id,
                chat_id,
                chat_type = %meta.chat_type,
                role = %role,
                users = %users,
                groups = %groups,
                "sent status response"
            ),
            Err(err) => error!(
                event = "command_status_send_failed",
                user_id = meta.user_id,
                chat_id,
                role = %role,
                users = %users,
                groups = %groups,
                error = %err,
                "failed to send status response"
            ),
        }
    }

    /// Logs a command nobody handles.
    pub fn unknown(&self, meta: &UpdateMeta) {
        log_command_handled("command_unknown", meta);
    }

    /// Logs a plain message.
    pub fn generic(&self, meta: &UpdateMeta) {
        info!(
            event = "generic_handler",
            handler = "generic_message",
            chat_type = %meta.chat_type,
            user_id = meta.user_id,
            chat_id = meta.chat_id,
            text = meta.log_text(),
            "handled generic message"
        );
    }

    /// Returns the caller's role when they may run `/status`.
    ///
    /// Only the configured owner id is looked up; everyone else is denied
    /// without touching the store.
    async fn authorize(&self, meta: &UpdateMeta, chat_id: i64) -> Result<Role, Denial> {
        let Some(user_id) = meta.user_id else {
            return Err(Denial::new("missing_user_id", None));
        };
        if user_id != self.owner_id {
            return Err(Denial::new("not_owner", None));
        }

        let user = match bounded("lookup user", timeouts::STATUS_LOOKUP, self.users.get_by_id(user_id)).await {
            Ok(user) => user,
            Err(err) => {
                error!(
                    event = "command_status_user_lookup_failed",
                    user_id,
                    chat_id,
                    chat_type = %meta.chat_type,
                    error = %err,
                    "failed to load user for status command"
                );
                return Err(Denial::new("user_lookup_failed", None));
            }
        };

        if user.role.priority() < Role::Owner.priority() {
            return Err(Denial::new("insufficient_role", Some(user.role)));
        }
        Ok(user.role)
    }

    async fn deny(&self, meta: &UpdateMeta, chat_id: i64, denial: Denial, sender: Option<&dyn MessageSender>) {
        let role = denial.role.as_ref().map(tracing::field::display);
        match deliver(sender, chat_id, PERMISSION_DENIED).await {
            Ok(_) => warn!(
                event = "command_status_denied",
                user_id = meta.user_id,
                chat_id,
                chat_type = %meta.chat_type,
                reason = denial.reason,
                role,
                "status command denied"
            ),
            Err(err) => error!(
                event = "command_status_send_failed",
                user_id = meta.user_id,
                chat_id,
                chat_type = %meta.chat_type,
                reason = denial.reason,
                role,
                error = %err,
                "failed to send permission denied response"
            ),
        }
    }
}

struct Denial {
    reason: &'static str,
    role: Option<Role>,
}

impl Denial {
    fn new(reason: &'static str, role: Option<Role>) -> Self {
        Self { reason, role }
    }
}

fn log_command_handled(handler: &'static str, meta: &UpdateMeta) {
    info!(
        event = "command_handler",
        handler,
        chat_type = %meta.chat_type,
        user_id = meta.user_id,
        chat_id = meta.chat_id,
        text = meta.log_text(),
        "handled command"
    );
}

async fn deliver(sender: Option<&dyn MessageSender>, chat_id: i64, text: &str) -> Result<SentMessage, SendError> {
    match sender {
        Some(sender) => sender.send(chat_id, text).await,
        None => Err(SendError::NoClient),
    }
}

/// `/start` reply. The role line says `owner` only for the configured owner.
pub fn start_message(user_id: Option<i64>, owner_id: i64) -> String {
    let role = if user_id == Some(owner_id) { Role::Owner } else { Role::User };
    [
        "Welcome to the Telegram payment bot (base build).".to_string(),
        "User registration and chat tracking are enabled; payment flows and dashboards will arrive later.".to_string(),
        format!("Your role: {role}"),
        "Status: registered".to_string(),
    ]
    .join("\n")
}

pub fn ping_message(app_env: AppEnv, uptime: Duration, mongo: &str) -> String {
    [
        "pong".to_string(),
        format!("env: {app_env}"),
        format!("uptime: {}", format_uptime(uptime)),
        format!("mongo: {mongo}"),
    ]
    .join("\n")
}

pub fn status_message(app_env: AppEnv, users: &str, groups: &str) -> String {
    [
        "bot_status: running".to_string(),
        format!("env: {app_env}"),
        format!("connected_chats: {groups}"),
        format!("registered_users: {users}"),
    ]
    .join("\n")
}

/// Whole-second duration as `1h2m3s`, `4m0s` or `5s`.
pub fn format_uptime(uptime: Duration) -> String {
    let total = uptime.as_secs();
    let (hours, minutes, seconds) = (total / 3600, (total % 3600) / 60, total % 60);
    match (hours, minutes) {
        (0, 0) => format!("{seconds}s"),
        (0, _) => format!("{minutes}m{seconds}s"),
        _ => format!("{hours}h{minutes}m{seconds}s"),
    }
}
