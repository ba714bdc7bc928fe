//! Update classification, registration hooks and command routing
//!
//! Every inbound update goes through the same steps:
//! 1. extract an [`UpdateMeta`] from whatever shape Telegram delivered
//! 2. register the user (and the group, for group chats); failures are logged
//!    and never stop the update
//! 3. log the update (`telegram_update`)
//! 4. route messages to a command handler or the generic handler, logging the
//!    routing decision (`telegram_route`) before the handler runs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use strum::{AsRefStr, Display};
use teloxide::types::{Chat, Message, Update, UpdateKind, User};
use tracing::{error, info};

use super::bot::Command;
use super::commands::CommandHandlers;
use super::sender::MessageSender;
use crate::core::config::timeouts;
use crate::registration::{GroupRegistrar, UserRegistrar};
use crate::storage::ports::bounded;

/// Shape of an inbound update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum UpdateType {
    Message,
    EditedMessage,
    CallbackQuery,
    MyChatMember,
    ChatMember,
    #[default]
    Unknown,
}

/// Chat kind collapsed to what the bot cares about. Supergroups count as groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    #[default]
    Unknown,
}

impl ChatType {
    pub fn of(chat: &Chat) -> Self {
        if chat.is_private() {
            ChatType::Private
        } else if chat.is_group() || chat.is_supergroup() {
            ChatType::Group
        } else {
            ChatType::Unknown
        }
    }
}

/// Normalized view of an update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateMeta {
    pub update_type: UpdateType,
    pub user_id: Option<i64>,
    pub chat_id: Option<i64>,
    /// Trimmed message text or callback payload.
    pub text: String,
    pub chat_type: ChatType,
    /// Trimmed chat title, empty for private chats.
    pub chat_title: String,
    pub timestamp: Option<DateTime<Utc>>,
}

impl UpdateMeta {
    /// Text for log fields; `None` keeps empty text out of the record.
    pub(crate) fn log_text(&self) -> Option<&str> {
        (!self.text.is_empty()).then_some(self.text.as_str())
    }

    fn with_chat(mut self, chat: &Chat) -> Self {
        self.chat_id = Some(chat.id.0);
        self.chat_type = ChatType::of(chat);
        self.chat_title = chat.title().map(str::trim).unwrap_or_default().to_string();
        self
    }
}

fn user_id(user: &User) -> i64 {
    user.id.0 as i64
}

fn message_meta(update_type: UpdateType, msg: &Message) -> UpdateMeta {
    let timestamp = match update_type {
        UpdateType::EditedMessage => msg.edit_date().copied().unwrap_or(msg.date),
        _ => msg.date,
    };

    UpdateMeta {
        update_type,
        user_id: msg.from.as_ref().map(user_id),
        text: msg.text().map(str::trim).unwrap_or_default().to_string(),
        timestamp: Some(timestamp),
        ..UpdateMeta::default()
    }
    .with_chat(&msg.chat)
}

/// Extracts the normalized metadata of `update`.
pub fn extract_update_meta(update: &Update) -> UpdateMeta {
    match &update.kind {
        UpdateKind::Message(msg) => message_meta(UpdateType::Message, msg),
        UpdateKind::EditedMessage(msg) => message_meta(UpdateType::EditedMessage, msg),
        UpdateKind::CallbackQuery(query) => {
            let meta = UpdateMeta {
                update_type: UpdateType::CallbackQuery,
                user_id: Some(user_id(&query.from)),
                text: query.data.as_deref().map(str::trim).unwrap_or_default().to_string(),
                ..UpdateMeta::default()
            };
            // Accessible and inaccessible messages both expose the chat.
            match &query.message {
                Some(message) => meta.with_chat(message.chat()),
                None => meta,
            }
        }
        UpdateKind::MyChatMember(member) | UpdateKind::ChatMember(member) => {
            let update_type = match &update.kind {
                UpdateKind::MyChatMember(_) => UpdateType::MyChatMember,
                _ => UpdateType::ChatMember,
            };
            UpdateMeta {
                update_type,
                user_id: Some(user_id(&member.from)),
                timestamp: Some(member.date),
                ..UpdateMeta::default()
            }
            .with_chat(&member.chat)
        }
        _ => UpdateMeta::default(),
    }
}

/// Where a message goes after registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// A known command.
    Command(Command),
    /// Text starting with `/` that names no known command. Holds the
    /// normalized token, possibly empty.
    UnknownCommand(String),
    /// Anything else.
    Generic,
}

impl Route {
    pub fn resolve(text: &str) -> Self {
        match command_token(text) {
            None => Route::Generic,
            Some(token) => match Command::from_token(&token) {
                Some(command) => Route::Command(command),
                None => Route::UnknownCommand(token),
            },
        }
    }

    pub fn handler_name(&self) -> &'static str {
        match self {
            Route::Command(command) => command.handler_name(),
            Route::UnknownCommand(_) => "command_unknown",
            Route::Generic => "generic_message",
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Route::Generic => "message",
            _ => "command",
        }
    }

    fn command(&self) -> Option<&str> {
        match self {
            Route::Command(command) => Some(command.as_ref()),
            Route::UnknownCommand(token) if !token.is_empty() => Some(token.as_str()),
            _ => None,
        }
    }
}

/// Lowercased command token of `text`, or `None` when `text` is not a command.
///
/// `"/Start@my_bot extra"` yields `"start"`.
pub fn command_token(text: &str) -> Option<String> {
    let rest = text.trim().strip_prefix('/')?;
    let token = rest.split(' ').next().unwrap_or_default();
    let token = token.split('@').next().unwrap_or_default();
    Some(token.trim().to_lowercase())
}

/// Entry point for every update received from Telegram.
pub struct UpdateDispatcher {
    users: UserRegistrar,
    groups: GroupRegistrar,
    commands: Arc<CommandHandlers>,
}

impl UpdateDispatcher {
    pub fn new(users: UserRegistrar, groups: GroupRegistrar, commands: Arc<CommandHandlers>) -> Self {
        Self { users, groups, commands }
    }

    pub async fn handle(&self, update: &Update, sender: Option<&dyn MessageSender>) {
        self.process(extract_update_meta(update), sender).await;
    }

    /// Runs registration, logging and routing for already extracted metadata.
    pub async fn process(&self, meta: UpdateMeta, sender: Option<&dyn MessageSender>) {
        self.register(&meta).await;

        info!(
            event = "telegram_update",
            update_type = %meta.update_type,
            user_id = meta.user_id,
            chat_id = meta.chat_id,
            chat_type = %meta.chat_type,
            text = meta.log_text(),
            timestamp = meta.timestamp.as_ref().map(tracing::field::display),
            "telegram update received"
        );

        if matches!(meta.update_type, UpdateType::Message | UpdateType::EditedMessage) {
            self.route(&meta, sender).await;
        }
    }

    async fn register(&self, meta: &UpdateMeta) {
        if let Some(user_id) = meta.user_id {
            if let Err(err) = bounded("ensure user", timeouts::REGISTRATION, self.users.ensure_user(user_id)).await {
                error!(
                    event = "user_registration_failed",
                    user_id,
                    chat_id = meta.chat_id,
                    error = %err,
                    "failed to ensure user registration"
                );
            }
        }

        if meta.chat_type != ChatType::Group {
            return;
        }
        if let Some(chat_id) = meta.chat_id {
            let ensure = self.groups.ensure_group(chat_id, &meta.chat_title);
            if let Err(err) = bounded("ensure group", timeouts::REGISTRATION, ensure).await {
                error!(
                    event = "group_registration_failed",
                    chat_id,
                    chat_title = %meta.chat_title,
                    error = %err,
                    "failed to ensure group registration"
                );
            }
        }
    }

    async fn route(&self, meta: &UpdateMeta, sender: Option<&dyn MessageSender>) {
        let route = Route::resolve(&meta.text);

        info!(
            event = "telegram_route",
            handler = route.handler_name(),
            route = route.kind(),
            chat_type = %meta.chat_type,
            command = route.command(),
            user_id = meta.user_id,
            chat_id = meta.chat_id,
            "routed update"
        );

        match route {
            Route::Command(Command::Start) => self.commands.start(meta, sender).await,
            Route::Command(Command::Ping) => self.commands.ping(meta, sender).await,
            Route::Command(Command::Status) => self.commands.status(meta, sender).await,
            Route::UnknownCommand(_) => self.commands.unknown(meta),
            Route::Generic => self.commands.generic(meta),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::core::config::AppEnv;
    use crate::storage::memory::{MemoryCollection, Operation};
    use crate::storage::{StatsProvider, UserRepository};
    use crate::testing::{FakePinger, LogCapture, RecordingSender};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    const OWNER: i64 = 99;

    fn user_json(id: i64) -> Value {
        json!({ "id": id, "is_bot": false, "first_name": "Test" })
    }

    fn private_chat(id: i64) -> Value {
        json!({ "id": id, "type": "private", "first_name": "Test" })
    }

    fn group_chat(id: i64, kind: &str, title: &str) -> Value {
        json!({ "id": id, "type": kind, "title": title })
    }

    fn message_json(user: i64, chat: Value, text: &str) -> Value {
        json!({
            "message_id": 1,
            "date": 1_735_992_000,
            "chat": chat,
            "from": user_json(user),
            "text": text,
        })
    }

    fn update(kind: &str, body: Value) -> Update {
        let mut raw = json!({ "update_id": 1 });
        raw[kind] = body;
        serde_json::from_str(&raw.to_string()).expect("valid update json")
    }

    struct Harness {
        users: Arc<MemoryCollection>,
        groups: Arc<MemoryCollection>,
        dispatcher: UpdateDispatcher,
        sender: RecordingSender,
    }

    fn harness() -> Harness {
        let users = Arc::new(MemoryCollection::new());
        let groups = Arc::new(MemoryCollection::new());
        let commands = CommandHandlers::new(
            OWNER,
            AppEnv::Development,
            Arc::new(FakePinger::healthy()),
            UserRepository::new(users.clone()),
            StatsProvider::new(users.clone(), groups.clone()),
        );
        let dispatcher = UpdateDispatcher::new(
            UserRegistrar::new(users.clone()),
            GroupRegistrar::new(groups.clone()),
            Arc::new(commands),
        );
        Harness {
            users,
            groups,
            dispatcher,
            sender: RecordingSender::new(),
        }
    }

    #[test]
    fn test_extract_message() {
        let meta = extract_update_meta(&update("message", message_json(42, private_chat(42), "  hello  ")));

        assert_eq!(meta.update_type, UpdateType::Message);
        assert_eq!(meta.user_id, Some(42));
        assert_eq!(meta.chat_id, Some(42));
        assert_eq!(meta.text, "hello");
        assert_eq!(meta.chat_type, ChatType::Private);
        assert_eq!(meta.chat_title, "");
        assert_eq!(meta.timestamp.unwrap().timestamp(), 1_735_992_000);
    }

    #[test]
    fn test_extract_edited_message_uses_edit_date() {
        let mut body = message_json(42, group_chat(-100, "supergroup", " Team "), "fixed");
        body["edit_date"] = json!(1_735_992_060);

        let meta = extract_update_meta(&update("edited_message", body));

        assert_eq!(meta.update_type, UpdateType::EditedMessage);
        assert_eq!(meta.chat_type, ChatType::Group);
        assert_eq!(meta.chat_title, "Team");
        assert_eq!(meta.timestamp.unwrap().timestamp(), 1_735_992_060);
    }

    #[test]
    fn test_extract_callback_with_message() {
        let body = json!({
            "id": "cb-1",
            "from": user_json(7),
            "chat_instance": "ci",
            "data": " payload ",
            "message": message_json(1, group_chat(-5, "group", "Chat"), "menu"),
        });

        let meta = extract_update_meta(&update("callback_query", body));

        assert_eq!(meta.update_type, UpdateType::CallbackQuery);
        assert_eq!(meta.user_id, Some(7));
        assert_eq!(meta.chat_id, Some(-5));
        assert_eq!(meta.chat_type, ChatType::Group);
        assert_eq!(meta.text, "payload");
    }

    #[test]
    fn test_extract_callback_with_inaccessible_message() {
        let body = json!({
            "id": "cb-2",
            "from": user_json(7),
            "chat_instance": "ci",
            "data": "x",
            "message": { "chat": private_chat(7), "message_id": 3, "date": 0 },
        });

        let meta = extract_update_meta(&update("callback_query", body));

        assert_eq!(meta.chat_id, Some(7));
        assert_eq!(meta.chat_type, ChatType::Private);
    }

    #[test]
    fn test_extract_callback_without_message() {
        let body = json!({
            "id": "cb-3",
            "from": user_json(7),
            "chat_instance": "ci",
            "inline_message_id": "inline",
            "data": "x",
        });

        let meta = extract_update_meta(&update("callback_query", body));

        assert_eq!(meta.update_type, UpdateType::CallbackQuery);
        assert_eq!(meta.user_id, Some(7));
        assert_eq!(meta.chat_id, None);
        assert_eq!(meta.chat_type, ChatType::Unknown);
    }

    #[test]
    fn test_extract_member_updates() {
        let body = json!({
            "chat": group_chat(-100, "group", "Team"),
            "from": user_json(8),
            "date": 1_735_992_000,
            "old_chat_member": { "user": user_json(500), "status": "left" },
            "new_chat_member": { "user": user_json(500), "status": "member" },
        });

        let mine = extract_update_meta(&update("my_chat_member", body.clone()));
        let other = extract_update_meta(&update("chat_member", body));

        assert_eq!(mine.update_type, UpdateType::MyChatMember);
        assert_eq!(other.update_type, UpdateType::ChatMember);
        for meta in [mine, other] {
            assert_eq!(meta.user_id, Some(8));
            assert_eq!(meta.chat_id, Some(-100));
            assert_eq!(meta.text, "");
            assert!(meta.timestamp.is_some());
        }
    }

    #[test]
    fn test_extract_unknown_shape() {
        let body = json!({
            "id": "q-1",
            "from": user_json(3),
            "query": "search",
            "offset": "",
        });

        let meta = extract_update_meta(&update("inline_query", body));

        assert_eq!(meta, UpdateMeta::default());
        assert_eq!(meta.update_type.to_string(), "unknown");
    }

    #[test]
    fn test_update_type_names() {
        assert_eq!(UpdateType::EditedMessage.to_string(), "edited_message");
        assert_eq!(UpdateType::MyChatMember.to_string(), "my_chat_member");
        assert_eq!(ChatType::Group.to_string(), "group");
    }

    #[test]
    fn test_command_token_normalization() {
        assert_eq!(command_token("/Start@mybot extra args").as_deref(), Some("start"));
        assert_eq!(command_token("  /PING  ").as_deref(), Some("ping"));
        assert_eq!(command_token("/").as_deref(), Some(""));
        assert_eq!(command_token("hello /start"), None);
        assert_eq!(command_token(""), None);
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(Route::resolve("/Start@mybot extra args"), Route::Command(Command::Start));
        assert_eq!(Route::resolve("/status"), Route::Command(Command::Status));
        assert_eq!(Route::resolve("/bogus"), Route::UnknownCommand("bogus".to_string()));
        assert_eq!(Route::resolve("hello"), Route::Generic);
        assert_eq!(Route::resolve("/bogus").handler_name(), "command_unknown");
        assert_eq!(Route::resolve("hello").handler_name(), "generic_message");
    }

    #[tokio::test]
    async fn test_private_message_registers_user_only() {
        let h = harness();

        h.dispatcher
            .handle(&update("message", message_json(42, private_chat(42), "hi")), Some(&h.sender))
            .await;

        assert_eq!(h.users.documents().len(), 1);
        assert!(h.groups.operations().is_empty());
    }

    #[tokio::test]
    async fn test_group_message_registers_user_and_group() {
        let h = harness();

        h.dispatcher
            .handle(
                &update("message", message_json(42, group_chat(-100, "supergroup", "Team"), "hi")),
                Some(&h.sender),
            )
            .await;

        let groups = h.groups.documents();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].get_i64("chat_id").unwrap(), -100);
        assert_eq!(groups[0].get_str("title").unwrap(), "Team");
        assert_eq!(h.users.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_registration_failure_does_not_block_reply() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();
        h.users.set_failing(true);

        h.dispatcher
            .handle(&update("message", message_json(42, private_chat(42), "/ping")), Some(&h.sender))
            .await;

        let failure = logs.find("user_registration_failed").expect("failure logged");
        assert_eq!(failure.field("user_id"), Some("42"));
        assert_eq!(failure.field("chat_id"), Some("42"));
        assert!(logs.contains("command_ping_sent"));
        assert_eq!(h.sender.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_group_registration_failure_is_logged() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();
        h.groups.set_failing(true);

        h.dispatcher
            .handle(
                &update("message", message_json(42, group_chat(-7, "group", "G"), "hello")),
                Some(&h.sender),
            )
            .await;

        assert_eq!(logs.find("group_registration_failed").unwrap().field("chat_id"), Some("-7"));
        assert!(logs.contains("generic_handler"));
    }

    #[tokio::test]
    async fn test_update_log_precedes_route_log_and_handler_log() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();

        h.dispatcher
            .handle(
                &update("message", message_json(42, private_chat(42), "/Start@mybot extra args")),
                Some(&h.sender),
            )
            .await;

        let update_log = logs.position("telegram_update").expect("update logged");
        let route_log = logs.position("telegram_route").expect("route logged");
        let handler_log = logs.position("command_handler").expect("handler logged");
        assert!(update_log < route_log);
        assert!(route_log < handler_log);

        let route = logs.find("telegram_route").unwrap();
        assert_eq!(route.field("handler"), Some("command_start"));
        assert_eq!(route.field("route"), Some("command"));
        assert_eq!(route.field("command"), Some("start"));

        let handled = logs.find("command_handler").unwrap();
        assert_eq!(handled.field("handler"), Some("command_start"));

        let received = logs.find("telegram_update").unwrap();
        assert_eq!(received.field("update_type"), Some("message"));
        assert_eq!(received.field("chat_type"), Some("private"));
        assert_eq!(received.field("text"), Some("/Start@mybot extra args"));
    }

    #[tokio::test]
    async fn test_unknown_command_logs_route_and_handler() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();

        h.dispatcher
            .handle(&update("message", message_json(42, private_chat(42), "/bogus")), Some(&h.sender))
            .await;

        assert_eq!(logs.find("telegram_route").unwrap().field("handler"), Some("command_unknown"));
        assert_eq!(logs.find("command_handler").unwrap().field("handler"), Some("command_unknown"));
        assert!(h.sender.sent().is_empty());
    }

    #[tokio::test]
    async fn test_generic_message_logs_route_and_handler() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();

        h.dispatcher
            .handle(&update("message", message_json(42, private_chat(42), "hello")), Some(&h.sender))
            .await;

        let route = logs.find("telegram_route").unwrap();
        assert_eq!(route.field("handler"), Some("generic_message"));
        assert_eq!(route.field("route"), Some("message"));
        assert_eq!(route.field("command"), None);
        assert_eq!(logs.find("generic_handler").unwrap().field("handler"), Some("generic_message"));
        assert!(!logs.contains("command_handler"));
    }

    #[tokio::test]
    async fn test_non_message_updates_are_not_routed() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();
        let body = json!({
            "chat": group_chat(-100, "group", "Team"),
            "from": user_json(8),
            "date": 1_735_992_000,
            "old_chat_member": { "user": user_json(500), "status": "left" },
            "new_chat_member": { "user": user_json(500), "status": "member" },
        });

        h.dispatcher.handle(&update("my_chat_member", body), Some(&h.sender)).await;

        assert!(logs.contains("telegram_update"));
        assert!(!logs.contains("telegram_route"));
        assert_eq!(h.groups.documents().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_update_skips_registration() {
        let (logs, _guard) = LogCapture::install();
        let h = harness();

        h.dispatcher.process(UpdateMeta::default(), None).await;

        assert!(h.users.operations().is_empty());
        assert!(h.groups.operations().is_empty());
        assert_eq!(logs.find("telegram_update").unwrap().field("update_type"), Some("unknown"));
    }

    #[tokio::test]
    async fn test_status_from_non_owner_never_counts() {
        let h = harness();

        h.dispatcher
            .handle(&update("message", message_json(42, private_chat(42), "/status")), Some(&h.sender))
            .await;

        assert_eq!(h.sender.last_text().as_deref(), Some("permission denied"));
        assert!(!h.users.operations().contains(&Operation::Count));
        assert!(!h.groups.operations().contains(&Operation::Count));
    }
}
