//! Telegram client: command list, long polling and error reporting
//!
//! This module contains:
//! - Command enum definition
//! - Bot instance creation
//! - The polling loop feeding [`UpdateDispatcher`]

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};
use strum::{AsRefStr, EnumString};
use teloxide::error_handlers::ErrorHandler;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, Update};
use teloxide::update_listeners::Polling;
use teloxide::utils::command::BotCommands;
use tokio_util::sync::CancellationToken;
use tokio_util::task::AbortOnDropHandle;
use tracing::{debug, error, info, warn};

use super::dispatcher::UpdateDispatcher;
use super::sender::MessageSender;
use crate::lifecycle::Poller;

/// Update kinds requested from Telegram.
pub const ALLOWED_UPDATES: [AllowedUpdate; 5] = [
    AllowedUpdate::Message,
    AllowedUpdate::EditedMessage,
    AllowedUpdate::CallbackQuery,
    AllowedUpdate::MyChatMember,
    AllowedUpdate::ChatMember,
];

/// Commands the bot answers.
#[derive(BotCommands, Clone, Copy, Debug, PartialEq, Eq, AsRefStr, EnumString)]
#[command(rename_rule = "lowercase", description = "Available commands:")]
#[strum(serialize_all = "lowercase")]
pub enum Command {
    #[command(description = "welcome message and your role")]
    Start,
    #[command(description = "bot uptime and database health")]
    Ping,
    #[command(description = "user and group counts (owner only)")]
    Status,
}

impl Command {
    /// Resolves a lowercased command token such as `start`.
    pub fn from_token(token: &str) -> Option<Self> {
        token.parse().ok()
    }

    /// Name used in `telegram_route` and `command_handler` records.
    pub fn handler_name(self) -> &'static str {
        match self {
            Command::Start => "command_start",
            Command::Ping => "command_ping",
            Command::Status => "command_status",
        }
    }
}

/// Long-polling Telegram client.
pub struct TelegramClient {
    bot: Bot,
    dispatcher: Arc<UpdateDispatcher>,
}

impl TelegramClient {
    pub fn new(token: &SecretString, dispatcher: Arc<UpdateDispatcher>) -> Self {
        Self {
            bot: Bot::new(token.expose_secret()),
            dispatcher,
        }
    }

    /// Publishes the command list shown in Telegram clients. Failure only
    /// affects the menu, so it is logged and ignored.
    pub async fn register_commands(&self) {
        match self.bot.set_my_commands(Command::bot_commands()).await {
            Ok(_) => debug!(event = "bot_commands", "registered bot commands"),
            Err(err) => warn!(event = "bot_commands_error", error = %err, "failed to register bot commands"),
        }
    }

    async fn poll(&self, cancel: CancellationToken) {
        let handler = dptree::entry().endpoint(|bot: Bot, update: Update, dispatcher: Arc<UpdateDispatcher>| async move {
            dispatcher.handle(&update, Some(&bot as &dyn MessageSender)).await;
            respond(())
        });

        let listener = Polling::builder(self.bot.clone())
            .allowed_updates(ALLOWED_UPDATES.to_vec())
            .build();

        let mut dispatcher = Dispatcher::builder(self.bot.clone(), handler)
            .dependencies(dptree::deps![self.dispatcher.clone()])
            .error_handler(Arc::new(TelegramErrorHandler))
            .build();

        let shutdown = dispatcher.shutdown_token();
        let _stopper = stop_on_cancel(cancel, move || async move {
            // Shutdown is refused while the dispatcher is still starting up.
            loop {
                match shutdown.shutdown() {
                    Ok(stopped) => {
                        stopped.await;
                        break;
                    }
                    Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
                }
            }
        });

        info!(
            event = "telegram_listen",
            allowed_updates = ?ALLOWED_UPDATES,
            "starting telegram long polling"
        );

        dispatcher
            .dispatch_with_listener(listener, Arc::new(TelegramErrorHandler))
            .await;

        info!(event = "telegram_stopped", "telegram polling stopped");
    }
}

#[async_trait]
impl Poller for TelegramClient {
    async fn run(&self, cancel: CancellationToken) {
        self.poll(cancel).await;
    }
}

/// Runs `stop` once `cancel` fires. The task is aborted when the returned
/// handle is dropped, including when the polling task itself is aborted.
fn stop_on_cancel<F, Fut>(cancel: CancellationToken, stop: F) -> AbortOnDropHandle<()>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    AbortOnDropHandle::new(tokio::spawn(async move {
        cancel.cancelled().await;
        stop().await;
    }))
}

/// Logs polling and handler errors as `telegram_error`.
struct TelegramErrorHandler;

impl<E> ErrorHandler<E> for TelegramErrorHandler
where
    E: std::fmt::Debug + Send + 'static,
{
    fn handle_error(self: Arc<Self>, error: E) -> BoxFuture<'static, ()> {
        error!(event = "telegram_error", error = ?error, "telegram polling error");
        Box::pin(async {})
    }
}
