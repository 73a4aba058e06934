use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use handlewatch_schema::SubscriberId;
use handlewatch_scheduler::{Monitor, Notifier};
use teloxide::prelude::*;
use teloxide::utils::command::BotCommands;

use crate::commands::{self, Command};

#[derive(BotCommands, Clone, Debug, PartialEq, Eq)]
#[command(rename_rule = "lowercase", description = "Instagram handle watcher commands:")]
pub enum BotCommand {
    #[command(description = "show usage.")]
    Start,
    #[command(description = "show usage.")]
    Help,
    #[command(description = "watch a username.")]
    Add(String),
    #[command(description = "stop watching a username.")]
    Remove(String),
    #[command(description = "show your watchlist.")]
    List,
    #[command(description = "check a username right now.")]
    Check(String),
    #[command(description = "show the last confirmed status.")]
    Status(String),
}

impl From<BotCommand> for Command {
    fn from(command: BotCommand) -> Self {
        match command {
            BotCommand::Start => Command::Start,
            BotCommand::Help => Command::Help,
            BotCommand::Add(name) => Command::Add(name),
            BotCommand::Remove(name) => Command::Remove(name),
            BotCommand::List => Command::List,
            BotCommand::Check(name) => Command::Check(name),
            BotCommand::Status(name) => Command::Status(name),
        }
    }
}

pub fn client(token: &str) -> Bot {
    Bot::new(token)
}

/// Subscriber ids are decimal Telegram chat ids.
pub fn parse_chat_id(subscriber: &SubscriberId) -> Option<i64> {
    subscriber.as_str().parse::<i64>().ok()
}

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, subscriber: &SubscriberId, text: &str) -> Result<()> {
        let chat_id = parse_chat_id(subscriber)
            .ok_or_else(|| anyhow!("subscriber {subscriber} is not a telegram chat id"))?;
        self.bot.send_message(ChatId(chat_id), text).await?;
        tracing::debug!("delivered alert to telegram chat {chat_id}");
        Ok(())
    }
}

pub struct TelegramBot {
    bot: Bot,
    monitor: Arc<Monitor>,
}

impl TelegramBot {
    pub fn new(bot: Bot, monitor: Arc<Monitor>) -> Self {
        Self { bot, monitor }
    }

    pub async fn run_impl(self) -> Result<()> {
        let bot = self.bot;
        let monitor = self.monitor;

        if let Err(err) = bot.set_my_commands(BotCommand::bot_commands()).await {
            tracing::warn!("failed to register telegram commands: {err}");
        }

        let handler = Update::filter_message().filter_command::<BotCommand>().endpoint(
            move |bot: Bot, msg: Message, command: BotCommand| {
                let monitor = monitor.clone();
                async move {
                    let subscriber = SubscriberId::from(msg.chat.id.0);
                    tracing::debug!(subscriber = %subscriber, ?command, "command received");

                    // /check may walk the whole probe chain; keep the dispatcher free.
                    tokio::spawn(async move {
                        let reply = commands::execute(&monitor, &subscriber, command.into()).await;
                        if let Err(err) = bot.send_message(msg.chat.id, reply).await {
                            tracing::error!("failed to send reply: {err}");
                        }
                    });

                    Ok::<(), teloxide::RequestError>(())
                }
            },
        );

        Dispatcher::builder(bot, handler)
            .enable_ctrlc_handler()
            .build()
            .dispatch()
            .await;

        Ok(())
    }
}

#[async_trait]
impl crate::ChannelBot for TelegramBot {
    fn channel_type(&self) -> &str {
        "telegram"
    }

    async fn run(self: Box<Self>) -> Result<()> {
        (*self).run_impl().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_with_arguments() {
        let command = BotCommand::parse("/add Alice", "watchbot").unwrap();
        assert_eq!(Command::from(command), Command::Add("Alice".into()));

        let command = BotCommand::parse("/list", "watchbot").unwrap();
        assert_eq!(Command::from(command), Command::List);
    }

    #[test]
    fn chat_ids_round_trip_through_subscriber_ids() {
        assert_eq!(parse_chat_id(&SubscriberId::from(-100123)), Some(-100123));
        assert_eq!(parse_chat_id(&SubscriberId::new("not-a-chat")), None);
    }
}
