pub mod commands;

#[cfg(feature = "telegram")]
pub mod telegram;

pub use commands::{execute, Command, USAGE};

#[async_trait::async_trait]
pub trait ChannelBot: Send {
    fn channel_type(&self) -> &str;
    async fn run(self: Box<Self>) -> anyhow::Result<()>;
}
