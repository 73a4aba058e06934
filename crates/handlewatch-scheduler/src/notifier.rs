use anyhow::Result;
use async_trait::async_trait;
use handlewatch_schema::SubscriberId;

/// Delivers alert text to a subscriber's channel. Errors are reported to the
/// caller for logging and never abort a cycle.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber: &SubscriberId, text: &str) -> Result<()>;
}
