//! Subscriber commands, independent of any chat transport.

use handlewatch_schema::{SubscriberId, Target, TargetError};
use handlewatch_scheduler::Monitor;
use tracing::info;

pub const USAGE: &str = "Instagram handle watcher\n\
/add <username> - watch a username\n\
/remove <username> - stop watching a username\n\
/list - show your watchlist\n\
/check <username> - check a username right now\n\
/status <username> - show the last confirmed status";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Add(String),
    Remove(String),
    List,
    Check(String),
    Status(String),
}

/// Normalizes a command argument, or returns the reply explaining the problem.
fn argument(command: &str, raw: &str) -> Result<Target, String> {
    if raw.trim().is_empty() {
        return Err(format!("Usage: /{command} username"));
    }
    Target::parse(raw).map_err(|err: TargetError| format!("⚠ {err}"))
}

/// Runs one command for `subscriber` and returns the reply text.
pub async fn execute(monitor: &Monitor, subscriber: &SubscriberId, command: Command) -> String {
    match command {
        Command::Start | Command::Help => USAGE.to_string(),
        Command::List => list(monitor, subscriber).await,
        Command::Add(raw) => match argument("add", &raw) {
            Ok(target) => add(monitor, subscriber, &target).await,
            Err(reply) => reply,
        },
        Command::Remove(raw) => match argument("remove", &raw) {
            Ok(target) => remove(monitor, subscriber, &target).await,
            Err(reply) => reply,
        },
        Command::Check(raw) => match argument("check", &raw) {
            Ok(target) => check(monitor, &target).await,
            Err(reply) => reply,
        },
        Command::Status(raw) => match argument("status", &raw) {
            Ok(target) => status(monitor, &target).await,
            Err(reply) => reply,
        },
    }
}

async fn add(monitor: &Monitor, subscriber: &SubscriberId, target: &Target) -> String {
    if monitor.registry().add(subscriber, target).await {
        info!(subscriber = %subscriber, target = %target, "target added");
        format!("✅ Added {target} to your watchlist.")
    } else {
        format!("{target} is already in your watchlist.")
    }
}

async fn remove(monitor: &Monitor, subscriber: &SubscriberId, target: &Target) -> String {
    if monitor.registry().remove(subscriber, target).await {
        info!(subscriber = %subscriber, target = %target, "target removed");
        format!("❌ Removed {target} from your watchlist.")
    } else {
        format!("{target} not found in your watchlist.")
    }
}

async fn check(monitor: &Monitor, target: &Target) -> String {
    let observation = monitor.check(target).await;
    match observation.detail {
        Some(detail) => format!("🔎 {target} → {}\n{detail}", observation.kind.label()),
        None => format!("🔎 {target} → {}", observation.kind.label()),
    }
}

async fn status(monitor: &Monitor, target: &Target) -> String {
    match monitor.status(target).await {
        Some(record) if record.pending == record.confirmed => {
            format!("📊 {target} → {}", record.confirmed.label())
        }
        Some(record) => format!(
            "📊 {target} → {} (seen once: {})",
            record.confirmed.label(),
            record.pending.label()
        ),
        None => format!("{target} has not been checked yet."),
    }
}

async fn list(monitor: &Monitor, subscriber: &SubscriberId) -> String {
    let targets = monitor.registry().list(subscriber).await;
    if targets.is_empty() {
        return "📭 Your watchlist is empty.".to_string();
    }
    let lines: Vec<&str> = targets.iter().map(Target::as_str).collect();
    format!("📌 Your Watchlist:\n{}", lines.join("\n"))
}
