use std::sync::Arc;

use chrono::{DateTime, Utc};
use handlewatch_scheduler::Monitor;

/// Shared state for the health routes.
#[derive(Clone)]
pub struct AppState {
    pub monitor: Arc<Monitor>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(monitor: Arc<Monitor>) -> Self {
        Self {
            monitor,
            started_at: Utc::now(),
        }
    }
}
