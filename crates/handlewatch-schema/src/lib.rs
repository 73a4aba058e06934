use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum characters kept from a diagnostic payload.
pub const DETAIL_MAX_CHARS: usize = 300;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target name is empty")]
    Empty,
    #[error("target name {0:?} contains invalid characters")]
    InvalidCharacters(String),
}

/// Case-normalized handle of a watched account.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Target(String);

impl Target {
    /// Normalizes user or file input into a target name.
    pub fn parse(raw: &str) -> Result<Self, TargetError> {
        let trimmed = raw.trim();
        let name = trimmed.strip_prefix('@').unwrap_or(trimmed);
        if name.is_empty() {
            return Err(TargetError::Empty);
        }
        if name.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(TargetError::InvalidCharacters(name.to_string()));
        }
        Ok(Self(name.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Files written by hand or by older builds may hold mixed-case names.
impl<'de> Deserialize<'de> for Target {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Target::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Notification channel identifier (a Telegram chat id in decimal form).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriberId(String);

impl SubscriberId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<i64> for SubscriberId {
    fn from(chat_id: i64) -> Self {
        Self(chat_id.to_string())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Active,
    Private,
    NotFound,
    RateLimited,
    Unknown,
    TransportError,
}

impl StatusKind {
    /// Text shown to subscribers.
    pub fn label(self) -> &'static str {
        match self {
            StatusKind::Active => "ACTIVE",
            StatusKind::Private => "PRIVATE",
            StatusKind::NotFound => "BANNED / NOT FOUND",
            StatusKind::RateLimited => "RATE LIMITED",
            StatusKind::Unknown => "UNKNOWN",
            StatusKind::TransportError => "ERROR",
        }
    }

    /// Maps a bare persisted tag, including the free-form strings older
    /// snapshots stored, onto a status kind.
    pub fn from_legacy(tag: &str) -> Self {
        let upper = tag.trim().to_uppercase();
        match upper.as_str() {
            "ACTIVE" => StatusKind::Active,
            "PRIVATE" => StatusKind::Private,
            "NOT_FOUND" | "BANNED / NOT FOUND" | "BANNED / SUSPENDED" => StatusKind::NotFound,
            "RATE_LIMITED" | "RATE LIMITED" => StatusKind::RateLimited,
            "TRANSPORT_ERROR" => StatusKind::TransportError,
            _ if upper.starts_with("ERROR") => StatusKind::TransportError,
            _ => StatusKind::Unknown,
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One classification result. Only `kind` takes part in state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub kind: StatusKind,
    #[serde(default)]
    pub detail: Option<String>,
}

impl Observation {
    pub fn new(kind: StatusKind) -> Self {
        Self { kind, detail: None }
    }

    pub fn with_detail(kind: StatusKind, detail: impl AsRef<str>) -> Self {
        Self {
            kind,
            detail: Some(bounded_detail(detail.as_ref())),
        }
    }

    pub fn unknown(detail: impl AsRef<str>) -> Self {
        Self::with_detail(StatusKind::Unknown, detail)
    }

    pub fn transport_error(cause: impl AsRef<str>) -> Self {
        Self::with_detail(StatusKind::TransportError, cause)
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {detail}", self.kind.label()),
            None => f.write_str(self.kind.label()),
        }
    }
}

/// Flattens newlines and truncates to [`DETAIL_MAX_CHARS`].
pub fn bounded_detail(raw: &str) -> String {
    raw.chars()
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .take(DETAIL_MAX_CHARS)
        .collect()
}

/// Debounce state of one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub confirmed: StatusKind,
    pub pending: StatusKind,
}

impl StatusRecord {
    pub fn first_seen(kind: StatusKind) -> Self {
        Self {
            confirmed: kind,
            pending: kind,
        }
    }
}

/// On-disk shape of a status record. Old snapshots stored a bare tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersistedRecord {
    Pair(StatusRecord),
    Bare(String),
}

impl From<PersistedRecord> for StatusRecord {
    fn from(persisted: PersistedRecord) -> Self {
        match persisted {
            PersistedRecord::Pair(record) => record,
            PersistedRecord::Bare(tag) => StatusRecord::first_seen(StatusKind::from_legacy(&tag)),
        }
    }
}
