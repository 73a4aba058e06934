pub mod chain;
pub mod config;
pub mod instagram_api;
pub mod lookup_api;
pub mod profile_page;
pub mod web_search;

use async_trait::async_trait;
use handlewatch_schema::{Observation, Target};

pub use chain::ProbeChain;
pub use config::{build_chain, ProbeConfig};
pub use instagram_api::InstagramApiProbe;
pub use lookup_api::LookupApiProbe;
pub use profile_page::ProfilePageProbe;
pub use web_search::WebSearchProbe;

pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/122.0.0.0 Safari/537.36";

const THROTTLE_MARKERS: &[&str] = &[
    "rate limit",
    "ratelimit",
    "too many requests",
    "please wait",
    "login_required",
    "checkpoint_required",
];

/// Matched as a standalone token only, so ids and pixel sizes do not count.
const THROTTLE_STATUS_CODE: &str = "429";

/// Why a probe could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The source could not be reached (timeout, connection, body read).
    Transport(String),
    /// The source answered but this probe could not interpret it.
    Mechanism(String),
}

impl ProbeFailure {
    pub fn detail(&self) -> &str {
        match self {
            ProbeFailure::Transport(detail) | ProbeFailure::Mechanism(detail) => detail,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// Stop the chain with this observation.
    Conclusive(Observation),
    /// Move on to the next probe.
    Inconclusive(ProbeFailure),
    /// No probe can handle this target; stop and report a transport error.
    Fatal(String),
}

impl ProbeOutcome {
    pub(crate) fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_builder() {
            ProbeOutcome::Fatal(format!("cannot build request: {err}"))
        } else if err.is_timeout() {
            ProbeOutcome::Inconclusive(ProbeFailure::Transport(format!("request timed out: {err}")))
        } else if err.is_decode() {
            ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!("malformed response: {err}")))
        } else {
            ProbeOutcome::Inconclusive(ProbeFailure::Transport(err.to_string()))
        }
    }
}

/// A single external data source lookup.
#[async_trait]
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;
    async fn probe(&self, target: &Target) -> ProbeOutcome;
}

/// Produces exactly one observation per target and never fails.
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, target: &Target) -> Observation;
}

/// True when a response body or error text carries throttling or login-wall markers.
pub fn looks_throttled(text: &str) -> bool {
    let lower = text.to_lowercase();
    THROTTLE_MARKERS.iter().any(|marker| lower.contains(marker))
        || contains_token(&lower, THROTTLE_STATUS_CODE)
}

fn contains_token(text: &str, token: &str) -> bool {
    text.match_indices(token).any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + token.len()..].chars().next();
        !before.is_some_and(|c| c.is_alphanumeric()) && !after.is_some_and(|c| c.is_alphanumeric())
    })
}
