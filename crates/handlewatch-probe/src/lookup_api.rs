use std::time::Duration;

use async_trait::async_trait;
use handlewatch_schema::{Observation, StatusKind, Target};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{Probe, ProbeFailure, ProbeOutcome};

/// Third-party profile lookup service answering
/// `GET {base_url}/profile?username=<name>` with `{"status": "..."}`.
pub struct LookupApiProbe {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct LookupResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
}

impl LookupApiProbe {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Probe for LookupApiProbe {
    fn name(&self) -> &str {
        "lookup_api"
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let resp = match self
            .client
            .get(format!("{}/profile", self.base_url))
            .bearer_auth(&self.api_key)
            .query(&[("username", target.as_str())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        match resp.status() {
            StatusCode::NOT_FOUND => {
                return ProbeOutcome::Conclusive(Observation::new(StatusKind::NotFound));
            }
            StatusCode::TOO_MANY_REQUESTS => {
                return ProbeOutcome::Conclusive(Observation::new(StatusKind::RateLimited));
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(
                    "lookup api rejected credentials".into(),
                ));
            }
            status if !status.is_success() => {
                return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                    "lookup api returned HTTP {status}"
                )));
            }
            _ => {}
        }

        let body: LookupResponse = match resp.json().await {
            Ok(body) => body,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        let observation = match body.status.to_lowercase().as_str() {
            "active" => Observation::new(StatusKind::Active),
            "private" => Observation::new(StatusKind::Private),
            "not_found" | "banned" | "suspended" => Observation::new(StatusKind::NotFound),
            "rate_limited" => Observation::new(StatusKind::RateLimited),
            other => Observation::unknown(
                body.message
                    .unwrap_or_else(|| format!("lookup api status {other:?}")),
            ),
        };
        ProbeOutcome::Conclusive(observation)
    }
}
