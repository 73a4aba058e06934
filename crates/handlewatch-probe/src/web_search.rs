use std::time::Duration;

use async_trait::async_trait;
use handlewatch_schema::{Observation, StatusKind, Target};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{Probe, ProbeFailure, ProbeOutcome};

pub const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const RESULT_COUNT: u32 = 10;
const PROFILE_HOST: &str = "instagram.com";

/// Looks for the profile among web search results. A hit proves the profile
/// was recently reachable; a miss proves nothing, so it is never conclusive.
pub struct WebSearchProbe {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

#[derive(Deserialize)]
struct BraveSearchResponse {
    web: Option<BraveWebResults>,
}

#[derive(Deserialize)]
struct BraveWebResults {
    results: Vec<BraveWebResult>,
}

#[derive(Deserialize)]
struct BraveWebResult {
    url: String,
}

impl WebSearchProbe {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Probe for WebSearchProbe {
    fn name(&self) -> &str {
        "web_search"
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let query = format!("site:{PROFILE_HOST} \"{target}\"");
        let count = RESULT_COUNT.to_string();
        let resp = match self
            .client
            .get(&self.endpoint)
            .header("X-Subscription-Token", &self.api_key)
            .header("Accept", "application/json")
            .query(&[("q", query.as_str()), ("count", count.as_str())])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProbeOutcome::Conclusive(Observation::with_detail(
                StatusKind::RateLimited,
                "search api quota exhausted",
            ));
        }
        if !status.is_success() {
            return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                "search api error (HTTP {status})"
            )));
        }

        let search: BraveSearchResponse = match resp.json().await {
            Ok(search) => search,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        let results = search.web.map(|web| web.results).unwrap_or_default();
        match results.iter().find(|r| is_profile_url(&r.url, target)) {
            Some(hit) => ProbeOutcome::Conclusive(Observation::with_detail(
                StatusKind::Active,
                format!("search hit {}", hit.url),
            )),
            None => ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                "no search result for {target}"
            ))),
        }
    }
}

fn is_profile_url(raw: &str, target: &Target) -> bool {
    let Ok(url) = reqwest::Url::parse(raw) else {
        return false;
    };
    let host_matches = url
        .host_str()
        .map(|host| host == PROFILE_HOST || host.ends_with(&format!(".{PROFILE_HOST}")))
        .unwrap_or(false);
    host_matches && url.path().trim_matches('/').eq_ignore_ascii_case(target.as_str())
}
