use std::time::Duration;

use async_trait::async_trait;
use handlewatch_schema::{Observation, StatusKind, Target};
use reqwest::StatusCode;

use crate::{Probe, ProbeOutcome, BROWSER_USER_AGENT};

pub const DEFAULT_BASE_URL: &str = "https://www.instagram.com";
const MAX_REDIRECTS: usize = 5;

const PRIVATE_PHRASE: &str = "this account is private";
const UNAVAILABLE_PHRASES: &[&str] = &[
    "sorry, this page isn't available",
    "the link you followed may be broken",
    "page may have been removed",
    "page isn&#39;t available",
];

/// Anonymous fetch of the public profile page, classified by status code and
/// page phrases.
pub struct ProfilePageProbe {
    client: reqwest::Client,
    base_url: String,
}

impl ProfilePageProbe {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Probe for ProfilePageProbe {
    fn name(&self) -> &str {
        "profile_page"
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let url = match reqwest::Url::parse(&format!("{}/{}/", self.base_url, target)) {
            Ok(url) => url,
            Err(err) => return ProbeOutcome::Fatal(format!("invalid profile url: {err}")),
        };

        let resp = match self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9")
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        let status = resp.status();
        let page = match resp.text().await {
            Ok(text) => text.to_lowercase(),
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        ProbeOutcome::Conclusive(classify_page(status, &page, target))
    }
}

/// `page` must already be lower-cased.
pub fn classify_page(status: StatusCode, page: &str, target: &Target) -> Observation {
    if status == StatusCode::NOT_FOUND || page.contains("page not found") {
        return Observation::new(StatusKind::NotFound);
    }
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Observation::new(StatusKind::RateLimited);
    }
    if page.contains(PRIVATE_PHRASE) {
        return Observation::new(StatusKind::Private);
    }
    if UNAVAILABLE_PHRASES.iter().any(|phrase| page.contains(phrase)) {
        return Observation::new(StatusKind::NotFound);
    }
    if page.contains(target.as_str()) {
        return Observation::new(StatusKind::Active);
    }
    Observation::unknown(page)
}
