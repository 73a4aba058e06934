use std::time::Duration;

use async_trait::async_trait;
use handlewatch_schema::{Observation, StatusKind, Target};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{looks_throttled, Probe, ProbeFailure, ProbeOutcome, BROWSER_USER_AGENT};

pub const DEFAULT_BASE_URL: &str = "https://i.instagram.com";
pub const DEFAULT_APP_ID: &str = "936619743392459";

/// Profile lookup through the web profile-info endpoint. With a session id it
/// runs logged in, which is far less likely to be throttled.
pub struct InstagramApiProbe {
    client: reqwest::Client,
    base_url: String,
    app_id: String,
    session_id: Option<String>,
}

#[derive(Deserialize)]
struct ProfileInfoResponse {
    data: Option<ProfileInfoData>,
}

#[derive(Deserialize)]
struct ProfileInfoData {
    user: Option<ProfileUser>,
}

#[derive(Deserialize)]
struct ProfileUser {
    #[serde(default)]
    is_private: bool,
}

impl InstagramApiProbe {
    pub fn new(
        base_url: impl Into<String>,
        app_id: impl Into<String>,
        session_id: Option<String>,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            app_id: app_id.into(),
            session_id: session_id.filter(|id| !id.is_empty()),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.session_id.is_some()
    }
}

#[async_trait]
impl Probe for InstagramApiProbe {
    fn name(&self) -> &str {
        "instagram_api"
    }

    async fn probe(&self, target: &Target) -> ProbeOutcome {
        let url = format!("{}/api/v1/users/web_profile_info/", self.base_url);
        let mut request = self
            .client
            .get(&url)
            .query(&[("username", target.as_str())])
            .header("X-IG-App-ID", &self.app_id)
            .header("Accept", "application/json");
        if let Some(session_id) = &self.session_id {
            request = request.header("Cookie", format!("sessionid={session_id}"));
        }

        let resp = match request.send().await {
            Ok(resp) => resp,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return ProbeOutcome::Conclusive(Observation::new(StatusKind::NotFound));
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return ProbeOutcome::Conclusive(Observation::new(StatusKind::RateLimited));
        }

        let body = match resp.text().await {
            Ok(body) => body,
            Err(err) => return ProbeOutcome::from_reqwest(&err),
        };

        if !status.is_success() {
            if looks_throttled(&body) {
                return ProbeOutcome::Conclusive(Observation::with_detail(
                    StatusKind::RateLimited,
                    format!("HTTP {status}"),
                ));
            }
            return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                "profile api returned HTTP {status}"
            )));
        }

        let parsed: ProfileInfoResponse = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(_) if looks_throttled(&body) => {
                return ProbeOutcome::Conclusive(Observation::new(StatusKind::RateLimited));
            }
            Err(err) => {
                return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                    "malformed profile api response: {err}"
                )));
            }
        };

        // Only an explicit `data` object speaks for the account; anything else
        // is an error page that happens to be JSON.
        let Some(data) = parsed.data else {
            if looks_throttled(&body) {
                return ProbeOutcome::Conclusive(Observation::with_detail(
                    StatusKind::RateLimited,
                    snippet(&body),
                ));
            }
            return ProbeOutcome::Inconclusive(ProbeFailure::Mechanism(format!(
                "profile api response has no data: {}",
                snippet(&body)
            )));
        };

        match data.user {
            None => ProbeOutcome::Conclusive(Observation::new(StatusKind::NotFound)),
            Some(user) if user.is_private => {
                ProbeOutcome::Conclusive(Observation::new(StatusKind::Private))
            }
            Some(_) => ProbeOutcome::Conclusive(Observation::new(StatusKind::Active)),
        }
    }
}

fn snippet(body: &str) -> String {
    body.trim().chars().take(120).collect()
}
