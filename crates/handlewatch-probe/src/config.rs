use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::{
    instagram_api, profile_page, web_search, InstagramApiProbe, LookupApiProbe, Probe,
    ProbeChain, ProfilePageProbe, WebSearchProbe,
};

/// One entry of the ordered `probes:` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ProbeConfig {
    InstagramApi {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default = "default_instagram_api_base")]
        base_url: String,
        #[serde(default = "default_app_id")]
        app_id: String,
    },
    ProfilePage {
        #[serde(default = "default_profile_page_base")]
        base_url: String,
    },
    WebSearch {
        api_key: String,
        #[serde(default = "default_search_endpoint")]
        endpoint: String,
    },
    LookupApi {
        base_url: String,
        api_key: String,
    },
}

impl ProbeConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeConfig::InstagramApi { .. } => "instagram_api",
            ProbeConfig::ProfilePage { .. } => "profile_page",
            ProbeConfig::WebSearch { .. } => "web_search",
            ProbeConfig::LookupApi { .. } => "lookup_api",
        }
    }

    /// Default chain: logged-in (or anonymous) profile api, then the public page.
    pub fn default_chain() -> Vec<ProbeConfig> {
        vec![
            ProbeConfig::InstagramApi {
                session_id: None,
                base_url: default_instagram_api_base(),
                app_id: default_app_id(),
            },
            ProbeConfig::ProfilePage {
                base_url: default_profile_page_base(),
            },
        ]
    }
}

fn default_instagram_api_base() -> String {
    instagram_api::DEFAULT_BASE_URL.to_string()
}

fn default_app_id() -> String {
    instagram_api::DEFAULT_APP_ID.to_string()
}

fn default_profile_page_base() -> String {
    profile_page::DEFAULT_BASE_URL.to_string()
}

fn default_search_endpoint() -> String {
    web_search::BRAVE_SEARCH_URL.to_string()
}

pub fn create_probe(config: &ProbeConfig, timeout: Duration) -> Result<Arc<dyn Probe>> {
    let probe: Arc<dyn Probe> = match config {
        ProbeConfig::InstagramApi {
            session_id,
            base_url,
            app_id,
        } => Arc::new(InstagramApiProbe::new(
            base_url.clone(),
            app_id.clone(),
            session_id.clone(),
            timeout,
        )),
        ProbeConfig::ProfilePage { base_url } => {
            Arc::new(ProfilePageProbe::new(base_url.clone(), timeout))
        }
        ProbeConfig::WebSearch { api_key, endpoint } => {
            if api_key.is_empty() {
                bail!("web_search probe requires api_key");
            }
            Arc::new(WebSearchProbe::new(endpoint.clone(), api_key.clone(), timeout))
        }
        ProbeConfig::LookupApi { base_url, api_key } => {
            if base_url.is_empty() {
                bail!("lookup_api probe requires base_url");
            }
            if api_key.is_empty() {
                bail!("lookup_api probe requires api_key");
            }
            Arc::new(LookupApiProbe::new(base_url.clone(), api_key.clone(), timeout))
        }
    };
    Ok(probe)
}

/// Builds the fallback chain in the configured order.
pub fn build_chain(configs: &[ProbeConfig], probe_timeout: Duration) -> Result<ProbeChain> {
    if configs.is_empty() {
        bail!("at least one probe must be configured");
    }
    let mut chain = ProbeChain::new(probe_timeout);
    for config in configs {
        chain.push(create_probe(config, probe_timeout)?);
    }
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_list_parses_with_defaults() {
        let yaml = r#"
- kind: instagram_api
  session_id: "abc"
- kind: profile_page
- kind: lookup_api
  base_url: "https://lookup.example"
  api_key: "k"
"#;
        let configs: Vec<ProbeConfig> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(configs.len(), 3);
        assert_eq!(
            configs[0],
            ProbeConfig::InstagramApi {
                session_id: Some("abc".into()),
                base_url: instagram_api::DEFAULT_BASE_URL.into(),
                app_id: instagram_api::DEFAULT_APP_ID.into(),
            }
        );
        assert_eq!(configs[1].kind(), "profile_page");

        let chain = build_chain(&configs, Duration::from_secs(5)).unwrap();
        assert_eq!(chain.names(), vec!["instagram_api", "profile_page", "lookup_api"]);
    }

    #[test]
    fn missing_credentials_are_rejected() {
        let configs = vec![ProbeConfig::WebSearch {
            api_key: String::new(),
            endpoint: default_search_endpoint(),
        }];
        let err = build_chain(&configs, Duration::from_secs(5)).err().unwrap();
        assert!(err.to_string().contains("api_key"));
    }

    #[test]
    fn empty_probe_list_is_rejected() {
        assert!(build_chain(&[], Duration::from_secs(5)).is_err());
    }

    #[test]
    fn default_chain_builds() {
        let chain = build_chain(&ProbeConfig::default_chain(), Duration::from_secs(5)).unwrap();
        assert_eq!(chain.len(), 2);
    }
}
