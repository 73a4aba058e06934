use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use handlewatch_probe::ProbeConfig;
use handlewatch_scheduler::MonitorConfig;
use serde::{Deserialize, Serialize};

pub const MAIN_CONFIG: &str = "config/main.yaml";

pub const SKELETON: &str = "\
telegram:
  enabled: true
  token: \"${BOT_TOKEN}\"

server:
  enabled: true
  host: 0.0.0.0
  port: 8080

monitor:
  interval_minutes: 15
  pacing_secs: 8
  first_run_delay_secs: 10
  probe_timeout_secs: 20
  rate_limit_backoff: true

probes:
  - kind: instagram_api
    session_id: \"${INSTAGRAM_SESSION_ID}\"
  - kind: profile_page

data_dir: data
";

fn default_true() -> bool {
    true
}

fn default_token() -> String {
    "${BOT_TOKEN}".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_token")]
    pub token: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: default_token(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default = "ProbeConfig::default_chain")]
    pub probes: Vec<ProbeConfig>,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl AppConfig {
    /// Relative data directories live under the config root.
    pub fn data_dir(&self, root: &Path) -> PathBuf {
        if self.data_dir.is_absolute() {
            self.data_dir.clone()
        } else {
            root.join(&self.data_dir)
        }
    }
}

pub fn resolve_env_var(raw: &str) -> String {
    let mut output = String::new();
    let mut rest = raw;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);

        let candidate = &rest[start + 2..];
        let Some(end) = candidate.find('}') else {
            output.push_str(&rest[start..]);
            return output;
        };

        let key = &candidate[..end];
        output.push_str(&std::env::var(key).unwrap_or_default());
        rest = &candidate[end + 1..];
    }

    output.push_str(rest);
    output
}

pub fn load_config(root: &Path) -> Result<AppConfig> {
    let path = root.join(MAIN_CONFIG);
    let content = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;
    let mut config: AppConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse yaml file: {}", path.display()))?;

    resolve_config_env(&mut config);
    apply_port_override(&mut config, std::env::var("PORT").ok().as_deref())?;
    Ok(config)
}

fn resolve_config_env(config: &mut AppConfig) {
    config.telegram.token = resolve_env_var(&config.telegram.token);
    config.server.host = resolve_env_var(&config.server.host);

    for probe in &mut config.probes {
        match probe {
            ProbeConfig::InstagramApi {
                session_id,
                base_url,
                app_id,
            } => {
                if let Some(id) = session_id {
                    *id = resolve_env_var(id);
                }
                *base_url = resolve_env_var(base_url);
                *app_id = resolve_env_var(app_id);
            }
            ProbeConfig::ProfilePage { base_url } => *base_url = resolve_env_var(base_url),
            ProbeConfig::WebSearch { api_key, endpoint } => {
                *api_key = resolve_env_var(api_key);
                *endpoint = resolve_env_var(endpoint);
            }
            ProbeConfig::LookupApi { base_url, api_key } => {
                *base_url = resolve_env_var(base_url);
                *api_key = resolve_env_var(api_key);
            }
        }
    }
}

/// `PORT` from the hosting environment wins over the configured port.
pub fn apply_port_override(config: &mut AppConfig, port: Option<&str>) -> Result<()> {
    let Some(raw) = port.map(str::trim).filter(|raw| !raw.is_empty()) else {
        return Ok(());
    };
    config.server.port = raw
        .parse()
        .map_err(|_| anyhow!("PORT must be a port number, got {raw:?}"))?;
    Ok(())
}

pub fn validate_config(config: &AppConfig) -> Result<()> {
    config.monitor.validate()?;
    if config.probes.is_empty() {
        return Err(anyhow!("probes: at least one probe must be configured"));
    }
    handlewatch_probe::build_chain(&config.probes, config.monitor.probe_timeout())
        .context("invalid probe configuration")?;
    if config.server.enabled && config.server.host.is_empty() {
        return Err(anyhow!("server.host is empty"));
    }
    Ok(())
}

/// Writes the default `config/main.yaml` when none exists. Returns whether a
/// file was written.
pub fn ensure_skeleton_config(root: &Path) -> Result<bool> {
    let path = root.join(MAIN_CONFIG);
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, SKELETON)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(true)
}
