//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.bugline/config.json`) and
//! environment. Everything is read-only after startup: credentials, size
//! limits, and the topic-to-project table are resolved once and passed into
//! components at construction.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings (health endpoint and Telegram webhook ingress).
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Channel settings (Telegram).
    #[serde(default)]
    pub channels: ChannelsConfig,

    /// Issue-tracker settings.
    #[serde(default)]
    pub tracker: TrackerConfig,

    /// Ingestion pipeline settings.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// Gateway bind and port settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for the HTTP server (default 15252).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1"; put a reverse proxy in front for webhook mode).
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15252
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Per-channel config (Telegram bot token and ingress mode).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelsConfig {
    #[serde(default)]
    pub telegram: TelegramChannelConfig,
}

/// Telegram channel config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramChannelConfig {
    /// Bot token from BotFather. Overridden by TELEGRAM_BOT_TOKEN env when set.
    pub bot_token: Option<String>,
    /// When set, use webhook mode: Telegram POSTs updates to this URL. If unset, long-poll getUpdates is used.
    pub webhook_url: Option<String>,
    /// Optional secret for webhook verification (X-Telegram-Bot-Api-Secret-Token). Used only when webhook_url is set.
    pub webhook_secret: Option<String>,
}

/// Issue-tracker config (Jira).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Tracker base URL (e.g. "https://yourorg.atlassian.net").
    pub base_url: Option<String>,
    /// Full Authorization header value (e.g. "Basic <base64 email:api-token>").
    /// Overridden by BUGLINE_TRACKER_CREDENTIAL env when set.
    pub credential: Option<String>,
    /// Project key used when a report arrives outside any mapped topic.
    pub default_project_key: Option<String>,
    /// Issue type name for created issues (default "Task").
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
    /// Explicit topic-name → project-key table. Reports from an unmapped
    /// topic are rejected with an error, never filed under a fallback.
    #[serde(default)]
    pub topic_projects: HashMap<String, String>,
}

fn default_issue_type() -> String {
    "Task".to_string()
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credential: None,
            default_project_key: None,
            issue_type: default_issue_type(),
            topic_projects: HashMap::new(),
        }
    }
}

/// Ingestion pipeline config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineConfig {
    /// Maximum accepted attachment size in bytes (default 15 MB). Larger
    /// remote files are rejected and never written to local storage.
    #[serde(default = "default_max_attachment_bytes")]
    pub max_attachment_bytes: u64,

    /// Root for per-run scratch directories (default: system temp dir + "bugline").
    pub temp_dir: Option<PathBuf>,

    /// How long a grouped submission waits for its siblings before resolving,
    /// in milliseconds (default 1000). Sibling lookup stays best-effort.
    #[serde(default = "default_group_settle_ms")]
    pub group_settle_ms: u64,
}

fn default_max_attachment_bytes() -> u64 {
    15_000_000
}

fn default_group_settle_ms() -> u64 {
    1000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_attachment_bytes: default_max_attachment_bytes(),
            temp_dir: None,
            group_settle_ms: default_group_settle_ms(),
        }
    }
}

/// Resolve the Telegram bot token: env TELEGRAM_BOT_TOKEN overrides config.
pub fn resolve_telegram_token(config: &Config) -> Option<String> {
    std::env::var("TELEGRAM_BOT_TOKEN")
        .ok()
        .and_then(non_empty)
        .or_else(|| {
            config
                .channels
                .telegram
                .bot_token
                .clone()
                .and_then(non_empty)
        })
}

/// Resolve the tracker credential: env BUGLINE_TRACKER_CREDENTIAL overrides config.
pub fn resolve_tracker_credential(config: &Config) -> Option<String> {
    std::env::var("BUGLINE_TRACKER_CREDENTIAL")
        .ok()
        .and_then(non_empty)
        .or_else(|| config.tracker.credential.clone().and_then(non_empty))
}

fn non_empty(s: String) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Resolve the scratch root for per-run download directories.
pub fn resolve_temp_dir(config: &Config) -> PathBuf {
    config
        .pipeline
        .temp_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("bugline"))
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("BUGLINE_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".bugline").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

/// Load config from the default path (or BUGLINE_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used (for resolving the config directory).
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_gateway_port_and_bind() {
        let g = GatewayConfig::default();
        assert_eq!(g.port, 15252);
        assert_eq!(g.bind, "127.0.0.1");
    }

    #[test]
    fn default_pipeline_limits() {
        let p = PipelineConfig::default();
        assert_eq!(p.max_attachment_bytes, 15_000_000);
        assert_eq!(p.group_settle_ms, 1000);
        assert!(p.temp_dir.is_none());
    }

    #[test]
    fn empty_config_parses_with_defaults() {
        let config: Config = serde_json::from_str("{}").expect("parse empty config");
        assert_eq!(config.tracker.issue_type, "Task");
        assert!(config.tracker.topic_projects.is_empty());
        assert!(config.channels.telegram.bot_token.is_none());
    }

    #[test]
    fn camel_case_keys_round_trip() {
        let json = r#"{
            "tracker": {
                "baseUrl": "https://example.atlassian.net",
                "defaultProjectKey": "KAN",
                "topicProjects": { "Payments": "PAY" }
            },
            "pipeline": { "maxAttachmentBytes": 1000 }
        }"#;
        let config: Config = serde_json::from_str(json).expect("parse config");
        assert_eq!(
            config.tracker.base_url.as_deref(),
            Some("https://example.atlassian.net")
        );
        assert_eq!(config.tracker.default_project_key.as_deref(), Some("KAN"));
        assert_eq!(
            config.tracker.topic_projects.get("Payments").map(String::as_str),
            Some("PAY")
        );
        assert_eq!(config.pipeline.max_attachment_bytes, 1000);
    }

    #[test]
    fn temp_dir_override_is_respected() {
        let mut config = Config::default();
        config.pipeline.temp_dir = Some(PathBuf::from("/scratch/bugline"));
        assert_eq!(resolve_temp_dir(&config), PathBuf::from("/scratch/bugline"));
    }
}
