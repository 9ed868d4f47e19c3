//! Runtime configuration for llm-broadcast-relay.
//!
//! Tunables are loaded from an optional JSON file; credentials come only from
//! the environment and are required at startup.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Pub/sub hub that every fragment is broadcast to.
pub const HUB_NAME: &str = "myhub";

/// Environment variable holding the Web PubSub connection string.
pub const WEBPUBSUB_CONNECTION_STRING_ENV: &str = "WEBPUBSUB_CONNECTION_STRING";

/// Environment variable holding the Anthropic API key.
pub const ANTHROPIC_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "llm-broadcast-relay",
    about = "Relay streaming LLM completions to SSE callers and a Web PubSub hub"
)]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "relay.json")]
    pub config: PathBuf,

    /// HTTP listen address.
    #[arg(long, default_value = "0.0.0.0:8000")]
    pub listen: String,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Completion-stream source settings.
    pub upstream: UpstreamConfig,

    /// Broadcast sink settings.
    pub broadcast: BroadcastConfig,
}

/// Anthropic Messages API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// API base URL, without the `/v1/messages` path.
    pub base_url: String,

    /// Model identifier sent with every request.
    pub model: String,

    /// Maximum output tokens per completion.
    pub max_tokens: u32,

    /// Value of the `anthropic-version` header.
    pub anthropic_version: String,

    /// Connect timeout in seconds (unset = client default).
    pub connect_timeout_secs: Option<u64>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-3-5-sonnet-20240620".to_string(),
            max_tokens: 1024,
            anthropic_version: "2023-06-01".to_string(),
            connect_timeout_secs: None,
        }
    }
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }
}

/// Web PubSub settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// REST API version query parameter.
    pub api_version: String,

    /// Lifetime of each signed access token.
    pub token_ttl_secs: u64,

    /// What to do with the SSE stream when a publish fails.
    pub on_publish_error: PublishFailurePolicy,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            api_version: "2024-01-01".to_string(),
            token_ttl_secs: 300,
            on_publish_error: PublishFailurePolicy::Abort,
        }
    }
}

/// Behavior of the forwarding loop when a broadcast publish fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishFailurePolicy {
    /// Terminate the caller's stream with the publish error.
    #[default]
    Abort,
    /// Log the failure and still deliver the frame to the caller.
    LogAndContinue,
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults for missing fields.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let data = std::fs::read_to_string(path)?;
            let config: Config = serde_json::from_str(&data)?;
            Ok(config)
        } else {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            Ok(Config::default())
        }
    }
}

/// Credentials required at startup.
#[derive(Clone)]
pub struct Secrets {
    pub webpubsub_connection_string: String,
    pub anthropic_api_key: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets").finish_non_exhaustive()
    }
}

impl Secrets {
    /// Read credentials from the process environment, falling back to the
    /// `.env`-style file at `path` when it exists. The environment wins.
    pub fn from_env_file(path: &Path) -> Result<Self, ConfigError> {
        let file = read_env_file(path)?;
        Self::from_lookup(|key| {
            std::env::var(key)
                .ok()
                .filter(|v| !v.is_empty())
                .or_else(|| file.get(key).cloned())
        })
    }

    /// Read credentials through `lookup`. Empty values count as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingEnv(key))
        };

        Ok(Self {
            webpubsub_connection_string: required(WEBPUBSUB_CONNECTION_STRING_ENV)?,
            anthropic_api_key: required(ANTHROPIC_API_KEY_ENV)?,
        })
    }
}

/// Parse a `.env`-style file into a map. A missing file yields an empty map.
pub fn read_env_file(path: &Path) -> Result<HashMap<String, String>, ConfigError> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let vars = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
    tracing::debug!(path = %path.display(), count = vars.len(), "Read environment file");
    Ok(vars)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.upstream.model, "claude-3-5-sonnet-20240620");
        assert_eq!(cfg.upstream.max_tokens, 1024);
        assert_eq!(cfg.broadcast.on_publish_error, PublishFailurePolicy::Abort);
        assert!(cfg.upstream.connect_timeout().is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"broadcast": {{"on_publish_error": "log_and_continue"}}}}"#
        )
        .unwrap();

        let cfg = Config::load(file.path()).unwrap();
        assert_eq!(
            cfg.broadcast.on_publish_error,
            PublishFailurePolicy::LogAndContinue
        );
        assert_eq!(cfg.broadcast.api_version, "2024-01-01");
        assert_eq!(cfg.upstream.base_url, "https://api.anthropic.com");
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(cfg.upstream.max_tokens, 1024);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{not json").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_secrets_require_both_variables() {
        let env: HashMap<&str, &str> = [(ANTHROPIC_API_KEY_ENV, "sk-test")].into();
        let err = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::MissingEnv(WEBPUBSUB_CONNECTION_STRING_ENV)
        ));
    }

    #[test]
    fn test_secrets_treat_empty_as_missing() {
        let env: HashMap<&str, &str> = [
            (WEBPUBSUB_CONNECTION_STRING_ENV, "Endpoint=https://x;AccessKey=k;"),
            (ANTHROPIC_API_KEY_ENV, ""),
        ]
        .into();
        let err = Secrets::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnv(ANTHROPIC_API_KEY_ENV)));
    }

    #[test]
    fn test_read_env_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# relay credentials").unwrap();
        writeln!(
            file,
            "WEBPUBSUB_CONNECTION_STRING=\"Endpoint=https://demo.webpubsub.azure.com;AccessKey=abc=;Version=1.0;\""
        )
        .unwrap();
        writeln!(file, "ANTHROPIC_API_KEY=sk-from-file").unwrap();

        let vars = read_env_file(file.path()).unwrap();
        assert_eq!(vars[ANTHROPIC_API_KEY_ENV], "sk-from-file");
        assert_eq!(
            vars[WEBPUBSUB_CONNECTION_STRING_ENV],
            "Endpoint=https://demo.webpubsub.azure.com;AccessKey=abc=;Version=1.0;"
        );

        let secrets = Secrets::from_lookup(|k| vars.get(k).cloned()).unwrap();
        assert_eq!(secrets.anthropic_api_key, "sk-from-file");
    }

    #[test]
    fn test_read_env_file_missing_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_env_file(&dir.path().join(".env")).unwrap().is_empty());
    }

    #[test]
    fn test_secrets_debug_hides_values() {
        let secrets = Secrets {
            webpubsub_connection_string: "Endpoint=x;AccessKey=secret".into(),
            anthropic_api_key: "sk-secret".into(),
        };
        assert!(!format!("{secrets:?}").contains("secret"));
    }
}
