//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.chatter/config.json`) and environment.
//! Every field has a default, so an empty `{}` file is a valid config.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Chat backend (conversations, messages, users).
    #[serde(default)]
    pub api: ApiConfig,

    /// Completion API used to produce assistant replies.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Credential storage and auth notices.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Chat backend location.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// Base URL of the REST backend (default "http://127.0.0.1:3000"). Overridden by CHATTER_API_BASE_URL env.
    #[serde(default = "default_api_base_url")]
    pub base_url: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_base_url(),
        }
    }
}

/// Completion API settings (OpenAI-compatible chat completions).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionConfig {
    /// Base URL including the version segment (default "https://openrouter.ai/api/v1").
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Bearer key for the completion API. Overridden by OPENROUTER_API_KEY env.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used when none is chosen explicitly.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// System instruction placed first in every transcript.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: default_completion_base_url(),
            api_key: None,
            default_model: default_model(),
            system_prompt: default_system_prompt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthConfig {
    /// How long a login/registration failure stays visible (default 3 seconds).
    #[serde(default = "default_notice_timeout_secs")]
    pub notice_timeout_secs: u64,

    /// Credential file. Relative paths are resolved against the config file's parent. Default: `credentials.json` next to the config.
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            notice_timeout_secs: default_notice_timeout_secs(),
            credentials_path: None,
        }
    }
}

impl AuthConfig {
    pub fn notice_timeout(&self) -> Duration {
        Duration::from_secs(self.notice_timeout_secs)
    }
}

fn default_api_base_url() -> String {
    "http://127.0.0.1:3000".to_string()
}

fn default_completion_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    crate::llm::DEFAULT_MODEL.to_string()
}

fn default_system_prompt() -> String {
    "You are a helpful assistant.".to_string()
}

fn default_notice_timeout_secs() -> u64 {
    3
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Resolve the backend base URL: env CHATTER_API_BASE_URL overrides config. Trailing slashes are dropped.
pub fn resolve_api_base_url(config: &Config) -> String {
    non_empty_env("CHATTER_API_BASE_URL")
        .unwrap_or_else(|| config.api.base_url.clone())
        .trim_end_matches('/')
        .to_string()
}

/// Resolve the completion API key: env OPENROUTER_API_KEY overrides config.
pub fn resolve_completion_key(config: &Config) -> Option<String> {
    non_empty_env("OPENROUTER_API_KEY").or_else(|| {
        config
            .completion
            .api_key
            .as_ref()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("CHATTER_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".chatter").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the credential file: `auth.credentialsPath` if set (relative paths resolved against the config file's parent), otherwise `credentials.json` beside the config.
pub fn resolve_credentials_path(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_parent(config_path);
    match &config.auth.credentials_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                parent.join(p)
            }
        }
        _ => parent.join("credentials.json"),
    }
}

/// Load config from the given path or the default (CHATTER_CONFIG_PATH or ~/.chatter/config.json). Missing file => default config.
/// Returns the config and the path that was used.
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
