/*!
common/src/lib.rs

Shared configuration types for topstories.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader for a TOML config file, with default/override merging
- Validation and credential resolution helpers
*/

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// HTTP listener configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address the HTTP server binds to (e.g. "127.0.0.1" or "0.0.0.0")
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Story routing defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoriesConfig {
    /// Source used when the request header is absent or unparseable ("nytimes", "none")
    pub default_source: String,
    /// Name of the request header carrying the requested source
    pub source_header: String,
    /// Section queried by the short-url article lookup
    pub home_section: String,
}

impl Default for StoriesConfig {
    fn default() -> Self {
        Self {
            default_source: "nytimes".to_string(),
            source_header: "ForSource".to_string(),
            home_section: "home".to_string(),
        }
    }
}

/// Upper bound for `nytimes.max_attempts`
pub const NYTIMES_MAX_ATTEMPTS: u32 = 10;

/// NYTimes Top Stories API config (the source is only registered when this section exists)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NytimesConfig {
    pub api_url: String,
    /// Inline API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    pub timeout_seconds: u64,
    /// Total attempts per fetch, including the first one
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for NytimesConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.nytimes.com/svc/topstories/v2".to_string(),
            api_key: None,
            api_key_env: Some("NYTIMES_API_KEY".to_string()),
            timeout_seconds: 10,
            max_attempts: 3,
            retry_backoff_ms: 1000,
        }
    }
}

impl NytimesConfig {
    /// Resolve the API key from the inline value or from the configured env var.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.to_string());
        }

        let env_name = self
            .api_key_env
            .as_deref()
            .ok_or_else(|| anyhow!("Missing api_key or api_key_env in [nytimes] config"))?;

        let key = std::env::var(env_name)
            .with_context(|| format!("NYTimes API key env var '{}' not set", env_name))?;
        if key.trim().is_empty() {
            bail!("NYTimes API key env var '{}' is empty", env_name);
        }
        Ok(key)
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub stories: StoriesConfig,
    pub nytimes: Option<NytimesConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for (label, path) in [("default", default_path), ("override", override_path)] {
            let Some(path) = path else { continue };
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {} config: {}", label, path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse {} configuration", label))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would only fail later, at request time.
    pub fn validate(&self) -> Result<()> {
        if self.stories.source_header.trim().is_empty() {
            bail!("stories.source_header must not be empty");
        }
        if self.stories.home_section.is_empty()
            || !self.stories.home_section.chars().all(|c| c.is_ascii_alphabetic())
        {
            bail!(
                "stories.home_section must be alphabetic, got '{}'",
                self.stories.home_section
            );
        }

        if let Some(nyt) = &self.nytimes {
            Url::parse(&nyt.api_url)
                .with_context(|| format!("nytimes.api_url is not a valid URL: {}", nyt.api_url))?;
            if !(1..=NYTIMES_MAX_ATTEMPTS).contains(&nyt.max_attempts) {
                bail!(
                    "nytimes.max_attempts must be between 1 and {}, got {}",
                    NYTIMES_MAX_ATTEMPTS,
                    nyt.max_attempts
                );
            }
            if nyt.timeout_seconds == 0 {
                bail!("nytimes.timeout_seconds must be at least 1");
            }
        }

        Ok(())
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
