use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use common::Config;
use tracing::{info, warn};

use crate::articles::Article;
use crate::error::{Result, StoryError};

pub mod nytimes;

use nytimes::{NytimesSettings, NytimesSource};

/// Closed set of upstream sources a request may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceKind {
    /// Sentinel: "no source". Never resolves.
    None,
    #[default]
    Nytimes,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::None => "none",
            SourceKind::Nytimes => "nytimes",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = StoryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(SourceKind::None),
            "nytimes" => Ok(SourceKind::Nytimes),
            _ => Err(StoryError::UnsupportedSource(s.to_string())),
        }
    }
}

/// Core trait for upstream story sources
#[async_trait::async_trait]
pub trait StorySource: Send + Sync {
    /// Identifier this source is registered under
    fn kind(&self) -> SourceKind;

    /// Unparsed upstream payload for a section. Diagnostics only.
    async fn fetch_raw(&self, section: &str) -> Result<String>;

    /// Parse a raw payload into canonical articles. All-or-nothing.
    fn parse_articles(&self, raw: &str) -> Result<Vec<Article>>;

    /// Fetch and parse one section, keeping upstream order.
    async fn fetch_articles(&self, section: &str) -> Result<Vec<Article>> {
        let raw = self.fetch_raw(section).await?;
        self.parse_articles(&raw)
    }
}

/// Table from `SourceKind` to a live source. Lookups do no I/O.
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<SourceKind, Arc<dyn StorySource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source` under its own kind, replacing any previous entry.
    pub fn with_source(mut self, source: Arc<dyn StorySource>) -> Self {
        let kind = source.kind();
        if kind == SourceKind::None {
            warn!("refusing to register a source under the 'none' sentinel");
            return self;
        }
        self.sources.insert(kind, source);
        self
    }

    /// Build the registry from configuration. Sources whose section is absent stay unregistered.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let mut registry = Self::new();

        match &config.nytimes {
            Some(nyt_config) => {
                let api_key = match nyt_config.resolve_api_key() {
                    Ok(key) => key,
                    Err(e) => {
                        warn!(error = %e, "NYTimes API key unavailable; NYTimes source disabled");
                        return Ok(registry);
                    }
                };
                let settings = NytimesSettings::from_config(nyt_config, api_key);
                let source = NytimesSource::new(settings).context("failed to build NYTimes source")?;
                info!(api_url = %nyt_config.api_url, "NYTimes source registered");
                registry = registry.with_source(Arc::new(source));
            }
            None => warn!("no [nytimes] section configured; NYTimes source disabled"),
        }

        Ok(registry)
    }

    pub fn resolve(&self, kind: SourceKind) -> Result<Arc<dyn StorySource>> {
        if kind == SourceKind::None {
            return Err(StoryError::UnsupportedSource(kind.to_string()));
        }
        self.sources
            .get(&kind)
            .cloned()
            .ok_or_else(|| StoryError::UnsupportedSource(kind.to_string()))
    }

    pub fn kinds(&self) -> Vec<SourceKind> {
        let mut kinds: Vec<SourceKind> = self.sources.keys().copied().collect();
        kinds.sort_by_key(|k| k.as_str());
        kinds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedSource {
        kind: SourceKind,
    }

    #[async_trait::async_trait]
    impl StorySource for FixedSource {
        fn kind(&self) -> SourceKind {
            self.kind
        }

        async fn fetch_raw(&self, section: &str) -> Result<String> {
            Ok(section.to_string())
        }

        fn parse_articles(&self, raw: &str) -> Result<Vec<Article>> {
            Ok(vec![Article {
                heading: raw.to_string(),
                link: "https://nyti.ms/abc1234".to_string(),
                updated: "2020-07-26T09:21:19Z".parse().unwrap(),
            }])
        }
    }

    #[test]
    fn parses_source_names() {
        assert_eq!("nytimes".parse::<SourceKind>().unwrap(), SourceKind::Nytimes);
        assert_eq!("NYTimes".parse::<SourceKind>().unwrap(), SourceKind::Nytimes);
        assert_eq!(" none ".parse::<SourceKind>().unwrap(), SourceKind::None);
        assert!(matches!(
            "guardian".parse::<SourceKind>(),
            Err(StoryError::UnsupportedSource(name)) if name == "guardian"
        ));
        assert_eq!(SourceKind::default(), SourceKind::Nytimes);
    }

    #[test]
    fn none_never_resolves() {
        let registry = SourceRegistry::new()
            .with_source(Arc::new(FixedSource { kind: SourceKind::Nytimes }))
            .with_source(Arc::new(FixedSource { kind: SourceKind::None }));

        assert!(matches!(
            registry.resolve(SourceKind::None),
            Err(StoryError::UnsupportedSource(name)) if name == "none"
        ));
        assert_eq!(registry.kinds(), vec![SourceKind::Nytimes]);
    }

    #[test]
    fn unregistered_kind_is_unsupported() {
        let registry = SourceRegistry::new();
        assert!(matches!(
            registry.resolve(SourceKind::Nytimes),
            Err(StoryError::UnsupportedSource(name)) if name == "nytimes"
        ));
    }

    #[tokio::test]
    async fn default_fetch_parses_raw_payload() {
        let registry = SourceRegistry::new().with_source(Arc::new(FixedSource { kind: SourceKind::Nytimes }));
        let source = registry.resolve(SourceKind::Nytimes).unwrap();
        let articles = source.fetch_articles("world").await.unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].heading, "world");
    }

    #[test]
    fn from_config_without_nytimes_is_empty() {
        let registry = SourceRegistry::from_config(&Config::default()).unwrap();
        assert!(registry.kinds().is_empty());
    }

    #[test]
    fn from_config_with_inline_key_registers_nytimes() {
        let config = Config {
            nytimes: Some(common::NytimesConfig {
                api_key: Some("TEST_KEY".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let registry = SourceRegistry::from_config(&config).unwrap();
        assert_eq!(registry.kinds(), vec![SourceKind::Nytimes]);
    }

    #[test]
    fn from_config_without_key_leaves_nytimes_out() {
        let config = Config {
            nytimes: Some(common::NytimesConfig {
                api_key: None,
                api_key_env: Some("TOPSTORIES_TEST_UNSET_KEY_VAR".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let registry = SourceRegistry::from_config(&config).unwrap();
        assert!(registry.kinds().is_empty());
    }
}
