use anyhow::Context;
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

use common::NYTIMES_MAX_ATTEMPTS;

use super::{SourceKind, StorySource};
use crate::articles::Article;
use crate::error::{Result, StoryError};

/// `updated_date` format used by the Top Stories API, e.g. `2020-07-26T09:21:19-04:00`.
const UPDATED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";

/// Longest wait between two attempts.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Upstream body characters kept in logs for unexpected statuses.
const LOGGED_BODY_LIMIT: usize = 200;

/// Everything the NYTimes source needs, handed over at construction.
#[derive(Debug, Clone)]
pub struct NytimesSettings {
    pub api_url: String,
    pub api_key: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

impl NytimesSettings {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }

    pub fn with_retries(mut self, max_attempts: u32, retry_backoff: Duration) -> Self {
        self.max_attempts = max_attempts.clamp(1, NYTIMES_MAX_ATTEMPTS);
        self.retry_backoff = retry_backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn from_config(config: &common::NytimesConfig, api_key: String) -> Self {
        Self::new(config.api_url.clone(), api_key)
            .with_timeout(Duration::from_secs(config.timeout_seconds))
            .with_retries(config.max_attempts, Duration::from_millis(config.retry_backoff_ms))
    }
}

/// Story source backed by the NYTimes Top Stories API
pub struct NytimesSource {
    settings: NytimesSettings,
    client: Client,
}

impl NytimesSource {
    pub fn new(settings: NytimesSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("topstories/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self { settings, client })
    }

    /// Wait before retry number `attempt`: backoff, 2x, 4x... capped at `MAX_RETRY_BACKOFF`.
    fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.settings
            .retry_backoff
            .saturating_mul(factor)
            .min(MAX_RETRY_BACKOFF)
    }

    fn section_url(&self, section: &str) -> String {
        format!("{}/{}.json", self.settings.api_url.trim_end_matches('/'), section)
    }

    async fn fetch_once(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .query(&[("api-key", self.settings.api_key.as_str())])
            .send()
            .await
            .map_err(|e| StoryError::UpstreamUnavailable(format!("request to {} failed: {}", url, e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &body));
        }

        response
            .text()
            .await
            .map_err(|e| StoryError::UpstreamUnavailable(format!("failed to read response body: {}", e.without_url())))
    }
}

fn classify_status(status: StatusCode, body: &str) -> StoryError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            StoryError::UpstreamAuth(format!("NYTimes API returned {}", status))
        }
        StatusCode::TOO_MANY_REQUESTS => StoryError::UpstreamUnavailable(format!("rate limited: {}", status)),
        s if s.is_server_error() => StoryError::UpstreamUnavailable(format!("server error: {}", status)),
        _ => {
            let excerpt: String = body.chars().take(LOGGED_BODY_LIMIT).collect();
            warn!(%status, body = %excerpt, "unexpected NYTimes API status");
            StoryError::UpstreamMalformed(format!("unexpected status {}", status))
        }
    }
}

#[async_trait::async_trait]
impl StorySource for NytimesSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Nytimes
    }

    async fn fetch_raw(&self, section: &str) -> Result<String> {
        let url = self.section_url(section);
        info!(%url, "fetching top stories");

        let max_attempts = self.settings.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once(&url).await {
                Ok(body) => {
                    debug!(%url, bytes = body.len(), "top stories fetched");
                    return Ok(body);
                }
                Err(e) if e.is_retriable() && attempt < max_attempts => {
                    let backoff = self.backoff_for(attempt);
                    warn!(%url, attempt, max_attempts, ?backoff, error = %e, "retrying top stories fetch");
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn parse_articles(&self, raw: &str) -> Result<Vec<Article>> {
        parse_top_stories(raw)
    }
}

/// Parse a Top Stories payload. One bad record fails the whole payload.
pub fn parse_top_stories(raw: &str) -> Result<Vec<Article>> {
    if raw.trim().is_empty() {
        return Err(StoryError::UpstreamMalformed("empty response body".to_string()));
    }

    let payload: TopStoriesResponse = serde_json::from_str(raw)
        .map_err(|e| StoryError::UpstreamMalformed(format!("unexpected payload shape: {}", e)))?;

    payload
        .results
        .into_iter()
        .enumerate()
        .map(|(idx, story)| {
            let updated = parse_updated_date(&story.updated_date).map_err(|e| {
                StoryError::UpstreamMalformed(format!(
                    "story #{} has invalid updated_date '{}': {}",
                    idx, story.updated_date, e
                ))
            })?;

            Ok(Article {
                heading: story.title,
                link: story.short_url,
                updated,
            })
        })
        .collect()
}

/// Parse `YYYY-MM-DDTHH:MM:SS±HH:MM` into UTC.
///
/// chrono accepts `%:z` without the colon, so the offset shape is checked first.
fn parse_updated_date(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    let bytes = value.as_bytes();
    let offset_ok = bytes.len() == 25 && matches!(bytes[19], b'+' | b'-') && bytes[22] == b':';
    if !offset_ok {
        return Err("expected an offset of the form ±HH:MM".to_string());
    }

    DateTime::parse_from_str(value, UPDATED_DATE_FORMAT)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

// Top Stories API response structures
#[derive(Debug, Deserialize)]
struct TopStoriesResponse {
    results: Vec<StoryRecord>,
}

#[derive(Debug, Deserialize)]
struct StoryRecord {
    title: String,
    short_url: String,
    updated_date: String,
}
