use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::articles::{group_by_date, Article, DateBucket};
use crate::error::Result;
use crate::sources::{SourceKind, SourceRegistry};

/// Optional filters for `StoryService::list_stories`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoryQuery {
    /// Keep at most this many articles, counted after filtering
    pub top_count: Option<usize>,
    /// Keep articles updated on or after this UTC date
    pub date_floor: Option<NaiveDate>,
    /// Keep articles whose link ends with this text. Blank means no filter.
    pub link_suffix: Option<String>,
}

impl StoryQuery {
    pub fn top(mut self, count: usize) -> Self {
        self.top_count = Some(count);
        self
    }

    pub fn since(mut self, date: NaiveDate) -> Self {
        self.date_floor = Some(date);
        self
    }

    pub fn link_ending_with(mut self, suffix: impl Into<String>) -> Self {
        self.link_suffix = Some(suffix.into());
        self
    }

    /// Apply date floor, then link suffix, then truncation. Order of the input is kept.
    pub fn apply(&self, articles: Vec<Article>) -> Vec<Article> {
        let suffix = self.link_suffix.as_deref().filter(|s| !s.trim().is_empty());

        let filtered = articles
            .into_iter()
            .filter(|a| self.date_floor.map_or(true, |floor| a.updated_date() >= floor))
            .filter(|a| suffix.map_or(true, |s| a.link.ends_with(s)));

        match self.top_count {
            Some(n) => filtered.take(n).collect(),
            None => filtered.collect(),
        }
    }
}

/// Lists and groups stories from whichever source a request selects.
///
/// Holds no per-request state; clones share the same registry.
#[derive(Clone)]
pub struct StoryService {
    registry: Arc<SourceRegistry>,
}

impl StoryService {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub async fn list_stories(
        &self,
        source: SourceKind,
        section: &str,
        query: &StoryQuery,
    ) -> Result<Vec<Article>> {
        info!(
            %source,
            section,
            top_count = ?query.top_count,
            date_floor = ?query.date_floor,
            link_suffix = ?query.link_suffix,
            "list_stories"
        );

        let provider = self.registry.resolve(source)?;
        let articles = provider.fetch_articles(section).await?;
        let fetched = articles.len();

        let stories = query.apply(articles);
        info!(%source, section, fetched, returned = stories.len(), "list_stories done");
        Ok(stories)
    }

    /// Bucket the full, unfiltered section by UTC date.
    pub async fn grouped_by_date(&self, source: SourceKind, section: &str) -> Result<Vec<DateBucket>> {
        info!(%source, section, "grouped_by_date");

        let stories = self.list_stories(source, section, &StoryQuery::default()).await?;
        Ok(group_by_date(&stories))
    }
}
