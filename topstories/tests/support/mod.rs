#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use topstories::error::Result;
use topstories::{Article, SourceKind, SourceRegistry, StoryError, StoryService, StorySource};

pub fn article(link: &str, updated: &str) -> Article {
    Article {
        heading: format!("Story behind {}", link),
        link: link.to_string(),
        updated: updated.parse().expect("valid RFC 3339 timestamp"),
    }
}

/// In-memory source returning a fixed list, or a fixed failure, and recording requested sections.
pub struct StubSource {
    articles: Vec<Article>,
    failure: Option<fn() -> StoryError>,
    pub sections: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn with_articles(articles: Vec<Article>) -> Arc<Self> {
        Arc::new(Self {
            articles,
            failure: None,
            sections: Mutex::new(Vec::new()),
        })
    }

    pub fn failing(failure: fn() -> StoryError) -> Arc<Self> {
        Arc::new(Self {
            articles: Vec::new(),
            failure: Some(failure),
            sections: Mutex::new(Vec::new()),
        })
    }

    pub fn requested_sections(&self) -> Vec<String> {
        self.sections.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl StorySource for StubSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Nytimes
    }

    async fn fetch_raw(&self, section: &str) -> Result<String> {
        Ok(format!("stub payload for {}", section))
    }

    fn parse_articles(&self, _raw: &str) -> Result<Vec<Article>> {
        Ok(self.articles.clone())
    }

    async fn fetch_articles(&self, section: &str) -> Result<Vec<Article>> {
        self.sections.lock().unwrap().push(section.to_string());
        match self.failure {
            Some(make_error) => Err(make_error()),
            None => Ok(self.articles.clone()),
        }
    }
}

pub fn service_with(source: Arc<StubSource>) -> StoryService {
    StoryService::new(SourceRegistry::new().with_source(source))
}
