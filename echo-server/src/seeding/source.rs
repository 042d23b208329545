//! Sample data sources feeding the record factory.
//!
//! A source hands out pages of raw template records, at most [`PAGE_SIZE`] per
//! call. The HTTP source talks to a JSONPlaceholder-compatible service; the
//! static source serves built-in pages so the pipeline runs offline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use echo_types::EntityKind;

use super::error::{SeedError, SeedResult};
use super::job::PAGE_SIZE;

const USERS_PAGE: &str = include_str!("fixtures/users.json");
const POSTS_PAGE: &str = include_str!("fixtures/posts.json");
const COMMENTS_PAGE: &str = include_str!("fixtures/comments.json");

#[async_trait]
pub trait SampleSource: Send + Sync {
    /// Fetch one page of raw templates for an entity kind
    async fn fetch_page(&self, entity: EntityKind) -> SeedResult<Vec<Value>>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoTemplate {
    pub lat: String,
    pub lng: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddressTemplate {
    pub street: String,
    pub suite: String,
    pub city: String,
    pub zipcode: String,
    pub geo: GeoTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyTemplate {
    pub name: String,
    #[serde(rename = "catchPhrase")]
    pub catch_phrase: String,
    pub bs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserTemplate {
    pub name: String,
    pub username: String,
    pub email: String,
    pub phone: String,
    pub website: String,
    pub address: AddressTemplate,
    pub company: CompanyTemplate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostTemplate {
    pub title: String,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommentTemplate {
    pub name: String,
    pub email: String,
    pub body: String,
}

/// Fetches templates from `{base_url}/{users|posts|comments}`
pub struct HttpSampleSource {
    client: Client,
    base_url: String,
}

impl HttpSampleSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> SeedResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url: String = base_url.into();

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SampleSource for HttpSampleSource {
    async fn fetch_page(&self, entity: EntityKind) -> SeedResult<Vec<Value>> {
        let url = format!("{}/{}", self.base_url, entity.resource());
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SeedError::Fetch(format!(
                "GET {} returned {}: {}",
                url, status, body
            )));
        }

        let mut page: Vec<Value> = response.json().await?;
        page.truncate(PAGE_SIZE);
        debug!(url = %url, templates = page.len(), "Fetched sample page");
        Ok(page)
    }
}

/// Serves fixed pages, either the built-in ones or pages supplied by the caller
pub struct StaticSampleSource {
    pages: HashMap<EntityKind, Vec<Value>>,
    calls: HashMap<EntityKind, AtomicUsize>,
    failing: bool,
}

impl StaticSampleSource {
    /// Built-in pages of ten users, posts and comments
    pub fn builtin() -> SeedResult<Self> {
        let mut source = Self::empty();
        for (entity, raw) in [
            (EntityKind::User, USERS_PAGE),
            (EntityKind::Post, POSTS_PAGE),
            (EntityKind::Comment, COMMENTS_PAGE),
        ] {
            let page: Vec<Value> = serde_json::from_str(raw).map_err(|e| {
                SeedError::Fetch(format!("built-in {} page is invalid: {}", entity.resource(), e))
            })?;
            source.pages.insert(entity, page);
        }
        Ok(source)
    }

    /// No pages at all; every fetch returns an empty page
    pub fn empty() -> Self {
        let calls = [EntityKind::User, EntityKind::Post, EntityKind::Comment]
            .into_iter()
            .map(|entity| (entity, AtomicUsize::new(0)))
            .collect();

        Self {
            pages: HashMap::new(),
            calls,
            failing: false,
        }
    }

    pub fn with_page(mut self, entity: EntityKind, mut page: Vec<Value>) -> Self {
        page.truncate(PAGE_SIZE);
        self.pages.insert(entity, page);
        self
    }

    /// Every fetch fails, simulating an unreachable source
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    /// Number of fetches served for an entity kind
    pub fn calls(&self, entity: EntityKind) -> usize {
        self.calls
            .get(&entity)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl SampleSource for StaticSampleSource {
    async fn fetch_page(&self, entity: EntityKind) -> SeedResult<Vec<Value>> {
        if let Some(counter) = self.calls.get(&entity) {
            counter.fetch_add(1, Ordering::SeqCst);
        }

        if self.failing {
            return Err(SeedError::Fetch(format!(
                "sample source unavailable for {}",
                entity.resource()
            )));
        }

        Ok(self.pages.get(&entity).cloned().unwrap_or_default())
    }
}
