use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::error::ProxyError;

/// Items Goodreads serves per `list_rss` page; a shorter page is the last one.
pub const RSS_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub user_id: String,
    pub shelf: String,
    pub key: Option<String>,
    pub page: u32,
}

/// Source of raw RSS pages. The live implementation talks to Goodreads;
/// tests substitute canned documents.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch_page(
        &self,
        request: &PageRequest,
    ) -> impl Future<Output = Result<String, ProxyError>> + Send;
}

pub struct GoodreadsFeed {
    http: reqwest::Client,
    base_url: String,
}

impl GoodreadsFeed {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shelf-proxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build upstream HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn page_url(&self, user_id: &str) -> String {
        format!("{}/review/list_rss/{}", self.base_url, user_id)
    }
}

impl FeedSource for GoodreadsFeed {
    async fn fetch_page(&self, request: &PageRequest) -> Result<String, ProxyError> {
        let mut query = vec![
            ("shelf", request.shelf.clone()),
            ("page", request.page.to_string()),
            ("per_page", RSS_PAGE_SIZE.to_string()),
        ];
        if let Some(key) = &request.key {
            query.push(("key", key.clone()));
        }

        tracing::debug!(
            user_id = %request.user_id,
            shelf = %request.shelf,
            page = request.page,
            "fetching upstream rss page"
        );
        let response = self
            .http
            .get(self.page_url(&request.user_id))
            .query(&query)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamUnavailable(format!(
                "upstream answered {status}"
            )));
        }
        response.text().await.map_err(classify)
    }
}

/// Builder errors mean the configured upstream URL is unusable.
fn classify(err: reqwest::Error) -> ProxyError {
    if err.is_builder() {
        ProxyError::Internal(err.to_string())
    } else if err.is_timeout() {
        ProxyError::UpstreamTimeout
    } else {
        ProxyError::UpstreamUnavailable(err.to_string())
    }
}
