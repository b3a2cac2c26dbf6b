use std::cmp::Reverse;
use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{StatusCode, Url};
use shelf_model::{BookRecord, ErrorBody, ShelfPage, parse_timestamp};
use tokio::sync::mpsc::Sender;
use tracing::{debug, info};

use crate::config::ShelfConfig;
use crate::error::FeedError;
use crate::events::LoadEvent;

/// Client for the shelf proxy's `GET /api/goodreads`.
pub struct ShelfClient {
    http: reqwest::Client,
    endpoint: Url,
    user_id: String,
    shelf: String,
    key: Option<String>,
    max_pages: u32,
}

impl ShelfClient {
    pub fn new(cfg: &ShelfConfig, timeout: Duration) -> Result<Self> {
        let base = format!("{}/", cfg.proxy_url.trim().trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join("api/goodreads"))
            .with_context(|| format!("invalid proxy URL {}", cfg.proxy_url))?;
        let user_id = cfg
            .user_id
            .clone()
            .context("shelf user id is not configured")?;
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("shelf-wall/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            endpoint,
            user_id,
            shelf: cfg.shelf.clone(),
            key: cfg.key.clone(),
            max_pages: cfg.max_pages,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn page_url(&self, page: u32) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("userId", &self.user_id)
                .append_pair("shelf", &self.shelf);
            if let Some(key) = &self.key {
                query.append_pair("key", key);
            }
            query.append_pair("page", &page.to_string());
        }
        url
    }

    pub async fn fetch_page(&self, page: u32) -> Result<ShelfPage, FeedError> {
        let url = self.page_url(page);
        debug!(page, "requesting shelf page");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        Ok(serde_json::from_slice(&body)?)
    }

    /// Every book on the shelf, in proxy order.
    pub async fn fetch_shelf(
        &self,
        progress: &Sender<LoadEvent>,
    ) -> Result<Vec<BookRecord>, FeedError> {
        let books = collect_pages(self.max_pages, progress, |page| self.fetch_page(page)).await?;
        info!(
            user_id = %self.user_id,
            shelf = %self.shelf,
            books = books.len(),
            "shelf fetched"
        );
        Ok(books)
    }
}

/// Requests pages from 1 until one reports no successor or `max_pages` is
/// reached, reporting running totals on `progress`.
pub async fn collect_pages<F, Fut>(
    max_pages: u32,
    progress: &Sender<LoadEvent>,
    mut fetch: F,
) -> Result<Vec<BookRecord>, FeedError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<ShelfPage, FeedError>>,
{
    let _ = progress.send(LoadEvent::Connect).await;
    let mut books = Vec::new();
    for page in 1..=max_pages.max(1) {
        let ShelfPage {
            items, has_more, ..
        } = fetch(page).await?;
        books.extend(items);
        let _ = progress
            .send(LoadEvent::FetchProgress { count: books.len() })
            .await;
        if !has_more.unwrap_or(false) {
            break;
        }
    }
    let _ = progress
        .send(LoadEvent::FetchComplete { count: books.len() })
        .await;
    Ok(books)
}

/// Maps a non-2xx proxy answer to a [`FeedError`], keeping the proxy's
/// message when it sent one.
pub fn classify_status(status: StatusCode, body: &[u8]) -> FeedError {
    let message = serde_json::from_slice::<ErrorBody>(body)
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());
    match status {
        StatusCode::BAD_REQUEST => FeedError::InvalidInput(message),
        StatusCode::GATEWAY_TIMEOUT => FeedError::UpstreamTimeout,
        _ => FeedError::UpstreamUnavailable(message),
    }
}

/// Most recently read first; books without a read date keep their relative
/// order at the end.
pub fn sort_for_display(books: &mut [BookRecord]) {
    books.sort_by_cached_key(|book| Reverse(book.read_at.as_deref().and_then(parse_timestamp)));
}
