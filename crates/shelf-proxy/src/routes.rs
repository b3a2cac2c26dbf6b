use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use serde::Deserialize;
use shelf_model::{DEFAULT_SHELF, ShelfPage, is_valid_slug, is_valid_user_id};

use crate::error::ProxyError;
use crate::feed::{FeedSource, PageRequest, RSS_PAGE_SIZE};
use crate::rss::{ParsedFeed, parse_feed};

/// Shelf contents change rarely; let the CDN serve an hour and refresh lazily for a day.
pub const CACHE_CONTROL: &str = "public, s-maxage=3600, stale-while-revalidate=86400";

pub struct AppState<S> {
    feed: Arc<S>,
    max_pages: u32,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            feed: Arc::clone(&self.feed),
            max_pages: self.max_pages,
        }
    }
}

pub fn router<S: FeedSource>(feed: S, max_pages: u32) -> Router {
    let state = AppState {
        feed: Arc::new(feed),
        max_pages: max_pages.max(1),
    };
    Router::new()
        .route("/api/goodreads", get(goodreads::<S>))
        .route("/healthz", get(healthz))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct RawShelfQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
    pub shelf: Option<String>,
    pub key: Option<String>,
    pub page: Option<String>,
}

/// A validated `/api/goodreads` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShelfQuery {
    pub user_id: String,
    pub shelf: String,
    pub key: Option<String>,
    pub page: Option<u32>,
}

impl ShelfQuery {
    pub fn parse(raw: RawShelfQuery) -> Result<Self, ProxyError> {
        let user_id = raw
            .user_id
            .filter(|value| is_valid_user_id(value))
            .ok_or_else(|| {
                ProxyError::InvalidInput("userId is required and must be numeric".into())
            })?;

        let shelf = match raw.shelf.as_deref() {
            None | Some("") => DEFAULT_SHELF.to_string(),
            Some(shelf) if is_valid_slug(shelf) => shelf.to_string(),
            Some(_) => {
                return Err(ProxyError::InvalidInput(
                    "shelf may only contain letters, digits, '-' and '_'".into(),
                ));
            }
        };

        let key = match raw.key.as_deref() {
            None | Some("") => None,
            Some(key) if is_valid_slug(key) => Some(key.to_string()),
            Some(_) => return Err(ProxyError::InvalidInput("key is malformed".into())),
        };

        let page = match raw.page.as_deref() {
            None | Some("") => None,
            Some(page) => match page.parse::<u32>() {
                Ok(page) if page > 0 => Some(page),
                _ => {
                    return Err(ProxyError::InvalidInput(
                        "page must be a positive integer".into(),
                    ));
                }
            },
        };

        Ok(Self {
            user_id,
            shelf,
            key,
            page,
        })
    }

    fn page_request(&self, page: u32) -> PageRequest {
        PageRequest {
            user_id: self.user_id.clone(),
            shelf: self.shelf.clone(),
            key: self.key.clone(),
            page,
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn goodreads<S: FeedSource>(
    State(state): State<AppState<S>>,
    query: Result<Query<RawShelfQuery>, QueryRejection>,
) -> Response {
    let result = match query {
        Ok(Query(raw)) => match ShelfQuery::parse(raw) {
            Ok(query) => fetch_shelf(state.feed.as_ref(), state.max_pages, &query).await,
            Err(err) => Err(err),
        },
        Err(rejection) => Err(ProxyError::InvalidInput(rejection.body_text())),
    };
    match result {
        Ok(page) => ([(header::CACHE_CONTROL, CACHE_CONTROL)], Json(page)).into_response(),
        Err(err) => err.into_response(),
    }
}

/// With an explicit page, returns that page and whether another one follows.
/// Without one, walks pages until a short page or `max_pages`.
pub async fn fetch_shelf<S: FeedSource>(
    feed: &S,
    max_pages: u32,
    query: &ShelfQuery,
) -> Result<ShelfPage, ProxyError> {
    if let Some(page) = query.page {
        let parsed = fetch_parsed(feed, &query.page_request(page)).await?;
        let has_more = parsed.items.len() >= RSS_PAGE_SIZE;
        return Ok(ShelfPage {
            total: None,
            shelf: query.shelf.clone(),
            user_id: query.user_id.clone(),
            items: parsed.items,
            title: parsed.title,
            page: Some(page),
            has_more: Some(has_more),
        });
    }

    let mut items = Vec::new();
    let mut title = String::new();
    for page in 1..=max_pages {
        let parsed = fetch_parsed(feed, &query.page_request(page)).await?;
        let short = parsed.items.len() < RSS_PAGE_SIZE;
        if title.is_empty() {
            title = parsed.title;
        }
        items.extend(parsed.items);
        if short {
            break;
        }
        if page == max_pages {
            tracing::warn!(
                user_id = %query.user_id,
                max_pages,
                "shelf truncated at page limit"
            );
        }
    }

    tracing::info!(
        user_id = %query.user_id,
        shelf = %query.shelf,
        total = items.len(),
        "served shelf"
    );
    Ok(ShelfPage {
        total: Some(items.len()),
        shelf: query.shelf.clone(),
        user_id: query.user_id.clone(),
        items,
        title,
        page: None,
        has_more: None,
    })
}

async fn fetch_parsed<S: FeedSource>(
    feed: &S,
    request: &PageRequest,
) -> Result<ParsedFeed, ProxyError> {
    let body = feed.fetch_page(request).await?;
    Ok(parse_feed(&body)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(user_id: Option<&str>, shelf: Option<&str>, page: Option<&str>) -> RawShelfQuery {
        RawShelfQuery {
            user_id: user_id.map(str::to_string),
            shelf: shelf.map(str::to_string),
            key: None,
            page: page.map(str::to_string),
        }
    }

    #[test]
    fn defaults_shelf_to_read() {
        let query = ShelfQuery::parse(raw(Some("42"), None, None)).unwrap();
        assert_eq!(query.shelf, "read");
        assert_eq!(query.page, None);
    }

    #[test]
    fn rejects_non_numeric_user_ids() {
        for bad in [None, Some(""), Some("abc"), Some("12 34"), Some(" 42"), Some("42\n")] {
            let err = ShelfQuery::parse(raw(bad, None, None)).unwrap_err();
            assert!(matches!(err, ProxyError::InvalidInput(_)), "{bad:?}");
        }
    }

    #[test]
    fn rejects_bad_shelves_and_pages() {
        assert!(ShelfQuery::parse(raw(Some("1"), Some("to read"), None)).is_err());
        assert!(ShelfQuery::parse(raw(Some("1"), Some(" read"), None)).is_err());
        assert!(ShelfQuery::parse(raw(Some("1"), None, Some(" 2"))).is_err());
        assert!(ShelfQuery::parse(raw(Some("1"), None, Some("0"))).is_err());
        assert!(ShelfQuery::parse(raw(Some("1"), None, Some("two"))).is_err());
        let ok = ShelfQuery::parse(raw(Some("1"), Some("to-read"), Some("3"))).unwrap();
        assert_eq!(ok.shelf, "to-read");
        assert_eq!(ok.page, Some(3));
    }
}
