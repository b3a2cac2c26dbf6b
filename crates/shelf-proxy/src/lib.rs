//! `GET /api/goodreads`: fetches a user's Goodreads shelf RSS and serves it as JSON.

pub mod error;
pub mod feed;
pub mod routes;
pub mod rss;

pub use error::ProxyError;
pub use feed::{FeedSource, GoodreadsFeed, PageRequest, RSS_PAGE_SIZE};
pub use routes::{CACHE_CONTROL, ShelfQuery, router};
