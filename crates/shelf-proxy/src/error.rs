use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shelf_model::ErrorBody;
use thiserror::Error;

use crate::rss::RssError;

/// Everything the proxy can answer with besides a shelf page.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Malformed `userId`, `shelf`, `key` or `page`.
    #[error("{0}")]
    InvalidInput(String),

    /// Upstream refused the request or returned a non-success status.
    #[error("upstream request failed: {0}")]
    UpstreamUnavailable(String),

    /// Upstream did not answer within the configured timeout.
    #[error("upstream request timed out")]
    UpstreamTimeout,

    /// Upstream answered with something that is not an RSS document.
    #[error("upstream feed could not be parsed: {0}")]
    MalformedFeed(#[from] RssError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::UpstreamUnavailable(_) | Self::MalformedFeed(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message sent to clients. Only input errors echo detail back.
    pub fn public_message(&self) -> String {
        match self {
            Self::InvalidInput(message) => message.clone(),
            Self::UpstreamUnavailable(_) | Self::MalformedFeed(_) => {
                "Failed to fetch Goodreads shelf".to_string()
            }
            Self::UpstreamTimeout => "Timed out fetching Goodreads shelf".to_string(),
            Self::Internal(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        match &self {
            Self::InvalidInput(message) => tracing::debug!(%message, "rejected shelf request"),
            Self::UpstreamUnavailable(_) | Self::UpstreamTimeout | Self::MalformedFeed(_) => {
                tracing::warn!(error = %self, "upstream shelf fetch failed")
            }
            Self::Internal(_) => tracing::error!(error = %self, "shelf request failed"),
        }
        let body = ErrorBody {
            error: self.public_message(),
        };
        (self.status(), Json(body)).into_response()
    }
}
