use thiserror::Error;

/// Failures fetching the shelf from the proxy.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The proxy rejected the user id, shelf or key.
    #[error("invalid shelf request: {0}")]
    InvalidInput(String),

    #[error("shelf service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("shelf service timed out")]
    UpstreamTimeout,

    /// A 2xx body that is not a shelf page.
    #[error("unexpected shelf response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl FeedError {
    /// Short message suitable for the on-screen status line.
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidInput(detail) => format!("Invalid Goodreads request: {detail}"),
            Self::UpstreamUnavailable(_) | Self::Decode(_) => {
                "Could not load the Goodreads shelf".to_string()
            }
            Self::UpstreamTimeout => "Goodreads took too long to answer".to_string(),
        }
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout
        } else {
            Self::UpstreamUnavailable(err.to_string())
        }
    }
}
