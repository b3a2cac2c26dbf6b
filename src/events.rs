use std::sync::Arc;

use shelf_model::BookRecord;

/// A decoded cover, RGBA8, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl CoverImage {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }
}

pub type VisualAsset = Arc<CoverImage>;

/// Loading progress, in the order the phases happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadEvent {
    Connect,
    FetchProgress { count: usize },
    FetchComplete { count: usize },
    ImageProgress { loaded: usize, failed: usize, total: usize },
}

impl LoadEvent {
    /// Status line shown on screen while the wall is not yet up.
    pub fn status_line(&self) -> String {
        match *self {
            Self::Connect => "Connecting to Goodreads…".to_string(),
            Self::FetchProgress { count } => format!("Fetched {count} books…"),
            Self::FetchComplete { count } => format!("Found {count} books. Loading covers…"),
            Self::ImageProgress {
                loaded,
                failed,
                total,
            } => {
                if failed > 0 {
                    format!("Loading covers {}/{total} ({failed} unavailable)", loaded + failed)
                } else {
                    format!("Loading covers {loaded}/{total}")
                }
            }
        }
    }
}

/// A shelf in display order with its covers, position for position.
#[derive(Debug, Clone, Default)]
pub struct ShelfLoaded {
    pub books: Vec<BookRecord>,
    pub assets: Vec<Option<VisualAsset>>,
}

/// Library task -> viewer.
#[derive(Debug, Clone)]
pub enum LibraryUpdate {
    Progress(LoadEvent),
    Ready(ShelfLoaded),
    Failed(String),
}
