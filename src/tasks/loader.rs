use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use image::imageops::FilterType;
use shelf_model::BookRecord;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::events::{CoverImage, LoadEvent, VisualAsset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverLoadSettings {
    pub max_concurrent: usize,
    /// Covers wider than this are downsized before upload.
    pub max_width: u32,
}

/// Running tally reported after every settled cover.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverProgress {
    pub loaded: usize,
    pub failed: usize,
    pub total: usize,
}

impl CoverProgress {
    fn event(&self) -> LoadEvent {
        LoadEvent::ImageProgress {
            loaded: self.loaded,
            failed: self.failed,
            total: self.total,
        }
    }
}

/// Downloads and decodes every book's cover. The result lines up with
/// `books`; books without a URL and covers that fail are `None`.
pub async fn load_covers(
    http: &reqwest::Client,
    books: &[BookRecord],
    settings: CoverLoadSettings,
    progress: &Sender<LoadEvent>,
    cancel: &CancellationToken,
) -> Vec<Option<VisualAsset>> {
    let urls = books.iter().map(|book| book.image_url.clone()).collect();
    let max_width = settings.max_width;
    load_with(urls, settings.max_concurrent, progress, cancel, |url| {
        fetch_cover(http, url, max_width)
    })
    .await
}

/// Drives `fetch` over `urls` with bounded concurrency, reporting progress.
/// Cancellation stops early and leaves unsettled positions `None`.
pub async fn load_with<F, Fut>(
    urls: Vec<Option<String>>,
    max_concurrent: usize,
    progress: &Sender<LoadEvent>,
    cancel: &CancellationToken,
    fetch: F,
) -> Vec<Option<VisualAsset>>
where
    F: Fn(String) -> Fut,
    Fut: Future<Output = Result<CoverImage>>,
{
    let mut tally = CoverProgress {
        total: urls.len(),
        ..CoverProgress::default()
    };
    let mut covers: Vec<Option<VisualAsset>> = vec![None; urls.len()];

    let mut pending = Vec::new();
    for (index, url) in urls.into_iter().enumerate() {
        match url.filter(|url| !url.trim().is_empty()) {
            Some(url) => pending.push((index, url)),
            None => tally.failed += 1,
        }
    }
    if tally.failed > 0 || pending.is_empty() {
        let _ = progress.send(tally.event()).await;
    }

    let fetch = &fetch;
    let mut downloads = stream::iter(pending)
        .map(|(index, url)| async move {
            let result = fetch(url.clone()).await;
            (index, url, result)
        })
        .buffer_unordered(max_concurrent.max(1));

    loop {
        select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(settled = tally.loaded + tally.failed, "cover loading cancelled");
                break;
            }
            next = downloads.next() => {
                let Some((index, url, result)) = next else {
                    break;
                };
                match result {
                    Ok(cover) => {
                        covers[index] = Some(Arc::new(cover));
                        tally.loaded += 1;
                    }
                    Err(err) => {
                        debug!(%url, error = %err, "cover unavailable");
                        tally.failed += 1;
                    }
                }
                let _ = progress.send(tally.event()).await;
            }
        }
    }

    info!(
        loaded = tally.loaded,
        failed = tally.failed,
        total = tally.total,
        "covers loaded"
    );
    covers
}

async fn fetch_cover(http: &reqwest::Client, url: String, max_width: u32) -> Result<CoverImage> {
    let bytes = http
        .get(&url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .with_context(|| format!("failed to request {url}"))?
        .bytes()
        .await
        .with_context(|| format!("failed to read {url}"))?;
    tokio::task::spawn_blocking(move || decode_cover(&bytes, max_width))
        .await
        .context("cover decode task panicked")?
}

/// Decodes any supported format to RGBA8, downsizing to `max_width` while
/// keeping the aspect ratio.
pub fn decode_cover(bytes: &[u8], max_width: u32) -> Result<CoverImage> {
    let img = image::load_from_memory(bytes).context("unsupported cover image")?;
    let img = if max_width > 0 && img.width() > max_width {
        img.resize(max_width, u32::MAX, FilterType::Triangle)
    } else {
        img
    };
    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    Ok(CoverImage::new(width, height, rgba.into_raw()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tokio::sync::mpsc;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 10, 10, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decode_downsizes_wide_covers() {
        let cover = decode_cover(&png(800, 1200), 400).unwrap();
        assert_eq!((cover.width, cover.height), (400, 600));
        assert_eq!(cover.pixels.len(), 400 * 600 * 4);

        let small = decode_cover(&png(100, 150), 400).unwrap();
        assert_eq!((small.width, small.height), (100, 150));
    }

    #[test]
    fn decode_rejects_non_images() {
        assert!(decode_cover(b"<html>not an image</html>", 400).is_err());
    }

    #[tokio::test]
    async fn results_line_up_with_input_order() {
        let (tx, mut rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        let urls = vec![
            Some("a".to_string()),
            None,
            Some("broken".to_string()),
            Some("b".to_string()),
        ];
        let covers = load_with(urls, 2, &tx, &cancel, |url| async move {
            match url.as_str() {
                "broken" => anyhow::bail!("404"),
                "a" => Ok(CoverImage::new(1, 2, vec![0; 8])),
                _ => Ok(CoverImage::new(3, 4, vec![0; 48])),
            }
        })
        .await;
        drop(tx);

        assert_eq!(covers.len(), 4);
        assert_eq!(covers[0].as_ref().map(|c| c.width), Some(1));
        assert!(covers[1].is_none());
        assert!(covers[2].is_none());
        assert_eq!(covers[3].as_ref().map(|c| c.width), Some(3));

        let mut last = None;
        while let Some(event) = rx.recv().await {
            last = Some(event);
        }
        assert_eq!(
            last,
            Some(LoadEvent::ImageProgress {
                loaded: 2,
                failed: 2,
                total: 4
            })
        );
    }

    #[tokio::test]
    async fn empty_shelf_reports_completion() {
        let (tx, mut rx) = mpsc::channel(4);
        let cancel = CancellationToken::new();
        let covers = load_with(Vec::new(), 4, &tx, &cancel, |_| async {
            Ok(CoverImage::new(1, 1, vec![0; 4]))
        })
        .await;
        assert!(covers.is_empty());
        assert_eq!(
            rx.recv().await,
            Some(LoadEvent::ImageProgress {
                loaded: 0,
                failed: 0,
                total: 0
            })
        );
    }

    #[tokio::test]
    async fn cancellation_leaves_remaining_covers_absent() {
        let (tx, _rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let covers = load_with(
            vec![Some("a".into()), Some("b".into())],
            1,
            &tx,
            &cancel,
            |_| async { Ok(CoverImage::new(1, 1, vec![0; 4])) },
        )
        .await;
        assert!(covers.iter().all(Option::is_none));
    }
}
