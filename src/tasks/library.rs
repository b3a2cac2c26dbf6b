use std::time::{Duration, Instant};

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::{self, Sender};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::Configuration;
use crate::error::FeedError;
use crate::events::{LibraryUpdate, LoadEvent, ShelfLoaded};
use crate::tasks::feed::{ShelfClient, sort_for_display};
use crate::tasks::loader::{CoverLoadSettings, load_covers};

pub fn cover_settings(cfg: &Configuration) -> CoverLoadSettings {
    CoverLoadSettings {
        max_concurrent: cfg.loader.max_concurrent_downloads,
        max_width: (cfg.wall.column_width_px * 2.0).ceil() as u32,
    }
}

/// Fetches the shelf, orders it for display and loads every cover.
pub async fn load_shelf(
    client: &ShelfClient,
    settings: CoverLoadSettings,
    progress: &Sender<LoadEvent>,
    cancel: &CancellationToken,
) -> Result<ShelfLoaded, FeedError> {
    let mut books = client.fetch_shelf(progress).await?;
    sort_for_display(&mut books);
    let assets = load_covers(client.http(), &books, settings, progress, cancel).await;
    Ok(ShelfLoaded { books, assets })
}

/// Loads the configured shelf once and hands it to the viewer, forwarding
/// progress as it goes.
pub async fn run(
    cfg: Configuration,
    to_viewer: Sender<LibraryUpdate>,
    cancel: CancellationToken,
) -> Result<()> {
    let client = ShelfClient::new(&cfg.shelf, cfg.loader.request_timeout)?;
    let settings = cover_settings(&cfg);

    let (progress_tx, mut progress_rx) = mpsc::channel::<LoadEvent>(64);
    let forward = {
        let to_viewer = to_viewer.clone();
        tokio::spawn(async move {
            while let Some(event) = progress_rx.recv().await {
                if to_viewer.send(LibraryUpdate::Progress(event)).await.is_err() {
                    break;
                }
            }
        })
    };

    let started = Instant::now();
    let outcome = select! {
        _ = cancel.cancelled() => None,
        result = load_shelf(&client, settings, &progress_tx, &cancel) => Some(result),
    };
    drop(progress_tx);
    let _ = forward.await;
    let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);

    match outcome {
        None => info!("shelf loading cancelled"),
        Some(Ok(shelf)) => {
            let covers = shelf.assets.iter().flatten().count();
            info!(
                books = shelf.books.len(),
                covers,
                elapsed = %humantime::format_duration(elapsed),
                "shelf ready"
            );
            let _ = to_viewer.send(LibraryUpdate::Ready(shelf)).await;
        }
        Some(Err(err)) => {
            warn!(error = %err, "failed to load shelf");
            let _ = to_viewer
                .send(LibraryUpdate::Failed(err.user_message()))
                .await;
        }
    }
    Ok(())
}
