//! Endless cover wall: item sequencing, column packing and the frame-driven
//! scroll engine, fronted by [`CoverWall`].

pub mod builder;
pub mod column;
pub mod engine;
pub mod geometry;
pub mod packer;
pub mod pool;
pub mod sequence;

use std::sync::Arc;
use std::time::Instant;

use shelf_model::BookRecord;

pub use builder::{BuiltWall, build_wall};
pub use column::{Column, CoverKey, CoverVisual, NodeVisual, PlacedNode};
pub use engine::{EngineSettings, EngineState, ScrollEngine, ScrollState, TickReport};
pub use geometry::{GeometryKey, Viewport, WallMetrics};
pub use packer::pack_column;
pub use pool::{PoolLimits, PoolStats, WallPools};
pub use sequence::{SequenceCache, SequenceEntry, build_sequence, read_year};

use crate::config::Configuration;
use crate::events::VisualAsset;

/// A freshly packed wall, ready for [`CoverWall::start_animation`].
#[derive(Debug)]
pub struct WallBuild {
    pub sequence: Arc<[SequenceEntry]>,
    pub columns: Vec<Column>,
    pub resume_cursor: usize,
}

impl WallBuild {
    /// True when no book had a cover; the host shows its empty state.
    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

/// Owns the wall's state: metrics, pools, the memoized sequence and the
/// scroll engine.
#[derive(Debug)]
pub struct CoverWall {
    metrics: WallMetrics,
    pools: WallPools,
    sequences: SequenceCache,
    engine: ScrollEngine,
}

impl CoverWall {
    pub fn new(metrics: WallMetrics, settings: EngineSettings, limits: PoolLimits) -> Self {
        Self {
            metrics,
            pools: WallPools::new(limits),
            sequences: SequenceCache::default(),
            engine: ScrollEngine::new(settings),
        }
    }

    pub fn from_config(cfg: &Configuration) -> Self {
        Self::new(cfg.wall_metrics(), cfg.engine_settings(), cfg.pool_limits())
    }

    pub fn metrics(&self) -> &WallMetrics {
        &self.metrics
    }

    /// Sequences `books` and packs enough columns to cover `viewport`.
    pub fn render_wall(
        &mut self,
        books: &[BookRecord],
        assets: &[Option<VisualAsset>],
        viewport: Viewport,
    ) -> WallBuild {
        let sequence = self.sequences.get_or_build(books, assets);
        let built = build_wall(
            &sequence,
            self.metrics.column_count(viewport.width),
            viewport.height,
            &self.metrics,
            &mut self.pools,
        );
        WallBuild {
            sequence,
            columns: built.columns,
            resume_cursor: built.resume_cursor,
        }
    }

    /// Starts scrolling `build`, replacing any running wall. Returns false for
    /// an empty build; the previous wall is dropped and nothing animates.
    pub fn start_animation(&mut self, build: WallBuild, viewport: Viewport) -> bool {
        let empty = build.is_empty();
        if empty {
            tracing::info!("no covers to show; wall left empty");
        }
        let released = self.engine.start(
            build.sequence,
            build.columns,
            build.resume_cursor,
            viewport,
        );
        self.recycle(released);
        !empty
    }

    /// True unless a wall built for exactly `viewport` is scrolling.
    pub fn needs_rebuild(&self, viewport: Viewport) -> bool {
        !self.engine.is_running()
            || self
                .engine
                .scroll_state()
                .is_none_or(|scroll| scroll.viewport() != viewport)
    }

    pub fn stop_animation(&mut self) {
        self.engine.stop();
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_running()
    }

    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.engine.tick(now, &self.metrics, &mut self.pools)
    }

    pub fn scroll_state(&self) -> Option<&ScrollState> {
        self.engine.scroll_state()
    }

    pub fn cleanup_pools(&mut self) -> PoolStats {
        self.pools.cleanup()
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pools.stats()
    }

    /// Forgets the memoized sequence; needed when a new shelf arrives with
    /// the same number of books.
    pub fn invalidate_sequence(&mut self) {
        self.sequences.invalidate();
    }

    /// Resize path: stop, sweep the pools, rebuild for `viewport` and restart.
    /// Returns whether the wall is animating afterwards.
    pub fn rebuild(
        &mut self,
        books: &[BookRecord],
        assets: &[Option<VisualAsset>],
        viewport: Viewport,
    ) -> bool {
        self.stop_animation();
        let previous = self.engine.clear();
        self.recycle(previous);
        self.cleanup_pools();
        if viewport.is_empty() {
            return false;
        }
        let build = self.render_wall(books, assets, viewport);
        tracing::info!(
            columns = build.columns.len(),
            cursor = build.resume_cursor,
            width = viewport.width,
            height = viewport.height,
            "wall rebuilt"
        );
        self.start_animation(build, viewport)
    }

    fn recycle(&mut self, columns: Vec<Column>) {
        for column in columns {
            self.pools.recycle_column(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::CoverImage;
    use std::time::Duration;

    fn wall() -> CoverWall {
        CoverWall::new(
            WallMetrics {
                column_width: 200.0,
                max_cover_height: 320.0,
                divider_height: 60.0,
                divider_margin: 20.0,
                max_wrap_repeats: 3,
            },
            EngineSettings {
                speed_px_per_second: 40.0,
                max_frame_delta: Duration::from_millis(250),
            },
            PoolLimits::default(),
        )
    }

    fn books(count: usize) -> (Vec<BookRecord>, Vec<Option<VisualAsset>>) {
        let books = (0..count)
            .map(|index| BookRecord {
                id: index.to_string(),
                title: format!("Book {index}"),
                author: String::new(),
                image_url: None,
                read_at: Some("2020-01-01".into()),
                date_added: None,
            })
            .collect();
        let assets = (0..count)
            .map(|_| Some(Arc::new(CoverImage::new(200, 300, Vec::new()))))
            .collect();
        (books, assets)
    }

    #[test]
    fn empty_shelf_never_starts() {
        let mut wall = wall();
        let viewport = Viewport::new(600.0, 900.0);
        let build = wall.render_wall(&[], &[], viewport);
        assert!(build.is_empty());
        assert!(!wall.start_animation(build, viewport));
        assert!(!wall.is_running());
    }

    #[test]
    fn starting_an_empty_build_stops_the_running_wall() {
        let mut wall = wall();
        let (books, assets) = books(6);
        let viewport = Viewport::new(600.0, 900.0);
        assert!(wall.rebuild(&books, &assets, viewport));
        assert!(wall.is_running());

        wall.invalidate_sequence();
        let build = wall.render_wall(&[], &[], viewport);
        assert!(!wall.start_animation(build, viewport));
        assert!(!wall.is_running());
        assert!(wall.scroll_state().is_none());
    }

    #[test]
    fn rebuild_is_needed_only_for_a_new_viewport() {
        let mut wall = wall();
        let (books, assets) = books(6);
        let viewport = Viewport::new(600.0, 900.0);
        assert!(wall.needs_rebuild(viewport));

        assert!(wall.rebuild(&books, &assets, viewport));
        let start = Instant::now();
        wall.tick(start);
        wall.tick(start + Duration::from_millis(200));
        assert!(!wall.needs_rebuild(viewport));
        assert!(wall.scroll_state().unwrap().offset() < 0.0);
        assert!(wall.needs_rebuild(Viewport::new(800.0, 900.0)));
        assert!(wall.needs_rebuild(Viewport::new(600.0, 700.0)));

        wall.stop_animation();
        assert!(wall.needs_rebuild(viewport));
    }

    #[test]
    fn all_covers_missing_is_an_empty_wall() {
        let mut wall = wall();
        let (books, _) = books(3);
        let viewport = Viewport::new(600.0, 900.0);
        assert!(!wall.rebuild(&books, &[None, None, None], viewport));
        assert!(wall.scroll_state().is_none());
    }

    #[test]
    fn rebuild_replaces_the_running_wall() {
        let mut wall = wall();
        let (books, assets) = books(6);
        assert!(wall.rebuild(&books, &assets, Viewport::new(600.0, 900.0)));
        assert_eq!(wall.scroll_state().unwrap().columns().len(), 3);

        assert!(wall.rebuild(&books, &assets, Viewport::new(1000.0, 900.0)));
        let scroll = wall.scroll_state().unwrap();
        assert_eq!(scroll.columns().len(), 5);
        assert_eq!(scroll.offset(), 0.0);
        assert!(wall.is_running());
    }

    #[test]
    fn stop_then_tick_is_inert() {
        let mut wall = wall();
        let (books, assets) = books(4);
        wall.rebuild(&books, &assets, Viewport::new(400.0, 600.0));
        wall.stop_animation();
        assert_eq!(wall.tick(Instant::now()), TickReport::default());
    }
}
