use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::column::Column;
use super::geometry::{Viewport, WallMetrics};
use super::packer::pack_column;
use super::pool::WallPools;
use super::sequence::SequenceEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub speed_px_per_second: f32,
    /// Longest frame gap honoured; longer stalls advance the wall by this much.
    pub max_frame_delta: Duration,
}

/// The live wall: columns left to right, shifted left by `offset`.
#[derive(Debug)]
pub struct ScrollState {
    offset: f32,
    columns: VecDeque<Column>,
    last_frame: Option<Instant>,
    cursor: usize,
    sequence: Arc<[SequenceEntry]>,
    viewport: Viewport,
}

impl ScrollState {
    /// Horizontal position of the leftmost column; never positive.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    pub fn columns(&self) -> &VecDeque<Column> {
        &self.columns
    }

    /// Walk position the next synthesized column starts from.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn sequence(&self) -> &[SequenceEntry] {
        &self.sequence
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn last_frame(&self) -> Option<Instant> {
        self.last_frame
    }

    fn into_columns(self) -> Vec<Column> {
        self.columns.into()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub synthesized: bool,
    pub retired: bool,
}

/// Frame-driven horizontal scroller. The host calls [`ScrollEngine::tick`]
/// once per display refresh while [`ScrollEngine::is_running`] holds.
#[derive(Debug)]
pub struct ScrollEngine {
    settings: EngineSettings,
    state: EngineState,
    scroll: Option<ScrollState>,
}

impl ScrollEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            state: EngineState::Stopped,
            scroll: None,
        }
    }

    /// Replaces any running wall and begins scrolling from offset zero.
    ///
    /// Returns the columns released by this call so the caller can recycle
    /// them: the previous wall's, plus `columns` itself if `sequence` is
    /// empty. An empty sequence leaves the engine stopped with no wall.
    pub fn start(
        &mut self,
        sequence: Arc<[SequenceEntry]>,
        columns: Vec<Column>,
        resume_cursor: usize,
        viewport: Viewport,
    ) -> Vec<Column> {
        if sequence.is_empty() {
            tracing::warn!("refusing to animate an empty wall");
            let mut released = self.clear();
            released.extend(columns);
            return released;
        }
        let released = self
            .scroll
            .take()
            .map(ScrollState::into_columns)
            .unwrap_or_default();
        tracing::info!(
            columns = columns.len(),
            cursor = resume_cursor,
            entries = sequence.len(),
            "scroll engine started"
        );
        self.scroll = Some(ScrollState {
            offset: 0.0,
            columns: columns.into(),
            last_frame: None,
            cursor: resume_cursor,
            sequence,
            viewport,
        });
        self.state = EngineState::Running;
        released
    }

    /// Halts scrolling; the current columns stay in place.
    pub fn stop(&mut self) {
        if self.state == EngineState::Running {
            tracing::info!("scroll engine stopped");
        }
        self.state = EngineState::Stopped;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == EngineState::Running
    }

    pub fn scroll_state(&self) -> Option<&ScrollState> {
        self.scroll.as_ref()
    }

    /// Drops the wall entirely, returning its columns for recycling.
    pub fn clear(&mut self) -> Vec<Column> {
        self.state = EngineState::Stopped;
        self.scroll
            .take()
            .map(ScrollState::into_columns)
            .unwrap_or_default()
    }

    /// Advances one frame: moves the wall, appends at most one column on the
    /// right, then retires at most one column off the left edge.
    pub fn tick(&mut self, now: Instant, metrics: &WallMetrics, pools: &mut WallPools) -> TickReport {
        let mut report = TickReport::default();
        if self.state != EngineState::Running {
            return report;
        }
        let Some(scroll) = self.scroll.as_mut() else {
            return report;
        };

        let elapsed = match scroll.last_frame {
            Some(previous) => now
                .saturating_duration_since(previous)
                .min(self.settings.max_frame_delta),
            None => Duration::ZERO,
        };
        scroll.last_frame = Some(now);
        scroll.offset -= self.settings.speed_px_per_second * elapsed.as_secs_f32();

        let column_width = metrics.column_width;
        let covered = scroll.columns.len() as f32 * column_width + scroll.offset;
        if covered <= scroll.viewport.width {
            let (column, next) = pack_column(
                &scroll.sequence,
                scroll.cursor,
                scroll.viewport.height,
                metrics,
                pools,
            );
            scroll.columns.push_back(column);
            scroll.cursor = next;
            report.synthesized = true;
        }

        if scroll.offset + column_width <= 0.0 {
            if let Some(column) = scroll.columns.pop_front() {
                pools.recycle_column(column);
            }
            scroll.offset += column_width;
            report.retired = true;
        }

        if report.synthesized || report.retired {
            tracing::trace!(
                offset = scroll.offset,
                columns = scroll.columns.len(),
                cursor = scroll.cursor,
                synthesized = report.synthesized,
                retired = report.retired,
                "wall tick"
            );
        }
        report
    }
}
