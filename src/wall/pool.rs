use std::collections::HashMap;
use std::sync::Arc;

use shelf_model::BookRecord;

use super::column::{Column, CoverKey, CoverVisual};
use super::geometry::{GeometryKey, WallMetrics};
use crate::events::VisualAsset;

/// Sizes above which a pool is dropped wholesale on the next cleanup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
    pub columns: usize,
    pub covers: usize,
    pub geometry: usize,
}

impl Default for PoolLimits {
    fn default() -> Self {
        Self {
            columns: 64,
            covers: 1000,
            geometry: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub columns: usize,
    pub covers: usize,
    pub geometry: usize,
}

/// Reusable wall resources: retired columns, scaled cover visuals and
/// memoized entry heights. Nothing read from here changes layout results.
#[derive(Debug, Default)]
pub struct WallPools {
    limits: PoolLimits,
    columns: Vec<Column>,
    covers: HashMap<CoverKey, Arc<CoverVisual>>,
    geometry: HashMap<GeometryKey, f32>,
}

impl WallPools {
    pub fn new(limits: PoolLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    pub fn take_column(&mut self) -> Column {
        match self.columns.pop() {
            Some(mut column) => {
                column.reset();
                column
            }
            None => Column::default(),
        }
    }

    pub fn recycle_column(&mut self, mut column: Column) {
        column.reset();
        self.columns.push(column);
    }

    pub fn cover_visual(
        &mut self,
        record: &BookRecord,
        asset: &VisualAsset,
        source_index: usize,
        height: f32,
        metrics: &WallMetrics,
    ) -> Arc<CoverVisual> {
        let key = CoverKey {
            title: record.title.clone(),
            source_index,
        };
        if let Some(visual) = self.covers.get(&key) {
            // A reloaded shelf can reuse a key for a different image.
            if Arc::ptr_eq(&visual.asset, asset) && visual.height == height {
                return Arc::clone(visual);
            }
        }
        let visual = Arc::new(CoverVisual {
            key: key.clone(),
            asset: Arc::clone(asset),
            width: metrics.column_width,
            height,
        });
        self.covers.insert(key, Arc::clone(&visual));
        visual
    }

    pub fn geometry(&mut self, key: GeometryKey, compute: impl FnOnce() -> f32) -> f32 {
        *self.geometry.entry(key).or_insert_with(compute)
    }

    /// Clears every pool that has outgrown its limit.
    pub fn cleanup(&mut self) -> PoolStats {
        let before = self.stats();
        if self.columns.len() > self.limits.columns {
            self.columns.clear();
        }
        if self.covers.len() > self.limits.covers {
            self.covers.clear();
        }
        if self.geometry.len() > self.limits.geometry {
            self.geometry.clear();
        }
        let after = self.stats();
        if after != before {
            tracing::info!(
                columns = before.columns,
                covers = before.covers,
                geometry = before.geometry,
                "wall pools cleared"
            );
        }
        after
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            columns: self.columns.len(),
            covers: self.covers.len(),
            geometry: self.geometry.len(),
        }
    }
}
