use std::sync::Arc;

use crate::events::VisualAsset;

/// Pool identity of a cover visual.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoverKey {
    pub title: String,
    pub source_index: usize,
}

/// A cover scaled for the wall; shared between every column showing it.
#[derive(Debug)]
pub struct CoverVisual {
    pub key: CoverKey,
    pub asset: VisualAsset,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub enum NodeVisual {
    Cover(Arc<CoverVisual>),
    Divider { year: i32 },
}

#[derive(Debug, Clone)]
pub struct PlacedNode {
    /// Unwrapped walk position this node was packed from.
    pub cursor: usize,
    /// Top edge, relative to the column.
    pub y: f32,
    /// Vertical space reserved for the node, including any margin.
    pub height: f32,
    pub visual: NodeVisual,
}

/// One vertical strip of the wall.
#[derive(Debug, Default)]
pub struct Column {
    nodes: Vec<PlacedNode>,
    accumulated_height: f32,
}

impl Column {
    pub fn push(&mut self, cursor: usize, height: f32, visual: NodeVisual) {
        self.nodes.push(PlacedNode {
            cursor,
            y: self.accumulated_height,
            height,
            visual,
        });
        self.accumulated_height += height;
    }

    /// Empties the column while keeping its node storage for reuse.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.accumulated_height = 0.0;
    }

    pub fn nodes(&self) -> &[PlacedNode] {
        &self.nodes
    }

    pub fn accumulated_height(&self) -> f32 {
        self.accumulated_height
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn cursors(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes.iter().map(|node| node.cursor)
    }
}
