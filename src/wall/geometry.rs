/// Fixed layout constants for one wall, in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallMetrics {
    pub column_width: f32,
    pub max_cover_height: f32,
    pub divider_height: f32,
    pub divider_margin: f32,
    /// Full passes over the sequence a single column may make before it is
    /// accepted underfull.
    pub max_wrap_repeats: u32,
}

impl WallMetrics {
    /// Vertical space a year divider occupies, box plus trailing margin.
    pub fn divider_extent(&self) -> f32 {
        self.divider_height + self.divider_margin
    }

    /// Cover scaled to the column width, capped at the maximum cover height.
    /// Degenerate images occupy no space.
    pub fn cover_height(&self, width: u32, height: u32) -> f32 {
        if width == 0 || height == 0 {
            return 0.0;
        }
        let scaled = height as f32 * (self.column_width / width as f32);
        scaled.min(self.max_cover_height)
    }

    /// Columns needed to cover `viewport_width`, counting a partial one.
    pub fn column_count(&self, viewport_width: f32) -> usize {
        if self.column_width <= 0.0 || viewport_width <= 0.0 {
            return 0;
        }
        (viewport_width / self.column_width).ceil() as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

/// Identity of a memoized entry height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKey {
    Divider,
    Cover {
        source_index: usize,
        width: u32,
        height: u32,
    },
}
