use crate::events::VisualAsset;
use crate::tasks::viewer::covers::fit_cover;
use crate::wall::{NodeVisual, ScrollState, WallMetrics};

/// One thing to draw, in logical pixels.
#[derive(Debug, Clone)]
pub enum WallQuad {
    Divider { rect: [f32; 4], year: i32 },
    Cover { rect: [f32; 4], asset: VisualAsset },
}

/// Flattens the live wall into screen-space quads, skipping anything that
/// lies entirely outside the viewport.
pub fn layout_wall(scroll: &ScrollState, metrics: &WallMetrics) -> Vec<WallQuad> {
    let viewport = scroll.viewport();
    let mut quads = Vec::new();
    for (index, column) in scroll.columns().iter().enumerate() {
        let x = scroll.offset() + index as f32 * metrics.column_width;
        if x + metrics.column_width <= 0.0 || x >= viewport.width {
            continue;
        }
        for node in column.nodes() {
            if node.y >= viewport.height {
                break;
            }
            match &node.visual {
                NodeVisual::Divider { year } => quads.push(WallQuad::Divider {
                    rect: [x, node.y, metrics.column_width, metrics.divider_height],
                    year: *year,
                }),
                NodeVisual::Cover(visual) => {
                    let slot = [x, node.y, visual.width, visual.height];
                    quads.push(WallQuad::Cover {
                        rect: fit_cover(slot, visual.asset.width, visual.asset.height),
                        asset: visual.asset.clone(),
                    });
                }
            }
        }
    }
    quads
}

/// Logical rect to physical pixels.
pub fn to_physical(rect: [f32; 4], scale: f32) -> [f32; 4] {
    rect.map(|value| value * scale)
}
