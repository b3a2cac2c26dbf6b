use super::column::Column;
use super::geometry::WallMetrics;
use super::packer::pack_column;
use super::pool::WallPools;
use super::sequence::SequenceEntry;

#[derive(Debug, Default)]
pub struct BuiltWall {
    pub columns: Vec<Column>,
    /// Where the next synthesized column starts.
    pub resume_cursor: usize,
}

/// Packs `column_count` columns left to right, each continuing where the
/// previous one stopped.
pub fn build_wall(
    sequence: &[SequenceEntry],
    column_count: usize,
    target_height: f32,
    metrics: &WallMetrics,
    pools: &mut WallPools,
) -> BuiltWall {
    if sequence.is_empty() {
        return BuiltWall::default();
    }

    let mut columns = Vec::with_capacity(column_count);
    let mut cursor = 0;
    for _ in 0..column_count {
        let (column, next) = pack_column(sequence, cursor, target_height, metrics, pools);
        columns.push(column);
        cursor = next;
    }
    tracing::debug!(
        columns = columns.len(),
        cursor,
        entries = sequence.len(),
        "wall built"
    );
    BuiltWall {
        columns,
        resume_cursor: cursor,
    }
}
