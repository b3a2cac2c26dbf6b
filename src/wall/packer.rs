use super::column::{Column, NodeVisual};
use super::geometry::WallMetrics;
use super::pool::WallPools;
use super::sequence::SequenceEntry;

/// Fills one column from `start` until it reaches `target_height`.
///
/// The walk wraps to the front of `sequence` when it runs off the end and
/// gives up after `max_wrap_repeats` full passes, returning the column
/// underfull. The returned cursor is unwrapped, so consecutive calls that
/// thread it through form one contiguous walk.
pub fn pack_column(
    sequence: &[SequenceEntry],
    start: usize,
    target_height: f32,
    metrics: &WallMetrics,
    pools: &mut WallPools,
) -> (Column, usize) {
    let mut column = pools.take_column();
    if sequence.is_empty() {
        return (column, start);
    }

    let budget = sequence
        .len()
        .saturating_mul(metrics.max_wrap_repeats.max(1) as usize);
    let mut cursor = start;
    while column.accumulated_height() < target_height && cursor - start < budget {
        let entry = &sequence[cursor % sequence.len()];
        let height = pools.geometry(entry.geometry_key(), || entry_height(entry, metrics));
        let visual = match entry {
            SequenceEntry::YearDivider { year } => NodeVisual::Divider { year: *year },
            SequenceEntry::BookItem {
                record,
                asset,
                source_index,
            } => NodeVisual::Cover(pools.cover_visual(
                record,
                asset,
                *source_index,
                height,
                metrics,
            )),
        };
        column.push(cursor, height, visual);
        cursor += 1;
    }

    if column.accumulated_height() < target_height {
        tracing::trace!(
            start,
            entries = column.len(),
            height = column.accumulated_height(),
            "column left underfull after wrap limit"
        );
    }
    (column, cursor)
}

fn entry_height(entry: &SequenceEntry, metrics: &WallMetrics) -> f32 {
    match entry {
        SequenceEntry::YearDivider { .. } => metrics.divider_extent(),
        SequenceEntry::BookItem { asset, .. } => metrics.cover_height(asset.width, asset.height),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use shelf_model::BookRecord;

    use super::*;
    use crate::events::CoverImage;

    fn metrics() -> WallMetrics {
        WallMetrics {
            column_width: 200.0,
            max_cover_height: 320.0,
            divider_height: 60.0,
            divider_margin: 20.0,
            max_wrap_repeats: 3,
        }
    }

    fn cover(index: usize, width: u32, height: u32) -> SequenceEntry {
        SequenceEntry::BookItem {
            record: BookRecord {
                id: index.to_string(),
                title: format!("Book {index}"),
                author: String::new(),
                image_url: None,
                read_at: None,
                date_added: None,
            },
            asset: Arc::new(CoverImage::new(width, height, Vec::new())),
            source_index: index,
        }
    }

    #[test]
    fn fills_until_target_is_reached() {
        let sequence = vec![
            SequenceEntry::YearDivider { year: 2020 },
            cover(0, 200, 300),
            cover(1, 200, 300),
            cover(2, 200, 300),
        ];
        let mut pools = WallPools::default();
        let (column, next) = pack_column(&sequence, 0, 500.0, &metrics(), &mut pools);
        assert_eq!(column.len(), 3);
        assert_eq!(column.accumulated_height(), 680.0);
        assert_eq!(next, 3);
    }

    #[test]
    fn wraps_and_returns_unwrapped_cursor() {
        let sequence = vec![cover(0, 200, 200), cover(1, 200, 200)];
        let mut pools = WallPools::default();
        let (column, next) = pack_column(&sequence, 1, 500.0, &metrics(), &mut pools);
        assert_eq!(column.cursors().collect::<Vec<_>>(), [1, 2, 3]);
        assert_eq!(next, 4);
        match &column.nodes()[1].visual {
            NodeVisual::Cover(visual) => assert_eq!(visual.key.source_index, 0),
            other => panic!("expected cover, got {other:?}"),
        }
    }

    #[test]
    fn single_entry_with_huge_target_stops_at_wrap_limit() {
        let sequence = vec![cover(0, 200, 100)];
        let mut pools = WallPools::default();
        let (column, next) = pack_column(&sequence, 0, 1_000_000.0, &metrics(), &mut pools);
        assert_eq!(column.len(), 3);
        assert_eq!(next, 3);
        assert!(column.accumulated_height() < 1_000_000.0);
    }

    #[test]
    fn zero_height_covers_cannot_spin_forever() {
        let sequence = vec![cover(0, 0, 0), cover(1, 0, 0)];
        let mut pools = WallPools::default();
        let (column, next) = pack_column(&sequence, 5, 100.0, &metrics(), &mut pools);
        assert_eq!(column.len(), 6);
        assert_eq!(next, 11);
    }

    #[test]
    fn empty_sequence_yields_empty_column() {
        let mut pools = WallPools::default();
        let (column, next) = pack_column(&[], 7, 900.0, &metrics(), &mut pools);
        assert!(column.is_empty());
        assert_eq!(next, 7);
    }

    #[test]
    fn covers_shared_across_columns_come_from_the_pool() {
        let sequence = vec![cover(0, 200, 400)];
        let mut pools = WallPools::default();
        let (first, next) = pack_column(&sequence, 0, 300.0, &metrics(), &mut pools);
        let (second, _) = pack_column(&sequence, next, 300.0, &metrics(), &mut pools);
        let (NodeVisual::Cover(a), NodeVisual::Cover(b)) =
            (&first.nodes()[0].visual, &second.nodes()[0].visual)
        else {
            panic!("expected covers");
        };
        assert!(Arc::ptr_eq(a, b));
        assert_eq!(a.height, 320.0);
    }
}
