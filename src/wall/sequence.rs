use std::sync::Arc;

use chrono::Datelike;
use shelf_model::{BookRecord, parse_calendar_date};

use super::geometry::GeometryKey;
use crate::events::VisualAsset;

#[derive(Debug, Clone)]
pub enum SequenceEntry {
    YearDivider {
        year: i32,
    },
    BookItem {
        record: BookRecord,
        asset: VisualAsset,
        /// Position of the book in the caller's list, before absent covers were skipped.
        source_index: usize,
    },
}

impl SequenceEntry {
    pub fn geometry_key(&self) -> GeometryKey {
        match self {
            Self::YearDivider { .. } => GeometryKey::Divider,
            Self::BookItem {
                asset,
                source_index,
                ..
            } => GeometryKey::Cover {
                source_index: *source_index,
                width: asset.width,
                height: asset.height,
            },
        }
    }

    pub fn source_index(&self) -> Option<usize> {
        match self {
            Self::YearDivider { .. } => None,
            Self::BookItem { source_index, .. } => Some(*source_index),
        }
    }
}

/// Calendar year the book was read, if `read_at` parses.
pub fn read_year(record: &BookRecord) -> Option<i32> {
    record
        .read_at
        .as_deref()
        .and_then(parse_calendar_date)
        .map(|date| date.year())
}

/// Flattens books in display order into covers with a divider before each
/// change of read year. Books without a cover are dropped, and books without
/// a year neither emit nor reset a divider.
pub fn build_sequence(books: &[BookRecord], assets: &[Option<VisualAsset>]) -> Vec<SequenceEntry> {
    let mut sequence = Vec::with_capacity(books.len() + books.len() / 4);
    let mut last_year: Option<i32> = None;

    for (source_index, (record, asset)) in books.iter().zip(assets).enumerate() {
        let Some(asset) = asset else {
            continue;
        };
        if let Some(year) = read_year(record) {
            if last_year != Some(year) {
                sequence.push(SequenceEntry::YearDivider { year });
                last_year = Some(year);
            }
        }
        sequence.push(SequenceEntry::BookItem {
            record: record.clone(),
            asset: Arc::clone(asset),
            source_index,
        });
    }
    sequence
}

/// Memoizes [`build_sequence`] on the input lengths only. Replacing books
/// with a same-sized list requires [`SequenceCache::invalidate`].
#[derive(Debug, Default)]
pub struct SequenceCache {
    key: Option<(usize, usize)>,
    sequence: Option<Arc<[SequenceEntry]>>,
}

impl SequenceCache {
    pub fn get_or_build(
        &mut self,
        books: &[BookRecord],
        assets: &[Option<VisualAsset>],
    ) -> Arc<[SequenceEntry]> {
        let key = (books.len(), assets.len());
        if self.key == Some(key) {
            if let Some(sequence) = &self.sequence {
                return Arc::clone(sequence);
            }
        }
        let sequence: Arc<[SequenceEntry]> = build_sequence(books, assets).into();
        tracing::debug!(
            books = books.len(),
            entries = sequence.len(),
            "item sequence rebuilt"
        );
        self.key = Some(key);
        self.sequence = Some(Arc::clone(&sequence));
        sequence
    }

    pub fn invalidate(&mut self) {
        self.key = None;
        self.sequence = None;
    }
}
