use std::sync::Arc;
use std::time::{Duration, Instant};

use shelf_model::BookRecord;
use shelf_wall::events::{CoverImage, VisualAsset};
use shelf_wall::wall::{
    CoverWall, EngineSettings, NodeVisual, PoolLimits, SequenceEntry, Viewport, WallMetrics,
    build_sequence,
};

fn metrics() -> WallMetrics {
    WallMetrics {
        column_width: 200.0,
        max_cover_height: 320.0,
        divider_height: 60.0,
        divider_margin: 20.0,
        max_wrap_repeats: 3,
    }
}

fn wall() -> CoverWall {
    CoverWall::new(
        metrics(),
        EngineSettings {
            speed_px_per_second: 40.0,
            max_frame_delta: Duration::from_millis(250),
        },
        PoolLimits::default(),
    )
}

fn book(index: usize, read_at: Option<&str>) -> BookRecord {
    BookRecord {
        id: format!("{}", 1000 + index),
        title: format!("Book {index}"),
        author: "Someone".to_string(),
        image_url: Some(format!("https://covers.example/{index}.jpg")),
        read_at: read_at.map(str::to_string),
        date_added: None,
    }
}

/// 100×400 covers scale to 200×800 and cap at 320.
fn tall_cover() -> Option<VisualAsset> {
    Some(Arc::new(CoverImage::new(100, 400, Vec::new())))
}

fn shelf(read_at: &[Option<&str>]) -> (Vec<BookRecord>, Vec<Option<VisualAsset>>) {
    let books = read_at
        .iter()
        .enumerate()
        .map(|(index, read_at)| book(index, *read_at))
        .collect();
    let assets = read_at.iter().map(|_| tall_cover()).collect();
    (books, assets)
}

fn labels(nodes: &[shelf_wall::wall::PlacedNode]) -> Vec<String> {
    nodes
        .iter()
        .map(|node| match &node.visual {
            NodeVisual::Divider { year } => format!("D{year}"),
            NodeVisual::Cover(visual) => format!("B{}", visual.key.source_index),
        })
        .collect()
}

fn five_books() -> (Vec<BookRecord>, Vec<Option<VisualAsset>>) {
    shelf(&[
        Some("2020-11-02T00:00:00+00:00"),
        Some("2020-03-15T00:00:00+00:00"),
        Some("2021-12-01T00:00:00+00:00"),
        Some("2021-06-30T00:00:00+00:00"),
        Some("2021-01-09T00:00:00+00:00"),
    ])
}

#[test]
fn five_book_wall_matches_expected_layout() {
    let (books, assets) = five_books();
    let mut wall = wall();
    let build = wall.render_wall(&books, &assets, Viewport::new(600.0, 900.0));

    assert_eq!(build.columns.len(), 3);
    let first = &build.columns[0];
    assert_eq!(labels(first.nodes()), ["D2020", "B0", "B1", "D2021", "B2"]);
    assert_eq!(first.accumulated_height(), 1120.0);
    assert!(first.accumulated_height() >= 900.0);

    assert_eq!(
        labels(build.columns[1].nodes()),
        ["B3", "B4", "D2020", "B0"]
    );
    assert_eq!(build.resume_cursor, 13);
}

#[test]
fn animation_continues_the_walk_without_gaps() {
    let (books, assets) = five_books();
    let mut wall = wall();
    let viewport = Viewport::new(600.0, 900.0);
    assert!(wall.rebuild(&books, &assets, viewport));

    let mut walk: Vec<usize> = wall
        .scroll_state()
        .unwrap()
        .columns()
        .iter()
        .flat_map(|column| column.cursors())
        .collect();

    let start = Instant::now();
    let mut synthesized = 0;
    for frame in 0..400u32 {
        let report = wall.tick(start + Duration::from_millis(130) * frame);
        let scroll = wall.scroll_state().unwrap();
        if report.synthesized {
            synthesized += 1;
            let newest = scroll.columns().back().unwrap();
            walk.extend(newest.cursors());
        }
        if frame > 0 {
            assert!(scroll.offset() <= 0.0);
            assert!(scroll.offset() >= -metrics().column_width);
        }
    }

    assert!(synthesized >= 8, "only {synthesized} columns synthesized");
    let expected: Vec<usize> = (0..walk.len()).collect();
    assert_eq!(walk, expected);
}

#[test]
fn books_without_covers_or_years_shape_the_sequence() {
    let (books, mut assets) = shelf(&[
        Some("2021-01-01"),
        Some("2021-02-01"),
        Some("2022-01-01"),
        None,
        Some("2022-05-01"),
    ]);
    assets[1] = None;

    let sequence = build_sequence(&books, &assets);
    let shape: Vec<String> = sequence
        .iter()
        .map(|entry| match entry {
            SequenceEntry::YearDivider { year } => format!("D{year}"),
            SequenceEntry::BookItem { source_index, .. } => format!("B{source_index}"),
        })
        .collect();
    assert_eq!(shape, ["D2021", "B0", "D2022", "B2", "B3", "B4"]);
}

#[test]
fn resize_rebuilds_for_the_new_width() {
    let (books, assets) = five_books();
    let mut wall = wall();
    assert!(wall.rebuild(&books, &assets, Viewport::new(600.0, 900.0)));
    assert_eq!(wall.scroll_state().unwrap().columns().len(), 3);

    assert!(wall.rebuild(&books, &assets, Viewport::new(1000.0, 900.0)));
    let scroll = wall.scroll_state().unwrap();
    assert_eq!(scroll.columns().len(), 5);
    assert_eq!(scroll.offset(), 0.0);
    assert!(wall.is_running());
}

#[test]
fn shelf_without_any_cover_stays_still() {
    let (books, _) = five_books();
    let assets = vec![None; books.len()];
    let mut wall = wall();
    assert!(!wall.rebuild(&books, &assets, Viewport::new(600.0, 900.0)));
    assert!(!wall.is_running());
    assert!(wall.scroll_state().is_none());
}

#[test]
fn stopped_wall_keeps_its_columns() {
    let (books, assets) = five_books();
    let mut wall = wall();
    assert!(wall.rebuild(&books, &assets, Viewport::new(600.0, 900.0)));
    let start = Instant::now();
    wall.tick(start);
    wall.tick(start + Duration::from_millis(100));
    wall.stop_animation();

    let before = wall.scroll_state().unwrap().offset();
    let report = wall.tick(start + Duration::from_millis(200));
    assert!(!report.synthesized && !report.retired);
    assert_eq!(wall.scroll_state().unwrap().offset(), before);
    assert_eq!(wall.scroll_state().unwrap().columns().len(), 3);
}
