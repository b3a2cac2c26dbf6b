use std::io::Write;
use std::time::Duration;

use shelf_wall::config::Configuration;

#[test]
fn parse_kebab_case_config() {
    let yaml = r#"
shelf:
  proxy-url: "https://shelf.example.net"
  user-id: "4622353"
  shelf: to-read
wall:
  column-width-px: 180
  max-frame-delta: 100ms
loader:
  request-timeout: 3s
"#;
    let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.shelf.user_id.as_deref(), Some("4622353"));
    assert_eq!(cfg.shelf.shelf, "to-read");
    assert!((cfg.wall.column_width_px - 180.0).abs() < f32::EPSILON);
    assert_eq!(cfg.wall.max_frame_delta, Duration::from_millis(100));
    assert_eq!(cfg.loader.request_timeout, Duration::from_secs(3));
    assert!(cfg.validated().is_ok());
}

#[test]
fn defaults_fill_every_section() {
    let cfg: Configuration = serde_yaml::from_str("shelf:\n  user-id: \"1\"\n").unwrap();
    assert_eq!(cfg.shelf.shelf, "read");
    assert_eq!(cfg.shelf.max_pages, 20);
    assert!((cfg.wall.max_cover_height_px - 320.0).abs() < f32::EPSILON);
    assert_eq!(cfg.wall.max_wrap_repeats, 3);
    assert_eq!(cfg.pools.column_limit, 64);
    assert_eq!(cfg.pools.cover_limit, 1000);
    assert_eq!(cfg.loader.max_concurrent_downloads, 6);
    assert!(!cfg.viewer.fullscreen);

    let metrics = cfg.wall_metrics();
    assert!((metrics.divider_extent() - 80.0).abs() < f32::EPSILON);
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
wall:
  column-width: 200
"#;
    assert!(serde_yaml::from_str::<Configuration>(yaml).is_err());
}

#[test]
fn missing_user_id_fails_validation() {
    let cfg: Configuration = serde_yaml::from_str("{}").unwrap();
    let err = cfg.validated().unwrap_err();
    assert!(format!("{err:#}").contains("user-id"));
}

#[test]
fn malformed_values_fail_validation() {
    for yaml in [
        "shelf:\n  user-id: \"12a\"\n",
        "shelf:\n  user-id: \"1\"\n  shelf: \"read books\"\n",
        "shelf:\n  user-id: \"1\"\n  proxy-url: \"not a url\"\n",
        "shelf:\n  user-id: \"1\"\nwall:\n  max-wrap-repeats: 0\n",
        "shelf:\n  user-id: \"1\"\ncolors:\n  background: \"blue-ish\"\n",
        "shelf:\n  user-id: \"1\"\nloader:\n  max-concurrent-downloads: 0\n",
    ] {
        let cfg: Configuration = serde_yaml::from_str(yaml).unwrap();
        assert!(cfg.validated().is_err(), "accepted {yaml}");
    }
}

#[test]
fn loads_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "shelf:\n  user-id: \"99\"\nviewer:\n  fullscreen: true\n  font: \"Inter\"\ncolors:\n  divider: \"#334155\""
    )
    .unwrap();

    let cfg = Configuration::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert!(cfg.viewer.fullscreen);
    assert_eq!(cfg.viewer.font.as_deref(), Some("Inter"));
    let palette = cfg.colors.resolve().unwrap();
    assert!(palette.divider.blue > palette.divider.red);
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert!(Configuration::from_yaml_file(dir.path().join("absent.yaml")).is_err());
}
