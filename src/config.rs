use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use palette::{LinSrgba, Srgb, Srgba};
use serde::Deserialize;
use shelf_model::{DEFAULT_SHELF, is_valid_slug, is_valid_user_id};

use crate::wall::{EngineSettings, PoolLimits, WallMetrics};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct Configuration {
    /// Which shelf to show and where the proxy lives.
    pub shelf: ShelfConfig,
    /// Wall layout and scroll speed.
    pub wall: WallConfig,
    /// Thresholds for the wall's resource pools.
    pub pools: PoolConfig,
    /// Cover download behaviour.
    pub loader: LoaderConfig,
    /// Window options.
    pub viewer: ViewerConfig,
    pub colors: ColorConfig,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        self.shelf.validate().context("invalid shelf configuration")?;
        self.wall.validate().context("invalid wall configuration")?;
        self.pools.validate().context("invalid pools configuration")?;
        self.loader
            .validate()
            .context("invalid loader configuration")?;
        self.colors
            .resolve()
            .context("invalid colors configuration")?;
        Ok(self)
    }

    pub fn wall_metrics(&self) -> WallMetrics {
        WallMetrics {
            column_width: self.wall.column_width_px,
            max_cover_height: self.wall.max_cover_height_px,
            divider_height: self.wall.divider_height_px,
            divider_margin: self.wall.divider_margin_px,
            max_wrap_repeats: self.wall.max_wrap_repeats,
        }
    }

    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            speed_px_per_second: self.wall.speed_px_per_second,
            max_frame_delta: self.wall.max_frame_delta,
        }
    }

    pub fn pool_limits(&self) -> PoolLimits {
        PoolLimits {
            columns: self.pools.column_limit,
            covers: self.pools.cover_limit,
            geometry: self.pools.geometry_limit,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            shelf: ShelfConfig::default(),
            wall: WallConfig::default(),
            pools: PoolConfig::default(),
            loader: LoaderConfig::default(),
            viewer: ViewerConfig::default(),
            colors: ColorConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ShelfConfig {
    /// Base URL of the shelf proxy; `/api/goodreads` is appended.
    pub proxy_url: String,
    /// Numeric Goodreads user id. May be supplied with `--user-id` instead.
    pub user_id: Option<String>,
    pub shelf: String,
    /// Feed key for private profiles.
    pub key: Option<String>,
    /// Upper bound on pages requested from the proxy.
    pub max_pages: u32,
}

impl ShelfConfig {
    fn validate(&self) -> Result<()> {
        let proxy_url = self.proxy_url.trim();
        ensure!(!proxy_url.is_empty(), "shelf.proxy-url must not be empty");
        reqwest::Url::parse(proxy_url)
            .with_context(|| format!("shelf.proxy-url is not a valid URL: {proxy_url}"))?;
        let user_id = self
            .user_id
            .as_deref()
            .context("shelf.user-id is required (or pass --user-id)")?;
        ensure!(
            is_valid_user_id(user_id),
            "shelf.user-id must be numeric, got {user_id:?}"
        );
        ensure!(
            is_valid_slug(&self.shelf),
            "shelf.shelf may only contain letters, digits, '-' and '_'"
        );
        if let Some(key) = self.key.as_deref() {
            ensure!(is_valid_slug(key), "shelf.key is malformed");
        }
        ensure!(self.max_pages > 0, "shelf.max-pages must be greater than zero");
        Ok(())
    }
}

impl Default for ShelfConfig {
    fn default() -> Self {
        Self {
            proxy_url: "http://127.0.0.1:8787".to_string(),
            user_id: None,
            shelf: DEFAULT_SHELF.to_string(),
            key: None,
            max_pages: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct WallConfig {
    pub column_width_px: f32,
    pub max_cover_height_px: f32,
    pub divider_height_px: f32,
    pub divider_margin_px: f32,
    pub speed_px_per_second: f32,
    /// Full passes over the shelf a single column may make before giving up.
    pub max_wrap_repeats: u32,
    /// Frame gaps longer than this (suspend, occluded window) are clamped.
    #[serde(with = "humantime_serde")]
    pub max_frame_delta: Duration,
}

impl WallConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.column_width_px > 0.0,
            "wall.column-width-px must be positive"
        );
        ensure!(
            self.max_cover_height_px > 0.0,
            "wall.max-cover-height-px must be positive"
        );
        ensure!(
            self.divider_height_px >= 0.0 && self.divider_margin_px >= 0.0,
            "wall.divider-height-px and wall.divider-margin-px must not be negative"
        );
        ensure!(
            self.speed_px_per_second >= 0.0,
            "wall.speed-px-per-second must not be negative"
        );
        ensure!(
            self.max_wrap_repeats >= 1,
            "wall.max-wrap-repeats must be >= 1"
        );
        ensure!(
            self.max_frame_delta > Duration::ZERO,
            "wall.max-frame-delta must be positive"
        );
        let max_step = self.speed_px_per_second * self.max_frame_delta.as_secs_f32();
        ensure!(
            max_step < self.column_width_px,
            "wall.speed-px-per-second × wall.max-frame-delta ({max_step}px) must stay below one column width"
        );
        Ok(())
    }
}

impl Default for WallConfig {
    fn default() -> Self {
        Self {
            column_width_px: 200.0,
            max_cover_height_px: 320.0,
            divider_height_px: 60.0,
            divider_margin_px: 20.0,
            speed_px_per_second: 40.0,
            max_wrap_repeats: 3,
            max_frame_delta: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct PoolConfig {
    pub column_limit: usize,
    pub cover_limit: usize,
    pub geometry_limit: usize,
}

impl PoolConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.column_limit > 0 && self.cover_limit > 0 && self.geometry_limit > 0,
            "pool limits must be greater than zero"
        );
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        let limits = PoolLimits::default();
        Self {
            column_limit: limits.columns,
            cover_limit: limits.covers,
            geometry_limit: limits.geometry,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct LoaderConfig {
    pub max_concurrent_downloads: usize,
    /// Applies to each proxy request and each cover download.
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl LoaderConfig {
    fn validate(&self) -> Result<()> {
        ensure!(
            self.max_concurrent_downloads > 0,
            "loader.max-concurrent-downloads must be greater than zero"
        );
        ensure!(
            self.request_timeout > Duration::ZERO,
            "loader.request-timeout must be positive"
        );
        Ok(())
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 6,
            request_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ViewerConfig {
    pub fullscreen: bool,
    pub hide_cursor: bool,
    /// Font family for year labels and status text; falls back to a sans-serif.
    pub font: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct ColorConfig {
    pub background: String,
    pub divider: String,
    pub divider_text: String,
    pub status_text: String,
}

/// Resolved, linear-light colours.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallPalette {
    pub background: LinSrgba<f32>,
    pub divider: LinSrgba<f32>,
    pub divider_text: LinSrgba<f32>,
    pub status_text: LinSrgba<f32>,
}

impl ColorConfig {
    pub fn resolve(&self) -> Result<WallPalette> {
        Ok(WallPalette {
            background: parse_color("colors.background", &self.background)?,
            divider: parse_color("colors.divider", &self.divider)?,
            divider_text: parse_color("colors.divider-text", &self.divider_text)?,
            status_text: parse_color("colors.status-text", &self.status_text)?,
        })
    }
}

impl Default for ColorConfig {
    fn default() -> Self {
        Self {
            background: "#111827".to_string(),
            divider: "#1F2937".to_string(),
            divider_text: "#F8FAFC".to_string(),
            status_text: "#CBD5E1".to_string(),
        }
    }
}

fn parse_color(field: &str, value: &str) -> Result<LinSrgba<f32>> {
    parse_hex_color(value).with_context(|| format!("{field} is not a hex colour: {value:?}"))
}

/// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA` into linear RGBA.
pub fn parse_hex_color(input: &str) -> Option<LinSrgba<f32>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(rgba) = Srgba::<u8>::from_str(trimmed) {
        let rgba_f32: Srgba<f32> = rgba.into_format();
        return Some(rgba_f32.into_linear());
    }

    let rgb = Srgb::<u8>::from_str(trimmed).ok()?;
    let rgba = Srgba::new(rgb.red, rgb.green, rgb.blue, 255);
    let rgba_f32: Srgba<f32> = rgba.into_format();
    Some(rgba_f32.into_linear())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_colours_parse_with_and_without_alpha() {
        let opaque = parse_hex_color("#FFFFFF").unwrap();
        assert!((opaque.alpha - 1.0).abs() < f32::EPSILON);
        let translucent = parse_hex_color("#00000080").unwrap();
        assert!((translucent.alpha - 128.0 / 255.0).abs() < 1e-3);
        assert!(parse_hex_color("teal-ish").is_none());
        assert!(parse_hex_color("").is_none());
    }

    #[test]
    fn step_per_frame_must_stay_below_a_column() {
        let wall = WallConfig {
            speed_px_per_second: 1000.0,
            max_frame_delta: Duration::from_secs(1),
            ..WallConfig::default()
        };
        assert!(wall.validate().is_err());
        assert!(WallConfig::default().validate().is_ok());
    }
}
