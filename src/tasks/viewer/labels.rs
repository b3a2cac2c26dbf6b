use std::collections::HashMap;

use fontdb::{Database, Family, Query};
use glyphon::cosmic_text::Align;
use glyphon::{
    Attrs, Buffer, Cache, Color, FamilyOwned, FontSystem, Metrics, Resolution, Shaping, SwashCache,
    TextArea, TextAtlas, TextBounds, TextRenderer, Viewport, Wrap,
};
use palette::{LinSrgba, Srgba};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

/// A year divider box on screen, in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearLabel {
    pub year: i32,
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// Year labels inside divider boxes plus a centred status line, via `glyphon`.
pub struct LabelRenderer {
    _cache: Cache,
    viewport: Viewport,
    atlas: TextAtlas,
    renderer: TextRenderer,
    font_system: FontSystem,
    swash_cache: SwashCache,
    family: FamilyOwned,
    years: HashMap<i32, Buffer>,
    year_box: (f32, f32),
    year_color: Color,
    status: Buffer,
    status_text: Option<String>,
    status_color: Color,
    status_top: f32,
}

impl LabelRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        font: Option<&str>,
        year_color: LinSrgba<f32>,
        status_color: LinSrgba<f32>,
    ) -> Self {
        let mut font_system = FontSystem::new();
        initialize_font_database(font_system.db_mut());
        let family = resolve_font_family(&font_system, font);
        let mut status = Buffer::new(&mut font_system, Metrics::new(32.0, 38.4));
        status.set_wrap(&mut font_system, Wrap::WordOrGlyph);

        let cache = Cache::new(device);
        let viewport = Viewport::new(device, &cache);
        let mut atlas = TextAtlas::new(device, queue, &cache, format);
        let renderer =
            TextRenderer::new(&mut atlas, device, wgpu::MultisampleState::default(), None);

        Self {
            _cache: cache,
            viewport,
            atlas,
            renderer,
            font_system,
            swash_cache: SwashCache::new(),
            family,
            years: HashMap::new(),
            year_box: (0.0, 0.0),
            year_color: to_text_color(year_color),
            status,
            status_text: None,
            status_color: to_text_color(status_color),
            status_top: 0.0,
        }
    }

    /// Sets the physical size of a divider box; cached year labels are
    /// reshaped on next use when it changes.
    pub fn set_year_box(&mut self, width: f32, height: f32) {
        if self.year_box != (width, height) {
            self.year_box = (width, height);
            self.years.clear();
        }
    }

    /// Shows `text` centred on screen, or hides the status line with `None`.
    pub fn set_status(&mut self, text: Option<&str>, size: PhysicalSize<u32>) {
        self.status_text = text.map(str::to_string);
        let Some(text) = text else {
            return;
        };
        if size.width == 0 || size.height == 0 {
            return;
        }
        let font_size = (size.width.min(size.height) as f32 * 0.045).clamp(18.0, 72.0);
        let metrics = Metrics::new(font_size, font_size * 1.2);
        self.status.set_metrics_and_size(
            &mut self.font_system,
            metrics,
            Some(size.width as f32 * 0.8),
            Some(size.height as f32),
        );
        let attrs = Attrs::new().family(self.family.as_family());
        self.status
            .set_text(&mut self.font_system, text, &attrs, Shaping::Advanced, None);
        apply_center_alignment(&mut self.status);
        self.status.shape_until_scroll(&mut self.font_system, false);

        let lines = self.status.layout_runs().count().max(1) as f32;
        self.status_top = ((size.height as f32 - lines * metrics.line_height) * 0.5).max(0.0);
    }

    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        size: PhysicalSize<u32>,
        labels: &[YearLabel],
    ) {
        self.viewport.update(
            queue,
            Resolution {
                width: size.width,
                height: size.height,
            },
        );

        let (box_width, box_height) = self.year_box;
        let font_size = (box_height * 0.45).max(8.0);
        let metrics = Metrics::new(font_size, font_size * 1.2);
        for label in labels {
            if !self.years.contains_key(&label.year) {
                let mut buffer = Buffer::new(&mut self.font_system, metrics);
                buffer.set_size(&mut self.font_system, Some(box_width), Some(box_height));
                let attrs = Attrs::new().family(self.family.as_family());
                buffer.set_text(
                    &mut self.font_system,
                    &label.year.to_string(),
                    &attrs,
                    Shaping::Advanced,
                    None,
                );
                apply_center_alignment(&mut buffer);
                buffer.shape_until_scroll(&mut self.font_system, false);
                self.years.insert(label.year, buffer);
            }
        }

        let screen = TextBounds {
            left: 0,
            top: 0,
            right: size.width as i32,
            bottom: size.height as i32,
        };
        let mut areas = Vec::with_capacity(labels.len() + 1);
        for label in labels {
            let Some(buffer) = self.years.get(&label.year) else {
                continue;
            };
            areas.push(TextArea {
                buffer,
                left: label.left,
                top: label.top + (label.height - metrics.line_height) * 0.5,
                scale: 1.0,
                bounds: TextBounds {
                    left: label.left.max(0.0) as i32,
                    top: label.top.max(0.0) as i32,
                    right: ((label.left + label.width) as i32).min(screen.right),
                    bottom: ((label.top + label.height) as i32).min(screen.bottom),
                },
                default_color: self.year_color,
                custom_glyphs: &[],
            });
        }
        if self.status_text.is_some() {
            areas.push(TextArea {
                buffer: &self.status,
                left: size.width as f32 * 0.1,
                top: self.status_top,
                scale: 1.0,
                bounds: screen,
                default_color: self.status_color,
                custom_glyphs: &[],
            });
        }

        if let Err(err) = self.renderer.prepare(
            device,
            queue,
            &mut self.font_system,
            &mut self.atlas,
            &self.viewport,
            areas,
            &mut self.swash_cache,
        ) {
            warn!(error = %err, "label prepare failed");
        }
    }

    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) {
        if let Err(err) = self.renderer.render(&self.atlas, &self.viewport, pass) {
            warn!(error = %err, "label draw failed");
        }
    }

    pub fn trim(&mut self) {
        self.atlas.trim();
    }
}

fn initialize_font_database(db: &mut Database) {
    db.load_system_fonts();
    debug!(faces = db.len(), "font database loaded");
}

fn resolve_font_family(font_system: &FontSystem, requested: Option<&str>) -> FamilyOwned {
    let db = font_system.db();
    if let Some(name) = requested.map(str::trim).filter(|name| !name.is_empty()) {
        if font_available(db, name) {
            return FamilyOwned::Name(name.into());
        }
        warn!(font = %name, "configured font not installed; using fallback");
    }

    if font_available(db, "DejaVu Sans") {
        FamilyOwned::Name("DejaVu Sans".into())
    } else {
        FamilyOwned::SansSerif
    }
}

fn font_available(db: &Database, name: &str) -> bool {
    let query = Query {
        families: &[Family::Name(name)],
        ..Default::default()
    };
    db.query(&query).is_some()
}

fn apply_center_alignment(buffer: &mut Buffer) {
    for line in &mut buffer.lines {
        line.set_align(Some(Align::Center));
    }
}

fn to_text_color(color: LinSrgba<f32>) -> Color {
    let srgb: Srgba<f32> = Srgba::from_linear(color);
    let srgb_u8: Srgba<u8> = srgb.into_format();
    Color::rgba(srgb_u8.red, srgb_u8.green, srgb_u8.blue, srgb_u8.alpha)
}
