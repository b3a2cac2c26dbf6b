mod covers;
mod labels;
mod layout;

pub use covers::fit_cover;
pub use layout::{WallQuad, layout_wall, to_physical};

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use covers::CoverRenderer;
use labels::{LabelRenderer, YearLabel};
use palette::LinSrgba;
use tokio::sync::mpsc::Receiver;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use wgpu::{self, SurfaceError};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Fullscreen, Window, WindowAttributes},
};

use crate::config::{Configuration, WallPalette};
use crate::events::{LibraryUpdate, ShelfLoaded};
use crate::wall::{CoverWall, Viewport};

const EMPTY_WALL_MESSAGE: &str = "No books found";

#[derive(Debug)]
enum ViewerEvent {
    Cancelled,
    Library(LibraryUpdate),
}

struct GpuState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: wgpu::Device,
    queue: wgpu::Queue,
    covers: CoverRenderer,
    labels: LabelRenderer,
}

struct ViewerApp {
    cfg: Configuration,
    palette: WallPalette,
    cancel: CancellationToken,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    wall: CoverWall,
    shelf: Option<ShelfLoaded>,
    status: Option<String>,
    pending_redraw: bool,
}

impl ViewerApp {
    fn new(cfg: Configuration, palette: WallPalette, cancel: CancellationToken) -> Self {
        let wall = CoverWall::from_config(&cfg);
        Self {
            cfg,
            palette,
            cancel,
            window: None,
            gpu: None,
            wall,
            shelf: None,
            status: Some("Starting…".to_string()),
            pending_redraw: false,
        }
    }

    fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Option<Arc<Window>> {
        if let Some(window) = self.window.as_ref() {
            return Some(window.clone());
        }

        let mut attrs = WindowAttributes::default().with_title("Shelf Wall");
        if self.cfg.viewer.fullscreen {
            attrs = attrs.with_fullscreen(Some(Fullscreen::Borderless(None)));
        }
        match event_loop.create_window(attrs) {
            Ok(window) => {
                if self.cfg.viewer.hide_cursor {
                    window.set_cursor_visible(false);
                }
                let window = Arc::new(window);
                self.window = Some(window.clone());
                Some(window)
            }
            Err(err) => {
                error!(error = %err, "failed to create viewer window");
                None
            }
        }
    }

    fn init_gpu(&mut self, window: Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface = instance
            .create_surface(window.clone())
            .context("failed to create surface")?;
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to acquire GPU adapter")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|fmt| fmt.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("surface reports no texture formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("wall-device"),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::default(),
            ..Default::default()
        }))
        .context("failed to acquire GPU device")?;

        let size = window.inner_size();
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        info!(
            width = config.width,
            height = config.height,
            format = ?config.format,
            "viewer surface configured",
        );

        let covers = CoverRenderer::new(&device, &queue, format);
        let labels = LabelRenderer::new(
            &device,
            &queue,
            format,
            self.cfg.viewer.font.as_deref(),
            self.palette.divider_text,
            self.palette.status_text,
        );

        self.gpu = Some(GpuState {
            surface,
            config,
            device,
            queue,
            covers,
            labels,
        });
        self.refresh_status();
        self.rebuild_wall();
        Ok(())
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        if !self.reconfigure_surface(new_size) {
            return;
        }
        let resized = self
            .logical_viewport()
            .is_some_and(|viewport| self.wall.needs_rebuild(viewport));
        if resized {
            self.rebuild_wall();
        }
        self.refresh_status();
        self.request_redraw();
    }

    /// Reapplies the surface configuration; the wall keeps scrolling.
    fn reconfigure_surface(&mut self, new_size: PhysicalSize<u32>) -> bool {
        let Some(gpu) = self.gpu.as_mut() else {
            return false;
        };
        gpu.config.width = new_size.width.max(1);
        gpu.config.height = new_size.height.max(1);
        gpu.surface.configure(&gpu.device, &gpu.config);
        debug!(
            width = gpu.config.width,
            height = gpu.config.height,
            "viewer surface configured",
        );
        true
    }

    /// The wall is laid out in logical pixels so covers keep their size
    /// across displays.
    fn logical_viewport(&self) -> Option<Viewport> {
        let window = self.window.as_ref()?;
        let logical = window
            .inner_size()
            .to_logical::<f32>(window.scale_factor());
        Some(Viewport::new(logical.width, logical.height))
    }

    fn rebuild_wall(&mut self) {
        let Some(shelf) = self.shelf.as_ref() else {
            return;
        };
        let Some(viewport) = self.logical_viewport() else {
            return;
        };
        if viewport.is_empty() {
            self.wall.stop_animation();
            return;
        }
        let running = self.wall.rebuild(&shelf.books, &shelf.assets, viewport);
        debug!(pools = ?self.wall.pool_stats(), "wall pools after rebuild");
        self.status = if running {
            None
        } else {
            Some(EMPTY_WALL_MESSAGE.to_string())
        };
        self.refresh_status();
        self.request_redraw();
    }

    fn refresh_status(&mut self) {
        if let Some(gpu) = self.gpu.as_mut() {
            let size = PhysicalSize::new(gpu.config.width, gpu.config.height);
            gpu.labels.set_status(self.status.as_deref(), size);
        }
    }

    fn set_status(&mut self, status: Option<String>) {
        self.status = status;
        self.refresh_status();
        self.request_redraw();
    }

    fn handle_library(&mut self, update: LibraryUpdate) {
        match update {
            LibraryUpdate::Progress(event) => {
                if self.shelf.is_none() {
                    self.set_status(Some(event.status_line()));
                }
            }
            LibraryUpdate::Ready(shelf) => {
                info!(books = shelf.books.len(), "viewer received shelf");
                self.wall.invalidate_sequence();
                if let Some(gpu) = self.gpu.as_mut() {
                    gpu.covers.clear();
                }
                self.shelf = Some(shelf);
                self.rebuild_wall();
            }
            LibraryUpdate::Failed(message) => {
                self.set_status(Some(message));
            }
        }
    }

    fn draw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.clone() else {
            return;
        };
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };

        let frame = match gpu.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(SurfaceError::Outdated) | Err(SurfaceError::Lost) => {
                info!("viewer surface lost; reconfiguring");
                self.reconfigure_surface(window.inner_size());
                self.request_redraw();
                return;
            }
            Err(SurfaceError::OutOfMemory) => {
                error!("viewer surface out of memory; exiting event loop");
                event_loop.exit();
                return;
            }
            Err(SurfaceError::Timeout) => {
                warn!("viewer surface acquisition timed out");
                return;
            }
            Err(SurfaceError::Other) => {
                warn!("viewer surface reported an unknown error; retrying");
                self.reconfigure_surface(window.inner_size());
                self.request_redraw();
                return;
            }
        };

        self.wall.tick(Instant::now());

        let scale = window.scale_factor() as f32;
        let metrics = *self.wall.metrics();
        let divider_tint = tint(self.palette.divider);
        let mut year_labels = Vec::new();
        gpu.covers.begin();
        gpu.labels.set_year_box(
            metrics.column_width * scale,
            metrics.divider_height * scale,
        );
        if let Some(scroll) = self.wall.scroll_state() {
            for quad in layout_wall(scroll, &metrics) {
                match quad {
                    WallQuad::Divider { rect, year } => {
                        let [left, top, width, height] = to_physical(rect, scale);
                        gpu.covers.push_solid([left, top, width, height], divider_tint);
                        year_labels.push(YearLabel {
                            year,
                            left,
                            top,
                            width,
                            height,
                        });
                    }
                    WallQuad::Cover { rect, asset } => {
                        gpu.covers.push_cover(
                            &gpu.device,
                            &gpu.queue,
                            &asset,
                            to_physical(rect, scale),
                        );
                    }
                }
            }
        }

        let size = PhysicalSize::new(gpu.config.width, gpu.config.height);
        gpu.covers
            .prepare(&gpu.device, &gpu.queue, size.width, size.height);
        gpu.labels
            .prepare(&gpu.device, &gpu.queue, size, &year_labels);

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("wall-encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("wall-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(to_wgpu_color(self.palette.background)),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                multiview_mask: None,
                occlusion_query_set: None,
            });
            gpu.covers.draw(&mut pass);
            gpu.labels.render(&mut pass);
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        gpu.covers.trim();
        gpu.labels.trim();

        self.pending_redraw = self.wall.is_running();
    }

    fn request_redraw(&mut self) {
        self.pending_redraw = true;
        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.cancel.is_cancelled() {
            event_loop.exit();
            return;
        }

        let Some(window) = self.ensure_window(event_loop) else {
            event_loop.exit();
            return;
        };

        if self.gpu.is_none() {
            if let Err(err) = self.init_gpu(window) {
                error!(error = ?err, "failed to initialize GPU state");
                event_loop.exit();
                return;
            }
        }

        self.request_redraw();
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        if window.id() != window_id {
            return;
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("viewer window close requested");
                self.wall.stop_animation();
                self.cancel.cancel();
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                self.handle_resize(new_size);
            }
            WindowEvent::ScaleFactorChanged {
                mut inner_size_writer,
                ..
            } => {
                let size = window.inner_size();
                let _ = inner_size_writer.request_inner_size(size);
                self.handle_resize(size);
            }
            WindowEvent::RedrawRequested => {
                self.draw(event_loop);
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if self.pending_redraw {
            if let Some(window) = self.window.as_ref() {
                window.request_redraw();
            }
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Cancelled => {
                info!("viewer received cancellation event");
                self.wall.stop_animation();
                event_loop.exit();
            }
            ViewerEvent::Library(update) => self.handle_library(update),
        }
    }
}

/// Runs the wall window on the calling thread until it is closed or `cancel`
/// fires. Library updates arrive on `updates`.
pub fn run_windowed(
    mut updates: Receiver<LibraryUpdate>,
    cancel: CancellationToken,
    cfg: Configuration,
) -> Result<()> {
    let palette = cfg.colors.resolve()?;
    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("failed to build viewer event loop")?;

    let cancel_task = {
        let cancel = cancel.clone();
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            cancel.cancelled().await;
            let _ = proxy.send_event(ViewerEvent::Cancelled);
        })
    };
    let forward_task = {
        let proxy = event_loop.create_proxy();
        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                if proxy.send_event(ViewerEvent::Library(update)).is_err() {
                    break;
                }
            }
        })
    };

    let mut app = ViewerApp::new(cfg, palette, cancel);
    let run_result = event_loop.run_app(&mut app);
    cancel_task.abort();
    forward_task.abort();

    run_result.context("viewer event loop failed")
}

fn tint(color: LinSrgba<f32>) -> [f32; 4] {
    [color.red, color.green, color.blue, color.alpha]
}

fn to_wgpu_color(color: LinSrgba<f32>) -> wgpu::Color {
    wgpu::Color {
        r: color.red as f64,
        g: color.green as f64,
        b: color.blue as f64,
        a: color.alpha as f64,
    }
}
