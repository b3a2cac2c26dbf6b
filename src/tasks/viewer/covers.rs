use std::collections::HashMap;
use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

use crate::events::{CoverImage, VisualAsset};

/// Frames a cover texture may go unused before it is released.
const TEXTURE_IDLE_FRAMES: u64 = 600;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct QuadInstance {
    /// x, y, width, height in physical pixels.
    rect: [f32; 4],
    tint: [f32; 4],
}

impl QuadInstance {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x4, 1 => Float32x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadInstance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct ScreenUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

struct CoverTexture {
    // Holds the allocation the key's address refers to.
    _asset: VisualAsset,
    _texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    last_used: u64,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuadSource {
    Solid,
    Cover(usize),
}

/// Draws cover images and solid divider boxes as instanced textured quads.
/// Each cover gets its own texture; solid boxes sample a 1×1 white texture.
pub struct CoverRenderer {
    pipeline: wgpu::RenderPipeline,
    screen_buffer: wgpu::Buffer,
    screen_bind_group: wgpu::BindGroup,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    _solid_texture: wgpu::Texture,
    solid: wgpu::BindGroup,
    textures: HashMap<usize, CoverTexture>,
    instance_buffer: Option<wgpu::Buffer>,
    instance_capacity: usize,
    instances: Vec<QuadInstance>,
    sources: Vec<QuadSource>,
    batches: Vec<(QuadSource, Range<u32>)>,
    frame: u64,
    max_texture_side: u32,
}

impl CoverRenderer {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, format: wgpu::TextureFormat) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("wall-covers-shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("covers.wgsl").into()),
        });

        let screen_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("wall-covers-screen-bgl"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("wall-covers-texture-bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("wall-covers-pipeline-layout"),
            bind_group_layouts: &[&screen_layout, &texture_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("wall-covers-pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs"),
                buffers: &[QuadInstance::layout()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let screen_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("wall-covers-screen"),
            contents: bytemuck::bytes_of(&ScreenUniform {
                size: [1.0, 1.0],
                _pad: [0.0; 2],
            }),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let screen_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("wall-covers-screen-bind-group"),
            layout: &screen_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: screen_buffer.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("wall-covers-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let white = CoverImage::new(1, 1, vec![255; 4]);
        let (solid_texture, solid) =
            upload(device, queue, &texture_layout, &sampler, &white, "wall-solid");

        Self {
            pipeline,
            screen_buffer,
            screen_bind_group,
            texture_layout,
            sampler,
            _solid_texture: solid_texture,
            solid,
            textures: HashMap::new(),
            instance_buffer: None,
            instance_capacity: 0,
            instances: Vec::new(),
            sources: Vec::new(),
            batches: Vec::new(),
            frame: 0,
            max_texture_side: device.limits().max_texture_dimension_2d,
        }
    }

    /// Starts a new frame's quad list.
    pub fn begin(&mut self) {
        self.frame += 1;
        self.instances.clear();
        self.sources.clear();
    }

    pub fn push_solid(&mut self, rect: [f32; 4], tint: [f32; 4]) {
        self.instances.push(QuadInstance { rect, tint });
        self.sources.push(QuadSource::Solid);
    }

    pub fn push_cover(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        asset: &VisualAsset,
        rect: [f32; 4],
    ) {
        let key = Arc::as_ptr(asset) as usize;
        if !self.textures.contains_key(&key) {
            if !self.uploadable(asset) {
                return;
            }
            let (texture, bind_group) = upload(
                device,
                queue,
                &self.texture_layout,
                &self.sampler,
                asset,
                "wall-cover",
            );
            self.textures.insert(
                key,
                CoverTexture {
                    _asset: Arc::clone(asset),
                    _texture: texture,
                    bind_group,
                    last_used: self.frame,
                },
            );
        }
        if let Some(entry) = self.textures.get_mut(&key) {
            entry.last_used = self.frame;
        }
        self.instances.push(QuadInstance {
            rect,
            tint: [1.0; 4],
        });
        self.sources.push(QuadSource::Cover(key));
    }

    /// Uploads this frame's quads; call after all pushes and before `draw`.
    pub fn prepare(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, width: u32, height: u32) {
        queue.write_buffer(
            &self.screen_buffer,
            0,
            bytemuck::bytes_of(&ScreenUniform {
                size: [width.max(1) as f32, height.max(1) as f32],
                _pad: [0.0; 2],
            }),
        );

        self.batches.clear();
        for (index, source) in self.sources.iter().enumerate() {
            let index = index as u32;
            match self.batches.last_mut() {
                Some((last, range)) if *last == *source => range.end = index + 1,
                _ => self.batches.push((*source, index..index + 1)),
            }
        }

        if self.instances.is_empty() {
            return;
        }
        if self.instances.len() > self.instance_capacity {
            let capacity = self.instances.len().next_power_of_two();
            self.instance_buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("wall-covers-instances"),
                size: (capacity * std::mem::size_of::<QuadInstance>()) as wgpu::BufferAddress,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
            self.instance_capacity = capacity;
        }
        if let Some(buffer) = &self.instance_buffer {
            queue.write_buffer(buffer, 0, bytemuck::cast_slice(&self.instances));
        }
    }

    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        let Some(buffer) = &self.instance_buffer else {
            return;
        };
        if self.instances.is_empty() {
            return;
        }
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.screen_bind_group, &[]);
        pass.set_vertex_buffer(0, buffer.slice(..));
        for (source, range) in &self.batches {
            let bind_group = match source {
                QuadSource::Solid => &self.solid,
                QuadSource::Cover(key) => match self.textures.get(key) {
                    Some(entry) => &entry.bind_group,
                    None => continue,
                },
            };
            pass.set_bind_group(1, bind_group, &[]);
            pass.draw(0..6, range.clone());
        }
    }

    /// Releases textures no frame has used for a while.
    pub fn trim(&mut self) {
        let frame = self.frame;
        let before = self.textures.len();
        self.textures
            .retain(|_, entry| frame.saturating_sub(entry.last_used) <= TEXTURE_IDLE_FRAMES);
        let released = before - self.textures.len();
        if released > 0 {
            debug!(released, live = self.textures.len(), "cover textures released");
        }
    }

    /// Drops every cover texture, e.g. when a new shelf replaces the old one.
    pub fn clear(&mut self) {
        self.textures.clear();
    }

    fn uploadable(&self, asset: &CoverImage) -> bool {
        let expected = asset.width as usize * asset.height as usize * 4;
        if asset.width == 0 || asset.height == 0 || asset.pixels.len() != expected {
            return false;
        }
        if asset.width > self.max_texture_side || asset.height > self.max_texture_side {
            warn!(
                width = asset.width,
                height = asset.height,
                "cover exceeds the GPU texture limit; skipping"
            );
            return false;
        }
        true
    }
}

fn upload(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    layout: &wgpu::BindGroupLayout,
    sampler: &wgpu::Sampler,
    image: &CoverImage,
    label: &str,
) -> (wgpu::Texture, wgpu::BindGroup) {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some(label),
        layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: wgpu::BindingResource::Sampler(sampler),
            },
        ],
    });
    (texture, bind_group)
}

/// Fits a cover inside a column slot, keeping its aspect ratio and centring
/// it horizontally. Returns logical `[x, y, width, height]`.
pub fn fit_cover(slot: [f32; 4], image_width: u32, image_height: u32) -> [f32; 4] {
    let [x, y, width, height] = slot;
    if image_width == 0 || image_height == 0 {
        return [x, y, 0.0, 0.0];
    }
    let (iw, ih) = (image_width as f32, image_height as f32);
    let drawn_height = (width * ih / iw).min(height);
    let drawn_width = (drawn_height * iw / ih).min(width);
    [x + (width - drawn_width) * 0.5, y, drawn_width, drawn_height]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncapped_covers_fill_the_slot() {
        let rect = fit_cover([10.0, 20.0, 200.0, 300.0], 400, 600);
        assert_eq!(rect, [10.0, 20.0, 200.0, 300.0]);
    }

    #[test]
    fn capped_covers_are_narrowed_and_centred() {
        let rect = fit_cover([0.0, 0.0, 200.0, 320.0], 100, 400);
        assert_eq!(rect, [60.0, 0.0, 80.0, 320.0]);
    }
}
