use glam::{Mat4, Vec3};
use wgpu::util::DeviceExt;

use crate::config::Palette;
use crate::controller::{GameState, PhysicsWorld};
use crate::error::GameError;
use crate::model::{Entity, EntityKind};
use crate::ui::OverlayFrame;
use crate::view::gpu_init::GpuContext;
use crate::view::shader::{ShaderProgram, QUAD_POSITION_LOCATION, UNIFORM_BINDING};

/// Vertices per unit quad: two triangles
pub const QUAD_VERTEX_COUNT: u32 = 6;

/// The draw surface the scene talks to: one shader, one quad, two uniforms
pub trait Renderer {
    fn clear(&mut self);
    fn set_color(&mut self, rgb: Vec3);
    fn set_transform(&mut self, mvp: &Mat4);
    fn draw_arrays(&mut self, first: u32, count: u32);
    fn present(&mut self) -> Result<(), GameError>;
}

pub fn entity_color(palette: &Palette, kind: EntityKind) -> Vec3 {
    match kind {
        EntityKind::Ground => palette.ground,
        EntityKind::Platform => palette.platform,
        EntityKind::Player => palette.player,
    }
}

/// Draw ground, player and platforms, in that order, then present
pub fn render_scene<W: PhysicsWorld, R: Renderer>(
    state: &GameState<W>,
    palette: &Palette,
    renderer: &mut R,
) -> Result<(), GameError> {
    renderer.clear();
    for entity in state.layout.draw_order() {
        draw_entity(renderer, &state.proj_view, palette, entity);
    }
    renderer.present()
}

fn draw_entity<R: Renderer>(renderer: &mut R, proj_view: &Mat4, palette: &Palette, entity: &Entity) {
    renderer.set_color(entity_color(palette, entity.kind));
    let mvp = *proj_view * entity.model_matrix();
    renderer.set_transform(&mvp);
    renderer.draw_arrays(0, QUAD_VERTEX_COUNT);
}

#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
}

/// Unit quad centred on the origin
pub const UNIT_QUAD: [QuadVertex; 6] = [
    QuadVertex { position: [-0.5, -0.5] },
    QuadVertex { position: [-0.5, 0.5] },
    QuadVertex { position: [0.5, -0.5] },
    QuadVertex { position: [0.5, -0.5] },
    QuadVertex { position: [-0.5, 0.5] },
    QuadVertex { position: [0.5, 0.5] },
];

/// Mirrors `Uniforms` in the default shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct DrawUniform {
    pub mvp: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl Default for DrawUniform {
    fn default() -> Self {
        Self {
            mvp: Mat4::IDENTITY.to_cols_array_2d(),
            color: [1.0, 1.0, 1.0, 1.0],
        }
    }
}

const DRAW_UNIFORM_SIZE: u64 = std::mem::size_of::<DrawUniform>() as u64;

fn align_to(size: u64, alignment: u64) -> u64 {
    size.div_ceil(alignment) * alignment
}

struct QuadDraw {
    uniform: DrawUniform,
    first: u32,
    count: u32,
}

/// Uniform slots addressed with dynamic offsets, one per draw in a frame
struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    capacity: usize,
}

impl UniformRing {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, capacity: usize) -> Self {
        let alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = align_to(DRAW_UNIFORM_SIZE, alignment);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("draw_uniforms"),
            size: stride * capacity as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("draw_uniforms_bg"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: UNIFORM_BINDING,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(DRAW_UNIFORM_SIZE),
                }),
            }],
        });
        Self { buffer, bind_group, stride, capacity }
    }
}

pub struct PipelineResources {
    pub pipeline: wgpu::RenderPipeline,
    pub uniform_layout: wgpu::BindGroupLayout,
}

/// Build the single pipeline every entity is drawn with
pub fn create_quad_pipeline(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    program: &ShaderProgram,
) -> PipelineResources {
    let vertex_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("default.vert"),
        source: wgpu::ShaderSource::Wgsl(program.vertex_source.as_str().into()),
    });
    let fragment_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("default.frag"),
        source: wgpu::ShaderSource::Wgsl(program.fragment_source.as_str().into()),
    });

    let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("draw_uniforms_bgl"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: UNIFORM_BINDING,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: true,
                min_binding_size: wgpu::BufferSize::new(DRAW_UNIFORM_SIZE),
            },
            count: None,
        }],
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("quad_pipeline_layout"),
        bind_group_layouts: &[&uniform_layout],
        push_constant_ranges: &[],
    });

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("quad_pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some(&program.vertex_entry),
            buffers: &[wgpu::VertexBufferLayout {
                array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &[wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: QUAD_POSITION_LOCATION,
                    format: wgpu::VertexFormat::Float32x2,
                }],
            }],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some(&program.fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState { count: 1, mask: !0, alpha_to_coverage_enabled: false },
        multiview: None,
        cache: None,
    });

    PipelineResources { pipeline, uniform_layout }
}

/// [`Renderer`] on top of wgpu: draws are recorded, then encoded in one pass on `present`
pub struct WgpuRenderer {
    pub gpu: GpuContext,
    pipeline: wgpu::RenderPipeline,
    uniform_layout: wgpu::BindGroupLayout,
    uniforms: UniformRing,
    quad: wgpu::Buffer,
    clear_color: wgpu::Color,
    clear_requested: bool,
    current: DrawUniform,
    draws: Vec<QuadDraw>,
    egui_renderer: egui_wgpu::Renderer,
    overlay: Option<OverlayFrame>,
}

impl WgpuRenderer {
    pub fn new(gpu: GpuContext, program: &ShaderProgram, clear_color: [f64; 4]) -> Self {
        let device = gpu.device.as_ref();
        let PipelineResources { pipeline, uniform_layout } = create_quad_pipeline(device, gpu.format, program);
        let uniforms = UniformRing::new(device, &uniform_layout, 16);

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("unit_quad"),
            contents: bytemuck::cast_slice(&UNIT_QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let egui_renderer = egui_wgpu::Renderer::new(device, gpu.format, egui_wgpu::RendererOptions::default());

        let [r, g, b, a] = clear_color;
        Self {
            gpu,
            pipeline,
            uniform_layout,
            uniforms,
            quad,
            clear_color: wgpu::Color { r, g, b, a },
            clear_requested: false,
            current: DrawUniform::default(),
            draws: Vec::new(),
            egui_renderer,
            overlay: None,
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.gpu.resize(width, height);
    }

    /// Debug UI to composite over the next presented frame
    pub fn set_overlay(&mut self, overlay: OverlayFrame) {
        self.overlay = Some(overlay);
    }

    fn acquire_frame(&mut self) -> Result<Option<wgpu::SurfaceTexture>, GameError> {
        match self.gpu.surface.get_current_texture() {
            Ok(frame) => Ok(Some(frame)),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost, reconfiguring");
                self.gpu.surface.configure(&self.gpu.device, &self.gpu.config);
                Ok(Some(self.gpu.surface.get_current_texture()?))
            }
            Err(e) => {
                tracing::warn!(error = %e, "skipping frame");
                Ok(None)
            }
        }
    }

    fn ensure_uniform_capacity(&mut self, draws: usize) {
        if draws > self.uniforms.capacity {
            let capacity = draws.next_power_of_two();
            tracing::debug!(capacity, "growing draw uniform buffer");
            self.uniforms = UniformRing::new(&self.gpu.device, &self.uniform_layout, capacity);
        }
    }
}

impl Renderer for WgpuRenderer {
    fn clear(&mut self) {
        self.draws.clear();
        self.clear_requested = true;
    }

    fn set_color(&mut self, rgb: Vec3) {
        self.current.color = [rgb.x, rgb.y, rgb.z, 1.0];
    }

    fn set_transform(&mut self, mvp: &Mat4) {
        self.current.mvp = mvp.to_cols_array_2d();
    }

    fn draw_arrays(&mut self, first: u32, count: u32) {
        self.draws.push(QuadDraw { uniform: self.current, first, count });
    }

    fn present(&mut self) -> Result<(), GameError> {
        let draws = std::mem::take(&mut self.draws);
        let clear = std::mem::replace(&mut self.clear_requested, false);
        let overlay = self.overlay.take();

        let Some(frame) = self.acquire_frame()? else {
            return Ok(());
        };

        self.ensure_uniform_capacity(draws.len());
        for (i, draw) in draws.iter().enumerate() {
            self.gpu.queue.write_buffer(
                &self.uniforms.buffer,
                i as u64 * self.uniforms.stride,
                bytemuck::bytes_of(&draw.uniform),
            );
        }

        let view = frame.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self.gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("encoder"),
        });

        {
            let load = if clear { wgpu::LoadOp::Clear(self.clear_color) } else { wgpu::LoadOp::Load };
            let mut rp = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations { load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            rp.set_pipeline(&self.pipeline);
            rp.set_vertex_buffer(0, self.quad.slice(..));
            for (i, draw) in draws.iter().enumerate() {
                let offset = (i as u64 * self.uniforms.stride) as u32;
                rp.set_bind_group(0, &self.uniforms.bind_group, &[offset]);
                rp.draw(draw.first..draw.first + draw.count, 0..1);
            }
        }

        if let Some(overlay) = overlay {
            self.paint_overlay(&mut encoder, &view, overlay);
        }

        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

impl WgpuRenderer {
    fn paint_overlay(&mut self, encoder: &mut wgpu::CommandEncoder, view: &wgpu::TextureView, overlay: OverlayFrame) {
        let device = self.gpu.device.as_ref();
        let queue = self.gpu.queue.as_ref();
        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.gpu.config.width, self.gpu.config.height],
            pixels_per_point: overlay.pixels_per_point,
        };

        for (id, image_delta) in &overlay.textures_delta.set {
            self.egui_renderer.update_texture(device, queue, *id, image_delta);
        }
        self.egui_renderer
            .update_buffers(device, queue, encoder, &overlay.primitives, &screen_descriptor);

        {
            let egui_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("egui_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            self.egui_renderer
                .render(&mut egui_pass.forget_lifetime(), &overlay.primitives, &screen_descriptor);
        }

        for id in &overlay.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}
