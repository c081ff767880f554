//! Scene renderer: uploaded sessions drawn into viewport rectangles of one
//! surface

use crate::device::GpuContext;
use crate::mesh::{mesh_vertices, pixel_rect, GlobalsUniform, MeshVertex, ModelUniform};
use crate::shaders::SCENE_SHADER;
use meshview_core::{DrawView, Error, LightRig, Result, Scene, Texture, Transform3D, ViewerConfig};
use std::collections::HashMap;
use tracing::{debug, info};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADOW_MAP_SIZE: u32 = 2048;

/// Rendering configuration
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub background_color: [f64; 4],
    pub enable_multisampling: bool,
}

impl RenderConfig {
    pub fn from_viewer(config: &ViewerConfig) -> Self {
        Self {
            background_color: config.background_color,
            enable_multisampling: config.multisampling,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self::from_viewer(&ViewerConfig::default())
    }
}

struct UploadedMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,
    bind_group: wgpu::BindGroup,
}

/// GPU half of a scene session
struct UploadedScene {
    lights: LightRig,
    meshes: Vec<UploadedMesh>,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    shadow_bind_group: wgpu::BindGroup,
}

/// Extra work recorded after the scene pass, e.g. a UI overlay. Returns
/// command buffers to submit ahead of the frame's encoder.
pub type Overlay<'a> =
    dyn FnOnce(&wgpu::Device, &wgpu::Queue, &mut wgpu::CommandEncoder, &wgpu::TextureView) -> Vec<wgpu::CommandBuffer> + 'a;

pub struct SceneRenderer {
    pub gpu_context: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    config: RenderConfig,
    sample_count: u32,
    scene_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    globals_layout: wgpu::BindGroupLayout,
    model_layout: wgpu::BindGroupLayout,
    shadow_layout: wgpu::BindGroupLayout,
    texture_sampler: wgpu::Sampler,
    shadow_sampler: wgpu::Sampler,
    white_texture: wgpu::TextureView,
    msaa_view: Option<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
    scenes: HashMap<u64, UploadedScene>,
}

impl SceneRenderer {
    pub fn new(
        gpu_context: GpuContext,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
        config: RenderConfig,
    ) -> Result<Self> {
        let surface_caps = surface.get_capabilities(&gpu_context.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface reports no formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu_context.device, &surface_config);

        let wanted = if config.enable_multisampling { 4 } else { 1 };
        let sample_count = gpu_context.supported_sample_count(surface_format, wanted);
        info!(
            "Surface {:?} {}x{}, {}x MSAA",
            surface_format, surface_config.width, surface_config.height, sample_count
        );

        let uniform_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let globals_layout = gpu_context.create_bind_group_layout("globals_bind_group_layout", &[uniform_entry(0)]);
        let model_layout = gpu_context.create_bind_group_layout(
            "model_bind_group_layout",
            &[
                uniform_entry(0),
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        );
        let shadow_layout = gpu_context.create_bind_group_layout(
            "shadow_bind_group_layout",
            &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Depth,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        );

        let shader = gpu_context.create_shader_module("Scene Shader", SCENE_SHADER);
        let scene_pipeline = Self::create_scene_pipeline(
            &gpu_context.device,
            &[&globals_layout, &model_layout, &shadow_layout],
            &shader,
            surface_format,
            sample_count,
        );
        let shadow_pipeline =
            Self::create_shadow_pipeline(&gpu_context.device, &[&globals_layout, &model_layout], &shader);

        let texture_sampler = gpu_context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Texture Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let shadow_sampler = gpu_context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });

        let white_texture = Self::upload_rgba8(&gpu_context, "White Texture", 1, 1, &[255, 255, 255, 255]);

        let (msaa_view, depth_view) = Self::create_targets(&gpu_context, &surface_config, sample_count);

        Ok(Self {
            gpu_context,
            surface,
            surface_config,
            config,
            sample_count,
            scene_pipeline,
            shadow_pipeline,
            globals_layout,
            model_layout,
            shadow_layout,
            texture_sampler,
            shadow_sampler,
            white_texture,
            msaa_view,
            depth_view,
            scenes: HashMap::new(),
        })
    }

    fn create_scene_pipeline(
        device: &wgpu::Device,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        shader: &wgpu::ShaderModule,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
    ) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Render Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Render Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[MeshVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        })
    }

    fn create_shadow_pipeline(
        device: &wgpu::Device,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        shader: &wgpu::ShaderModule,
    ) -> wgpu::RenderPipeline {
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Shadow Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Shadow Pipeline"),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_shadow",
                buffers: &[MeshVertex::desc()],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: None,
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState {
                    constant: 2,
                    slope_scale: 2.0,
                    clamp: 0.0,
                },
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }

    fn create_targets(
        gpu_context: &GpuContext,
        surface_config: &wgpu::SurfaceConfiguration,
        sample_count: u32,
    ) -> (Option<wgpu::TextureView>, wgpu::TextureView) {
        let (width, height) = (surface_config.width, surface_config.height);
        let msaa_view = (sample_count > 1).then(|| {
            gpu_context
                .create_texture_2d(
                    "MSAA Texture",
                    width,
                    height,
                    surface_config.format,
                    sample_count,
                    wgpu::TextureUsages::RENDER_ATTACHMENT,
                )
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        let depth_view = gpu_context
            .create_texture_2d(
                "Depth Texture",
                width,
                height,
                DEPTH_FORMAT,
                sample_count,
                wgpu::TextureUsages::RENDER_ATTACHMENT,
            )
            .create_view(&wgpu::TextureViewDescriptor::default());
        (msaa_view, depth_view)
    }

    fn upload_rgba8(gpu_context: &GpuContext, label: &str, width: u32, height: u32, pixels: &[u8]) -> wgpu::TextureView {
        let texture = gpu_context.create_texture_2d(
            label,
            width,
            height,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            1,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        );
        gpu_context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_texture(&self, texture: &Texture) -> wgpu::TextureView {
        Self::upload_rgba8(&self.gpu_context, "Material Texture", texture.width, texture.height, texture.pixels())
    }

    pub fn surface_format(&self) -> wgpu::TextureFormat {
        self.surface_config.format
    }

    pub fn size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Resize renderer surface
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.gpu_context.device, &self.surface_config);
        let (msaa_view, depth_view) = Self::create_targets(&self.gpu_context, &self.surface_config, self.sample_count);
        self.msaa_view = msaa_view;
        self.depth_view = depth_view;
    }

    /// Upload `scene` under `key`, replacing what was there, and render its
    /// shadow map. The object and lights are static, so this happens once.
    pub fn upload(&mut self, key: u64, scene: &Scene) -> Result<()> {
        self.release(key);

        let globals = GlobalsUniform::for_lights(&scene.lights);
        let globals_buffer = self.gpu_context.create_buffer_init(
            "Globals Buffer",
            &[globals],
            wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        );
        let globals_bind_group = self.gpu_context.create_bind_group(
            "globals_bind_group",
            &self.globals_layout,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        );

        let mut textures: HashMap<u64, wgpu::TextureView> = HashMap::new();
        let mut meshes = Vec::new();
        for item in scene.root.world_meshes(Transform3D::identity()) {
            if item.mesh.is_empty() {
                continue;
            }
            let (vertices, indices) = mesh_vertices(item.mesh);
            let uniform = ModelUniform::new(&item.world, item.material);
            let model_buffer = self
                .gpu_context
                .create_buffer_init("Model Buffer", &[uniform], wgpu::BufferUsages::UNIFORM);

            let texture_view = match &item.material.texture {
                Some(texture) => &*textures
                    .entry(texture.id())
                    .or_insert_with(|| self.create_texture(texture)),
                None => &self.white_texture,
            };

            let bind_group = self.gpu_context.create_bind_group(
                "model_bind_group",
                &self.model_layout,
                &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: model_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(texture_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.texture_sampler),
                    },
                ],
            );

            meshes.push(UploadedMesh {
                vertex_buffer: self
                    .gpu_context
                    .create_buffer_init("Mesh Vertex Buffer", &vertices, wgpu::BufferUsages::VERTEX),
                index_buffer: self
                    .gpu_context
                    .create_buffer_init("Mesh Index Buffer", &indices, wgpu::BufferUsages::INDEX),
                index_count: indices.len() as u32,
                bind_group,
            });
        }

        let shadow_view = self
            .gpu_context
            .create_texture_2d(
                "Shadow Map",
                SHADOW_MAP_SIZE,
                SHADOW_MAP_SIZE,
                DEPTH_FORMAT,
                1,
                wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            )
            .create_view(&wgpu::TextureViewDescriptor::default());
        self.render_shadow_map(&shadow_view, &globals_bind_group, &meshes, scene.lights.sun.cast_shadow);

        let shadow_bind_group = self.gpu_context.create_bind_group(
            "shadow_bind_group",
            &self.shadow_layout,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&shadow_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.shadow_sampler),
                },
            ],
        );

        debug!("Uploaded scene {:#x}: {} meshes, {} textures", key, meshes.len(), textures.len());
        self.scenes.insert(
            key,
            UploadedScene {
                lights: scene.lights,
                meshes,
                globals_buffer,
                globals_bind_group,
                shadow_bind_group,
            },
        );
        Ok(())
    }

    fn render_shadow_map(
        &self,
        shadow_view: &wgpu::TextureView,
        globals_bind_group: &wgpu::BindGroup,
        meshes: &[UploadedMesh],
        cast_shadow: bool,
    ) {
        let mut encoder = self
            .gpu_context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Shadow Encoder"),
            });
        {
            // Cleared to 1.0 even with shadows off so the map reads as lit
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Shadow Pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: shadow_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if cast_shadow {
                render_pass.set_pipeline(&self.shadow_pipeline);
                render_pass.set_bind_group(0, globals_bind_group, &[]);
                for mesh in meshes {
                    render_pass.set_bind_group(1, &mesh.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }
        self.gpu_context.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Drop a scene's GPU resources
    pub fn release(&mut self, key: u64) {
        if self.scenes.remove(&key).is_some() {
            debug!("Released scene {:#x}", key);
        }
    }

    /// Draw every view, then let `overlay` record on top before presenting
    pub fn render(&mut self, views: &[DrawView], overlay: Box<Overlay<'_>>) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.gpu_context.device, &self.surface_config);
                return Err(Error::Gpu("Surface lost; reconfigured".to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        for draw in views {
            if let Some(scene) = self.scenes.get(&draw.key) {
                self.gpu_context.queue.write_buffer(
                    &scene.globals_buffer,
                    0,
                    bytemuck::bytes_of(&GlobalsUniform::new(draw, &scene.lights)),
                );
            }
        }

        let mut encoder = self
            .gpu_context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Scene Render Encoder"),
            });

        let (color_attachment, resolve_target) = match &self.msaa_view {
            Some(msaa_view) => (msaa_view, Some(&view)),
            None => (&view, None),
        };
        let (width, height) = self.size();

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: color_attachment,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: self.config.background_color[0],
                            g: self.config.background_color[1],
                            b: self.config.background_color[2],
                            a: self.config.background_color[3],
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            render_pass.set_pipeline(&self.scene_pipeline);
            for draw in views {
                let Some(scene) = self.scenes.get(&draw.key) else {
                    continue;
                };
                let Some((x, y, w, h)) = pixel_rect(draw.rect, width, height) else {
                    continue;
                };
                render_pass.set_viewport(x as f32, y as f32, w as f32, h as f32, 0.0, 1.0);
                render_pass.set_scissor_rect(x, y, w, h);
                render_pass.set_bind_group(0, &scene.globals_bind_group, &[]);
                render_pass.set_bind_group(2, &scene.shadow_bind_group, &[]);
                for mesh in &scene.meshes {
                    render_pass.set_bind_group(1, &mesh.bind_group, &[]);
                    render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                    render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                    render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
                }
            }
        }

        let extra = overlay(&self.gpu_context.device, &self.gpu_context.queue, &mut encoder, &view);
        self.gpu_context
            .queue
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        output.present();

        Ok(())
    }
}
