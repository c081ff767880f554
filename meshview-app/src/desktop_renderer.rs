//! The viewer's renderer on a real window: scene pass plus the egui overlay

use egui_wgpu::ScreenDescriptor;
use meshview_core::{DrawView, Scene};
use meshview_gpu::SceneRenderer;
use meshview_viewer::Renderer;

pub struct DesktopRenderer {
    scene: SceneRenderer,
    egui: egui_wgpu::Renderer,
    // Last tessellated UI, repainted on every frame until replaced
    primitives: Vec<egui::ClippedPrimitive>,
    pixels_per_point: f32,
    pending_free: Vec<egui::TextureId>,
}

impl DesktopRenderer {
    pub fn new(scene: SceneRenderer) -> Self {
        let egui = egui_wgpu::Renderer::new(&scene.gpu_context.device, scene.surface_format(), None, 1);
        Self {
            scene,
            egui,
            primitives: Vec::new(),
            pixels_per_point: 1.0,
            pending_free: Vec::new(),
        }
    }

    /// Replace the UI drawn on top of the scene
    pub fn set_overlay(
        &mut self,
        primitives: Vec<egui::ClippedPrimitive>,
        textures: egui::TexturesDelta,
        pixels_per_point: f32,
    ) {
        // Textures freed last frame are no longer referenced by anything drawn
        for id in self.pending_free.drain(..) {
            self.egui.free_texture(&id);
        }
        let context = &self.scene.gpu_context;
        for (id, delta) in &textures.set {
            self.egui.update_texture(&context.device, &context.queue, *id, delta);
        }
        self.pending_free = textures.free;
        self.primitives = primitives;
        self.pixels_per_point = pixels_per_point;
    }
}

impl Renderer for DesktopRenderer {
    fn upload(&mut self, key: u64, scene: &Scene) -> meshview_core::Result<()> {
        self.scene.upload(key, scene)
    }

    fn release(&mut self, key: u64) {
        self.scene.release(key);
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.scene.resize(width, height);
    }

    fn draw(&mut self, views: &[DrawView]) -> meshview_core::Result<()> {
        let (width, height) = self.scene.size();
        let screen = ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.pixels_per_point,
        };
        let egui = &mut self.egui;
        let primitives = &self.primitives;

        self.scene.render(
            views,
            Box::new(move |device, queue, encoder, view| {
                let buffers = egui.update_buffers(device, queue, encoder, primitives, &screen);
                {
                    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                        label: Some("Overlay Render Pass"),
                        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                            view,
                            resolve_target: None,
                            ops: wgpu::Operations {
                                load: wgpu::LoadOp::Load,
                                store: wgpu::StoreOp::Store,
                            },
                        })],
                        depth_stencil_attachment: None,
                        timestamp_writes: None,
                        occlusion_query_set: None,
                    });
                    egui.render(&mut render_pass, primitives, &screen);
                }
                buffers
            }),
        )
    }
}
