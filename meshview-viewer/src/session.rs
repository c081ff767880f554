//! Scene sessions: one loaded object with its camera, controls and lights

use crate::camera::PerspectiveCamera;
use crate::controls::OrbitControls;
use crate::framing::{frame, Framing};
use crate::viewport::ViewportId;
use meshview_core::{DrawView, LightRig, Scene, SceneNode, Texture, ViewRect, ViewerConfig};

/// What the status overlay shows for a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionStatus {
    pub file_name: String,
    pub triangle_count: usize,
    pub node_count: usize,
    /// File name of the texture overlay, if one was applied
    pub texture: Option<String>,
}

#[derive(Debug)]
pub struct SceneSession {
    pub camera: PerspectiveCamera,
    pub controls: OrbitControls,
    pub scene: Scene,
    pub viewport: ViewportId,
    pub framing: Framing,
    pub status: SessionStatus,
}

impl SceneSession {
    /// Build a session around a freshly loaded object and frame it.
    ///
    /// Every material in the object is made non-metallic, since the fixed
    /// light rig has no environment for metals to reflect.
    pub fn attach(
        mut object: SceneNode,
        viewport: ViewportId,
        rect: ViewRect,
        config: &ViewerConfig,
        file_name: &str,
    ) -> Self {
        let mut camera = PerspectiveCamera::from_config(&config.camera, rect.aspect());
        let mut controls = OrbitControls::new(&config.controls, config.camera.initial_target);

        let lights = if config.shadows {
            LightRig::default()
        } else {
            LightRig::default().without_shadows()
        };

        fix_materials(&mut object);
        let status = SessionStatus {
            file_name: file_name.to_string(),
            triangle_count: object.triangle_count(),
            node_count: object.node_count(),
            texture: None,
        };

        let mut scene = Scene::new(lights);
        scene.add(object);

        let framing = frame(
            &scene.bounding_box(),
            &mut camera,
            &mut controls,
            config.camera.framing_margin,
        );

        tracing::info!(
            "Attached {} to {} ({} triangles)",
            status.file_name,
            viewport,
            status.triangle_count
        );

        Self {
            camera,
            controls,
            scene,
            viewport,
            framing,
            status,
        }
    }

    /// Advance controls by `dt` seconds
    pub fn advance(&mut self, dt: f32) -> bool {
        self.controls.update(&mut self.camera, dt)
    }

    /// Follow a viewport resize
    pub fn resize(&mut self, rect: ViewRect) {
        self.camera.set_aspect(rect.aspect());
    }

    /// Put `texture` on every material slot of the loaded object
    pub fn apply_texture(&mut self, texture: &Texture, file_name: &str) {
        self.scene.apply_texture(texture);
        self.status.texture = Some(file_name.to_string());
    }

    pub fn draw_view(&self, key: u64, rect: ViewRect) -> DrawView {
        DrawView {
            key,
            rect,
            view_proj: self.camera.view_projection(),
            eye: self.camera.position,
        }
    }
}

/// Zero the metalness of every material slot in the subtree
pub fn fix_materials(object: &mut SceneNode) {
    object.for_each_material_mut(|material| material.metalness = 0.0);
}
