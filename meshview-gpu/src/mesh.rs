//! CPU-side packing of meshes, materials and lights into GPU layouts

use bytemuck::{Pod, Zeroable};
use meshview_core::{DirectionalLight, DrawView, LightRig, Material, Transform3D, TriangleMesh, ViewRect};
use nalgebra::{Matrix4, Vector3};

/// Converts OpenGL clip depth (-1..1) to wgpu clip depth (0..1)
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Vertex data for mesh rendering
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl MeshVertex {
    /// Vertex buffer layout descriptor
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // Position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // Normal
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                // UV
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 6]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

/// Per-view camera and light data, bind group 0
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GlobalsUniform {
    pub view_proj: [[f32; 4]; 4],
    pub light_view_proj: [[f32; 4]; 4],
    pub eye: [f32; 4],
    /// xyz points towards the sun, w is its intensity
    pub sun_direction: [f32; 4],
    /// w is 1 when the sun casts shadows
    pub sun_color: [f32; 4],
    /// w is the hemisphere light intensity
    pub sky_color: [f32; 4],
    pub ground_color: [f32; 4],
}

impl GlobalsUniform {
    /// Lighting only, with an identity camera. Used for the shadow pass.
    pub fn for_lights(lights: &LightRig) -> Self {
        let sun = &lights.sun;
        let direction = sun_direction(sun);
        let hemisphere = &lights.hemisphere;
        Self {
            view_proj: Matrix4::identity().into(),
            light_view_proj: light_view_projection(sun).into(),
            eye: [0.0, 0.0, 0.0, 1.0],
            sun_direction: [direction.x, direction.y, direction.z, sun.intensity],
            sun_color: [
                sun.color[0],
                sun.color[1],
                sun.color[2],
                if sun.cast_shadow { 1.0 } else { 0.0 },
            ],
            sky_color: [
                hemisphere.sky_color[0],
                hemisphere.sky_color[1],
                hemisphere.sky_color[2],
                hemisphere.intensity,
            ],
            ground_color: [
                hemisphere.ground_color[0],
                hemisphere.ground_color[1],
                hemisphere.ground_color[2],
                1.0,
            ],
        }
    }

    pub fn new(view: &DrawView, lights: &LightRig) -> Self {
        Self {
            view_proj: (OPENGL_TO_WGPU_MATRIX * view.view_proj).into(),
            eye: [view.eye.x, view.eye.y, view.eye.z, 1.0],
            ..Self::for_lights(lights)
        }
    }
}

/// Per-mesh transform and material, bind group 1
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct ModelUniform {
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    pub base_color: [f32; 4],
    /// x metalness, y roughness
    pub params: [f32; 4],
}

impl ModelUniform {
    pub fn new(world: &Transform3D, material: &Material) -> Self {
        let normal = world
            .matrix
            .try_inverse()
            .map(|inverse| inverse.transpose())
            .unwrap_or(world.matrix);
        Self {
            model: world.matrix.into(),
            normal: normal.into(),
            base_color: material.base_color,
            params: [material.metalness, material.roughness, 0.0, 0.0],
        }
    }
}

/// Interleave a mesh into vertices and a flat index list. Missing normals are
/// generated, missing UVs are zero.
pub fn mesh_vertices(mesh: &TriangleMesh) -> (Vec<MeshVertex>, Vec<u32>) {
    let generated;
    let mesh = if mesh.normals.is_none() {
        let mut owned = mesh.clone();
        owned.ensure_normals();
        generated = owned;
        &generated
    } else {
        mesh
    };

    let normals = mesh.normals.as_deref().unwrap_or(&[]);
    let uvs = mesh.uvs.as_deref().unwrap_or(&[]);
    let vertices = mesh
        .vertices
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let normal = normals.get(i).map_or([0.0, 1.0, 0.0], |n| [n.x, n.y, n.z]);
            MeshVertex {
                position: [p.x, p.y, p.z],
                normal,
                uv: uvs.get(i).copied().unwrap_or([0.0, 0.0]),
            }
        })
        .collect();

    let indices = mesh.faces.iter().flatten().copied().collect();
    (vertices, indices)
}

/// Unit vector from the sun's target towards the sun
pub fn sun_direction(sun: &DirectionalLight) -> Vector3<f32> {
    (sun.position - sun.target)
        .try_normalize(f32::EPSILON)
        .unwrap_or_else(Vector3::y)
}

/// Orthographic light-space projection of the sun's shadow box, in wgpu clip
/// space
pub fn light_view_projection(sun: &DirectionalLight) -> Matrix4<f32> {
    let direction = sun_direction(sun);
    let up = if direction.cross(&Vector3::y()).norm() > 1e-4 {
        Vector3::y()
    } else {
        Vector3::z()
    };
    let view = Matrix4::look_at_rh(&sun.position, &sun.target, &up);
    let shadow = &sun.shadow;
    let projection = Matrix4::new_orthographic(
        shadow.left,
        shadow.right,
        shadow.bottom,
        shadow.top,
        shadow.near,
        shadow.far,
    );
    OPENGL_TO_WGPU_MATRIX * projection * view
}

/// Clamp a viewport rectangle to the surface. `None` if nothing is left.
pub fn pixel_rect(rect: ViewRect, surface_width: u32, surface_height: u32) -> Option<(u32, u32, u32, u32)> {
    let x0 = rect.x.max(0.0).floor() as u32;
    let y0 = rect.y.max(0.0).floor() as u32;
    let x1 = ((rect.x + rect.width).max(0.0).floor() as u32).min(surface_width);
    let y1 = ((rect.y + rect.height).max(0.0).floor() as u32).min(surface_height);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((x0, y0, x1 - x0, y1 - y0))
}
