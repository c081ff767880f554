//! GLTF and GLB support
//!
//! The document's default scene (or its first scene) becomes the returned
//! root. Node transforms, triangle primitives and metallic-roughness factors
//! are imported; animations, skins and cameras are ignored.

use crate::error::LoadError;
use crate::registry::AssetLoader;
use crate::texture::expand_to_rgba8;
use ::gltf::image::Format;
use ::gltf::mesh::Mode;
use meshview_core::{Material, Point3, SceneNode, Texture, Transform3D, TriangleMesh, Vector3};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::warn;

pub struct GltfLoader;

impl AssetLoader for GltfLoader {
    fn load(&self, path: &Path) -> Result<SceneNode, LoadError> {
        let (document, buffers, images) =
            ::gltf::import(path).map_err(|e| LoadError::mesh("GLTF", path, e))?;

        let scene = document
            .default_scene()
            .or_else(|| document.scenes().next())
            .ok_or_else(|| LoadError::mesh("GLTF", path, "document has no scenes"))?;

        let mut importer = Importer {
            buffers: &buffers,
            images: &images,
            textures: HashMap::new(),
        };

        let scene_name = scene
            .name()
            .map(str::to_string)
            .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
            .unwrap_or_else(|| "scene".to_string());

        // Flatten the node hierarchy in parent-first order
        let mut flat: Vec<(Option<usize>, SceneNode)> = vec![(None, SceneNode::group(scene_name))];
        let mut visited = HashSet::new();
        let mut stack: Vec<(::gltf::Node, usize)> = scene.nodes().map(|node| (node, 0)).collect();
        stack.reverse();

        while let Some((node, parent)) = stack.pop() {
            if !visited.insert(node.index()) {
                warn!("Node {} is referenced more than once; skipping repeat", node.index());
                continue;
            }
            let index = flat.len();
            flat.push((Some(parent), importer.node(&node)));
            let children: Vec<_> = node.children().collect();
            stack.extend(children.into_iter().rev().map(|child| (child, index)));
        }

        SceneNode::assemble(flat)
            .into_iter()
            .next()
            .ok_or_else(|| LoadError::mesh("GLTF", path, "scene is empty"))
    }

    fn format_name(&self) -> &'static str {
        "GLTF"
    }
}

struct Importer<'a> {
    buffers: &'a [::gltf::buffer::Data],
    images: &'a [::gltf::image::Data],
    textures: HashMap<usize, Option<Texture>>,
}

impl Importer<'_> {
    /// Convert one glTF node without its children
    fn node(&mut self, node: &::gltf::Node) -> SceneNode {
        let name = node
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("node{}", node.index()));
        let transform = Transform3D::from_columns(node.transform().matrix());

        let mut primitives: Vec<SceneNode> = match node.mesh() {
            Some(mesh) => mesh
                .primitives()
                .filter_map(|primitive| self.primitive(&primitive))
                .map(|(mesh, material)| SceneNode::mesh(name.clone(), mesh, material))
                .collect(),
            None => Vec::new(),
        };

        if primitives.len() == 1 {
            if let Some(single) = primitives.pop() {
                return single.with_transform(transform);
            }
        }

        let mut group = SceneNode::group(name).with_transform(transform);
        for primitive in primitives {
            group.add_child(primitive);
        }
        group
    }

    fn primitive(&mut self, primitive: &::gltf::Primitive) -> Option<(TriangleMesh, Material)> {
        if primitive.mode() != Mode::Triangles {
            warn!("Skipping primitive with unsupported mode {:?}", primitive.mode());
            return None;
        }

        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()].0[..]));
        let vertices: Vec<Point3<f32>> = reader
            .read_positions()?
            .map(|[x, y, z]| Point3::new(x, y, z))
            .collect();

        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };
        let faces = indices
            .chunks_exact(3)
            .map(|chunk| [chunk[0], chunk[1], chunk[2]])
            .collect();

        let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
        let dropped = mesh.retain_valid_faces();
        if dropped > 0 {
            warn!("Dropped {} triangles with out-of-range indices", dropped);
        }
        if let Some(normals) = reader.read_normals() {
            mesh.set_normals(normals.map(|[x, y, z]| Vector3::new(x, y, z)).collect());
        }
        if let Some(uvs) = reader.read_tex_coords(0) {
            mesh.set_uvs(uvs.into_f32().collect());
        }
        mesh.ensure_normals();

        Some((mesh, self.material(&primitive.material())))
    }

    fn material(&mut self, source: &::gltf::Material) -> Material {
        let pbr = source.pbr_metallic_roughness();
        let [r, g, b, a] = pbr.base_color_factor();

        let mut material = Material::new(source.name().unwrap_or("gltf")).with_color([r, g, b], a);
        material.metalness = pbr.metallic_factor();
        material.roughness = pbr.roughness_factor();
        material.texture = pbr
            .base_color_texture()
            .and_then(|info| self.texture(info.texture().source().index()));
        material
    }

    fn texture(&mut self, image_index: usize) -> Option<Texture> {
        let images = self.images;
        self.textures
            .entry(image_index)
            .or_insert_with(|| {
                let image = images.get(image_index)?;
                let channels = match image.format {
                    Format::R8 => 1,
                    Format::R8G8 => 2,
                    Format::R8G8B8 => 3,
                    Format::R8G8B8A8 => 4,
                    other => {
                        warn!("Skipping texture with unsupported pixel format {:?}", other);
                        return None;
                    }
                };
                expand_to_rgba8(image.width, image.height, channels, &image.pixels)
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    // Three VEC3 float positions forming one triangle
    fn triangle_buffer() -> Vec<u8> {
        [0.0f32, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]
            .iter()
            .flat_map(|value| value.to_le_bytes())
            .collect()
    }

    // Two nested nodes drawing the triangle stored in `buffer_uri`
    fn triangle_gltf(buffer_uri: &str) -> String {
        format!(
            r#"{{
  "asset": {{ "version": "2.0" }},
  "scene": 0,
  "scenes": [ {{ "name": "demo", "nodes": [0] }} ],
  "nodes": [
    {{ "name": "parent", "translation": [0, 2, 0], "children": [1] }},
    {{ "name": "leaf", "mesh": 0, "translation": [3, 0, 0] }}
  ],
  "meshes": [ {{ "primitives": [ {{ "attributes": {{ "POSITION": 0 }}, "material": 0 }} ] }} ],
  "materials": [ {{ "name": "paint", "pbrMetallicRoughness": {{ "baseColorFactor": [0.2, 0.4, 0.6, 1.0], "metallicFactor": 0.7, "roughnessFactor": 0.3 }} }} ],
  "buffers": [ {{ "byteLength": 36, "uri": "{buffer_uri}" }} ],
  "bufferViews": [ {{ "buffer": 0, "byteOffset": 0, "byteLength": 36 }} ],
  "accessors": [ {{ "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3", "min": [0, 0, 0], "max": [1, 1, 0] }} ]
}}"#
        )
    }

    #[test]
    fn test_gltf_hierarchy_and_material() {
        let stem = format!("meshview_triangle_{}", std::process::id());
        let path = std::env::temp_dir().join(format!("{}.gltf", stem));
        let buffer_path = path.with_extension("bin");
        fs::write(&buffer_path, triangle_buffer()).unwrap();
        fs::write(&path, triangle_gltf(&format!("{}.bin", stem))).unwrap();

        let root = GltfLoader.load(&path).unwrap();
        assert_eq!(root.name, "demo");
        assert_eq!(root.node_count(), 3);
        assert_eq!(root.triangle_count(), 1);

        let parent = &root.children[0];
        assert_eq!(parent.name, "parent");
        let leaf = &parent.children[0];
        let material = &leaf.material_slots()[0];
        assert_eq!(material.name, "paint");
        assert_relative_eq!(material.metalness, 0.7);
        assert_relative_eq!(material.roughness, 0.3);
        assert_relative_eq!(material.base_color[2], 0.6);

        // World box is the triangle offset by both translations
        let bounds = root.world_bounding_box();
        assert_relative_eq!(bounds.min.x, 3.0);
        assert_relative_eq!(bounds.min.y, 2.0);
        assert_relative_eq!(bounds.max.x, 4.0);

        let _ = fs::remove_file(path);
        let _ = fs::remove_file(buffer_path);
    }

    #[test]
    fn test_invalid_gltf_names_file() {
        let path = std::env::temp_dir().join(format!("meshview_invalid_{}.glb", std::process::id()));
        fs::write(&path, b"not a gltf").unwrap();

        let err = GltfLoader.load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Mesh { format: "GLTF", .. }));
        assert_eq!(err.path(), Some(path.as_path()));

        let _ = fs::remove_file(path);
    }
}
