//! OBJ format support with its companion MTL material library
//!
//! The material library is always read first, from the file sharing the
//! OBJ's directory and stem. A model whose MTL cannot be read is rejected.

use crate::error::LoadError;
use crate::format::material_path_for;
use crate::registry::AssetLoader;
use crate::texture::load_texture;
use ::obj::{IndexTuple, Mtl, ObjData, ObjMaterial};
use meshview_core::{Material, Point3, SceneNode, Texture, TriangleMesh};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub struct ObjMtlLoader;

impl AssetLoader for ObjMtlLoader {
    fn load(&self, path: &Path) -> Result<SceneNode, LoadError> {
        let materials = read_materials(&material_path_for(path))?;
        read_obj(path, &materials)
    }

    fn format_name(&self) -> &'static str {
        "OBJ"
    }
}

/// Materials of one MTL library keyed by name, textures already decoded
pub type MaterialLibrary = HashMap<String, Material>;

/// Read an MTL library and preload every `map_Kd` it references.
///
/// Texture paths are resolved against the library's directory. A texture that
/// fails to decode leaves its material untextured.
pub fn read_materials(mtl_path: &Path) -> Result<MaterialLibrary, LoadError> {
    let material_error = |reason: String| LoadError::Material {
        path: mtl_path.to_path_buf(),
        reason,
    };

    let file = File::open(mtl_path).map_err(|e| material_error(e.to_string()))?;
    let mut mtl = Mtl::new(mtl_path.to_string_lossy().into_owned());
    mtl.reload(BufReader::new(file))
        .map_err(|e| material_error(e.to_string()))?;

    let base_dir = mtl_path.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut textures: HashMap<PathBuf, Option<Texture>> = HashMap::new();
    let mut library = MaterialLibrary::new();

    for source in &mtl.materials {
        let rgb = source.kd.unwrap_or([0.8, 0.8, 0.8]);
        let alpha = source.d.unwrap_or(1.0);
        let mut material = Material::new(source.name.clone()).with_color(rgb, alpha);
        if let Some(ns) = source.ns {
            // Phong exponent to an approximate roughness
            material.roughness = (2.0 / (ns + 2.0)).sqrt().clamp(0.0, 1.0);
        }

        if let Some(map) = &source.map_kd {
            let texture_path = base_dir.join(map);
            material.texture = textures
                .entry(texture_path.clone())
                .or_insert_with(|| match load_texture(&texture_path) {
                    Ok(texture) => Some(texture),
                    Err(err) => {
                        warn!("Skipping texture for material {}: {}", source.name, err);
                        None
                    }
                })
                .clone();
        }

        library.insert(source.name.clone(), material);
    }

    debug!(
        "Read {} materials from {}",
        library.len(),
        mtl_path.display()
    );
    Ok(library)
}

/// Read the OBJ geometry, one mesh node per group
pub fn read_obj(path: &Path, materials: &MaterialLibrary) -> Result<SceneNode, LoadError> {
    let file = File::open(path).map_err(|e| LoadError::mesh("OBJ", path, e))?;
    let data = ObjData::load_buf(BufReader::new(file)).map_err(|e| LoadError::mesh("OBJ", path, e))?;

    let name = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "obj".to_string());
    let mut root = SceneNode::group(name);

    for object in &data.objects {
        for group in &object.groups {
            let mut mesh = build_group_mesh(&data, &group.polys);
            if mesh.is_empty() {
                continue;
            }
            mesh.ensure_normals();

            let material = match &group.material {
                Some(ObjMaterial::Ref(name)) => materials.get(name).cloned().unwrap_or_else(|| {
                    warn!("Material {} is not defined in the MTL library", name);
                    Material::new(name.clone())
                }),
                Some(ObjMaterial::Mtl(source)) => materials
                    .get(&source.name)
                    .cloned()
                    .unwrap_or_else(|| Material::new(source.name.clone())),
                None => Material::default(),
            };

            let node_name = if group.name.is_empty() || group.name == "default" {
                object.name.clone()
            } else {
                format!("{}/{}", object.name, group.name)
            };
            root.add_child(SceneNode::mesh(node_name, mesh, material));
        }
    }

    if root.children.is_empty() {
        return Err(LoadError::mesh("OBJ", path, "file contains no faces"));
    }
    Ok(root)
}

/// Weld the corners of one group into an indexed mesh.
///
/// Polygons are fan triangulated. Corners referencing missing positions are
/// dropped with their polygon.
fn build_group_mesh(data: &ObjData, polys: &[::obj::SimplePolygon]) -> TriangleMesh {
    let mut corners: HashMap<(usize, Option<usize>, Option<usize>), u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut uvs = Vec::new();
    let mut normals = Vec::new();
    let mut faces = Vec::new();

    let has_uvs = polys
        .iter()
        .flat_map(|poly| poly.0.iter())
        .all(|IndexTuple(_, t, _)| t.map_or(false, |t| t < data.texture.len()));
    let has_normals = polys
        .iter()
        .flat_map(|poly| poly.0.iter())
        .all(|IndexTuple(_, _, n)| n.map_or(false, |n| n < data.normal.len()));

    for poly in polys {
        if poly.0.len() < 3 || poly.0.iter().any(|corner| corner.0 >= data.position.len()) {
            continue;
        }

        let mut indices = Vec::with_capacity(poly.0.len());
        for &IndexTuple(p, t, n) in &poly.0 {
            let key = (p, t.filter(|_| has_uvs), n.filter(|_| has_normals));
            let index = *corners.entry(key).or_insert_with(|| {
                let [x, y, z] = data.position[p];
                vertices.push(Point3::new(x, y, z));
                if let Some(t) = key.1 {
                    let [u, v] = data.texture[t];
                    // Image rows run top to bottom
                    uvs.push([u, 1.0 - v]);
                }
                if let Some(n) = key.2 {
                    let [x, y, z] = data.normal[n];
                    normals.push(nalgebra::Vector3::new(x, y, z));
                }
                (vertices.len() - 1) as u32
            });
            indices.push(index);
        }

        for i in 1..indices.len() - 1 {
            faces.push([indices[0], indices[i], indices[i + 1]]);
        }
    }

    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
    if has_uvs {
        mesh.set_uvs(uvs);
    }
    if has_normals {
        mesh.set_normals(normals);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::fs;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("meshview_obj_{}_{}", name, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const QUAD_OBJ: &str = "mtllib quad.mtl\n\
        o quad\n\
        v 0 0 0\n\
        v 1 0 0\n\
        v 1 1 0\n\
        v 0 1 0\n\
        vt 0 0\n\
        vt 1 0\n\
        vt 1 1\n\
        vt 0 1\n\
        usemtl red\n\
        f 1/1 2/2 3/3 4/4\n";

    const QUAD_MTL: &str = "newmtl red\nKd 1.0 0.0 0.0\nd 0.5\n";

    #[test]
    fn test_obj_with_mtl_loads_colored_quad() {
        let dir = temp_dir("quad");
        let obj_path = dir.join("quad.obj");
        fs::write(&obj_path, QUAD_OBJ).unwrap();
        fs::write(dir.join("quad.mtl"), QUAD_MTL).unwrap();

        let root = ObjMtlLoader.load(&obj_path).unwrap();
        assert_eq!(root.triangle_count(), 2);
        assert_eq!(root.children.len(), 1);

        let material = &root.children[0].material_slots()[0];
        assert_eq!(material.name, "red");
        assert_relative_eq!(material.base_color[0], 1.0);
        assert_relative_eq!(material.base_color[3], 0.5);

        if let meshview_core::NodeKind::Mesh { mesh, .. } = &root.children[0].kind {
            assert_eq!(mesh.vertex_count(), 4);
            assert!(mesh.normals.is_some());
            let uvs = mesh.uvs.as_ref().unwrap();
            assert_relative_eq!(uvs[0][1], 1.0);
        } else {
            panic!("expected a mesh node");
        }

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_mtl_aborts_with_mtl_path() {
        let dir = temp_dir("missing_mtl");
        let obj_path = dir.join("mesh.obj");
        fs::write(&obj_path, QUAD_OBJ).unwrap();

        let err = ObjMtlLoader.load(&obj_path).unwrap_err();
        assert!(matches!(err, LoadError::Material { .. }));
        assert_eq!(err.path(), Some(dir.join("mesh.mtl").as_path()));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_broken_obj_names_obj_path() {
        let dir = temp_dir("broken_obj");
        let obj_path = dir.join("broken.obj");
        fs::write(&obj_path, "v 0 0 0\nf 1 2 3\n").unwrap();
        fs::write(dir.join("broken.mtl"), QUAD_MTL).unwrap();

        let err = ObjMtlLoader.load(&obj_path).unwrap_err();
        assert!(matches!(err, LoadError::Mesh { .. }));
        assert_eq!(err.path(), Some(obj_path.as_path()));

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_missing_texture_is_skipped() {
        let dir = temp_dir("missing_texture");
        let mtl_path = dir.join("wood.mtl");
        fs::write(&mtl_path, "newmtl wood\nKd 0.5 0.4 0.3\nmap_Kd wood.png\n").unwrap();

        let library = read_materials(&mtl_path).unwrap();
        let material = &library["wood"];
        assert!(material.texture.is_none());
        assert_relative_eq!(material.base_color[1], 0.4);

        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn test_groups_become_separate_nodes() {
        let dir = temp_dir("groups");
        let obj_path = dir.join("two.obj");
        fs::write(
            &obj_path,
            "mtllib two.mtl\nv 0 0 0\nv 1 0 0\nv 0 1 0\nv 0 0 1\n\
             g left\nusemtl a\nf 1 2 3\n\
             g right\nusemtl b\nf 1 3 4\n",
        )
        .unwrap();
        fs::write(dir.join("two.mtl"), "newmtl a\nKd 1 0 0\nnewmtl b\nKd 0 0 1\n").unwrap();

        let root = ObjMtlLoader.load(&obj_path).unwrap();
        assert_eq!(root.children.len(), 2);
        let names: Vec<_> = root
            .children
            .iter()
            .map(|child| child.material_slots()[0].name.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        let _ = fs::remove_dir_all(dir);
    }
}
