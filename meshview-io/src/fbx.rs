//! Binary FBX 7.x support
//!
//! Reads `Geometry`, `Model` and `Material` objects from the node tree and
//! wires them together through the `Connections` section. Only the first UV
//! layer and the diffuse color of each material are imported.

use crate::error::LoadError;
use crate::registry::AssetLoader;
use fbxcel::low::v7400::AttributeValue;
use fbxcel::tree::any::AnyTree;
use fbxcel::tree::v7400::NodeHandle;
use meshview_core::{Material, Point3, SceneNode, Transform3D, TriangleMesh, UnitQuaternion, Vector3};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, warn};

pub struct FbxLoader;

impl AssetLoader for FbxLoader {
    fn load(&self, path: &Path) -> Result<SceneNode, LoadError> {
        let file = File::open(path).map_err(|e| LoadError::mesh("FBX", path, e))?;
        let tree = AnyTree::from_seekable_reader(BufReader::new(file))
            .map_err(|e| LoadError::mesh("FBX", path, e))?;

        let tree = match tree {
            AnyTree::V7400(version, tree, _footer) => {
                debug!("FBX version {:?}", version);
                tree
            }
            _ => return Err(LoadError::mesh("FBX", path, "unsupported FBX version")),
        };

        let objects = FbxObjects::read(tree.root());
        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "fbx".to_string());
        let root = objects.into_scene(name);
        if root.triangle_count() == 0 {
            return Err(LoadError::mesh("FBX", path, "file contains no mesh geometry"));
        }
        Ok(root)
    }

    fn format_name(&self) -> &'static str {
        "FBX"
    }
}

#[derive(Debug)]
struct ModelInfo {
    name: String,
    transform: Transform3D,
}

/// The object graph of one FBX document
#[derive(Debug, Default)]
struct FbxObjects {
    models: HashMap<i64, ModelInfo>,
    /// Model ids in document order
    model_order: Vec<i64>,
    geometries: HashMap<i64, TriangleMesh>,
    materials: HashMap<i64, Material>,
    /// `(child, parent)` object-object links
    links: Vec<(i64, i64)>,
}

impl FbxObjects {
    fn read(root: NodeHandle<'_>) -> Self {
        let mut objects = Self::default();

        for section in root.children_by_name("Objects") {
            for node in section.children() {
                let Some(id) = node.attributes().first().and_then(as_i64) else {
                    continue;
                };
                match node.name() {
                    "Geometry" => match read_geometry(&node) {
                        Some(mesh) => {
                            objects.geometries.insert(id, mesh);
                        }
                        None => warn!("Skipping FBX geometry {} without polygons", id),
                    },
                    "Model" => {
                        objects.models.insert(
                            id,
                            ModelInfo {
                                name: object_name(&node),
                                transform: read_local_transform(&node),
                            },
                        );
                        objects.model_order.push(id);
                    }
                    "Material" => {
                        objects.materials.insert(id, read_material(&node));
                    }
                    _ => {}
                }
            }
        }

        for section in root.children_by_name("Connections") {
            for link in section.children_by_name("C") {
                let attrs = link.attributes();
                if let (Some(child), Some(parent)) =
                    (attrs.get(1).and_then(as_i64), attrs.get(2).and_then(as_i64))
                {
                    objects.links.push((child, parent));
                }
            }
        }
        objects
    }

    fn into_scene(mut self, name: String) -> SceneNode {
        let mut child_models: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut model_geometry: HashMap<i64, Vec<i64>> = HashMap::new();
        let mut model_material: HashMap<i64, i64> = HashMap::new();
        let mut parented = HashSet::new();

        for &(child, parent) in &self.links {
            if self.models.contains_key(&child) && self.models.contains_key(&parent) {
                child_models.entry(parent).or_default().push(child);
                parented.insert(child);
            } else if self.geometries.contains_key(&child) && self.models.contains_key(&parent) {
                model_geometry.entry(parent).or_default().push(child);
            } else if self.materials.contains_key(&child) && self.models.contains_key(&parent) {
                model_material.entry(parent).or_insert(child);
            }
        }

        // Parent-first flattening starting at the models hanging off the root
        let mut flat: Vec<(Option<usize>, SceneNode)> = vec![(None, SceneNode::group(name))];
        let mut visited = HashSet::new();
        let mut stack: Vec<(i64, usize)> = self
            .model_order
            .iter()
            .rev()
            .filter(|id| !parented.contains(*id))
            .map(|&id| (id, 0))
            .collect();

        while let Some((id, parent)) = stack.pop() {
            if !visited.insert(id) {
                continue;
            }
            let Some(model) = self.models.remove(&id) else {
                continue;
            };
            let index = flat.len();
            flat.push((
                Some(parent),
                SceneNode::group(model.name.clone()).with_transform(model.transform),
            ));

            let material = model_material
                .get(&id)
                .and_then(|material_id| self.materials.get(material_id))
                .cloned()
                .unwrap_or_default();
            for geometry_id in model_geometry.get(&id).into_iter().flatten() {
                if let Some(mesh) = self.geometries.get(geometry_id) {
                    flat.push((
                        Some(index),
                        SceneNode::mesh(model.name.clone(), mesh.clone(), material.clone()),
                    ));
                }
            }

            if let Some(children) = child_models.get(&id) {
                stack.extend(children.iter().rev().map(|&child| (child, index)));
            }
        }

        SceneNode::assemble(flat)
            .into_iter()
            .next()
            .unwrap_or_else(|| SceneNode::group("fbx"))
    }
}

/// `"Name\0\x01Class"` object names keep only the part before the separator
fn object_name(node: &NodeHandle<'_>) -> String {
    node.attributes()
        .get(1)
        .and_then(as_str)
        .map(|raw| raw.split('\0').next().unwrap_or(raw).to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| "model".to_string())
}

fn read_geometry(node: &NodeHandle<'_>) -> Option<TriangleMesh> {
    let positions = child_f64_array(node, "Vertices")?;
    let polygon_indices = child_i32_array(node, "PolygonVertexIndex")?;
    let control_points: Vec<Point3<f32>> = positions
        .chunks_exact(3)
        .map(|p| Point3::new(p[0] as f32, p[1] as f32, p[2] as f32))
        .collect();

    let uv_layer = node
        .children_by_name("LayerElementUV")
        .next()
        .and_then(|layer| read_uv_layer(&layer));

    let mut corners: HashMap<(usize, Option<usize>), u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut uvs = Vec::new();
    let mut faces = Vec::new();

    for polygon in polygons(&polygon_indices, control_points.len()) {
        let mut ring = Vec::with_capacity(polygon.len());
        for (corner_index, point) in polygon {
            let uv = uv_layer
                .as_ref()
                .and_then(|layer| layer.uv_for(point, corner_index));
            let key = (point, uv.map(|(index, _)| index));
            let vertex = *corners.entry(key).or_insert_with(|| {
                vertices.push(control_points[point]);
                if let Some((_, [u, v])) = uv {
                    uvs.push([u, 1.0 - v]);
                }
                (vertices.len() - 1) as u32
            });
            ring.push(vertex);
        }
        for i in 1..ring.len().saturating_sub(1) {
            faces.push([ring[0], ring[i], ring[i + 1]]);
        }
    }

    if faces.is_empty() {
        return None;
    }

    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
    mesh.set_uvs(uvs);
    mesh.ensure_normals();
    Some(mesh)
}

/// Split `PolygonVertexIndex` into polygons of `(corner, control point)` pairs.
///
/// A negative index closes its polygon and stores the last corner as `!index`.
/// A polygon touching a control point out of range is dropped whole.
fn polygons(indices: &[i32], point_count: usize) -> Vec<Vec<(usize, usize)>> {
    let mut polygons = Vec::new();
    let mut current = Vec::new();
    let mut broken = false;

    for (corner, &raw) in indices.iter().enumerate() {
        let (point, closes) = if raw < 0 { (!raw, true) } else { (raw, false) };
        match usize::try_from(point) {
            Ok(point) if point < point_count => current.push((corner, point)),
            _ => broken = true,
        }

        if closes {
            if broken {
                warn!("Dropping FBX polygon with an out of range vertex");
            } else if current.len() >= 3 {
                polygons.push(std::mem::take(&mut current));
            }
            current.clear();
            broken = false;
        }
    }
    polygons
}

struct UvLayer {
    by_polygon_vertex: bool,
    values: Vec<[f32; 2]>,
    indices: Option<Vec<i32>>,
}

impl UvLayer {
    /// Index and value of the UV for a corner
    fn uv_for(&self, point: usize, corner: usize) -> Option<(usize, [f32; 2])> {
        let slot = if self.by_polygon_vertex { corner } else { point };
        let index = match &self.indices {
            Some(indices) => usize::try_from(*indices.get(slot)?).ok()?,
            None => slot,
        };
        self.values.get(index).map(|&uv| (index, uv))
    }
}

fn read_uv_layer(layer: &NodeHandle<'_>) -> Option<UvLayer> {
    let mapping = child_string(layer, "MappingInformationType").unwrap_or_default();
    let reference = child_string(layer, "ReferenceInformationType").unwrap_or_default();
    let values = child_f64_array(layer, "UV")?
        .chunks_exact(2)
        .map(|uv| [uv[0] as f32, uv[1] as f32])
        .collect();
    let indices = if reference == "IndexToDirect" {
        Some(child_i32_array(layer, "UVIndex")?)
    } else {
        None
    };

    Some(UvLayer {
        by_polygon_vertex: mapping == "ByPolygonVertex",
        values,
        indices,
    })
}

/// Translation, XYZ Euler rotation in degrees and scaling from `Properties70`
fn read_local_transform(node: &NodeHandle<'_>) -> Transform3D {
    let mut translation = Vector3::zeros();
    let mut rotation = Vector3::zeros();
    let mut scaling = Vector3::new(1.0, 1.0, 1.0);

    for (name, values) in properties(node) {
        let Some(vector) = property_vector(&values) else {
            continue;
        };
        match name.as_str() {
            "Lcl Translation" => translation = vector,
            "Lcl Rotation" => rotation = vector,
            "Lcl Scaling" => scaling = vector,
            _ => {}
        }
    }

    let rotation = UnitQuaternion::from_euler_angles(
        rotation.x.to_radians(),
        rotation.y.to_radians(),
        rotation.z.to_radians(),
    );
    Transform3D::from_trs(translation, rotation, scaling)
}

fn read_material(node: &NodeHandle<'_>) -> Material {
    let mut material = Material::new(object_name(node));
    for (name, values) in properties(node) {
        match name.as_str() {
            "DiffuseColor" | "Diffuse" => {
                if let Some(color) = property_vector(&values) {
                    material.base_color = [color.x, color.y, color.z, material.base_color[3]];
                }
            }
            "Opacity" => {
                if let Some(opacity) = values.first().and_then(as_f64) {
                    material.base_color[3] = opacity as f32;
                }
            }
            _ => {}
        }
    }
    material
}

/// `P` entries of `Properties70`: name plus the values after the four header fields
fn properties(node: &NodeHandle<'_>) -> Vec<(String, Vec<AttributeValue>)> {
    node.children_by_name("Properties70")
        .flat_map(|props| props.children_by_name("P").collect::<Vec<_>>())
        .filter_map(|p| {
            let attrs = p.attributes();
            let name = attrs.first().and_then(as_str)?.to_string();
            Some((name, attrs.iter().skip(4).cloned().collect()))
        })
        .collect()
}

fn property_vector(values: &[AttributeValue]) -> Option<Vector3<f32>> {
    let x = values.first().and_then(as_f64)?;
    let y = values.get(1).and_then(as_f64)?;
    let z = values.get(2).and_then(as_f64)?;
    Some(Vector3::new(x as f32, y as f32, z as f32))
}

fn child_f64_array(node: &NodeHandle<'_>, name: &str) -> Option<Vec<f64>> {
    let child = node.children_by_name(name).next()?;
    match child.attributes().first()? {
        AttributeValue::ArrF64(values) => Some(values.clone()),
        AttributeValue::ArrF32(values) => Some(values.iter().map(|&v| v as f64).collect()),
        _ => None,
    }
}

fn child_i32_array(node: &NodeHandle<'_>, name: &str) -> Option<Vec<i32>> {
    let child = node.children_by_name(name).next()?;
    match child.attributes().first()? {
        AttributeValue::ArrI32(values) => Some(values.clone()),
        AttributeValue::ArrI64(values) => values.iter().map(|&v| i32::try_from(v).ok()).collect(),
        _ => None,
    }
}

fn child_string(node: &NodeHandle<'_>, name: &str) -> Option<String> {
    let child = node.children_by_name(name).next()?;
    child.attributes().first().and_then(as_str).map(str::to_string)
}

fn as_i64(value: &AttributeValue) -> Option<i64> {
    match value {
        AttributeValue::I64(v) => Some(*v),
        AttributeValue::I32(v) => Some(i64::from(*v)),
        AttributeValue::I16(v) => Some(i64::from(*v)),
        _ => None,
    }
}

fn as_f64(value: &AttributeValue) -> Option<f64> {
    match value {
        AttributeValue::F64(v) => Some(*v),
        AttributeValue::F32(v) => Some(f64::from(*v)),
        AttributeValue::I32(v) => Some(f64::from(*v)),
        AttributeValue::I64(v) => Some(*v as f64),
        _ => None,
    }
}

fn as_str(value: &AttributeValue) -> Option<&str> {
    match value {
        AttributeValue::String(s) => Some(s.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use fbxcel::low::FbxVersion;
    use fbxcel::writer::v7400::binary::{FbxFooter, Writer};
    use std::io::Cursor;

    type FbxWriter = Writer<Cursor<Vec<u8>>>;

    enum Attr<'a> {
        I64(i64),
        F64(f64),
        Str(&'a str),
        ArrF64(&'a [f64]),
        ArrI32(&'a [i32]),
    }

    /// Open a node; the caller closes it with `close_node`
    fn open(writer: &mut FbxWriter, name: &str, attrs: &[Attr<'_>]) {
        let mut attributes = writer.new_node(name).unwrap();
        for attr in attrs {
            match *attr {
                Attr::I64(v) => attributes.append_i64(v).unwrap(),
                Attr::F64(v) => attributes.append_f64(v).unwrap(),
                Attr::Str(v) => attributes.append_string_direct(v).unwrap(),
                Attr::ArrF64(v) => attributes.append_arr_f64_from_iter(None, v.iter().copied()).unwrap(),
                Attr::ArrI32(v) => attributes.append_arr_i32_from_iter(None, v.iter().copied()).unwrap(),
            }
        }
    }

    fn leaf(writer: &mut FbxWriter, name: &str, attrs: &[Attr<'_>]) {
        open(writer, name, attrs);
        writer.close_node().unwrap();
    }

    fn vector_property(writer: &mut FbxWriter, name: &str, kind: &str, [x, y, z]: [f64; 3]) {
        use Attr::*;
        leaf(writer, "P", &[Str(name), Str(kind), Str(""), Str("A"), F64(x), F64(y), F64(z)]);
    }

    /// One unit quad under a translated, rotated and scaled model with a red material
    fn quad_fbx() -> Vec<u8> {
        use Attr::*;
        let mut writer = Writer::new(Cursor::new(Vec::new()), FbxVersion::V7_4).unwrap();

        open(&mut writer, "Objects", &[]);

        open(&mut writer, "Geometry", &[I64(100), Str("Quad\0\x01Geometry"), Str("Mesh")]);
        leaf(
            &mut writer,
            "Vertices",
            &[ArrF64(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0])],
        );
        leaf(&mut writer, "PolygonVertexIndex", &[ArrI32(&[0, 1, 2, !3])]);
        writer.close_node().unwrap();

        open(&mut writer, "Model", &[I64(200), Str("Quad\0\x01Model"), Str("Mesh")]);
        open(&mut writer, "Properties70", &[]);
        vector_property(&mut writer, "Lcl Translation", "Lcl Translation", [10.0, 0.0, 0.0]);
        vector_property(&mut writer, "Lcl Rotation", "Lcl Rotation", [0.0, 0.0, 90.0]);
        vector_property(&mut writer, "Lcl Scaling", "Lcl Scaling", [2.0, 2.0, 2.0]);
        writer.close_node().unwrap();
        writer.close_node().unwrap();

        open(&mut writer, "Material", &[I64(300), Str("Red\0\x01Material"), Str("")]);
        open(&mut writer, "Properties70", &[]);
        vector_property(&mut writer, "DiffuseColor", "Color", [0.8, 0.2, 0.1]);
        writer.close_node().unwrap();
        writer.close_node().unwrap();

        writer.close_node().unwrap();

        open(&mut writer, "Connections", &[]);
        leaf(&mut writer, "C", &[Str("OO"), I64(200), I64(0)]);
        leaf(&mut writer, "C", &[Str("OO"), I64(100), I64(200)]);
        leaf(&mut writer, "C", &[Str("OO"), I64(300), I64(200)]);
        writer.close_node().unwrap();

        writer.finalize_and_flush(&FbxFooter::default()).unwrap().into_inner()
    }

    #[test]
    fn test_binary_fbx_quad_is_wired_and_transformed() {
        let path = std::env::temp_dir().join(format!("meshview_quad_{}.fbx", std::process::id()));
        std::fs::write(&path, quad_fbx()).unwrap();

        let root = FbxLoader.load(&path).unwrap();
        assert_eq!(root.triangle_count(), 2);

        let mut colors = Vec::new();
        root.walk(|node| colors.extend(node.material_slots().iter().map(|m| m.base_color)));
        assert_eq!(colors.len(), 1);
        assert_relative_eq!(colors[0][0], 0.8, epsilon = 1e-6);
        assert_relative_eq!(colors[0][1], 0.2, epsilon = 1e-6);
        assert_relative_eq!(colors[0][2], 0.1, epsilon = 1e-6);

        // Scaled by 2, turned 90 degrees about Z, then moved 10 along X
        let bounds = root.world_bounding_box();
        assert_relative_eq!(bounds.min, Point3::new(8.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(bounds.max, Point3::new(10.0, 2.0, 0.0), epsilon = 1e-5);

        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn test_polygon_decoding_fans_and_drops_broken_polygons() {
        // Quad, then a polygon with an out of range corner, then a triangle
        let indices = [0, 1, 2, !3, 0, 9, 1, !2, 1, 2, !3];
        let decoded = polygons(&indices, 4);
        assert_eq!(
            decoded,
            vec![
                vec![(0, 0), (1, 1), (2, 2), (3, 3)],
                vec![(8, 1), (9, 2), (10, 3)],
            ]
        );
    }

    #[test]
    fn test_uv_lookup_modes() {
        let direct = UvLayer {
            by_polygon_vertex: false,
            values: vec![[0.0, 0.0], [1.0, 0.5]],
            indices: None,
        };
        assert_eq!(direct.uv_for(1, 7), Some((1, [1.0, 0.5])));

        let indexed = UvLayer {
            by_polygon_vertex: true,
            values: vec![[0.0, 0.0], [1.0, 0.5]],
            indices: Some(vec![1, 0, -1]),
        };
        assert_eq!(indexed.uv_for(9, 0), Some((1, [1.0, 0.5])));
        assert_eq!(indexed.uv_for(9, 2), None);
        assert_eq!(indexed.uv_for(9, 5), None);
    }

    #[test]
    fn test_property_vector() {
        let values = vec![
            AttributeValue::F64(1.0),
            AttributeValue::F64(2.5),
            AttributeValue::F32(-3.0),
        ];
        let vector = property_vector(&values).unwrap();
        assert_relative_eq!(vector, Vector3::new(1.0, 2.5, -3.0));
        assert!(property_vector(&values[..2]).is_none());
    }

    #[test]
    fn test_ascii_fbx_is_rejected_with_path() {
        let path = std::env::temp_dir().join(format!("meshview_ascii_{}.fbx", std::process::id()));
        std::fs::write(&path, "; FBX 7.4.0 project file\nFBXHeaderExtension:  {\n}\n").unwrap();

        let err = FbxLoader.load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Mesh { format: "FBX", .. }));
        assert_eq!(err.path(), Some(path.as_path()));

        let _ = std::fs::remove_file(path);
    }
}
