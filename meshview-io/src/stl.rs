//! STL format support, binary and ASCII
//!
//! STL carries no materials, so the mesh gets a neutral gray one.

use crate::error::LoadError;
use crate::registry::AssetLoader;
use meshview_core::{Material, Point3, SceneNode, TriangleMesh};
use std::collections::HashMap;
use std::path::Path;

pub struct StlLoader;

impl AssetLoader for StlLoader {
    fn load(&self, path: &Path) -> Result<SceneNode, LoadError> {
        let data = std::fs::read(path).map_err(|e| LoadError::mesh("STL", path, e))?;
        let triangles = parse_stl(&data).map_err(|reason| LoadError::mesh("STL", path, reason))?;

        let mut mesh = weld(&triangles);
        mesh.ensure_normals();

        let name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "stl".to_string());
        let material = Material::new("stl").with_color([0.7, 0.7, 0.7], 1.0);
        Ok(SceneNode::mesh(name, mesh, material))
    }

    fn format_name(&self) -> &'static str {
        "STL"
    }
}

/// Parse either STL flavor into a triangle soup
pub fn parse_stl(data: &[u8]) -> Result<Vec<[Point3<f32>; 3]>, String> {
    if is_binary(data) {
        parse_binary(data)
    } else {
        let text = std::str::from_utf8(data).map_err(|_| "file is neither binary nor ASCII STL".to_string())?;
        parse_ascii(text)
    }
}

// Some exporters write binary files whose header starts with "solid", so the
// declared triangle count decides.
fn is_binary(data: &[u8]) -> bool {
    if data.len() < 84 {
        return !data.starts_with(b"solid");
    }
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    let expected = 84 + count * 50;
    data.len() == expected || !data.starts_with(b"solid")
}

fn parse_binary(data: &[u8]) -> Result<Vec<[Point3<f32>; 3]>, String> {
    if data.len() < 84 {
        return Err("file too small for header and triangle count".to_string());
    }

    // Skip 80-byte header
    let count = u32::from_le_bytes([data[80], data[81], data[82], data[83]]) as usize;
    let expected = 84 + count * 50;
    if data.len() < expected {
        return Err(format!(
            "truncated: expected {} bytes for {} triangles, got {}",
            expected,
            count,
            data.len()
        ));
    }

    let mut triangles = Vec::with_capacity(count);
    let mut offset = 84;
    for _ in 0..count {
        // Facet normal is recomputed from the winding
        offset += 12;
        let mut corners = [Point3::origin(); 3];
        for corner in &mut corners {
            *corner = read_point(data, offset);
            offset += 12;
        }
        triangles.push(corners);
        offset += 2; // attribute byte count
    }
    Ok(triangles)
}

fn parse_ascii(text: &str) -> Result<Vec<[Point3<f32>; 3]>, String> {
    let mut triangles = Vec::new();
    let mut corners = Vec::with_capacity(3);

    for (line_number, line) in text.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        match tokens.next() {
            Some("vertex") => {
                let coords: Vec<f32> = tokens
                    .map(str::parse)
                    .collect::<Result<_, _>>()
                    .map_err(|e| format!("line {}: {}", line_number + 1, e))?;
                if coords.len() != 3 {
                    return Err(format!("line {}: expected 3 coordinates", line_number + 1));
                }
                corners.push(Point3::new(coords[0], coords[1], coords[2]));
            }
            Some("endloop") => {
                if corners.len() != 3 {
                    return Err(format!(
                        "line {}: facet has {} vertices",
                        line_number + 1,
                        corners.len()
                    ));
                }
                triangles.push([corners[0], corners[1], corners[2]]);
                corners.clear();
            }
            _ => {}
        }
    }

    if triangles.is_empty() {
        return Err("no facets found".to_string());
    }
    Ok(triangles)
}

/// Merge bitwise-identical corners so smooth normals can be generated
fn weld(triangles: &[[Point3<f32>; 3]]) -> TriangleMesh {
    let mut lookup: HashMap<[u32; 3], u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut faces = Vec::with_capacity(triangles.len());

    for triangle in triangles {
        let mut face = [0u32; 3];
        for (slot, corner) in face.iter_mut().zip(triangle) {
            let key = [corner.x.to_bits(), corner.y.to_bits(), corner.z.to_bits()];
            *slot = *lookup.entry(key).or_insert_with(|| {
                vertices.push(*corner);
                (vertices.len() - 1) as u32
            });
        }
        faces.push(face);
    }
    TriangleMesh::from_vertices_and_faces(vertices, faces)
}

fn read_f32(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_point(data: &[u8], offset: usize) -> Point3<f32> {
    Point3::new(
        read_f32(data, offset),
        read_f32(data, offset + 4),
        read_f32(data, offset + 8),
    )
}
