//! Scene graph: a tree of transformable nodes, some of which carry meshes
//!
//! Every traversal here uses an explicit stack. Imported hierarchies can be
//! arbitrarily deep and must not be walked recursively.

use crate::bounds::BoundingBox;
use crate::light::LightRig;
use crate::material::{Material, Texture};
use crate::mesh::TriangleMesh;
use crate::transform::Transform3D;
use nalgebra::Vector3;

/// What a node contributes to the scene beyond its transform
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Pure transform node
    Group,
    /// Renderable geometry with its material slot
    Mesh {
        mesh: TriangleMesh,
        material: Material,
    },
}

/// A node in the scene graph
#[derive(Debug, Clone)]
pub struct SceneNode {
    pub name: String,
    /// Transform relative to the parent node
    pub transform: Transform3D,
    pub kind: NodeKind,
    pub children: Vec<SceneNode>,
}

/// A mesh node visited with its accumulated world transform
#[derive(Debug, Clone, Copy)]
pub struct WorldMesh<'a> {
    pub world: Transform3D,
    pub mesh: &'a TriangleMesh,
    pub material: &'a Material,
}

impl SceneNode {
    /// Create an empty group node
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform3D::identity(),
            kind: NodeKind::Group,
            children: Vec::new(),
        }
    }

    /// Create a mesh node
    pub fn mesh(name: impl Into<String>, mesh: TriangleMesh, material: Material) -> Self {
        Self {
            name: name.into(),
            transform: Transform3D::identity(),
            kind: NodeKind::Mesh { mesh, material },
            children: Vec::new(),
        }
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    pub fn add_child(&mut self, child: SceneNode) {
        self.children.push(child);
    }

    /// Material slots owned by this node; empty for groups
    pub fn material_slots(&self) -> &[Material] {
        match &self.kind {
            NodeKind::Group => &[],
            NodeKind::Mesh { material, .. } => std::slice::from_ref(material),
        }
    }

    /// Mutable material slots owned by this node; empty for groups
    pub fn material_slots_mut(&mut self) -> &mut [Material] {
        match &mut self.kind {
            NodeKind::Group => &mut [],
            NodeKind::Mesh { material, .. } => std::slice::from_mut(material),
        }
    }

    /// Move the node to the world origin, keeping rotation and scale
    pub fn move_to_origin(&mut self) {
        self.transform.set_translation(Vector3::zeros());
    }

    /// Visit this node and every descendant, parents before children
    pub fn walk(&self, mut visit: impl FnMut(&SceneNode)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(node);
            stack.extend(node.children.iter().rev());
        }
    }

    /// Mutable variant of [`SceneNode::walk`]
    pub fn walk_mut(&mut self, mut visit: impl FnMut(&mut SceneNode)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            visit(&mut *node);
            stack.extend(node.children.iter_mut().rev());
        }
    }

    /// Apply `update` to every material slot in the subtree
    pub fn for_each_material_mut(&mut self, mut update: impl FnMut(&mut Material)) {
        self.walk_mut(|node| {
            for material in node.material_slots_mut() {
                update(material);
            }
        });
    }

    /// Every mesh in the subtree with its world transform, where `parent` is
    /// the world transform of this node's parent
    pub fn world_meshes(&self, parent: Transform3D) -> Vec<WorldMesh<'_>> {
        let mut out = Vec::new();
        let mut stack = vec![(self, parent)];
        while let Some((node, parent_world)) = stack.pop() {
            let world = parent_world * node.transform;
            if let NodeKind::Mesh { mesh, material } = &node.kind {
                out.push(WorldMesh {
                    world,
                    mesh,
                    material,
                });
            }
            stack.extend(node.children.iter().rev().map(|child| (child, world)));
        }
        out
    }

    /// World-space bounding box of all geometry below this node
    pub fn world_bounding_box(&self) -> BoundingBox {
        let mut bounds = BoundingBox::empty();
        for item in self.world_meshes(Transform3D::identity()) {
            bounds.union(&item.mesh.bounding_box().transformed(&item.world));
        }
        bounds
    }

    /// Number of triangles in the subtree
    pub fn triangle_count(&self) -> usize {
        let mut count = 0;
        self.walk(|node| {
            if let NodeKind::Mesh { mesh, .. } = &node.kind {
                count += mesh.face_count();
            }
        });
        count
    }

    /// Number of nodes in the subtree, this one included
    pub fn node_count(&self) -> usize {
        let mut count = 0;
        self.walk(|_| count += 1);
        count
    }

    /// Build trees from a flat list of `(parent index, node)` pairs in which
    /// every parent appears before its children. Returns the root nodes in
    /// their original order.
    pub fn assemble(flat: Vec<(Option<usize>, SceneNode)>) -> Vec<SceneNode> {
        let mut parents: Vec<Option<usize>> = Vec::with_capacity(flat.len());
        let mut slots: Vec<Option<SceneNode>> = Vec::with_capacity(flat.len());
        for (parent, node) in flat {
            parents.push(parent);
            slots.push(Some(node));
        }

        // Children always sit after their parent, so folding from the back
        // finishes each subtree before it is moved into its parent.
        let mut roots = Vec::new();
        for index in (0..slots.len()).rev() {
            let Some(mut node) = slots[index].take() else {
                continue;
            };
            node.children.reverse();
            match parents[index] {
                Some(parent) if parent < index && slots[parent].is_some() => {
                    if let Some(parent_node) = slots[parent].as_mut() {
                        parent_node.children.push(node);
                    }
                }
                _ => roots.push(node),
            }
        }
        roots.reverse();
        roots
    }
}

impl Drop for SceneNode {
    fn drop(&mut self) {
        // Flatten the subtree so deep chains do not drop recursively
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

/// A renderable scene: the loaded object plus the light rig
#[derive(Debug, Clone)]
pub struct Scene {
    pub root: SceneNode,
    pub lights: LightRig,
}

impl Scene {
    pub fn new(lights: LightRig) -> Self {
        Self {
            root: SceneNode::group("scene"),
            lights,
        }
    }

    pub fn add(&mut self, node: SceneNode) {
        self.root.add_child(node);
    }

    /// Set `texture` on every material slot in the scene
    pub fn apply_texture(&mut self, texture: &Texture) {
        self.root
            .for_each_material_mut(|material| material.texture = Some(texture.clone()));
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.root.world_bounding_box()
    }

    pub fn triangle_count(&self) -> usize {
        self.root.triangle_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::Point3f;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    fn unit_triangle() -> TriangleMesh {
        TriangleMesh::from_vertices_and_faces(
            vec![
                Point3f::new(0.0, 0.0, 0.0),
                Point3f::new(1.0, 0.0, 0.0),
                Point3f::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        )
    }

    /// A chain deep enough to overflow a recursive walk on a default stack
    fn deep_chain(depth: usize) -> SceneNode {
        let mut flat = Vec::with_capacity(depth + 1);
        flat.push((None, SceneNode::group("root")));
        for i in 0..depth {
            flat.push((Some(i), SceneNode::mesh(format!("n{}", i), unit_triangle(), Material::default())));
        }
        SceneNode::assemble(flat).pop().unwrap()
    }

    #[test]
    fn test_walk_visits_parents_first_in_order() {
        let mut root = SceneNode::group("root");
        let mut a = SceneNode::group("a");
        a.add_child(SceneNode::group("a1"));
        root.add_child(a);
        root.add_child(SceneNode::group("b"));

        let mut names = Vec::new();
        root.walk(|node| names.push(node.name.clone()));
        assert_eq!(names, vec!["root", "a", "a1", "b"]);
    }

    #[test]
    fn test_deep_hierarchy_is_walked_iteratively() {
        let mut root = deep_chain(100_000);
        assert_eq!(root.node_count(), 100_001);

        root.for_each_material_mut(|m| m.metalness = 0.5);
        let mut metallic = 0;
        root.walk(|node| {
            metallic += node.material_slots().iter().filter(|m| m.metalness == 0.5).count();
        });
        assert_eq!(metallic, 100_000);
        assert_eq!(root.triangle_count(), 100_000);
    }

    #[test]
    fn test_group_has_no_material_slots() {
        let mut group = SceneNode::group("g");
        assert!(group.material_slots_mut().is_empty());
    }

    #[test]
    fn test_world_bounding_box_accumulates_transforms() {
        let child = SceneNode::mesh("tri", unit_triangle(), Material::default())
            .with_transform(Transform3D::translation(Vector3::new(0.0, 2.0, 0.0)));
        let mut parent = SceneNode::group("parent")
            .with_transform(Transform3D::translation(Vector3::new(5.0, 0.0, 0.0)));
        parent.add_child(child);

        let bounds = parent.world_bounding_box();
        assert_relative_eq!(bounds.min, Point3::new(5.0, 2.0, 0.0));
        assert_relative_eq!(bounds.max, Point3::new(6.0, 3.0, 0.0));
    }

    #[test]
    fn test_move_to_origin() {
        let mut node = SceneNode::group("g")
            .with_transform(Transform3D::translation(Vector3::new(1.0, 2.0, 3.0)));
        node.move_to_origin();
        assert!(node.transform.is_identity(1e-6));
    }

    #[test]
    fn test_assemble_keeps_sibling_order() {
        let flat = vec![
            (None, SceneNode::group("root")),
            (Some(0), SceneNode::group("first")),
            (Some(0), SceneNode::group("second")),
            (Some(1), SceneNode::group("nested")),
            (None, SceneNode::group("other_root")),
        ];
        let roots = SceneNode::assemble(flat);
        assert_eq!(roots.len(), 2);
        assert_eq!(roots[0].name, "root");
        assert_eq!(roots[1].name, "other_root");
        assert_eq!(roots[0].children[0].name, "first");
        assert_eq!(roots[0].children[1].name, "second");
        assert_eq!(roots[0].children[0].children[0].name, "nested");
    }

    #[test]
    fn test_scene_apply_texture_reaches_every_slot() {
        let mut scene = Scene::new(LightRig::default());
        let mut object = SceneNode::group("object");
        object.add_child(SceneNode::mesh("a", unit_triangle(), Material::default()));
        object.add_child(SceneNode::mesh("b", unit_triangle(), Material::default()));
        scene.add(object);

        let texture = Texture::from_rgba8(1, 1, vec![1, 2, 3, 4]).unwrap();
        scene.apply_texture(&texture);

        let mut textured = 0;
        scene.root.walk(|node| {
            textured += node.material_slots().iter().filter(|m| m.texture.as_ref() == Some(&texture)).count();
        });
        assert_eq!(textured, 2);
        assert_eq!(scene.triangle_count(), 2);
    }
}
