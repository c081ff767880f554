//! Loader registry for extension-driven dispatch
//!
//! Each supported model format registers an [`AssetLoader`] under its
//! [`FileKind`]. Callers never pick a loader themselves: they hand the registry
//! a path and get back a scene node or a texture.

use crate::error::LoadError;
use crate::format::{FileKind, FormatSet};
use crate::{fbx, gltf_scene, obj_mtl, stl, texture};
use meshview_core::{SceneNode, Texture};
use std::collections::HashMap;
use std::path::Path;

/// Trait for reading a model file into a scene subtree
pub trait AssetLoader: Send + Sync {
    /// Read the model at `path`
    fn load(&self, path: &Path) -> Result<SceneNode, LoadError>;

    /// Get the format name this loader handles
    fn format_name(&self) -> &'static str;
}

/// Anything a load request can produce
#[derive(Debug)]
pub enum Asset {
    Model(SceneNode),
    Texture(Texture),
}

/// Registry that maps recognized model kinds to their loaders
pub struct LoaderRegistry {
    formats: FormatSet,
    loaders: HashMap<FileKind, Box<dyn AssetLoader>>,
}

impl LoaderRegistry {
    /// Create a registry with no loaders
    pub fn new(formats: FormatSet) -> Self {
        Self {
            formats,
            loaders: HashMap::new(),
        }
    }

    /// Registry with every built-in loader enabled by `formats`
    pub fn with_defaults(formats: FormatSet) -> Self {
        let mut registry = Self::new(formats);
        registry.register(FileKind::Obj, Box::new(obj_mtl::ObjMtlLoader));
        registry.register(FileKind::Fbx, Box::new(fbx::FbxLoader));
        registry.register(FileKind::Gltf, Box::new(gltf_scene::GltfLoader));
        registry.register(FileKind::Glb, Box::new(gltf_scene::GltfLoader));
        if formats.stl {
            registry.register(FileKind::Stl, Box::new(stl::StlLoader));
        }
        registry
    }

    /// Register a loader for a model kind, replacing any previous one
    pub fn register(&mut self, kind: FileKind, loader: Box<dyn AssetLoader>) {
        self.loaders.insert(kind, loader);
    }

    pub fn formats(&self) -> FormatSet {
        self.formats
    }

    /// Classify `path` by extension
    pub fn classify(&self, path: &Path) -> Result<FileKind, LoadError> {
        self.formats.classify(&path.to_string_lossy())
    }

    /// Check if a loader is registered for `kind`
    pub fn supports(&self, kind: FileKind) -> bool {
        kind == FileKind::Texture || self.loaders.contains_key(&kind)
    }

    /// Load a model and move its root to the world origin
    pub fn load_model(&self, kind: FileKind, path: &Path) -> Result<SceneNode, LoadError> {
        let loader = self.loaders.get(&kind).ok_or_else(|| LoadError::Unsupported {
            extension: crate::format::extension_of(&path.to_string_lossy()),
        })?;

        let mut root = loader.load(path)?;
        root.move_to_origin();
        tracing::info!(
            "Loaded {} model {} ({} nodes, {} triangles)",
            loader.format_name(),
            path.display(),
            root.node_count(),
            root.triangle_count()
        );
        Ok(root)
    }

    /// Decode an image file for use as a texture
    pub fn load_texture(&self, path: &Path) -> Result<Texture, LoadError> {
        texture::load_texture(path)
    }

    /// Load whatever `path` is, dispatching on `kind`
    pub fn load(&self, kind: FileKind, path: &Path) -> Result<Asset, LoadError> {
        match kind {
            FileKind::Texture => self.load_texture(path).map(Asset::Texture),
            model => self.load_model(model, path).map(Asset::Model),
        }
    }
}

impl Default for LoaderRegistry {
    fn default() -> Self {
        Self::with_defaults(FormatSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshview_core::{Material, Point3, Transform3D, TriangleMesh, Vector3};

    // Mock loader returning a translated single-triangle model
    struct MockObjLoader;

    impl AssetLoader for MockObjLoader {
        fn load(&self, _path: &Path) -> Result<SceneNode, LoadError> {
            let mesh = TriangleMesh::from_vertices_and_faces(
                vec![
                    Point3::new(0.0, 0.0, 0.0),
                    Point3::new(1.0, 0.0, 0.0),
                    Point3::new(0.0, 1.0, 0.0),
                ],
                vec![[0, 1, 2]],
            );
            Ok(SceneNode::mesh("triangle", mesh, Material::default())
                .with_transform(Transform3D::translation(Vector3::new(5.0, -3.0, 2.0))))
        }

        fn format_name(&self) -> &'static str {
            "mock"
        }
    }

    struct FailingLoader;

    impl AssetLoader for FailingLoader {
        fn load(&self, path: &Path) -> Result<SceneNode, LoadError> {
            Err(LoadError::mesh("mock", path, "broken"))
        }

        fn format_name(&self) -> &'static str {
            "mock"
        }
    }

    #[test]
    fn test_registry_registration() {
        let mut registry = LoaderRegistry::new(FormatSet::default());
        assert!(!registry.supports(FileKind::Obj));
        assert!(registry.supports(FileKind::Texture));

        registry.register(FileKind::Obj, Box::new(MockObjLoader));
        assert!(registry.supports(FileKind::Obj));
        assert!(!registry.supports(FileKind::Fbx));
    }

    #[test]
    fn test_defaults_follow_format_set() {
        let registry = LoaderRegistry::with_defaults(FormatSet::new(false));
        assert!(registry.supports(FileKind::Gltf));
        assert!(registry.supports(FileKind::Glb));
        assert!(!registry.supports(FileKind::Stl));
        assert!(LoaderRegistry::default().supports(FileKind::Stl));
    }

    #[test]
    fn test_loaded_root_moves_to_origin() {
        let mut registry = LoaderRegistry::new(FormatSet::default());
        registry.register(FileKind::Obj, Box::new(MockObjLoader));

        let root = registry
            .load_model(FileKind::Obj, Path::new("model.obj"))
            .unwrap();
        assert_eq!(root.transform.translation_part(), Vector3::zeros());
        assert_eq!(root.triangle_count(), 1);
    }

    #[test]
    fn test_loader_errors_pass_through() {
        let mut registry = LoaderRegistry::new(FormatSet::default());
        registry.register(FileKind::Fbx, Box::new(FailingLoader));

        let err = registry
            .load_model(FileKind::Fbx, Path::new("broken.fbx"))
            .unwrap_err();
        assert_eq!(err.path(), Some(Path::new("broken.fbx")));
    }

    #[test]
    fn test_unregistered_kind_is_unsupported() {
        let registry = LoaderRegistry::new(FormatSet::default());
        let err = registry
            .load_model(FileKind::Stl, Path::new("part.stl"))
            .unwrap_err();
        assert_eq!(
            err,
            LoadError::Unsupported {
                extension: "STL".into()
            }
        );
    }
}
