//! Asset loading for meshview
//!
//! This crate turns a file path into something the viewer can show: a scene
//! subtree for OBJ+MTL, FBX, GLTF/GLB and STL models, or a decoded texture for
//! PNG and JPEG images. Format detection is purely by extension.

pub mod error;
pub mod fbx;
pub mod format;
pub mod gltf_scene;
pub mod obj_mtl;
pub mod pipeline;
pub mod registry;
pub mod stl;
pub mod texture;

pub use error::LoadError;
pub use format::{extension_of, material_path_for, FileKind, FormatSet};
pub use pipeline::{LoadOutcome, LoadPipeline};
pub use registry::{Asset, AssetLoader, LoaderRegistry};
