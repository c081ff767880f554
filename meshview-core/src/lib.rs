//! Core data structures for meshview
//!
//! This crate provides the value types shared by the loaders, the renderer and
//! the viewer: meshes, materials, the scene graph, bounding boxes, the light
//! rig and the viewer configuration.

pub mod bounds;
pub mod config;
pub mod error;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod transform;
pub mod view;

pub use bounds::*;
pub use config::*;
pub use error::*;
pub use light::*;
pub use material::*;
pub use mesh::*;
pub use scene::*;
pub use transform::*;
pub use view::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
