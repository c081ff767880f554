//! GPU rendering for meshview using wgpu
//!
//! [`GpuContext`] owns the device and queue. [`SceneRenderer`] keeps one
//! uploaded scene per session key and draws any subset of them into viewport
//! rectangles of a single surface, with room for an overlay on top.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshview_gpu::{GpuContext, RenderConfig, SceneRenderer};
//!
//! async fn example(window: std::sync::Arc<winit::window::Window>) -> meshview_core::Result<()> {
//!     let size = window.inner_size();
//!     let (context, surface) = GpuContext::with_surface(window).await?;
//!     let mut renderer = SceneRenderer::new(context, surface, size.width, size.height, RenderConfig::default())?;
//!     renderer.render(&[], Box::new(|_, _, _, _| Vec::new()))?;
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod mesh;
pub mod renderer;
pub mod shaders;

pub use device::GpuContext;
pub use mesh::{light_view_projection, mesh_vertices, pixel_rect, GlobalsUniform, MeshVertex, ModelUniform, OPENGL_TO_WGPU_MATRIX};
pub use renderer::{Overlay, RenderConfig, SceneRenderer};
