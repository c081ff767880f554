//! Viewer logic for meshview
//!
//! Everything between the window and the GPU that does not need either:
//! - Orbit camera and controls
//! - Camera auto-framing
//! - Viewport layout and scene sessions
//! - File intake with stale-load rejection

pub mod camera;
pub mod controls;
pub mod framing;
pub mod intake;
pub mod registry;
pub mod session;
pub mod viewer;
pub mod viewport;

pub use camera::PerspectiveCamera;
pub use controls::{OrbitControls, PointerButton};
pub use framing::{compute_framing, frame, Framing, DEFAULT_MARGIN};
pub use intake::{IntakeRouter, LoadPurpose, LoadTicket, RequestOrigin, RequestTarget};
pub use registry::{SessionHandle, SessionRegistry};
pub use session::{fix_materials, SceneSession, SessionStatus};
pub use viewer::{Completion, LoadJob, Notifier, Renderer, Viewer};
pub use viewport::{Viewport, ViewportId, ViewportLayout};
