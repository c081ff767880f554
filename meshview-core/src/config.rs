//! Viewer configuration
//!
//! Nothing here is persisted; the desktop shell builds a [`ViewerConfig`] from
//! its command line and hands it to the viewer.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// How the window is divided into viewports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LayoutMode {
    /// One viewport filling the window; each load replaces its session
    Single,
    /// A grid of viewports, each with its own session
    Multi,
}

/// Perspective camera defaults applied to every new session
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Vertical field of view in degrees
    pub fov_degrees: f32,
    /// Provisional clip planes, replaced as soon as a model is framed
    pub near: f32,
    pub far: f32,
    pub initial_position: Point3<f32>,
    pub initial_target: Point3<f32>,
    /// Extra room around the framed object
    pub framing_margin: f32,
}

/// Orbit controls defaults
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlsConfig {
    pub auto_rotate: bool,
    /// 2.0 is one full turn every 30 seconds
    pub auto_rotate_speed: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewerConfig {
    pub layout: LayoutMode,
    pub camera: CameraConfig,
    pub controls: ControlsConfig,
    /// Accept `.stl` files
    pub enable_stl: bool,
    pub shadows: bool,
    pub multisampling: bool,
    pub background_color: [f64; 4],
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 1.0,
            far: 20000.0,
            initial_position: Point3::new(10.0, 10.0, 30.0),
            initial_target: Point3::new(0.0, 0.5, 0.0),
            framing_margin: 1.2,
        }
    }
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            auto_rotate_speed: 2.0,
            enable_damping: true,
            damping_factor: 0.05,
            enable_pan: false,
            enable_zoom: true,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            layout: LayoutMode::Single,
            camera: CameraConfig::default(),
            controls: ControlsConfig::default(),
            enable_stl: true,
            shadows: true,
            multisampling: true,
            background_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}
