//! Orbit controls: rotate, dolly and optionally pan a camera around a target
//!
//! Input handlers only accumulate deltas. [`OrbitControls::update`] applies
//! them once per frame, together with damping and auto-rotation.

use crate::camera::PerspectiveCamera;
use meshview_core::ControlsConfig;
use nalgebra::{Point3, Vector3};
use std::f32::consts::{PI, TAU};

/// Keeps the polar angle off the poles where the up vector degenerates
const POLAR_EPSILON: f32 = 1e-6;

/// `damping_factor` is the share of pending motion applied per frame at this rate
const DAMPING_REFERENCE_FPS: f32 = 60.0;

/// Which pointer button started a drag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DragState {
    Idle,
    Rotate,
    Pan,
}

#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub enable_pan: bool,
    pub enable_zoom: bool,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,

    state: DragState,
    last_pointer: Option<(f32, f32)>,
    // Pending azimuth (theta) and polar (phi) changes
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vector3<f32>,
}

impl OrbitControls {
    pub fn new(config: &ControlsConfig, target: Point3<f32>) -> Self {
        Self {
            target,
            min_distance: 0.0,
            max_distance: f32::INFINITY,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            enable_pan: config.enable_pan,
            enable_zoom: config.enable_zoom,
            rotate_speed: config.rotate_speed,
            zoom_speed: config.zoom_speed,
            pan_speed: config.pan_speed,
            state: DragState::Idle,
            last_pointer: None,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vector3::zeros(),
        }
    }

    /// Whether a drag is in progress; auto-rotation pauses meanwhile
    pub fn is_dragging(&self) -> bool {
        self.state != DragState::Idle
    }

    /// Azimuth change for `dt` seconds of auto-rotation. Speed 2 is one turn
    /// every 30 seconds.
    pub fn auto_rotation_angle(&self, dt: f32) -> f32 {
        TAU / 60.0 * self.auto_rotate_speed * dt
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    pub fn pointer_down(&mut self, button: PointerButton, x: f32, y: f32) {
        self.state = match button {
            PointerButton::Primary => DragState::Rotate,
            PointerButton::Secondary | PointerButton::Middle if self.enable_pan => DragState::Pan,
            _ => DragState::Idle,
        };
        self.last_pointer = Some((x, y));
    }

    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
        self.last_pointer = None;
    }

    /// Feed a pointer position in pixels; `view_height` is the height of the
    /// viewport the pointer is over
    pub fn pointer_move(&mut self, x: f32, y: f32, view_height: f32, camera: &PerspectiveCamera) {
        let Some((last_x, last_y)) = self.last_pointer.replace((x, y)) else {
            return;
        };
        let height = view_height.max(1.0);
        let (dx, dy) = (x - last_x, y - last_y);

        match self.state {
            DragState::Rotate => {
                self.rotate_left(TAU * dx / height * self.rotate_speed);
                self.rotate_up(TAU * dy / height * self.rotate_speed);
            }
            DragState::Pan => self.pan(dx * self.pan_speed, dy * self.pan_speed, height, camera),
            DragState::Idle => {}
        }
    }

    /// Wheel input in lines; positive moves the camera closer
    pub fn scroll(&mut self, lines: f32) {
        if !self.enable_zoom {
            return;
        }
        self.scale *= 0.95f32.powf(self.zoom_speed * lines);
    }

    /// Shift the target in the camera's screen plane by a pixel delta
    pub fn pan(&mut self, dx: f32, dy: f32, view_height: f32, camera: &PerspectiveCamera) {
        if !self.enable_pan {
            return;
        }
        // World units covered by one pixel at the target's depth
        let target_distance =
            (camera.position - self.target).norm() * (camera.fov_radians() / 2.0).tan();
        let (right, up) = camera.screen_axes();
        self.pan_offset -= right * (2.0 * dx * target_distance / view_height);
        self.pan_offset += up * (2.0 * dy * target_distance / view_height);
    }

    /// Drop every pending input delta
    pub fn reset_motion(&mut self) {
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vector3::zeros();
    }

    /// Advance the camera by `dt` seconds. Returns true if it moved.
    pub fn update(&mut self, camera: &mut PerspectiveCamera, dt: f32) -> bool {
        let offset = camera.position - self.target;
        let mut radius = offset.norm();
        let (mut theta, mut phi) = if radius > f32::EPSILON {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI / 2.0)
        };

        if self.auto_rotate && !self.is_dragging() {
            self.rotate_left(self.auto_rotation_angle(dt));
        }

        // Share of the pending motion applied now, and share carried over
        let (factor, carry) = if self.enable_damping {
            let carry = (1.0 - self.damping_factor.clamp(0.0, 1.0)).powf(dt.max(0.0) * DAMPING_REFERENCE_FPS);
            (1.0 - carry, carry)
        } else {
            (1.0, 0.0)
        };
        theta += self.delta_theta * factor;
        phi += self.delta_phi * factor;
        phi = phi.clamp(POLAR_EPSILON, PI - POLAR_EPSILON);

        self.target += self.pan_offset * factor;

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        let radius = if radius.is_finite() { radius } else { offset.norm() };

        let sin_phi = phi.sin();
        let new_offset = Vector3::new(
            radius * sin_phi * theta.sin(),
            radius * phi.cos(),
            radius * sin_phi * theta.cos(),
        );

        let previous = camera.position;
        camera.position = self.target + new_offset;
        camera.target = self.target;

        self.delta_theta *= carry;
        self.delta_phi *= carry;
        self.pan_offset *= carry;
        self.scale = 1.0;

        (camera.position - previous).norm_squared() > 1e-8
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(&ControlsConfig::default(), Point3::new(0.0, 0.5, 0.0))
    }
}
