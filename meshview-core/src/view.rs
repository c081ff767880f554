//! What the viewer asks a renderer to draw each frame

use nalgebra::{Matrix4, Point3};
use serde::{Deserialize, Serialize};

/// A rectangle in physical window pixels, origin at the top left
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ViewRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Width over height, or 1 for a collapsed rectangle
    pub fn aspect(&self) -> f32 {
        if self.width > 0.0 && self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }
}

/// One session drawn into one viewport rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawView {
    /// Key the session's scene was uploaded under
    pub key: u64,
    pub rect: ViewRect,
    /// Projection times view, right-handed with OpenGL clip depth
    pub view_proj: Matrix4<f32>,
    pub eye: Point3<f32>,
}
