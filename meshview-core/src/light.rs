//! The fixed two-light rig every session is lit with

use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Sky/ground fill light; the blend follows the surface normal's up component
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HemisphereLight {
    pub sky_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
}

/// Orthographic shadow frustum of a directional light, in light space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowBox {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
    pub near: f32,
    pub far: f32,
}

/// "Sun" light shining from `position` towards `target`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub cast_shadow: bool,
    pub shadow: ShadowBox,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightRig {
    pub hemisphere: HemisphereLight,
    pub sun: DirectionalLight,
}

/// Convert a packed `0xRRGGBB` color to linear-ish floats
pub fn rgb_hex(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

impl Default for ShadowBox {
    fn default() -> Self {
        Self {
            left: -120.0,
            right: 120.0,
            bottom: -100.0,
            top: 180.0,
            near: 0.5,
            far: 500.0,
        }
    }
}

impl Default for LightRig {
    fn default() -> Self {
        Self {
            hemisphere: HemisphereLight {
                sky_color: rgb_hex(0xffffff),
                ground_color: rgb_hex(0x444444),
                intensity: 1.0,
                position: Point3::new(0.0, 200.0, 0.0),
            },
            sun: DirectionalLight {
                color: rgb_hex(0xffffff),
                intensity: 0.5,
                position: Point3::new(0.0, 200.0, 100.0),
                target: Point3::origin(),
                cast_shadow: true,
                shadow: ShadowBox::default(),
            },
        }
    }
}

impl LightRig {
    /// Same rig with shadows switched off
    pub fn without_shadows(mut self) -> Self {
        self.sun.cast_shadow = false;
        self
    }
}
