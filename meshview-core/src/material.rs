//! Materials and textures attached to mesh nodes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_TEXTURE_ID: AtomicU64 = AtomicU64::new(1);

/// Decoded RGBA8 image shared between every material that references it.
///
/// Cloning is cheap; the pixels live behind an `Arc`. The `id` identifies the
/// pixel data so a renderer can cache one GPU texture per image.
#[derive(Clone)]
pub struct Texture {
    id: u64,
    pub width: u32,
    pub height: u32,
    pixels: Arc<[u8]>,
}

impl Texture {
    /// Wrap tightly packed RGBA8 pixels. Returns `None` if the buffer size
    /// does not match `width * height * 4` or the image is empty.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        let expected = width as usize * height as usize * 4;
        if expected == 0 || pixels.len() != expected {
            return None;
        }
        Some(Self {
            id: NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed),
            width,
            height,
            pixels: pixels.into(),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

impl fmt::Debug for Texture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.id)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

impl PartialEq for Texture {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

/// Metallic-roughness surface description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    /// Linear RGBA base color, multiplied with the texture when present
    pub base_color: [f32; 4],
    pub metalness: f32,
    pub roughness: f32,
    #[serde(skip)]
    pub texture: Option<Texture>,
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_color(mut self, rgb: [f32; 3], alpha: f32) -> Self {
        self.base_color = [rgb[0], rgb[1], rgb[2], alpha];
        self
    }
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            base_color: [0.8, 0.8, 0.8, 1.0],
            metalness: 0.0,
            roughness: 1.0,
            texture: None,
        }
    }
}
