//! Format detection by file extension
//!
//! The extension is the only thing looked at: no magic bytes are sniffed.

use crate::error::LoadError;
use std::fmt;
use std::path::{Path, PathBuf};

/// What a requested file is, judged by its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Obj,
    Fbx,
    Gltf,
    Glb,
    Stl,
    /// PNG/JPG/JPEG image to be applied as a texture
    Texture,
}

impl FileKind {
    /// Whether this kind produces a model (as opposed to a texture overlay)
    pub fn is_model(self) -> bool {
        !matches!(self, FileKind::Texture)
    }

    /// Human readable format name used in messages
    pub fn format_name(self) -> &'static str {
        match self {
            FileKind::Obj => "OBJ",
            FileKind::Fbx => "FBX",
            FileKind::Gltf | FileKind::Glb => "GLTF",
            FileKind::Stl => "STL",
            FileKind::Texture => "texture",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.format_name())
    }
}

/// Uppercased text after the last `.` of the path, or an empty string when
/// the path contains no `.`
pub fn extension_of(path: &str) -> String {
    match path.rfind('.') {
        Some(index) => path[index + 1..].to_uppercase(),
        None => String::new(),
    }
}

/// Companion material file of an OBJ: same directory and stem, `.mtl` extension
pub fn material_path_for(obj_path: &Path) -> PathBuf {
    obj_path.with_extension("mtl")
}

/// The set of extensions this build accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatSet {
    pub stl: bool,
}

impl FormatSet {
    pub fn new(stl: bool) -> Self {
        Self { stl }
    }

    /// Classify `path`, failing with [`LoadError::Unsupported`] for anything
    /// not recognized
    pub fn classify(&self, path: &str) -> Result<FileKind, LoadError> {
        let extension = extension_of(path);
        let kind = match extension.as_str() {
            "OBJ" => Some(FileKind::Obj),
            "FBX" => Some(FileKind::Fbx),
            "GLTF" => Some(FileKind::Gltf),
            "GLB" => Some(FileKind::Glb),
            "STL" if self.stl => Some(FileKind::Stl),
            "PNG" | "JPG" | "JPEG" => Some(FileKind::Texture),
            _ => None,
        };
        kind.ok_or(LoadError::Unsupported { extension })
    }

    /// Lowercase model extensions, for file dialog filters
    pub fn model_extensions(&self) -> Vec<&'static str> {
        let mut extensions = vec!["obj", "fbx", "gltf", "glb"];
        if self.stl {
            extensions.push("stl");
        }
        extensions
    }

    /// Lowercase image extensions accepted as textures
    pub fn texture_extensions(&self) -> &'static [&'static str] {
        &["png", "jpg", "jpeg"]
    }
}

impl Default for FormatSet {
    fn default() -> Self {
        Self::new(true)
    }
}
