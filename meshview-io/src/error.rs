//! Error types for asset loading

use std::path::PathBuf;
use thiserror::Error;

/// Why a requested file did not end up in the viewport.
///
/// The `Display` text is what the user sees in the alert.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoadError {
    #[error("{} files are not supported.", display_extension(.extension))]
    Unsupported { extension: String },

    #[error("Failed to load MTL file {}: {reason}", .path.display())]
    Material { path: PathBuf, reason: String },

    #[error("Failed to load {format} file {}: {reason}", .path.display())]
    Mesh {
        format: &'static str,
        path: PathBuf,
        reason: String,
    },

    #[error("Failed to load texture {}: {reason}", .path.display())]
    Texture { path: PathBuf, reason: String },

    #[error("Open a 3D file before adding textures.")]
    TextureBeforeModel,
}

fn display_extension(extension: &str) -> &str {
    if extension.is_empty() {
        "Extensionless"
    } else {
        extension
    }
}

impl LoadError {
    pub(crate) fn mesh(format: &'static str, path: &std::path::Path, reason: impl ToString) -> Self {
        LoadError::Mesh {
            format,
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    /// The file this error is about, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            LoadError::Material { path, .. }
            | LoadError::Mesh { path, .. }
            | LoadError::Texture { path, .. } => Some(path),
            LoadError::Unsupported { .. } | LoadError::TextureBeforeModel => None,
        }
    }
}
