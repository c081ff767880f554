//! Image decoding for texture overlays and material maps

use crate::error::LoadError;
use meshview_core::Texture;
use std::path::Path;

/// Decode a PNG or JPEG file into an RGBA8 texture
pub fn load_texture(path: &Path) -> Result<Texture, LoadError> {
    let texture_error = |reason: String| LoadError::Texture {
        path: path.to_path_buf(),
        reason,
    };

    let image = image::open(path).map_err(|e| texture_error(e.to_string()))?;
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();
    let texture = Texture::from_rgba8(width, height, rgba.into_raw())
        .ok_or_else(|| texture_error("image has no pixels".to_string()))?;

    tracing::debug!("Decoded texture {} ({}x{})", path.display(), width, height);
    Ok(texture)
}

/// Expand tightly packed pixels with `channels` components per pixel into RGBA8.
/// One channel is gray, two are gray and alpha, three are RGB.
pub fn expand_to_rgba8(width: u32, height: u32, channels: usize, pixels: &[u8]) -> Option<Texture> {
    if !(1..=4).contains(&channels) || pixels.len() != width as usize * height as usize * channels {
        return None;
    }

    let rgba = match channels {
        4 => pixels.to_vec(),
        3 => pixels
            .chunks_exact(3)
            .flat_map(|p| [p[0], p[1], p[2], 255])
            .collect(),
        2 => pixels
            .chunks_exact(2)
            .flat_map(|p| [p[0], p[0], p[0], p[1]])
            .collect(),
        _ => pixels.iter().flat_map(|&g| [g, g, g, 255]).collect(),
    };
    Texture::from_rgba8(width, height, rgba)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_png_decodes_to_rgba() {
        let path = std::env::temp_dir().join(format!("meshview_texture_{}.png", std::process::id()));
        let image = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        image.save(&path).unwrap();

        let texture = load_texture(&path).unwrap();
        assert_eq!((texture.width, texture.height), (3, 2));
        assert_eq!(&texture.pixels()[..4], &[10, 20, 30, 255]);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_missing_image_names_path() {
        let path = Path::new("/nonexistent/meshview/wood.jpg");
        let err = load_texture(path).unwrap_err();
        assert!(matches!(err, LoadError::Texture { .. }));
        assert_eq!(err.path(), Some(path));
    }

    #[test]
    fn test_channel_expansion() {
        let rgb = expand_to_rgba8(1, 1, 3, &[1, 2, 3]).unwrap();
        assert_eq!(rgb.pixels(), &[1, 2, 3, 255]);

        let gray_alpha = expand_to_rgba8(1, 1, 2, &[7, 9]).unwrap();
        assert_eq!(gray_alpha.pixels(), &[7, 7, 7, 9]);

        assert!(expand_to_rgba8(2, 2, 3, &[0; 5]).is_none());
    }
}
