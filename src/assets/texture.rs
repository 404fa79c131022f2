use glam::Vec3;

use super::AssetError;

/// RGBA8 pixels of a decoded image.
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    /// Mean linear-space colour, used where a material is tinted by the image.
    pub average_color: Vec3,
}

pub fn decode_texture(path: &str, bytes: &[u8]) -> Result<Texture, AssetError> {
    let image = image::load_from_memory(bytes)
        .map_err(|source| AssetError::Image {
            path: path.to_string(),
            source,
        })?
        .to_rgba8();
    let (width, height) = image.dimensions();
    let rgba = image.into_raw();
    let average_color = average(&rgba);
    log::debug!("decoded {path}: {width}x{height}");
    Ok(Texture {
        width,
        height,
        rgba,
        average_color,
    })
}

fn average(rgba: &[u8]) -> Vec3 {
    let pixels = rgba.len() / 4;
    if pixels == 0 {
        return Vec3::ONE;
    }
    let sum = rgba
        .chunks_exact(4)
        .fold(Vec3::ZERO, |acc, px| {
            acc + Vec3::new(
                srgb_to_linear(px[0]),
                srgb_to_linear(px[1]),
                srgb_to_linear(px[2]),
            )
        });
    sum / pixels as f32
}

fn srgb_to_linear(channel: u8) -> f32 {
    let c = channel as f32 / 255.0;
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn png(pixels: &[[u8; 4]], width: u32) -> Vec<u8> {
        let height = pixels.len() as u32 / width;
        let mut image = RgbaImage::new(width, height);
        for (i, px) in pixels.iter().enumerate() {
            image.put_pixel(i as u32 % width, i as u32 / width, Rgba(*px));
        }
        let mut bytes = Vec::new();
        image
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_and_averages() {
        let bytes = png(&[[255, 0, 0, 255], [0, 0, 0, 255]], 2);
        let texture = decode_texture("ground.png", &bytes).unwrap();
        assert_eq!((texture.width, texture.height), (2, 1));
        assert_eq!(texture.rgba.len(), 8);
        assert!((texture.average_color.x - 0.5).abs() < 1e-5);
        assert_eq!(texture.average_color.y, 0.0);
    }

    #[test]
    fn rejects_non_images() {
        assert!(matches!(
            decode_texture("cross.png", b"plain text"),
            Err(AssetError::Image { .. })
        ));
    }
}
