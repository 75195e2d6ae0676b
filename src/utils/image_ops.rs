use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;

use crate::core::types::TextRegion;

/// Crop a region out of the image, expanding the box by `expansion_pct`
/// percent on every side (clamped to the image bounds).
///
/// Backends that recognize text per region use the expanded crop so glyph
/// edges are not cut off by a tight detection box.
pub fn crop_region(image: &RgbaImage, region: &TextRegion, expansion_pct: u32) -> RgbaImage {
    let (img_w, img_h) = image.dimensions();
    let [x1, y1, x2, y2] = region.xyxy;

    let pad_x = (x2 - x1) * expansion_pct as f32 / 100.0;
    let pad_y = (y2 - y1) * expansion_pct as f32 / 100.0;

    let cx1 = ((x1 - pad_x).max(0.0) as u32).min(img_w.saturating_sub(1));
    let cy1 = ((y1 - pad_y).max(0.0) as u32).min(img_h.saturating_sub(1));
    let cx2 = ((x2 + pad_x).max(0.0) as u32).min(img_w);
    let cy2 = ((y2 + pad_y).max(0.0) as u32).min(img_h);

    let width = cx2.saturating_sub(cx1).max(1);
    let height = cy2.saturating_sub(cy1).max(1);

    DynamicImage::ImageRgba8(image.clone())
        .crop_imm(cx1, cy1, width, height)
        .to_rgba8()
}

/// Encode an RGBA buffer to PNG bytes.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png_bytes = Vec::new();
    let mut cursor = Cursor::new(&mut png_bytes);
    DynamicImage::ImageRgba8(image.clone())
        .write_to(&mut cursor, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(png_bytes)
}

/// Asynchronously encode an image to PNG bytes using spawn_blocking.
///
/// PNG encoding is CPU-intensive and can block the async runtime if done
/// synchronously.
pub async fn encode_png_async(image: RgbaImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || encode_png(&image))
        .await
        .context("Failed to spawn blocking task for PNG encoding")?
}

/// Normalize a decoded image to an 8-bit RGBA buffer.
///
/// Inference endpoints may return 16-bit or grayscale PNGs; every pipeline
/// stage operates on RGBA8, so repainted images are converted here before
/// they re-enter the session.
pub fn normalize_to_rgba8(image: DynamicImage) -> RgbaImage {
    image.to_rgba8()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_region_clamps_to_bounds() {
        let image = RgbaImage::new(100, 80);
        let region = TextRegion::new([90.0, 70.0, 120.0, 95.0], 0.0);
        let crop = crop_region(&image, &region, 10);
        assert!(crop.width() <= 100);
        assert!(crop.height() <= 80);
        assert!(crop.width() >= 1 && crop.height() >= 1);
    }

    #[test]
    fn test_encode_png_roundtrip() {
        let image = RgbaImage::from_pixel(8, 8, image::Rgba([10, 20, 30, 255]));
        let bytes = encode_png(&image).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded.dimensions(), (8, 8));
        assert_eq!(decoded.get_pixel(3, 3), &image::Rgba([10, 20, 30, 255]));
    }
}
