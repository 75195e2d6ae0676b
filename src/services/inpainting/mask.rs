// Removal-mask construction.
//
// Pure function: the same region collection and image size always produce
// the same mask. Rotated boxes are filled as the rotated rectangle itself,
// not its axis-aligned hull, so inpainting never erases more of the panel
// than the detector claimed.

use image::{GrayImage, Luma};

use crate::core::types::TextRegion;

const REMOVE: Luma<u8> = Luma([255]);

/// Build a single-channel mask matching the image dimensions: 255 inside
/// every region's geometry ("remove"), 0 elsewhere ("keep").
pub fn build_mask(width: u32, height: u32, regions: &[TextRegion]) -> GrayImage {
    let mut mask = GrayImage::new(width, height);

    for region in regions {
        if region.angle == 0.0 {
            fill_axis_aligned(&mut mask, region);
        } else {
            fill_polygon(&mut mask, &rotated_corners(region));
        }
    }

    mask
}

fn fill_axis_aligned(mask: &mut GrayImage, region: &TextRegion) {
    let (w, h) = mask.dimensions();
    let [x1, y1, x2, y2] = region.xyxy;
    let x1 = (x1.max(0.0)) as u32;
    let y1 = (y1.max(0.0)) as u32;
    let x2 = (x2.max(0.0).min(w as f32)).ceil() as u32;
    let y2 = (y2.max(0.0).min(h as f32)).ceil() as u32;

    for y in y1..y2.min(h) {
        for x in x1..x2.min(w) {
            mask.put_pixel(x, y, REMOVE);
        }
    }
}

/// Box corners rotated by the region angle around the box center.
fn rotated_corners(region: &TextRegion) -> [(f32, f32); 4] {
    let (cx, cy) = region.center();
    let (sin, cos) = region.angle.to_radians().sin_cos();
    let [x1, y1, x2, y2] = region.xyxy;

    [(x1, y1), (x2, y1), (x2, y2), (x1, y2)].map(|(x, y)| {
        let dx = x - cx;
        let dy = y - cy;
        (cx + dx * cos - dy * sin, cy + dx * sin + dy * cos)
    })
}

/// Scanline fill of a convex quad: intersect each row's center line with the
/// polygon edges and fill between the crossing pairs.
fn fill_polygon(mask: &mut GrayImage, corners: &[(f32, f32); 4]) {
    let (w, h) = mask.dimensions();

    let y_min = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).floor().max(0.0) as u32;
    let y_max = corners
        .iter()
        .map(|c| c.1)
        .fold(f32::NEG_INFINITY, f32::max)
        .ceil()
        .min(h as f32) as u32;

    for y in y_min..y_max {
        let scan_y = y as f32 + 0.5;
        let mut crossings = Vec::with_capacity(4);

        for i in 0..4 {
            let (x1, y1) = corners[i];
            let (x2, y2) = corners[(i + 1) % 4];
            if (y1 <= scan_y && scan_y < y2) || (y2 <= scan_y && scan_y < y1) {
                let t = (scan_y - y1) / (y2 - y1);
                crossings.push(x1 + t * (x2 - x1));
            }
        }

        crossings.sort_by(f32::total_cmp);
        for pair in crossings.chunks_exact(2) {
            let start = pair[0].max(0.0) as u32;
            let end = pair[1].min(w as f32).ceil() as u32;
            for x in start..end.min(w) {
                mask.put_pixel(x, y, REMOVE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_remove(mask: &GrayImage) -> usize {
        mask.pixels().filter(|p| p[0] == 255).count()
    }

    #[test]
    fn test_full_cover_box_marks_everything() {
        let region = TextRegion::new([0.0, 0.0, 32.0, 24.0], 0.0);
        let mask = build_mask(32, 24, &[region]);
        assert_eq!(count_remove(&mask), 32 * 24);
    }

    #[test]
    fn test_empty_collection_keeps_everything() {
        let mask = build_mask(32, 24, &[]);
        assert_eq!(count_remove(&mask), 0);
    }

    #[test]
    fn test_rotated_box_masks_the_rotated_rect_not_its_hull() {
        // A 45°-rotated square becomes a diamond: the square's own corners
        // fall outside it, while its rotated vertices reach past the box
        let region = TextRegion::new([20.0, 20.0, 60.0, 60.0], 45.0);
        let mask = build_mask(80, 80, &[region]);

        // Center is inside
        assert_eq!(mask.get_pixel(40, 40)[0], 255);
        // The unrotated corner is not: an axis-aligned fill would erase it
        assert_eq!(mask.get_pixel(21, 21)[0], 0);
        let axis = build_mask(80, 80, &[TextRegion::new([20.0, 20.0, 60.0, 60.0], 0.0)]);
        assert_eq!(axis.get_pixel(21, 21)[0], 255);
        // The rotated vertex extends below the original box edge
        assert_eq!(mask.get_pixel(40, 65)[0], 255);
        assert_eq!(axis.get_pixel(40, 65)[0], 0);
    }

    #[test]
    fn test_mask_is_deterministic() {
        let regions = vec![
            TextRegion::new([5.0, 5.0, 30.0, 20.0], 15.0),
            TextRegion::new([40.0, 30.0, 70.0, 55.0], 0.0),
        ];
        let a = build_mask(80, 60, &regions);
        let b = build_mask(80, 60, &regions);
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_boxes_are_clamped_to_image_bounds() {
        let region = TextRegion::new([-10.0, -10.0, 200.0, 200.0], 0.0);
        let mask = build_mask(32, 24, &[region]);
        assert_eq!(count_remove(&mask), 32 * 24);
    }
}
