//! Drawing detection results onto frames.

use crate::types::Region;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

/// Outline colour for detected smiles.
pub const SMILE_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
/// Outline thickness in pixels.
pub const SMILE_BOX_THICKNESS: u32 = 2;

/// Draw a 2 px green outline around `region`, growing inwards.
pub fn draw_smile_box(image: &mut RgbImage, region: &Region) {
    for inset in 0..SMILE_BOX_THICKNESS {
        let w = region.width.saturating_sub(2 * inset);
        let h = region.height.saturating_sub(2 * inset);
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at((region.x + inset) as i32, (region.y + inset) as i32).of_size(w, h);
        draw_hollow_rect_mut(image, rect, SMILE_BOX_COLOR);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outline_is_two_pixels() {
        let mut img = RgbImage::new(50, 50);
        draw_smile_box(&mut img, &Region::new(10, 10, 20, 20));

        assert_eq!(*img.get_pixel(10, 10), SMILE_BOX_COLOR);
        assert_eq!(*img.get_pixel(11, 15), SMILE_BOX_COLOR);
        assert_eq!(*img.get_pixel(29, 29), SMILE_BOX_COLOR);
        assert_eq!(*img.get_pixel(28, 20), SMILE_BOX_COLOR);
        // Interior and exterior untouched.
        assert_eq!(*img.get_pixel(15, 15), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(9, 10), Rgb([0, 0, 0]));
        assert_eq!(*img.get_pixel(30, 30), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_empty_region_draws_nothing() {
        let mut img = RgbImage::new(10, 10);
        draw_smile_box(&mut img, &Region::new(2, 2, 0, 5));
        assert!(img.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_box_past_edge_is_clipped() {
        let mut img = RgbImage::new(20, 20);
        draw_smile_box(&mut img, &Region::new(15, 15, 10, 10));
        assert_eq!(*img.get_pixel(15, 15), SMILE_BOX_COLOR);
        assert_eq!(*img.get_pixel(16, 19), SMILE_BOX_COLOR);
    }
}
