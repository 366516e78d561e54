//! Key-color transparency codec.
//!
//! The rasterizer cannot express "let the video show through here", so the
//! snapshotter paints every such region with a reserved RGB value. This pass
//! turns that value back into transparency.
//!
//! The reserved value is assumed never to occur organically in ad imagery.
//! That is a probabilistic guarantee, not a hard one; a stray `(1, 2, 3)`
//! pixel in real content becomes a pinhole. Anti-aliased fringes of keyed
//! regions are blended colors and keep their partial opacity.

use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Reserved RGB value used as a transparency marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl KeyColor {
    pub const DEFAULT: KeyColor = KeyColor { r: 1, g: 2, b: 3 };

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// CSS color string for painting the key into the document.
    pub fn css(&self) -> String {
        format!("rgb({}, {}, {})", self.r, self.g, self.b)
    }

    /// Whether a pixel is a visible occurrence of the key color.
    #[inline]
    pub fn matches(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, a] = pixel.0;
        a > 0 && r == self.r && g == self.g && b == self.b
    }
}

impl Default for KeyColor {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<[u8; 3]> for KeyColor {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

/// Force every visible key-colored pixel to fully transparent.
///
/// RGB channels are left as captured so that a second pass finds nothing
/// to change. Returns the number of pixels punched.
pub fn punch_key_color(image: &mut RgbaImage, key: KeyColor) -> usize {
    let mut punched = 0usize;
    for pixel in image.pixels_mut() {
        if key.matches(pixel) {
            pixel.0[3] = 0;
            punched += 1;
        }
    }
    punched
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn image_from(pixels: &[[u8; 4]]) -> RgbaImage {
        let mut image = RgbaImage::new(pixels.len() as u32, 1);
        for (x, px) in pixels.iter().enumerate() {
            image.put_pixel(x as u32, 0, Rgba(*px));
        }
        image
    }

    #[test]
    fn test_punches_only_exact_matches() {
        let mut image = image_from(&[
            [1, 2, 3, 255],
            [1, 2, 4, 255],
            [1, 2, 3, 128],
            [1, 2, 3, 0],
            [200, 10, 10, 255],
        ]);
        let punched = punch_key_color(&mut image, KeyColor::DEFAULT);

        assert_eq!(punched, 2);
        assert_eq!(image.get_pixel(0, 0).0, [1, 2, 3, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [1, 2, 4, 255]);
        assert_eq!(image.get_pixel(2, 0).0, [1, 2, 3, 0]);
        assert_eq!(image.get_pixel(3, 0).0, [1, 2, 3, 0]);
        assert_eq!(image.get_pixel(4, 0).0, [200, 10, 10, 255]);
    }

    #[test]
    fn test_custom_key() {
        let key = KeyColor::from([0, 255, 0]);
        let mut image = image_from(&[[0, 255, 0, 255], [1, 2, 3, 255]]);
        assert_eq!(punch_key_color(&mut image, key), 1);
        assert_eq!(image.get_pixel(1, 0).0[3], 255);
        assert_eq!(key.css(), "rgb(0, 255, 0)");
    }

    #[test]
    fn test_punch_reports_each_key_pixel() {
        let mut image = image_from(&[[1, 2, 3, 255], [1, 2, 3, 255], [9, 9, 9, 255]]);
        assert_eq!(punch_key_color(&mut image, KeyColor::DEFAULT), 2);
        assert_eq!(punch_key_color(&mut image, KeyColor::DEFAULT), 0);
    }

    fn arb_pixel() -> impl Strategy<Value = [u8; 4]> {
        prop_oneof![
            any::<[u8; 4]>(),
            any::<u8>().prop_map(|a| [1, 2, 3, a]),
        ]
    }

    proptest! {
        #[test]
        fn prop_punch_is_idempotent(pixels in proptest::collection::vec(arb_pixel(), 1..256)) {
            let mut once = image_from(&pixels);
            punch_key_color(&mut once, KeyColor::DEFAULT);

            let mut twice = once.clone();
            let second = punch_key_color(&mut twice, KeyColor::DEFAULT);

            prop_assert_eq!(second, 0);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn prop_non_key_pixels_untouched(pixels in proptest::collection::vec(arb_pixel(), 1..256)) {
            let original = image_from(&pixels);
            let mut punched = original.clone();
            punch_key_color(&mut punched, KeyColor::DEFAULT);

            for (before, after) in original.pixels().zip(punched.pixels()) {
                if KeyColor::DEFAULT.matches(before) {
                    prop_assert_eq!(after.0, [1, 2, 3, 0]);
                } else {
                    prop_assert_eq!(before, after);
                }
            }
        }
    }
}
