// ============================================================================
// ADJUSTMENTS — per-pixel colour transforms (brightness / contrast / gamma)
// ============================================================================

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use rayon::prelude::*;

/// Uniform block for the brightness/contrast/gamma effect.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BrightnessContrastGammaConstants {
    pub brightness: f32,
    pub contrast: f32,
    pub gamma: f32,
    pub _pad: f32,
}

impl BrightnessContrastGammaConstants {
    pub fn new(brightness: f32, contrast: f32, gamma: f32) -> Self {
        Self { brightness, contrast, gamma, _pad: 0.0 }
    }
}

impl Default for BrightnessContrastGammaConstants {
    fn default() -> Self {
        Self::new(0.0, 1.0, 1.0)
    }
}

/// Lowest gamma accepted before the exponent blows up.
pub const MIN_GAMMA: f32 = 0.01;

/// Map every pixel of `src` through `transform` (channels in 0..1), in
/// parallel by row.
pub fn apply_pixel_transform<F>(src: &RgbaImage, transform: F) -> RgbaImage
where
    F: Fn(f32, f32, f32, f32) -> (f32, f32, f32, f32) + Sync,
{
    let w = src.width() as usize;
    let h = src.height() as usize;
    let mut out = RgbaImage::new(src.width(), src.height());
    if w == 0 || h == 0 {
        return out;
    }

    let stride = w * 4;
    let src_raw = src.as_raw();
    let dst_raw: &mut [u8] = &mut out;
    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &src_raw[y * stride..(y + 1) * stride];
        for x in 0..w {
            let pi = x * 4;
            let (nr, ng, nb, na) = transform(
                row_in[pi] as f32 / 255.0,
                row_in[pi + 1] as f32 / 255.0,
                row_in[pi + 2] as f32 / 255.0,
                row_in[pi + 3] as f32 / 255.0,
            );
            row_out[pi] = to_u8(nr);
            row_out[pi + 1] = to_u8(ng);
            row_out[pi + 2] = to_u8(nb);
            row_out[pi + 3] = to_u8(na);
        }
    });
    out
}

#[inline]
fn to_u8(v: f32) -> u8 {
    (v * 255.0).round().clamp(0.0, 255.0) as u8
}

/// `c' = clamp((c - 0.5) * contrast + 0.5 + brightness, 0, 1) ^ (1 / gamma)`
/// on the colour channels; alpha passes through.
pub fn brightness_contrast_gamma(src: &RgbaImage, c: &BrightnessContrastGammaConstants) -> RgbaImage {
    let contrast = c.contrast;
    let offset = 0.5 + c.brightness;
    let inv_gamma = 1.0 / c.gamma.max(MIN_GAMMA);
    let channel = move |v: f32| ((v - 0.5) * contrast + offset).clamp(0.0, 1.0).powf(inv_gamma);
    apply_pixel_transform(src, move |r, g, b, a| (channel(r), channel(g), channel(b), a))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn neutral_settings_are_identity() {
        let mut img = RgbaImage::new(3, 2);
        for (i, p) in img.pixels_mut().enumerate() {
            *p = Rgba([i as u8 * 40, 255 - i as u8 * 30, 7, 200]);
        }
        let out = brightness_contrast_gamma(&img, &BrightnessContrastGammaConstants::default());
        assert_eq!(out, img);
    }

    #[test]
    fn brightness_lifts_and_saturates() {
        let img = RgbaImage::from_pixel(1, 1, Rgba([128, 250, 0, 90]));
        let out = brightness_contrast_gamma(&img, &BrightnessContrastGammaConstants::new(0.5, 1.0, 1.0));
        let p = out.get_pixel(0, 0);
        assert_eq!(p[1], 255);
        assert_eq!(p[2], 128);
        assert_eq!(p[3], 90);
    }

    #[test]
    fn zero_contrast_flattens_to_mid_grey() {
        let img = RgbaImage::from_pixel(2, 2, Rgba([10, 200, 90, 255]));
        let out = brightness_contrast_gamma(&img, &BrightnessContrastGammaConstants::new(0.0, 0.0, 1.0));
        assert!(out.pixels().all(|p| p.0 == [128, 128, 128, 255]));
    }
}
