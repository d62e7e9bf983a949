// ============================================================================
// FILTERS — neighbourhood kernels (Gaussian blur, sharpen)
// ============================================================================

use bytemuck::{Pod, Zeroable};
use image::RgbaImage;
use rayon::prelude::*;

pub const MIN_BLUR_RADIUS: u32 = 1;
pub const MAX_BLUR_RADIUS: u32 = 16;

/// Uniform block for the blur effect.  `radius` is already clamped.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurConstants {
    pub radius: u32,
}

impl BlurConstants {
    pub fn from_radius(radius: u32) -> Self {
        Self { radius: radius.clamp(MIN_BLUR_RADIUS, MAX_BLUR_RADIUS) }
    }
}

/// Uniform block for the sharpen effect.  `intensity` is saturated to 0..1.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct SharpenConstants {
    pub intensity: f32,
}

impl SharpenConstants {
    pub fn from_intensity(intensity: f32) -> Self {
        // NaN saturates to 0.
        let intensity = if intensity.is_nan() { 0.0 } else { intensity.clamp(0.0, 1.0) };
        Self { intensity }
    }
}

// ============================================================================
// GAUSSIAN BLUR
// ============================================================================

fn build_gaussian_kernel(radius: usize, sigma: f32) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let len = radius * 2 + 1;
    let s2 = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..len)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / s2).exp()
        })
        .collect();
    let inv = 1.0 / kernel.iter().sum::<f32>();
    for v in &mut kernel {
        *v *= inv;
    }
    kernel
}

/// Separable Gaussian blur with clamp-to-edge addressing.  The kernel spans
/// `radius` texels each side with sigma = radius / 3.
pub fn gaussian_blur(src: &RgbaImage, constants: &BlurConstants) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let radius = constants.radius.clamp(MIN_BLUR_RADIUS, MAX_BLUR_RADIUS) as usize;
    let sigma = (radius as f32 / 3.0).max(0.5);
    let kernel = build_gaussian_kernel(radius, sigma);
    let buf_in: Vec<f32> = src.as_raw().iter().map(|&b| b as f32).collect();
    let stride = w * 4;

    // --- Horizontal pass (parallel by row) ---
    let mut buf_h = vec![0.0f32; w * h * 4];
    buf_h.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let row_in = &buf_in[y * stride..(y + 1) * stride];
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sx = (x as isize + ki as isize - radius as isize).clamp(0, w as isize - 1) as usize;
                for c in 0..4 {
                    acc[c] += row_in[sx * 4 + c] * kv;
                }
            }
            row_out[x * 4..x * 4 + 4].copy_from_slice(&acc);
        }
    });

    // --- Vertical pass (parallel by row) ---
    let mut out = RgbaImage::new(src.width(), src.height());
    let dst_raw: &mut [u8] = &mut out;
    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        for x in 0..w {
            let mut acc = [0.0f32; 4];
            for (ki, &kv) in kernel.iter().enumerate() {
                let sy = (y as isize + ki as isize - radius as isize).clamp(0, h as isize - 1) as usize;
                let idx = sy * stride + x * 4;
                for c in 0..4 {
                    acc[c] += buf_h[idx + c] * kv;
                }
            }
            for c in 0..4 {
                row_out[x * 4 + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    });
    out
}

// ============================================================================
// SHARPEN
// ============================================================================

/// Laplacian sharpen on the colour channels: `c + k * (4c - N - S - E - W)`,
/// clamp-to-edge; alpha is left untouched.
pub fn sharpen(src: &RgbaImage, constants: &SharpenConstants) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }

    let k = constants.intensity.clamp(0.0, 1.0);
    let stride = w * 4;
    let src_raw = src.as_raw();
    let at = |x: isize, y: isize, c: usize| -> f32 {
        let x = x.clamp(0, w as isize - 1) as usize;
        let y = y.clamp(0, h as isize - 1) as usize;
        src_raw[y * stride + x * 4 + c] as f32
    };

    let mut out = RgbaImage::new(src.width(), src.height());
    let dst_raw: &mut [u8] = &mut out;
    dst_raw.par_chunks_mut(stride).enumerate().for_each(|(y, row_out)| {
        let y = y as isize;
        for x in 0..w as isize {
            let pi = x as usize * 4;
            for c in 0..3 {
                let center = at(x, y, c);
                let edges = at(x, y - 1, c) + at(x, y + 1, c) + at(x - 1, y, c) + at(x + 1, y, c);
                let v = center + k * (4.0 * center - edges);
                row_out[pi + c] = v.round().clamp(0.0, 255.0) as u8;
            }
            row_out[pi + 3] = src_raw[y as usize * stride + pi + 3];
        }
    });
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn blur_radius_is_clamped() {
        assert_eq!(BlurConstants::from_radius(0).radius, 1);
        assert_eq!(BlurConstants::from_radius(200).radius, 16);
        assert_eq!(BlurConstants::from_radius(8).radius, 8);
    }

    #[test]
    fn sharpen_intensity_is_saturated() {
        assert_eq!(SharpenConstants::from_intensity(-3.0).intensity, 0.0);
        assert_eq!(SharpenConstants::from_intensity(2.5).intensity, 1.0);
        assert_eq!(SharpenConstants::from_intensity(f32::NAN).intensity, 0.0);
    }

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        let k = build_gaussian_kernel(5, 5.0 / 3.0);
        assert_eq!(k.len(), 11);
        assert!((k.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert!((k[0] - k[10]).abs() < 1e-7);
    }

    #[test]
    fn blur_of_flat_image_is_unchanged() {
        let img = RgbaImage::from_pixel(9, 7, Rgba([200, 40, 90, 255]));
        let out = gaussian_blur(&img, &BlurConstants::from_radius(4));
        assert_eq!(out, img);
    }

    #[test]
    fn blur_spreads_a_single_bright_pixel() {
        let mut img = RgbaImage::from_pixel(9, 9, Rgba([0, 0, 0, 255]));
        img.put_pixel(4, 4, Rgba([255, 255, 255, 255]));
        let out = gaussian_blur(&img, &BlurConstants::from_radius(3));
        assert!(out.get_pixel(4, 4)[0] < 255);
        assert!(out.get_pixel(5, 4)[0] > 0);
    }

    #[test]
    fn sharpen_with_zero_intensity_is_identity() {
        let mut img = RgbaImage::new(4, 4);
        img.put_pixel(1, 2, Rgba([90, 10, 250, 128]));
        let out = sharpen(&img, &SharpenConstants::from_intensity(0.0));
        assert_eq!(out, img);
    }

    #[test]
    fn sharpen_increases_local_contrast() {
        let mut img = RgbaImage::from_pixel(3, 3, Rgba([100, 100, 100, 255]));
        img.put_pixel(1, 1, Rgba([140, 140, 140, 255]));
        let out = sharpen(&img, &SharpenConstants::from_intensity(1.0));
        assert!(out.get_pixel(1, 1)[0] > 140);
        assert!(out.get_pixel(1, 0)[0] < 100);
        assert_eq!(out.get_pixel(1, 1)[3], 255);
    }
}
