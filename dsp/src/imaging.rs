//! Conversion of a spectrogram band into the canonical grayscale image the
//! classifier consumes.

use crate::spectrogram::Spectrogram;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Crop `spec` to `[min_hz, max_hz]`, min-max normalize, flip vertically so
/// low frequencies sit at the bottom, and resize bilinearly to
/// `width x height`. An empty crop yields an all-black image of the target
/// size.
pub fn spectrogram_image(
    spec: &Spectrogram,
    min_hz: f32,
    max_hz: f32,
    width: u32,
    height: u32,
) -> GrayImage {
    let band = spec.band_bins(min_hz, max_hz);
    let n_rows = band.len();
    let n_cols = spec.n_frames();
    if n_rows == 0 || n_cols == 0 {
        return GrayImage::new(width, height);
    }

    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for frame in 0..n_cols {
        for bin in band.clone() {
            let v = spec.value(frame, bin);
            min = min.min(v);
            max = max.max(v);
        }
    }
    let span = max - min;
    let denom = if span != 0.0 { span } else { 1.0 };

    let source = GrayImage::from_fn(n_cols as u32, n_rows as u32, |x, y| {
        // y = 0 is the top row of the image, i.e. the highest bin kept
        let bin = band.start + (n_rows - 1 - y as usize);
        let norm = (spec.value(x as usize, bin) - min) / denom;
        image::Luma([(norm * 255.0).round().clamp(0.0, 255.0) as u8])
    });
    imageops::resize(&source, width, height, FilterType::Triangle)
}

const SOBEL_SMOOTH: [f32; 7] = [1.0, 6.0, 15.0, 20.0, 15.0, 6.0, 1.0];
const SOBEL_DERIVE: [f32; 7] = [-1.0, -4.0, -5.0, 0.0, 5.0, 4.0, 1.0];

/// 7-tap vertical Sobel: horizontal binomial smoothing, vertical derivative,
/// then min-max renormalization back to `[0, 255]`. Edges are clamped.
pub fn sobel_vertical(img: &GrayImage) -> GrayImage {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return img.clone();
    }
    let w = width as i64;
    let h = height as i64;

    let sample = |x: i64, y: i64| -> f32 {
        let x = x.clamp(0, w - 1) as u32;
        let y = y.clamp(0, h - 1) as u32;
        img.get_pixel(x, y)[0] as f32
    };

    // horizontal smoothing pass
    let mut smoothed = vec![0.0f32; (width * height) as usize];
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, coef) in SOBEL_SMOOTH.iter().enumerate() {
                acc += coef * sample(x + k as i64 - 3, y);
            }
            smoothed[(y * w + x) as usize] = acc;
        }
    }

    // vertical derivative pass
    let row = |x: i64, y: i64| -> f32 { smoothed[(y.clamp(0, h - 1) * w + x) as usize] };
    let mut derived = vec![0.0f32; (width * height) as usize];
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, coef) in SOBEL_DERIVE.iter().enumerate() {
                acc += coef * row(x, y + k as i64 - 3);
            }
            derived[(y * w + x) as usize] = acc;
            min = min.min(acc);
            max = max.max(acc);
        }
    }

    let span = max - min;
    let denom = if span != 0.0 { span } else { 1.0 };
    GrayImage::from_fn(width, height, |x, y| {
        let v = (derived[(y as i64 * w + x as i64) as usize] - min) / denom;
        image::Luma([(v * 255.0).round().clamp(0.0, 255.0) as u8])
    })
}
