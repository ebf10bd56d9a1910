//! Image loading and raster helpers shared across the workspace.
//!
//! Everything here operates on 8-bit single-channel buffers; the pipeline
//! converts to grayscale once and stays there.

use std::path::Path;

use anyhow::{Context, Result};
use image::{imageops, imageops::FilterType, DynamicImage, GrayImage, Luma};

/// Load an image from disk into memory.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    image::open(path).with_context(|| format!("failed to open image {}", path.display()))
}

/// Convert any dynamic image to an 8-bit grayscale buffer.
pub fn to_gray(image: &DynamicImage) -> GrayImage {
    image.to_luma8()
}

/// Uniform scale factor that fits `original` inside `reference` dimensions.
///
/// Both axes shrink (or grow) by the same factor, chosen so that neither
/// reference dimension is exceeded.
pub fn uniform_scale(original: (u32, u32), reference: (u32, u32)) -> Result<f64> {
    let (w, h) = original;
    let (ref_w, ref_h) = reference;
    anyhow::ensure!(w > 0 && h > 0, "source dimensions must be non-zero");
    anyhow::ensure!(ref_w > 0 && ref_h > 0, "reference dimensions must be non-zero");
    Ok((ref_w as f64 / w as f64).min(ref_h as f64 / h as f64))
}

/// Resize a grayscale buffer with linear interpolation.
pub fn resize_gray(image: &GrayImage, width: u32, height: u32) -> GrayImage {
    imageops::resize(image, width.max(1), height.max(1), FilterType::Triangle)
}

/// Copy a rectangular window out of a grayscale buffer.
///
/// The window is clamped to the image bounds; a window that falls entirely
/// outside yields `None`.
pub fn crop_rect(image: &GrayImage, x: u32, y: u32, width: u32, height: u32) -> Option<GrayImage> {
    if x >= image.width() || y >= image.height() {
        return None;
    }
    let w = width.min(image.width() - x);
    let h = height.min(image.height() - y);
    if w == 0 || h == 0 {
        return None;
    }
    Some(imageops::crop_imm(image, x, y, w, h).to_image())
}

/// Photometric inversion: every sample becomes `255 - v`.
pub fn invert(image: &GrayImage) -> GrayImage {
    let mut out = image.clone();
    for px in out.pixels_mut() {
        px.0[0] = 255 - px.0[0];
    }
    out
}

/// Inverted binary threshold: samples above `cutoff` become 0, the rest 255.
pub fn threshold_inv(image: &GrayImage, cutoff: u8) -> GrayImage {
    let mut out = GrayImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        dst.0[0] = if src.0[0] > cutoff { 0 } else { 255 };
    }
    out
}

/// Drop fully-zero rows and columns from the borders of a patch.
///
/// Returns `None` when nothing non-zero remains.
pub fn trim_zero_borders(image: &GrayImage) -> Option<GrayImage> {
    let (w, h) = image.dimensions();
    let row_has_content = |y: u32| (0..w).any(|x| image.get_pixel(x, y).0[0] != 0);
    let col_has_content = |x: u32| (0..h).any(|y| image.get_pixel(x, y).0[0] != 0);

    let top = (0..h).find(|&y| row_has_content(y))?;
    let bottom = (0..h).rev().find(|&y| row_has_content(y))?;
    let left = (0..w).find(|&x| col_has_content(x))?;
    let right = (0..w).rev().find(|&x| col_has_content(x))?;

    crop_rect(image, left, top, right - left + 1, bottom - top + 1)
}

/// Keep only the interior band of a patch, given fractional row/column ranges.
///
/// `rows` and `cols` are half-open fractions of the patch height and width.
/// Returns `None` when the resulting window is empty.
pub fn interior_crop(image: &GrayImage, rows: (f32, f32), cols: (f32, f32)) -> Option<GrayImage> {
    let (w, h) = image.dimensions();
    let row_start = (rows.0 * h as f32) as u32;
    let row_end = ((rows.1 * h as f32) as u32).min(h);
    let col_start = (cols.0 * w as f32) as u32;
    let col_end = ((cols.1 * w as f32) as u32).min(w);
    if row_end <= row_start || col_end <= col_start {
        return None;
    }
    crop_rect(image, col_start, row_start, col_end - col_start, row_end - row_start)
}

/// Count samples equal to `value`.
pub fn count_value(image: &GrayImage, value: u8) -> usize {
    image.pixels().filter(|p| p.0[0] == value).count()
}

/// Build a grayscale buffer from a closure over `(x, y)`.
pub fn gray_from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| Luma([f(x, y)]))
}
