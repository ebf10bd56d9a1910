//! Procedural test images shared across the workspace.
//!
//! Tests build their inputs instead of loading binary assets: flat canvases,
//! filled disks standing in for coins, and rectangular blobs for exercising
//! the component pruner.

use image::{GrayImage, Luma};

/// A canvas filled with a single gray value.
pub fn flat(width: u32, height: u32, value: u8) -> GrayImage {
    GrayImage::from_pixel(width, height, Luma([value]))
}

/// A filled disk on a flat background.
pub fn disk(width: u32, height: u32, cx: f64, cy: f64, radius: f64, bg: u8, fg: u8) -> GrayImage {
    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        if dx * dx + dy * dy <= radius * radius {
            Luma([fg])
        } else {
            Luma([bg])
        }
    })
}

/// A coin-like disk carrying a dark embossed bar pattern.
///
/// `bars` controls how many horizontal relief bars cross the face, which is
/// enough structure for the descriptor families to produce distinct vectors.
pub fn embossed_coin(
    width: u32,
    height: u32,
    cx: f64,
    cy: f64,
    radius: f64,
    bars: u32,
) -> GrayImage {
    let spacing = (2.0 * radius / (bars + 1) as f64).max(1.0);
    GrayImage::from_fn(width, height, |x, y| {
        let dx = x as f64 - cx;
        let dy = y as f64 - cy;
        if dx * dx + dy * dy > radius * radius {
            return Luma([40]);
        }
        let offset = dy + radius;
        let band = (offset / spacing).floor() as i64;
        let in_bar = (offset % spacing) < spacing * 0.35 && band >= 1;
        if in_bar && dx.abs() < radius * 0.6 {
            Luma([70])
        } else {
            Luma([210])
        }
    })
}

/// A canvas of `bg` with axis-aligned rectangles painted over it.
pub fn blob_canvas(
    width: u32,
    height: u32,
    bg: u8,
    rects: &[(u32, u32, u32, u32, u8)],
) -> GrayImage {
    let mut img = flat(width, height, bg);
    for &(x, y, w, h, color) in rects {
        for yy in y..(y + h).min(height) {
            for xx in x..(x + w).min(width) {
                img.put_pixel(xx, yy, Luma([color]));
            }
        }
    }
    img
}
