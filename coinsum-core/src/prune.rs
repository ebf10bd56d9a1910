//! Connected-component pruning of binarized relief patches.
//!
//! After thresholding, a patch holds the coin's embossed relief plus spurious
//! rim and edge noise. Each background-colored (0) blob is flood-traversed
//! with an explicit stack, measured by its bounding box, and either kept
//! (recolored to the fill color) or erased to white when it is implausibly
//! small, implausibly large, or hugging the patch border.

use image::{GrayImage, Luma};
use log::trace;

use coinsum_utils::config::PrunerSettings;
use coinsum_utils::{invert, threshold_inv};

const BACKGROUND: u8 = 0;
const WHITE: u8 = 255;

/// Bounding box and membership of one flood-traversed blob.
#[derive(Debug)]
struct Blob {
    pixels: Vec<(u32, u32)>,
    min_row: u32,
    max_row: u32,
    min_col: u32,
    max_col: u32,
}

impl Blob {
    fn new(row: u32, col: u32) -> Self {
        Self {
            pixels: vec![(row, col)],
            min_row: row,
            max_row: row,
            min_col: col,
            max_col: col,
        }
    }

    fn admit(&mut self, row: u32, col: u32) {
        self.min_row = self.min_row.min(row);
        self.max_row = self.max_row.max(row);
        self.min_col = self.min_col.min(col);
        self.max_col = self.max_col.max(col);
        self.pixels.push((row, col));
    }

    /// Bounding-box area as the original heuristics measure it: extent
    /// differences, so a single-pixel blob has zero area.
    fn area(&self) -> u64 {
        let width = (self.max_col - self.min_col) as u64;
        let height = (self.max_row - self.min_row) as u64;
        width * height
    }

    fn touches_margin(&self, frame_w: u32, frame_h: u32, margin: u32) -> bool {
        self.min_col < margin
            || self.max_col > frame_w.saturating_sub(margin)
            || self.min_row < margin
            || self.max_row > frame_h.saturating_sub(margin)
    }
}

/// First background pixel in row-major order.
///
/// The scan terminates on reaching the last row, so blobs are never seeded
/// from it; a patch whose only background pixels sit on the last row counts
/// as fully pruned.
fn find_seed(img: &GrayImage) -> Option<(u32, u32)> {
    let (w, h) = img.dimensions();
    for row in 0..h.saturating_sub(1) {
        for col in 0..w {
            if img.get_pixel(col, row).0[0] == BACKGROUND {
                return Some((row, col));
            }
        }
    }
    None
}

/// Flood the blob containing `seed`, recoloring members to `fill`.
///
/// Strict 4-connectivity with an explicit stack; recursion would overflow on
/// blobs tens of thousands of pixels deep.
fn flood(img: &mut GrayImage, seed: (u32, u32), fill: u8) -> Blob {
    let (w, h) = img.dimensions();
    let mut blob = Blob::new(seed.0, seed.1);
    let mut stack = vec![seed];

    while let Some((row, col)) = stack.pop() {
        img.put_pixel(col, row, Luma([fill]));
        for (dr, dc) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
            let nr = row as i64 + dr;
            let nc = col as i64 + dc;
            if nr < 0 || nc < 0 || nr >= h as i64 || nc >= w as i64 {
                continue;
            }
            let (nr, nc) = (nr as u32, nc as u32);
            if img.get_pixel(nc, nr).0[0] == BACKGROUND {
                blob.admit(nr, nc);
                stack.push((nr, nc));
            }
        }
    }

    blob
}

/// One pruning step: find, measure, and keep or erase a single blob.
///
/// Returns `None` when no background pixel remains — the caller's signal that
/// pruning is complete, not an error.
pub fn prune_pass(img: &GrayImage, settings: &PrunerSettings) -> Option<GrayImage> {
    let seed = find_seed(img)?;
    let mut out = img.clone();
    let blob = flood(&mut out, seed, settings.fill_color);

    let (w, h) = out.dimensions();
    let frame_area = (w as u64) * (h as u64);
    let area = blob.area() as f64;
    let noise = area < settings.min_area_fraction * frame_area as f64
        || area > settings.max_area_fraction * frame_area as f64
        || blob.touches_margin(w, h, settings.border_margin);

    if noise {
        trace!(
            "erasing blob: bbox area {} of frame {}, rows {}..{}, cols {}..{}",
            blob.area(),
            frame_area,
            blob.min_row,
            blob.max_row,
            blob.min_col,
            blob.max_col
        );
        for &(row, col) in &blob.pixels {
            out.put_pixel(col, row, Luma([WHITE]));
        }
    }

    Some(out)
}

/// Run [`prune_pass`] to exhaustion, returning the last non-empty result.
///
/// An all-foreground input terminates immediately and comes back untouched.
pub fn prune(img: &GrayImage, settings: &PrunerSettings) -> GrayImage {
    let mut last = img.clone();
    while let Some(next) = prune_pass(&last, settings) {
        last = next;
    }
    last
}

/// Prune both photometric polarities and merge the accepted-blob masks.
///
/// Each polarity result is re-thresholded at the merge cutoff (fill-colored
/// blobs become white, everything else black) and the two masks are combined
/// additively with doubling, saturating at white. This recovers relief detail
/// whether the embossed numeral landed as foreground or background after
/// thresholding.
pub fn prune_dual(img: &GrayImage, settings: &PrunerSettings) -> GrayImage {
    let normal = prune(img, settings);
    let inverted = prune(&invert(img), settings);

    let mask_a = threshold_inv(&normal, settings.merge_cutoff);
    let mask_b = threshold_inv(&inverted, settings.merge_cutoff);

    let mut out = GrayImage::new(img.width(), img.height());
    for ((a, b), dst) in mask_a.pixels().zip(mask_b.pixels()).zip(out.pixels_mut()) {
        dst.0[0] = a.0[0].saturating_add(b.0[0]).saturating_mul(2);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinsum_utils::count_value;
    use coinsum_utils::fixtures::{blob_canvas, flat};

    fn settings() -> PrunerSettings {
        PrunerSettings::default()
    }

    #[test]
    fn all_foreground_patch_terminates_immediately() {
        let img = flat(40, 40, 255);
        assert!(prune_pass(&img, &settings()).is_none());
        assert_eq!(prune(&img, &settings()), img);
    }

    #[test]
    fn last_row_never_seeds_a_blob() {
        let mut img = flat(20, 20, 255);
        img.put_pixel(5, 19, Luma([0]));
        assert!(prune_pass(&img, &settings()).is_none());
    }

    #[test]
    fn border_blobs_are_erased_regardless_of_area() {
        // 30x30 blob at (1, 1): min_col = 1 < 3.
        let img = blob_canvas(100, 100, 255, &[(1, 1, 30, 30, 0)]);
        let out = prune(&img, &settings());
        assert_eq!(count_value(&out, 0), 0);
        assert_eq!(count_value(&out, settings().fill_color), 0);
        assert_eq!(count_value(&out, 255), 100 * 100);
    }

    #[test]
    fn blobs_just_below_the_minimum_area_are_erased() {
        // Extent area 83 * 3 = 249, one below 0.025 * 10000 = 250.
        let img = blob_canvas(100, 100, 255, &[(8, 40, 84, 4, 0)]);
        let out = prune(&img, &settings());
        assert_eq!(count_value(&out, settings().fill_color), 0);
        assert_eq!(count_value(&out, 255), 100 * 100);
    }

    #[test]
    fn blobs_just_above_the_minimum_area_are_kept_filled() {
        // Extent area 63 * 4 = 252, just above the minimum, well below the
        // maximum, clear of every border.
        let img = blob_canvas(100, 100, 255, &[(8, 40, 64, 5, 0)]);
        let out = prune(&img, &settings());
        assert_eq!(count_value(&out, settings().fill_color), 64 * 5);
        assert_eq!(count_value(&out, 0), 0);
    }

    #[test]
    fn oversized_blobs_are_erased() {
        // Extent area 59 * 59 = 3481 > 0.3 * 10000 = 3000.
        let img = blob_canvas(100, 100, 255, &[(20, 20, 60, 60, 0)]);
        let out = prune(&img, &settings());
        assert_eq!(count_value(&out, settings().fill_color), 0);
    }

    #[test]
    fn disjoint_blobs_are_judged_independently() {
        let img = blob_canvas(
            100,
            100,
            255,
            &[(10, 10, 21, 21, 0), (60, 60, 5, 5, 0)],
        );
        let out = prune(&img, &settings());
        // The large blob is kept, the tiny one erased.
        assert_eq!(count_value(&out, settings().fill_color), 21 * 21);
        assert_eq!(count_value(&out, 0), 0);
    }

    #[test]
    fn repruning_cleaned_output_changes_nothing() {
        let img = blob_canvas(
            100,
            100,
            255,
            &[(10, 10, 21, 21, 0), (50, 50, 30, 8, 0), (90, 4, 6, 6, 0)],
        );

        let once = prune(&img, &settings());
        assert_eq!(prune(&once, &settings()), once);

        let inverted_once = prune(&invert(&img), &settings());
        assert_eq!(prune(&inverted_once, &settings()), inverted_once);
    }

    #[test]
    fn dual_polarity_merge_is_white_where_either_mask_kept() {
        // One dark blob on white (kept by the normal pass) and one white blob
        // inside a dark field (kept by the inverted pass).
        let mut img = blob_canvas(120, 120, 255, &[(10, 10, 21, 21, 0)]);
        for y in 60..110 {
            for x in 60..110 {
                img.put_pixel(x, y, Luma([0]));
            }
        }
        for y in 75..96 {
            for x in 75..96 {
                img.put_pixel(x, y, Luma([255]));
            }
        }

        let out = prune_dual(&img, &settings());
        assert!(out.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        // The dark blob from the normal polarity survives in the merged mask.
        assert_eq!(out.get_pixel(20, 20).0[0], 255);
        // The enclosed white blob survives through the inverted polarity.
        assert_eq!(out.get_pixel(85, 85).0[0], 255);
        // Flat background belongs to neither mask.
        assert_eq!(out.get_pixel(45, 45).0[0], 0);
    }
}
