//! Ellipse segmentation: locate the coin boundary inside a candidate patch.
//!
//! The patch is blurred, adaptively thresholded, and morphologically closed;
//! external contours that enclose enough area are fitted with an ellipse.
//! Adaptive (locally weighted) thresholding is used because it tolerates the
//! uneven lighting across an embossed coin face far better than one global
//! cutoff.

use image::GrayImage;
use imageproc::contours::{BorderType, Contour, find_contours};
use imageproc::filter::gaussian_blur_f32;
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use log::debug;

use coinsum_utils::config::SegmenterSettings;

use crate::conic::fit_ellipse;
use crate::geometry::CoinEllipse;

/// Gaussian sigma implied by an odd kernel size when none is given
/// explicitly.
pub fn sigma_for_kernel(kernel: u32) -> f32 {
    0.3 * ((kernel.max(1) - 1) as f32 * 0.5 - 1.0) + 0.8
}

/// Adaptive inverted-binary threshold against a Gaussian-weighted local mean.
///
/// A sample brighter than its local mean minus `offset` maps to 0, everything
/// else to 255.
pub fn adaptive_threshold_inv(image: &GrayImage, block: u32, offset: f32) -> GrayImage {
    let local_mean = gaussian_blur_f32(image, sigma_for_kernel(block));
    let mut out = GrayImage::new(image.width(), image.height());
    for ((src, mean), dst) in image
        .pixels()
        .zip(local_mean.pixels())
        .zip(out.pixels_mut())
    {
        dst.0[0] = if src.0[0] as f32 > mean.0[0] as f32 - offset {
            0
        } else {
            255
        };
    }
    out
}

/// Enclosed area of a closed contour (shoelace formula).
pub fn contour_area(points: &[(f64, f64)]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0.0;
    for (i, &(x0, y0)) in points.iter().enumerate() {
        let (x1, y1) = points[(i + 1) % points.len()];
        twice_area += x0 * y1 - x1 * y0;
    }
    0.5 * twice_area.abs()
}

/// Gate applied to every external contour before fitting.
pub fn contour_qualifies(area: f64, point_count: usize, settings: &SegmenterSettings) -> bool {
    area >= settings.min_contour_area && point_count >= settings.min_contour_points
}

/// Segments coin boundaries out of grayscale patches.
#[derive(Debug, Clone)]
pub struct EllipseSegmenter {
    settings: SegmenterSettings,
}

impl EllipseSegmenter {
    /// Construct a segmenter from its settings.
    pub fn new(settings: SegmenterSettings) -> Self {
        Self { settings }
    }

    /// Access the segmentation settings.
    pub fn settings(&self) -> &SegmenterSettings {
        &self.settings
    }

    /// Blur and adaptively binarize a patch (the front half of [`segment`]).
    ///
    /// Exposed because the orchestrator applies the same binarization to the
    /// edge map it feeds the pruner.
    ///
    /// [`segment`]: EllipseSegmenter::segment
    pub fn adaptive_binarize(&self, patch: &GrayImage) -> GrayImage {
        let blurred = gaussian_blur_f32(patch, sigma_for_kernel(self.settings.blur_kernel));
        adaptive_threshold_inv(
            &blurred,
            self.settings.threshold_block,
            self.settings.threshold_offset,
        )
    }

    /// Find coin-boundary ellipses in a grayscale patch.
    ///
    /// Contours below the area or point-count gate are skipped silently, as
    /// are contours the fitter rejects; an empty result is not an error.
    pub fn segment(&self, patch: &GrayImage) -> Vec<CoinEllipse> {
        let binary = self.adaptive_binarize(patch);
        let closed = close(&binary, Norm::LInf, self.settings.closing_iterations);
        self.ellipses_from_binary(&closed)
    }

    /// Fit ellipses to the external contours of an already-binarized patch.
    pub fn ellipses_from_binary(&self, binary: &GrayImage) -> Vec<CoinEllipse> {
        let contours: Vec<Contour<i32>> = find_contours(binary);
        let mut ellipses = Vec::new();

        for contour in contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer && c.parent.is_none())
        {
            let points: Vec<(f64, f64)> = contour
                .points
                .iter()
                .map(|p| (p.x as f64, p.y as f64))
                .collect();
            let area = contour_area(&points);
            if !contour_qualifies(area, points.len(), &self.settings) {
                debug!(
                    "skipping contour: area {:.0} px^2, {} points",
                    area,
                    points.len()
                );
                continue;
            }

            let samples: Vec<[f64; 2]> = points.iter().map(|&(x, y)| [x, y]).collect();
            match fit_ellipse(&samples) {
                Ok(ellipse) => ellipses.push(ellipse),
                Err(err) => debug!("ellipse fit rejected a contour: {err}"),
            }
        }

        ellipses
    }
}

/// Crop a patch to an ellipse's masking window and whiten everything outside
/// the ellipse boundary.
///
/// Returns `None` when the clamped window is empty.
pub fn crop_to_ellipse(patch: &GrayImage, ellipse: &CoinEllipse) -> Option<GrayImage> {
    let rect = ellipse.mask_rect(patch.width(), patch.height());
    let left = rect.left as u32;
    let top = rect.top as u32;
    let width = (rect.right as u32).saturating_sub(left);
    let height = (rect.bottom as u32).saturating_sub(top);

    let mut window = coinsum_utils::crop_rect(patch, left, top, width, height)?;
    for i in 0..window.height() {
        for j in 0..window.width() {
            let row_offset = i as f64 - rect.offset_y;
            let col_offset = j as f64 - rect.offset_x;
            if ellipse.boundary_form(row_offset, col_offset) > 1.0 {
                window.put_pixel(j, i, image::Luma([255]));
            }
        }
    }
    Some(window)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinsum_utils::fixtures;

    fn segmenter() -> EllipseSegmenter {
        EllipseSegmenter::new(SegmenterSettings::default())
    }

    #[test]
    fn kernel_sigma_matches_known_values() {
        assert!((sigma_for_kernel(15) - 2.6).abs() < 1e-6);
        assert!((sigma_for_kernel(11) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn contour_gate_is_sharp_at_the_area_threshold() {
        let settings = SegmenterSettings::default();
        assert!(!contour_qualifies(4999.0, 100, &settings));
        assert!(contour_qualifies(5001.0, 100, &settings));
        assert!(contour_qualifies(5000.0, 5, &settings));
        assert!(!contour_qualifies(5001.0, 4, &settings));
    }

    #[test]
    fn shoelace_area_of_a_unit_square() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert_eq!(contour_area(&square), 100.0);
        assert_eq!(contour_area(&square[..2]), 0.0);
    }

    #[test]
    fn small_contours_produce_no_ellipse() {
        // 70x70 foreground block: boundary area 69 * 69 = 4761 < 5000.
        let img = fixtures::blob_canvas(200, 200, 0, &[(40, 40, 70, 70, 255)]);
        assert!(segmenter().ellipses_from_binary(&img).is_empty());
    }

    #[test]
    fn large_contours_produce_exactly_one_ellipse() {
        // 80x75 foreground block: boundary area 79 * 74 = 5846 >= 5000.
        let img = fixtures::blob_canvas(200, 200, 0, &[(40, 40, 80, 75, 255)]);
        assert_eq!(segmenter().ellipses_from_binary(&img).len(), 1);
    }

    #[test]
    fn binary_disk_fits_a_centered_circle() {
        let img = fixtures::disk(140, 140, 70.0, 70.0, 45.0, 0, 255);
        let ellipses = segmenter().ellipses_from_binary(&img);
        assert_eq!(ellipses.len(), 1);
        let e = &ellipses[0];
        assert!((e.cx - 70.0).abs() < 3.0, "cx = {}", e.cx);
        assert!((e.cy - 70.0).abs() < 3.0, "cy = {}", e.cy);
        assert!((e.major - 90.0).abs() < 8.0, "major = {}", e.major);
        assert!((e.minor - 90.0).abs() < 8.0, "minor = {}", e.minor);
    }

    #[test]
    fn adaptive_threshold_flags_the_dark_side_of_an_edge() {
        let img = coinsum_utils::gray_from_fn(64, 16, |x, _| if x < 32 { 50 } else { 200 });
        let out = adaptive_threshold_inv(&img, 11, 1.0);
        // Far from the step the sample equals its local mean, which is above
        // mean - offset, so the output is 0.
        assert_eq!(out.get_pixel(4, 8).0[0], 0);
        assert_eq!(out.get_pixel(60, 8).0[0], 0);
        // Just left of the step the local mean is pulled up by the bright
        // side, so the dark sample drops below it.
        assert_eq!(out.get_pixel(30, 8).0[0], 255);
    }

    #[test]
    fn gray_disk_segments_to_one_boundary_ellipse() {
        let img = fixtures::disk(150, 150, 75.0, 75.0, 50.0, 40, 210);
        let ellipses = segmenter().segment(&img);
        assert_eq!(ellipses.len(), 1);
        let e = &ellipses[0];
        assert!((e.cx - 75.0).abs() < 6.0, "cx = {}", e.cx);
        assert!((e.cy - 75.0).abs() < 6.0, "cy = {}", e.cy);
        assert!(e.major >= 95.0 && e.major <= 135.0, "major = {}", e.major);
    }

    #[test]
    fn mask_whitens_everything_outside_the_ellipse() {
        let patch = fixtures::flat(120, 120, 100);
        let ellipse = CoinEllipse {
            cx: 60.0,
            cy: 60.0,
            major: 80.0,
            minor: 50.0,
            angle_deg: 25.0,
        };
        let masked = crop_to_ellipse(&patch, &ellipse).expect("window");
        let rect = ellipse.mask_rect(120, 120);

        for i in 0..masked.height() {
            for j in 0..masked.width() {
                let form = ellipse
                    .boundary_form(i as f64 - rect.offset_y, j as f64 - rect.offset_x);
                let px = masked.get_pixel(j, i).0[0];
                if form > 1.0 {
                    assert_eq!(px, 255, "outside pixel ({i}, {j}) must be white");
                } else {
                    assert_eq!(px, 100, "inside pixel ({i}, {j}) must be untouched");
                }
            }
        }
    }

    #[test]
    fn crop_to_ellipse_rejects_empty_windows() {
        let patch = fixtures::flat(50, 50, 10);
        let ellipse = CoinEllipse {
            cx: -200.0,
            cy: -200.0,
            major: 10.0,
            minor: 10.0,
            angle_deg: 0.0,
        };
        assert!(crop_to_ellipse(&patch, &ellipse).is_none());
    }
}
