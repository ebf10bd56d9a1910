//! Fixed-length numeric descriptors of a cleaned relief patch.
//!
//! Three families are concatenated in a fixed order the downstream classifier
//! was trained on: two directional-contrast values, nineteen diagonal-sum
//! values, and eighty-one histogram bins. The patch is first normalized to a
//! 60x90 canvas so every descriptor sees the same geometry.

use image::GrayImage;

use coinsum_utils::config::FeatureSettings;
use coinsum_utils::resize_gray;

/// Descriptor length the classifier artifact is trained against.
pub const FEATURE_LEN: usize = 102;

/// Computes the concatenated feature vector for cleaned patches.
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    settings: FeatureSettings,
}

impl FeatureExtractor {
    /// Construct an extractor from its canvas settings.
    pub fn new(settings: FeatureSettings) -> Self {
        Self { settings }
    }

    /// Descriptor length implied by the configured canvas geometry.
    ///
    /// With the default settings this is [`FEATURE_LEN`]; the classifier
    /// backend treats any other value as a fatal configuration error.
    pub fn expected_len(&self) -> usize {
        let diag = 2 * self.settings.grid_step as usize - 1;
        2 + diag + 9 * self.settings.hist_bins
    }

    /// Compute the full descriptor: `[haar1, haar2] ++ diag ++ hist`.
    pub fn extract(&self, patch: &GrayImage) -> Vec<f32> {
        let canvas = self.canvas(patch);
        let (haar1, haar2) = directional_contrast(&canvas);

        let mut features = Vec::with_capacity(self.expected_len());
        features.push(haar1);
        features.push(haar2);
        features.extend(self.diagonal_descriptor(&canvas));
        features.extend(self.histogram_descriptor(&canvas));
        debug_assert_eq!(features.len(), self.expected_len());
        features
    }

    /// Mean intensity of every `grid_step`-sized cell, row-major.
    ///
    /// Companion to the diagonal descriptor; not part of the classifier
    /// layout.
    pub fn cell_means(&self, patch: &GrayImage) -> Vec<f32> {
        let canvas = self.canvas(patch);
        let step = self.settings.grid_step;
        let mut means = Vec::new();
        for cell_y in (0..canvas.height()).step_by(step as usize) {
            for cell_x in (0..canvas.width()).step_by(step as usize) {
                let mut sum = 0.0f64;
                for y in cell_y..(cell_y + step).min(canvas.height()) {
                    for x in cell_x..(cell_x + step).min(canvas.width()) {
                        sum += canvas.get_pixel(x, y).0[0] as f64;
                    }
                }
                let count = (step * step) as f64;
                means.push((sum / count) as f32);
            }
        }
        means
    }

    fn canvas(&self, patch: &GrayImage) -> GrayImage {
        resize_gray(patch, self.settings.canvas_width, self.settings.canvas_height)
    }

    /// One scalar per anti-diagonal bucket, accumulated across every grid
    /// cell.
    ///
    /// Each cell contributes its 19 per-diagonal averages to a fixed array of
    /// growable accumulators shared across cells; the descriptor is the mean
    /// of each accumulator. The length stays at `2 * step - 1` no matter how
    /// many cells the canvas holds.
    fn diagonal_descriptor(&self, canvas: &GrayImage) -> Vec<f32> {
        let step = self.settings.grid_step;
        let buckets = 2 * step as usize - 1;
        let mut accumulators: Vec<Vec<f64>> = vec![Vec::new(); buckets];

        for cell_y in (0..canvas.height()).step_by(step as usize) {
            for cell_x in (0..canvas.width()).step_by(step as usize) {
                let mut sums = vec![0.0f64; buckets];
                let mut counts = vec![0u32; buckets];
                for i in 0..step.min(canvas.height() - cell_y) {
                    for j in 0..step.min(canvas.width() - cell_x) {
                        let px = canvas.get_pixel(cell_x + j, cell_y + i).0[0];
                        let k = (i + j) as usize;
                        sums[k] += px as f64;
                        counts[k] += 1;
                    }
                }
                for k in 0..buckets {
                    if counts[k] > 0 {
                        accumulators[k].push(sums[k] / counts[k] as f64);
                    }
                }
            }
        }

        accumulators
            .into_iter()
            .map(|bucket| {
                if bucket.is_empty() {
                    0.0
                } else {
                    (bucket.iter().sum::<f64>() / bucket.len() as f64) as f32
                }
            })
            .collect()
    }

    /// Per-cell intensity histograms over a 3x3 partition of the canvas.
    ///
    /// Bins cover `[0, 256)` uniformly; values are raw pixel counts, in
    /// cell-then-bin order.
    fn histogram_descriptor(&self, canvas: &GrayImage) -> Vec<f32> {
        let bins = self.settings.hist_bins;
        let cell_w = canvas.width() / 3;
        let cell_h = canvas.height() / 3;
        let mut features = Vec::with_capacity(9 * bins);

        for gy in 0..3 {
            for gx in 0..3 {
                let mut counts = vec![0u32; bins];
                for y in (gy * cell_h)..((gy + 1) * cell_h) {
                    for x in (gx * cell_w)..((gx + 1) * cell_w) {
                        let px = canvas.get_pixel(x, y).0[0] as usize;
                        counts[px * bins / 256] += 1;
                    }
                }
                features.extend(counts.into_iter().map(|c| c as f32));
            }
        }

        features
    }
}

/// Right-half mean minus left-half mean, for the top and bottom halves.
fn directional_contrast(canvas: &GrayImage) -> (f32, f32) {
    let (w, h) = canvas.dimensions();
    let half_mean = |x0: u32, x1: u32, y0: u32, y1: u32| -> f64 {
        let mut sum = 0.0f64;
        let mut count = 0u64;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += canvas.get_pixel(x, y).0[0] as f64;
                count += 1;
            }
        }
        if count == 0 { 0.0 } else { sum / count as f64 }
    };

    let top = half_mean(w / 2, w, 0, h / 2) - half_mean(0, w / 2, 0, h / 2);
    let bottom = half_mean(w / 2, w, h / 2, h) - half_mean(0, w / 2, h / 2, h);
    (top as f32, bottom as f32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use coinsum_utils::fixtures::flat;
    use coinsum_utils::gray_from_fn;

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(FeatureSettings::default())
    }

    #[test]
    fn descriptor_has_exactly_102_elements() {
        let ex = extractor();
        assert_eq!(ex.expected_len(), FEATURE_LEN);

        let features = ex.extract(&flat(37, 81, 140));
        assert_eq!(features.len(), FEATURE_LEN);
        assert!(features.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn directional_contrast_stays_in_pixel_range() {
        let split = gray_from_fn(60, 90, |x, _| if x < 30 { 0 } else { 255 });
        let features = extractor().extract(&split);
        assert!(features[0] > 200.0 && features[0] <= 255.0);
        assert!(features[1] > 200.0 && features[1] <= 255.0);

        let reversed = gray_from_fn(60, 90, |x, _| if x < 30 { 255 } else { 0 });
        let features = extractor().extract(&reversed);
        assert!(features[0] < -200.0 && features[0] >= -255.0);
    }

    #[test]
    fn uniform_patch_yields_flat_descriptors() {
        let features = extractor().extract(&flat(60, 90, 90));
        // No left/right contrast anywhere.
        assert_eq!(features[0], 0.0);
        assert_eq!(features[1], 0.0);
        // Every diagonal bucket averages to the uniform value.
        for k in 0..19 {
            assert!((features[2 + k] - 90.0).abs() < 1.0, "bucket {k}");
        }
        // 90 * 9 / 256 = bin 3: each 20x30 cell puts all 600 samples there.
        for cell in 0..9 {
            for bin in 0..9 {
                let expected = if bin == 3 { 600.0 } else { 0.0 };
                assert_eq!(features[2 + 19 + cell * 9 + bin], expected);
            }
        }
    }

    #[test]
    fn histogram_bins_are_cell_major() {
        // Top-left 3x3 cell black, everything else white.
        let img = gray_from_fn(60, 90, |x, y| if x < 20 && y < 30 { 0 } else { 255 });
        let features = extractor().extract(&img);
        let hist = &features[2 + 19..];
        assert_eq!(hist.len(), 81);
        // First cell: all 600 samples in bin 0.
        assert_eq!(hist[0], 600.0);
        assert_eq!(hist[8], 0.0);
        // Last cell: all 600 samples in the top bin.
        assert_eq!(hist[8 * 9 + 8], 600.0);
        assert_eq!(hist[8 * 9], 0.0);
    }

    #[test]
    fn cell_means_cover_the_whole_grid() {
        let means = extractor().cell_means(&flat(60, 90, 33));
        assert_eq!(means.len(), 54);
        assert!(means.iter().all(|&m| (m - 33.0).abs() < 0.5));
    }

    #[test]
    fn extraction_is_deterministic() {
        let img = gray_from_fn(80, 100, |x, y| ((x * 7 + y * 13) % 251) as u8);
        let ex = extractor();
        assert_eq!(ex.extract(&img), ex.extract(&img));
    }
}
