//! The end-to-end counting pipeline.
//!
//! Per candidate region: crop, edge-detect and binarize, segment the coin
//! boundary, mask to the ellipse window, trim and interior-crop, prune both
//! polarities, extract features, classify. Every reading's value joins the
//! running total; degenerate readings are dropped without aborting the run.

use anyhow::Result;
use image::{DynamicImage, GrayImage};
use imageproc::edges::canny;
use log::{Level, debug, info};

use coinsum_utils::config::{AppSettings, PipelineSettings, PrunerSettings};
use coinsum_utils::{crop_rect, interior_crop, threshold_inv, timing_guard, to_gray,
    trim_zero_borders};

use crate::classify::ValueClassifier;
use crate::detector::{BoxProposer, RegionDetector};
use crate::features::FeatureExtractor;
use crate::geometry::{CoinEllipse, Region};
use crate::prune::prune_dual;
use crate::segment::{EllipseSegmenter, crop_to_ellipse};

/// One classified coin.
#[derive(Debug, Clone)]
pub struct CoinReading {
    /// The candidate region the coin was found in (full-resolution).
    pub region: Region,
    /// The fitted coin boundary, in region-patch coordinates.
    pub ellipse: CoinEllipse,
    /// The predicted denomination.
    pub value: i32,
}

/// Result of counting one frame.
#[derive(Debug, Clone)]
pub struct CountOutput {
    /// Sum of all predicted denominations.
    pub total: i64,
    /// Every classified coin.
    pub readings: Vec<CoinReading>,
    /// All candidate regions, classified or not (annotation input).
    pub regions: Vec<Region>,
}

/// Sequences detector, segmenter, pruner, extractor, and classifier.
#[derive(Debug)]
pub struct CoinCounter {
    detector: RegionDetector,
    segmenter: EllipseSegmenter,
    extractor: FeatureExtractor,
    classifier: Box<dyn ValueClassifier>,
    pruner: PrunerSettings,
    pipeline: PipelineSettings,
}

impl CoinCounter {
    /// Assemble a counter from its stages.
    pub fn new(
        detector: RegionDetector,
        segmenter: EllipseSegmenter,
        extractor: FeatureExtractor,
        classifier: Box<dyn ValueClassifier>,
        pruner: PrunerSettings,
        pipeline: PipelineSettings,
    ) -> Self {
        Self { detector, segmenter, extractor, classifier, pruner, pipeline }
    }

    /// Wire a counter from application settings plus the two model backends.
    pub fn from_settings(
        settings: &AppSettings,
        proposer: Box<dyn BoxProposer>,
        classifier: Box<dyn ValueClassifier>,
    ) -> Self {
        Self::new(
            RegionDetector::new(proposer, settings.detector),
            EllipseSegmenter::new(settings.segmenter),
            FeatureExtractor::new(settings.features),
            classifier,
            settings.pruner,
            settings.pipeline,
        )
    }

    /// Count the total coin value visible in a frame.
    ///
    /// Regions are processed strictly sequentially; the result is a pure
    /// function of the image and the configuration.
    pub fn count(&self, image: &DynamicImage) -> Result<CountOutput> {
        let _guard = timing_guard("coinsum_core::count", Level::Debug);

        let gray = to_gray(image);
        let regions = self.detector.detect(image)?;
        info!("detected {} candidate region(s)", regions.len());

        let mut readings = Vec::new();
        for (index, region) in regions.iter().enumerate() {
            let found = self.read_region(&gray, region)?;
            debug!("region {index}: {} coin(s) classified", found.len());
            readings.extend(found);
        }

        let total = readings.iter().map(|r| r.value as i64).sum();
        info!("counted {} coin(s), total value {}", readings.len(), total);
        Ok(CountOutput { total, readings, regions })
    }

    /// Classify every qualifying coin inside one candidate region.
    ///
    /// Zero-size crops, empty trims, and fit-less contours skip the reading;
    /// only classifier failures propagate.
    fn read_region(&self, gray: &GrayImage, region: &Region) -> Result<Vec<CoinReading>> {
        let Some((x, y, w, h)) = region.pixel_rect(gray.width(), gray.height()) else {
            debug!("skipping region with empty pixel window: {region:?}");
            return Ok(Vec::new());
        };
        let Some(patch) = crop_rect(gray, x, y, w, h) else {
            return Ok(Vec::new());
        };

        // Edge map, inverted so relief lines are background for the pruner,
        // then re-binarized against the local mean.
        let edges = canny(&patch, self.pipeline.canny_low, self.pipeline.canny_high);
        let edge_inv = threshold_inv(&edges, self.pipeline.binarize_cutoff);
        let work = self.segmenter.adaptive_binarize(&edge_inv);

        let mut readings = Vec::new();
        for ellipse in self.segmenter.segment(&patch) {
            let Some(masked) = crop_to_ellipse(&work, &ellipse) else {
                debug!("skipping ellipse with empty mask window");
                continue;
            };
            let Some(trimmed) = trim_zero_borders(&masked) else {
                debug!("skipping all-zero masked patch");
                continue;
            };
            let Some(inner) =
                interior_crop(&trimmed, self.pipeline.interior_rows, self.pipeline.interior_cols)
            else {
                debug!("skipping patch too small for the interior crop");
                continue;
            };

            let cleaned = prune_dual(&inner, &self.pruner);
            let features = self.extractor.extract(&cleaned);
            let value = self.classifier.predict(&features)?;
            debug!("coin value = {value}");
            readings.push(CoinReading { region: *region, ellipse, value });
        }

        Ok(readings)
    }
}
