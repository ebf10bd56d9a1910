//! Core coin-counting pipeline.
//!
//! This crate detects coin-like regions with a pretrained proposal model,
//! isolates each coin's embossed relief, reduces the relief to a fixed-length
//! descriptor, and classifies the descriptor into a denomination. Model
//! artifacts are consumed as opaque ONNX graphs via `tract-onnx`.

/// Coin-value classification over feature vectors.
pub mod classify;
/// Direct least-squares ellipse fitting.
pub mod conic;
/// Candidate-region detection and the proposal backend interface.
pub mod detector;
/// Fixed-length descriptor extraction.
pub mod features;
/// Rectangle and ellipse primitives.
pub mod geometry;
/// ONNX artifact loading and execution.
pub mod model;
/// End-to-end counting pipeline.
pub mod pipeline;
/// Connected-component pruning of binarized relief patches.
pub mod prune;
/// Ellipse segmentation of candidate patches.
pub mod segment;

pub use classify::{OnnxValueClassifier, ValueClassifier};
pub use conic::{FitError, MIN_FIT_POINTS, fit_ellipse, sample_boundary};
pub use detector::{BoxProposer, OnnxBoxProposer, RegionDetector};
pub use features::{FEATURE_LEN, FeatureExtractor};
pub use geometry::{CoinEllipse, MaskRect, Region};
pub use pipeline::{CoinCounter, CoinReading, CountOutput};
pub use prune::{prune, prune_dual, prune_pass};
pub use segment::{EllipseSegmenter, adaptive_threshold_inv, crop_to_ellipse};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
