//! Command-line argument definitions for coinsum-cli.

use clap::Parser;
use std::path::PathBuf;

/// Count the total coin value in a photo, or evaluate a labeled directory
/// tree.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct CountArgs {
    /// Path to the input image.
    #[arg(short, long, required_unless_present = "eval_dir")]
    pub input: Option<PathBuf>,

    /// Labeled directory tree (`<root>/<expected-sum>/*.jpg`) to evaluate
    /// instead of counting a single image.
    #[arg(long, conflicts_with = "input")]
    pub eval_dir: Option<PathBuf>,

    /// Fraction of images sampled per label in evaluation mode.
    #[arg(long, default_value_t = 0.1)]
    pub eval_fraction: f64,

    /// RNG seed for evaluation sampling.
    #[arg(long, default_value_t = 42)]
    pub eval_seed: u64,

    /// Path to the region-proposal model.
    #[arg(long, default_value = "models/coin_proposals.onnx")]
    pub detector_model: PathBuf,

    /// Path to the coin-value classifier model.
    #[arg(long, default_value = "models/coin_values.onnx")]
    pub classifier_model: PathBuf,

    /// Optional settings JSON (defaults to built-in parameters).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the detector's minimum vote count per region.
    #[arg(long)]
    pub min_neighbors: Option<u32>,

    /// Override the detector's minimum region side length.
    #[arg(long)]
    pub min_size: Option<u32>,

    /// Override the pruner's minimum blob area fraction.
    #[arg(long)]
    pub min_area_fraction: Option<f64>,

    /// Override the pruner's maximum blob area fraction.
    #[arg(long)]
    pub max_area_fraction: Option<f64>,

    /// Where to write the annotated image (defaults next to the input).
    #[arg(long)]
    pub annotate: Option<PathBuf>,

    /// Write per-coin readings to a JSON file.
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Enable telemetry timing logs.
    #[arg(long)]
    pub telemetry: bool,
}
