//! Shared configuration types consumed across the coinsum workspace.
//!
//! Every tuned constant in the pipeline lives here as a named, documented
//! field so a deployment can be validated value-by-value. Settings serialize
//! to JSON and are reused by the CLI front end.

use anyhow::{Context, Result};
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

/// Region-detector parameters forwarded to the proposal backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DetectorSettings {
    /// Pyramid step for backends that scan an image pyramid.
    pub scale_factor: f32,
    /// Minimum number of overlapping raw proposals required per region.
    pub min_neighbors: u32,
    /// Minimum side length (pixels, in detector coordinates) of a region.
    pub min_size: u32,
    /// Longest acceptable width of the image handed to the backend.
    pub reference_width: u32,
    /// Longest acceptable height of the image handed to the backend.
    pub reference_height: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            scale_factor: 1.3,
            min_neighbors: 4,
            min_size: 40,
            reference_width: 640,
            reference_height: 480,
        }
    }
}

/// Ellipse segmentation thresholds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmenterSettings {
    /// Gaussian pre-blur kernel size (odd, pixels).
    pub blur_kernel: u32,
    /// Adaptive threshold neighborhood size (odd, pixels).
    pub threshold_block: u32,
    /// Constant subtracted from the local weighted mean.
    pub threshold_offset: f32,
    /// Iterations of 3x3 morphological closing applied to the binary image.
    pub closing_iterations: u8,
    /// Contours enclosing less area than this produce no ellipse (px^2).
    pub min_contour_area: f64,
    /// Contours with fewer points than this produce no ellipse.
    pub min_contour_points: usize,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            blur_kernel: 15,
            threshold_block: 11,
            threshold_offset: 1.0,
            closing_iterations: 4,
            min_contour_area: 5000.0,
            min_contour_points: 5,
        }
    }
}

/// Connected-component pruning heuristics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PrunerSettings {
    /// Color painted over accepted blobs during traversal.
    pub fill_color: u8,
    /// Blobs smaller than this fraction of the patch area are erased.
    pub min_area_fraction: f64,
    /// Blobs larger than this fraction of the patch area are erased.
    pub max_area_fraction: f64,
    /// Blobs whose bounding box comes within this many pixels of a patch
    /// edge are erased regardless of size.
    pub border_margin: u32,
    /// Inverted-binary cutoff applied before the two polarity results merge.
    pub merge_cutoff: u8,
}

impl Default for PrunerSettings {
    fn default() -> Self {
        Self {
            fill_color: 128,
            min_area_fraction: 0.025,
            max_area_fraction: 0.3,
            border_margin: 3,
            merge_cutoff: 192,
        }
    }
}

/// Feature-extraction canvas geometry.
///
/// Changing any of these changes the descriptor length; the classifier
/// backend rejects a mismatched length at load time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureSettings {
    /// Normalized canvas width (pixels).
    pub canvas_width: u32,
    /// Normalized canvas height (pixels).
    pub canvas_height: u32,
    /// Cell side for the diagonal-descriptor grid (pixels).
    pub grid_step: u32,
    /// Intensity bins per histogram cell.
    pub hist_bins: usize,
}

impl Default for FeatureSettings {
    fn default() -> Self {
        Self {
            canvas_width: 60,
            canvas_height: 90,
            grid_step: 10,
            hist_bins: 9,
        }
    }
}

/// Per-region preprocessing applied by the orchestrator before pruning.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineSettings {
    /// Lower Canny hysteresis threshold.
    pub canny_low: f32,
    /// Upper Canny hysteresis threshold.
    pub canny_high: f32,
    /// Inverted-binary cutoff applied to the edge map.
    pub binarize_cutoff: u8,
    /// Interior-crop row band as fractions of the patch height.
    pub interior_rows: (f32, f32),
    /// Interior-crop column band as fractions of the patch width.
    pub interior_cols: (f32, f32),
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            canny_low: 100.0,
            canny_high: 200.0,
            binarize_cutoff: 127,
            interior_rows: (0.10, 0.65),
            interior_cols: (0.15, 0.70),
        }
    }
}

/// Settings controlling optional runtime telemetry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Whether timing logs are emitted.
    pub enabled: bool,
    /// Logging level for telemetry output (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "debug".to_string(),
        }
    }
}

impl TelemetrySettings {
    /// Resolve the configured level string into a `LevelFilter`.
    pub fn level_filter(&self) -> LevelFilter {
        match self.level.trim().to_ascii_lowercase().as_str() {
            "off" => LevelFilter::Off,
            "error" => LevelFilter::Error,
            "warn" | "warning" => LevelFilter::Warn,
            "info" => LevelFilter::Info,
            "trace" => LevelFilter::Trace,
            _ => LevelFilter::Debug,
        }
    }
}

/// Persistent application settings for the CLI front end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppSettings {
    /// Path to the region-proposal model artifact.
    pub detector_model: Option<String>,
    /// Path to the coin-value classifier artifact.
    pub classifier_model: Option<String>,
    /// Region detection parameters.
    pub detector: DetectorSettings,
    /// Ellipse segmentation parameters.
    pub segmenter: SegmenterSettings,
    /// Connected-component pruning parameters.
    pub pruner: PrunerSettings,
    /// Feature canvas geometry.
    pub features: FeatureSettings,
    /// Per-region preprocessing parameters.
    pub pipeline: PipelineSettings,
    /// Telemetry preferences.
    pub telemetry: TelemetrySettings,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            detector_model: Some("models/coin_proposals.onnx".into()),
            classifier_model: Some("models/coin_values.onnx".into()),
            detector: DetectorSettings::default(),
            segmenter: SegmenterSettings::default(),
            pruner: PrunerSettings::default(),
            features: FeatureSettings::default(),
            pipeline: PipelineSettings::default(),
            telemetry: TelemetrySettings::default(),
        }
    }
}

impl AppSettings {
    /// Load settings from a JSON file; missing model paths fall back to the
    /// defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        let mut settings: AppSettings = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse settings JSON at {}", path.display()))?;

        let defaults = AppSettings::default();
        if settings.detector_model.is_none() {
            settings.detector_model = defaults.detector_model;
        }
        if settings.classifier_model.is_none() {
            settings.classifier_model = defaults.classifier_model;
        }
        Ok(settings)
    }

    /// Serialize settings to disk in pretty-printed JSON, overwriting any
    /// existing file.
    pub fn save_to_path<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let payload =
            serde_json::to_string_pretty(self).context("failed to serialize settings JSON")?;
        fs::write(path, payload)
            .with_context(|| format!("failed to write settings file {}", path.display()))?;
        Ok(())
    }
}

/// Default path for persisted settings (`config/coinsum.json`).
pub fn default_settings_path() -> PathBuf {
    env::current_dir()
        .map(|dir| dir.join("config/coinsum.json"))
        .unwrap_or_else(|_| PathBuf::from("config/coinsum.json"))
}
