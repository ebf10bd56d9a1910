//! Common helpers shared across the coinsum crates.

/// Application configuration and settings management.
pub mod config;
/// Procedural synthetic images for tests.
pub mod fixtures;
/// Image loading and raster helpers.
pub mod image_utils;
/// Instrumentation helpers for optional performance tracing.
pub mod telemetry;

use std::path::Path;

use anyhow::Result;
use log::LevelFilter;

pub use image_utils::{
    count_value, crop_rect, gray_from_fn, interior_crop, invert, load_image, resize_gray,
    threshold_inv, to_gray, trim_zero_borders, uniform_scale,
};
pub use telemetry::{
    TimingGuard, configure as configure_telemetry, telemetry_allows, telemetry_enabled,
    timing_guard,
};

/// Initialize logging once for the CLI environment.
///
/// Respects the `RUST_LOG` environment variable when set; otherwise falls
/// back to the provided default filter level.
pub fn init_logging(default_filter: LevelFilter) -> Result<()> {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter.as_str()),
    );
    builder.filter_module("coinsum::telemetry", LevelFilter::Trace);

    if builder.try_init().is_err() {
        // Logger already initialized; nothing to do.
    }
    Ok(())
}

/// Validate that a path exists and resolve it to an absolute path.
pub fn normalize_path<P: AsRef<Path>>(path: P) -> Result<std::path::PathBuf> {
    let path = path.as_ref();
    anyhow::ensure!(path.exists(), "path does not exist: {}", path.display());
    Ok(path.canonicalize()?)
}
