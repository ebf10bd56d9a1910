//! Batch evaluation over a labeled directory tree.
//!
//! The tree layout is `<root>/<expected-sum>/image.(jpg|png|...)`: each
//! directory name is the ground-truth total for every image inside it. A
//! configurable fraction of each label's images is sampled, counted through
//! the normal pipeline, and compared against the label.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::prelude::*;
use walkdir::WalkDir;

use coinsum_core::CoinCounter;
use coinsum_utils::load_image;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "webp"];

/// Aggregate outcome of one evaluation run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EvalReport {
    /// Images evaluated.
    pub total: usize,
    /// Images whose predicted sum differed from the label.
    pub errors: usize,
}

impl EvalReport {
    /// Fraction of evaluated images with a wrong sum.
    pub fn error_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.errors as f64 / self.total as f64
        }
    }
}

/// Evaluate the counter over a labeled tree, sampling `fraction` of each
/// label's images with a seeded RNG.
pub fn evaluate(counter: &CoinCounter, root: &Path, fraction: f64, seed: u64) -> Result<EvalReport> {
    anyhow::ensure!(root.is_dir(), "evaluation root is not a directory: {}", root.display());

    let mut report = EvalReport::default();
    let mut rng = StdRng::seed_from_u64(seed);

    let mut entries: Vec<_> = std::fs::read_dir(root)
        .with_context(|| format!("failed to read {}", root.display()))?
        .filter_map(Result::ok)
        .map(|e| e.path())
        .collect();
    entries.sort();

    for label_dir in entries.into_iter().filter(|p| p.is_dir()) {
        let Some(expected) = parse_label(&label_dir) else {
            debug!("skipping non-numeric directory {}", label_dir.display());
            continue;
        };

        let images = collect_images(&label_dir);
        let count = sample_count(images.len(), fraction);
        let picks = sample_indices(&mut rng, images.len(), count);
        info!(
            "label {}: sampling {} of {} image(s)",
            expected,
            picks.len(),
            images.len()
        );

        for index in picks {
            let path = &images[index];
            let image = match load_image(path) {
                Ok(image) => image,
                Err(err) => {
                    warn!("failed to load {}: {err}", path.display());
                    continue;
                }
            };

            let output = counter.count(&image)?;
            info!(
                "{}: expected {}, predicted {} ({} coin(s))",
                path.display(),
                expected,
                output.total,
                output.readings.len()
            );
            report.total += 1;
            if output.total != expected {
                report.errors += 1;
            }
        }
    }

    Ok(report)
}

/// Ground-truth sum encoded in a label directory's name.
pub fn parse_label(dir: &Path) -> Option<i64> {
    dir.file_name()?.to_str()?.parse().ok()
}

/// Number of images to sample for a label.
pub fn sample_count(available: usize, fraction: f64) -> usize {
    ((available as f64) * fraction.clamp(0.0, 1.0)) as usize
}

/// `k` distinct indices from `0..n` via partial Fisher-Yates shuffle.
pub fn sample_indices(rng: &mut impl Rng, n: usize, k: usize) -> Vec<usize> {
    let k = k.min(n);
    let mut indices: Vec<usize> = (0..n).collect();
    for i in 0..k {
        let j = rng.gen_range(i..n);
        indices.swap(i, j);
    }
    indices.truncate(k);
    indices
}

fn collect_images(dir: &Path) -> Vec<PathBuf> {
    let mut images: Vec<PathBuf> = WalkDir::new(dir)
        .follow_links(false)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    images.sort();
    images
}
