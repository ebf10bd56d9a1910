//! Candidate-region detection over the full frame.
//!
//! [`RegionDetector`] owns the coordinate bookkeeping: it converts to
//! grayscale, shrinks the frame uniformly so neither reference dimension is
//! exceeded, hands the resized image to a proposal backend, and maps the
//! returned boxes back to full-resolution coordinates. The backend itself is
//! a capability: anything that turns a gray image plus detection settings
//! into rectangles can stand in for the pretrained artifact.

use image::{DynamicImage, GrayImage};
use log::{Level, debug};
use ndarray::Array4;
use tract_onnx::prelude::Tensor;

use anyhow::{Context, Result};
use coinsum_utils::config::DetectorSettings;
use coinsum_utils::{resize_gray, timing_guard, to_gray, uniform_scale};

use crate::geometry::Region;
use crate::model::OnnxModel;

/// Minimum confidence for a raw proposal row to participate in grouping.
const SCORE_THRESHOLD: f32 = 0.5;
/// IoU above which raw proposals are considered votes for the same region.
const GROUP_IOU: f32 = 0.3;

/// Capability interface over the pretrained box-proposal artifact.
pub trait BoxProposer: std::fmt::Debug {
    /// Propose coin-like rectangles on a (possibly resized) gray image.
    fn propose(&self, image: &GrayImage, settings: &DetectorSettings) -> Result<Vec<Region>>;
}

/// Runs a proposal backend at a bounded working resolution.
#[derive(Debug)]
pub struct RegionDetector {
    proposer: Box<dyn BoxProposer>,
    settings: DetectorSettings,
}

impl RegionDetector {
    /// Construct a detector from a backend and its settings.
    pub fn new(proposer: Box<dyn BoxProposer>, settings: DetectorSettings) -> Self {
        Self { proposer, settings }
    }

    /// Access the detection settings.
    pub fn settings(&self) -> &DetectorSettings {
        &self.settings
    }

    /// Find candidate coin regions in full-resolution coordinates.
    ///
    /// Output order follows the backend and carries no meaning.
    pub fn detect(&self, image: &DynamicImage) -> Result<Vec<Region>> {
        let _guard = timing_guard("coinsum_core::detect", Level::Debug);

        let gray = to_gray(image);
        let (w, h) = gray.dimensions();
        let reference = (self.settings.reference_width, self.settings.reference_height);
        let sf = uniform_scale((w, h), reference)?;

        let scaled_w = ((w as f64 * sf).round() as u32).max(1);
        let scaled_h = ((h as f64 * sf).round() as u32).max(1);
        let resized = resize_gray(&gray, scaled_w, scaled_h);

        let proposals = self.proposer.propose(&resized, &self.settings)?;
        debug!(
            "backend proposed {} region(s) at {}x{} (scale {:.3})",
            proposals.len(),
            scaled_w,
            scaled_h,
            sf
        );

        let inverse = (1.0 / sf) as f32;
        Ok(proposals
            .into_iter()
            .map(|r| r.scaled(inverse))
            .filter(|r| r.pixel_rect(w, h).is_some())
            .collect())
    }
}

/// ONNX-backed proposal model.
///
/// The artifact takes a `[1, 1, H, W]` grayscale tensor and emits `[N, 5]`
/// rows `(x, y, w, h, score)` in the input coordinate space, one row per raw
/// window hit.
#[derive(Debug)]
pub struct OnnxBoxProposer {
    model: OnnxModel,
}

impl OnnxBoxProposer {
    /// Load the proposal artifact from disk.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        Ok(Self { model: OnnxModel::load(path)? })
    }
}

impl BoxProposer for OnnxBoxProposer {
    fn propose(&self, image: &GrayImage, settings: &DetectorSettings) -> Result<Vec<Region>> {
        let tensor = gray_to_tensor(image)?;
        let outputs = self.model.run(tensor)?;
        let first = outputs.first().context("proposal model produced no outputs")?;
        let raw = decode_proposals(first)?;
        Ok(group_proposals(raw, settings))
    }
}

/// Pack a gray image into a `[1, 1, H, W]` float tensor.
fn gray_to_tensor(image: &GrayImage) -> Result<Tensor> {
    let (w, h) = image.dimensions();
    let mut array = Array4::<f32>::zeros((1, 1, h as usize, w as usize));
    for (x, y, px) in image.enumerate_pixels() {
        array[(0, 0, y as usize, x as usize)] = px.0[0] as f32;
    }
    let (data, offset) = array.into_raw_vec_and_offset();
    debug_assert_eq!(offset, Some(0), "expected contiguous array");
    Tensor::from_shape(&[1, 1, h as usize, w as usize], &data)
        .map_err(|e| anyhow::anyhow!("failed to build input tensor: {e}"))
}

/// Decode `[N, 5]` (or `[1, N, 5]`) proposal rows, dropping low scores and
/// degenerate boxes.
fn decode_proposals(output: &Tensor) -> Result<Vec<(Region, f32)>> {
    let rows = match output.shape() {
        [rows, 5] => *rows,
        [1, rows, 5] => *rows,
        other => anyhow::bail!(
            "proposal output must have shape [N, 5] or [1, N, 5] (got {:?})",
            other
        ),
    };
    let slice = output
        .as_slice::<f32>()
        .map_err(|e| anyhow::anyhow!("proposal output is not f32: {e}"))?;

    let mut proposals = Vec::with_capacity(rows);
    for row in slice.chunks_exact(5).take(rows) {
        let score = row[4];
        if !score.is_finite() || score < SCORE_THRESHOLD {
            continue;
        }
        let region = Region { x: row[0], y: row[1], width: row[2], height: row[3] };
        if region.width <= 0.0 || region.height <= 0.0 {
            continue;
        }
        proposals.push((region, score));
    }
    Ok(proposals)
}

/// Group raw proposals into regions backed by at least `min_neighbors` votes.
///
/// Proposals are visited best-score first; each joins the first group whose
/// anchor it overlaps, or starts its own. Groups with too few votes are
/// discarded, the rest are averaged and filtered by minimum side length.
pub fn group_proposals(mut raw: Vec<(Region, f32)>, settings: &DetectorSettings) -> Vec<Region> {
    raw.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut groups: Vec<(Region, Vec<Region>)> = Vec::new();
    for (region, _) in raw {
        match groups.iter_mut().find(|(anchor, _)| anchor.iou(&region) > GROUP_IOU) {
            Some((_, members)) => members.push(region),
            None => groups.push((region, vec![region])),
        }
    }

    groups
        .into_iter()
        .filter(|(_, members)| members.len() >= settings.min_neighbors as usize)
        .map(|(_, members)| average_region(&members))
        .filter(|r| {
            r.width >= settings.min_size as f32 && r.height >= settings.min_size as f32
        })
        .collect()
}

fn average_region(members: &[Region]) -> Region {
    let n = members.len() as f32;
    Region {
        x: members.iter().map(|r| r.x).sum::<f32>() / n,
        y: members.iter().map(|r| r.y).sum::<f32>() / n,
        width: members.iter().map(|r| r.width).sum::<f32>() / n,
        height: members.iter().map(|r| r.height).sum::<f32>() / n,
    }
}
