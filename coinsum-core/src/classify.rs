//! Coin-value classification over feature vectors.
//!
//! The classifier is an opaque pretrained artifact: a feature vector goes in,
//! an integer denomination comes out. Its expected input width is checked
//! against the feature extractor's output once, at load time — a mismatch is
//! a configuration error, not something a retry could fix.

use anyhow::{Context, Result};
use tract_onnx::prelude::Tensor;

use crate::features::FEATURE_LEN;
use crate::model::OnnxModel;

/// Capability interface over the pretrained value model.
pub trait ValueClassifier: std::fmt::Debug {
    /// Predict the denomination for one feature vector.
    fn predict(&self, features: &[f32]) -> Result<i32>;
}

/// ONNX-backed value classifier.
///
/// The artifact takes a `[1, N]` float tensor and emits a single value,
/// rounded to the nearest integer denomination.
#[derive(Debug)]
pub struct OnnxValueClassifier {
    model: OnnxModel,
    expected_len: usize,
}

impl OnnxValueClassifier {
    /// Load the classifier artifact and validate its input dimensionality.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let model = OnnxModel::load(path)?;
        let shape = model.input_shape()?;
        let expected_len = *shape
            .last()
            .context("classifier input has no dimensions")?;
        anyhow::ensure!(
            expected_len == FEATURE_LEN,
            "classifier expects {expected_len} inputs but the feature extractor produces {FEATURE_LEN}"
        );
        Ok(Self { model, expected_len })
    }

    /// Input width the artifact was trained on.
    pub fn expected_len(&self) -> usize {
        self.expected_len
    }
}

impl ValueClassifier for OnnxValueClassifier {
    fn predict(&self, features: &[f32]) -> Result<i32> {
        anyhow::ensure!(
            features.len() == self.expected_len,
            "feature vector length {} does not match classifier input width {}",
            features.len(),
            self.expected_len
        );

        let tensor = Tensor::from_shape(&[1, features.len()], features)
            .map_err(|e| anyhow::anyhow!("failed to build classifier input: {e}"))?;
        let outputs = self.model.run(tensor)?;
        let first = outputs.first().context("classifier produced no outputs")?;
        let values = first
            .as_slice::<f32>()
            .map_err(|e| anyhow::anyhow!("classifier output is not f32: {e}"))?;
        let value = values.first().context("classifier output is empty")?;
        anyhow::ensure!(value.is_finite(), "classifier produced a non-finite value");
        Ok(value.round() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loading_missing_classifier_fails() {
        assert!(OnnxValueClassifier::load("missing.onnx").is_err());
    }

    #[test]
    fn invalid_classifier_artifact_fails_with_context() {
        let mut temp = NamedTempFile::new().expect("temp file");
        temp.write_all(b"garbage").expect("write");
        let err = OnnxValueClassifier::load(temp.path()).expect_err("must fail");
        assert!(format!("{err:#}").contains("ONNX") || format!("{err:#}").contains("optimize"));
    }
}
