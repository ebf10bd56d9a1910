//! ONNX artifact loading and execution shared by the detector and classifier
//! backends.
//!
//! Both pretrained artifacts are opaque to the pipeline: a graph goes in, a
//! tensor comes out. Loading prefers the optimized graph and falls back to a
//! decluttered one when optimization fails, which keeps odd exporter output
//! usable at roughly half speed.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use tract_onnx::prelude::{
    Framework, Graph, InferenceModelExt, IntoTensor, SimplePlan, Tensor, TypedFact, TypedOp, tvec,
};

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// A loaded, runnable ONNX graph.
#[derive(Debug)]
pub struct OnnxModel {
    runnable: RunnableModel,
}

impl OnnxModel {
    /// Load and prepare an ONNX graph for execution.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        anyhow::ensure!(path.exists(), "model file not found: {}", path.display());

        let runnable = match load_runnable(path, true) {
            Ok(model) => {
                debug!("model {} optimized successfully", path.display());
                model
            }
            Err(opt_err) => {
                warn!(
                    "model {} failed optimized load ({opt_err}); falling back to decluttered graph",
                    path.display()
                );
                load_runnable(path, false).with_context(|| {
                    format!(
                        "fallback to decluttered graph failed after optimize error: {opt_err}"
                    )
                })?
            }
        };

        Ok(Self { runnable })
    }

    /// Execute the graph on a single input tensor.
    pub fn run(&self, input: Tensor) -> Result<Vec<Tensor>> {
        let outputs = self
            .runnable
            .run(tvec![input.into()])
            .map_err(|e| anyhow::anyhow!("model execution failed: {e}"))?;
        Ok(outputs.into_iter().map(|value| value.into_tensor()).collect())
    }

    /// Fully-determined shape of the graph's first input.
    pub fn input_shape(&self) -> Result<Vec<usize>> {
        let fact = self
            .runnable
            .model()
            .input_fact(0)
            .map_err(|e| anyhow::anyhow!("model has no usable input fact: {e}"))?;
        fact.shape
            .as_concrete()
            .map(|dims| dims.to_vec())
            .ok_or_else(|| anyhow::anyhow!("model input shape is not fully determined"))
    }
}

fn load_runnable(path: &Path, optimized: bool) -> Result<RunnableModel> {
    let model = tract_onnx::onnx()
        .model_for_path(path)
        .with_context(|| format!("failed to parse ONNX graph from {}", path.display()))?;

    if optimized {
        model
            .into_optimized()
            .map_err(|e| anyhow::anyhow!("unable to optimize graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    } else {
        model
            .into_typed()
            .map_err(|e| anyhow::anyhow!("unable to type-check graph: {e}"))?
            .into_decluttered()
            .map_err(|e| anyhow::anyhow!("unable to declutter graph: {e}"))?
            .into_runnable()
            .map_err(|e| anyhow::anyhow!("unable to make graph runnable: {e}"))
    }
}
