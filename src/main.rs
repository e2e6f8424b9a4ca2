use std::{env, fs};

use anyhow::Context;
use log::info;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};

use reverse_layer::{arch::layers::Layer, specs::LayerSpec};

/// A single forward + backward run of a layer over an inline batch.
#[derive(Debug, Deserialize)]
struct JobSpec {
    layer: LayerSpec,
    shape: Vec<usize>,
    values: Vec<f32>,
    segments: Option<Vec<f32>>,
    /// The output gradient, the output itself is used if missing.
    grad: Option<Vec<f32>>,
}

#[derive(Debug, Serialize)]
struct JobReport {
    kind: &'static str,
    shape: Vec<usize>,
    output: Vec<f32>,
    input_grad: Option<Vec<f32>>,
}

const DEFAULT_JOB: &str = r#"{
    "layer": { "reverse": { "execution": "sequential" } },
    "shape": [9, 1, 1, 1],
    "values": [1, 2, 3, 4, 5, 6, 7, 8, 9],
    "segments": [0, 3, 4, 3, -1, -1]
}"#;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let raw = match env::args().nth(1) {
        Some(path) => fs::read_to_string(&path).with_context(|| format!("reading {path}"))?,
        None => DEFAULT_JOB.to_string(),
    };
    let job: JobSpec = serde_json::from_str(&raw).context("parsing the job spec")?;

    let report = run(job)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run(job: JobSpec) -> anyhow::Result<JobReport> {
    let mut layer = Layer::from(job.layer);
    let x = ArrayD::from_shape_vec(IxDyn(&job.shape), job.values).context("building the batch")?;

    let segments = job
        .segments
        .map(|s| ArrayD::from_shape_vec(IxDyn(&[s.len(), 1, 1, 1]), s))
        .transpose()
        .context("building the segment input")?;

    let mut inputs = vec![x.view()];
    inputs.extend(segments.iter().map(|s| s.view()));

    let shape = layer.reshape(&inputs)?;
    info!("running {} layer over shape {shape:?}", layer.kind());

    let y = layer.forward(&inputs)?;
    let d = match job.grad {
        Some(grad) => {
            ArrayD::from_shape_vec(IxDyn(&shape), grad).context("building the output gradient")?
        }
        None => y.clone(),
    };

    let dx = layer.backward(d.view(), &[true])?;

    Ok(JobReport {
        kind: layer.kind(),
        shape,
        output: y.iter().copied().collect(),
        input_grad: dx.map(|dx| dx.iter().copied().collect()),
    })
}
