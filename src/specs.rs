//! Serializable layer configuration.
use serde::{Deserialize, Serialize};

use crate::{arch::layers::Layer, permutation::Execution};

/// Batches smaller than this run sequentially under a parallel execution by default.
pub const DEFAULT_MIN_PARALLEL_UNITS: usize = 64;

/// The specification for the `Execution` enum.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionSpec {
    #[default]
    Sequential,
    Parallel {
        #[serde(default = "default_min_units")]
        min_units: usize,
    },
}

fn default_min_units() -> usize {
    DEFAULT_MIN_PARALLEL_UNITS
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Reverse {
        #[serde(default)]
        execution: ExecutionSpec,
    },
}

impl From<ExecutionSpec> for Execution {
    fn from(spec: ExecutionSpec) -> Self {
        match spec {
            ExecutionSpec::Sequential => Execution::Sequential,
            ExecutionSpec::Parallel { min_units } => Execution::Parallel { min_units },
        }
    }
}

impl From<LayerSpec> for Layer {
    fn from(spec: LayerSpec) -> Self {
        match spec {
            LayerSpec::Reverse { execution } => Layer::reverse(execution.into()),
        }
    }
}
