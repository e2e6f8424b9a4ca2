use ndarray::{ArrayD, ArrayViewD};

use super::Reverse;
use crate::{Result, ReverseErr, permutation::Execution};

/// A layer of the pipeline, dispatching the shape adaptation, forward and backward passes
/// to its variant.
#[derive(Debug, Clone)]
pub enum Layer {
    Reverse(Reverse),
}

impl Layer {
    pub fn reverse(execution: Execution) -> Self {
        Self::Reverse(Reverse::new(execution))
    }

    /// The name of this layer's kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Layer::Reverse(_) => Reverse::KIND,
        }
    }

    /// The minimum and maximum amount of inputs this layer takes.
    pub fn input_bounds(&self) -> (usize, usize) {
        match self {
            Layer::Reverse(_) => (Reverse::MIN_INPUTS, Reverse::MAX_INPUTS),
        }
    }

    pub fn num_outputs(&self) -> usize {
        match self {
            Layer::Reverse(_) => Reverse::NUM_OUTPUTS,
        }
    }

    /// Adapts the layer to the shapes of its inputs.
    ///
    /// # Arguments
    /// * `inputs` - The inputs of the layer.
    ///
    /// # Returns
    /// The output shape or an error if the inputs don't fit this layer.
    pub fn reshape(&mut self, inputs: &[ArrayViewD<f32>]) -> Result<Vec<usize>> {
        self.check_inputs(inputs.len())?;

        match self {
            Layer::Reverse(l) => l.reshape(inputs[0].view(), inputs.get(1).map(|s| s.view())),
        }
    }

    /// Makes a forward pass through the layer.
    ///
    /// # Arguments
    /// * `inputs` - The inputs of the layer, shaped as on the last reshape.
    ///
    /// # Returns
    /// The layer's output or an error if occurred.
    pub fn forward(&self, inputs: &[ArrayViewD<f32>]) -> Result<ArrayD<f32>> {
        self.check_inputs(inputs.len())?;

        match self {
            Layer::Reverse(l) => l.forward(inputs[0].view()),
        }
    }

    /// Makes a backward pass through the layer.
    ///
    /// # Arguments
    /// * `d` - The gradient with respect to the output.
    /// * `propagate_down` - Which inputs a gradient is requested for.
    ///
    /// # Returns
    /// The gradient of the first input if it was requested, or an error if occurred.
    pub fn backward(
        &self,
        d: ArrayViewD<f32>,
        propagate_down: &[bool],
    ) -> Result<Option<ArrayD<f32>>> {
        match self {
            Layer::Reverse(l) => l.backward(d, propagate_down),
        }
    }

    /// Whether a gradient can be propagated down to the given input.
    pub fn gradient_supported(&self, input: usize) -> bool {
        match self {
            Layer::Reverse(l) => l.gradient_supported(input),
        }
    }

    fn check_inputs(&self, got: usize) -> Result<()> {
        let (min, max) = self.input_bounds();
        if !(min..=max).contains(&got) {
            return Err(ReverseErr::InputCount { got, min, max });
        }

        Ok(())
    }
}
