use std::borrow::Cow;

use log::debug;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use crate::{
    Result, ReverseErr,
    permutation::{Execution, OffsetTable, engine},
};

/// Reverses the units of a batch along its first axis.
///
/// Without a segment input the whole batch is reversed: `[x1, ..., xN]` becomes
/// `[xN, ..., x1]`. With a segment input of `(start, length)` pairs only the units inside
/// each segment are reversed and the rest pass through, e.g. the segments
/// `[0, 3, 4, 3, -1, -1]` turn `[x1, ..., x9]` into `[x3, x2, x1, x4, x7, x6, x5, x8, x9]`.
/// Trailing pairs holding a negative value mark the end of the segments.
#[derive(Debug, Clone, Default)]
pub struct Reverse {
    execution: Execution,
    shape: Vec<usize>,
    table: Option<OffsetTable>,
}

impl Reverse {
    pub const KIND: &'static str = "Reverse";
    pub const MIN_INPUTS: usize = 1;
    pub const MAX_INPUTS: usize = 2;
    pub const NUM_OUTPUTS: usize = 1;

    /// Creates a new `Reverse` layer.
    ///
    /// # Arguments
    /// * `execution` - How the units get dispatched on each pass.
    ///
    /// # Returns
    /// A new, not yet reshaped, `Reverse` layer.
    pub fn new(execution: Execution) -> Self {
        Self {
            execution,
            ..Default::default()
        }
    }

    pub fn execution(&self) -> Execution {
        self.execution
    }

    /// The offset table built on the last successful reshape.
    pub fn table(&self) -> Option<&OffsetTable> {
        self.table.as_ref()
    }

    /// Adapts the layer to its current inputs, rebuilding the offset table.
    ///
    /// # Arguments
    /// * `x` - The batch to reverse, its first axis being the batch axis.
    /// * `segments` - The optional `(M, 1, 1, 1)` segment input.
    ///
    /// # Returns
    /// The output shape or an error if the segments are malformed or out of range.
    pub fn reshape(
        &mut self,
        x: ArrayViewD<f32>,
        segments: Option<ArrayViewD<f32>>,
    ) -> Result<Vec<usize>> {
        self.table = None;

        let shape = x.shape().to_vec();
        let (&batch, unit_dims) = shape.split_first().ok_or(ReverseErr::EmptyBatch)?;
        let unit_size = unit_dims.iter().product();

        let segments = segments.map(read_segments).transpose()?;
        let table = OffsetTable::build(batch, unit_size, segments.as_deref())?;

        debug!(
            batch = batch,
            unit_size = unit_size,
            segmented = segments.is_some();
            "reshaped reverse layer"
        );

        self.shape = shape.clone();
        self.table = Some(table);
        Ok(shape)
    }

    /// Computes the reversed batch.
    ///
    /// # Arguments
    /// * `x` - The batch to reverse, shaped as on the last reshape.
    ///
    /// # Returns
    /// The reversed batch or an error if the layer wasn't reshaped for `x`.
    pub fn forward(&self, x: ArrayViewD<f32>) -> Result<ArrayD<f32>> {
        let table = self.checked_table("input", x.shape())?;
        let input = contiguous(&x);
        let mut output = vec![0.; input.len()];

        engine::forward(table, &input, &mut output, self.execution)?;
        self.to_array("output", output)
    }

    /// Computes the gradient with respect to the batch input.
    ///
    /// # Arguments
    /// * `d` - The gradient with respect to the output.
    /// * `propagate_down` - Which inputs a gradient is requested for.
    ///
    /// # Returns
    /// The gradient of the batch input, `None` if it wasn't requested, or an error if a
    /// gradient was requested for the segment input.
    pub fn backward(
        &self,
        d: ArrayViewD<f32>,
        propagate_down: &[bool],
    ) -> Result<Option<ArrayD<f32>>> {
        if let Some((input, _)) = propagate_down
            .iter()
            .enumerate()
            .find(|&(input, &down)| down && !self.gradient_supported(input))
        {
            return Err(ReverseErr::GradientUnsupported { input });
        }

        if !propagate_down.first().copied().unwrap_or(false) {
            return Ok(None);
        }

        let table = self.checked_table("output gradient", d.shape())?;
        let out_grad = contiguous(&d);
        let mut in_grad = vec![0.; out_grad.len()];

        engine::backward(table, &out_grad, &mut in_grad, self.execution)?;
        self.to_array("input gradient", in_grad).map(Some)
    }

    /// Whether a gradient can be propagated down to the given input. It can't be for
    /// the segment input.
    pub fn gradient_supported(&self, input: usize) -> bool {
        input == 0
    }

    fn checked_table(&self, what: &'static str, shape: &[usize]) -> Result<&OffsetTable> {
        let table = self.table.as_ref().ok_or(ReverseErr::NotReshaped)?;

        if shape != self.shape.as_slice() {
            return Err(ReverseErr::ShapeMismatch {
                what,
                got: shape.to_vec(),
                expected: self.shape.clone(),
            });
        }

        Ok(table)
    }

    fn to_array(&self, what: &'static str, values: Vec<f32>) -> Result<ArrayD<f32>> {
        let got = vec![values.len()];
        ArrayD::from_shape_vec(IxDyn(&self.shape), values).map_err(|_| {
            ReverseErr::ShapeMismatch {
                what,
                got,
                expected: self.shape.clone(),
            }
        })
    }
}

/// Reads the segment input as flat integer `(start, length)` pairs.
fn read_segments(segments: ArrayViewD<f32>) -> Result<Vec<i64>> {
    let shape = segments.shape();
    if shape.len() != 4 || shape[1..].iter().any(|&dim| dim != 1) {
        return Err(ReverseErr::InvalidSegmentShape {
            shape: shape.to_vec(),
        });
    }

    segments
        .iter()
        .enumerate()
        .map(|(pos, &value)| {
            if !value.is_finite() {
                return Err(ReverseErr::NonFiniteSegment { pos });
            }

            Ok(value.trunc() as i64)
        })
        .collect()
}

fn contiguous<'a>(x: &'a ArrayViewD<f32>) -> Cow<'a, [f32]> {
    match x.as_slice() {
        Some(values) => Cow::Borrowed(values),
        None => Cow::Owned(x.iter().copied().collect()),
    }
}
