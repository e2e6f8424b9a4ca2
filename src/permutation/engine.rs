use log::trace;
use rayon::prelude::*;

use super::OffsetTable;
use crate::{Result, ReverseErr};

/// How the units of a batch get dispatched when moving them around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Execution {
    /// A plain loop over the batch axis.
    #[default]
    Sequential,
    /// One rayon task per unit. Batches with less than `min_units` units run sequentially.
    Parallel { min_units: usize },
}

impl Execution {
    fn is_parallel_for(self, units: usize) -> bool {
        match self {
            Execution::Sequential => false,
            Execution::Parallel { min_units } => units >= min_units,
        }
    }
}

/// Moves every unit of `input` to `output` so that `output[i] = input[offsets[i]]`.
///
/// # Arguments
/// * `table` - The offset table of the batch.
/// * `input` - The flat batch to read from.
/// * `output` - The flat buffer to write the permuted batch to.
/// * `execution` - The dispatch strategy.
///
/// # Returns
/// An error if either buffer doesn't hold exactly the table's batch.
pub fn forward(
    table: &OffsetTable,
    input: &[f32],
    output: &mut [f32],
    execution: Execution,
) -> Result<()> {
    trace!(units = table.len(); "forward pass");
    gather(table.offsets(), table.unit_size(), input, output, execution)
}

/// Places every unit of `out_grad` back where its forward source came from, so that
/// `in_grad[offsets[i]] = out_grad[i]`.
///
/// Since each output unit comes from exactly one input unit, units are placed, not
/// accumulated.
pub fn backward(
    table: &OffsetTable,
    out_grad: &[f32],
    in_grad: &mut [f32],
    execution: Execution,
) -> Result<()> {
    trace!(units = table.len(); "backward pass");
    gather(table.inverse(), table.unit_size(), out_grad, in_grad, execution)
}

/// Writes the `index[i]`-th unit of `src` as the `i`-th unit of `dst`.
fn gather(
    index: &[usize],
    unit_size: usize,
    src: &[f32],
    dst: &mut [f32],
    execution: Execution,
) -> Result<()> {
    let expected = index.len() * unit_size;
    check_len("source", src.len(), expected)?;
    check_len("destination", dst.len(), expected)?;

    if unit_size == 0 {
        return Ok(());
    }

    let copy_unit = |(unit, &from): (&mut [f32], &usize)| {
        let start = from * unit_size;
        unit.copy_from_slice(&src[start..start + unit_size]);
    };

    if execution.is_parallel_for(index.len()) {
        dst.par_chunks_mut(unit_size)
            .zip(index.par_iter())
            .for_each(copy_unit);
    } else {
        dst.chunks_mut(unit_size).zip(index).for_each(copy_unit);
    }

    Ok(())
}

fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(ReverseErr::ShapeMismatch {
            what,
            got: vec![got],
            expected: vec![expected],
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARALLEL: Execution = Execution::Parallel { min_units: 0 };

    fn batch(units: usize, unit_size: usize) -> Vec<f32> {
        (0..units * unit_size).map(|v| v as f32).collect()
    }

    #[test]
    fn forward_moves_whole_units() {
        let table = OffsetTable::full(3, 2);
        let input = batch(3, 2);
        let mut output = vec![0.; 6];

        forward(&table, &input, &mut output, Execution::Sequential).unwrap();

        assert_eq!(output, [4., 5., 2., 3., 0., 1.]);
    }

    #[test]
    fn backward_undoes_forward() {
        let table = OffsetTable::build(7, 3, Some(&[1, 4, 5, 2])).unwrap();
        let input = batch(7, 3);
        let mut output = vec![0.; 21];
        let mut restored = vec![0.; 21];

        forward(&table, &input, &mut output, Execution::Sequential).unwrap();
        backward(&table, &output, &mut restored, Execution::Sequential).unwrap();

        assert_eq!(restored, input);
    }

    #[test]
    fn parallel_matches_sequential() {
        let table = OffsetTable::build(64, 5, Some(&[3, 10, 20, 30, -1, -1])).unwrap();
        let input = batch(64, 5);
        let mut sequential = vec![0.; input.len()];
        let mut parallel = vec![0.; input.len()];

        forward(&table, &input, &mut sequential, Execution::Sequential).unwrap();
        forward(&table, &input, &mut parallel, PARALLEL).unwrap();
        assert_eq!(sequential, parallel);

        backward(&table, &input, &mut sequential, Execution::Sequential).unwrap();
        backward(&table, &input, &mut parallel, PARALLEL).unwrap();
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn small_batches_fall_back_to_the_loop() {
        let execution = Execution::Parallel { min_units: 16 };

        assert!(!execution.is_parallel_for(15));
        assert!(execution.is_parallel_for(16));
        assert!(!Execution::Sequential.is_parallel_for(usize::MAX));
    }

    #[test]
    fn empty_units_are_a_no_op() {
        let table = OffsetTable::full(4, 0);
        let mut output: Vec<f32> = vec![];

        forward(&table, &[], &mut output, PARALLEL).unwrap();
    }

    #[test]
    fn mismatched_buffers_are_rejected() {
        let table = OffsetTable::full(4, 2);
        let mut output = vec![0.; 8];

        let err = forward(&table, &[0.; 6], &mut output, Execution::Sequential).unwrap_err();

        assert_eq!(
            err,
            ReverseErr::ShapeMismatch {
                what: "source",
                got: vec![6],
                expected: vec![8]
            }
        );
    }
}
