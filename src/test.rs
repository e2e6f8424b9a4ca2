#![cfg(test)]

use ndarray::{ArrayD, Axis, IxDyn};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{ReverseErr, arch::layers::Layer, permutation::Execution};

fn random_batch(rng: &mut StdRng, shape: &[usize]) -> ArrayD<f32> {
    let len: usize = shape.iter().product();
    let values: Vec<f32> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
    ArrayD::from_shape_vec(IxDyn(shape), values).unwrap()
}

fn segment_input(values: &[i64]) -> ArrayD<f32> {
    let shape = [values.len(), 1, 1, 1];
    ArrayD::from_shape_vec(IxDyn(&shape), values.iter().map(|&v| v as f32).collect()).unwrap()
}

/// Non-overlapping segments over `batch` units, terminated by a sentinel pair, and which
/// units get reversed. A list holding only the sentinel reverses every unit.
fn random_segments(rng: &mut StdRng, batch: usize) -> (Vec<i64>, Vec<bool>) {
    let mut segments = Vec::new();
    let mut inside = vec![false; batch];
    let mut cursor = 0;

    while cursor < batch && rng.random_bool(0.7) {
        let start = rng.random_range(cursor..batch);
        let length = rng.random_range(1..=batch - start);
        segments.extend([start as i64, length as i64]);
        inside[start..start + length].fill(true);
        cursor = start + length;
    }
    if segments.is_empty() {
        inside.fill(true);
    }
    segments.extend([-1, -1]);

    (segments, inside)
}

#[test]
fn test_full_reversal_is_an_involution() {
    let mut rng = StdRng::seed_from_u64(1);

    for batch in 1..20 {
        let mut layer = Layer::reverse(Execution::Sequential);
        let x = random_batch(&mut rng, &[batch, 3, 2, 2]);

        layer.reshape(&[x.view()]).unwrap();
        let y = layer.forward(&[x.view()]).unwrap();
        let z = layer.forward(&[y.view()]).unwrap();

        assert_eq!(z, x);
    }
}

#[test]
fn test_units_outside_segments_pass_through() {
    let mut rng = StdRng::seed_from_u64(2);

    for _ in 0..100 {
        let batch = rng.random_range(1..40);
        let (segments, inside) = random_segments(&mut rng, batch);
        let x = random_batch(&mut rng, &[batch, 2, 1, 3]);
        let s = segment_input(&segments);

        let mut layer = Layer::reverse(Execution::Sequential);
        layer.reshape(&[x.view(), s.view()]).unwrap();
        let y = layer.forward(&[x.view(), s.view()]).unwrap();

        for (i, &reversed) in inside.iter().enumerate() {
            if !reversed {
                assert_eq!(y.index_axis(Axis(0), i), x.index_axis(Axis(0), i));
            }
        }
    }
}

#[test]
fn test_backward_of_forward_is_the_identity() {
    let mut rng = StdRng::seed_from_u64(3);

    for _ in 0..100 {
        let batch = rng.random_range(1..40);
        let (segments, _) = random_segments(&mut rng, batch);
        let x = random_batch(&mut rng, &[batch, 4]);
        let s = segment_input(&segments);

        let mut layer = Layer::reverse(Execution::Parallel { min_units: 8 });
        layer.reshape(&[x.view(), s.view()]).unwrap();
        let y = layer.forward(&[x.view(), s.view()]).unwrap();
        let dx = layer.backward(y.view(), &[true, false]).unwrap();

        assert_eq!(dx, Some(x));
    }
}

#[test]
fn test_sequential_and_parallel_agree() {
    let mut rng = StdRng::seed_from_u64(4);
    let x = random_batch(&mut rng, &[257, 3, 4, 4]);
    let s = segment_input(&[0, 100, 120, 37, 200, 57, -1, -1]);

    let mut sequential = Layer::reverse(Execution::Sequential);
    let mut parallel = Layer::reverse(Execution::Parallel { min_units: 0 });
    sequential.reshape(&[x.view(), s.view()]).unwrap();
    parallel.reshape(&[x.view(), s.view()]).unwrap();

    let y_seq = sequential.forward(&[x.view(), s.view()]).unwrap();
    let y_par = parallel.forward(&[x.view(), s.view()]).unwrap();
    assert_eq!(y_seq, y_par);

    let d = random_batch(&mut rng, &[257, 3, 4, 4]);
    assert_eq!(
        sequential.backward(d.view(), &[true]).unwrap(),
        parallel.backward(d.view(), &[true]).unwrap()
    );
}

#[test]
fn test_worked_example() {
    let x = ArrayD::from_shape_vec(
        IxDyn(&[9, 1, 1, 1]),
        (1..=9).map(|v| v as f32).collect(),
    )
    .unwrap();
    let s = segment_input(&[0, 3, 4, 3, -1, -1]);

    let mut layer = Layer::reverse(Execution::Sequential);
    layer.reshape(&[x.view(), s.view()]).unwrap();
    let y = layer.forward(&[x.view(), s.view()]).unwrap();

    assert_eq!(
        y.iter().copied().collect::<Vec<_>>(),
        vec![3., 2., 1., 4., 7., 6., 5., 8., 9.]
    );
}

#[test]
fn test_empty_segment_input_reverses_everything() {
    let mut rng = StdRng::seed_from_u64(5);
    let x = random_batch(&mut rng, &[6, 2]);
    let empty = ArrayD::<f32>::zeros(IxDyn(&[0, 1, 1, 1]));

    let mut with_empty = Layer::reverse(Execution::Sequential);
    let mut without = Layer::reverse(Execution::Sequential);
    with_empty.reshape(&[x.view(), empty.view()]).unwrap();
    without.reshape(&[x.view()]).unwrap();

    assert_eq!(
        with_empty.forward(&[x.view(), empty.view()]).unwrap(),
        without.forward(&[x.view()]).unwrap()
    );
}

#[test]
fn test_sentinel_only_segments_reverse_everything() {
    let mut rng = StdRng::seed_from_u64(6);
    let x = random_batch(&mut rng, &[5, 3]);
    let s = segment_input(&[-1, -1]);

    let mut layer = Layer::reverse(Execution::Sequential);
    layer.reshape(&[x.view(), s.view()]).unwrap();
    let y = layer.forward(&[x.view(), s.view()]).unwrap();

    for i in 0..5 {
        assert_eq!(y.index_axis(Axis(0), i), x.index_axis(Axis(0), 4 - i));
    }
}

#[test]
fn test_segment_gradient_is_refused() {
    let x = ArrayD::<f32>::ones(IxDyn(&[4, 1, 1, 1]));
    let s = segment_input(&[1, 2]);

    let mut layer = Layer::reverse(Execution::Sequential);
    layer.reshape(&[x.view(), s.view()]).unwrap();
    let y = layer.forward(&[x.view(), s.view()]).unwrap();

    assert!(!layer.gradient_supported(1));
    assert_eq!(
        layer.backward(y.view(), &[false, true]).unwrap_err(),
        ReverseErr::GradientUnsupported { input: 1 }
    );
}
