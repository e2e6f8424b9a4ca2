use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire crate.
pub type Result<T> = std::result::Result<T, ReverseErr>;

/// The reverse layer's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum ReverseErr {
    /// The layer got a number of inputs it doesn't take.
    InputCount { got: usize, min: usize, max: usize },
    /// The batch input has no batch axis.
    EmptyBatch,
    /// The segment input is not shaped `(M, 1, 1, ...)`.
    InvalidSegmentShape { shape: Vec<usize> },
    /// The segment input holds a dangling `start` without its `length`.
    OddSegmentCount { len: usize },
    /// A segment value is NaN or infinite.
    NonFiniteSegment { pos: usize },
    /// Two segments share at least one unit.
    OverlappingSegments {
        first: (usize, usize),
        second: (usize, usize),
    },
    /// A segment reaches past the end of the batch.
    SegmentOutOfRange {
        start: i64,
        length: i64,
        batch: usize,
    },
    /// Forward or backward was called before any reshape.
    NotReshaped,
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// A gradient was requested for an input this layer cannot propagate to.
    GradientUnsupported { input: usize },
}

impl ReverseErr {
    /// Whether this error stems from malformed shapes or segment configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ReverseErr::InputCount { .. }
                | ReverseErr::EmptyBatch
                | ReverseErr::InvalidSegmentShape { .. }
                | ReverseErr::OddSegmentCount { .. }
                | ReverseErr::NonFiniteSegment { .. }
                | ReverseErr::OverlappingSegments { .. }
        )
    }

    /// Whether this error stems from a segment lying outside of the batch.
    pub fn is_range(&self) -> bool {
        matches!(self, ReverseErr::SegmentOutOfRange { .. })
    }
}

impl Display for ReverseErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReverseErr::InputCount { got, min, max } => write!(
                f,
                "the layer takes between {min} and {max} inputs, got {got}"
            ),
            ReverseErr::EmptyBatch => write!(f, "the batch input must have at least one axis"),
            ReverseErr::InvalidSegmentShape { shape } => write!(
                f,
                "the segment input must be shaped (M, 1, 1, 1), got {shape:?}"
            ),
            ReverseErr::OddSegmentCount { len } => write!(
                f,
                "the segment input must hold (start, length) pairs, got {len} values"
            ),
            ReverseErr::NonFiniteSegment { pos } => {
                write!(f, "the segment value at position {pos} is not finite")
            }
            ReverseErr::OverlappingSegments { first, second } => write!(
                f,
                "segments (start={}, length={}) and (start={}, length={}) overlap",
                first.0, first.1, second.0, second.1
            ),
            ReverseErr::SegmentOutOfRange {
                start,
                length,
                batch,
            } => write!(
                f,
                "segment (start={start}, length={length}) lies outside of a batch of {batch} units"
            ),
            ReverseErr::NotReshaped => {
                write!(f, "the layer must be reshaped before running a pass")
            }
            ReverseErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            ReverseErr::GradientUnsupported { input } => {
                write!(f, "cannot propagate the gradient down to input {input}")
            }
        }
    }
}

impl Error for ReverseErr {}
