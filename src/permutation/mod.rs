//! Unit permutations over the batch axis.
pub mod engine;
mod offsets;

pub use engine::Execution;
pub use offsets::OffsetTable;
