pub mod arch;
pub mod error;
pub mod permutation;
pub mod specs;
mod test;

pub use error::{Result, ReverseErr};
