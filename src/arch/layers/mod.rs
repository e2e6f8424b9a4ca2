mod layer;
mod reverse;

pub use layer::Layer;
pub use reverse::Reverse;
