pub mod accumulator;
pub mod flat_field;

pub use accumulator::MeanAccumulator;
pub use flat_field::{create_flat_field, FlatField};
