pub mod range;

pub use range::{resolve, RangeEndpoint, ResolvedRange};
