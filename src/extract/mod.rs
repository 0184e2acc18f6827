pub mod engine;
pub mod path;
pub mod segment;

pub use engine::{ExtractionRequest, Extractor, SegmentStream};
pub use path::PathRewrite;
pub use segment::{DataSegment, FileRangeSegment, RecordSegment, WriteOutcome};
