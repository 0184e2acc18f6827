#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod config;
pub mod core;
pub mod error;
pub mod extract;
pub mod index;
pub mod stats;
pub mod storage;

pub use config::{ExtractorConfig, PathRewriteConfig};
pub use crate::core::{Epoch, IndexRow, TimeIndex};
pub use error::{ExtractError, Result};
pub use extract::{DataSegment, Extractor, SegmentStream, WriteOutcome};
pub use stats::ExtractionReport;
