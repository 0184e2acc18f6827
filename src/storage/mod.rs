pub mod codec;
pub mod header;
pub mod scanner;
pub mod steim;

#[cfg(test)]
pub(crate) mod testutil;

pub use codec::{DecodedSeries, MseedCodec, RecordCodec, RecordTrimmer, Samples};
pub use header::{ByteOrder, RecordHeader};
pub use scanner::{MseedScanner, Record, RecordIter, RecordScanner};
