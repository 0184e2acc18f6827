pub mod epoch;
pub mod row;
pub mod time_index;

pub use epoch::*;
pub use row::*;
pub use time_index::*;
