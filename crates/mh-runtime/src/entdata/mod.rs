//! Raw entity-data records and the level entity stream.

mod lump;
mod record;
mod token;

pub use lump::{finalize_lump, parse_lump};
pub use record::{EntityRecord, RecordPairs};
