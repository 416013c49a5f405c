//! Master-file (zone file) textual representation: a line-oriented
//! parser producing an ordered list of raw records. Deliberately not a
//! full BIND-compatible grammar — see the crate-level docs for what is
//! and isn't supported.

pub mod deserialise;
pub mod types;

pub use deserialise::{parse, Error, ParsedZone};
pub use types::OwnedRecord;
