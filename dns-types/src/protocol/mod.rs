pub mod deserialise;
pub mod serialise;
pub mod types;

pub use deserialise::{ConsumableBuffer, Error};
pub use serialise::WritableBuffer;
pub use types::*;
