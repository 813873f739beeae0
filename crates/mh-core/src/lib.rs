pub mod error;
pub mod types;
pub mod value;

pub use error::MapHackError;
pub use types::*;
pub use value::*;
