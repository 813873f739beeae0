pub mod kv;
mod writer;

pub use kv::*;
pub use writer::{escape_kv_string, write_kv_children, write_kv_document};
