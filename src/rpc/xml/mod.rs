//! XML-RPC document encoding and streaming decoding.

pub mod parser;
pub mod writer;

pub use parser::{decode_stream, Reply};
pub use writer::encode_call;
