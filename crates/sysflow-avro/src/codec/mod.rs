//! Binary primitive codec.

mod decoder;
mod encoder;

pub use decoder::AvroDecoder;
pub use encoder::AvroEncoder;
