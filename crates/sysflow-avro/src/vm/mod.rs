//! Execution engine: runs compiled programs against byte streams and
//! targets, and encodes targets back out.

mod eval;
mod write;

pub use eval::{decode_value, decode_value_with_config, eval, eval_with_config};
pub use write::{encode_value, write, Writer};
