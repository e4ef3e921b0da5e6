//! Schema-driven Avro binary engine for SysFlow records.
//!
//! A [`Program`] is compiled once from a writer schema and a reader schema,
//! then evaluated against any number of byte streams. Targets receive values
//! through the capability-typed [`FieldAccessor`] contract.
//!
//! ```
//! use sysflow_avro::{compile, eval, write, GenericRecord, Schema, Value};
//!
//! let v1 = Schema::parse(r#"{"type":"record","name":"R","fields":[
//!     {"name":"id","type":"string"}
//! ]}"#).unwrap();
//! let v2 = Schema::parse(r#"{"type":"record","name":"R","fields":[
//!     {"name":"id","type":"string"},
//!     {"name":"tag","type":"string","default":"NA"}
//! ]}"#).unwrap();
//!
//! let mut old = GenericRecord::new(&v1).unwrap();
//! old.put("id", "c1");
//! let mut bytes = Vec::new();
//! write(&v1, &old, &mut bytes).unwrap();
//!
//! let program = compile(&v1, &v2).unwrap();
//! let mut new = GenericRecord::new(&v2).unwrap();
//! eval(&program, &bytes[..], &mut new).unwrap();
//! assert_eq!(new.get("tag"), Some(&Value::from("NA")));
//! ```

mod access;
mod config;
mod error;
mod value;

pub mod codec;
pub mod compiler;
pub mod schema;
pub mod vm;

pub use access::{
    ArrayAccess, AvroField, EnumAccess, Field, FieldAccessor, FieldMut, GenericRecord, MapAccess,
    RecordLayout, UnionAccess,
};
pub use codec::{AvroDecoder, AvroEncoder};
pub use compiler::{compile, compile_schema_text, Instruction, Plan, Program};
pub use config::CodecConfig;
pub use error::{ContractViolation, Error, MalformedEncoding, ResolutionError, Result, SchemaError};
pub use schema::{Fingerprint, Schema, SchemaNode};
pub use value::Value;
pub use vm::{decode_value, encode_value, eval, eval_with_config, write, Writer};
