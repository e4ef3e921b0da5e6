//! SysFlow entity records.
//!
//! Each entity pairs a Rust struct with the Avro schema it was generated
//! from. Data written by older or newer schema versions is read through a
//! compiled resolution program, cached per writer schema.

mod cache;
mod container;
mod container_type;

pub use cache::ProgramCache;
pub use container::{Container, FINGERPRINT as CONTAINER_FINGERPRINT, SCHEMA as CONTAINER_SCHEMA};
pub use container_type::{ContainerType, UnknownContainerType};
