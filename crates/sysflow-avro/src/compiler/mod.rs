//! Compiles a (writer schema, reader schema) pair into a [`Program`].

mod program;
mod resolve;

pub use program::{EnumPlan, Instruction, Plan, Program, RecordProgram, UnionBranch};
pub use resolve::{compile, compile_schema_text};
