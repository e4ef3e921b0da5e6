//! Compiled resolution programs.

use std::sync::Arc;

use crate::access::RecordLayout;
use crate::schema::Primitive;
use crate::value::Value;

/// How one writer value is read and converted into the reader's shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Read as `writer`, convert to `reader` (identity or promotion).
    Primitive { writer: Primitive, reader: Primitive },
    Fixed { size: usize },
    Enum(EnumPlan),
    Array(Box<Plan>),
    Map(Box<Plan>),
    /// Execute record program `id` of the same [`Program`].
    Record(usize),
    /// The writer wrote a union; one entry per writer branch.
    WriterUnion(Vec<UnionBranch>),
    /// The writer wrote a plain value; the reader holds it in `branch` of
    /// its union.
    ReaderUnion { branch: usize, plan: Box<Plan> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumPlan {
    pub name: String,
    pub writer_symbols: Vec<String>,
    pub reader_symbols: Vec<String>,
    /// Reader index for each writer index; `None` when the reader lacks the
    /// symbol.
    pub mapping: Vec<Option<usize>>,
    /// Reader enum default, used for unmapped symbols.
    pub default: Option<usize>,
}

impl EnumPlan {
    pub fn resolve(&self, writer_index: usize) -> Option<usize> {
        self.mapping
            .get(writer_index)
            .copied()
            .flatten()
            .or(self.default)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UnionBranch {
    /// Decoded with `plan`; stored into `reader_branch` when the reader is a
    /// union too.
    Resolved {
        reader_branch: Option<usize>,
        plan: Plan,
    },
    /// The reader cannot hold this branch. Its value is consumed with `skip`
    /// before the mismatch is reported.
    Unresolved { writer: String, skip: Plan },
}

impl Plan {
    pub fn is_null(&self) -> bool {
        matches!(
            self,
            Plan::Primitive {
                reader: Primitive::Null,
                ..
            }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    /// Decode the next writer field into reader field `field`. `default` is
    /// the reader field's default, used when the value cannot be resolved.
    ReadInto {
        field: usize,
        plan: Plan,
        default: Option<Value>,
    },
    /// Decode the next writer field and discard it.
    Skip(Plan),
    /// Reader field absent from the writer; consumes no bytes.
    ApplyDefault { field: usize, value: Value },
}

/// Instructions for one (writer record, reader record) pair, in writer field
/// order followed by defaults in reader field order.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordProgram {
    pub writer: String,
    pub reader: String,
    pub layout: Arc<RecordLayout>,
    pub instructions: Vec<Instruction>,
}

/// A compiled (writer schema, reader schema) pair.
///
/// Immutable and reusable across any number of evaluations, concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub(crate) root: Plan,
    pub(crate) records: Vec<RecordProgram>,
}

impl Program {
    pub fn root(&self) -> &Plan {
        &self.root
    }

    pub fn record(&self, id: usize) -> Option<&RecordProgram> {
        self.records.get(id)
    }

    pub fn records(&self) -> &[RecordProgram] {
        &self.records
    }

    /// Instructions of the root record; empty when the root is not a record.
    pub fn instructions(&self) -> &[Instruction] {
        match self.root {
            Plan::Record(id) => self
                .records
                .get(id)
                .map(|r| r.instructions.as_slice())
                .unwrap_or_default(),
            _ => &[],
        }
    }
}
