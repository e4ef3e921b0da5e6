//! Writer/reader schema resolution.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, trace};

use super::program::{EnumPlan, Instruction, Plan, Program, RecordProgram, UnionBranch};
use crate::access::RecordLayout;
use crate::error::{Error, ResolutionError, Result};
use crate::schema::{Name, RecordSchema, Schema, SchemaNode};

/// Which schema a reader-side node belongs to. Skip plans resolve the writer
/// schema against itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    Reader,
    Writer,
}

struct Compiler<'a> {
    writer: &'a Schema,
    reader: &'a Schema,
    memo: HashMap<(String, String, Side), usize>,
    records: Vec<RecordProgram>,
}

/// Compiles the program that reads data written with `writer` into the shape
/// described by `reader`.
///
/// Compilation is pure: the same pair always yields an equal program, so the
/// result may be cached under the fingerprints of both schemas.
pub fn compile(writer: &Schema, reader: &Schema) -> Result<Program> {
    let mut compiler = Compiler {
        writer,
        reader,
        memo: HashMap::new(),
        records: Vec::new(),
    };
    let root = compiler.resolve(writer.root(), reader.root(), Side::Reader)?;
    debug!(
        "compiled {} -> {} into {} record programs",
        writer.root().label(),
        reader.root().label(),
        compiler.records.len()
    );
    Ok(Program {
        root,
        records: compiler.records,
    })
}

/// Parses both schema texts and compiles them.
pub fn compile_schema_text(writer: &str, reader: &str) -> Result<Program> {
    compile(&Schema::parse(writer)?, &Schema::parse(reader)?)
}

impl<'a> Compiler<'a> {
    fn reader_schema(&self, side: Side) -> &'a Schema {
        match side {
            Side::Reader => self.reader,
            Side::Writer => self.writer,
        }
    }

    fn skip_plan(&mut self, node: &'a SchemaNode) -> Result<Plan> {
        self.resolve(node, node, Side::Writer)
    }

    fn resolve(&mut self, writer: &'a SchemaNode, reader: &'a SchemaNode, side: Side) -> Result<Plan> {
        let w = self.writer.deref(writer)?;
        let r = self.reader_schema(side).deref(reader)?;

        if let (Some(wp), Some(rp)) = (w.primitive(), r.primitive()) {
            return if wp.promotes_to(rp) {
                Ok(Plan::Primitive {
                    writer: wp,
                    reader: rp,
                })
            } else {
                Err(ResolutionError::Incompatible {
                    writer: wp.name(),
                    reader: rp.name(),
                }
                .into())
            };
        }

        match (w, r) {
            (SchemaNode::Union(branches), _) => {
                let mut resolved = Vec::with_capacity(branches.len());
                for branch in branches {
                    resolved.push(self.writer_branch(branch, r, side)?);
                }
                Ok(Plan::WriterUnion(resolved))
            }
            (_, SchemaNode::Union(branches)) => match self.pick_branch(w, branches, side)? {
                Some((branch, plan)) => Ok(Plan::ReaderUnion {
                    branch,
                    plan: Box::new(plan),
                }),
                None => Err(ResolutionError::NoMatchingBranch(w.label()).into()),
            },
            (SchemaNode::Record(wr), SchemaNode::Record(rr)) => {
                if !names_match(&wr.name, &rr.name, &rr.aliases) {
                    return Err(name_mismatch(w, r));
                }
                self.resolve_record(wr, rr, side)
            }
            (SchemaNode::Enum(we), SchemaNode::Enum(re)) => {
                if !names_match(&we.name, &re.name, &re.aliases) {
                    return Err(name_mismatch(w, r));
                }
                let mapping = we.symbols.iter().map(|s| re.symbol_index(s)).collect();
                let default = re.default.as_deref().and_then(|s| re.symbol_index(s));
                Ok(Plan::Enum(EnumPlan {
                    name: re.name.fullname(),
                    writer_symbols: we.symbols.clone(),
                    reader_symbols: re.symbols.clone(),
                    mapping,
                    default,
                }))
            }
            (SchemaNode::Fixed(wf), SchemaNode::Fixed(rf)) => {
                if !names_match(&wf.name, &rf.name, &rf.aliases) {
                    return Err(name_mismatch(w, r));
                }
                if wf.size != rf.size {
                    return Err(ResolutionError::FixedSizeMismatch {
                        name: rf.name.fullname(),
                        writer: wf.size,
                        reader: rf.size,
                    }
                    .into());
                }
                Ok(Plan::Fixed { size: wf.size })
            }
            (SchemaNode::Array(wi), SchemaNode::Array(ri)) => {
                Ok(Plan::Array(Box::new(self.resolve(wi, ri, side)?)))
            }
            (SchemaNode::Map(wv), SchemaNode::Map(rv)) => {
                Ok(Plan::Map(Box::new(self.resolve(wv, rv, side)?)))
            }
            _ => Err(ResolutionError::Incompatible {
                writer: w.kind(),
                reader: r.kind(),
            }
            .into()),
        }
    }

    /// Like [`resolve`](Self::resolve), but a resolution failure means "no
    /// match" rather than an error.
    fn try_resolve(
        &mut self,
        writer: &'a SchemaNode,
        reader: &'a SchemaNode,
        side: Side,
    ) -> Result<Option<Plan>> {
        match self.resolve(writer, reader, side) {
            Ok(plan) => Ok(Some(plan)),
            Err(Error::Resolution(e)) => {
                trace!("candidate rejected: {e}");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn writer_branch(
        &mut self,
        branch: &'a SchemaNode,
        reader: &'a SchemaNode,
        side: Side,
    ) -> Result<UnionBranch> {
        let resolved = match self.reader_schema(side).deref(reader)? {
            SchemaNode::Union(branches) => self
                .pick_branch(branch, branches, side)?
                .map(|(i, plan)| (Some(i), plan)),
            _ => self
                .try_resolve(branch, reader, side)?
                .map(|plan| (None, plan)),
        };
        Ok(match resolved {
            Some((reader_branch, plan)) => UnionBranch::Resolved {
                reader_branch,
                plan,
            },
            None => UnionBranch::Unresolved {
                writer: self.writer.deref(branch)?.label(),
                skip: self.skip_plan(branch)?,
            },
        })
    }

    /// First reader branch of the same type, else the first one reachable by
    /// promotion.
    fn pick_branch(
        &mut self,
        writer: &'a SchemaNode,
        branches: &'a [SchemaNode],
        side: Side,
    ) -> Result<Option<(usize, Plan)>> {
        let w = self.writer.deref(writer)?;
        let reader = self.reader_schema(side);
        for (i, branch) in branches.iter().enumerate() {
            if same_type(w, reader.deref(branch)?) {
                if let Some(plan) = self.try_resolve(writer, branch, side)? {
                    return Ok(Some((i, plan)));
                }
            }
        }
        for (i, branch) in branches.iter().enumerate() {
            if let Some(plan) = self.try_resolve(writer, branch, side)? {
                return Ok(Some((i, plan)));
            }
        }
        Ok(None)
    }

    fn resolve_record(
        &mut self,
        writer: &'a RecordSchema,
        reader: &'a RecordSchema,
        side: Side,
    ) -> Result<Plan> {
        let key = (writer.name.fullname(), reader.name.fullname(), side);
        if let Some(&id) = self.memo.get(&key) {
            return Ok(Plan::Record(id));
        }
        // Registered before the fields are resolved so recursive references
        // find it.
        let id = self.records.len();
        self.records.push(RecordProgram {
            writer: key.0.clone(),
            reader: key.1.clone(),
            layout: Arc::new(RecordLayout::of(reader)),
            instructions: Vec::new(),
        });
        self.memo.insert(key, id);

        match self.record_instructions(writer, reader, side) {
            Ok(instructions) => {
                self.records[id].instructions = instructions;
                Ok(Plan::Record(id))
            }
            Err(e) => {
                self.records.truncate(id);
                self.memo.retain(|_, v| *v < id);
                Err(e)
            }
        }
    }

    fn record_instructions(
        &mut self,
        writer: &'a RecordSchema,
        reader: &'a RecordSchema,
        side: Side,
    ) -> Result<Vec<Instruction>> {
        let mut matched = vec![false; reader.fields.len()];
        let mut instructions = Vec::with_capacity(writer.fields.len() + reader.fields.len());

        for wf in &writer.fields {
            match reader_field(reader, &wf.name).filter(|&i| !matched[i]) {
                Some(field) => {
                    matched[field] = true;
                    let rf = &reader.fields[field];
                    let plan = self.resolve(&wf.schema, &rf.schema, side)?;
                    instructions.push(Instruction::ReadInto {
                        field,
                        plan,
                        default: rf.default.clone(),
                    });
                }
                None => instructions.push(Instruction::Skip(self.skip_plan(&wf.schema)?)),
            }
        }

        for (field, rf) in reader.fields.iter().enumerate() {
            if matched[field] {
                continue;
            }
            match &rf.default {
                Some(value) => instructions.push(Instruction::ApplyDefault {
                    field,
                    value: value.clone(),
                }),
                None => {
                    return Err(ResolutionError::MissingField {
                        record: reader.name.fullname(),
                        field: rf.name.clone(),
                    }
                    .into())
                }
            }
        }
        Ok(instructions)
    }
}

fn reader_field(reader: &RecordSchema, name: &str) -> Option<usize> {
    reader.field_index(name).or_else(|| {
        reader
            .fields
            .iter()
            .position(|f| f.aliases.iter().any(|a| a == name))
    })
}

/// Named types match on their unqualified names or on a reader alias.
fn names_match(writer: &Name, reader: &Name, aliases: &[Name]) -> bool {
    writer.name == reader.name
        || aliases
            .iter()
            .any(|a| a.name == writer.name || a.fullname() == writer.fullname())
}

fn same_type(writer: &SchemaNode, reader: &SchemaNode) -> bool {
    if writer.kind() != reader.kind() {
        return false;
    }
    match (writer, reader) {
        (SchemaNode::Record(w), SchemaNode::Record(r)) => names_match(&w.name, &r.name, &r.aliases),
        (SchemaNode::Enum(w), SchemaNode::Enum(r)) => names_match(&w.name, &r.name, &r.aliases),
        (SchemaNode::Fixed(w), SchemaNode::Fixed(r)) => names_match(&w.name, &r.name, &r.aliases),
        _ => true,
    }
}

fn name_mismatch(writer: &SchemaNode, reader: &SchemaNode) -> Error {
    ResolutionError::NameMismatch {
        writer: writer.label(),
        reader: reader.label(),
    }
    .into()
}
