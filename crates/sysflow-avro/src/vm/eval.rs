//! Program interpreter: decodes a byte stream into a target.

use std::io::Read;

use indexmap::IndexMap;
use log::{debug, trace};

use crate::access::{FieldAccessor, FieldMut, GenericRecord};
use crate::codec::AvroDecoder;
use crate::compiler::{EnumPlan, Instruction, Plan, Program, UnionBranch};
use crate::config::CodecConfig;
use crate::error::{ContractViolation, MalformedEncoding, ResolutionError, Result};
use crate::schema::Primitive;
use crate::value::Value;

/// Decodes one record from `source` into `target`.
///
/// Instructions run strictly in program order and consume exactly the bytes
/// of one writer record. On error the target may be partially written and
/// must be discarded.
pub fn eval<R: Read>(program: &Program, source: R, target: &mut dyn FieldAccessor) -> Result<()> {
    eval_with_config(program, source, target, &CodecConfig::default())
}

pub fn eval_with_config<R: Read>(
    program: &Program,
    source: R,
    target: &mut dyn FieldAccessor,
    config: &CodecConfig,
) -> Result<()> {
    match program.root() {
        Plan::Record(id) => Vm::new(program, source, config).record(*id, target),
        // The target is a record accessor; the program produces something else.
        other => Err(ContractViolation::KindMismatch {
            expected: plan_kind(other),
            found: "record",
        }
        .into()),
    }
}

/// Decodes one value of any shape into a [`Value`].
pub fn decode_value<R: Read>(program: &Program, source: R) -> Result<Value> {
    decode_value_with_config(program, source, &CodecConfig::default())
}

pub fn decode_value_with_config<R: Read>(
    program: &Program,
    source: R,
    config: &CodecConfig,
) -> Result<Value> {
    Vm::new(program, source, config).read_value(program.root())
}

fn plan_kind(plan: &Plan) -> &'static str {
    match plan {
        Plan::Primitive { reader, .. } => reader.name(),
        Plan::Fixed { .. } => "fixed",
        Plan::Enum(_) => "enum",
        Plan::Array(_) => "array",
        Plan::Map(_) => "map",
        Plan::Record(_) => "record",
        Plan::WriterUnion(_) | Plan::ReaderUnion { .. } => "union",
    }
}

/// A value's branch and enum index, read ahead of its body.
enum Head<'p> {
    Resolved {
        /// Reader union branch, when the reader holds the value in a union.
        branch: Option<usize>,
        body: Body<'p>,
    },
    /// The value was consumed but the reader has no place for it.
    Mismatch(ResolutionError),
}

enum Body<'p> {
    Plan(&'p Plan),
    Symbol { index: usize, plan: &'p EnumPlan },
}

impl Body<'_> {
    fn is_null(&self) -> bool {
        matches!(self, Body::Plan(plan) if plan.is_null())
    }
}

struct Vm<'p, R> {
    program: &'p Program,
    decoder: AvroDecoder<R>,
    depth: usize,
    max_depth: usize,
    /// Array items and map entries decoded so far, across all collections.
    items: u64,
    max_items: u64,
}

impl<'p, R: Read> Vm<'p, R> {
    fn new(program: &'p Program, source: R, config: &CodecConfig) -> Self {
        Self {
            program,
            decoder: AvroDecoder::with_config(source, config),
            depth: 0,
            max_depth: config.max_depth,
            items: 0,
            max_items: config.max_items,
        }
    }

    /// Charges one block's items against the per-value budget.
    fn take_items(&mut self, count: usize) -> Result<()> {
        self.items = self.items.saturating_add(count as u64);
        if self.items > self.max_items {
            let total = i64::try_from(self.items).unwrap_or(i64::MAX);
            return Err(MalformedEncoding::LengthOverflow(total).into());
        }
        Ok(())
    }

    fn read_block(&mut self) -> Result<usize> {
        let (count, _) = self.decoder.read_block_header()?;
        self.take_items(count)?;
        Ok(count)
    }

    fn enter(&mut self) -> Result<()> {
        if self.depth >= self.max_depth {
            return Err(MalformedEncoding::NestingTooDeep(self.max_depth).into());
        }
        self.depth += 1;
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn record(&mut self, id: usize, target: &mut dyn FieldAccessor) -> Result<()> {
        let program = self.program;
        let record = &program.records[id];
        let expected = record.layout.fields.len();
        let found = target.field_count();
        if found != expected {
            return Err(ContractViolation::FieldCount {
                record: record.layout.name.clone(),
                expected,
                found,
            }
            .into());
        }
        trace!(
            "record {} -> {} at byte {}",
            record.writer,
            record.reader,
            self.decoder.position()
        );

        self.enter()?;
        for instruction in &record.instructions {
            match instruction {
                Instruction::ReadInto {
                    field,
                    plan,
                    default,
                } => self.read_field(target, *field, plan, default.as_ref())?,
                Instruction::Skip(plan) => self.skip(plan)?,
                Instruction::ApplyDefault { field, value } => target.set_default(*field, value)?,
            }
        }
        self.leave();
        target.finalize();
        Ok(())
    }

    fn read_field(
        &mut self,
        target: &mut dyn FieldAccessor,
        index: usize,
        plan: &'p Plan,
        default: Option<&'p Value>,
    ) -> Result<()> {
        match self.read_head(plan)? {
            Head::Mismatch(e) => match default {
                Some(value) => {
                    debug!("field {index}: {e}, using the reader default");
                    Ok(target.set_default(index, value)?)
                }
                None => Err(e.into()),
            },
            Head::Resolved {
                branch: Some(_),
                body,
            } if body.is_null() => Ok(target.null_field(index)?),
            Head::Resolved { branch, body } => {
                let handle = target.field_mut(index)?;
                self.store(branch, body, handle)
            }
        }
    }

    /// Reads union and enum indexes, leaving the stream at the value body.
    /// Mismatched values are consumed in full.
    fn read_head(&mut self, plan: &'p Plan) -> Result<Head<'p>> {
        match plan {
            Plan::WriterUnion(branches) => {
                let index = self.decoder.read_union_index(branches.len())?;
                match &branches[index] {
                    UnionBranch::Resolved {
                        reader_branch,
                        plan,
                    } => Ok(match self.read_head(plan)? {
                        Head::Resolved { branch, body } => Head::Resolved {
                            branch: reader_branch.or(branch),
                            body,
                        },
                        mismatch => mismatch,
                    }),
                    UnionBranch::Unresolved { writer, skip } => {
                        self.skip(skip)?;
                        Ok(Head::Mismatch(ResolutionError::UnresolvedBranch {
                            branch: index,
                            writer: writer.clone(),
                        }))
                    }
                }
            }
            Plan::ReaderUnion { branch, plan } => Ok(match self.read_head(plan)? {
                Head::Resolved { body, .. } => Head::Resolved {
                    branch: Some(*branch),
                    body,
                },
                mismatch => mismatch,
            }),
            Plan::Enum(e) => {
                let index = self.decoder.read_enum(e.writer_symbols.len())?;
                Ok(match e.resolve(index) {
                    Some(reader) => Head::Resolved {
                        branch: None,
                        body: Body::Symbol {
                            index: reader,
                            plan: e,
                        },
                    },
                    None => Head::Mismatch(ResolutionError::UnknownSymbol {
                        name: e.name.clone(),
                        symbol: e.writer_symbols[index].clone(),
                    }),
                })
            }
            other => Ok(Head::Resolved {
                branch: None,
                body: Body::Plan(other),
            }),
        }
    }

    fn store_value(&mut self, plan: &'p Plan, handle: FieldMut<'_>) -> Result<()> {
        match self.read_head(plan)? {
            Head::Mismatch(e) => Err(e.into()),
            Head::Resolved { branch, body } => self.store(branch, body, handle),
        }
    }

    fn store(&mut self, branch: Option<usize>, body: Body<'p>, handle: FieldMut<'_>) -> Result<()> {
        let Some(branch) = branch else {
            return self.store_body(body, handle);
        };
        match handle {
            FieldMut::Union(union) => {
                let inner = union.select(branch)?;
                self.store_body(body, inner)
            }
            FieldMut::Generic(slot) => {
                *slot = Value::Union(branch, Box::new(self.body_value(body)?));
                Ok(())
            }
            other => Err(kind_mismatch("union", &other)),
        }
    }

    fn store_body(&mut self, body: Body<'p>, handle: FieldMut<'_>) -> Result<()> {
        match (body, handle) {
            (body, FieldMut::Generic(slot)) => {
                *slot = self.body_value(body)?;
                Ok(())
            }
            (Body::Symbol { index, .. }, FieldMut::Enum(target)) => Ok(target.set_index(index)?),
            (Body::Symbol { .. }, other) => Err(kind_mismatch("enum", &other)),
            (Body::Plan(plan), handle) => self.store_plan(plan, handle),
        }
    }

    fn store_plan(&mut self, plan: &'p Plan, handle: FieldMut<'_>) -> Result<()> {
        match plan {
            Plan::Primitive { writer, reader } => {
                let value = self.read_primitive(*writer, *reader)?;
                put_scalar(value, handle)
            }
            Plan::Fixed { size } => match handle {
                FieldMut::Fixed(buf) => {
                    if buf.len() != *size {
                        return Err(ContractViolation::FixedSize {
                            expected: *size,
                            found: buf.len(),
                        }
                        .into());
                    }
                    self.decoder.read_fixed_into(buf)
                }
                FieldMut::Generic(slot) => {
                    *slot = Value::Fixed(self.decoder.read_fixed(*size)?);
                    Ok(())
                }
                other => Err(kind_mismatch("fixed", &other)),
            },
            Plan::Array(item) => match handle {
                FieldMut::Array(array) => {
                    self.enter()?;
                    loop {
                        let count = self.read_block()?;
                        if count == 0 {
                            break;
                        }
                        for _ in 0..count {
                            self.store_value(item, array.append())?;
                        }
                    }
                    self.leave();
                    Ok(())
                }
                FieldMut::Generic(slot) => {
                    *slot = self.plain_value(plan)?;
                    Ok(())
                }
                other => Err(kind_mismatch("array", &other)),
            },
            Plan::Map(values) => match handle {
                FieldMut::Map(map) => {
                    self.enter()?;
                    loop {
                        let count = self.read_block()?;
                        if count == 0 {
                            break;
                        }
                        for _ in 0..count {
                            let key = self.decoder.read_string()?;
                            self.store_value(values, map.append(key))?;
                        }
                    }
                    self.leave();
                    Ok(())
                }
                FieldMut::Generic(slot) => {
                    *slot = self.plain_value(plan)?;
                    Ok(())
                }
                other => Err(kind_mismatch("map", &other)),
            },
            Plan::Record(id) => match handle {
                FieldMut::Record(record) => self.record(*id, record),
                FieldMut::Generic(slot) => {
                    *slot = self.plain_value(plan)?;
                    Ok(())
                }
                other => Err(kind_mismatch("record", &other)),
            },
            Plan::Enum(_) | Plan::WriterUnion(_) | Plan::ReaderUnion { .. } => {
                self.store_value(plan, handle)
            }
        }
    }

    fn read_primitive(&mut self, writer: Primitive, reader: Primitive) -> Result<Value> {
        use Primitive::*;
        let d = &mut self.decoder;
        Ok(match (writer, reader) {
            (Null, _) => Value::Null,
            (Boolean, _) => Value::Boolean(d.read_boolean()?),
            (Int, Long) => Value::Long(d.read_int()?.into()),
            (Int, Float) => Value::Float(d.read_int()? as f32),
            (Int, Double) => Value::Double(d.read_int()?.into()),
            (Int, _) => Value::Int(d.read_int()?),
            (Long, Float) => Value::Float(d.read_long()? as f32),
            (Long, Double) => Value::Double(d.read_long()? as f64),
            (Long, _) => Value::Long(d.read_long()?),
            (Float, Double) => Value::Double(d.read_float()?.into()),
            (Float, _) => Value::Float(d.read_float()?),
            (Double, _) => Value::Double(d.read_double()?),
            (Bytes | String, String) => Value::String(d.read_string()?),
            (Bytes | String, _) => Value::Bytes(d.read_bytes()?),
        })
    }

    fn read_value(&mut self, plan: &'p Plan) -> Result<Value> {
        match self.read_head(plan)? {
            Head::Mismatch(e) => Err(e.into()),
            Head::Resolved { branch, body } => {
                let value = self.body_value(body)?;
                Ok(match branch {
                    Some(branch) => Value::Union(branch, Box::new(value)),
                    None => value,
                })
            }
        }
    }

    fn body_value(&mut self, body: Body<'p>) -> Result<Value> {
        match body {
            Body::Symbol { index, plan } => Ok(Value::Enum(
                index,
                plan.reader_symbols[index].clone(),
            )),
            Body::Plan(plan) => self.plain_value(plan),
        }
    }

    fn plain_value(&mut self, plan: &'p Plan) -> Result<Value> {
        match plan {
            Plan::Primitive { writer, reader } => self.read_primitive(*writer, *reader),
            Plan::Fixed { size } => Ok(Value::Fixed(self.decoder.read_fixed(*size)?)),
            Plan::Array(item) => {
                let mut items = Vec::new();
                self.enter()?;
                loop {
                    let count = self.read_block()?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        items.push(self.read_value(item)?);
                    }
                }
                self.leave();
                Ok(Value::Array(items))
            }
            Plan::Map(values) => {
                let mut entries = IndexMap::new();
                self.enter()?;
                loop {
                    let count = self.read_block()?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        let key = self.decoder.read_string()?;
                        let value = self.read_value(values)?;
                        // A repeated key keeps its first position and its last value.
                        entries.insert(key, value);
                    }
                }
                self.leave();
                Ok(Value::Map(entries.into_iter().collect()))
            }
            Plan::Record(id) => {
                let layout = self.program.records[*id].layout.clone();
                let mut record = GenericRecord::with_layout(layout);
                self.record(*id, &mut record)?;
                Ok(record.into_value())
            }
            Plan::Enum(_) | Plan::WriterUnion(_) | Plan::ReaderUnion { .. } => {
                self.read_value(plan)
            }
        }
    }

    /// Consumes one writer value without storing it.
    fn skip(&mut self, plan: &'p Plan) -> Result<()> {
        match plan {
            Plan::Primitive { writer, .. } => match writer {
                Primitive::Null => Ok(()),
                Primitive::Boolean => self.decoder.read_boolean().map(drop),
                Primitive::Int => self.decoder.read_int().map(drop),
                Primitive::Long => self.decoder.read_long().map(drop),
                Primitive::Float => self.decoder.skip_raw(4),
                Primitive::Double => self.decoder.skip_raw(8),
                Primitive::Bytes | Primitive::String => self.decoder.skip_bytes(),
            },
            Plan::Fixed { size } => self.decoder.skip_raw(*size as u64),
            Plan::Enum(e) => self.decoder.read_enum(e.writer_symbols.len()).map(drop),
            Plan::Array(item) => self.skip_blocks(|vm| vm.skip(item)),
            Plan::Map(values) => self.skip_blocks(|vm| {
                vm.decoder.skip_bytes()?;
                vm.skip(values)
            }),
            Plan::Record(id) => {
                let program = self.program;
                self.enter()?;
                for instruction in &program.records[*id].instructions {
                    match instruction {
                        Instruction::ReadInto { plan, .. } | Instruction::Skip(plan) => {
                            self.skip(plan)?
                        }
                        Instruction::ApplyDefault { .. } => {}
                    }
                }
                self.leave();
                Ok(())
            }
            Plan::WriterUnion(branches) => {
                let index = self.decoder.read_union_index(branches.len())?;
                match &branches[index] {
                    UnionBranch::Resolved { plan, .. } => self.skip(plan),
                    UnionBranch::Unresolved { skip, .. } => self.skip(skip),
                }
            }
            Plan::ReaderUnion { plan, .. } => self.skip(plan),
        }
    }

    /// Sized blocks are jumped over in one step.
    fn skip_blocks(&mut self, mut item: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        self.enter()?;
        loop {
            match self.decoder.read_block_header()? {
                (0, _) => break,
                (_, Some(size)) => self.decoder.skip_raw(size)?,
                (count, None) => {
                    self.take_items(count)?;
                    for _ in 0..count {
                        item(self)?;
                    }
                }
            }
        }
        self.leave();
        Ok(())
    }
}

fn put_scalar(value: Value, handle: FieldMut<'_>) -> Result<()> {
    match (value, handle) {
        (value, FieldMut::Generic(slot)) => *slot = value,
        (Value::Null, FieldMut::Null) => {}
        (Value::Boolean(v), FieldMut::Boolean(slot)) => *slot = v,
        (Value::Int(v), FieldMut::Int(slot)) => *slot = v,
        (Value::Long(v), FieldMut::Long(slot)) => *slot = v,
        (Value::Float(v), FieldMut::Float(slot)) => *slot = v,
        (Value::Double(v), FieldMut::Double(slot)) => *slot = v,
        (Value::Bytes(v), FieldMut::Bytes(slot)) => *slot = v,
        (Value::String(v), FieldMut::String(slot)) => *slot = v,
        (value, other) => return Err(kind_mismatch(value.kind(), &other)),
    }
    Ok(())
}

fn kind_mismatch(expected: &'static str, found: &FieldMut<'_>) -> crate::error::Error {
    ContractViolation::KindMismatch {
        expected,
        found: found.kind(),
    }
    .into()
}
