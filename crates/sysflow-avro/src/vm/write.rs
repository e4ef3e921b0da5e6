//! Schema-driven encoding of targets and values.

use std::io::Write;

use log::trace;

use crate::access::{Field, FieldAccessor};
use crate::codec::AvroEncoder;
use crate::config::CodecConfig;
use crate::error::{ContractViolation, Result};
use crate::schema::{RecordSchema, Schema, SchemaNode};
use crate::value::Value;

/// Encodes `target` as one record of `schema`.
///
/// ```
/// use sysflow_avro::{write, GenericRecord, Schema};
///
/// let schema = Schema::parse(
///     r#"{"type":"record","name":"R","fields":[{"name":"n","type":"long"}]}"#,
/// ).unwrap();
/// let mut record = GenericRecord::new(&schema).unwrap();
/// record.put("n", 3i64);
///
/// let mut out = Vec::new();
/// write(&schema, &record, &mut out).unwrap();
/// assert_eq!(out, [0x06]);
/// ```
pub fn write<W: Write>(schema: &Schema, target: &dyn FieldAccessor, sink: W) -> Result<()> {
    Writer::default().write(schema, target, sink)
}

/// Encodes a [`Value`] of any shape.
pub fn encode_value<W: Write>(schema: &Schema, value: &Value, sink: W) -> Result<()> {
    Writer::default().write_value(schema, value, sink)
}

/// Encoder entry point carrying a [`CodecConfig`].
///
/// Writing walks the writer schema in declared field order; no reader schema
/// is involved. A failed write may leave a partial record in the sink.
#[derive(Debug, Clone, Default)]
pub struct Writer {
    config: CodecConfig,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn write<W: Write>(&self, schema: &Schema, target: &dyn FieldAccessor, sink: W) -> Result<()> {
        let record = schema.root_record()?;
        let mut emitter = self.emitter(schema, sink);
        emitter.record(record, target)?;
        emitter.encoder.flush()?;
        Ok(())
    }

    pub fn write_value<W: Write>(&self, schema: &Schema, value: &Value, sink: W) -> Result<()> {
        let mut emitter = self.emitter(schema, sink);
        emitter.value(schema.root(), value)?;
        emitter.encoder.flush()?;
        Ok(())
    }

    fn emitter<'s, W: Write>(&self, schema: &'s Schema, sink: W) -> Emitter<'s, W> {
        Emitter {
            schema,
            encoder: AvroEncoder::new(sink),
            block_size: self.config.block_size,
        }
    }
}

struct Emitter<'s, W: Write> {
    schema: &'s Schema,
    encoder: AvroEncoder<W>,
    block_size: usize,
}

impl<'s, W: Write> Emitter<'s, W> {
    fn record(&mut self, record: &'s RecordSchema, target: &dyn FieldAccessor) -> Result<()> {
        let found = target.field_count();
        if found != record.fields.len() {
            return Err(ContractViolation::FieldCount {
                record: record.name.fullname(),
                expected: record.fields.len(),
                found,
            }
            .into());
        }
        trace!("writing record {}", record.name.fullname());
        for (index, field) in record.fields.iter().enumerate() {
            self.field(&field.schema, target.field(index)?)?;
        }
        Ok(())
    }

    fn field(&mut self, node: &'s SchemaNode, field: Field<'_>) -> Result<()> {
        let node = self.schema.deref(node)?;
        let e = &mut self.encoder;
        match (node, field) {
            (node, Field::Generic(value)) => return self.value(node, value),
            (SchemaNode::Null, Field::Null) => e.write_null()?,
            (SchemaNode::Boolean, Field::Boolean(v)) => e.write_boolean(v)?,
            (SchemaNode::Int, Field::Int(v)) => e.write_int(v)?,
            (SchemaNode::Long, Field::Long(v)) => e.write_long(v)?,
            (SchemaNode::Float, Field::Float(v)) => e.write_float(v)?,
            (SchemaNode::Double, Field::Double(v)) => e.write_double(v)?,
            (SchemaNode::Bytes, Field::Bytes(v)) => e.write_bytes(v)?,
            (SchemaNode::String, Field::String(v)) => e.write_str(v)?,
            (SchemaNode::Fixed(fixed), Field::Fixed(v)) => {
                if v.len() != fixed.size {
                    return Err(ContractViolation::FixedSize {
                        expected: fixed.size,
                        found: v.len(),
                    }
                    .into());
                }
                e.write_fixed(v)?
            }
            (SchemaNode::Enum(en), Field::Enum(index)) => {
                if index >= en.symbols.len() {
                    return Err(ContractViolation::EnumIndex(index).into());
                }
                e.write_enum(index)?
            }
            (SchemaNode::Record(record), Field::Record(target)) => {
                return self.record(record, target)
            }
            (SchemaNode::Array(items), Field::Array(array)) => {
                return self.blocks(array.len(), |em, i| em.field(items, array.item(i)))
            }
            (SchemaNode::Map(values), Field::Map(map)) => {
                return self.blocks(map.len(), |em, i| {
                    let (key, value) = map.entry(i).ok_or(ContractViolation::UnknownField(i))?;
                    em.encoder.write_str(key)?;
                    em.field(values, value)
                })
            }
            (SchemaNode::Union(branches), Field::Union(union)) => {
                let branch = union.branch();
                let node = branches
                    .get(branch)
                    .ok_or(ContractViolation::UnionBranch(branch))?;
                e.write_union_index(branch)?;
                return self.field(node, union.value());
            }
            (node, field) => {
                return Err(ContractViolation::KindMismatch {
                    expected: node.kind(),
                    found: field.kind(),
                }
                .into())
            }
        }
        Ok(())
    }

    fn value(&mut self, node: &'s SchemaNode, value: &Value) -> Result<()> {
        let node = self.schema.deref(node)?;
        let e = &mut self.encoder;
        match (node, value) {
            (SchemaNode::Null, Value::Null) => e.write_null()?,
            (SchemaNode::Boolean, Value::Boolean(v)) => e.write_boolean(*v)?,
            (SchemaNode::Int, Value::Int(v)) => e.write_int(*v)?,
            (SchemaNode::Long, Value::Long(v)) => e.write_long(*v)?,
            (SchemaNode::Float, Value::Float(v)) => e.write_float(*v)?,
            (SchemaNode::Double, Value::Double(v)) => e.write_double(*v)?,
            (SchemaNode::Bytes, Value::Bytes(v)) => e.write_bytes(v)?,
            (SchemaNode::String, Value::String(v)) => e.write_str(v)?,
            (SchemaNode::Fixed(fixed), Value::Fixed(v)) => {
                if v.len() != fixed.size {
                    return Err(ContractViolation::FixedSize {
                        expected: fixed.size,
                        found: v.len(),
                    }
                    .into());
                }
                e.write_fixed(v)?
            }
            (SchemaNode::Enum(en), Value::Enum(index, _)) => {
                if *index >= en.symbols.len() {
                    return Err(ContractViolation::EnumIndex(*index).into());
                }
                e.write_enum(*index)?
            }
            (SchemaNode::Array(items), Value::Array(values)) => {
                return self.blocks(values.len(), |em, i| em.value(items, &values[i]))
            }
            (SchemaNode::Map(node), Value::Map(entries)) => {
                return self.blocks(entries.len(), |em, i| {
                    let (key, value) = &entries[i];
                    em.encoder.write_str(key)?;
                    em.value(node, value)
                })
            }
            (SchemaNode::Union(branches), Value::Union(branch, inner)) => {
                let node = branches
                    .get(*branch)
                    .ok_or(ContractViolation::UnionBranch(*branch))?;
                e.write_union_index(*branch)?;
                return self.value(node, inner);
            }
            (SchemaNode::Record(record), Value::Record(fields)) => {
                for field in &record.fields {
                    let value = fields
                        .iter()
                        .find(|(name, _)| *name == field.name)
                        .map(|(_, v)| v)
                        .or(field.default.as_ref())
                        .ok_or_else(|| {
                            ContractViolation::InvalidValue(format!(
                                "record {} is missing field `{}`",
                                record.name.fullname(),
                                field.name
                            ))
                        })?;
                    self.value(&field.schema, value)?;
                }
            }
            (node, value) => {
                return Err(ContractViolation::InvalidValue(format!(
                    "expected {}, found {}",
                    node.label(),
                    value.kind()
                ))
                .into())
            }
        }
        Ok(())
    }

    /// Writes `len` items as blocks of at most `block_size` items followed by
    /// the zero terminator.
    fn blocks(
        &mut self,
        len: usize,
        mut item: impl FnMut(&mut Self, usize) -> Result<()>,
    ) -> Result<()> {
        let chunk = match self.block_size {
            0 => len.max(1),
            n => n,
        };
        let mut start = 0;
        while start < len {
            let end = (start + chunk).min(len);
            self.encoder.write_block_start(end - start)?;
            for i in start..end {
                item(self, i)?;
            }
            start = end;
        }
        self.encoder.write_block_end()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(schema: &str, value: &Value, block_size: usize) -> Vec<u8> {
        let schema = Schema::parse(schema).unwrap();
        let mut out = Vec::new();
        Writer::with_config(CodecConfig::default().with_block_size(block_size))
            .write_value(&schema, value, &mut out)
            .unwrap();
        out
    }

    #[test]
    fn empty_array_is_one_terminator() {
        assert_eq!(
            encode(r#"{"type":"array","items":"int"}"#, &Value::Array(vec![]), 0),
            [0x00]
        );
    }

    #[test]
    fn arrays_split_into_blocks() {
        let items = Value::Array((1..=5).map(Value::Int).collect());
        assert_eq!(
            encode(r#"{"type":"array","items":"int"}"#, &items, 2),
            [0x04, 0x02, 0x04, 0x04, 0x06, 0x08, 0x02, 0x0a, 0x00]
        );
        assert_eq!(
            encode(r#"{"type":"array","items":"int"}"#, &items, 0),
            [0x0a, 0x02, 0x04, 0x06, 0x08, 0x0a, 0x00]
        );
    }

    #[test]
    fn record_values_fall_back_to_field_defaults() {
        let out = encode(
            r#"{"type":"record","name":"R","fields":[
                {"name":"a","type":"int"},
                {"name":"b","type":"string","default":"x"}
            ]}"#,
            &Value::Record(vec![("a".into(), Value::Int(1))]),
            0,
        );
        assert_eq!(out, [0x02, 0x02, b'x']);
    }

    #[test]
    fn shape_errors_are_contract_violations() {
        let schema = Schema::parse(r#"{"type":"enum","name":"E","symbols":["A"]}"#).unwrap();
        let err = encode_value(&schema, &Value::Enum(3, "D".into()), Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Contract(ContractViolation::EnumIndex(3))
        ));
        let err = encode_value(&schema, &Value::Int(0), Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Contract(ContractViolation::InvalidValue(_))
        ));
    }
}
