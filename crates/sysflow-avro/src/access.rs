//! The field-access contract between the engine and the types it fills.
//!
//! A record type implements [`FieldAccessor`]: it hands out one
//! capability-typed handle per field index. The engine only ever performs the
//! operation the handle's variant allows, so a target never has to implement
//! setters for kinds it does not hold. A handle whose kind does not match the
//! schema is reported as a [`ContractViolation`].

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{ContractViolation, SchemaError};
use crate::schema::{RecordSchema, Schema, SchemaNode};
use crate::value::Value;

/// Read-only view of one field, used when encoding.
pub enum Field<'a> {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(&'a [u8]),
    String(&'a str),
    Fixed(&'a [u8]),
    /// Symbol index.
    Enum(usize),
    Record(&'a dyn FieldAccessor),
    Array(&'a dyn ArrayAccess),
    Map(&'a dyn MapAccess),
    Union(&'a dyn UnionAccess),
    Generic(&'a Value),
}

/// Writable handle to one field, used when decoding.
pub enum FieldMut<'a> {
    Null,
    Boolean(&'a mut bool),
    Int(&'a mut i32),
    Long(&'a mut i64),
    Float(&'a mut f32),
    Double(&'a mut f64),
    Bytes(&'a mut Vec<u8>),
    String(&'a mut String),
    Fixed(&'a mut [u8]),
    Enum(&'a mut dyn EnumAccess),
    Record(&'a mut dyn FieldAccessor),
    Array(&'a mut dyn ArrayAccess),
    Map(&'a mut dyn MapAccess),
    Union(&'a mut dyn UnionAccess),
    Generic(&'a mut Value),
}

impl Field<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Field::Null => "null",
            Field::Boolean(_) => "boolean",
            Field::Int(_) => "int",
            Field::Long(_) => "long",
            Field::Float(_) => "float",
            Field::Double(_) => "double",
            Field::Bytes(_) => "bytes",
            Field::String(_) => "string",
            Field::Fixed(_) => "fixed",
            Field::Enum(_) => "enum",
            Field::Record(_) => "record",
            Field::Array(_) => "array",
            Field::Map(_) => "map",
            Field::Union(_) => "union",
            Field::Generic(_) => "generic",
        }
    }
}

impl FieldMut<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            FieldMut::Null => "null",
            FieldMut::Boolean(_) => "boolean",
            FieldMut::Int(_) => "int",
            FieldMut::Long(_) => "long",
            FieldMut::Float(_) => "float",
            FieldMut::Double(_) => "double",
            FieldMut::Bytes(_) => "bytes",
            FieldMut::String(_) => "string",
            FieldMut::Fixed(_) => "fixed",
            FieldMut::Enum(_) => "enum",
            FieldMut::Record(_) => "record",
            FieldMut::Array(_) => "array",
            FieldMut::Map(_) => "map",
            FieldMut::Union(_) => "union",
            FieldMut::Generic(_) => "generic",
        }
    }
}

/// Indexed access to the fields of a record, in reader-schema order.
pub trait FieldAccessor {
    fn field_count(&self) -> usize;

    fn field(&self, index: usize) -> Result<Field<'_>, ContractViolation>;

    fn field_mut(&mut self, index: usize) -> Result<FieldMut<'_>, ContractViolation>;

    /// Stores the field's default. `default` is the value the reader schema
    /// declares; typed targets usually know it already.
    fn set_default(&mut self, index: usize, default: &Value) -> Result<(), ContractViolation>;

    /// Stores null into a nullable (union-with-null) field.
    fn null_field(&mut self, index: usize) -> Result<(), ContractViolation> {
        Err(ContractViolation::NotNullable(index))
    }

    /// Called once after every field has been populated.
    fn finalize(&mut self) {}
}

/// A growable sequence, filled block by block.
pub trait ArrayAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element `index`; the engine only asks for `index < len()`.
    fn item(&self, index: usize) -> Field<'_>;

    /// Appends a fresh element and returns its handle.
    fn append(&mut self) -> FieldMut<'_>;
}

/// A string-keyed map, filled block by block.
pub trait MapAccess {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, index: usize) -> Option<(&str, Field<'_>)>;

    /// Inserts a fresh value under `key` and returns its handle.
    fn append(&mut self, key: String) -> FieldMut<'_>;
}

/// A value holding one of several branch types.
pub trait UnionAccess {
    /// Index of the branch currently held.
    fn branch(&self) -> usize;

    fn value(&self) -> Field<'_>;

    /// Switches to `branch` and returns a handle for its value.
    fn select(&mut self, branch: usize) -> Result<FieldMut<'_>, ContractViolation>;
}

/// An enum represented by its symbol index.
pub trait EnumAccess {
    fn index(&self) -> usize;

    fn set_index(&mut self, index: usize) -> Result<(), ContractViolation>;
}

/// Types usable as array items, map values, or the non-null side of an
/// `Option`.
pub trait AvroField {
    fn as_field(&self) -> Field<'_>;

    fn as_field_mut(&mut self) -> FieldMut<'_>;
}

macro_rules! scalar_field {
    ($ty:ty, $variant:ident) => {
        impl AvroField for $ty {
            fn as_field(&self) -> Field<'_> {
                Field::$variant(*self)
            }

            fn as_field_mut(&mut self) -> FieldMut<'_> {
                FieldMut::$variant(self)
            }
        }
    };
}

scalar_field!(bool, Boolean);
scalar_field!(i32, Int);
scalar_field!(i64, Long);
scalar_field!(f32, Float);
scalar_field!(f64, Double);

impl AvroField for String {
    fn as_field(&self) -> Field<'_> {
        Field::String(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::String(self)
    }
}

impl AvroField for Value {
    fn as_field(&self) -> Field<'_> {
        Field::Generic(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Generic(self)
    }
}

impl<T: AvroField + Default> AvroField for Vec<T> {
    fn as_field(&self) -> Field<'_> {
        Field::Array(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Array(self)
    }
}

impl<T: AvroField + Default> ArrayAccess for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn item(&self, index: usize) -> Field<'_> {
        self[index].as_field()
    }

    fn append(&mut self) -> FieldMut<'_> {
        let index = Vec::len(self);
        self.push(T::default());
        self[index].as_field_mut()
    }
}

impl<T: AvroField + Default> AvroField for IndexMap<String, T> {
    fn as_field(&self) -> Field<'_> {
        Field::Map(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Map(self)
    }
}

impl<T: AvroField + Default> MapAccess for IndexMap<String, T> {
    fn len(&self) -> usize {
        IndexMap::len(self)
    }

    fn entry(&self, index: usize) -> Option<(&str, Field<'_>)> {
        self.get_index(index)
            .map(|(key, value)| (key.as_str(), value.as_field()))
    }

    fn append(&mut self, key: String) -> FieldMut<'_> {
        let slot = IndexMap::entry(self, key).or_default();
        *slot = T::default();
        slot.as_field_mut()
    }
}

/// `Option<T>` models the union `["null", T]`: branch 0 is `None`.
impl<T: AvroField + Default> AvroField for Option<T> {
    fn as_field(&self) -> Field<'_> {
        Field::Union(self)
    }

    fn as_field_mut(&mut self) -> FieldMut<'_> {
        FieldMut::Union(self)
    }
}

impl<T: AvroField + Default> UnionAccess for Option<T> {
    fn branch(&self) -> usize {
        usize::from(self.is_some())
    }

    fn value(&self) -> Field<'_> {
        match self {
            Some(v) => v.as_field(),
            None => Field::Null,
        }
    }

    fn select(&mut self, branch: usize) -> Result<FieldMut<'_>, ContractViolation> {
        match branch {
            0 => {
                *self = None;
                Ok(FieldMut::Null)
            }
            1 => Ok(self.insert(T::default()).as_field_mut()),
            other => Err(ContractViolation::UnionBranch(other)),
        }
    }
}

/// Field names of a reader record and, for nullable fields, the index of
/// their null branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    pub name: String,
    pub fields: Vec<(String, Option<usize>)>,
}

impl RecordLayout {
    pub fn of(record: &RecordSchema) -> Self {
        let fields = record
            .fields
            .iter()
            .map(|f| {
                let null_branch = match &f.schema {
                    SchemaNode::Union(branches) => {
                        branches.iter().position(|b| matches!(b, SchemaNode::Null))
                    }
                    _ => None,
                };
                (f.name.clone(), null_branch)
            })
            .collect();
        Self {
            name: record.name.fullname(),
            fields,
        }
    }
}

/// A schema-shaped record target holding [`Value`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericRecord {
    layout: Arc<RecordLayout>,
    values: Vec<Value>,
}

impl GenericRecord {
    /// An empty record for the root record type of `schema`.
    pub fn new(schema: &Schema) -> Result<Self, SchemaError> {
        Ok(Self::with_layout(Arc::new(RecordLayout::of(
            schema.root_record()?,
        ))))
    }

    pub fn with_layout(layout: Arc<RecordLayout>) -> Self {
        let values = vec![Value::Null; layout.fields.len()];
        Self { layout, values }
    }

    pub fn name(&self) -> &str {
        &self.layout.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.layout
            .fields
            .iter()
            .position(|(n, _)| n == name)
            .map(|i| &self.values[i])
    }

    /// Sets a field by name; returns `false` when the record has no such field.
    pub fn put(&mut self, name: &str, value: impl Into<Value>) -> bool {
        match self.layout.fields.iter().position(|(n, _)| n == name) {
            Some(i) => {
                self.values[i] = value.into();
                true
            }
            None => false,
        }
    }

    pub fn into_value(self) -> Value {
        Value::Record(
            self.layout
                .fields
                .iter()
                .map(|(name, _)| name.clone())
                .zip(self.values)
                .collect(),
        )
    }
}

impl FieldAccessor for GenericRecord {
    fn field_count(&self) -> usize {
        self.values.len()
    }

    fn field(&self, index: usize) -> Result<Field<'_>, ContractViolation> {
        self.values
            .get(index)
            .map(Field::Generic)
            .ok_or(ContractViolation::UnknownField(index))
    }

    fn field_mut(&mut self, index: usize) -> Result<FieldMut<'_>, ContractViolation> {
        self.values
            .get_mut(index)
            .map(FieldMut::Generic)
            .ok_or(ContractViolation::UnknownField(index))
    }

    fn set_default(&mut self, index: usize, default: &Value) -> Result<(), ContractViolation> {
        let slot = self
            .values
            .get_mut(index)
            .ok_or(ContractViolation::UnknownField(index))?;
        *slot = default.clone();
        Ok(())
    }

    fn null_field(&mut self, index: usize) -> Result<(), ContractViolation> {
        let branch = self
            .layout
            .fields
            .get(index)
            .ok_or(ContractViolation::UnknownField(index))?
            .1
            .ok_or(ContractViolation::NotNullable(index))?;
        self.values[index] = Value::Union(branch, Box::new(Value::Null));
        Ok(())
    }
}
