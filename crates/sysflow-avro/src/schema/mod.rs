//! Schema model: parsing, named type registry, canonical form.

mod canonical;
mod fingerprint;
mod parser;
mod types;

use std::collections::HashMap;
use std::str::FromStr;

pub use fingerprint::{rabin64, Fingerprint};
pub use parser::SchemaParser;
pub use types::{
    EnumSchema, FixedSchema, Name, Primitive, RecordField, RecordSchema, SchemaNode,
};

use crate::error::SchemaError;

/// A parsed schema: the root node and the named types it defines.
///
/// Immutable once parsed; share it across threads freely.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    root: SchemaNode,
    names: HashMap<String, SchemaNode>,
}

impl Schema {
    /// Parses a schema from its JSON text.
    ///
    /// ```
    /// use sysflow_avro::Schema;
    ///
    /// let schema = Schema::parse(r#"{"type":"array","items":"long"}"#).unwrap();
    /// assert_eq!(schema.canonical_form(), r#"{"type":"array","items":"long"}"#);
    /// ```
    pub fn parse(text: &str) -> Result<Self, SchemaError> {
        SchemaParser::new().parse(text)
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// The root node as a record, for schemas describing one record type.
    pub fn root_record(&self) -> Result<&RecordSchema, SchemaError> {
        match self.deref(&self.root)? {
            SchemaNode::Record(record) => Ok(record),
            other => Err(SchemaError::NotARecord(other.kind())),
        }
    }

    /// Finds a named type, trying the qualified name before the bare one.
    pub fn lookup(&self, name: &Name) -> Option<&SchemaNode> {
        lookup(&self.names, name)
    }

    /// Follows a [`SchemaNode::Ref`] to its definition; other nodes are
    /// returned unchanged.
    pub fn deref<'a>(&'a self, node: &'a SchemaNode) -> Result<&'a SchemaNode, SchemaError> {
        match node {
            SchemaNode::Ref(name) => self
                .lookup(name)
                .ok_or_else(|| SchemaError::UnresolvedName(name.fullname())),
            other => Ok(other),
        }
    }

    /// Full names of every named type, sorted.
    pub fn named_types(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.names.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Avro Parsing Canonical Form.
    pub fn canonical_form(&self) -> String {
        canonical::canonical_form(self)
    }

    /// CRC-64-AVRO fingerprint of the canonical form.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::of(self.canonical_form().as_bytes())
    }
}

impl FromStr for Schema {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Schema::parse(s)
    }
}

pub(crate) fn lookup<'a>(
    names: &'a HashMap<String, SchemaNode>,
    name: &Name,
) -> Option<&'a SchemaNode> {
    names
        .get(&name.fullname())
        .or_else(|| names.get(&name.name))
}

/// Registers every named type defined (not merely referenced) under `node`.
pub(crate) fn collect_named(node: &SchemaNode, names: &mut HashMap<String, SchemaNode>) {
    match node {
        SchemaNode::Record(record) => {
            names.insert(record.name.fullname(), node.clone());
            for field in &record.fields {
                collect_named(&field.schema, names);
            }
        }
        SchemaNode::Enum(e) => {
            names.insert(e.name.fullname(), node.clone());
        }
        SchemaNode::Fixed(f) => {
            names.insert(f.name.fullname(), node.clone());
        }
        SchemaNode::Array(items) => collect_named(items, names),
        SchemaNode::Map(values) => collect_named(values, names),
        SchemaNode::Union(branches) => {
            for branch in branches {
                collect_named(branch, names);
            }
        }
        _ => {}
    }
}
