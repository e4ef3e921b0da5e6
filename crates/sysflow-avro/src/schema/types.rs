//! Schema node tree.

use crate::error::SchemaError;
use crate::value::Value;

/// The unnamed scalar types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl Primitive {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "null" => Primitive::Null,
            "boolean" => Primitive::Boolean,
            "int" => Primitive::Int,
            "long" => Primitive::Long,
            "float" => Primitive::Float,
            "double" => Primitive::Double,
            "bytes" => Primitive::Bytes,
            "string" => Primitive::String,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Primitive::Null => "null",
            Primitive::Boolean => "boolean",
            Primitive::Int => "int",
            Primitive::Long => "long",
            Primitive::Float => "float",
            Primitive::Double => "double",
            Primitive::Bytes => "bytes",
            Primitive::String => "string",
        }
    }

    /// Whether a value written as `self` may be read as `reader`.
    pub fn promotes_to(self, reader: Primitive) -> bool {
        use Primitive::*;
        self == reader
            || matches!(
                (self, reader),
                (Int, Long | Float | Double)
                    | (Long, Float | Double)
                    | (Float, Double)
                    | (String, Bytes)
                    | (Bytes, String)
            )
    }
}

impl From<Primitive> for SchemaNode {
    fn from(p: Primitive) -> Self {
        match p {
            Primitive::Null => SchemaNode::Null,
            Primitive::Boolean => SchemaNode::Boolean,
            Primitive::Int => SchemaNode::Int,
            Primitive::Long => SchemaNode::Long,
            Primitive::Float => SchemaNode::Float,
            Primitive::Double => SchemaNode::Double,
            Primitive::Bytes => SchemaNode::Bytes,
            Primitive::String => SchemaNode::String,
        }
    }
}

/// A possibly-namespaced type name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Name {
    pub name: String,
    pub namespace: Option<String>,
}

impl Name {
    /// Parses `name`, which may be dotted; otherwise `namespace` applies.
    /// An empty namespace means the null namespace.
    pub fn parse(name: &str, namespace: Option<&str>) -> Result<Self, SchemaError> {
        let (namespace, name) = match name.rsplit_once('.') {
            Some((ns, short)) => (Some(ns), short),
            None => (namespace, name),
        };
        validate_identifier(name)?;
        let namespace = match namespace.filter(|ns| !ns.is_empty()) {
            Some(ns) => {
                for part in ns.split('.') {
                    validate_identifier(part)?;
                }
                Some(ns.to_string())
            }
            None => None,
        };
        Ok(Self {
            name: name.to_string(),
            namespace,
        })
    }

    /// `namespace.name`, or `name` in the null namespace.
    pub fn fullname(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{}.{}", ns, self.name),
            None => self.name.clone(),
        }
    }
}

pub(crate) fn validate_identifier(s: &str) -> Result<(), SchemaError> {
    let mut chars = s.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(SchemaError::InvalidName(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordField {
    pub name: String,
    pub schema: SchemaNode,
    pub default: Option<Value>,
    pub aliases: Vec<String>,
    pub doc: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: Name,
    pub aliases: Vec<Name>,
    pub doc: Option<String>,
    pub fields: Vec<RecordField>,
}

impl RecordSchema {
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: Name,
    pub aliases: Vec<Name>,
    pub doc: Option<String>,
    pub symbols: Vec<String>,
    /// Reader-side fallback for writer symbols this enum does not know.
    pub default: Option<String>,
}

impl EnumSchema {
    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: Name,
    pub aliases: Vec<Name>,
    pub size: usize,
}

/// One node of a parsed schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(Box<SchemaNode>),
    Map(Box<SchemaNode>),
    Union(Vec<SchemaNode>),
    Fixed(FixedSchema),
    /// Use of a named type defined elsewhere in the same schema.
    Ref(Name),
}

impl SchemaNode {
    pub fn kind(&self) -> &'static str {
        match self {
            SchemaNode::Record(_) => "record",
            SchemaNode::Enum(_) => "enum",
            SchemaNode::Array(_) => "array",
            SchemaNode::Map(_) => "map",
            SchemaNode::Union(_) => "union",
            SchemaNode::Fixed(_) => "fixed",
            SchemaNode::Ref(_) => "reference",
            other => match other.primitive() {
                Some(p) => p.name(),
                None => "unknown",
            },
        }
    }

    pub fn primitive(&self) -> Option<Primitive> {
        Some(match self {
            SchemaNode::Null => Primitive::Null,
            SchemaNode::Boolean => Primitive::Boolean,
            SchemaNode::Int => Primitive::Int,
            SchemaNode::Long => Primitive::Long,
            SchemaNode::Float => Primitive::Float,
            SchemaNode::Double => Primitive::Double,
            SchemaNode::Bytes => Primitive::Bytes,
            SchemaNode::String => Primitive::String,
            _ => return None,
        })
    }

    /// Name of a named type or reference.
    pub fn name(&self) -> Option<&Name> {
        match self {
            SchemaNode::Record(r) => Some(&r.name),
            SchemaNode::Enum(e) => Some(&e.name),
            SchemaNode::Fixed(f) => Some(&f.name),
            SchemaNode::Ref(n) => Some(n),
            _ => None,
        }
    }

    /// Human-readable type label: the full name for named types, the kind
    /// otherwise.
    pub fn label(&self) -> String {
        match self.name() {
            Some(n) => n.fullname(),
            None => self.kind().to_string(),
        }
    }
}
