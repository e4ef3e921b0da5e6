//! Schema JSON parser.
//!
//! Named types are registered in a registry owned by one [`SchemaParser`]
//! run. References may point forward; they are checked once the whole
//! document has been read, and field defaults are converted only after that,
//! so a default can target a type defined later in the document.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value as Json};

use super::types::{
    validate_identifier, EnumSchema, FixedSchema, Name, Primitive, RecordField, RecordSchema,
    SchemaNode,
};
use super::{collect_named, lookup, Schema};
use crate::error::SchemaError;
use crate::value::Value;

/// Raw default JSON keyed by (record full name, field index).
type PendingDefaults = HashMap<(String, usize), Json>;

/// Parses one schema document.
#[derive(Default)]
pub struct SchemaParser {
    defined: HashSet<String>,
    references: Vec<Name>,
    defaults: PendingDefaults,
}

impl SchemaParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parse(self, text: &str) -> Result<Schema, SchemaError> {
        let json: Json =
            serde_json::from_str(text).map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        self.parse_json(&json)
    }

    pub fn parse_json(mut self, json: &Json) -> Result<Schema, SchemaError> {
        let mut root = self.parse_node(json, None)?;

        let mut names = HashMap::new();
        collect_named(&root, &mut names);
        for reference in &self.references {
            if lookup(&names, reference).is_none() {
                return Err(SchemaError::UnresolvedName(reference.fullname()));
            }
        }

        let ctx = DefaultContext {
            names: &names,
            pending: &self.defaults,
            expanding: RefCell::new(Vec::new()),
        };
        ctx.apply(&mut root)?;

        names.clear();
        collect_named(&root, &mut names);
        Ok(Schema { root, names })
    }

    fn parse_node(&mut self, json: &Json, ns: Option<&str>) -> Result<SchemaNode, SchemaError> {
        match json {
            Json::String(s) => self.parse_type_name(s, ns),
            Json::Array(branches) => self.parse_union(branches, ns),
            Json::Object(obj) => self.parse_object(obj, ns),
            other => Err(SchemaError::UnknownType(other.to_string())),
        }
    }

    fn parse_type_name(&mut self, s: &str, ns: Option<&str>) -> Result<SchemaNode, SchemaError> {
        if let Some(p) = Primitive::from_name(s) {
            return Ok(p.into());
        }
        let name = Name::parse(s, ns).map_err(|_| SchemaError::UnknownType(s.to_string()))?;
        self.references.push(name.clone());
        Ok(SchemaNode::Ref(name))
    }

    fn parse_union(&mut self, branches: &[Json], ns: Option<&str>) -> Result<SchemaNode, SchemaError> {
        if branches.is_empty() {
            return Err(SchemaError::EmptyUnion);
        }
        let mut seen = HashSet::with_capacity(branches.len());
        let mut out = Vec::with_capacity(branches.len());
        for branch in branches {
            let node = self.parse_node(branch, ns)?;
            if matches!(node, SchemaNode::Union(_)) {
                return Err(SchemaError::NestedUnion);
            }
            let label = node.label();
            if !seen.insert(label.clone()) {
                return Err(SchemaError::DuplicateUnionBranch(label));
            }
            out.push(node);
        }
        Ok(SchemaNode::Union(out))
    }

    fn parse_object(
        &mut self,
        obj: &Map<String, Json>,
        ns: Option<&str>,
    ) -> Result<SchemaNode, SchemaError> {
        let ty = obj.get("type").ok_or_else(|| SchemaError::MissingAttribute {
            attribute: "type",
            context: Json::Object(obj.clone()).to_string(),
        })?;
        match ty {
            Json::String(t) => match t.as_str() {
                "record" | "error" => self.parse_record(obj, ns),
                "enum" => self.parse_enum(obj, ns),
                "fixed" => self.parse_fixed(obj, ns),
                "array" => {
                    let items = require(obj, "items", "array")?;
                    Ok(SchemaNode::Array(Box::new(self.parse_node(items, ns)?)))
                }
                "map" => {
                    let values = require(obj, "values", "map")?;
                    Ok(SchemaNode::Map(Box::new(self.parse_node(values, ns)?)))
                }
                // Primitive with extra attributes (e.g. a logical type) or a
                // reference spelled as an object.
                other => self.parse_type_name(other, ns),
            },
            Json::Object(_) | Json::Array(_) => self.parse_node(ty, ns),
            _ => Err(SchemaError::InvalidAttribute {
                attribute: "type",
                context: ty.to_string(),
            }),
        }
    }

    /// Parses and registers the name, namespace and aliases of a named type.
    fn parse_named(
        &mut self,
        obj: &Map<String, Json>,
        ns: Option<&str>,
        kind: &'static str,
    ) -> Result<(Name, Vec<Name>), SchemaError> {
        let raw = require_str(obj, "name", kind)?;
        let namespace = match obj.get("namespace") {
            None | Some(Json::Null) => ns,
            Some(Json::String(s)) => Some(s.as_str()),
            Some(_) => {
                return Err(SchemaError::InvalidAttribute {
                    attribute: "namespace",
                    context: raw.to_string(),
                })
            }
        };
        let name = Name::parse(raw, namespace)?;
        if name.namespace.is_none() && Primitive::from_name(&name.name).is_some() {
            return Err(SchemaError::InvalidName(name.name));
        }
        let fullname = name.fullname();
        if !self.defined.insert(fullname.clone()) {
            return Err(SchemaError::DuplicateName(fullname));
        }
        let aliases = string_list(obj, "aliases", &fullname)?
            .into_iter()
            .map(|alias| Name::parse(&alias, name.namespace.as_deref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((name, aliases))
    }

    fn parse_record(
        &mut self,
        obj: &Map<String, Json>,
        ns: Option<&str>,
    ) -> Result<SchemaNode, SchemaError> {
        let (name, aliases) = self.parse_named(obj, ns, "record")?;
        let fullname = name.fullname();
        let raw_fields = require(obj, "fields", "record")?
            .as_array()
            .ok_or_else(|| SchemaError::InvalidAttribute {
                attribute: "fields",
                context: fullname.clone(),
            })?;

        let mut seen = HashSet::with_capacity(raw_fields.len());
        let mut fields = Vec::with_capacity(raw_fields.len());
        for (index, raw) in raw_fields.iter().enumerate() {
            let field = raw.as_object().ok_or_else(|| SchemaError::InvalidAttribute {
                attribute: "fields",
                context: fullname.clone(),
            })?;
            let field_name = require_str(field, "name", "record field")?;
            validate_identifier(field_name)?;
            if !seen.insert(field_name) {
                return Err(SchemaError::DuplicateField {
                    record: fullname.clone(),
                    field: field_name.to_string(),
                });
            }
            let ty = require(field, "type", "record field")?;
            let schema = self.parse_node(ty, name.namespace.as_deref())?;
            if let Some(default) = field.get("default") {
                self.defaults
                    .insert((fullname.clone(), index), default.clone());
            }
            fields.push(RecordField {
                name: field_name.to_string(),
                schema,
                default: None,
                aliases: string_list(field, "aliases", field_name)?,
                doc: doc(field),
            });
        }

        Ok(SchemaNode::Record(RecordSchema {
            name,
            aliases,
            doc: doc(obj),
            fields,
        }))
    }

    fn parse_enum(
        &mut self,
        obj: &Map<String, Json>,
        ns: Option<&str>,
    ) -> Result<SchemaNode, SchemaError> {
        let (name, aliases) = self.parse_named(obj, ns, "enum")?;
        let fullname = name.fullname();
        if !obj.contains_key("symbols") {
            return Err(SchemaError::MissingAttribute {
                attribute: "symbols",
                context: fullname,
            });
        }
        let symbols = string_list(obj, "symbols", &fullname)?;
        let mut seen = HashSet::with_capacity(symbols.len());
        for symbol in &symbols {
            validate_identifier(symbol)?;
            if !seen.insert(symbol.as_str()) {
                return Err(SchemaError::DuplicateSymbol {
                    name: fullname,
                    symbol: symbol.clone(),
                });
            }
        }
        let default = match obj.get("default") {
            None | Some(Json::Null) => None,
            Some(Json::String(s)) if seen.contains(s.as_str()) => Some(s.clone()),
            Some(other) => {
                return Err(SchemaError::InvalidEnumDefault {
                    name: fullname,
                    symbol: other.as_str().unwrap_or_default().to_string(),
                })
            }
        };
        Ok(SchemaNode::Enum(EnumSchema {
            name,
            aliases,
            doc: doc(obj),
            symbols,
            default,
        }))
    }

    fn parse_fixed(
        &mut self,
        obj: &Map<String, Json>,
        ns: Option<&str>,
    ) -> Result<SchemaNode, SchemaError> {
        let (name, aliases) = self.parse_named(obj, ns, "fixed")?;
        let size = require(obj, "size", "fixed")?
            .as_u64()
            .and_then(|s| usize::try_from(s).ok())
            .ok_or_else(|| SchemaError::InvalidAttribute {
                attribute: "size",
                context: name.fullname(),
            })?;
        Ok(SchemaNode::Fixed(FixedSchema {
            name,
            aliases,
            size,
        }))
    }
}

fn require<'a>(
    obj: &'a Map<String, Json>,
    attribute: &'static str,
    context: &str,
) -> Result<&'a Json, SchemaError> {
    obj.get(attribute).ok_or_else(|| SchemaError::MissingAttribute {
        attribute,
        context: context.to_string(),
    })
}

fn require_str<'a>(
    obj: &'a Map<String, Json>,
    attribute: &'static str,
    context: &str,
) -> Result<&'a str, SchemaError> {
    require(obj, attribute, context)?
        .as_str()
        .ok_or_else(|| SchemaError::InvalidAttribute {
            attribute,
            context: context.to_string(),
        })
}

fn string_list(
    obj: &Map<String, Json>,
    attribute: &'static str,
    context: &str,
) -> Result<Vec<String>, SchemaError> {
    let invalid = || SchemaError::InvalidAttribute {
        attribute,
        context: context.to_string(),
    };
    match obj.get(attribute) {
        None | Some(Json::Null) => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(invalid))
            .collect(),
        Some(_) => Err(invalid()),
    }
}

fn doc(obj: &Map<String, Json>) -> Option<String> {
    obj.get("doc").and_then(Json::as_str).map(str::to_string)
}

/// Converts raw JSON defaults into [`Value`]s once every name is known.
struct DefaultContext<'a> {
    names: &'a HashMap<String, SchemaNode>,
    pending: &'a PendingDefaults,
    /// Field defaults currently being expanded into an enclosing default.
    expanding: RefCell<Vec<(String, usize)>>,
}

impl DefaultContext<'_> {
    fn apply(&self, node: &mut SchemaNode) -> Result<(), SchemaError> {
        match node {
            SchemaNode::Record(record) => {
                let fullname = record.name.fullname();
                for (index, field) in record.fields.iter_mut().enumerate() {
                    if let Some(json) = self.pending.get(&(fullname.clone(), index)) {
                        let value = self.convert(json, &field.schema).ok_or_else(|| {
                            SchemaError::InvalidDefault {
                                record: fullname.clone(),
                                field: field.name.clone(),
                            }
                        })?;
                        field.default = Some(value);
                    }
                    self.apply(&mut field.schema)?;
                }
                Ok(())
            }
            SchemaNode::Array(items) => self.apply(items),
            SchemaNode::Map(values) => self.apply(values),
            SchemaNode::Union(branches) => branches.iter_mut().try_for_each(|b| self.apply(b)),
            _ => Ok(()),
        }
    }

    /// Interprets `json` as a default of type `node`; `None` when it does not fit.
    fn convert(&self, json: &Json, node: &SchemaNode) -> Option<Value> {
        Some(match node {
            SchemaNode::Null => {
                if !json.is_null() {
                    return None;
                }
                Value::Null
            }
            SchemaNode::Boolean => Value::Boolean(json.as_bool()?),
            SchemaNode::Int => Value::Int(i32::try_from(json.as_i64()?).ok()?),
            SchemaNode::Long => Value::Long(json.as_i64()?),
            SchemaNode::Float => Value::Float(json.as_f64()? as f32),
            SchemaNode::Double => Value::Double(json.as_f64()?),
            SchemaNode::Bytes => Value::Bytes(latin1(json.as_str()?)?),
            SchemaNode::String => Value::String(json.as_str()?.to_string()),
            SchemaNode::Fixed(fixed) => {
                let bytes = latin1(json.as_str()?)?;
                if bytes.len() != fixed.size {
                    return None;
                }
                Value::Fixed(bytes)
            }
            SchemaNode::Enum(e) => {
                let symbol = json.as_str()?;
                Value::Enum(e.symbol_index(symbol)?, symbol.to_string())
            }
            SchemaNode::Array(items) => Value::Array(
                json.as_array()?
                    .iter()
                    .map(|item| self.convert(item, items))
                    .collect::<Option<Vec<_>>>()?,
            ),
            SchemaNode::Map(values) => Value::Map(
                json.as_object()?
                    .iter()
                    .map(|(k, v)| Some((k.clone(), self.convert(v, values)?)))
                    .collect::<Option<Vec<_>>>()?,
            ),
            SchemaNode::Record(record) => {
                let obj = json.as_object()?;
                let fullname = record.name.fullname();
                let mut fields = Vec::with_capacity(record.fields.len());
                for (index, field) in record.fields.iter().enumerate() {
                    let value = match obj.get(&field.name) {
                        Some(v) => self.convert(v, &field.schema)?,
                        None => {
                            let key = (fullname.clone(), index);
                            let nested = self.pending.get(&key)?;
                            // A default that needs itself never terminates.
                            if self.expanding.borrow().contains(&key) {
                                return None;
                            }
                            self.expanding.borrow_mut().push(key);
                            let value = self.convert(nested, &field.schema);
                            self.expanding.borrow_mut().pop();
                            value?
                        }
                    };
                    fields.push((field.name.clone(), value));
                }
                Value::Record(fields)
            }
            SchemaNode::Union(branches) => {
                return branches.iter().enumerate().find_map(|(i, branch)| {
                    self.convert(json, branch)
                        .map(|v| Value::Union(i, Box::new(v)))
                });
            }
            SchemaNode::Ref(name) => return self.convert(json, lookup(self.names, name)?),
        })
    }
}

/// Avro encodes bytes/fixed defaults as strings of code points 0-255.
fn latin1(s: &str) -> Option<Vec<u8>> {
    s.chars().map(|c| u8::try_from(c as u32).ok()).collect()
}
