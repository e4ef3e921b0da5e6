//! Avro Parsing Canonical Form.
//!
//! Only `name`, `type`, `fields`, `symbols`, `items`, `values` and `size`
//! survive, in that order; names are fully qualified; a named type is spelled
//! out at its first occurrence and referenced by full name afterwards.
//! Names and symbols are restricted to `[A-Za-z0-9_.]`, so no JSON escaping
//! is needed.

use std::collections::HashSet;

use super::{Schema, SchemaNode};

pub(crate) fn canonical_form(schema: &Schema) -> String {
    let mut out = String::new();
    let mut seen = HashSet::new();
    write_node(schema, schema.root(), &mut seen, &mut out);
    out
}

fn write_node(schema: &Schema, node: &SchemaNode, seen: &mut HashSet<String>, out: &mut String) {
    match node {
        SchemaNode::Ref(name) => match schema.lookup(name) {
            // A forward reference is the first occurrence.
            Some(def) if def.name().is_some_and(|n| !seen.contains(&n.fullname())) => {
                write_node(schema, def, seen, out)
            }
            def => {
                let fullname = def.and_then(SchemaNode::name).unwrap_or(name).fullname();
                quoted(out, &fullname);
            }
        },
        SchemaNode::Record(record) => {
            let fullname = record.name.fullname();
            if !seen.insert(fullname.clone()) {
                quoted(out, &fullname);
                return;
            }
            out.push_str("{\"name\":");
            quoted(out, &fullname);
            out.push_str(",\"type\":\"record\",\"fields\":[");
            for (i, field) in record.fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str("{\"name\":");
                quoted(out, &field.name);
                out.push_str(",\"type\":");
                write_node(schema, &field.schema, seen, out);
                out.push('}');
            }
            out.push_str("]}");
        }
        SchemaNode::Enum(e) => {
            let fullname = e.name.fullname();
            if !seen.insert(fullname.clone()) {
                quoted(out, &fullname);
                return;
            }
            out.push_str("{\"name\":");
            quoted(out, &fullname);
            out.push_str(",\"type\":\"enum\",\"symbols\":[");
            for (i, symbol) in e.symbols.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                quoted(out, symbol);
            }
            out.push_str("]}");
        }
        SchemaNode::Fixed(f) => {
            let fullname = f.name.fullname();
            if !seen.insert(fullname.clone()) {
                quoted(out, &fullname);
                return;
            }
            out.push_str("{\"name\":");
            quoted(out, &fullname);
            out.push_str(",\"type\":\"fixed\",\"size\":");
            out.push_str(&f.size.to_string());
            out.push('}');
        }
        SchemaNode::Array(items) => {
            out.push_str("{\"type\":\"array\",\"items\":");
            write_node(schema, items, seen, out);
            out.push('}');
        }
        SchemaNode::Map(values) => {
            out.push_str("{\"type\":\"map\",\"values\":");
            write_node(schema, values, seen, out);
            out.push('}');
        }
        SchemaNode::Union(branches) => {
            out.push('[');
            for (i, branch) in branches.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_node(schema, branch, seen, out);
            }
            out.push(']');
        }
        primitive => quoted(out, primitive.kind()),
    }
}

fn quoted(out: &mut String, s: &str) {
    out.push('"');
    out.push_str(s);
    out.push('"');
}
