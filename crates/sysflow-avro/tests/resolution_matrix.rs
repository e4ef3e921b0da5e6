use indexmap::IndexMap;
use sysflow_avro::{
    compile, compile_schema_text, eval, write, AvroField, CodecConfig, ContractViolation,
    EnumAccess, Error, Field, FieldAccessor, FieldMut, GenericRecord, ResolutionError, Schema,
    Value, Writer,
};

const EVENT: &str = r#"{"type":"record","name":"Event","namespace":"test","fields":[
    {"name":"id","type":"string"},
    {"name":"count","type":"long","default":0},
    {"name":"tags","type":{"type":"array","items":"string"}},
    {"name":"attrs","type":{"type":"map","values":"int"}},
    {"name":"note","type":["null","string"],"default":null},
    {"name":"level","type":{"type":"enum","name":"Level","symbols":["LOW","MID","HIGH"]},"default":"LOW"}
]}"#;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
enum Level {
    #[default]
    Low,
    Mid,
    High,
}

impl EnumAccess for Level {
    fn index(&self) -> usize {
        *self as usize
    }

    fn set_index(&mut self, index: usize) -> Result<(), ContractViolation> {
        *self = match index {
            0 => Level::Low,
            1 => Level::Mid,
            2 => Level::High,
            other => return Err(ContractViolation::EnumIndex(other)),
        };
        Ok(())
    }
}

#[derive(Debug, Default, Clone, PartialEq)]
struct Event {
    id: String,
    count: i64,
    tags: Vec<String>,
    attrs: IndexMap<String, i32>,
    note: Option<String>,
    level: Level,
}

impl FieldAccessor for Event {
    fn field_count(&self) -> usize {
        6
    }

    fn field(&self, index: usize) -> Result<Field<'_>, ContractViolation> {
        Ok(match index {
            0 => Field::String(&self.id),
            1 => Field::Long(self.count),
            2 => self.tags.as_field(),
            3 => self.attrs.as_field(),
            4 => self.note.as_field(),
            5 => Field::Enum(self.level.index()),
            other => return Err(ContractViolation::UnknownField(other)),
        })
    }

    fn field_mut(&mut self, index: usize) -> Result<FieldMut<'_>, ContractViolation> {
        Ok(match index {
            0 => FieldMut::String(&mut self.id),
            1 => FieldMut::Long(&mut self.count),
            2 => self.tags.as_field_mut(),
            3 => self.attrs.as_field_mut(),
            4 => self.note.as_field_mut(),
            5 => FieldMut::Enum(&mut self.level),
            other => return Err(ContractViolation::UnknownField(other)),
        })
    }

    fn set_default(&mut self, index: usize, default: &Value) -> Result<(), ContractViolation> {
        match (index, default) {
            (1, Value::Long(n)) => self.count = *n,
            (4, _) => self.note = None,
            (5, Value::Enum(i, _)) => self.level.set_index(*i)?,
            _ => return Err(ContractViolation::NoDefault(index)),
        }
        Ok(())
    }

    fn null_field(&mut self, index: usize) -> Result<(), ContractViolation> {
        match index {
            4 => {
                self.note = None;
                Ok(())
            }
            other => Err(ContractViolation::NotNullable(other)),
        }
    }
}

fn sample_event() -> Event {
    Event {
        id: "evt-1".into(),
        count: -12_345_678_901,
        tags: vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()],
        attrs: [("x".to_string(), 1), ("y".to_string(), -2), ("z".to_string(), 3)]
            .into_iter()
            .collect(),
        note: Some("hello".into()),
        level: Level::High,
    }
}

fn schema(text: &str) -> Schema {
    Schema::parse(text).unwrap()
}

fn encode_generic(schema: &Schema, fields: Vec<(&str, Value)>) -> Vec<u8> {
    let mut record = GenericRecord::new(schema).unwrap();
    for (name, value) in fields {
        assert!(record.put(name, value), "no field {name}");
    }
    let mut out = Vec::new();
    write(schema, &record, &mut out).unwrap();
    out
}

/// Decodes one record and returns it with the number of bytes consumed.
fn decode_generic(writer: &Schema, reader: &Schema, bytes: &[u8]) -> (Value, usize) {
    let program = compile(writer, reader).unwrap();
    let mut record = GenericRecord::new(reader).unwrap();
    let mut input = bytes;
    eval(&program, &mut input, &mut record).unwrap();
    (record.into_value(), bytes.len() - input.len())
}

fn decode_err(writer: &Schema, reader: &Schema, bytes: &[u8]) -> Error {
    let program = compile(writer, reader).unwrap();
    let mut record = GenericRecord::new(reader).unwrap();
    eval(&program, bytes, &mut record).unwrap_err()
}

#[test]
fn typed_round_trip() {
    let schema = schema(EVENT);
    let program = compile(&schema, &schema).unwrap();
    for event in [sample_event(), Event::default()] {
        let mut bytes = Vec::new();
        write(&schema, &event, &mut bytes).unwrap();
        let mut decoded = Event::default();
        eval(&program, &bytes[..], &mut decoded).unwrap();
        assert_eq!(decoded, event);
    }
}

#[test]
fn empty_collections_are_single_terminators() {
    let mut bytes = Vec::new();
    write(&schema(EVENT), &Event::default(), &mut bytes).unwrap();
    // id "", count 0, tags end, attrs end, note null branch, level LOW
    assert_eq!(bytes, [0, 0, 0, 0, 0, 0]);
}

#[test]
fn multi_block_collections_round_trip() {
    let schema = schema(EVENT);
    let event = sample_event();
    let mut blocked = Vec::new();
    Writer::with_config(CodecConfig::default().with_block_size(2))
        .write(&schema, &event, &mut blocked)
        .unwrap();
    let mut single = Vec::new();
    write(&schema, &event, &mut single).unwrap();
    // 5 tags in 3 blocks and 3 attrs in 2 blocks add 3 headers.
    assert_eq!(blocked.len(), single.len() + 3);

    let mut decoded = Event::default();
    eval(&compile(&schema, &schema).unwrap(), &blocked[..], &mut decoded).unwrap();
    assert_eq!(decoded.tags, event.tags);
    assert_eq!(
        decoded.attrs.keys().collect::<Vec<_>>(),
        ["x", "y", "z"]
    );
    assert_eq!(decoded, event);
}

#[test]
fn default_fallback_consumes_only_writer_bytes() {
    let v1 = schema(
        r#"{"type":"record","name":"Proc","fields":[
            {"name":"pid","type":"long"},
            {"name":"exe","type":"string"}
        ]}"#,
    );
    let v2 = schema(
        r#"{"type":"record","name":"Proc","fields":[
            {"name":"pid","type":"long"},
            {"name":"user","type":"string","default":"root"},
            {"name":"exe","type":"string"},
            {"name":"nice","type":"int","default":-1}
        ]}"#,
    );
    let mut bytes = encode_generic(
        &v1,
        vec![("pid", Value::Long(42)), ("exe", Value::from("/bin/sh"))],
    );
    let record_len = bytes.len();
    bytes.extend_from_slice(&[0xaa, 0xbb]);

    let (value, consumed) = decode_generic(&v1, &v2, &bytes);
    assert_eq!(consumed, record_len);
    assert_eq!(
        value,
        Value::Record(vec![
            ("pid".into(), Value::Long(42)),
            ("user".into(), Value::from("root")),
            ("exe".into(), Value::from("/bin/sh")),
            ("nice".into(), Value::Int(-1)),
        ])
    );
}

#[test]
fn unknown_fields_are_skipped_including_nested_structures() {
    let plain = schema(
        r#"{"type":"record","name":"Proc","fields":[
            {"name":"pid","type":"long"},
            {"name":"exe","type":"string"}
        ]}"#,
    );
    let extended = schema(
        r#"{"type":"record","name":"Proc","fields":[
            {"name":"pid","type":"long"},
            {"name":"env","type":{"type":"record","name":"Env","fields":[
                {"name":"vars","type":{"type":"map","values":{"type":"array","items":"string"}}},
                {"name":"flag","type":["null","boolean"]},
                {"name":"digest","type":{"type":"fixed","name":"Digest","size":4}},
                {"name":"kind","type":{"type":"enum","name":"Kind","symbols":["K0","K1"]}},
                {"name":"ratio","type":"double"}
            ]}},
            {"name":"exe","type":"string"}
        ]}"#,
    );
    let env = Value::Record(vec![
        (
            "vars".into(),
            Value::Map(vec![(
                "PATH".into(),
                Value::Array(vec![Value::from("/bin"), Value::from("/usr/bin")]),
            )]),
        ),
        ("flag".into(), Value::Union(1, Box::new(Value::Boolean(true)))),
        ("digest".into(), Value::Fixed(vec![1, 2, 3, 4])),
        ("kind".into(), Value::Enum(1, "K1".into())),
        ("ratio".into(), Value::Double(0.25)),
    ]);

    let mut with_env = encode_generic(
        &extended,
        vec![
            ("pid", Value::Long(7)),
            ("env", env),
            ("exe", Value::from("/usr/bin/env")),
        ],
    );
    let record_len = with_env.len();
    with_env.push(0x7f);
    let without_env = encode_generic(
        &plain,
        vec![("pid", Value::Long(7)), ("exe", Value::from("/usr/bin/env"))],
    );

    let (skipped, consumed) = decode_generic(&extended, &plain, &with_env);
    let (direct, _) = decode_generic(&plain, &plain, &without_env);
    assert_eq!(skipped, direct);
    assert_eq!(consumed, record_len);
}

#[test]
fn enum_symbols_are_remapped_by_name() {
    let writer = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["A","B","C"]}},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let reader = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["C","B","A"]}},
            {"name":"after","type":"int"}
        ]}"#,
    );
    for (written, expected) in [
        (Value::Enum(1, "B".into()), Value::Enum(1, "B".into())),
        (Value::Enum(0, "A".into()), Value::Enum(2, "A".into())),
        (Value::Enum(2, "C".into()), Value::Enum(0, "C".into())),
    ] {
        let bytes = encode_generic(&writer, vec![("e", written), ("after", Value::Int(7))]);
        let (value, _) = decode_generic(&writer, &reader, &bytes);
        assert_eq!(value.field("e"), Some(&expected));
        assert_eq!(value.field("after"), Some(&Value::Int(7)));
    }
}

#[test]
fn unknown_enum_symbol_fails_unless_a_default_exists() {
    let writer = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["A","B","C","D"]}},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let bytes = encode_generic(
        &writer,
        vec![("e", Value::Enum(3, "D".into())), ("after", Value::Int(7))],
    );

    let strict = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["C","B","A"]}},
            {"name":"after","type":"int"}
        ]}"#,
    );
    assert!(matches!(
        decode_err(&writer, &strict, &bytes),
        Error::Resolution(ResolutionError::UnknownSymbol { name, symbol })
            if name == "E" && symbol == "D"
    ));

    let field_default = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["C","B","A"]},"default":"C"},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let (value, consumed) = decode_generic(&writer, &field_default, &bytes);
    assert_eq!(value.field("e"), Some(&Value::Enum(0, "C".into())));
    assert_eq!(value.field("after"), Some(&Value::Int(7)));
    assert_eq!(consumed, bytes.len());

    let enum_default = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"e","type":{"type":"enum","name":"E","symbols":["C","B","A","OTHER"],"default":"OTHER"}},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let (value, _) = decode_generic(&writer, &enum_default, &bytes);
    assert_eq!(value.field("e"), Some(&Value::Enum(3, "OTHER".into())));
}

#[test]
fn nested_enum_mismatch_is_fatal_even_with_a_default() {
    let writer = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"es","type":{"type":"array","items":{"type":"enum","name":"E","symbols":["A","B"]}}}
        ]}"#,
    );
    let reader = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"es","type":{"type":"array","items":{"type":"enum","name":"E","symbols":["A"]}},"default":[]}
        ]}"#,
    );
    let bytes = encode_generic(
        &writer,
        vec![(
            "es",
            Value::Array(vec![Value::Enum(0, "A".into()), Value::Enum(1, "B".into())]),
        )],
    );
    assert!(matches!(
        decode_err(&writer, &reader, &bytes),
        Error::Resolution(ResolutionError::UnknownSymbol { .. })
    ));
}

#[test]
fn union_branches_resolve_by_type_not_position() {
    let writer = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"u","type":["null","string","boolean"]},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let strict = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"u","type":["string","null"]},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let with_default = schema(
        r#"{"type":"record","name":"R","fields":[
            {"name":"u","type":["null","string"],"default":null},
            {"name":"after","type":"int"}
        ]}"#,
    );
    let encode = |branch: usize, value: Value| {
        encode_generic(
            &writer,
            vec![
                ("u", Value::Union(branch, Box::new(value))),
                ("after", Value::Int(7)),
            ],
        )
    };

    let (value, _) = decode_generic(&writer, &strict, &encode(1, Value::from("x")));
    assert_eq!(
        value.field("u"),
        Some(&Value::Union(0, Box::new(Value::from("x"))))
    );
    let (value, _) = decode_generic(&writer, &strict, &encode(0, Value::Null));
    assert_eq!(value.field("u"), Some(&Value::Union(1, Box::new(Value::Null))));

    let bytes = encode(2, Value::Boolean(true));
    assert!(matches!(
        decode_err(&writer, &strict, &bytes),
        Error::Resolution(ResolutionError::UnresolvedBranch { branch: 2, writer })
            if writer == "boolean"
    ));
    let (value, consumed) = decode_generic(&writer, &with_default, &bytes);
    assert_eq!(value.field("u"), Some(&Value::Union(0, Box::new(Value::Null))));
    assert_eq!(value.field("after"), Some(&Value::Int(7)));
    assert_eq!(consumed, bytes.len());
}

#[test]
fn plain_writer_into_reader_union_and_back() {
    let long_writer = schema(r#"{"type":"record","name":"R","fields":[{"name":"n","type":"long"}]}"#);
    let union_reader =
        schema(r#"{"type":"record","name":"R","fields":[{"name":"n","type":["null","double"]}]}"#);
    let bytes = encode_generic(&long_writer, vec![("n", Value::Long(3))]);
    let (value, _) = decode_generic(&long_writer, &union_reader, &bytes);
    assert_eq!(
        value.field("n"),
        Some(&Value::Union(1, Box::new(Value::Double(3.0))))
    );

    let union_writer =
        schema(r#"{"type":"record","name":"R","fields":[{"name":"n","type":["null","long"]}]}"#);
    let null_bytes = encode_generic(&union_writer, vec![("n", Value::Union(0, Box::new(Value::Null)))]);
    assert!(matches!(
        decode_err(&union_writer, &long_writer, &null_bytes),
        Error::Resolution(ResolutionError::UnresolvedBranch { branch: 0, .. })
    ));
}

#[test]
fn promotions_into_typed_targets() {
    let writer = schema(&EVENT.replace(r#""type":"long","default":0"#, r#""type":"int""#));
    let bytes = encode_generic(
        &writer,
        vec![
            ("id", Value::from("p")),
            ("count", Value::Int(-5)),
            ("tags", Value::Array(vec![])),
            ("attrs", Value::Map(vec![("k".into(), Value::Int(9))])),
            ("note", Value::Union(0, Box::new(Value::Null))),
            ("level", Value::Enum(1, "MID".into())),
        ],
    );
    let mut event = Event::default();
    eval(&compile(&writer, &schema(EVENT)).unwrap(), &bytes[..], &mut event).unwrap();
    assert_eq!(event.count, -5);
    assert_eq!(event.attrs.get("k"), Some(&9));
    assert_eq!(event.note, None);
    assert_eq!(event.level, Level::Mid);
}

#[test]
fn missing_writer_fields_on_typed_targets_use_set_default() {
    let writer = schema(
        r#"{"type":"record","name":"Event","namespace":"test","fields":[
            {"name":"id","type":"string"},
            {"name":"tags","type":{"type":"array","items":"string"}},
            {"name":"attrs","type":{"type":"map","values":"int"}}
        ]}"#,
    );
    let bytes = encode_generic(
        &writer,
        vec![
            ("id", Value::from("old")),
            ("tags", Value::Array(vec![Value::from("t")])),
            ("attrs", Value::Map(vec![])),
        ],
    );
    let mut event = Event {
        count: 99,
        note: Some("stale".into()),
        level: Level::High,
        ..Event::default()
    };
    eval(&compile(&writer, &schema(EVENT)).unwrap(), &bytes[..], &mut event).unwrap();
    assert_eq!(event.id, "old");
    assert_eq!(event.tags, ["t"]);
    assert_eq!(event.count, 0);
    assert_eq!(event.note, None);
    assert_eq!(event.level, Level::Low);
}

#[test]
fn equal_schema_pairs_compile_to_equal_programs() {
    let reader = EVENT.replace(r#"["null","string"]"#, r#"["string","null"]"#);
    let a = compile_schema_text(EVENT, &reader).unwrap();
    let b = compile_schema_text(EVENT, &reader).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.instructions().len(), 6);
}

struct WrongShape {
    id: i32,
}

impl FieldAccessor for WrongShape {
    fn field_count(&self) -> usize {
        1
    }

    fn field(&self, _: usize) -> Result<Field<'_>, ContractViolation> {
        Ok(Field::Int(self.id))
    }

    fn field_mut(&mut self, _: usize) -> Result<FieldMut<'_>, ContractViolation> {
        Ok(FieldMut::Int(&mut self.id))
    }

    fn set_default(&mut self, index: usize, _: &Value) -> Result<(), ContractViolation> {
        Err(ContractViolation::NoDefault(index))
    }
}

#[test]
fn mismatched_targets_are_contract_violations() {
    let s = schema(r#"{"type":"record","name":"R","fields":[{"name":"id","type":"string"}]}"#);
    let program = compile(&s, &s).unwrap();
    let bytes = encode_generic(&s, vec![("id", Value::from("x"))]);

    let mut wrong = WrongShape { id: 0 };
    assert!(matches!(
        eval(&program, &bytes[..], &mut wrong),
        Err(Error::Contract(ContractViolation::KindMismatch {
            expected: "string",
            found: "int"
        }))
    ));
    assert!(matches!(
        write(&s, &wrong, Vec::new()),
        Err(Error::Contract(ContractViolation::KindMismatch {
            expected: "string",
            found: "int"
        }))
    ));

    let mut event = Event::default();
    assert!(matches!(
        eval(&program, &bytes[..], &mut event),
        Err(Error::Contract(ContractViolation::FieldCount {
            expected: 1,
            found: 6,
            ..
        }))
    ));
}

#[test]
fn truncated_records_are_malformed() {
    let s = schema(EVENT);
    let mut bytes = Vec::new();
    write(&s, &sample_event(), &mut bytes).unwrap();
    bytes.truncate(bytes.len() - 1);
    let mut event = Event::default();
    assert!(matches!(
        eval(&compile(&s, &s).unwrap(), &bytes[..], &mut event),
        Err(Error::Malformed(_))
    ));
}
