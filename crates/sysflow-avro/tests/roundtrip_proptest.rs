use proptest::prelude::*;
use sysflow_avro::vm::decode_value;
use sysflow_avro::{compile, CodecConfig, Schema, Value, Writer};

const SAMPLE: &str = r#"{"type":"record","name":"Sample","fields":[
    {"name":"b","type":"boolean"},
    {"name":"i","type":"int"},
    {"name":"l","type":"long"},
    {"name":"d","type":"double"},
    {"name":"s","type":"string"},
    {"name":"by","type":"bytes"},
    {"name":"fx","type":{"type":"fixed","name":"Four","size":4}},
    {"name":"e","type":{"type":"enum","name":"Color","symbols":["RED","GREEN","BLUE"]}},
    {"name":"arr","type":{"type":"array","items":"long"}},
    {"name":"m","type":{"type":"map","values":["null","string"]}},
    {"name":"opt","type":["null","Four","int"]}
]}"#;

const PROJECTION: &str = r#"{"type":"record","name":"Sample","fields":[
    {"name":"m","type":{"type":"map","values":["null","string"]}},
    {"name":"l","type":"double"},
    {"name":"s","type":"string"},
    {"name":"extra","type":"int","default":5}
]}"#;

const SYMBOLS: [&str; 3] = ["RED", "GREEN", "BLUE"];

fn union(branch: usize, value: Value) -> Value {
    Value::Union(branch, Box::new(value))
}

fn sample() -> impl Strategy<Value = Value> {
    let opt = prop_oneof![
        Just(union(0, Value::Null)),
        any::<[u8; 4]>().prop_map(|b| union(1, Value::Fixed(b.to_vec()))),
        any::<i32>().prop_map(|n| union(2, Value::Int(n))),
    ];
    (
        any::<bool>(),
        any::<i32>(),
        any::<i64>(),
        -1e12f64..1e12,
        ".{0,12}",
        prop::collection::vec(any::<u8>(), 0..16),
        any::<[u8; 4]>(),
        0usize..3,
        prop::collection::vec(any::<i64>(), 0..20),
        prop::collection::btree_map("[a-z]{1,4}", prop::option::of("[a-z]{0,6}"), 0..6),
        opt,
    )
        .prop_map(|(b, i, l, d, s, by, fx, e, arr, m, opt)| {
            Value::Record(vec![
                ("b".into(), Value::Boolean(b)),
                ("i".into(), Value::Int(i)),
                ("l".into(), Value::Long(l)),
                ("d".into(), Value::Double(d)),
                ("s".into(), Value::String(s)),
                ("by".into(), Value::Bytes(by)),
                ("fx".into(), Value::Fixed(fx.to_vec())),
                ("e".into(), Value::Enum(e, SYMBOLS[e].into())),
                ("arr".into(), Value::Array(arr.into_iter().map(Value::Long).collect())),
                (
                    "m".into(),
                    Value::Map(
                        m.into_iter()
                            .map(|(k, v)| {
                                let v = match v {
                                    Some(s) => union(1, Value::String(s)),
                                    None => union(0, Value::Null),
                                };
                                (k, v)
                            })
                            .collect(),
                    ),
                ),
                ("opt".into(), opt),
            ])
        })
}

fn encode(schema: &Schema, value: &Value, block_size: usize) -> Vec<u8> {
    let mut out = Vec::new();
    Writer::with_config(CodecConfig::default().with_block_size(block_size))
        .write_value(schema, value, &mut out)
        .unwrap();
    out
}

proptest! {
    #[test]
    fn identical_schemas_round_trip(value in sample(), block_size in 0usize..4) {
        let schema = Schema::parse(SAMPLE).unwrap();
        let program = compile(&schema, &schema).unwrap();
        let bytes = encode(&schema, &value, block_size);

        let mut input = &bytes[..];
        let decoded = decode_value(&program, &mut input).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert!(input.is_empty());
    }

    #[test]
    fn projections_skip_every_dropped_field(value in sample(), block_size in 0usize..4) {
        let writer = Schema::parse(SAMPLE).unwrap();
        let reader = Schema::parse(PROJECTION).unwrap();
        let program = compile(&writer, &reader).unwrap();
        let mut bytes = encode(&writer, &value, block_size);
        bytes.push(0xee);

        let mut input = &bytes[..];
        let decoded = decode_value(&program, &mut input).unwrap();
        prop_assert_eq!(input, &[0xee][..]);

        let l = match value.field("l") {
            Some(Value::Long(l)) => *l as f64,
            other => panic!("unexpected l {other:?}"),
        };
        let expected = Value::Record(vec![
            ("m".into(), value.field("m").cloned().unwrap()),
            ("l".into(), Value::Double(l)),
            ("s".into(), value.field("s").cloned().unwrap()),
            ("extra".into(), Value::Int(5)),
        ]);
        prop_assert_eq!(decoded, expected);
    }
}
