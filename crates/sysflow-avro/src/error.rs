//! Error taxonomy shared by every layer of the engine.

use std::io;

/// Problems found while parsing a schema. Never raised against a program
/// that already compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid schema JSON: {0}")]
    InvalidJson(String),
    #[error("unknown type: {0}")]
    UnknownType(String),
    #[error("missing attribute `{attribute}` in {context}")]
    MissingAttribute {
        attribute: &'static str,
        context: String,
    },
    #[error("invalid attribute `{attribute}` in {context}")]
    InvalidAttribute {
        attribute: &'static str,
        context: String,
    },
    #[error("invalid name: {0:?}")]
    InvalidName(String),
    #[error("named type defined twice: {0}")]
    DuplicateName(String),
    #[error("duplicate field `{field}` in record {record}")]
    DuplicateField { record: String, field: String },
    #[error("duplicate symbol `{symbol}` in enum {name}")]
    DuplicateSymbol { name: String, symbol: String },
    #[error("enum {name} default `{symbol}` is not one of its symbols")]
    InvalidEnumDefault { name: String, symbol: String },
    #[error("union must have at least one branch")]
    EmptyUnion,
    #[error("union may not directly contain a union")]
    NestedUnion,
    #[error("union contains more than one branch of type {0}")]
    DuplicateUnionBranch(String),
    #[error("unresolved named type reference: {0}")]
    UnresolvedName(String),
    #[error("default for field `{field}` in record {record} does not match its type")]
    InvalidDefault { record: String, field: String },
    #[error("expected a record schema, found {0}")]
    NotARecord(&'static str),
}

/// A writer/reader mismatch with no viable fallback.
///
/// Field-level gaps surface while compiling; enum symbol and union branch
/// mismatches surface while evaluating, once the offending value is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    #[error("reader field `{field}` of record {record} has no writer counterpart and no default")]
    MissingField { record: String, field: String },
    #[error("writer type {writer} cannot be read as {reader}")]
    Incompatible {
        writer: &'static str,
        reader: &'static str,
    },
    #[error("writer type {writer} does not match reader type {reader}")]
    NameMismatch { writer: String, reader: String },
    #[error("fixed {name}: writer size {writer} differs from reader size {reader}")]
    FixedSizeMismatch {
        name: String,
        writer: usize,
        reader: usize,
    },
    #[error("no branch of the reader union accepts writer type {0}")]
    NoMatchingBranch(String),
    #[error("writer symbol `{symbol}` is unknown to reader enum {name}")]
    UnknownSymbol { name: String, symbol: String },
    #[error("writer union branch {branch} ({writer}) has no counterpart in the reader schema")]
    UnresolvedBranch { branch: usize, writer: String },
}

/// Corrupt, truncated or otherwise invalid wire data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedEncoding {
    #[error("unexpected end of input")]
    EndOfInput,
    #[error("variable-length int is too long")]
    VarIntTooLong,
    #[error("variable-length long is too long")]
    VarLongTooLong,
    #[error("invalid boolean byte 0x{0:02x}")]
    InvalidBoolean(u8),
    #[error("negative length {0}")]
    NegativeLength(i64),
    #[error("length {0} exceeds the configured maximum")]
    LengthOverflow(i64),
    #[error("invalid UTF-8 in string")]
    InvalidUtf8,
    #[error("enum index {index} out of range for {symbols} symbols")]
    InvalidEnumIndex { index: i32, symbols: usize },
    #[error("union index {index} out of range for {branches} branches")]
    UnionIndexOutOfRange { index: i32, branches: usize },
    #[error("nesting deeper than {0} levels")]
    NestingTooDeep(usize),
}

/// The target does not support the operation the engine requested.
///
/// This is an integration bug between a schema and the type that claims to
/// conform to it, not a condition a caller can recover from.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("unknown field index {0}")]
    UnknownField(usize),
    #[error("field {0} is not nullable")]
    NotNullable(usize),
    #[error("field {0} has no default")]
    NoDefault(usize),
    #[error("target exposes {found} fields, schema record {record} has {expected}")]
    FieldCount {
        record: String,
        expected: usize,
        found: usize,
    },
    #[error("expected a {expected} handle, target exposes {found}")]
    KindMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("fixed target holds {found} bytes, schema requires {expected}")]
    FixedSize { expected: usize, found: usize },
    #[error("union branch {0} is not supported by the target")]
    UnionBranch(usize),
    #[error("enum index {0} is not representable by the target")]
    EnumIndex(usize),
    #[error("generic value does not conform to schema: {0}")]
    InvalidValue(String),
}

/// Any failure surfaced by the engine. A target that saw an error while
/// decoding must be discarded.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    #[error(transparent)]
    Malformed(#[from] MalformedEncoding),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Contract(#[from] ContractViolation),
}

pub type Result<T> = std::result::Result<T, Error>;
