//! Decoded Values
//!
//! `Value` is the dynamically-typed output of the record decoder. Schemas are only
//! known once a container file is opened, so the decoder can't produce typed structs
//! directly; callers convert a `Value` into their own domain types right after
//! decoding (see `changefeed_storage::event`).
//!
//! ## Records
//! A decoded record keeps its fields in schema order and remembers the name of the
//! record schema it came from. Unions may hold several record types, and the name is
//! the only way to tell the branches apart once decoded.
//!
//! ## Names
//! Record, field and enum symbol names are `Arc<str>` shared with the compiled
//! decoder, so decoding an item never allocates a name.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

/// A single decoded value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Bytes(Bytes),
    String(String),
    Fixed(Bytes),
    /// The symbol an enum index resolved to
    Enum(Arc<str>),
    Array(Vec<Value>),
    Map(HashMap<String, Value>),
    Record(Record),
}

/// A decoded record: ordered fields plus the name of the schema that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: Arc<str>,
    fields: Vec<(Arc<str>, Value)>,
}

impl Record {
    pub fn new(name: Arc<str>, fields: Vec<(Arc<str>, Value)>) -> Self {
        Self { name, fields }
    }

    /// Name of the record schema this value was decoded with
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a field by name
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(name, _)| name.as_ref() == field)
            .map(|(_, value)| value)
    }

    /// Fields in schema order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_ref(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// String contents of a `String` or `Enum` value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            Value::Enum(symbol) => Some(symbol),
            _ => None,
        }
    }

    /// Integer contents, widening `Int` to 64 bits
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Short type name, used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Int(_) => "int",
            Value::Long(_) => "long",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::Bytes(_) => "bytes",
            Value::String(_) => "string",
            Value::Fixed(_) => "fixed",
            Value::Enum(_) => "enum",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
            Value::Record(_) => "record",
        }
    }
}
