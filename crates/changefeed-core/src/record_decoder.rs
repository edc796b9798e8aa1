//! Record Decoder
//!
//! `RecordDecoder` compiles a `Schema` into a decoding plan once, then applies the plan
//! to as many items as the file holds. Interpreting the schema tree (resolving names,
//! building the enum symbol tables, interning field names) happens at compile time, so
//! per-item work is just reading bytes and building `Value`s.
//!
//! ## Decoding Rules
//!
//! - **Primitives** decode through `BinaryDecoder`
//! - **Union**: a `long` branch index, then the value for that branch
//!   (`InvalidUnionIndex` when out of range)
//! - **Enum**: a `long` symbol index (`InvalidEnumIndex` when out of range)
//! - **Record**: each field in declaration order; the result carries the record name
//! - **Array / Map**: a sequence of blocks (see `BinaryDecoder::read_block_count`);
//!   map items are a `string` key followed by the value. Each block count is checked
//!   against the fewest bytes an item can take, so a few bytes of input can't
//!   claim billions of items.
//!
//! ## Example
//! ```ignore
//! let decoder = RecordDecoder::new(&schema);
//! let mut input = BinaryDecoder::new(bytes);
//! while input.has_remaining() {
//!     let value = decoder.decode(&mut input)?;
//! }
//! ```

use bytes::Buf;
use std::collections::HashMap;
use std::sync::Arc;

use crate::decoder::BinaryDecoder;
use crate::schema::Schema;
use crate::value::{Record, Value};
use crate::{Error, Result};

/// Compiled form of one schema node
#[derive(Debug)]
enum Plan {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Fixed(usize),
    Enum(Vec<Arc<str>>),
    Array {
        items: Box<Plan>,
        item_width: usize,
    },
    Map {
        values: Box<Plan>,
        item_width: usize,
    },
    Union(Vec<Plan>),
    Record {
        name: Arc<str>,
        fields: Vec<(Arc<str>, Plan)>,
    },
}

impl Plan {
    fn compile(schema: &Schema) -> Self {
        match schema {
            Schema::Null => Plan::Null,
            Schema::Boolean => Plan::Boolean,
            Schema::Int => Plan::Int,
            Schema::Long => Plan::Long,
            Schema::Float => Plan::Float,
            Schema::Double => Plan::Double,
            Schema::Bytes => Plan::Bytes,
            Schema::String => Plan::String,
            Schema::Fixed(size) => Plan::Fixed(*size),
            Schema::Enum { symbols, .. } => {
                Plan::Enum(symbols.iter().map(|s| Arc::from(s.as_str())).collect())
            }
            Schema::Array(items) => {
                let items = Plan::compile(items);
                Plan::Array {
                    item_width: items.min_width(),
                    items: Box::new(items),
                }
            }
            Schema::Map(values) => {
                let values = Plan::compile(values);
                Plan::Map {
                    // String key length, then the value
                    item_width: 1 + values.min_width(),
                    values: Box::new(values),
                }
            }
            Schema::Union(branches) => Plan::Union(branches.iter().map(Plan::compile).collect()),
            Schema::Record { name, fields } => Plan::Record {
                name: Arc::from(name.as_str()),
                fields: fields
                    .iter()
                    .map(|field| (Arc::from(field.name.as_str()), Plan::compile(&field.schema)))
                    .collect(),
            },
        }
    }

    /// Fewest bytes one value of this plan can be encoded in
    fn min_width(&self) -> usize {
        match self {
            Plan::Null => 0,
            Plan::Float => 4,
            Plan::Double => 8,
            Plan::Fixed(size) => *size,
            Plan::Record { fields, .. } => fields
                .iter()
                .fold(0, |width, (_, plan)| width.saturating_add(plan.min_width())),
            // A single varint: value, length, index or terminating block count
            Plan::Boolean
            | Plan::Int
            | Plan::Long
            | Plan::Bytes
            | Plan::String
            | Plan::Enum(_)
            | Plan::Array { .. }
            | Plan::Map { .. }
            | Plan::Union(_) => 1,
        }
    }

    fn decode<B: Buf>(&self, input: &mut BinaryDecoder<B>) -> Result<Value> {
        Ok(match self {
            Plan::Null => {
                input.read_null()?;
                Value::Null
            }
            Plan::Boolean => Value::Boolean(input.read_boolean()?),
            Plan::Int => Value::Int(input.read_int()?),
            Plan::Long => Value::Long(input.read_long()?),
            Plan::Float => Value::Float(input.read_float()?),
            Plan::Double => Value::Double(input.read_double()?),
            Plan::Bytes => Value::Bytes(input.read_bytes()?),
            Plan::String => Value::String(input.read_string()?),
            Plan::Fixed(size) => Value::Fixed(input.read_fixed(*size)?),
            Plan::Enum(symbols) => {
                let index = input.read_int()? as i64;
                let symbol = usize::try_from(index)
                    .ok()
                    .and_then(|i| symbols.get(i))
                    .ok_or(Error::InvalidEnumIndex {
                        index,
                        symbols: symbols.len(),
                    })?;
                Value::Enum(symbol.clone())
            }
            Plan::Union(branches) => {
                let index = input.read_int()? as i64;
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| branches.get(i))
                    .ok_or(Error::InvalidUnionIndex {
                        index,
                        branches: branches.len(),
                    })?;
                branch.decode(input)?
            }
            Plan::Record { name, fields } => {
                let mut values = Vec::with_capacity(fields.len());
                for (field, plan) in fields {
                    values.push((field.clone(), plan.decode(input)?));
                }
                Value::Record(Record::new(name.clone(), values))
            }
            Plan::Array { items, item_width } => {
                let mut values = Vec::new();
                loop {
                    let count = input.read_bounded_block_count(*item_width, values.len() as u64)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        values.push(items.decode(input)?);
                    }
                }
                Value::Array(values)
            }
            Plan::Map { values, item_width } => {
                let mut map = HashMap::new();
                let mut decoded = 0u64;
                loop {
                    let count = input.read_bounded_block_count(*item_width, decoded)?;
                    if count == 0 {
                        break;
                    }
                    for _ in 0..count {
                        let key = input.read_string()?;
                        map.insert(key, values.decode(input)?);
                    }
                    decoded += count;
                }
                Value::Map(map)
            }
        })
    }
}

/// Decodes items of one schema, compiled once and reused per item
#[derive(Debug)]
pub struct RecordDecoder {
    plan: Plan,
}

impl RecordDecoder {
    pub fn new(schema: &Schema) -> Self {
        Self {
            plan: Plan::compile(schema),
        }
    }

    /// Fewest bytes one item can be encoded in
    pub fn item_width(&self) -> usize {
        self.plan.min_width()
    }

    /// Decode one item
    pub fn decode<B: Buf>(&self, input: &mut BinaryDecoder<B>) -> Result<Value> {
        self.plan.decode(input)
    }
}
