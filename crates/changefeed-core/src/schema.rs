//! Schema Model
//!
//! Every container file embeds the JSON text of the schema its items were written
//! with. This module parses that text into a `Schema` tree.
//!
//! ## Supported Subset
//!
//! Only what the change feed producer actually emits is accepted:
//! - Primitives (`null`, `boolean`, `int`, `long`, `float`, `double`, `bytes`,
//!   `string`), either as a bare name or as `{"type": "<name>"}`
//! - `record` (with `namespace`), `enum`, `array`, `map`, and unions (JSON arrays)
//! - References to a record or enum defined earlier in the same schema
//! - `logicalType` annotations are ignored; the underlying type is decoded
//!
//! Anything else fails fast with `UnsupportedSchemaFeature` instead of being
//! silently misread:
//! - `fixed` declarations
//! - `aliases` on records and enums
//! - References to names not yet defined (including recursive records)
//!
//! Malformed JSON, or a JSON shape that isn't a schema at all, is `InvalidSchema`.
//!
//! ## Example
//! ```ignore
//! let schema = Schema::parse_str(r#"["null", "string"]"#)?;
//! assert_eq!(schema, Schema::Union(vec![Schema::Null, Schema::String]));
//! ```

use serde_json::{Map, Value as Json};
use std::collections::HashMap;

use crate::{Error, Result};

/// A parsed schema node
#[derive(Debug, Clone, PartialEq)]
pub enum Schema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    /// Fixed-size byte run. Never produced by the parser, but decodable when built
    /// directly.
    Fixed(usize),
    Enum {
        name: String,
        symbols: Vec<String>,
    },
    Array(Box<Schema>),
    Map(Box<Schema>),
    Union(Vec<Schema>),
    Record {
        name: String,
        fields: Vec<Field>,
    },
}

/// A named record field
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: Schema,
}

impl Schema {
    /// Parse schema JSON text
    pub fn parse_str(text: &str) -> Result<Self> {
        let json: Json = serde_json::from_str(text)
            .map_err(|e| Error::InvalidSchema(format!("schema is not valid JSON: {}", e)))?;
        Self::parse(&json)
    }

    /// Parse an already-deserialized schema JSON tree
    pub fn parse(json: &Json) -> Result<Self> {
        Parser::default().parse(json, None)
    }

    /// Name of a record or enum schema
    pub fn name(&self) -> Option<&str> {
        match self {
            Schema::Record { name, .. } | Schema::Enum { name, .. } => Some(name),
            _ => None,
        }
    }
}

fn primitive(name: &str) -> Option<Schema> {
    Some(match name {
        "null" => Schema::Null,
        "boolean" => Schema::Boolean,
        "int" => Schema::Int,
        "long" => Schema::Long,
        "float" => Schema::Float,
        "double" => Schema::Double,
        "bytes" => Schema::Bytes,
        "string" => Schema::String,
        _ => return None,
    })
}

/// Tracks named types defined so far, keyed by both full and simple name
#[derive(Default)]
struct Parser {
    named: HashMap<String, Schema>,
}

impl Parser {
    fn parse(&mut self, json: &Json, namespace: Option<&str>) -> Result<Schema> {
        match json {
            Json::String(name) => self.parse_name(name, namespace),
            Json::Array(branches) => self.parse_union(branches, namespace),
            Json::Object(object) => self.parse_object(object, namespace),
            other => Err(Error::InvalidSchema(format!(
                "expected a type name, object or union, found {}",
                other
            ))),
        }
    }

    fn parse_name(&self, name: &str, namespace: Option<&str>) -> Result<Schema> {
        if let Some(schema) = primitive(name) {
            return Ok(schema);
        }

        let qualified = qualify(name, namespace);
        self.named
            .get(&qualified)
            .or_else(|| self.named.get(name))
            .cloned()
            .ok_or_else(|| {
                Error::UnsupportedSchemaFeature(format!("reference to undefined type '{}'", name))
            })
    }

    fn parse_union(&mut self, branches: &[Json], namespace: Option<&str>) -> Result<Schema> {
        let mut parsed = Vec::with_capacity(branches.len());
        for branch in branches {
            let schema = self.parse(branch, namespace)?;
            if matches!(schema, Schema::Union(_)) {
                return Err(Error::InvalidSchema(
                    "unions may not immediately contain other unions".to_string(),
                ));
            }
            parsed.push(schema);
        }
        Ok(Schema::Union(parsed))
    }

    fn parse_object(&mut self, object: &Map<String, Json>, namespace: Option<&str>) -> Result<Schema> {
        let type_name = match object.get("type") {
            Some(Json::String(type_name)) => type_name.as_str(),
            // {"type": {...}} or {"type": [...]} wraps another schema
            Some(nested @ (Json::Object(_) | Json::Array(_))) => return self.parse(nested, namespace),
            Some(other) => {
                return Err(Error::InvalidSchema(format!("invalid 'type' attribute: {}", other)))
            }
            None => return Err(Error::InvalidSchema("schema object without 'type'".to_string())),
        };

        match type_name {
            "record" | "error" => self.parse_record(object, namespace),
            "enum" => self.parse_enum(object, namespace),
            "array" => {
                let items = object
                    .get("items")
                    .ok_or_else(|| Error::InvalidSchema("array without 'items'".to_string()))?;
                Ok(Schema::Array(Box::new(self.parse(items, namespace)?)))
            }
            "map" => {
                let values = object
                    .get("values")
                    .ok_or_else(|| Error::InvalidSchema("map without 'values'".to_string()))?;
                Ok(Schema::Map(Box::new(self.parse(values, namespace)?)))
            }
            "fixed" => Err(Error::UnsupportedSchemaFeature(
                "fixed types are not supported".to_string(),
            )),
            other => self.parse_name(other, namespace),
        }
    }

    fn parse_record(&mut self, object: &Map<String, Json>, namespace: Option<&str>) -> Result<Schema> {
        let (name, full_name, namespace) = named_type(object, namespace, "record")?;
        reject_aliases(object, &name)?;

        let fields_json = object
            .get("fields")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::InvalidSchema(format!("record '{}' without 'fields' array", name)))?;

        let mut fields = Vec::with_capacity(fields_json.len());
        for field in fields_json {
            let field_name = field
                .get("name")
                .and_then(Json::as_str)
                .ok_or_else(|| Error::InvalidSchema(format!("field of record '{}' without a name", name)))?;
            let field_type = field.get("type").ok_or_else(|| {
                Error::InvalidSchema(format!("field '{}.{}' without a type", name, field_name))
            })?;
            fields.push(Field {
                name: field_name.to_string(),
                schema: self.parse(field_type, namespace.as_deref())?,
            });
        }

        let schema = Schema::Record { name: name.clone(), fields };
        self.define(name, full_name, &schema);
        Ok(schema)
    }

    fn parse_enum(&mut self, object: &Map<String, Json>, namespace: Option<&str>) -> Result<Schema> {
        let (name, full_name, _) = named_type(object, namespace, "enum")?;
        reject_aliases(object, &name)?;

        let symbols = object
            .get("symbols")
            .and_then(Json::as_array)
            .ok_or_else(|| Error::InvalidSchema(format!("enum '{}' without 'symbols' array", name)))?
            .iter()
            .map(|symbol| {
                symbol.as_str().map(str::to_string).ok_or_else(|| {
                    Error::InvalidSchema(format!("enum '{}' has a non-string symbol", name))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let schema = Schema::Enum { name: name.clone(), symbols };
        self.define(name, full_name, &schema);
        Ok(schema)
    }

    fn define(&mut self, name: String, full_name: String, schema: &Schema) {
        self.named.insert(full_name, schema.clone());
        self.named.entry(name).or_insert_with(|| schema.clone());
    }
}

/// Returns (simple name, full name, namespace for nested definitions)
fn named_type(
    object: &Map<String, Json>,
    enclosing: Option<&str>,
    kind: &str,
) -> Result<(String, String, Option<String>)> {
    let name = object
        .get("name")
        .and_then(Json::as_str)
        .ok_or_else(|| Error::InvalidSchema(format!("{} without a name", kind)))?;

    let namespace = match name.rsplit_once('.') {
        Some((ns, _)) => Some(ns.to_string()),
        None => object
            .get("namespace")
            .and_then(Json::as_str)
            .map(str::to_string)
            .or_else(|| enclosing.map(str::to_string)),
    };
    let simple = name.rsplit('.').next().unwrap_or(name).to_string();
    let full = qualify(&simple, namespace.as_deref());

    Ok((simple, full, namespace))
}

fn qualify(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

fn reject_aliases(object: &Map<String, Json>, name: &str) -> Result<()> {
    if object.contains_key("aliases") {
        return Err(Error::UnsupportedSchemaFeature(format!(
            "aliases on '{}' are not supported",
            name
        )));
    }
    Ok(())
}
