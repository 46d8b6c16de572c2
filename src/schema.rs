//! Raw schema nodes, parsed from JSON values with their document location.
//!
//! Parsing is lenient: unknown keywords are ignored and malformed keyword
//! values are dropped with a warning. Semantic checks happen in the builder,
//! where the location of every node is still at hand.
use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tracing::warn;

use crate::config::ContainerInit;
use crate::ir::Literal;

// ————————————————————————————————————————————————————————————————————————————
// LOCATION
// ————————————————————————————————————————————————————————————————————————————

/// A document identity plus a JSON pointer into it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Location {
    pub document: String,
    pub pointer: Vec<String>,
}

impl Location {
    pub fn root(document: impl Into<String>) -> Self {
        Self {
            document: document.into(),
            pointer: Vec::new(),
        }
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut pointer = self.pointer.clone();
        pointer.push(segment.into());
        Self {
            document: self.document.clone(),
            pointer,
        }
    }

    /// `true` when `self` is `other` or lies underneath it.
    pub fn starts_with(&self, other: &Location) -> bool {
        self.document == other.document && self.pointer.starts_with(&other.pointer)
    }

    pub fn pointer_string(&self) -> String {
        let mut out = String::new();
        for segment in &self.pointer {
            out.push('/');
            out.push_str(&segment.replace('~', "~0").replace('/', "~1"));
        }
        out
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.document, self.pointer_string())
    }
}

impl Serialize for Location {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// NODE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKeyword {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl TypeKeyword {
    fn parse(raw: &str) -> Option<Self> {
        Some(match raw {
            "string" => Self::String,
            "integer" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "object" => Self::Object,
            "array" => Self::Array,
            "null" => Self::Null,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub enum Additional {
    Allowed(bool),
    Schema(Box<SchemaNode>),
}

/// Validation keywords carried to the IR untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constraints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<OrderedFloat<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<OrderedFloat<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<OrderedFloat<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<OrderedFloat<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<OrderedFloat<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    pub location: Location,
    /// `Some` for the boolean schemas `true` / `false`.
    pub boolean: Option<bool>,
    pub id: Option<String>,
    pub reference: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub types: Vec<TypeKeyword>,
    /// OpenAPI-style `nullable: true`.
    pub nullable: bool,
    pub format: Option<String>,
    pub enum_values: Option<Vec<Value>>,
    pub const_value: Option<Value>,
    pub properties: Option<IndexMap<String, SchemaNode>>,
    pub required: Vec<String>,
    pub items: Option<Box<SchemaNode>>,
    pub additional: Option<Additional>,
    pub all_of: Vec<SchemaNode>,
    pub one_of: Vec<SchemaNode>,
    pub any_of: Vec<SchemaNode>,
    pub defs: IndexMap<String, SchemaNode>,
    pub definitions: IndexMap<String, SchemaNode>,
    pub default: Option<Value>,
    pub deprecated: bool,
    /// `x-name`: replaces the computed local name.
    pub rename: Option<String>,
    /// `x-container-init`
    pub container_init: Option<ContainerInit>,
    /// Every other `x-*` keyword with a string value.
    pub extensions: BTreeMap<String, String>,
    pub constraints: Constraints,
}

impl Default for Location {
    fn default() -> Self {
        Location::root("")
    }
}

impl SchemaNode {
    pub fn parse(value: &Value, location: Location) -> Self {
        let mut node = SchemaNode {
            location,
            ..Default::default()
        };
        let map = match value {
            Value::Bool(flag) => {
                node.boolean = Some(*flag);
                return node;
            }
            Value::Object(map) => map,
            _ => {
                warn!(location = %node.location, "schema is neither an object nor a boolean, treating it as unconstrained");
                return node;
            }
        };
        for (key, raw) in map {
            match key.as_str() {
                "$ref" => node.reference = string(raw),
                "$id" => node.id = string(raw),
                "title" => node.title = string(raw),
                "description" => node.description = string(raw),
                "format" => node.format = string(raw),
                "type" => node.types = parse_types(raw, &node.location),
                "nullable" => node.nullable = raw.as_bool().unwrap_or(false),
                "enum" => match raw {
                    Value::Array(values) => node.enum_values = Some(values.clone()),
                    _ => warn!(location = %node.location, "`enum` is not an array, ignoring it"),
                },
                "const" => node.const_value = Some(raw.clone()),
                "properties" => {
                    node.properties = raw.as_object().map(|props| {
                        let base = node.location.child("properties");
                        props
                            .iter()
                            .map(|(name, schema)| (name.clone(), SchemaNode::parse(schema, base.child(name))))
                            .collect()
                    })
                }
                "required" => {
                    node.required = raw
                        .as_array()
                        .map(|names| names.iter().filter_map(|n| n.as_str().map(str::to_owned)).collect())
                        .unwrap_or_default()
                }
                "items" => match raw {
                    Value::Object(_) | Value::Bool(_) => {
                        node.items = Some(Box::new(SchemaNode::parse(raw, node.location.child("items"))))
                    }
                    _ => warn!(location = %node.location, "tuple-form `items` is not supported, treating items as unconstrained"),
                },
                "additionalProperties" => {
                    node.additional = match raw {
                        Value::Bool(flag) => Some(Additional::Allowed(*flag)),
                        Value::Object(_) => Some(Additional::Schema(Box::new(SchemaNode::parse(
                            raw,
                            node.location.child("additionalProperties"),
                        )))),
                        _ => None,
                    }
                }
                "allOf" => node.all_of = parse_list(raw, node.location.child("allOf")),
                "oneOf" => node.one_of = parse_list(raw, node.location.child("oneOf")),
                "anyOf" => node.any_of = parse_list(raw, node.location.child("anyOf")),
                "$defs" => node.defs = parse_map(raw, node.location.child("$defs")),
                "definitions" => node.definitions = parse_map(raw, node.location.child("definitions")),
                "default" => node.default = Some(raw.clone()),
                "deprecated" => node.deprecated = raw.as_bool().unwrap_or(false),
                "x-name" => node.rename = string(raw),
                "x-container-init" => {
                    node.container_init = match raw.as_str() {
                        Some("eager") => Some(ContainerInit::Eager),
                        Some("lazy") => Some(ContainerInit::Lazy),
                        _ => {
                            warn!(location = %node.location, value = %raw, "unknown x-container-init value, ignoring it");
                            None
                        }
                    }
                }
                "minLength" => node.constraints.min_length = raw.as_u64(),
                "maxLength" => node.constraints.max_length = raw.as_u64(),
                "pattern" => node.constraints.pattern = string(raw),
                "minimum" => node.constraints.minimum = float(raw),
                "maximum" => node.constraints.maximum = float(raw),
                "exclusiveMinimum" => node.constraints.exclusive_minimum = float(raw),
                "exclusiveMaximum" => node.constraints.exclusive_maximum = float(raw),
                "multipleOf" => node.constraints.multiple_of = float(raw),
                "minItems" => node.constraints.min_items = raw.as_u64(),
                "maxItems" => node.constraints.max_items = raw.as_u64(),
                "uniqueItems" => node.constraints.unique_items = raw.as_bool().unwrap_or(false),
                other if other.starts_with("x-") => {
                    if let Some(text) = raw.as_str() {
                        node.extensions.insert(other.to_owned(), text.to_owned());
                    }
                }
                _ => {}
            }
        }
        node
    }

    /// Every `$defs` / `definitions` member declared directly on this node.
    pub fn declared_definitions(&self) -> impl Iterator<Item = (&String, &SchemaNode)> {
        self.defs.iter().chain(self.definitions.iter())
    }

    /// Keywords other than `$ref` that constrain the shape.
    pub fn has_shape_keywords(&self) -> bool {
        !self.types.is_empty()
            || self.format.is_some()
            || self.enum_values.is_some()
            || self.const_value.is_some()
            || self.properties.is_some()
            || self.items.is_some()
            || self.additional.is_some()
            || !self.all_of.is_empty()
            || !self.one_of.is_empty()
            || !self.any_of.is_empty()
    }

    /// A `$ref` with no structural siblings.
    pub fn is_bare_reference(&self) -> bool {
        self.reference.is_some() && !self.has_shape_keywords()
    }

    /// Whether a document root declares a type of its own rather than only hosting `$defs`.
    pub fn declares_shape(&self) -> bool {
        self.reference.is_some() || self.has_shape_keywords() || self.boolean.is_some()
    }

    pub fn has_union(&self) -> bool {
        !self.one_of.is_empty() || !self.any_of.is_empty()
    }

    /// `type` lists `"null"` or the node says `nullable: true`.
    pub fn is_nullable(&self) -> bool {
        self.nullable || self.types.contains(&TypeKeyword::Null)
    }

    /// Non-null `type` keywords, in declaration order.
    pub fn concrete_types(&self) -> Vec<TypeKeyword> {
        self.types.iter().copied().filter(|t| *t != TypeKeyword::Null).collect()
    }

    /// A single fixed value: `const`, or an `enum` with exactly one non-null member.
    pub fn literal(&self) -> Option<Literal> {
        if let Some(value) = &self.const_value {
            return (!value.is_null()).then(|| Literal::from_value(value));
        }
        let values = self.enum_values.as_ref()?;
        let mut concrete = values.iter().filter(|v| !v.is_null());
        match (concrete.next(), concrete.next()) {
            (Some(only), None) => Some(Literal::from_value(only)),
            _ => None,
        }
    }

    /// Object-shaped: declares properties, an object type, or additional properties.
    pub fn is_object_like(&self) -> bool {
        self.properties.is_some()
            || self.concrete_types() == [TypeKeyword::Object]
            || (self.additional.is_some() && self.concrete_types().is_empty())
    }

    /// Walks one pointer segment (plus its argument, when the keyword takes one).
    pub fn step<'a>(&'a self, segments: &[String]) -> Option<(&'a SchemaNode, usize)> {
        let keyword = segments.first()?.as_str();
        let argument = segments.get(1);
        let indexed = |list: &'a [SchemaNode]| -> Option<(&'a SchemaNode, usize)> {
            let index: usize = argument?.parse().ok()?;
            list.get(index).map(|n| (n, 2))
        };
        match keyword {
            "$defs" => self.defs.get(argument?.as_str()).map(|n| (n, 2)),
            "definitions" => self.definitions.get(argument?.as_str()).map(|n| (n, 2)),
            "properties" => self.properties.as_ref()?.get(argument?.as_str()).map(|n| (n, 2)),
            "items" => self.items.as_deref().map(|n| (n, 1)),
            "additionalProperties" => match &self.additional {
                Some(Additional::Schema(node)) => Some((node.as_ref(), 1)),
                _ => None,
            },
            "allOf" => indexed(&self.all_of),
            "oneOf" => indexed(&self.one_of),
            "anyOf" => indexed(&self.any_of),
            _ => None,
        }
    }

    /// The node at `pointer` below this one.
    pub fn walk(&self, pointer: &[String]) -> Option<&SchemaNode> {
        let mut node = self;
        let mut rest = pointer;
        while !rest.is_empty() {
            let (next, consumed) = node.step(rest)?;
            node = next;
            rest = &rest[consumed..];
        }
        Some(node)
    }

    /// Direct sub-schemas, excluding `$defs` / `definitions`.
    pub fn children(&self) -> impl Iterator<Item = &SchemaNode> {
        let additional = match &self.additional {
            Some(Additional::Schema(node)) => Some(node.as_ref()),
            _ => None,
        };
        self.properties
            .iter()
            .flat_map(|props| props.values())
            .chain(self.items.as_deref())
            .chain(additional)
            .chain(self.all_of.iter())
            .chain(self.one_of.iter())
            .chain(self.any_of.iter())
    }
}

// ---- keyword helpers ----

fn string(raw: &Value) -> Option<String> {
    raw.as_str().map(str::to_owned)
}

fn float(raw: &Value) -> Option<OrderedFloat<f64>> {
    raw.as_f64().map(OrderedFloat)
}

fn parse_types(raw: &Value, location: &Location) -> Vec<TypeKeyword> {
    let names: Vec<&str> = match raw {
        Value::String(name) => vec![name.as_str()],
        Value::Array(names) => names.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .filter_map(|name| {
            let parsed = TypeKeyword::parse(name);
            if parsed.is_none() {
                warn!(%location, name, "unknown type keyword, ignoring it");
            }
            parsed
        })
        .collect()
}

fn parse_list(raw: &Value, base: Location) -> Vec<SchemaNode> {
    raw.as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .map(|(index, item)| SchemaNode::parse(item, base.child(index.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn parse_map(raw: &Value, base: Location) -> IndexMap<String, SchemaNode> {
    raw.as_object()
        .map(|members| {
            members
                .iter()
                .map(|(name, schema)| (name.clone(), SchemaNode::parse(schema, base.child(name))))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> SchemaNode {
        SchemaNode::parse(&value, Location::root("doc.json"))
    }

    #[test]
    fn locations_follow_the_keyword_path() {
        let node = parse(json!({
            "$defs": {
                "Person": {
                    "type": "object",
                    "properties": { "tags": { "type": "array", "items": { "type": "string" } } }
                }
            }
        }));
        let items = node
            .walk(&["$defs", "Person", "properties", "tags", "items"].map(String::from))
            .unwrap();
        assert_eq!(items.location.to_string(), "doc.json#/$defs/Person/properties/tags/items");
        assert_eq!(items.types, vec![TypeKeyword::String]);
    }

    #[test]
    fn pointer_segments_are_escaped_on_display() {
        let location = Location::root("d").child("properties").child("a/b~c");
        assert_eq!(location.to_string(), "d#/properties/a~1b~0c");
    }

    #[test]
    fn type_arrays_with_null_mark_the_node_nullable() {
        let node = parse(json!({ "type": ["string", "null"], "format": "date" }));
        assert!(node.is_nullable());
        assert_eq!(node.concrete_types(), vec![TypeKeyword::String]);
        assert_eq!(node.format.as_deref(), Some("date"));
    }

    #[test]
    fn extensions_and_overrides_are_split_out() {
        let node = parse(json!({
            "x-name": "customName",
            "x-container-init": "lazy",
            "x-go-type": "time.Duration",
            "x-internal": true
        }));
        assert_eq!(node.rename.as_deref(), Some("customName"));
        assert_eq!(node.container_init, Some(ContainerInit::Lazy));
        assert_eq!(node.extensions.len(), 1);
        assert_eq!(node.extensions["x-go-type"], "time.Duration");
    }

    #[test]
    fn ref_with_siblings_is_not_bare() {
        assert!(parse(json!({ "$ref": "#/$defs/A", "description": "doc only" })).is_bare_reference());
        assert!(!parse(json!({ "$ref": "#/$defs/A", "properties": {} })).is_bare_reference());
    }

    #[test]
    fn single_member_enum_is_a_literal() {
        assert_eq!(parse(json!({ "enum": ["a", null] })).literal(), Some(Literal::String("a".into())));
        assert_eq!(parse(json!({ "const": 3 })).literal(), Some(Literal::Integer(3)));
        assert_eq!(parse(json!({ "enum": ["a", "b"] })).literal(), None);
    }

    #[test]
    fn constraints_are_collected() {
        let node = parse(json!({ "type": "string", "minLength": 1, "pattern": "^[a-z]+$" }));
        assert_eq!(node.constraints.min_length, Some(1));
        assert_eq!(node.constraints.pattern.as_deref(), Some("^[a-z]+$"));
        assert!(!node.constraints.is_empty());
    }
}
