//! The canonical type graph.
//!
//! Every node lives in one arena and is addressed by [`TypeId`]; fields, array
//! elements, map values and union variants hold ids, never copies, so cyclic
//! schemas need no special ownership. [`Registry`] is the mutable arena used
//! while building; [`Ir`] is the frozen, read-only result handed to renderers.
use std::collections::BTreeMap;
use std::fmt;

use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::config::ContainerInit;
use crate::error::CompileError;
use crate::naming::AcronymTable;
use crate::policy::FieldPolicy;
use crate::schema::{Constraints, Location};

/// Name of the built-in dynamic union used for untyped values.
pub const ANY: &str = "any";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TypeId(u32);

impl TypeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

// ————————————————————————————————————————————————————————————————————————————
// LEAVES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    String,
    Integer,
    Number,
    Boolean,
}

impl PrimitiveKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer => "integer",
            PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
    }
}

/// Representation refinements carried by `format`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Format {
    Date,
    DateTime,
    Time,
    Duration,
    Uuid,
    Uri,
    Email,
    Binary,
    Byte,
    Int32,
    Int64,
    Float,
    Double,
    Other(String),
}

impl Format {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "date" => Format::Date,
            "date-time" => Format::DateTime,
            "time" => Format::Time,
            "duration" => Format::Duration,
            "uuid" => Format::Uuid,
            "uri" | "url" => Format::Uri,
            "email" => Format::Email,
            "binary" => Format::Binary,
            "byte" => Format::Byte,
            "int32" => Format::Int32,
            "int64" => Format::Int64,
            "float" => Format::Float,
            "double" => Format::Double,
            other => Format::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Format::Date => "date",
            Format::DateTime => "date-time",
            Format::Time => "time",
            Format::Duration => "duration",
            Format::Uuid => "uuid",
            Format::Uri => "uri",
            Format::Email => "email",
            Format::Binary => "binary",
            Format::Byte => "byte",
            Format::Int32 => "int32",
            Format::Int64 => "int64",
            Format::Float => "float",
            Format::Double => "double",
            Format::Other(raw) => raw,
        }
    }
}

impl Serialize for Format {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Primitive {
    pub kind: PrimitiveKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Format>,
}

impl Primitive {
    pub fn new(kind: PrimitiveKind) -> Self {
        Self { kind, format: None }
    }

    fn canonical_name(&self) -> String {
        match &self.format {
            Some(format) => format!("{}<{}>", self.kind.as_str(), format.as_str()),
            None => self.kind.as_str().to_owned(),
        }
    }
}

/// A literal value from `const`, `enum` or `default`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Null,
    Bool(bool),
    Integer(i64),
    Number(OrderedFloat<f64>),
    String(String),
    /// Arrays and objects, kept as compact JSON text.
    Json(String),
}

impl Literal {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Literal::Null,
            Value::Bool(flag) => Literal::Bool(*flag),
            Value::Number(number) => match number.as_i64() {
                Some(int) => Literal::Integer(int),
                None => Literal::Number(OrderedFloat(number.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(text) => Literal::String(text.clone()),
            other => Literal::Json(other.to_string()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Null => Value::Null,
            Literal::Bool(flag) => Value::Bool(*flag),
            Literal::Integer(int) => Value::from(*int),
            Literal::Number(number) => Value::from(number.into_inner()),
            Literal::String(text) => Value::String(text.clone()),
            Literal::Json(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.clone())),
        }
    }

    /// String content for strings, JSON text otherwise. Used to derive names.
    pub fn text(&self) -> String {
        match self {
            Literal::String(text) => text.clone(),
            other => other.to_value().to_string(),
        }
    }

    pub fn kind(&self) -> Option<PrimitiveKind> {
        match self {
            Literal::Bool(_) => Some(PrimitiveKind::Boolean),
            Literal::Integer(_) => Some(PrimitiveKind::Integer),
            Literal::Number(_) => Some(PrimitiveKind::Number),
            Literal::String(_) => Some(PrimitiveKind::String),
            Literal::Null | Literal::Json(_) => None,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

impl Serialize for Literal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

// ————————————————————————————————————————————————————————————————————————————
// DECLARED SHAPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Openness {
    /// Unknown input properties are tolerated.
    Open,
    /// Unknown input properties are disallowed.
    Closed,
    /// Unknown input properties are collected with the given value type.
    Typed(TypeId),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    pub wire_name: String,
    pub local_name: String,
    #[serde(rename = "type")]
    pub ty: TypeId,
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Literal>,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The schema admits `null` on the wire.
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constant: Option<Literal>,
    #[serde(skip_serializing_if = "Constraints::is_empty")]
    pub constraints: Constraints,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
    /// Field-level override of the container-initialization mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_init: Option<ContainerInit>,
    pub policy: FieldPolicy,
}

impl Field {
    pub fn new(wire_name: impl Into<String>, local_name: impl Into<String>, ty: TypeId) -> Self {
        Self {
            wire_name: wire_name.into(),
            local_name: local_name.into(),
            ty,
            required: false,
            default: None,
            deprecated: false,
            description: None,
            nullable: false,
            constant: None,
            constraints: Constraints::default(),
            extensions: BTreeMap::new(),
            container_init: None,
            policy: FieldPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub fields: Vec<Field>,
    pub openness: Openness,
    /// The named object an `allOf` branch referenced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<TypeId>,
}

impl ObjectType {
    pub fn field(&self, wire_name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.wire_name == wire_name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EnumMember {
    pub constant_name: String,
    pub wire_value: Literal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub members: Vec<EnumMember>,
    /// The member list included `null`.
    pub nullable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Discriminant {
    pub property: String,
    pub local_name: String,
    /// Tag value -> variant.
    pub mapping: IndexMap<String, TypeId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnionType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub discriminant: Option<Discriminant>,
    pub variants: Vec<TypeId>,
    pub dynamic_fallback: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AliasType {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub underlying: TypeId,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeNode {
    Primitive(Primitive),
    ArrayOf(TypeId),
    MapOf(TypeId),
    Object(ObjectType),
    Enum(EnumType),
    Union(UnionType),
    Alias(AliasType),
}

impl TypeNode {
    /// Ids this node points at directly.
    pub fn references(&self) -> Vec<TypeId> {
        match self {
            TypeNode::Primitive(_) | TypeNode::Enum(_) => Vec::new(),
            TypeNode::ArrayOf(element) | TypeNode::MapOf(element) => vec![*element],
            TypeNode::Object(object) => {
                let mut refs: Vec<TypeId> = object.fields.iter().map(|f| f.ty).collect();
                if let Openness::Typed(value) = object.openness {
                    refs.push(value);
                }
                refs.extend(object.extends);
                refs
            }
            TypeNode::Union(union) => {
                let mut refs = union.variants.clone();
                if let Some(discriminant) = &union.discriminant {
                    refs.extend(discriminant.mapping.values().filter(|id| !union.variants.contains(id)));
                }
                refs
            }
            TypeNode::Alias(alias) => vec![alias.underlying],
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            TypeNode::Object(object) => object.description.as_deref(),
            TypeNode::Enum(enumeration) => enumeration.description.as_deref(),
            TypeNode::Union(union) => union.description.as_deref(),
            TypeNode::Alias(alias) => alias.description.as_deref(),
            _ => None,
        }
    }

    fn canonical_name(&self, names: impl Fn(TypeId) -> String) -> Option<String> {
        match self {
            TypeNode::Primitive(primitive) => Some(primitive.canonical_name()),
            TypeNode::ArrayOf(element) => Some(format!("array<{}>", names(*element))),
            TypeNode::MapOf(value) => Some(format!("map<{}>", names(*value))),
            TypeNode::Object(ObjectType { name, .. })
            | TypeNode::Enum(EnumType { name, .. })
            | TypeNode::Union(UnionType { name, .. })
            | TypeNode::Alias(AliasType { name, .. }) => Some(name.clone()),
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY (BUILD TIME)
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone)]
struct Slot {
    name: String,
    declared: bool,
    origin: Option<Location>,
    node: Option<TypeNode>,
}

/// The owning arena while the graph is under construction.
#[derive(Debug, Clone)]
pub(crate) struct Registry {
    slots: Vec<Slot>,
    by_name: IndexMap<String, TypeId>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        let mut registry = Self {
            slots: Vec::new(),
            by_name: IndexMap::new(),
        };
        registry.push(Slot {
            name: ANY.to_owned(),
            declared: false,
            origin: None,
            node: Some(TypeNode::Union(UnionType {
                name: ANY.to_owned(),
                description: None,
                discriminant: None,
                variants: Vec::new(),
                dynamic_fallback: true,
            })),
        });
        registry
    }

    fn push(&mut self, slot: Slot) -> TypeId {
        let id = TypeId(self.slots.len() as u32);
        self.by_name.insert(slot.name.clone(), id);
        self.slots.push(slot);
        id
    }

    pub(crate) fn any(&self) -> TypeId {
        TypeId(0)
    }

    /// An empty named slot, filled later by [`Registry::fill`].
    pub(crate) fn reserve(&mut self, name: &str, origin: Location) -> TypeId {
        self.push(Slot {
            name: name.to_owned(),
            declared: true,
            origin: Some(origin),
            node: None,
        })
    }

    pub(crate) fn fill(&mut self, id: TypeId, node: TypeNode) {
        self.slots[id.index()].node = Some(node);
    }

    pub(crate) fn is_filled(&self, id: TypeId) -> bool {
        self.slots[id.index()].node.is_some()
    }

    pub(crate) fn declare(&mut self, node: TypeNode, origin: Location) -> TypeId {
        let name = node.canonical_name(|id| self.name(id).to_owned()).unwrap_or_default();
        self.push(Slot {
            name,
            declared: true,
            origin: Some(origin),
            node: Some(node),
        })
    }

    /// Interns an unnamed primitive, array or map node under its structural name.
    pub(crate) fn structural(&mut self, node: TypeNode) -> TypeId {
        let name = node.canonical_name(|id| self.name(id).to_owned()).unwrap_or_default();
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }
        self.push(Slot {
            name,
            declared: false,
            origin: None,
            node: Some(node),
        })
    }

    pub(crate) fn name(&self, id: TypeId) -> &str {
        &self.slots[id.index()].name
    }

    pub(crate) fn get(&self, id: TypeId) -> Option<&TypeNode> {
        self.slots[id.index()].node.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeNode> {
        self.slots[id.index()].node.as_mut()
    }

    pub(crate) fn ids(&self) -> impl Iterator<Item = TypeId> + use<> {
        (0..self.slots.len() as u32).map(TypeId)
    }

    /// Follows aliases to the first non-alias node. Alias cycles stop where they close.
    pub(crate) fn resolve(&self, mut id: TypeId) -> TypeId {
        let mut seen = Vec::new();
        while let Some(TypeNode::Alias(alias)) = self.get(id) {
            if seen.contains(&id) {
                break;
            }
            seen.push(id);
            id = alias.underlying;
        }
        id
    }

    pub(crate) fn freeze(self, acronyms: AcronymTable) -> Result<Ir, CompileError> {
        let mut entries = Vec::with_capacity(self.slots.len());
        for (index, slot) in self.slots.into_iter().enumerate() {
            let node = match slot.node {
                Some(node) => node,
                None => {
                    return Err(CompileError::unsupported(
                        &slot.origin.unwrap_or_default(),
                        format!("definition `{}` was never built", slot.name),
                    ));
                }
            };
            entries.push(Entry {
                id: TypeId(index as u32),
                name: slot.name,
                declared: slot.declared,
                origin: slot.origin,
                node,
            });
        }
        let order = declaration_order(&entries);
        Ok(Ir {
            entries,
            by_name: self.by_name,
            order,
            acronyms,
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// FROZEN IR
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub id: TypeId,
    pub name: String,
    /// Declared types are emitted by renderers; structural ones are inlined.
    pub declared: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<Location>,
    pub node: TypeNode,
}

/// The immutable type graph handed to renderers.
#[derive(Debug, Clone)]
pub struct Ir {
    entries: Vec<Entry>,
    by_name: IndexMap<String, TypeId>,
    order: Vec<TypeId>,
    acronyms: AcronymTable,
}

impl Ir {
    pub fn get(&self, id: TypeId) -> &TypeNode {
        &self.entries[id.index()].node
    }

    pub fn entry(&self, id: TypeId) -> &Entry {
        &self.entries[id.index()]
    }

    pub fn name(&self, id: TypeId) -> &str {
        &self.entries[id.index()].name
    }

    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    pub fn find(&self, name: &str) -> Option<&TypeNode> {
        self.lookup(name).map(|id| self.get(id))
    }

    pub fn is_declared(&self, id: TypeId) -> bool {
        self.entries[id.index()].declared
    }

    pub fn any(&self) -> TypeId {
        TypeId(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn acronyms(&self) -> &AcronymTable {
        &self.acronyms
    }

    /// Declared types, dependencies first, ties broken by name.
    pub fn declarations(&self) -> impl Iterator<Item = (TypeId, &TypeNode)> {
        self.order.iter().map(|id| (*id, self.get(*id)))
    }

    /// Follows aliases to the first non-alias node.
    pub fn resolve(&self, mut id: TypeId) -> TypeId {
        let mut seen = Vec::new();
        while let TypeNode::Alias(alias) = self.get(id) {
            if seen.contains(&id) {
                break;
            }
            seen.push(id);
            id = alias.underlying;
        }
        id
    }

    /// Declared types referenced by `id`, looking through structural nodes.
    pub fn dependencies(&self, id: TypeId) -> Vec<TypeId> {
        declared_dependencies(&self.entries, id)
    }
}

impl Serialize for Ir {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let declarations: Vec<&str> = self.order.iter().map(|id| self.name(*id)).collect();
        let mut state = serializer.serialize_struct("Ir", 2)?;
        state.serialize_field("declarations", &declarations)?;
        state.serialize_field("types", &self.entries)?;
        state.end()
    }
}

fn declared_dependencies(entries: &[Entry], id: TypeId) -> Vec<TypeId> {
    let mut out = Vec::new();
    let mut stack = entries[id.index()].node.references();
    stack.reverse();
    let mut seen = vec![id];
    while let Some(next) = stack.pop() {
        if seen.contains(&next) {
            continue;
        }
        seen.push(next);
        if entries[next.index()].declared {
            out.push(next);
        } else {
            let mut nested = entries[next.index()].node.references();
            nested.reverse();
            stack.extend(nested);
        }
    }
    out
}

fn declaration_order(entries: &[Entry]) -> Vec<TypeId> {
    fn visit(entries: &[Entry], id: TypeId, visited: &mut [bool], order: &mut Vec<TypeId>) {
        if visited[id.index()] {
            return;
        }
        visited[id.index()] = true;
        let mut deps = declared_dependencies(entries, id);
        deps.sort_by(|a, b| entries[a.index()].name.cmp(&entries[b.index()].name));
        for dep in deps {
            visit(entries, dep, visited, order);
        }
        order.push(id);
    }

    let mut roots: Vec<TypeId> = entries.iter().filter(|e| e.declared).map(|e| e.id).collect();
    roots.sort_by(|a, b| entries[a.index()].name.cmp(&entries[b.index()].name));
    let mut visited = vec![false; entries.len()];
    let mut order = Vec::new();
    for root in roots {
        visit(entries, root, &mut visited, &mut order);
    }
    order
}
