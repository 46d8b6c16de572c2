//! Canonical type graph construction.
//!
//! Every definition site gets a registry slot before any body is built, so
//! references between definitions (including cycles) resolve to ids up front.
//! Bodies are then built depth-first. Each visited node first becomes a
//! [`Shape`]; anonymous shapes are interned bottom-up, deduplicated by
//! [`Fingerprint`] and named from their [`NamePath`].
pub(crate) mod fingerprint;

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::{debug, trace};

use crate::config::CompileOptions;
use crate::error::{CompileError, Diagnostics};
use crate::ir::{
    AliasType, Discriminant, EnumMember, EnumType, Field, Literal, ObjectType, Openness, Primitive, PrimitiveKind,
    Registry, TypeId, TypeNode, UnionType, Format,
};
use crate::naming::{self, NamePath, NameTable};
use crate::resolve::{Definition, DefinitionKind, Resolver, Target};
use crate::schema::{Additional, Location, SchemaNode, TypeKeyword};

use fingerprint::Fingerprint;

// ————————————————————————————————————————————————————————————————————————————
// SHAPES
// ————————————————————————————————————————————————————————————————————————————

/// A visited node before it is placed in the registry.
#[derive(Debug, Clone)]
pub(crate) enum Shape {
    /// Already in the registry.
    Type(TypeId),
    Any,
    Primitive(Primitive),
    Array(TypeId),
    Map(TypeId),
    Object(ObjectShape),
    Enum(EnumShape),
    Union(UnionShape),
}

#[derive(Debug, Clone)]
pub(crate) struct ObjectShape {
    pub fields: Vec<Field>,
    pub openness: Openness,
    pub extends: Option<TypeId>,
}

#[derive(Debug, Clone)]
pub(crate) struct EnumShape {
    pub members: Vec<EnumMember>,
    pub nullable: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct UnionShape {
    pub discriminant: Option<Discriminant>,
    pub variants: Vec<TypeId>,
    pub dynamic_fallback: bool,
}

impl UnionShape {
    pub(crate) fn dynamic(variants: Vec<TypeId>) -> Self {
        Self {
            discriminant: None,
            variants,
            dynamic_fallback: true,
        }
    }
}

impl Shape {
    fn into_declared(self, name: String, description: Option<String>) -> Option<TypeNode> {
        Some(match self {
            Shape::Object(object) => TypeNode::Object(ObjectType {
                name,
                description,
                fields: object.fields,
                openness: object.openness,
                extends: object.extends,
            }),
            Shape::Enum(enumeration) => TypeNode::Enum(EnumType {
                name,
                description,
                members: enumeration.members,
                nullable: enumeration.nullable,
            }),
            Shape::Union(union) => TypeNode::Union(UnionType {
                name,
                description,
                discriminant: union.discriminant,
                variants: union.variants,
                dynamic_fallback: union.dynamic_fallback,
            }),
            _ => return None,
        })
    }
}

// ————————————————————————————————————————————————————————————————————————————
// BUILDER
// ————————————————————————————————————————————————————————————————————————————

pub(crate) struct GraphBuilder<'a> {
    pub(crate) resolver: &'a Resolver<'a>,
    pub(crate) options: &'a CompileOptions,
    pub(crate) registry: Registry,
    names: NameTable,
    /// Definition index -> reserved slot.
    slots: Vec<TypeId>,
    interned: HashMap<Fingerprint, TypeId>,
    pub(crate) diagnostics: Diagnostics,
    expanding: Vec<Location>,
}

/// Builds the registry for every definition the resolver found.
pub(crate) fn build(resolver: &Resolver<'_>, options: &CompileOptions) -> Result<Registry, Diagnostics> {
    let mut builder = GraphBuilder::new(resolver, options);
    builder.reserve_definitions();
    for index in 0..resolver.definitions().len() {
        builder.build_definition(index);
    }
    debug!(types = builder.registry.ids().count(), "type graph built");
    let GraphBuilder {
        registry, diagnostics, ..
    } = builder;
    diagnostics.into_result(registry)
}

impl<'a> GraphBuilder<'a> {
    fn new(resolver: &'a Resolver<'a>, options: &'a CompileOptions) -> Self {
        Self {
            resolver,
            options,
            registry: Registry::new(),
            names: NameTable::new(),
            slots: Vec::new(),
            interned: HashMap::new(),
            diagnostics: Diagnostics::new(),
            expanding: Vec::new(),
        }
    }

    // ---- naming of definitions ----

    fn reserve_definitions(&mut self) {
        let resolver = self.resolver;
        let options = self.options;
        let acronyms = &options.acronyms;
        for definition in resolver.definitions() {
            let location = &definition.location;
            let (base, spelled) = match definition.kind {
                DefinitionKind::Root | DefinitionKind::Member => (naming::type_name(&definition.hint, acronyms), 1),
                DefinitionKind::Promoted => self.promoted_name(location),
            };
            let mut qualifiers = naming::qualifiers(location, spelled, acronyms);
            if let Some(root) = self.enclosing_root(location) {
                qualifiers.push(naming::type_name(&root.hint, acronyms));
            }
            let reserved = self.reserve_name(&base, qualifiers, location);
            let name = reserved.unwrap_or_else(|error| {
                self.diagnostics.push(error);
                format!("{base}@{location}")
            });
            trace!(%location, %name, "reserved definition");
            self.slots.push(self.registry.reserve(&name, location.clone()));
        }
    }

    /// The root definition of the document holding `location`, when the root declares a shape.
    fn enclosing_root(&self, location: &Location) -> Option<&'a Definition<'a>> {
        if location.pointer.is_empty() {
            return None;
        }
        let resolver = self.resolver;
        let index = resolver.definition_at(&Location::root(location.document.clone()))?;
        let definition = resolver.definition(index);
        (definition.kind == DefinitionKind::Root).then_some(definition)
    }

    /// Reserves `base` through the name table. The document stem only
    /// disambiguates against a shape from another document.
    fn reserve_name(&mut self, base: &str, mut qualifiers: Vec<String>, location: &Location) -> Result<String, CompileError> {
        let foreign = self
            .names
            .owner(base)
            .is_some_and(|owner| owner.document != location.document);
        if foreign {
            let stem = naming::document_stem(&location.document);
            qualifiers.push(naming::type_name(&stem, &self.options.acronyms));
        }
        self.names.reserve(base, &qualifiers, location)
    }

    /// Anchor name of the nearest enclosing named definition plus the path words
    /// below it, with the number of trailing pointer words that name spells.
    fn promoted_name(&self, location: &Location) -> (String, usize) {
        let acronyms = &self.options.acronyms;
        let anchor = self
            .resolver
            .definitions()
            .iter()
            .enumerate()
            .filter(|(_, d)| d.kind != DefinitionKind::Promoted && location.starts_with(&d.location) && &d.location != location)
            .filter(|(index, _)| *index < self.slots.len())
            .max_by_key(|(_, d)| d.location.pointer.len());
        let (anchor_name, depth) = match anchor {
            Some((index, d)) => (self.registry.name(self.slots[index]).to_owned(), d.location.pointer.len()),
            None => (naming::type_name(&naming::document_stem(&location.document), acronyms), 0),
        };
        let words = naming::path_words(&location.pointer[depth..]);
        let spelled = words.len() + usize::from(depth > 0);
        let mut path = NamePath::new(anchor_name);
        for word in words {
            path = path.push(word);
        }
        (path.candidate(acronyms), spelled)
    }

    // ---- definitions ----

    fn build_definition(&mut self, index: usize) {
        let resolver = self.resolver;
        let definition = resolver.definition(index);
        let id = self.slots[index];
        let path = NamePath::new(self.registry.name(id));
        let built = self
            .shape_of(definition.node, &path, Some(id))
            .and_then(|shape| self.fill_named(id, shape, definition.node));
        if let Err(error) = built {
            self.diagnostics.push(error);
        }
        if !self.registry.is_filled(id) {
            let name = self.registry.name(id).to_owned();
            let any = self.registry.any();
            self.registry.fill(
                id,
                TypeNode::Alias(AliasType {
                    name,
                    description: None,
                    underlying: any,
                }),
            );
        }
    }

    fn fill_named(&mut self, id: TypeId, shape: Shape, node: &SchemaNode) -> Result<(), CompileError> {
        let name = self.registry.name(id).to_owned();
        let description = node.description.clone();
        let underlying = match shape {
            Shape::Object(_) | Shape::Enum(_) | Shape::Union(_) => {
                if let Some(declared) = shape.into_declared(name, description) {
                    self.registry.fill(id, declared);
                }
                return Ok(());
            }
            Shape::Type(target) => {
                if target == id || self.registry.resolve(target) == id {
                    return Err(CompileError::unsupported(
                        &node.location,
                        format!("`{name}` is defined as a reference to itself"),
                    ));
                }
                target
            }
            Shape::Any => self.registry.any(),
            Shape::Primitive(primitive) => self.registry.structural(TypeNode::Primitive(primitive)),
            Shape::Array(element) => self.registry.structural(TypeNode::ArrayOf(element)),
            Shape::Map(value) => self.registry.structural(TypeNode::MapOf(value)),
        };
        self.registry.fill(
            id,
            TypeNode::Alias(AliasType {
                name,
                description,
                underlying,
            }),
        );
        Ok(())
    }

    // ---- visiting ----

    /// Builds an anonymous node and returns its id.
    pub(crate) fn visit(&mut self, node: &'a SchemaNode, path: &NamePath) -> Result<TypeId, CompileError> {
        if let Some(index) = self.resolver.definition_at(&node.location) {
            return Ok(self.slots[index]);
        }
        let shape = self.shape_of(node, path, None)?;
        self.intern(shape, node, path)
    }

    pub(crate) fn intern(&mut self, shape: Shape, node: &SchemaNode, path: &NamePath) -> Result<TypeId, CompileError> {
        match shape {
            Shape::Type(id) => Ok(id),
            Shape::Any => Ok(self.registry.any()),
            Shape::Primitive(primitive) => Ok(self.registry.structural(TypeNode::Primitive(primitive))),
            Shape::Array(element) => Ok(self.registry.structural(TypeNode::ArrayOf(element))),
            Shape::Map(value) => Ok(self.registry.structural(TypeNode::MapOf(value))),
            Shape::Union(union) if union.dynamic_fallback && union.variants.is_empty() => Ok(self.registry.any()),
            declared => {
                let Some(fingerprint) = Fingerprint::of(&declared) else {
                    return Ok(self.registry.any());
                };
                if let Some(id) = self.interned.get(&fingerprint) {
                    debug!(location = %node.location, name = self.registry.name(*id), "reusing structurally identical shape");
                    return Ok(*id);
                }
                let options = self.options;
                let acronyms = &options.acronyms;
                let base = path.candidate(acronyms);
                let qualifiers = naming::qualifiers(&node.location, path.depth() + 1, acronyms);
                let name = self.reserve_name(&base, qualifiers, &node.location)?;
                let description = node.description.clone();
                let Some(declared) = declared.into_declared(name, description) else {
                    return Ok(self.registry.any());
                };
                let id = self.registry.declare(declared, node.location.clone());
                self.interned.insert(fingerprint, id);
                Ok(id)
            }
        }
    }

    /// Dispatch: reference, combinators, then the plain keywords.
    pub(crate) fn shape_of(
        &mut self,
        node: &'a SchemaNode,
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        trace!(location = %node.location, "visit");
        if node.boolean == Some(false) {
            return Err(CompileError::unsupported(&node.location, "the `false` schema admits no value"));
        }
        if node.reference.is_some() && !node.has_shape_keywords() {
            return self.follow(node, path, named);
        }
        if node.reference.is_some() || !node.all_of.is_empty() || node.has_union() {
            return self.classify(node, path, named);
        }
        self.leaf_shape(node, path, named)
    }

    fn follow(&mut self, node: &'a SchemaNode, path: &NamePath, named: Option<TypeId>) -> Result<Shape, CompileError> {
        let resolver = self.resolver;
        let reference = node.reference.as_deref().unwrap_or("#");
        match resolver.follow(&node.location, reference)? {
            Target::Definition(index) => Ok(Shape::Type(self.slots[index])),
            Target::Inline(target) => self.expand_inline(target, path, named),
        }
    }

    fn expand_inline(
        &mut self,
        target: &'a SchemaNode,
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        if self.expanding.contains(&target.location) {
            return Err(CompileError::unsupported(&target.location, "inline reference expands into itself"));
        }
        self.expanding.push(target.location.clone());
        let shape = self.shape_of(target, path, named);
        self.expanding.pop();
        shape
    }

    pub(crate) fn definition_slot(&self, index: usize) -> TypeId {
        self.slots[index]
    }

    /// A node without `$ref` or combinators.
    pub(crate) fn leaf_shape(
        &mut self,
        node: &'a SchemaNode,
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        if let Some(values) = &node.enum_values {
            if node.properties.is_none() {
                return self.enum_shape(node, values, named);
            }
        }
        if let Some(value) = &node.const_value {
            return Ok(match Literal::from_value(value).kind() {
                Some(kind) => Shape::Primitive(primitive(kind, node)),
                None => Shape::Any,
            });
        }
        let concrete = node.concrete_types();
        if node.properties.is_some() || node.additional.is_some() || concrete == [TypeKeyword::Object] {
            return self.object_shape(node, path);
        }
        if node.items.is_some() || concrete == [TypeKeyword::Array] {
            let element = match &node.items {
                Some(items) => self.visit(items, &path.push("Item"))?,
                None => self.registry.any(),
            };
            return Ok(Shape::Array(element));
        }
        Ok(match concrete.as_slice() {
            [] if node.format.is_some() => Shape::Primitive(primitive(PrimitiveKind::String, node)),
            [] => Shape::Any,
            [single] => match primitive_kind(*single) {
                Some(kind) => Shape::Primitive(primitive(kind, node)),
                None => Shape::Any,
            },
            _ => {
                debug!(location = %node.location, "multiple types, falling back to a dynamic value");
                Shape::Union(UnionShape::dynamic(Vec::new()))
            }
        })
    }

    fn enum_shape(&mut self, node: &SchemaNode, values: &[Value], named: Option<TypeId>) -> Result<Shape, CompileError> {
        let nullable = values.iter().any(Value::is_null);
        let mut literals: Vec<Literal> = Vec::new();
        for value in values.iter().filter(|v| !v.is_null()) {
            let literal = Literal::from_value(value);
            if !literals.contains(&literal) {
                literals.push(literal);
            }
        }
        let kinds: HashSet<Option<PrimitiveKind>> = literals.iter().map(Literal::kind).collect();
        if literals.is_empty() || kinds.contains(&None) || kinds.len() > 1 {
            debug!(location = %node.location, "enum mixes value kinds, falling back to a dynamic value");
            return Ok(Shape::Union(UnionShape::dynamic(Vec::new())));
        }
        if literals.len() == 1 && named.is_none() {
            if let Some(kind) = literals[0].kind() {
                return Ok(Shape::Primitive(primitive(kind, node)));
            }
        }

        let mut members: Vec<EnumMember> = Vec::with_capacity(literals.len());
        for literal in literals {
            let constant_name = naming::enum_constant(&literal.text(), &self.options.acronyms);
            if let Some(clash) = members.iter().find(|m| m.constant_name == constant_name) {
                return Err(CompileError::NamingCollision {
                    location: node.location.clone(),
                    name: constant_name,
                    owner: format!("enum value {}", clash.wire_value),
                });
            }
            members.push(EnumMember {
                constant_name,
                wire_value: literal,
            });
        }
        Ok(Shape::Enum(EnumShape { members, nullable }))
    }

    fn object_shape(&mut self, node: &'a SchemaNode, path: &NamePath) -> Result<Shape, CompileError> {
        let Some(properties) = &node.properties else {
            return Ok(match &node.additional {
                Some(Additional::Schema(value)) => Shape::Map(self.visit(value, &path.push("Value"))?),
                Some(Additional::Allowed(false)) => Shape::Object(ObjectShape {
                    fields: Vec::new(),
                    openness: Openness::Closed,
                    extends: None,
                }),
                _ => Shape::Map(self.registry.any()),
            });
        };
        let mut fields = Vec::with_capacity(properties.len());
        for (key, property) in properties {
            let required = node.required.iter().any(|r| r == key);
            match self.field(key, property, required, path) {
                Ok(field) => fields.push(field),
                Err(error) => self.diagnostics.push(error),
            }
        }
        self.check_local_names(&fields, node);
        let openness = self.openness(std::slice::from_ref(&node), path)?;
        Ok(Shape::Object(ObjectShape {
            fields,
            openness,
            extends: None,
        }))
    }

    /// Openness of an object assembled from `parts`: closed only when every part is closed.
    pub(crate) fn openness(&mut self, parts: &[&'a SchemaNode], path: &NamePath) -> Result<Openness, CompileError> {
        for part in parts {
            if let Some(Additional::Schema(value)) = &part.additional {
                return Ok(Openness::Typed(self.visit(value, &path.push("Value"))?));
            }
        }
        let closed = !parts.is_empty()
            && parts
                .iter()
                .all(|p| matches!(p.additional, Some(Additional::Allowed(false))));
        Ok(if closed { Openness::Closed } else { Openness::Open })
    }

    pub(crate) fn field(
        &mut self,
        key: &str,
        property: &'a SchemaNode,
        required: bool,
        path: &NamePath,
    ) -> Result<Field, CompileError> {
        let ty = self.visit(property, &path.push(key))?;
        let local_name = match &property.rename {
            Some(rename) => naming::override_name(rename, &property.location),
            None => naming::field_name(key, &self.options.acronyms),
        };
        let mut field = Field::new(key, local_name, ty);
        field.required = required;
        field.default = property
            .default
            .as_ref()
            .filter(|v| !v.is_null())
            .map(Literal::from_value);
        field.deprecated = property.deprecated;
        field.description = property.description.clone();
        field.nullable = property.is_nullable();
        field.constant = property.literal();
        field.constraints = property.constraints.clone();
        field.extensions = property.extensions.clone();
        field.container_init = property.container_init;
        Ok(field)
    }

    /// Two wire keys that normalize to one local name.
    pub(crate) fn check_local_names(&mut self, fields: &[Field], node: &SchemaNode) {
        let mut seen: HashMap<&str, &str> = HashMap::new();
        for field in fields {
            if let Some(first) = seen.insert(&field.local_name, &field.wire_name) {
                self.diagnostics.push(CompileError::NamingCollision {
                    location: node.location.child("properties").child(field.wire_name.clone()),
                    name: field.local_name.clone(),
                    owner: format!("property `{first}`"),
                });
            }
        }
    }
}

// ---- helpers ----

fn primitive_kind(keyword: TypeKeyword) -> Option<PrimitiveKind> {
    match keyword {
        TypeKeyword::String => Some(PrimitiveKind::String),
        TypeKeyword::Integer => Some(PrimitiveKind::Integer),
        TypeKeyword::Number => Some(PrimitiveKind::Number),
        TypeKeyword::Boolean => Some(PrimitiveKind::Boolean),
        TypeKeyword::Object | TypeKeyword::Array | TypeKeyword::Null => None,
    }
}

fn primitive(kind: PrimitiveKind, node: &SchemaNode) -> Primitive {
    Primitive {
        kind,
        format: node.format.as_deref().map(Format::parse),
    }
}

/// The single primitive kind a leaf node admits, if any.
pub(crate) fn leaf_kind(node: &SchemaNode) -> Option<PrimitiveKind> {
    if let Some(values) = &node.enum_values {
        let kinds: HashSet<Option<PrimitiveKind>> = values
            .iter()
            .filter(|v| !v.is_null())
            .map(|v| Literal::from_value(v).kind())
            .collect();
        return match kinds.into_iter().collect::<Vec<_>>().as_slice() {
            [Some(kind)] => Some(*kind),
            _ => None,
        };
    }
    if let Some(literal) = node.literal() {
        return literal.kind();
    }
    match node.concrete_types().as_slice() {
        [] if node.format.is_some() => Some(PrimitiveKind::String),
        [single] => primitive_kind(*single),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Ir;
    use crate::resolve::SchemaDocument;
    use serde_json::json;

    pub(crate) fn compile_one(value: Value) -> Result<Ir, Diagnostics> {
        let documents = vec![SchemaDocument::new("test.json", &value)];
        crate::compile(&documents, &CompileOptions::default())
    }

    fn object<'i>(ir: &'i Ir, name: &str) -> &'i ObjectType {
        match ir.find(name) {
            Some(TypeNode::Object(object)) => object,
            other => panic!("`{name}` is not an object: {other:?}"),
        }
    }

    #[test]
    fn identical_anonymous_shapes_share_one_node() {
        let ir = compile_one(json!({
            "$defs": {
                "Order": {
                    "type": "object",
                    "properties": {
                        "billing": { "type": "object", "properties": { "street": { "type": "string" } } },
                        "shipping": { "type": "object", "properties": { "street": { "type": "string" } } }
                    }
                }
            }
        }))
        .unwrap();
        let order = object(&ir, "Order");
        assert_eq!(order.fields[0].ty, order.fields[1].ty);
        assert_eq!(ir.name(order.fields[0].ty), "OrderBilling");
        assert!(ir.find("OrderShipping").is_none());
    }

    #[test]
    fn identical_named_definitions_stay_distinct() {
        let ir = compile_one(json!({
            "$defs": {
                "Celsius": { "type": "object", "properties": { "value": { "type": "number" } } },
                "Fahrenheit": { "type": "object", "properties": { "value": { "type": "number" } } }
            }
        }))
        .unwrap();
        assert_ne!(ir.lookup("Celsius"), ir.lookup("Fahrenheit"));
        assert!(matches!(ir.find("Celsius"), Some(TypeNode::Object(_))));
        assert!(matches!(ir.find("Fahrenheit"), Some(TypeNode::Object(_))));
    }

    #[test]
    fn nested_anonymous_names_follow_the_path() {
        let ir = compile_one(json!({
            "$defs": {
                "A": {
                    "type": "object",
                    "properties": {
                        "b": { "type": "object", "properties": { "c": { "type": "object", "properties": { "x": { "type": "string" } } } } },
                        "d": { "type": "object", "properties": { "c": { "type": "object", "properties": { "y": { "type": "integer" } } } } }
                    }
                }
            }
        }))
        .unwrap();
        assert!(matches!(ir.find("ABC"), Some(TypeNode::Object(_))));
        assert!(matches!(ir.find("ADC"), Some(TypeNode::Object(_))));
    }

    #[test]
    fn formatted_primitive_definitions_become_aliases() {
        let ir = compile_one(json!({
            "$defs": {
                "Timestamp": { "type": "string", "format": "date-time" },
                "Event": { "type": "object", "properties": { "at": { "$ref": "#/$defs/Timestamp" } } }
            }
        }))
        .unwrap();
        let Some(TypeNode::Alias(alias)) = ir.find("Timestamp") else {
            panic!("Timestamp should be an alias");
        };
        assert_eq!(ir.name(alias.underlying), "string<date-time>");
        assert_eq!(object(&ir, "Event").fields[0].ty, ir.lookup("Timestamp").unwrap());
    }

    #[test]
    fn arrays_and_maps_name_their_elements() {
        let ir = compile_one(json!({
            "$defs": {
                "Catalog": {
                    "type": "object",
                    "properties": {
                        "items": { "type": "array", "items": { "type": "object", "properties": { "sku": { "type": "string" } } } },
                        "prices": { "type": "object", "additionalProperties": { "type": "number" } },
                        "labels": { "type": "object" }
                    }
                }
            }
        }))
        .unwrap();
        let catalog = object(&ir, "Catalog");
        assert_eq!(ir.name(catalog.fields[0].ty), "array<CatalogItemsItem>");
        assert_eq!(ir.name(catalog.fields[1].ty), "map<number>");
        assert_eq!(ir.name(catalog.fields[2].ty), "map<any>");
    }

    #[test]
    fn self_referencing_definitions_resolve_by_name() {
        let ir = compile_one(json!({
            "$defs": {
                "Category": {
                    "type": "object",
                    "properties": {
                        "parent": { "$ref": "#/$defs/Category" },
                        "children": { "type": "array", "items": { "$ref": "#/$defs/Category" } }
                    }
                }
            }
        }))
        .unwrap();
        let id = ir.lookup("Category").unwrap();
        let category = object(&ir, "Category");
        assert_eq!(category.fields[0].ty, id);
        assert_eq!(ir.name(category.fields[1].ty), "array<Category>");
    }

    #[test]
    fn recursive_inline_targets_get_path_names() {
        let ir = compile_one(json!({
            "$defs": {
                "Tree": {
                    "type": "object",
                    "properties": {
                        "root": {
                            "type": "object",
                            "properties": { "children": { "type": "array", "items": { "$ref": "#/$defs/Tree/properties/root" } } }
                        }
                    }
                }
            }
        }))
        .unwrap();
        let tree = object(&ir, "Tree");
        assert_eq!(ir.name(tree.fields[0].ty), "TreeRoot");
        assert_eq!(ir.name(object(&ir, "TreeRoot").fields[0].ty), "array<TreeRoot>");
    }

    #[test]
    fn enums_get_screaming_constants_and_nullability() {
        let ir = compile_one(json!({ "$defs": { "Status": { "enum": ["in-progress", "done", null] } } })).unwrap();
        let Some(TypeNode::Enum(status)) = ir.find("Status") else {
            panic!("Status should be an enum");
        };
        let constants: Vec<&str> = status.members.iter().map(|m| m.constant_name.as_str()).collect();
        assert_eq!(constants, ["IN_PROGRESS", "DONE"]);
        assert!(status.nullable);
    }

    #[test]
    fn mixed_enums_fall_back_to_dynamic_unions() {
        let ir = compile_one(json!({ "$defs": { "Code": { "enum": ["a", 1] } } })).unwrap();
        let Some(TypeNode::Union(code)) = ir.find("Code") else {
            panic!("Code should be a union");
        };
        assert!(code.dynamic_fallback);
        assert!(code.variants.is_empty());
    }

    #[test]
    fn field_metadata_is_carried() {
        let ir = compile_one(json!({
            "$defs": {
                "Item": {
                    "type": "object",
                    "required": ["product-id"],
                    "properties": {
                        "product-id": { "type": "string", "minLength": 3 },
                        "note": { "type": ["string", "null"], "deprecated": true, "x-name": "remark", "x-go-name": "Remark" },
                        "count": { "type": "integer", "default": 1 }
                    }
                }
            }
        }))
        .unwrap();
        let item = object(&ir, "Item");
        let [id, note, count] = item.fields.as_slice() else {
            panic!("expected three fields");
        };
        assert_eq!(id.local_name, "productID");
        assert!(id.required);
        assert_eq!(id.constraints.min_length, Some(3));
        assert_eq!(note.local_name, "remark");
        assert!(note.nullable && note.deprecated);
        assert_eq!(note.extensions["x-go-name"], "Remark");
        assert_eq!(count.default, Some(Literal::Integer(1)));
    }

    #[test]
    fn colliding_local_names_are_reported() {
        let err = compile_one(json!({
            "$defs": {
                "Thing": { "type": "object", "properties": { "foo-bar": { "type": "string" }, "fooBar": { "type": "string" } } }
            }
        }))
        .unwrap_err();
        assert!(err.iter().any(|e| matches!(e, CompileError::NamingCollision { name, .. } if name == "fooBar")));
    }

    #[test]
    fn same_named_definitions_in_one_document_collide() {
        let err = compile_one(json!({
            "$defs": { "user-id": { "type": "string" }, "userId": { "type": "integer" } }
        }))
        .unwrap_err();
        assert!(err.iter().any(|e| matches!(e, CompileError::NamingCollision { name, .. } if name == "UserID")));
    }

    #[test]
    fn every_error_is_collected() {
        let err = compile_one(json!({
            "$defs": {
                "A": { "type": "object", "properties": { "x": { "$ref": "#/$defs/Missing" } } },
                "B": { "type": "object", "properties": { "y": { "$ref": "#/$defs/AlsoMissing" } } },
                "C": false
            }
        }))
        .unwrap_err();
        assert_eq!(err.len(), 3);
    }

    #[test]
    fn self_aliases_are_unsupported() {
        let err = compile_one(json!({ "$defs": { "Loop": { "$ref": "#/$defs/Loop" } } })).unwrap_err();
        assert!(matches!(err.iter().next(), Some(CompileError::UnsupportedCombinator { .. })));
    }

    #[test]
    fn nested_definitions_take_their_enclosing_definition_as_prefix() {
        let ir = compile_one(json!({
            "$defs": {
                "Address": { "type": "object", "properties": { "street": { "type": "string" } } },
                "Person": {
                    "type": "object",
                    "properties": { "home": { "$ref": "#/$defs/Person/$defs/Address" } },
                    "$defs": {
                        "Address": { "type": "object", "properties": { "zip": { "type": "string" } } }
                    }
                }
            }
        }))
        .unwrap();
        assert!(object(&ir, "Address").field("street").is_some());
        assert!(object(&ir, "PersonAddress").field("zip").is_some());
        assert_eq!(object(&ir, "Person").fields[0].ty, ir.lookup("PersonAddress").unwrap());
    }

    #[test]
    fn members_named_like_their_document_root_are_qualified_by_it() {
        let documents = vec![SchemaDocument::new(
            "user.json",
            &json!({
                "type": "object",
                "properties": { "profile": { "$ref": "#/$defs/User" } },
                "$defs": { "User": { "type": "object", "properties": { "nick": { "type": "string" } } } }
            }),
        )];
        let ir = crate::compile(&documents, &CompileOptions::default()).unwrap();
        assert_eq!(ir.name(object(&ir, "User").fields[0].ty), "UserUser");
        assert!(object(&ir, "UserUser").field("nick").is_some());
    }
}
