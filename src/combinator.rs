//! `allOf` / `oneOf` / `anyOf` classification.
//!
//! A node carrying combinators (or a `$ref` with sibling keywords) is first
//! flattened into *parts*: every schema whose own keywords contribute to the
//! final shape, with references and nested `allOf`s resolved. At most one part
//! may carry a `oneOf`/`anyOf`; the other parts are merged into each of its
//! branches before the union is classified (merge, then classify).
use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::build::{leaf_kind, GraphBuilder, ObjectShape, Shape, UnionShape};
use crate::error::CompileError;
use crate::ir::{Discriminant, Field, Literal, PrimitiveKind, TypeId, TypeNode};
use crate::naming::{self, NamePath};
use crate::resolve::Target;
use crate::schema::{Location, SchemaNode};

/// One schema contributing its own keywords to a combined shape.
#[derive(Debug, Clone, Copy)]
struct Part<'a> {
    node: &'a SchemaNode,
    /// The definition this part's keywords came from, if any.
    definition: Option<TypeId>,
    /// The node's own `oneOf`/`anyOf` is classified elsewhere.
    union_taken: bool,
}

impl Part<'_> {
    fn has_leaf_keywords(&self) -> bool {
        let node = self.node;
        !node.concrete_types().is_empty()
            || node.format.is_some()
            || node.enum_values.is_some()
            || node.const_value.is_some()
            || node.items.is_some()
    }

    fn is_object(&self) -> bool {
        self.node.is_object_like() || !self.has_leaf_keywords()
    }

    fn carries_union(&self) -> bool {
        !self.union_taken && self.node.has_union()
    }

    /// Contributes something besides its `oneOf`/`anyOf`.
    fn has_own_keywords(&self) -> bool {
        self.has_leaf_keywords()
            || self.node.properties.is_some()
            || !self.node.required.is_empty()
            || self.node.additional.is_some()
            || !self.node.types.is_empty()
    }
}

fn contributes(node: &SchemaNode) -> bool {
    node.properties.is_some()
        || !node.required.is_empty()
        || node.additional.is_some()
        || !node.types.is_empty()
        || node.format.is_some()
        || node.enum_values.is_some()
        || node.const_value.is_some()
        || node.items.is_some()
        || node.has_union()
        || node.boolean.is_some()
}

enum Discovery {
    None,
    One { property: String, tags: Vec<String> },
    Ambiguous(Vec<String>),
}

impl<'a> GraphBuilder<'a> {
    pub(crate) fn classify(
        &mut self,
        node: &'a SchemaNode,
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        let mut parts = Vec::new();
        self.flatten(node, None, &mut Vec::new(), &mut parts)?;

        let unions: Vec<usize> = parts
            .iter()
            .enumerate()
            .filter(|(_, p)| p.carries_union())
            .map(|(index, _)| index)
            .collect();
        match unions.as_slice() {
            [] => self.merge_parts(node, &parts, path, named),
            [index] => {
                let union = parts[*index];
                let base: Vec<Part<'a>> = parts
                    .iter()
                    .enumerate()
                    .filter(|(i, p)| *i != *index || p.has_own_keywords())
                    .map(|(i, p)| Part {
                        union_taken: i == *index,
                        ..*p
                    })
                    .collect();
                self.union_shape(node, union.node, &base, path, named)
            }
            _ => Err(CompileError::unsupported(
                &node.location,
                "allOf combines more than one oneOf/anyOf",
            )),
        }
    }

    /// Collects `node` and everything it pulls in through `$ref` and `allOf`.
    fn flatten(
        &mut self,
        node: &'a SchemaNode,
        definition: Option<TypeId>,
        visiting: &mut Vec<Location>,
        out: &mut Vec<Part<'a>>,
    ) -> Result<(), CompileError> {
        if node.boolean == Some(false) {
            return Err(CompileError::unsupported(&node.location, "the `false` schema admits no value"));
        }
        if visiting.contains(&node.location) {
            return Err(CompileError::unsupported(&node.location, "allOf includes itself"));
        }
        if !node.one_of.is_empty() && !node.any_of.is_empty() {
            return Err(CompileError::unsupported(&node.location, "oneOf and anyOf on the same schema"));
        }
        visiting.push(node.location.clone());
        if let Some(reference) = &node.reference {
            let resolver = self.resolver;
            match resolver.follow(&node.location, reference)? {
                Target::Definition(index) => {
                    let target = resolver.definition(index).node;
                    self.flatten(target, Some(self.definition_slot(index)), visiting, out)?;
                }
                Target::Inline(target) => self.flatten(target, None, visiting, out)?,
            }
        }
        if contributes(node) {
            out.push(Part {
                node,
                definition,
                union_taken: false,
            });
        }
        for branch in &node.all_of {
            self.flatten(branch, None, visiting, out)?;
        }
        visiting.pop();
        Ok(())
    }

    fn flatten_branch(&mut self, branch: &'a SchemaNode) -> Result<Vec<Part<'a>>, CompileError> {
        let mut parts = Vec::new();
        self.flatten(branch, None, &mut Vec::new(), &mut parts)?;
        Ok(parts)
    }

    // ---- unions ----

    fn union_shape(
        &mut self,
        node: &'a SchemaNode,
        union: &'a SchemaNode,
        base: &[Part<'a>],
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        let (keyword, branches) = if union.one_of.is_empty() {
            ("anyOf", &union.any_of)
        } else {
            ("oneOf", &union.one_of)
        };
        let resolver = self.resolver;

        // Branch ids for bare references to definitions, and the definition that
        // declares each one's shape once reference-only aliases are looked through.
        let mut referenced: Vec<Option<TypeId>> = Vec::with_capacity(branches.len());
        let mut declaring: Vec<Option<TypeId>> = Vec::with_capacity(branches.len());
        for branch in branches {
            let index = match (branch.is_bare_reference(), &branch.reference) {
                (true, Some(reference)) => match resolver.follow(&branch.location, reference)? {
                    Target::Definition(index) => Some(index),
                    Target::Inline(_) => None,
                },
                _ => None,
            };
            let id = index.map(|index| self.definition_slot(index));
            let declared = index.map(|index| self.definition_slot(self.declaring_definition(index)));
            if (id.is_some() && id == named) || (declared.is_some() && declared == named) {
                return Err(CompileError::unsupported(
                    &branch.location,
                    format!("{keyword} branch references its own definition"),
                ));
            }
            referenced.push(id);
            declaring.push(declared);
        }

        if branches.len() == 1 {
            let branch = &branches[0];
            if base.is_empty() {
                return self.shape_of(branch, path, named);
            }
            let mut parts = base.to_vec();
            parts.extend(self.flatten_branch(branch)?);
            return self.merge_parts(node, &parts, path, named);
        }

        let mut variants: Vec<Vec<Part<'a>>> = Vec::with_capacity(branches.len());
        for branch in branches {
            let mut parts = base.to_vec();
            parts.extend(self.flatten_branch(branch)?);
            variants.push(parts);
        }

        let all_objects = variants
            .iter()
            .all(|parts| !parts.is_empty() && parts.iter().all(|p| p.is_object() && !p.carries_union()));
        let discovery = if all_objects {
            self.discover(&variants)
        } else {
            Discovery::None
        };

        let (property, tags) = match discovery {
            Discovery::One { property, tags } => (property, tags),
            Discovery::None => {
                debug!(location = %node.location, "{keyword} has no discriminator, falling back to a dynamic value");
                return Ok(Shape::Union(self.dynamic_union(base, &referenced)));
            }
            Discovery::Ambiguous(candidates) => {
                warn!(location = %node.location, ?candidates, "{keyword} has more than one candidate discriminator, falling back to a dynamic value");
                return Ok(Shape::Union(self.dynamic_union(base, &referenced)));
            }
        };

        let mut mapping = IndexMap::new();
        let mut ids = Vec::with_capacity(branches.len());
        for ((branch, parts), (tag, declared)) in branches.iter().zip(&variants).zip(tags.iter().zip(&declaring)) {
            let id = match declared {
                Some(id) if base.is_empty() => *id,
                _ => {
                    let variant_path = path.push(tag.clone());
                    let shape = self.merge_parts(branch, parts, &variant_path, None)?;
                    self.intern(shape, branch, &variant_path)?
                }
            };
            mapping.insert(tag.clone(), id);
            ids.push(id);
        }
        debug!(location = %node.location, %property, variants = ids.len(), "discriminated union");
        let local_name = naming::field_name(&property, &self.options.acronyms);
        Ok(Shape::Union(UnionShape {
            discriminant: Some(Discriminant {
                property,
                local_name,
                mapping,
            }),
            variants: ids,
            dynamic_fallback: false,
        }))
    }

    /// Follows definitions that are nothing but a `$ref` to another definition.
    fn declaring_definition(&self, mut index: usize) -> usize {
        let resolver = self.resolver;
        let mut seen = HashSet::new();
        while seen.insert(index) {
            let node = resolver.definition(index).node;
            let Some(reference) = node.reference.as_deref().filter(|_| node.is_bare_reference()) else {
                break;
            };
            match resolver.follow(&node.location, reference) {
                Ok(Target::Definition(next)) => index = next,
                _ => break,
            }
        }
        index
    }

    /// Branches that are all bare definition references stay enumerable.
    fn dynamic_union(&self, base: &[Part<'a>], referenced: &[Option<TypeId>]) -> UnionShape {
        let variants = if base.is_empty() && referenced.iter().all(Option::is_some) {
            referenced.iter().flatten().copied().collect()
        } else {
            Vec::new()
        };
        UnionShape::dynamic(variants)
    }

    /// Properties required in every variant with a distinct literal value in each.
    fn discover(&self, variants: &[Vec<Part<'a>>]) -> Discovery {
        let views: Vec<(IndexMap<&str, &'a SchemaNode>, HashSet<&str>)> =
            variants.iter().map(|parts| raw_view(parts)).collect();
        let Some((first, _)) = views.first() else {
            return Discovery::None;
        };

        let mut found = Vec::new();
        'candidates: for key in first.keys() {
            let mut tags = Vec::with_capacity(views.len());
            let mut seen = HashSet::new();
            for (properties, required) in &views {
                if !required.contains(key) {
                    continue 'candidates;
                }
                let Some(literal) = properties.get(key).and_then(|p| self.literal_of(*p)) else {
                    continue 'candidates;
                };
                let tag = literal.text();
                if !seen.insert(tag.clone()) {
                    continue 'candidates;
                }
                tags.push(tag);
            }
            found.push(((*key).to_owned(), tags));
        }

        match found.len() {
            0 => Discovery::None,
            1 => {
                let (property, tags) = found.remove(0);
                Discovery::One { property, tags }
            }
            _ => Discovery::Ambiguous(found.into_iter().map(|(property, _)| property).collect()),
        }
    }

    /// A property's fixed value, looking through bare references.
    fn literal_of(&self, property: &'a SchemaNode) -> Option<Literal> {
        let mut node = property;
        for _ in 0..16 {
            if let Some(literal) = node.literal() {
                return Some(literal);
            }
            if !node.is_bare_reference() {
                return None;
            }
            let reference = node.reference.as_deref()?;
            node = match self.resolver.follow(&node.location, reference).ok()? {
                Target::Definition(index) => self.resolver.definition(index).node,
                Target::Inline(target) => target,
            };
        }
        None
    }

    // ---- merging ----

    fn merge_parts(
        &mut self,
        node: &'a SchemaNode,
        parts: &[Part<'a>],
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        if parts.iter().any(|p| p.node.boolean == Some(false)) {
            return Err(CompileError::unsupported(&node.location, "the `false` schema admits no value"));
        }
        if let Some(nested) = parts.iter().find(|p| p.carries_union()) {
            return Err(CompileError::unsupported(
                &nested.node.location,
                "oneOf/anyOf nested inside another union branch",
            ));
        }
        let parts: Vec<Part<'a>> = parts.iter().copied().filter(|p| p.node.boolean.is_none()).collect();
        let (objects, others): (Vec<Part<'a>>, Vec<Part<'a>>) = parts.iter().copied().partition(|p| p.is_object());

        if parts.is_empty() {
            return Ok(Shape::Any);
        }
        if others.is_empty() {
            return self.merge_objects(&objects, path, named);
        }
        if !objects.is_empty() {
            return Err(CompileError::IncompatibleMerge {
                location: node.location.clone(),
                subject: "type".to_owned(),
                left: "object".to_owned(),
                right: describe(others[0].node),
            });
        }
        if let [only] = others.as_slice() {
            return match only.definition {
                Some(id) => Ok(Shape::Type(id)),
                None => self.leaf_shape(only.node, path, named),
            };
        }

        // Several leaf parts: they must agree on one primitive kind.
        let kinds: Vec<Option<PrimitiveKind>> = others.iter().map(|p| leaf_kind(p.node)).collect();
        let first = kinds[0];
        if let Some(position) = kinds.iter().position(|k| k.is_none() || *k != first) {
            return Err(CompileError::IncompatibleMerge {
                location: node.location.clone(),
                subject: "type".to_owned(),
                left: describe(others[0].node),
                right: describe(others[position].node),
            });
        }
        let formats: Vec<&str> = others.iter().filter_map(|p| p.node.format.as_deref()).collect();
        if let Some(conflict) = formats.iter().find(|f| **f != formats[0]) {
            return Err(CompileError::IncompatibleMerge {
                location: node.location.clone(),
                subject: "format".to_owned(),
                left: formats[0].to_owned(),
                right: (*conflict).to_owned(),
            });
        }
        // The most specific part decides: enum, then const, then format.
        let pick = others
            .iter()
            .find(|p| p.node.enum_values.is_some())
            .or_else(|| others.iter().find(|p| p.node.const_value.is_some()))
            .or_else(|| others.iter().find(|p| p.node.format.is_some()))
            .unwrap_or(&others[0]);
        match pick.definition {
            Some(id) => Ok(Shape::Type(id)),
            None => self.leaf_shape(pick.node, path, named),
        }
    }

    fn merge_objects(
        &mut self,
        parts: &[Part<'a>],
        path: &NamePath,
        named: Option<TypeId>,
    ) -> Result<Shape, CompileError> {
        let required: HashSet<&str> = parts
            .iter()
            .flat_map(|p| p.node.required.iter().map(String::as_str))
            .collect();
        let mut fields: IndexMap<String, Field> = IndexMap::new();
        for part in parts {
            let Some(properties) = &part.node.properties else {
                continue;
            };
            for (key, property) in properties {
                let incoming = match self.field(key, property, required.contains(key.as_str()), path) {
                    Ok(field) => field,
                    Err(error) => {
                        self.diagnostics.push(error);
                        continue;
                    }
                };
                if !fields.contains_key(key) {
                    fields.insert(key.clone(), incoming);
                    continue;
                }
                let Some(existing) = fields.get_mut(key) else {
                    continue;
                };
                let Some(ty) = self.unify(existing.ty, incoming.ty) else {
                    return Err(CompileError::IncompatibleMerge {
                        location: property.location.clone(),
                        subject: key.clone(),
                        left: self.registry.name(existing.ty).to_owned(),
                        right: self.registry.name(incoming.ty).to_owned(),
                    });
                };
                existing.ty = ty;
                if property.rename.is_some() {
                    existing.local_name = incoming.local_name;
                }
                existing.constant = incoming.constant.or(existing.constant.take());
                existing.default = incoming.default.or(existing.default.take());
                existing.description = existing.description.take().or(incoming.description);
                existing.deprecated |= incoming.deprecated;
                existing.nullable &= incoming.nullable;
                if existing.constraints.is_empty() {
                    existing.constraints = incoming.constraints;
                }
                existing.extensions.extend(incoming.extensions);
                existing.container_init = incoming.container_init.or(existing.container_init);
            }
        }
        let fields: Vec<Field> = fields.into_values().collect();
        if let Some(first) = parts.first() {
            self.check_local_names(&fields, first.node);
        }

        let nodes: Vec<&'a SchemaNode> = parts.iter().map(|p| p.node).collect();
        let openness = self.openness(&nodes, path)?;
        let extends = parts
            .iter()
            .filter(|p| p.definition.is_some() && p.definition != named && p.node.is_object_like())
            .find_map(|p| p.definition);
        Ok(Shape::Object(ObjectShape {
            fields,
            openness,
            extends,
        }))
    }

    /// The type a field gets when two `allOf` parts both declare it.
    fn unify(&self, left: TypeId, right: TypeId) -> Option<TypeId> {
        let any = self.registry.any();
        if left == right || right == any {
            return Some(left);
        }
        if left == any {
            return Some(right);
        }
        let resolved_left = self.registry.resolve(left);
        let resolved_right = self.registry.resolve(right);
        if resolved_left == resolved_right {
            // Keep the named alias over its underlying structure.
            return Some(if resolved_left == left { right } else { left });
        }
        match (self.registry.get(resolved_left)?, self.registry.get(resolved_right)?) {
            (TypeNode::Primitive(a), TypeNode::Primitive(b)) => match (a.kind, b.kind) {
                (x, y) if x == y => match (&a.format, &b.format) {
                    (_, None) => Some(left),
                    (None, Some(_)) => Some(right),
                    (Some(f), Some(g)) if f == g => Some(left),
                    _ => None,
                },
                (PrimitiveKind::Number, PrimitiveKind::Integer) => Some(right),
                (PrimitiveKind::Integer, PrimitiveKind::Number) => Some(left),
                _ => None,
            },
            (TypeNode::Primitive(primitive), TypeNode::Enum(enumeration))
                if enumeration.members.iter().all(|m| m.wire_value.kind() == Some(primitive.kind)) =>
            {
                Some(right)
            }
            (TypeNode::Enum(enumeration), TypeNode::Primitive(primitive))
                if enumeration.members.iter().all(|m| m.wire_value.kind() == Some(primitive.kind)) =>
            {
                Some(left)
            }
            _ => None,
        }
    }
}

/// Merged property map and required set of a variant, before any type is built.
fn raw_view<'a>(parts: &[Part<'a>]) -> (IndexMap<&'a str, &'a SchemaNode>, HashSet<&'a str>) {
    let mut properties = IndexMap::new();
    let mut required = HashSet::new();
    for part in parts {
        if let Some(props) = &part.node.properties {
            for (key, property) in props {
                properties.insert(key.as_str(), property);
            }
        }
        required.extend(part.node.required.iter().map(String::as_str));
    }
    (properties, required)
}

fn describe(node: &SchemaNode) -> String {
    if let Some(kind) = leaf_kind(node) {
        return kind.as_str().to_owned();
    }
    if node.items.is_some() {
        return "array".to_owned();
    }
    node.reference.clone().unwrap_or_else(|| "schema".to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::error::Diagnostics;
    use crate::ir::{Ir, ObjectType, UnionType};
    use crate::resolve::SchemaDocument;
    use serde_json::{json, Value};

    fn compile(value: Value) -> Result<Ir, Diagnostics> {
        crate::compile(&[SchemaDocument::new("api.json", &value)], &CompileOptions::default())
    }

    fn union<'i>(ir: &'i Ir, name: &str) -> &'i UnionType {
        match ir.find(name) {
            Some(TypeNode::Union(union)) => union,
            other => panic!("`{name}` is not a union: {other:?}"),
        }
    }

    fn object<'i>(ir: &'i Ir, name: &str) -> &'i ObjectType {
        match ir.find(name) {
            Some(TypeNode::Object(object)) => object,
            other => panic!("`{name}` is not an object: {other:?}"),
        }
    }

    fn field_names(object: &ObjectType) -> Vec<&str> {
        object.fields.iter().map(|f| f.wire_name.as_str()).collect()
    }

    #[test]
    fn all_of_unions_fields_and_required_sets() {
        let ir = compile(json!({
            "$defs": {
                "Base": { "type": "object", "required": ["id"], "properties": { "id": { "type": "string" } } },
                "User": {
                    "allOf": [
                        { "$ref": "#/$defs/Base" },
                        { "type": "object", "required": ["name"], "properties": { "name": { "type": "string" }, "id": { "type": "string", "format": "uuid" } } }
                    ]
                }
            }
        }))
        .unwrap();
        let user = object(&ir, "User");
        assert_eq!(field_names(user), ["id", "name"]);
        assert!(user.fields.iter().all(|f| f.required));
        assert_eq!(ir.name(user.fields[0].ty), "string<uuid>");
        assert_eq!(user.extends, ir.lookup("Base"));
    }

    #[test]
    fn all_of_with_conflicting_field_types_is_incompatible() {
        let err = compile(json!({
            "$defs": {
                "Bad": {
                    "allOf": [
                        { "properties": { "count": { "type": "string" } } },
                        { "properties": { "count": { "type": "integer" } } }
                    ]
                }
            }
        }))
        .unwrap_err();
        assert!(matches!(
            err.iter().next(),
            Some(CompileError::IncompatibleMerge { subject, .. }) if subject == "count"
        ));
    }

    #[test]
    fn ref_with_siblings_merges() {
        let ir = compile(json!({
            "$defs": {
                "Base": { "type": "object", "properties": { "id": { "type": "string" } } },
                "Extended": { "$ref": "#/$defs/Base", "properties": { "extra": { "type": "boolean" } } }
            }
        }))
        .unwrap();
        assert_eq!(field_names(object(&ir, "Extended")), ["id", "extra"]);
    }

    #[test]
    fn discriminated_union_from_inline_branches() {
        let ir = compile(json!({
            "$defs": {
                "Shape": {
                    "oneOf": [
                        { "type": "object", "required": ["kind"], "properties": { "kind": { "const": "a" }, "aField": { "type": "string" } } },
                        { "type": "object", "required": ["kind"], "properties": { "kind": { "enum": ["b"] }, "bField": { "type": "integer" } } }
                    ]
                }
            }
        }))
        .unwrap();
        let shape = union(&ir, "Shape");
        let discriminant = shape.discriminant.as_ref().unwrap();
        assert_eq!(discriminant.property, "kind");
        assert!(!shape.dynamic_fallback);
        assert_eq!(shape.variants.len(), 2);
        assert_eq!(discriminant.mapping["a"], ir.lookup("ShapeA").unwrap());
        assert_eq!(discriminant.mapping["b"], ir.lookup("ShapeB").unwrap());
        assert_eq!(object(&ir, "ShapeA").fields[0].constant, Some(Literal::String("a".into())));
    }

    #[test]
    fn discriminated_union_over_named_references() {
        let ir = compile(json!({
            "$defs": {
                "Cat": { "type": "object", "required": ["type"], "properties": { "type": { "const": "cat" } } },
                "Dog": { "type": "object", "required": ["type"], "properties": { "type": { "const": "dog" } } },
                "Pet": { "oneOf": [{ "$ref": "#/$defs/Cat" }, { "$ref": "#/$defs/Dog" }] }
            }
        }))
        .unwrap();
        let pet = union(&ir, "Pet");
        assert_eq!(pet.variants, vec![ir.lookup("Cat").unwrap(), ir.lookup("Dog").unwrap()]);
        assert_eq!(pet.discriminant.as_ref().unwrap().property, "type");
    }

    #[test]
    fn reference_only_variants_resolve_to_the_declaring_object() {
        let ir = compile(json!({
            "$defs": {
                "CatBase": { "type": "object", "required": ["type"], "properties": { "type": { "const": "cat" } } },
                "Cat": { "$ref": "#/$defs/CatBase" },
                "Dog": { "type": "object", "required": ["type"], "properties": { "type": { "const": "dog" } } },
                "Pet": { "oneOf": [{ "$ref": "#/$defs/Cat" }, { "$ref": "#/$defs/Dog" }] }
            }
        }))
        .unwrap();
        let pet = union(&ir, "Pet");
        let discriminant = pet.discriminant.as_ref().unwrap();
        assert_eq!(discriminant.mapping["cat"], ir.lookup("CatBase").unwrap());
        for variant in &pet.variants {
            assert!(matches!(ir.get(*variant), TypeNode::Object(_)), "{} is not an object", ir.name(*variant));
        }
        assert!(matches!(ir.find("Cat"), Some(TypeNode::Alias(_))));
    }

    #[test]
    fn branches_without_a_common_literal_fall_back() {
        let ir = compile(json!({
            "$defs": {
                "A": { "type": "object", "properties": { "a": { "type": "string" } } },
                "B": { "type": "object", "properties": { "b": { "type": "string" } } },
                "Either": { "anyOf": [{ "$ref": "#/$defs/A" }, { "$ref": "#/$defs/B" }] },
                "Loose": { "anyOf": [{ "type": "string" }, { "$ref": "#/$defs/A" }] }
            }
        }))
        .unwrap();
        let either = union(&ir, "Either");
        assert!(either.dynamic_fallback && either.discriminant.is_none());
        assert_eq!(either.variants.len(), 2);
        let loose = union(&ir, "Loose");
        assert!(loose.dynamic_fallback && loose.variants.is_empty());
    }

    #[test]
    fn two_candidate_discriminators_are_ambiguous() {
        let ir = compile(json!({
            "$defs": {
                "Pair": {
                    "oneOf": [
                        { "required": ["x", "y"], "properties": { "x": { "const": 1 }, "y": { "const": "p" } } },
                        { "required": ["x", "y"], "properties": { "x": { "const": 2 }, "y": { "const": "q" } } }
                    ]
                }
            }
        }))
        .unwrap();
        assert!(union(&ir, "Pair").dynamic_fallback);
    }

    #[test]
    fn repeated_tag_values_do_not_discriminate() {
        let ir = compile(json!({
            "$defs": {
                "Same": {
                    "oneOf": [
                        { "required": ["k"], "properties": { "k": { "const": "x" }, "a": { "type": "string" } } },
                        { "required": ["k"], "properties": { "k": { "const": "x" }, "b": { "type": "string" } } }
                    ]
                }
            }
        }))
        .unwrap();
        assert!(union(&ir, "Same").discriminant.is_none());
    }

    #[test]
    fn single_branch_collapses_to_an_alias() {
        let ir = compile(json!({ "$defs": { "Token": { "anyOf": [{ "type": "string" }] } } })).unwrap();
        let Some(TypeNode::Alias(token)) = ir.find("Token") else {
            panic!("Token should be an alias");
        };
        assert_eq!(ir.name(token.underlying), "string");
    }

    #[test]
    fn single_inline_object_branch_is_the_named_object() {
        let ir = compile(json!({
            "$defs": { "Wrapper": { "oneOf": [{ "type": "object", "properties": { "inner": { "type": "string" } } }] } }
        }))
        .unwrap();
        assert_eq!(field_names(object(&ir, "Wrapper")), ["inner"]);
    }

    #[test]
    fn bare_self_reference_branch_is_unsupported() {
        let err = compile(json!({
            "$defs": { "Node": { "oneOf": [{ "$ref": "#/$defs/Node" }, { "type": "string" }] } }
        }))
        .unwrap_err();
        assert!(matches!(err.iter().next(), Some(CompileError::UnsupportedCombinator { .. })));
    }

    #[test]
    fn all_of_base_is_merged_into_each_branch_before_classifying() {
        let ir = compile(json!({
            "$defs": {
                "Envelope": { "type": "object", "required": ["id"], "properties": { "id": { "type": "string" } } },
                "Message": {
                    "allOf": [
                        { "$ref": "#/$defs/Envelope" },
                        {
                            "oneOf": [
                                { "required": ["kind"], "properties": { "kind": { "const": "text" }, "body": { "type": "string" } } },
                                { "required": ["kind"], "properties": { "kind": { "const": "image" }, "url": { "type": "string" } } }
                            ]
                        }
                    ]
                }
            }
        }))
        .unwrap();
        let message = union(&ir, "Message");
        assert_eq!(message.discriminant.as_ref().unwrap().property, "kind");
        assert_eq!(field_names(object(&ir, "MessageText")), ["id", "kind", "body"]);
        assert_eq!(field_names(object(&ir, "MessageImage")), ["id", "kind", "url"]);
        assert_eq!(object(&ir, "MessageText").extends, ir.lookup("Envelope"));
    }

    #[test]
    fn branch_that_is_itself_an_all_of_is_merged_first() {
        let ir = compile(json!({
            "$defs": {
                "Base": { "type": "object", "required": ["kind"], "properties": { "kind": { "type": "string" } } },
                "Event": {
                    "oneOf": [
                        { "allOf": [{ "$ref": "#/$defs/Base" }, { "properties": { "kind": { "const": "start" } } }] },
                        { "allOf": [{ "$ref": "#/$defs/Base" }, { "properties": { "kind": { "const": "stop" } } }] }
                    ]
                }
            }
        }))
        .unwrap();
        let event = union(&ir, "Event");
        let discriminant = event.discriminant.as_ref().unwrap();
        assert_eq!(discriminant.mapping.keys().collect::<Vec<_>>(), ["start", "stop"]);
        assert_eq!(object(&ir, "EventStart").fields[0].constant, Some(Literal::String("start".into())));
    }

    #[test]
    fn one_of_and_any_of_together_are_unsupported() {
        let err = compile(json!({
            "$defs": { "Both": { "oneOf": [{ "type": "string" }], "anyOf": [{ "type": "integer" }] } }
        }))
        .unwrap_err();
        assert!(matches!(err.iter().next(), Some(CompileError::UnsupportedCombinator { .. })));
    }

    #[test]
    fn primitive_parts_must_agree() {
        let ir = compile(json!({
            "$defs": { "Code": { "allOf": [{ "type": "string" }, { "enum": ["a", "b"] }] } }
        }))
        .unwrap();
        assert!(matches!(ir.find("Code"), Some(TypeNode::Enum(_))));

        let err = compile(json!({
            "$defs": { "Odd": { "allOf": [{ "type": "string" }, { "type": "integer" }] } }
        }))
        .unwrap_err();
        assert!(matches!(err.iter().next(), Some(CompileError::IncompatibleMerge { .. })));
    }
}
