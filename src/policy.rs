//! Field policy: representation, construction-time initialization and the
//! fallback for absent wire values, decided once per field.
use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, trace};

use crate::config::{CompileOptions, ContainerInit};
use crate::ir::{Registry, TypeId, TypeNode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Representation {
    #[default]
    NonNull,
    /// Boxed / optional / pointer, depending on the target.
    Nullable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Init {
    #[default]
    None,
    /// The field's `default` literal.
    Default,
    /// An empty list or map.
    EmptyContainer,
    /// The zero value of the field's object type.
    ZeroValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OnMissing {
    /// Required on the wire.
    Reject,
    /// Stays absent / null.
    #[default]
    Absent,
    /// Missing or null on the wire falls back to the field's initializer.
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct FieldPolicy {
    pub representation: Representation,
    pub init: Init,
    pub on_missing: OnMissing,
}

/// Annotates every object field in the registry with its [`FieldPolicy`].
pub(crate) fn resolve(registry: &mut Registry, options: &CompileOptions) {
    let blocked = zero_value_cycles(registry);
    let objects: Vec<TypeId> = registry
        .ids()
        .filter(|id| matches!(registry.get(*id), Some(TypeNode::Object(_))))
        .collect();

    for owner in objects {
        let shapes: Vec<FieldShape> = match registry.get(owner) {
            Some(TypeNode::Object(object)) => object
                .fields
                .iter()
                .map(|field| field_shape(registry, field.ty))
                .collect(),
            _ => continue,
        };
        let Some(TypeNode::Object(object)) = registry.get_mut(owner) else {
            continue;
        };
        let owner_name = object.name.clone();
        for (field, shape) in object.fields.iter_mut().zip(shapes) {
            let mode = field.container_init.unwrap_or(options.container_init);
            let zero_value_allowed = match shape {
                FieldShape::Object(target) => !blocked.contains(&(owner, target)),
                _ => false,
            };
            let init = if field.default.is_some() {
                Init::Default
            } else if shape == FieldShape::Container && mode == ContainerInit::Eager {
                Init::EmptyContainer
            } else if field.required && zero_value_allowed {
                Init::ZeroValue
            } else {
                Init::None
            };
            let on_missing = match init {
                Init::Default => OnMissing::Fallback,
                _ if field.required => OnMissing::Reject,
                Init::EmptyContainer => OnMissing::Fallback,
                _ => OnMissing::Absent,
            };
            let representation = if init == Init::EmptyContainer {
                Representation::NonNull
            } else if !field.required || field.nullable {
                Representation::Nullable
            } else {
                Representation::NonNull
            };
            field.policy = FieldPolicy {
                representation,
                init,
                on_missing,
            };
            trace!(owner = %owner_name, field = %field.wire_name, policy = ?field.policy, "field policy");
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldShape {
    Container,
    Object(TypeId),
    Other,
}

fn field_shape(registry: &Registry, ty: TypeId) -> FieldShape {
    let resolved = registry.resolve(ty);
    match registry.get(resolved) {
        Some(TypeNode::ArrayOf(_) | TypeNode::MapOf(_)) => FieldShape::Container,
        Some(TypeNode::Object(_)) => FieldShape::Object(resolved),
        _ => FieldShape::Other,
    }
}

/// Owner/target pairs whose zero-value instantiation would recurse.
///
/// An edge runs from an object to the object type of each required field
/// without a default. Instantiating the target must never lead back to the
/// owner, so an edge is blocked when the owner is reachable from its target.
fn zero_value_cycles(registry: &Registry) -> HashSet<(TypeId, TypeId)> {
    let mut edges: HashMap<TypeId, Vec<TypeId>> = HashMap::new();
    for id in registry.ids() {
        let Some(TypeNode::Object(object)) = registry.get(id) else {
            continue;
        };
        let targets = object
            .fields
            .iter()
            .filter(|f| f.required && f.default.is_none())
            .filter_map(|f| match field_shape(registry, f.ty) {
                FieldShape::Object(target) => Some(target),
                _ => None,
            })
            .collect();
        edges.insert(id, targets);
    }

    let reaches = |from: TypeId, goal: TypeId| -> bool {
        let mut stack = vec![from];
        let mut seen = HashSet::new();
        while let Some(next) = stack.pop() {
            if next == goal {
                return true;
            }
            if seen.insert(next) {
                stack.extend(edges.get(&next).into_iter().flatten().copied());
            }
        }
        false
    };

    let mut blocked = HashSet::new();
    for (owner, targets) in &edges {
        for target in targets {
            if reaches(*target, *owner) {
                debug!(owner = registry.name(*owner), target = registry.name(*target), "zero-value initialization would recurse");
                blocked.insert((*owner, *target));
            }
        }
    }
    blocked
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Field, Literal, ObjectType, Openness, Primitive, PrimitiveKind};
    use crate::schema::Location;

    fn object(name: &str, fields: Vec<Field>) -> TypeNode {
        TypeNode::Object(ObjectType {
            name: name.into(),
            description: None,
            fields,
            openness: Openness::Open,
            extends: None,
        })
    }

    fn field(name: &str, ty: TypeId, required: bool) -> Field {
        Field {
            required,
            ..Field::new(name, name, ty)
        }
    }

    fn policies(registry: &Registry, id: TypeId) -> Vec<FieldPolicy> {
        match registry.get(id) {
            Some(TypeNode::Object(object)) => object.fields.iter().map(|f| f.policy).collect(),
            other => panic!("not an object: {other:?}"),
        }
    }

    fn containers_registry() -> (Registry, TypeId) {
        let mut registry = Registry::new();
        let number = registry.structural(TypeNode::Primitive(Primitive::new(PrimitiveKind::Number)));
        let numbers = registry.structural(TypeNode::ArrayOf(number));
        let mut with_default = field("level", number, false);
        with_default.default = Some(Literal::Integer(3));
        let mut lazy_override = field("later", numbers, false);
        lazy_override.container_init = Some(ContainerInit::Lazy);
        let id = registry.declare(
            object(
                "Stats",
                vec![field("scores", numbers, false), field("count", number, true), with_default, lazy_override],
            ),
            Location::root("d"),
        );
        (registry, id)
    }

    #[test]
    fn eager_mode_materializes_optional_containers() {
        let (mut registry, id) = containers_registry();
        resolve(&mut registry, &CompileOptions::default());
        let resolved = policies(&registry, id);
        let [scores, count, level, later] = resolved.as_slice() else {
            panic!("expected four fields");
        };
        assert_eq!(scores.init, Init::EmptyContainer);
        assert_eq!(scores.representation, Representation::NonNull);
        assert_eq!(scores.on_missing, OnMissing::Fallback);
        assert_eq!(count.representation, Representation::NonNull);
        assert_eq!(count.on_missing, OnMissing::Reject);
        assert_eq!(level.init, Init::Default);
        assert_eq!(level.representation, Representation::Nullable);
        assert_eq!(later.init, Init::None);
        assert_eq!(later.on_missing, OnMissing::Absent);
    }

    #[test]
    fn lazy_mode_preserves_absence() {
        let (mut registry, id) = containers_registry();
        let options = CompileOptions {
            container_init: ContainerInit::Lazy,
            ..Default::default()
        };
        resolve(&mut registry, &options);
        let scores = policies(&registry, id)[0];
        assert_eq!(scores.init, Init::None);
        assert_eq!(scores.representation, Representation::Nullable);
        assert_eq!(scores.on_missing, OnMissing::Absent);
    }

    #[test]
    fn required_objects_get_zero_values_unless_they_recurse() {
        let mut registry = Registry::new();
        let address = registry.declare(object("Address", vec![]), Location::root("d"));
        let node = registry.reserve("Node", Location::root("d"));
        registry.fill(node, object("Node", vec![field("next", node, true)]));
        let person = registry.declare(
            object("Person", vec![field("home", address, true), field("work", address, false)]),
            Location::root("d"),
        );
        resolve(&mut registry, &CompileOptions::default());

        let person = policies(&registry, person);
        assert_eq!(person[0].init, Init::ZeroValue);
        assert_eq!(person[0].representation, Representation::NonNull);
        assert_eq!(person[1].init, Init::None);
        assert_eq!(policies(&registry, node)[0].init, Init::None);
    }
}
