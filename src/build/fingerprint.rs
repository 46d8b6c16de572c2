use crate::config::ContainerInit;
use crate::ir::{EnumMember, Field, Literal, Openness, TypeId};
use crate::schema::Constraints;

use super::Shape;

/// Structural identity of an anonymous declared shape.
///
/// Children are compared by [`TypeId`], so the print is only meaningful once
/// every child has been interned. Descriptions are not part of the print.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Fingerprint {
    Object {
        fields: Vec<FieldPrint>,
        openness: Openness,
        extends: Option<TypeId>,
    },
    Enum {
        members: Vec<EnumMember>,
        nullable: bool,
    },
    Union {
        discriminant: Option<(String, Vec<(String, TypeId)>)>,
        variants: Vec<TypeId>,
        dynamic_fallback: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct FieldPrint {
    wire_name: String,
    local_name: String,
    ty: TypeId,
    required: bool,
    nullable: bool,
    deprecated: bool,
    default: Option<Literal>,
    constant: Option<Literal>,
    constraints: Constraints,
    extensions: Vec<(String, String)>,
    container_init: Option<ContainerInit>,
}

impl From<&Field> for FieldPrint {
    fn from(field: &Field) -> Self {
        Self {
            wire_name: field.wire_name.clone(),
            local_name: field.local_name.clone(),
            ty: field.ty,
            required: field.required,
            nullable: field.nullable,
            deprecated: field.deprecated,
            default: field.default.clone(),
            constant: field.constant.clone(),
            constraints: field.constraints.clone(),
            extensions: field.extensions.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            container_init: field.container_init,
        }
    }
}

impl Fingerprint {
    /// `None` for shapes that are interned by structural name instead.
    pub(crate) fn of(shape: &Shape) -> Option<Self> {
        Some(match shape {
            Shape::Object(object) => Fingerprint::Object {
                fields: object.fields.iter().map(FieldPrint::from).collect(),
                openness: object.openness,
                extends: object.extends,
            },
            Shape::Enum(enumeration) => Fingerprint::Enum {
                members: enumeration.members.clone(),
                nullable: enumeration.nullable,
            },
            Shape::Union(union) => Fingerprint::Union {
                discriminant: union.discriminant.as_ref().map(|d| {
                    (
                        d.property.clone(),
                        d.mapping.iter().map(|(tag, id)| (tag.clone(), *id)).collect(),
                    )
                }),
                variants: union.variants.clone(),
                dynamic_fallback: union.dynamic_fallback,
            },
            Shape::Type(_) | Shape::Any | Shape::Primitive(_) | Shape::Array(_) | Shape::Map(_) => return None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::ObjectShape;
    use crate::ir::Registry;

    fn object(fields: Vec<Field>) -> Shape {
        Shape::Object(ObjectShape {
            fields,
            openness: Openness::Open,
            extends: None,
        })
    }

    #[test]
    fn descriptions_do_not_split_shapes() {
        let any = Registry::new().any();
        let mut documented = Field::new("a", "a", any);
        documented.description = Some("the a".into());
        let plain = Field::new("a", "a", any);
        assert_eq!(Fingerprint::of(&object(vec![documented])), Fingerprint::of(&object(vec![plain])));
    }

    #[test]
    fn required_flags_split_shapes() {
        let any = Registry::new().any();
        let required = Field {
            required: true,
            ..Field::new("a", "a", any)
        };
        let optional = Field::new("a", "a", any);
        assert_ne!(Fingerprint::of(&object(vec![required])), Fingerprint::of(&object(vec![optional])));
    }
}
