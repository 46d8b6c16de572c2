//! Go: structs with `json` tags, typed enums with const blocks, and tagged
//! unions as wrapper structs with custom (un)marshalling.
use std::collections::BTreeSet;

use crate::ir::{
    AliasType, EnumType, Field, Format, Ir, Literal, ObjectType, PrimitiveKind, TypeId, TypeNode, UnionType,
};
use crate::naming::{self, Casing};
use crate::policy::{Init, Representation};

use super::{comment_lines, layout, Chunk, Framing, GeneratedFile, RenderError, RenderOptions, Renderer};

pub struct Go;

const KEYWORDS: &[&str] = &[
    "break", "case", "chan", "const", "continue", "default", "defer", "else", "fallthrough", "for", "func", "go",
    "goto", "if", "import", "interface", "map", "package", "range", "return", "select", "struct", "switch", "type",
    "var",
];

impl Renderer for Go {
    fn name(&self) -> &'static str {
        "go"
    }

    fn extension(&self) -> &'static str {
        "go"
    }

    fn render(&self, ir: &Ir, options: &RenderOptions) -> Result<Vec<GeneratedFile>, RenderError> {
        let mut chunks = Vec::new();
        for (id, node) in ir.declarations() {
            let mut writer = Writer {
                ir,
                imports: BTreeSet::new(),
                out: String::new(),
            };
            writer.declaration(node)?;
            chunks.push(Chunk {
                name: ir.name(id).to_owned(),
                imports: writer.imports,
                dependencies: Vec::new(),
                body: writer.out,
            });
        }
        if chunks.iter().any(|c| c.body.contains("ptr(")) {
            chunks.push(Chunk {
                name: "helpers".to_owned(),
                body: "func ptr[T any](value T) *T {\n\treturn &value\n}\n".to_owned(),
                ..Default::default()
            });
        }
        Ok(layout(self, chunks, options))
    }
}

impl Framing for Go {
    fn extension(&self) -> &'static str {
        "go"
    }

    fn bundle_stem(&self, options: &RenderOptions) -> String {
        package_name(&options.package)
    }

    fn type_stem(&self, name: &str) -> String {
        naming::tokenize(name, &Default::default())
            .iter()
            .map(|w| w.to_lowercase())
            .collect::<Vec<_>>()
            .join("_")
    }

    fn header(&self, options: &RenderOptions, imports: &BTreeSet<String>, _dependencies: &[String]) -> String {
        let mut header = format!(
            "// Code generated by schema-unify. DO NOT EDIT.\n\npackage {}\n\n",
            package_name(&options.package)
        );
        match imports.len() {
            0 => {}
            1 => header.push_str(&format!("import \"{}\"\n\n", imports.iter().next().map_or("", String::as_str))),
            _ => {
                header.push_str("import (\n");
                for import in imports {
                    header.push_str(&format!("\t\"{import}\"\n"));
                }
                header.push_str(")\n\n");
            }
        }
        header
    }
}

fn package_name(raw: &str) -> String {
    let name: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect::<String>()
        .to_lowercase();
    match name.as_str() {
        "" => "models".to_owned(),
        keyword if KEYWORDS.contains(&keyword) => format!("{keyword}_"),
        _ => name,
    }
}

struct Writer<'i> {
    ir: &'i Ir,
    imports: BTreeSet<String>,
    out: String,
}

impl Writer<'_> {
    fn line(&mut self, text: impl AsRef<str>) {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn doc(&mut self, name: &str, description: Option<&str>) {
        if let Some(description) = description {
            let text = format!("{name} {}", lower_first(description));
            self.line(comment_lines(&text, "// "));
        }
    }

    fn declaration(&mut self, node: &TypeNode) -> Result<(), RenderError> {
        match node {
            TypeNode::Object(object) => self.structure(object),
            TypeNode::Enum(enumeration) => self.enumeration(enumeration)?,
            TypeNode::Union(union) => self.union(union)?,
            TypeNode::Alias(alias) => self.alias(alias),
            TypeNode::Primitive(_) | TypeNode::ArrayOf(_) | TypeNode::MapOf(_) => {}
        }
        Ok(())
    }

    // ---- structs ----

    fn structure(&mut self, object: &ObjectType) {
        self.doc(&object.name, object.description.as_deref());
        self.line(format!("type {} struct {{", object.name));
        if let Some(base) = object.extends {
            self.line(format!("\t// Includes the fields of {}.", self.ir.name(base)));
        }
        for field in &object.fields {
            if let Some(description) = &field.description {
                self.line(comment_lines(description, "\t// "));
            }
            if field.deprecated {
                self.line("\t// Deprecated: this field is deprecated.");
            }
            let ty = self.field_type(field);
            let omit = if field.required { "" } else { ",omitempty" };
            self.line(format!("\t{} {ty} `json:\"{}{omit}\"`", exported(self.ir, field), field.wire_name));
        }
        self.line("}");

        let initialized: Vec<&Field> = object
            .fields
            .iter()
            .filter(|f| matches!(f.policy.init, Init::Default | Init::EmptyContainer | Init::ZeroValue))
            .collect();
        if initialized.is_empty() {
            return;
        }
        let name = &object.name;
        self.line("");
        self.line(format!(
            "// New{name} returns a {name} with defaults applied. Decoding into it keeps them for absent fields."
        ));
        self.line(format!("func New{name}() {name} {{"));
        self.line(format!("\treturn {name}{{"));
        for field in initialized {
            if let Some(value) = self.initializer(field) {
                self.line(format!("\t\t{}: {value},", exported(self.ir, field)));
            }
        }
        self.line("\t}");
        self.line("}");
    }

    fn field_type(&mut self, field: &Field) -> String {
        let base = self.expr(field.ty);
        if field.policy.representation == Representation::Nullable && self.pointer_worthy(field.ty) {
            format!("*{base}")
        } else {
            base
        }
    }

    /// Slices, maps and interface values already have a nil.
    fn pointer_worthy(&self, id: TypeId) -> bool {
        let resolved = self.ir.resolve(id);
        match self.ir.get(resolved) {
            TypeNode::ArrayOf(_) | TypeNode::MapOf(_) => false,
            TypeNode::Union(union) => union.discriminant.is_some(),
            _ => true,
        }
    }

    fn initializer(&mut self, field: &Field) -> Option<String> {
        let ty = self.expr(field.ty);
        match field.policy.init {
            Init::EmptyContainer => Some(format!("{ty}{{}}")),
            Init::ZeroValue => {
                let resolved = self.ir.resolve(field.ty);
                let has_constructor = match self.ir.get(resolved) {
                    TypeNode::Object(object) => object.fields.iter().any(|f| f.policy.init != Init::None),
                    _ => false,
                };
                has_constructor.then(|| format!("New{}()", self.ir.name(resolved)))
            }
            Init::Default => {
                let value = field.default.as_ref()?;
                let literal = go_literal(value)?;
                let converted = match self.ir.get(self.ir.resolve(field.ty)) {
                    TypeNode::Primitive(p) if p.format == Some(Format::DateTime) => return None,
                    TypeNode::Primitive(_) | TypeNode::Enum(_) => format!("{ty}({literal})"),
                    _ => return None,
                };
                if self.field_type(field).starts_with('*') {
                    Some(format!("ptr({converted})"))
                } else {
                    Some(converted)
                }
            }
            Init::None => None,
        }
    }

    // ---- enums ----

    fn enumeration(&mut self, enumeration: &EnumType) -> Result<(), RenderError> {
        let name = &enumeration.name;
        let Some(kind) = enumeration.members.first().and_then(|m| m.wire_value.kind()) else {
            return Err(RenderError::Unsupported {
                renderer: "go",
                type_name: name.clone(),
                reason: "enum without typed members".to_owned(),
            });
        };
        self.doc(name, enumeration.description.as_deref());
        self.line(format!("type {name} {}", primitive_type(kind, None)));
        self.line("");
        self.line("const (");
        for member in &enumeration.members {
            let Some(literal) = go_literal(&member.wire_value) else {
                continue;
            };
            let constant = naming::apply(Casing::Type, &member.constant_name, self.ir.acronyms());
            self.line(format!("\t{name}{constant} {name} = {literal}"));
        }
        self.line(")");
        Ok(())
    }

    // ---- unions ----

    fn union(&mut self, union: &UnionType) -> Result<(), RenderError> {
        let ir = self.ir;
        let name = &union.name;
        self.doc(name, union.description.as_deref());
        let Some(discriminant) = &union.discriminant else {
            let variants: Vec<&str> = union.variants.iter().map(|v| ir.name(*v)).collect();
            if !variants.is_empty() {
                self.line(format!("// {name} holds one of: {}.", variants.join(", ")));
            }
            self.line(format!("type {name} = any"));
            return Ok(());
        };
        self.imports.insert("encoding/json".to_owned());
        self.imports.insert("fmt".to_owned());

        let variants: Vec<(String, String, TypeId)> = discriminant
            .mapping
            .iter()
            .map(|(tag, id)| (ir.name(*id).to_owned(), self.tag_json(*id, &discriminant.property, tag), *id))
            .collect();

        self.line(format!("type {name} struct {{"));
        for (variant, _, _) in &variants {
            self.line(format!("\t{variant} *{variant}"));
        }
        self.line("}");
        self.line("");

        self.line(format!("func (u {name}) MarshalJSON() ([]byte, error) {{"));
        self.line("\tswitch {");
        for (variant, _, _) in &variants {
            self.line(format!("\tcase u.{variant} != nil:"));
            self.line(format!("\t\treturn json.Marshal(u.{variant})"));
        }
        self.line("\t}");
        self.line("\treturn []byte(\"null\"), nil");
        self.line("}");
        self.line("");

        self.line(format!("func (u *{name}) UnmarshalJSON(data []byte) error {{"));
        self.line("\tvar probe struct {");
        self.line(format!("\t\tTag json.RawMessage `json:\"{}\"`", discriminant.property));
        self.line("\t}");
        self.line("\tif err := json.Unmarshal(data, &probe); err != nil {");
        self.line("\t\treturn err");
        self.line("\t}");
        self.line("\tswitch string(probe.Tag) {");
        for (variant, tag, _) in &variants {
            self.line(format!("\tcase `{tag}`:"));
            self.line(format!("\t\tu.{variant} = new({variant})"));
            self.line(format!("\t\treturn json.Unmarshal(data, u.{variant})"));
        }
        self.line("\t}");
        self.line(format!(
            "\treturn fmt.Errorf(\"{name}: unknown {} %s\", probe.Tag)",
            discriminant.property
        ));
        self.line("}");
        Ok(())
    }

    /// Wire text of a variant's tag, typed as the variant declares it.
    fn tag_json(&self, variant: TypeId, property: &str, tag: &str) -> String {
        if let TypeNode::Object(object) = self.ir.get(self.ir.resolve(variant)) {
            if let Some(constant) = object.field(property).and_then(|f| f.constant.as_ref()) {
                return constant.to_string();
            }
        }
        Literal::String(tag.to_owned()).to_string()
    }

    // ---- aliases ----

    fn alias(&mut self, alias: &AliasType) {
        self.doc(&alias.name, alias.description.as_deref());
        let underlying = self.expr(alias.underlying);
        if alias.underlying == self.ir.any() {
            self.line(format!("type {} = {underlying}", alias.name));
        } else {
            self.line(format!("type {} {underlying}", alias.name));
        }
    }

    // ---- type expressions ----

    fn expr(&mut self, id: TypeId) -> String {
        if self.ir.is_declared(id) {
            return self.ir.name(id).to_owned();
        }
        match self.ir.get(id) {
            TypeNode::Primitive(primitive) => {
                if primitive.format == Some(Format::DateTime) {
                    self.imports.insert("time".to_owned());
                }
                primitive_type(primitive.kind, primitive.format.as_ref()).to_owned()
            }
            TypeNode::ArrayOf(element) => format!("[]{}", self.expr(*element)),
            TypeNode::MapOf(value) => format!("map[string]{}", self.expr(*value)),
            TypeNode::Union(_) => "any".to_owned(),
            TypeNode::Object(_) | TypeNode::Enum(_) | TypeNode::Alias(_) => self.ir.name(id).to_owned(),
        }
    }
}

fn primitive_type(kind: PrimitiveKind, format: Option<&Format>) -> &'static str {
    match (kind, format) {
        (PrimitiveKind::String, Some(Format::DateTime)) => "time.Time",
        (PrimitiveKind::String, Some(Format::Byte)) => "[]byte",
        (PrimitiveKind::String, _) => "string",
        (PrimitiveKind::Integer, Some(Format::Int32)) => "int32",
        (PrimitiveKind::Integer, _) => "int64",
        (PrimitiveKind::Number, Some(Format::Float)) => "float32",
        (PrimitiveKind::Number, _) => "float64",
        (PrimitiveKind::Boolean, _) => "bool",
    }
}

fn go_literal(value: &Literal) -> Option<String> {
    match value {
        Literal::Bool(_) | Literal::Integer(_) | Literal::Number(_) | Literal::String(_) => Some(value.to_string()),
        Literal::Null | Literal::Json(_) => None,
    }
}

/// Exported Go field name: an `x-go-name` extension, else the local name re-cased.
fn exported(ir: &Ir, field: &Field) -> String {
    match field.extensions.get("x-go-name") {
        Some(name) => name.clone(),
        None => naming::apply(Casing::Type, &field.local_name, ir.acronyms()),
    }
}

fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
