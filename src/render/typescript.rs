//! TypeScript: interfaces keyed by wire name, string-literal enums, union types.
use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::ir::{Ir, Literal, ObjectType, Openness, PrimitiveKind, TypeId, TypeNode, UnionType};
use crate::policy::Representation;

use super::{comment_lines, layout, Chunk, Framing, GeneratedFile, RenderError, RenderOptions, Renderer};

pub struct TypeScript;

static PLAIN_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("key pattern compiles"));

const RESERVED: &[&str] = &[
    "break", "case", "catch", "class", "const", "continue", "debugger", "default", "delete", "do", "else", "enum",
    "export", "extends", "false", "finally", "for", "function", "if", "import", "in", "instanceof", "new", "null",
    "return", "super", "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with", "any",
    "unknown", "never", "object", "string", "number", "boolean", "symbol", "type", "interface",
];

impl Renderer for TypeScript {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn extension(&self) -> &'static str {
        "ts"
    }

    fn render(&self, ir: &Ir, options: &RenderOptions) -> Result<Vec<GeneratedFile>, RenderError> {
        let chunks = ir
            .declarations()
            .map(|(id, node)| Chunk {
                name: type_name(ir.name(id)),
                imports: BTreeSet::new(),
                dependencies: ir.dependencies(id).into_iter().map(|dep| type_name(ir.name(dep))).collect(),
                body: declaration(ir, node),
            })
            .collect();
        Ok(layout(self, chunks, options))
    }
}

impl Framing for TypeScript {
    fn extension(&self) -> &'static str {
        "ts"
    }

    fn bundle_stem(&self, _options: &RenderOptions) -> String {
        "models".to_owned()
    }

    fn type_stem(&self, name: &str) -> String {
        name.to_owned()
    }

    fn header(&self, _options: &RenderOptions, _imports: &BTreeSet<String>, dependencies: &[String]) -> String {
        let mut header = String::from("// Code generated by schema-unify. DO NOT EDIT.\n\n");
        for dependency in dependencies {
            header.push_str(&format!("import type {{ {dependency} }} from \"./{dependency}\";\n"));
        }
        if !dependencies.is_empty() {
            header.push('\n');
        }
        header
    }
}

fn type_name(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("{name}_")
    } else {
        name.to_owned()
    }
}

fn declaration(ir: &Ir, node: &TypeNode) -> String {
    let mut out = String::new();
    if let Some(description) = node.description() {
        out.push_str(&format!("/**\n{}\n */\n", comment_lines(description, " * ")));
    }
    match node {
        TypeNode::Object(object) => out.push_str(&interface(ir, object)),
        TypeNode::Enum(enumeration) => {
            let name = type_name(&enumeration.name);
            let mut values: Vec<String> = enumeration.members.iter().map(|m| literal(&m.wire_value)).collect();
            if enumeration.nullable {
                values.push("null".to_owned());
            }
            out.push_str(&format!("export type {name} = {};\n\n", values.join(" | ")));
            out.push_str(&format!("export const {name} = {{\n"));
            for member in &enumeration.members {
                out.push_str(&format!("  {}: {},\n", member.constant_name, literal(&member.wire_value)));
            }
            out.push_str("} as const;\n");
        }
        TypeNode::Union(union) => {
            out.push_str(&format!("export type {} = {};\n", type_name(&union.name), union_expr(ir, union)));
        }
        TypeNode::Alias(alias) => {
            out.push_str(&format!("export type {} = {};\n", type_name(&alias.name), expr(ir, alias.underlying)));
        }
        TypeNode::Primitive(_) | TypeNode::ArrayOf(_) | TypeNode::MapOf(_) => {}
    }
    out
}

fn interface(ir: &Ir, object: &ObjectType) -> String {
    let extends = object
        .extends
        .map(|base| format!(" extends {}", type_name(ir.name(base))))
        .unwrap_or_default();
    let mut out = format!("export interface {}{extends} {{\n", type_name(&object.name));
    for field in &object.fields {
        let mut docs = Vec::new();
        if let Some(description) = &field.description {
            docs.push(description.clone());
        }
        if field.deprecated {
            docs.push("@deprecated".to_owned());
        }
        if let Some(default) = &field.default {
            docs.push(format!("@default {default}"));
        }
        if !docs.is_empty() {
            out.push_str(&format!("  /**\n{}\n   */\n", comment_lines(&docs.join("\n"), "   * ")));
        }
        let key = if PLAIN_KEY.is_match(&field.wire_name) {
            field.wire_name.clone()
        } else {
            serde_json_string(&field.wire_name)
        };
        let optional = if field.required { "" } else { "?" };
        let mut ty = match &field.constant {
            Some(constant) => literal(constant),
            None => expr(ir, field.ty),
        };
        if field.nullable || (field.required && field.policy.representation == Representation::Nullable) {
            ty.push_str(" | null");
        }
        out.push_str(&format!("  {key}{optional}: {ty};\n"));
    }
    match object.openness {
        Openness::Typed(value) if object.fields.is_empty() => {
            out.push_str(&format!("  [key: string]: {};\n", expr(ir, value)));
        }
        Openness::Typed(_) => out.push_str("  [key: string]: unknown;\n"),
        Openness::Open | Openness::Closed => {}
    }
    out.push_str("}\n");
    out
}

fn union_expr(ir: &Ir, union: &UnionType) -> String {
    if union.variants.is_empty() {
        return "unknown".to_owned();
    }
    union
        .variants
        .iter()
        .map(|variant| expr(ir, *variant))
        .collect::<Vec<_>>()
        .join(" | ")
}

/// The type expression used where `id` is referenced.
fn expr(ir: &Ir, id: TypeId) -> String {
    if ir.is_declared(id) {
        return type_name(ir.name(id));
    }
    match ir.get(id) {
        TypeNode::Primitive(primitive) => match primitive.kind {
            PrimitiveKind::String => "string",
            PrimitiveKind::Integer | PrimitiveKind::Number => "number",
            PrimitiveKind::Boolean => "boolean",
        }
        .to_owned(),
        TypeNode::ArrayOf(element) => {
            let inner = expr(ir, *element);
            if inner.contains(' ') {
                format!("Array<{inner}>")
            } else {
                format!("{inner}[]")
            }
        }
        TypeNode::MapOf(value) => format!("Record<string, {}>", expr(ir, *value)),
        TypeNode::Union(union) => union_expr(ir, union),
        TypeNode::Object(_) | TypeNode::Enum(_) | TypeNode::Alias(_) => type_name(ir.name(id)),
    }
}

fn literal(value: &Literal) -> String {
    match value {
        Literal::String(text) => serde_json_string(text),
        other => other.to_string(),
    }
}

fn serde_json_string(text: &str) -> String {
    serde_json::Value::String(text.to_owned()).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompileOptions, OutputMode};
    use crate::resolve::SchemaDocument;
    use serde_json::json;

    fn render(schema: serde_json::Value, output_mode: OutputMode) -> Vec<GeneratedFile> {
        let ir = crate::compile(&[SchemaDocument::new("shop.json", &schema)], &CompileOptions::default()).unwrap();
        let options = RenderOptions {
            output_mode,
            ..Default::default()
        };
        TypeScript.render(&ir, &options).unwrap()
    }

    #[test]
    fn interfaces_use_wire_names_and_optionality() {
        let files = render(
            json!({
                "$defs": {
                    "Item": {
                        "type": "object",
                        "required": ["product-id"],
                        "properties": {
                            "product-id": { "type": "string" },
                            "tags": { "type": "array", "items": { "type": "string" } },
                            "note": { "type": ["string", "null"], "description": "free text" }
                        }
                    }
                }
            }),
            OutputMode::SingleFile,
        );
        let [file] = files.as_slice() else {
            panic!("expected one file");
        };
        assert_eq!(file.path.to_str(), Some("models.ts"));
        assert!(file.content.contains("export interface Item {"));
        assert!(file.content.contains("  \"product-id\": string;"));
        assert!(file.content.contains("  tags?: string[];"));
        assert!(file.content.contains("   * free text"));
        assert!(file.content.contains("  note?: string | null;"));
    }

    #[test]
    fn enums_become_literal_unions_with_constants() {
        let files = render(json!({ "$defs": { "Status": { "enum": ["in-progress", "done"] } } }), OutputMode::SingleFile);
        let content = &files[0].content;
        assert!(content.contains("export type Status = \"in-progress\" | \"done\";"));
        assert!(content.contains("  IN_PROGRESS: \"in-progress\","));
    }

    #[test]
    fn one_type_per_file_imports_dependencies() {
        let files = render(
            json!({
                "$defs": {
                    "Address": { "type": "object", "properties": { "city": { "type": "string" } } },
                    "Person": { "type": "object", "properties": { "home": { "$ref": "#/$defs/Address" } } }
                }
            }),
            OutputMode::OneTypePerFile,
        );
        let paths: Vec<_> = files.iter().map(|f| f.path.to_string_lossy().into_owned()).collect();
        assert_eq!(paths, ["Address.ts", "Person.ts"]);
        assert!(files[1].content.contains("import type { Address } from \"./Address\";"));
        assert!(files[1].content.contains("  home?: Address;"));
    }

    #[test]
    fn dynamic_values_are_unknown() {
        let files = render(
            json!({ "$defs": { "Blob": { "type": "object", "properties": { "data": {}, "either": { "anyOf": [{ "type": "string" }, { "type": "integer" }] } } } } }),
            OutputMode::SingleFile,
        );
        assert!(files[0].content.contains("  data?: unknown;"));
        assert!(files[0].content.contains("  either?: unknown;"));
    }
}
