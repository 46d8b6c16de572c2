//! Backends that turn the frozen [`Ir`] into source files.
//!
//! Renderers only read the IR: every casing, dedup and policy decision has
//! already been made. What stays renderer-local is syntax, file layout and
//! reserved-word escaping.
pub mod golang;
pub mod ir_dump;
pub mod typescript;

use std::collections::BTreeSet;
use std::path::PathBuf;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info_span};

use crate::config::OutputMode;
use crate::ir::Ir;

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedFile {
    /// Relative to the output directory.
    pub path: PathBuf,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub output_mode: OutputMode,
    /// Package / module name for targets that need one.
    pub package: String,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::default(),
            package: "models".to_owned(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{renderer}: cannot express `{type_name}`: {reason}")]
    Unsupported {
        renderer: &'static str,
        type_name: String,
        reason: String,
    },
    #[error("failed to serialize the IR")]
    Serialize(#[from] serde_json::Error),
}

pub trait Renderer: Send + Sync {
    /// Identifier used on the command line and in project files.
    fn name(&self) -> &'static str;

    fn extension(&self) -> &'static str;

    fn render(&self, ir: &Ir, options: &RenderOptions) -> Result<Vec<GeneratedFile>, RenderError>;
}

static BUILTIN: &[&dyn Renderer] = &[&typescript::TypeScript, &golang::Go, &ir_dump::IrDump];

/// Looks up a built-in renderer by name.
pub fn renderer(name: &str) -> Option<&'static dyn Renderer> {
    BUILTIN.iter().find(|r| r.name() == name).copied()
}

pub fn renderer_names() -> Vec<&'static str> {
    BUILTIN.iter().map(|r| r.name()).collect()
}

/// Runs every renderer over the same IR in parallel. Results keep the input order.
pub fn render_all(
    ir: &Ir,
    renderers: &[&dyn Renderer],
    options: &RenderOptions,
) -> Result<Vec<(&'static str, Vec<GeneratedFile>)>, RenderError> {
    renderers
        .par_iter()
        .map(|renderer| {
            let _span = info_span!("render", renderer = renderer.name()).entered();
            let files = renderer.render(ir, options)?;
            debug!(files = files.len(), "rendered");
            Ok((renderer.name(), files))
        })
        .collect()
}

// ————————————————————————————————————————————————————————————————————————————
// LAYOUT
// ————————————————————————————————————————————————————————————————————————————

/// The rendered text of one declared type.
#[derive(Debug, Clone, Default)]
pub(crate) struct Chunk {
    pub name: String,
    /// External imports the body needs.
    pub imports: BTreeSet<String>,
    /// Other declared types the body names.
    pub dependencies: Vec<String>,
    pub body: String,
}

/// How a renderer frames chunks into files.
pub(crate) trait Framing {
    fn extension(&self) -> &'static str;

    /// File stem used in single-file mode.
    fn bundle_stem(&self, options: &RenderOptions) -> String;

    /// File stem of a single type in one-type-per-file mode.
    fn type_stem(&self, name: &str) -> String;

    /// Everything above the bodies. `dependencies` is empty in single-file mode.
    fn header(&self, options: &RenderOptions, imports: &BTreeSet<String>, dependencies: &[String]) -> String;
}

pub(crate) fn layout(framing: &impl Framing, chunks: Vec<Chunk>, options: &RenderOptions) -> Vec<GeneratedFile> {
    let file = |stem: String, header: String, bodies: &[&str]| {
        let mut content = header;
        for body in bodies {
            if !content.is_empty() && !content.ends_with("\n\n") {
                content.push('\n');
            }
            content.push_str(body);
        }
        GeneratedFile {
            path: PathBuf::from(format!("{stem}.{}", framing.extension())),
            content,
        }
    };
    match options.output_mode {
        OutputMode::SingleFile => {
            let imports: BTreeSet<String> = chunks.iter().flat_map(|c| c.imports.iter().cloned()).collect();
            let bodies: Vec<&str> = chunks.iter().map(|c| c.body.as_str()).collect();
            vec![file(
                framing.bundle_stem(options),
                framing.header(options, &imports, &[]),
                &bodies,
            )]
        }
        OutputMode::OneTypePerFile => chunks
            .iter()
            .map(|chunk| {
                file(
                    framing.type_stem(&chunk.name),
                    framing.header(options, &chunk.imports, &chunk.dependencies),
                    &[chunk.body.as_str()],
                )
            })
            .collect(),
    }
}

/// Prefixes each line of `text` with `prefix`, for doc comments.
pub(crate) fn comment_lines(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                prefix.trim_end().to_owned()
            } else {
                format!("{prefix}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompileOptions;
    use crate::resolve::SchemaDocument;
    use serde_json::json;

    #[test]
    fn builtin_renderers_are_found_by_name() {
        assert_eq!(renderer_names(), ["typescript", "go", "ir"]);
        assert_eq!(renderer("go").map(|r| r.extension()), Some("go"));
        assert!(renderer("cobol").is_none());
    }

    #[test]
    fn renderers_run_side_by_side_over_one_ir() {
        let schema = json!({ "$defs": { "Point": { "type": "object", "properties": { "x": { "type": "number" } } } } });
        let ir = crate::compile(&[SchemaDocument::new("geo.json", &schema)], &CompileOptions::default()).unwrap();
        let all: Vec<&dyn Renderer> = BUILTIN.to_vec();
        let rendered = render_all(&ir, &all, &RenderOptions::default()).unwrap();
        let names: Vec<&str> = rendered.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ["typescript", "go", "ir"]);
        assert!(rendered.iter().all(|(_, files)| files.len() == 1));
    }

    #[test]
    fn doc_comments_keep_blank_lines_bare() {
        assert_eq!(comment_lines("one\n\ntwo", "// "), "// one\n//\n// two");
    }
}
