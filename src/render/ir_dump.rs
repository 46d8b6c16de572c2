use std::path::PathBuf;

use crate::config::OutputMode;
use crate::ir::Ir;

use super::{GeneratedFile, RenderError, RenderOptions, Renderer};

/// Pretty JSON of the frozen IR, for debugging and determinism checks.
pub struct IrDump;

impl Renderer for IrDump {
    fn name(&self) -> &'static str {
        "ir"
    }

    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, ir: &Ir, options: &RenderOptions) -> Result<Vec<GeneratedFile>, RenderError> {
        match options.output_mode {
            OutputMode::SingleFile => Ok(vec![GeneratedFile {
                path: PathBuf::from("ir.json"),
                content: serde_json::to_string_pretty(ir)? + "\n",
            }]),
            OutputMode::OneTypePerFile => ir
                .declarations()
                .map(|(id, _)| {
                    Ok(GeneratedFile {
                        path: PathBuf::from(format!("{}.json", ir.name(id))),
                        content: serde_json::to_string_pretty(ir.entry(id))? + "\n",
                    })
                })
                .collect(),
        }
    }
}
