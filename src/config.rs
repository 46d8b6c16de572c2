//! Compile and render options, plus the optional project file that sets them.
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::naming::AcronymTable;
use crate::path_de::{self, PathError};
use crate::render::RenderOptions;

/// File names looked up in the working directory when no `--config` is given.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["schema-unify.yaml", "schema-unify.yml", "schema-unify.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContainerInit {
    /// absent list/map fields materialize as empty containers
    #[default]
    Eager,
    /// absent list/map fields stay absent
    Lazy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    #[default]
    SingleFile,
    OneTypePerFile,
}

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub container_init: ContainerInit,
    pub acronyms: AcronymTable,
}

// ————————————————————————————————————————————————————————————————————————————
// PROJECT FILE
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub container_init: Option<ContainerInit>,
    #[serde(default)]
    pub acronyms: AcronymOverrides,
    #[serde(default)]
    pub output_mode: Option<OutputMode>,
    /// Go package name.
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub targets: Vec<Target>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcronymOverrides {
    #[serde(default)]
    pub add: Vec<String>,
    #[serde(default)]
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Target {
    pub renderer: String,
    /// Output directory; stdout when omitted.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: PathError,
    },
}

impl ProjectConfig {
    /// Reads a YAML or JSON project file, chosen by extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => path_de::from_json_str(&source),
            _ => path_de::from_yaml_str(&source),
        };
        parsed.map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The first default project file found in `dir`, or defaults when there is none.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        for name in DEFAULT_CONFIG_FILES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                debug!(path = %candidate.display(), "using project config");
                return Self::load(&candidate);
            }
        }
        Ok(Self::default())
    }

    pub fn compile_options(&self) -> CompileOptions {
        let mut acronyms = AcronymTable::default();
        for entry in &self.acronyms.add {
            acronyms.insert(entry);
        }
        for entry in &self.acronyms.remove {
            acronyms.remove(entry);
        }
        CompileOptions {
            container_init: self.container_init.unwrap_or_default(),
            acronyms,
        }
    }

    pub fn render_options(&self) -> RenderOptions {
        let mut options = RenderOptions::default();
        if let Some(mode) = self.output_mode {
            options.output_mode = mode;
        }
        if let Some(package) = &self.package {
            options.package = package.clone();
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn yaml_project_file_sets_every_option() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema-unify.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(
            file,
            "container_init: lazy\nacronyms:\n  add: [OAUTH]\n  remove: [ID]\noutput_mode: one-type-per-file\npackage: models\ntargets:\n  - renderer: typescript\n    output: gen/ts\n"
        )
        .unwrap();

        let config = ProjectConfig::discover(dir.path()).unwrap();
        let compile = config.compile_options();
        assert_eq!(compile.container_init, ContainerInit::Lazy);
        assert!(compile.acronyms.contains("oauth"));
        assert!(!compile.acronyms.contains("id"));

        let render = config.render_options();
        assert_eq!(render.output_mode, OutputMode::OneTypePerFile);
        assert_eq!(render.package, "models");
        assert_eq!(
            config.targets,
            vec![Target {
                renderer: "typescript".into(),
                output: Some(PathBuf::from("gen/ts")),
            }]
        );
    }

    #[test]
    fn missing_project_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ProjectConfig::discover(dir.path()).unwrap();
        assert_eq!(config.compile_options().container_init, ContainerInit::Eager);
        assert!(config.targets.is_empty());
    }

    #[test]
    fn parse_errors_carry_the_key_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema-unify.json");
        std::fs::write(&path, r#"{"container_init": "sometimes"}"#).unwrap();

        let err = ProjectConfig::load(&path).unwrap_err();
        match err {
            ConfigError::Parse { source, .. } => assert_eq!(source.path, "container_init"),
            other => panic!("unexpected error: {other}"),
        }
    }
}
