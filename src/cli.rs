//! CLI: schemas → compile → (generate | ir)
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use schema_unify::config::{CompileOptions, ContainerInit, OutputMode, ProjectConfig, Target};
use schema_unify::render::{self, GeneratedFile, RenderOptions, Renderer};
use schema_unify::{loader, Ir, SchemaDocument};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// compile JSON Schema / OpenAPI component schemas into typed models
#[derive(Parser, Debug)]
#[command(name = "schema-unify", version)]
pub struct CommandLineInterface {
    /// more logging: -v for debug, -vv for trace (RUST_LOG takes precedence)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// compile and render source files for one or more targets
    Generate(GenerateOut),
    /// compile and print the resolved type graph as JSON
    Ir(IrOut),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more schema files. May be literal paths or quoted glob patterns.
    ///
    /// Documents they reference through relative `$ref`s are loaded too.
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,

    /// project file (defaults to ./schema-unify.yaml or .json when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// how absent list/map fields are materialized
    #[arg(long, value_enum)]
    container_init: Option<ContainerInit>,

    /// extra acronym kept upper-case in generated names (repeatable)
    #[arg(long = "acronym")]
    acronyms: Vec<String>,
}

#[derive(Args, Debug)]
struct GenerateOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// renderer to run (repeatable); defaults to the project file's targets, then typescript
    #[arg(long = "lang")]
    langs: Vec<String>,

    /// output directory (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,

    #[arg(long, value_enum)]
    output_mode: Option<OutputMode>,

    /// package name for targets that need one
    #[arg(long)]
    package: Option<String>,
}

#[derive(Args, Debug)]
struct IrOut {
    #[command(flatten)]
    input_settings: InputSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl InputSettings {
    fn project_config(&self) -> anyhow::Result<ProjectConfig> {
        let config = match &self.config {
            Some(path) => ProjectConfig::load(path)?,
            None => ProjectConfig::discover(Path::new("."))?,
        };
        Ok(config)
    }

    /// Command-line flags win over the project file.
    fn compile_options(&self, config: &ProjectConfig) -> CompileOptions {
        let mut options = config.compile_options();
        if let Some(mode) = self.container_init {
            options.container_init = mode;
        }
        for acronym in &self.acronyms {
            options.acronyms.insert(acronym);
        }
        options
    }

    fn load_documents(&self) -> anyhow::Result<Vec<SchemaDocument>> {
        let paths = resolve_file_path_patterns(&self.input).context("failed to resolve input file paths")?;
        let documents = loader::load_closure(&paths)?;
        info!(documents = documents.len(), "loaded schemas");
        Ok(documents)
    }

    fn compile(&self, config: &ProjectConfig) -> anyhow::Result<Ir> {
        let documents = self.load_documents()?;
        let options = self.compile_options(config);
        debug!(?options, "compiling");
        Ok(schema_unify::compile(&documents, &options)?)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> anyhow::Result<()> {
        match &self.cmd {
            Command::Generate(target) => target.run(),
            Command::Ir(target) => {
                let config = target.input_settings.project_config()?;
                let ir = target.input_settings.compile(&config)?;
                let source = serde_json::to_string_pretty(&ir)?;
                match &target.out {
                    Some(out) => write_file(out, &source),
                    None => {
                        println!("{source}");
                        Ok(())
                    }
                }
            }
        }
    }
}

impl GenerateOut {
    fn run(&self) -> anyhow::Result<()> {
        let config = self.input_settings.project_config()?;
        let targets = self.targets(&config);
        let mut renderers: Vec<&dyn Renderer> = Vec::with_capacity(targets.len());
        for target in &targets {
            match render::renderer(&target.renderer) {
                Some(renderer) => renderers.push(renderer),
                None => bail!(
                    "unknown renderer `{}` (available: {})",
                    target.renderer,
                    render::renderer_names().join(", ")
                ),
            }
        }

        let ir = self.input_settings.compile(&config)?;
        let options = self.render_options(&config);
        let rendered = render::render_all(&ir, &renderers, &options)?;
        for (target, (name, files)) in targets.iter().zip(rendered) {
            match &target.output {
                Some(dir) => {
                    for file in &files {
                        write_file(&dir.join(&file.path), &file.content)?;
                    }
                    info!(renderer = name, files = files.len(), dir = %dir.display(), "wrote");
                }
                None => print_files(&files),
            }
        }
        Ok(())
    }

    fn targets(&self, config: &ProjectConfig) -> Vec<Target> {
        if !self.langs.is_empty() {
            return self
                .langs
                .iter()
                .map(|renderer| Target {
                    renderer: renderer.clone(),
                    output: self.out.clone(),
                })
                .collect();
        }
        if !config.targets.is_empty() {
            return config
                .targets
                .iter()
                .map(|target| Target {
                    renderer: target.renderer.clone(),
                    output: self.out.clone().or_else(|| target.output.clone()),
                })
                .collect();
        }
        vec![Target {
            renderer: "typescript".to_owned(),
            output: self.out.clone(),
        }]
    }

    fn render_options(&self, config: &ProjectConfig) -> RenderOptions {
        let mut options = config.render_options();
        if let Some(mode) = self.output_mode {
            options.output_mode = mode;
        }
        if let Some(package) = &self.package {
            options.package = package.clone();
        }
        options
    }
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn write_file(path: &Path, content: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;
    debug!(path = %path.display(), "wrote file");
    Ok(())
}

fn print_files(files: &[GeneratedFile]) {
    for file in files {
        if files.len() > 1 {
            println!("// ---- {} ----", file.path.display());
        }
        println!("{}", file.content.trim_end());
    }
}

fn resolve_file_path_patterns<I>(patterns: I) -> anyhow::Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'['))
    }

    let mut out = Vec::<PathBuf>::new();
    for raw in patterns {
        let pattern = raw.as_ref();
        if !has_glob_chars(pattern) {
            out.push(PathBuf::from(pattern));
            continue;
        }
        let mut matched_any = false;
        for entry in glob::glob(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))? {
            out.push(entry?);
            matched_any = true;
        }
        if !matched_any {
            bail!("glob pattern matched no files: {pattern}");
        }
    }
    out.sort();
    out.dedup();
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn globs_expand_sorted_and_literals_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.json", "a.json", "c.yaml"] {
            std::fs::write(dir.path().join(name), "{}").unwrap();
        }
        let pattern = format!("{}/*.json", dir.path().display());
        let paths = resolve_file_path_patterns([pattern.as_str(), "literal.json"]).unwrap();
        let names: Vec<String> = paths
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.json", "b.json", "literal.json"]);
    }

    #[test]
    fn empty_globs_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = format!("{}/*.json", dir.path().display());
        assert!(resolve_file_path_patterns([pattern]).is_err());
    }

    #[test]
    fn flags_override_the_project_file() {
        let cli = CommandLineInterface::parse_from([
            "schema-unify",
            "generate",
            "-i",
            "a.json",
            "--lang",
            "go",
            "--container-init",
            "lazy",
            "--acronym",
            "SKU",
            "--package",
            "api",
        ]);
        let Command::Generate(generate) = &cli.cmd else {
            panic!("expected generate");
        };
        let config = ProjectConfig {
            container_init: Some(ContainerInit::Eager),
            package: Some("fromfile".into()),
            ..Default::default()
        };
        let options = generate.input_settings.compile_options(&config);
        assert_eq!(options.container_init, ContainerInit::Lazy);
        assert!(options.acronyms.contains("sku"));
        assert_eq!(generate.render_options(&config).package, "api");
        assert_eq!(generate.targets(&config)[0].renderer, "go");
    }
}
