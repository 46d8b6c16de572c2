//! Reading schema documents from disk.
use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;
use tracing::{debug, trace};

use crate::resolve::{self, SchemaDocument};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read schema {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Parses one document, as YAML for `.yaml`/`.yml` and JSON otherwise.
pub fn load_value(path: &Path) -> Result<Value, LoadError> {
    let source = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => serde_yaml::from_str(&source).map_err(|source| LoadError::Yaml {
            path: path.to_path_buf(),
            source,
        }),
        _ => serde_json::from_str(&source).map_err(|source| LoadError::Json {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub fn load_document(path: &Path) -> Result<SchemaDocument, LoadError> {
    let value = load_value(path)?;
    Ok(SchemaDocument::new(path.to_string_lossy(), &value))
}

/// Loads `paths` plus every document they reach through relative `$ref`s.
///
/// Documents come back in discovery order: the given paths first, then
/// referenced files breadth-first. References with a scheme (`https://...`)
/// are left for `$id` matching.
pub fn load_closure(paths: &[PathBuf]) -> Result<Vec<SchemaDocument>, LoadError> {
    let mut queue: VecDeque<String> = paths
        .iter()
        .map(|p| resolve::normalize_path(&p.to_string_lossy()))
        .collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut documents = Vec::new();
    while let Some(path) = queue.pop_front() {
        if !seen.insert(path.clone()) {
            continue;
        }
        let value = load_value(Path::new(&path))?;
        let mut references = Vec::new();
        external_references(&value, &mut references);
        for reference in references {
            let target = resolve::join(&path, &reference);
            if !seen.contains(&target) {
                trace!(from = %path, %target, "following external reference");
                queue.push_back(target);
            }
        }
        documents.push(SchemaDocument::new(&path, &value));
    }
    debug!(documents = documents.len(), "schema documents loaded");
    Ok(documents)
}

/// Document parts of every `$ref` that points outside its own document.
fn external_references(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(reference)) = map.get("$ref") {
                let document = reference.split('#').next().unwrap_or_default();
                if !document.is_empty() && !document.contains("://") && !out.iter().any(|r| r == document) {
                    out.push(document.to_owned());
                }
            }
            for child in map.values() {
                external_references(child, out);
            }
        }
        Value::Array(items) => items.iter().for_each(|item| external_references(item, out)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closure_follows_relative_references_across_formats() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("shared")).unwrap();
        std::fs::write(
            dir.path().join("order.json"),
            r##"{ "type": "object", "properties": { "buyer": { "$ref": "shared/person.yaml#/$defs/Person" } } }"##,
        )
        .unwrap();
        std::fs::write(
            dir.path().join("shared/person.yaml"),
            "$defs:\n  Person:\n    type: object\n    properties:\n      home:\n        $ref: ./address.json\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("shared/address.json"), r#"{ "type": "object" }"#).unwrap();

        let documents = load_closure(&[dir.path().join("order.json")]).unwrap();
        let names: Vec<&str> = documents
            .iter()
            .map(|d| d.path().rsplit('/').next().unwrap_or_default())
            .collect();
        assert_eq!(names, ["order.json", "person.yaml", "address.json"]);
    }

    #[test]
    fn broken_json_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ nope").unwrap();
        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, LoadError::Json { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(load_document(&dir.path().join("absent.json")), Err(LoadError::Io { .. })));
    }
}
