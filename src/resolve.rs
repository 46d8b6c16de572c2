//! Document identity, definition sites and `$ref` resolution.
//!
//! A reference resolves either to a *definition* (which becomes a named node in
//! the registry) or to an *inline* node that the builder expands in place.
//! Inline targets that can reach themselves through other inline references
//! are promoted to definitions up front, so expansion always terminates.
use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use crate::error::{CompileError, Diagnostics};
use crate::naming::document_stem;
use crate::schema::{Location, SchemaNode};

/// One loaded schema document.
#[derive(Debug, Clone)]
pub struct SchemaDocument {
    path: String,
    root: SchemaNode,
}

impl SchemaDocument {
    pub fn new(path: impl AsRef<str>, value: &Value) -> Self {
        let path = normalize_path(path.as_ref());
        let root = SchemaNode::parse(value, Location::root(path.clone()));
        Self { path, root }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn root(&self) -> &SchemaNode {
        &self.root
    }

    /// `$id` when present, otherwise the normalized path.
    pub fn identity(&self) -> &str {
        self.root.id.as_deref().unwrap_or(&self.path)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionKind {
    /// A document root that declares a shape.
    Root,
    /// A `$defs` / `definitions` member, at any depth.
    Member,
    /// An inline reference target on a reference cycle.
    Promoted,
}

#[derive(Debug, Clone)]
pub struct Definition<'a> {
    pub location: Location,
    pub node: &'a SchemaNode,
    pub kind: DefinitionKind,
    /// Raw name: the member key, or the root's title / document stem.
    pub hint: String,
}

#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// Index into [`Resolver::definitions`].
    Definition(usize),
    Inline(&'a SchemaNode),
}

pub struct Resolver<'a> {
    documents: &'a [SchemaDocument],
    by_path: HashMap<&'a str, usize>,
    by_id: HashMap<&'a str, usize>,
    definitions: Vec<Definition<'a>>,
    definition_index: HashMap<Location, usize>,
}

impl<'a> Resolver<'a> {
    pub fn new(documents: &'a [SchemaDocument]) -> Result<Self, Diagnostics> {
        let mut diagnostics = Diagnostics::new();
        let mut by_path = HashMap::new();
        let mut by_id: HashMap<&'a str, usize> = HashMap::new();
        let mut first_by_identity: HashMap<&'a str, usize> = HashMap::new();

        for (index, document) in documents.iter().enumerate() {
            by_path.entry(document.path()).or_insert(index);
            if let Some(id) = document.root.id.as_deref() {
                by_id.entry(id).or_insert(index);
            }
            match first_by_identity.get(document.identity()) {
                Some(first) => diagnostics.push(CompileError::AmbiguousDocument {
                    location: document.root.location.clone(),
                    identity: document.identity().to_owned(),
                    first: documents[*first].path().to_owned(),
                }),
                None => {
                    first_by_identity.insert(document.identity(), index);
                }
            }
        }
        if !diagnostics.is_empty() {
            return Err(diagnostics);
        }

        let mut resolver = Self {
            documents,
            by_path,
            by_id,
            definitions: Vec::new(),
            definition_index: HashMap::new(),
        };
        for document in documents {
            let root = &document.root;
            if root.declares_shape() {
                let hint = root.title.clone().unwrap_or_else(|| document_stem(document.path()));
                resolver.add_definition(root, DefinitionKind::Root, hint);
            }
            resolver.hoist_members(root);
        }
        resolver.promote_cycles();
        Ok(resolver)
    }

    fn add_definition(&mut self, node: &'a SchemaNode, kind: DefinitionKind, hint: String) {
        self.definition_index.insert(node.location.clone(), self.definitions.len());
        self.definitions.push(Definition {
            location: node.location.clone(),
            node,
            kind,
            hint,
        });
    }

    fn hoist_members(&mut self, node: &'a SchemaNode) {
        for (name, member) in node.declared_definitions() {
            self.add_definition(member, DefinitionKind::Member, name.clone());
            self.hoist_members(member);
        }
        for child in node.children() {
            self.hoist_members(child);
        }
    }

    fn promote_cycles(&mut self) {
        let mut targets: Vec<Location> = Vec::new();
        for document in self.documents {
            let mut stack = vec![&document.root];
            while let Some(node) = stack.pop() {
                if let Some(reference) = &node.reference {
                    if let Ok(location) = self.locate(&node.location, reference) {
                        if !self.definition_index.contains_key(&location) && !targets.contains(&location) {
                            targets.push(location);
                        }
                    }
                }
                stack.extend(node.children());
                stack.extend(node.declared_definitions().map(|(_, member)| member));
            }
        }

        loop {
            let mut promoted = false;
            for target in &targets {
                if self.definition_index.contains_key(target) {
                    continue;
                }
                let Some(node) = self.node_at(target) else {
                    continue;
                };
                if self.cycles_back(node, target) {
                    debug!(location = %target, "promoting recursive inline target to a definition");
                    self.add_definition(node, DefinitionKind::Promoted, String::new());
                    promoted = true;
                }
            }
            if !promoted {
                break;
            }
        }
    }

    /// Whether expanding `start` inline can reach `target` again.
    fn cycles_back(&self, start: &'a SchemaNode, target: &Location) -> bool {
        let mut stack = vec![start];
        let mut seen = HashSet::new();
        while let Some(node) = stack.pop() {
            if let Some(reference) = &node.reference {
                if let Ok(location) = self.locate(&node.location, reference) {
                    if &location == target {
                        return true;
                    }
                    if !self.definition_index.contains_key(&location) && seen.insert(location.clone()) {
                        stack.extend(self.node_at(&location));
                    }
                }
            }
            stack.extend(node.children());
        }
        false
    }

    pub fn documents(&self) -> &'a [SchemaDocument] {
        self.documents
    }

    /// Every definition site: roots and hoisted members in document order, then promoted targets.
    pub fn definitions(&self) -> &[Definition<'a>] {
        &self.definitions
    }

    pub fn definition(&self, index: usize) -> &Definition<'a> {
        &self.definitions[index]
    }

    pub fn definition_at(&self, location: &Location) -> Option<usize> {
        self.definition_index.get(location).copied()
    }

    pub fn node_at(&self, location: &Location) -> Option<&'a SchemaNode> {
        let index = *self.by_path.get(location.document.as_str())?;
        self.documents[index].root.walk(&location.pointer)
    }

    /// The location `reference` points at, as seen from `from`.
    pub fn locate(&self, from: &Location, reference: &str) -> Result<Location, CompileError> {
        let unresolved = || CompileError::UnresolvedReference {
            location: from.clone(),
            reference: reference.to_owned(),
        };
        let (document_part, fragment) = reference.split_once('#').unwrap_or((reference, ""));
        let index = if document_part.is_empty() {
            self.by_path.get(from.document.as_str()).copied()
        } else {
            self.find_document(&from.document, document_part)
        }
        .ok_or_else(unresolved)?;

        let pointer = parse_fragment(fragment).ok_or_else(unresolved)?;
        let document = &self.documents[index];
        document.root.walk(&pointer).ok_or_else(unresolved)?;
        Ok(Location {
            document: document.path().to_owned(),
            pointer,
        })
    }

    fn find_document(&self, from_document: &str, target: &str) -> Option<usize> {
        if let Some(index) = self.by_id.get(target) {
            return Some(*index);
        }
        if let Some(index) = self.by_path.get(join(from_document, target).as_str()) {
            return Some(*index);
        }
        // Relative to the referring document's `$id`.
        let from_index = *self.by_path.get(from_document)?;
        let base = self.documents[from_index].root.id.as_deref()?;
        self.by_id.get(join(base, target).as_str()).copied()
    }

    pub fn follow(&self, from: &Location, reference: &str) -> Result<Target<'a>, CompileError> {
        let location = self.locate(from, reference)?;
        if let Some(index) = self.definition_at(&location) {
            return Ok(Target::Definition(index));
        }
        self.node_at(&location)
            .map(Target::Inline)
            .ok_or_else(|| CompileError::UnresolvedReference {
                location: from.clone(),
                reference: reference.to_owned(),
            })
    }
}

// ---- paths and pointers ----

/// Forward slashes, no `.` segments, `..` folded where possible.
pub fn normalize_path(raw: &str) -> String {
    let unified = raw.replace('\\', "/");
    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "." => {}
            ".." if segments.last().is_some_and(|last| *last != ".." && !last.is_empty()) => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

pub(crate) fn join(base: &str, relative: &str) -> String {
    if relative.starts_with('/') || relative.contains("://") {
        return normalize_path(relative);
    }
    match base.rfind('/') {
        Some(cut) => normalize_path(&format!("{}/{}", &base[..cut], relative)),
        None => normalize_path(relative),
    }
}

fn parse_fragment(fragment: &str) -> Option<Vec<String>> {
    if fragment.is_empty() || fragment == "/" {
        return Some(Vec::new());
    }
    let rest = fragment.strip_prefix('/')?;
    Some(
        rest.split('/')
            .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
            .collect(),
    )
}
