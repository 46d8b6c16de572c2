//! Identifier tokenization, per-context casing, and run-scoped name assignment.
pub mod acronym;

pub use acronym::AcronymTable;

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::error::CompileError;
use crate::schema::Location;

// ————————————————————————————————————————————————————————————————————————————
// TOKENIZATION
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Casing {
    /// `PascalCase`
    Type,
    /// `camelCase`
    Field,
    /// `SCREAMING_SNAKE`
    EnumConstant,
}

/// Splits a raw name into words.
///
/// Delimiters are any non-alphanumeric characters. Inside a delimited chunk,
/// boundaries fall at lower→upper, letter→digit and digit→upper transitions, and before the
/// last capital of an upper-case run that is followed by a lower-case letter.
/// Upper-case runs made only of known acronyms are split into those acronyms.
pub fn tokenize(raw: &str, acronyms: &AcronymTable) -> Vec<String> {
    let mut words = Vec::new();
    for chunk in raw.split(|c: char| !c.is_alphanumeric()).filter(|c| !c.is_empty()) {
        for word in split_case(chunk) {
            let is_upper_run = word.chars().count() > 1 && word.chars().all(|c| c.is_uppercase());
            match is_upper_run.then(|| acronyms.segment(&word)).flatten() {
                Some(parts) if parts.len() > 1 => words.extend(parts),
                _ => words.push(word),
            }
        }
    }
    words
}

fn split_case(chunk: &str) -> Vec<String> {
    let chars: Vec<char> = chunk.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if let Some(&prev) = i.checked_sub(1).and_then(|p| chars.get(p)) {
            let next = chars.get(i + 1).copied();
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_alphabetic() && c.is_numeric())
                || (prev.is_numeric() && c.is_uppercase())
                || (prev.is_uppercase() && c.is_uppercase() && next.is_some_and(char::is_lowercase));
            if boundary && !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str, acronyms: &AcronymTable) -> String {
    if acronyms.contains(word) {
        return word.to_uppercase();
    }
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn starts_with_digit(words: &[String]) -> bool {
    words
        .first()
        .and_then(|w| w.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// Re-assembles `raw` under the casing of `context`.
pub fn apply(context: Casing, raw: &str, acronyms: &AcronymTable) -> String {
    let mut words = tokenize(raw, acronyms);
    if words.is_empty() {
        words.push("Empty".to_owned());
    } else if starts_with_digit(&words) {
        words.insert(0, "N".to_owned());
    }
    match context {
        Casing::Type => words.iter().map(|w| capitalize(w, acronyms)).collect(),
        Casing::Field => {
            let mut out = words[0].to_lowercase();
            for word in &words[1..] {
                out.push_str(&capitalize(word, acronyms));
            }
            out
        }
        Casing::EnumConstant => words.iter().map(|w| w.to_uppercase()).collect::<Vec<_>>().join("_"),
    }
}

pub fn type_name(raw: &str, acronyms: &AcronymTable) -> String {
    apply(Casing::Type, raw, acronyms)
}

pub fn field_name(raw: &str, acronyms: &AcronymTable) -> String {
    apply(Casing::Field, raw, acronyms)
}

pub fn enum_constant(raw: &str, acronyms: &AcronymTable) -> String {
    apply(Casing::EnumConstant, raw, acronyms)
}

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern compiles"));

/// An `x-name` override, used verbatim. Overrides that are not plain identifiers
/// are kept but flagged, since renderers will have to escape them.
pub fn override_name(raw: &str, location: &Location) -> String {
    if !IDENTIFIER.is_match(raw) {
        warn!(%location, name = raw, "rename override is not a plain identifier");
    }
    raw.to_owned()
}

// ————————————————————————————————————————————————————————————————————————————
// NAME PATHS
// ————————————————————————————————————————————————————————————————————————————

/// The words leading from the nearest named ancestor to an anonymous shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamePath {
    anchor: String,
    words: Vec<String>,
}

impl NamePath {
    pub fn new(anchor: impl Into<String>) -> Self {
        Self {
            anchor: anchor.into(),
            words: Vec::new(),
        }
    }

    pub fn push(&self, word: impl Into<String>) -> Self {
        let mut words = self.words.clone();
        words.push(word.into());
        Self {
            anchor: self.anchor.clone(),
            words,
        }
    }

    /// Number of words below the anchor.
    pub fn depth(&self) -> usize {
        self.words.len()
    }

    /// The anchor followed by every word, Pascal-cased.
    pub fn candidate(&self, acronyms: &AcronymTable) -> String {
        let mut out = self.anchor.clone();
        for word in &self.words {
            out.push_str(&type_name(word, acronyms));
        }
        out
    }
}

/// Naming words for pointer segments: property and definition keys, `Item` for
/// array items, `Value` for map values. Combinator keywords and branch indices
/// contribute nothing.
pub fn path_words(segments: &[String]) -> Vec<String> {
    let mut words = Vec::new();
    let mut index = 0;
    while index < segments.len() {
        match segments[index].as_str() {
            "properties" | "$defs" | "definitions" => {
                words.extend(segments.get(index + 1).cloned());
                index += 2;
            }
            "items" => {
                words.push("Item".to_owned());
                index += 1;
            }
            "additionalProperties" => {
                words.push("Value".to_owned());
                index += 1;
            }
            "allOf" | "oneOf" | "anyOf" => index += 2,
            other => {
                words.push(other.to_owned());
                index += 1;
            }
        }
    }
    words
}

/// Disambiguating qualifiers for a shape at `location`, nearest ancestor first.
///
/// These are the naming words of its pointer, minus the `spelled` trailing words
/// that its base name already carries.
pub fn qualifiers(location: &Location, spelled: usize, acronyms: &AcronymTable) -> Vec<String> {
    let words = path_words(&location.pointer);
    let keep = words.len().saturating_sub(spelled);
    let mut out: Vec<String> = words[..keep].iter().rev().map(|word| type_name(word, acronyms)).collect();
    out.dedup();
    out
}

/// `schemas/person.schema.json` -> `person`
pub fn document_stem(document: &str) -> String {
    let file = document.rsplit(['/', '\\']).next().unwrap_or(document);
    file.split('.').next().unwrap_or(file).to_owned()
}

// ————————————————————————————————————————————————————————————————————————————
// NAME TABLE
// ————————————————————————————————————————————————————————————————————————————

/// Names assigned so far in one compilation run.
#[derive(Debug, Default)]
pub struct NameTable {
    assigned: IndexMap<String, Location>,
}

impl NameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn owner(&self, name: &str) -> Option<&Location> {
        self.assigned.get(name)
    }

    /// Assigns `base`, or `base` prefixed by the shortest run of qualifiers that is free.
    ///
    /// Qualifiers are listed nearest-first and prefixed in path order, so the
    /// second attempt is `q0 + base`, the third `q1 + q0 + base`.
    pub fn reserve(&mut self, base: &str, qualifiers: &[String], location: &Location) -> Result<String, CompileError> {
        let mut candidate = base.to_owned();
        let mut taken = 0;
        loop {
            if !self.assigned.contains_key(&candidate) {
                self.assigned.insert(candidate.clone(), location.clone());
                return Ok(candidate);
            }
            if taken == qualifiers.len() {
                let owner = self
                    .assigned
                    .get(base)
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "another shape".to_owned());
                return Err(CompileError::NamingCollision {
                    location: location.clone(),
                    name: base.to_owned(),
                    owner,
                });
            }
            taken += 1;
            let prefix: String = qualifiers[..taken].iter().rev().map(String::as_str).collect();
            candidate = format!("{prefix}{base}");
        }
    }
}
