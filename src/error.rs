//! Structured failures of a compilation run.
//!
//! Every error carries the schema [`Location`] it was detected at. A run never
//! stops at the first problem: errors are collected into [`Diagnostics`] and
//! returned together, and no IR is produced when any were collected.
use std::fmt;
use thiserror::Error;

use crate::schema::Location;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// A `$ref` whose document or pointer target does not exist.
    #[error("{location}: unresolved reference `{reference}`")]
    UnresolvedReference { location: Location, reference: String },

    /// Two documents claim the same canonical identity.
    #[error("{location}: document identity `{identity}` is already defined by `{first}`")]
    AmbiguousDocument {
        location: Location,
        identity: String,
        first: String,
    },

    /// `allOf` branches declare the same field (or the whole shape) with incompatible types.
    #[error("{location}: allOf branches disagree on `{subject}` ({left} vs {right})")]
    IncompatibleMerge {
        location: Location,
        subject: String,
        left: String,
        right: String,
    },

    /// Two distinct shapes forced onto one final name.
    #[error("{location}: name `{name}` is already taken by {owner}")]
    NamingCollision {
        location: Location,
        name: String,
        owner: String,
    },

    /// A combinator the classifier cannot place.
    #[error("{location}: unsupported combinator: {reason}")]
    UnsupportedCombinator { location: Location, reason: String },
}

impl CompileError {
    pub fn location(&self) -> &Location {
        match self {
            CompileError::UnresolvedReference { location, .. }
            | CompileError::AmbiguousDocument { location, .. }
            | CompileError::IncompatibleMerge { location, .. }
            | CompileError::NamingCollision { location, .. }
            | CompileError::UnsupportedCombinator { location, .. } => location,
        }
    }

    pub(crate) fn unsupported(location: &Location, reason: impl Into<String>) -> Self {
        CompileError::UnsupportedCombinator {
            location: location.clone(),
            reason: reason.into(),
        }
    }
}

/// Every error collected during one compilation run, in detection order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    errors: Vec<CompileError>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.errors.extend(other.errors);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<CompileError> {
        self.errors
    }

    /// `Ok(value)` when nothing was collected, otherwise every error.
    pub fn into_result<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.errors.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

impl From<CompileError> for Diagnostics {
    fn from(error: CompileError) -> Self {
        Self {
            errors: vec![error],
        }
    }
}

impl IntoIterator for Diagnostics {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.errors.len();
        write!(f, "{count} schema error{}", if count == 1 { "" } else { "s" })?;
        for error in &self.errors {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostics {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostics_display_lists_every_error() {
        let mut diagnostics = Diagnostics::new();
        diagnostics.push(CompileError::UnresolvedReference {
            location: Location::root("a.json").child("properties").child("x"),
            reference: "#/$defs/Missing".into(),
        });
        diagnostics.push(CompileError::unsupported(&Location::root("b.json"), "false schema"));

        let text = diagnostics.to_string();
        assert!(text.starts_with("2 schema errors"));
        assert!(text.contains("a.json#/properties/x: unresolved reference `#/$defs/Missing`"));
        assert!(text.contains("b.json#: unsupported combinator: false schema"));
    }

    #[test]
    fn empty_diagnostics_pass_the_value_through() {
        assert_eq!(Diagnostics::new().into_result(7), Ok(7));
        let err = Diagnostics::from(CompileError::unsupported(&Location::root("x"), "nope"));
        assert_eq!(err.clone().into_result(()).unwrap_err(), err);
    }
}
