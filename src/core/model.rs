//! The deduplicated set of signatures for one library target.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::declaration::Location;
use super::signature::FunctionSignature;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Two declarations of one function that would bind differently.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("conflicting declarations of `{name}` at {first} and {second}")]
pub struct ConflictError {
    pub name: String,
    pub first: Location,
    pub second: Location,
    pub first_signature: String,
    pub second_signature: String,
}

impl ConflictError {
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(format!("conflicting declarations of `{}`", self.name))
            .at(&self.second.file, self.second.line)
            .with_context(format!("first declared at {}: {}", self.first, self.first_signature))
            .with_context(format!("redeclared at {}: {}", self.second, self.second_signature))
            .with_suggestion(suggestions::SIGNATURE_CONFLICT)
    }
}

/// Result of adding a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Insertion {
    /// First time this name was seen
    Added,
    /// Same name and same binding as an existing entry; ignored
    Duplicate,
}

/// Insertion-ordered map from function name to signature.
#[derive(Debug, Clone, Default)]
pub struct DeclarationModel {
    entries: Vec<FunctionSignature>,
    index: HashMap<String, usize>,
    /// Originating files in the order their first entry arrived
    files: Vec<PathBuf>,
}

impl DeclarationModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert by function name.
    ///
    /// An identical redeclaration is ignored; a differing one is a conflict
    /// and leaves the model unchanged.
    pub fn add(&mut self, signature: FunctionSignature) -> Result<Insertion, ConflictError> {
        if let Some(&existing) = self.index.get(&signature.name) {
            let first = &self.entries[existing];
            if first.same_binding(&signature) {
                tracing::debug!(
                    "ignoring identical redeclaration of {} at {}",
                    signature.name,
                    signature.origin
                );
                return Ok(Insertion::Duplicate);
            }
            return Err(ConflictError {
                name: signature.name.clone(),
                first: first.origin.clone(),
                second: signature.origin.clone(),
                first_signature: first.describe(),
                second_signature: signature.describe(),
            });
        }

        if !self.files.iter().any(|f| f == &signature.origin.file) {
            self.files.push(signature.origin.file.clone());
        }
        self.index.insert(signature.name.clone(), self.entries.len());
        self.entries.push(signature);
        Ok(Insertion::Added)
    }

    pub fn get(&self, name: &str) -> Option<&FunctionSignature> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signatures in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionSignature> {
        self.entries.iter()
    }

    /// Signatures grouped by originating file, files in scan order.
    pub fn groups(&self) -> Vec<(&Path, Vec<&FunctionSignature>)> {
        self.files
            .iter()
            .map(|file| {
                let members = self
                    .entries
                    .iter()
                    .filter(|sig| &sig.origin.file == file)
                    .collect();
                (file.as_path(), members)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::signature::{CallingConvention, MappedParameter, MappedType, MarshalDirective};

    fn sig(name: &str, file: &str, line: usize, param: &str) -> FunctionSignature {
        FunctionSignature {
            name: name.to_string(),
            return_type: MappedType::void(),
            params: vec![MappedParameter::new(
                "x",
                MappedType::new(param, MarshalDirective::ByValueScalar, param),
            )],
            origin: Location::new(file, line),
            convention: CallingConvention::Cdecl,
            doc: None,
        }
    }

    #[test]
    fn test_identical_redeclaration_collapses() {
        let mut model = DeclarationModel::new();
        assert_eq!(model.add(sig("F", "a.cpp", 3, "int")), Ok(Insertion::Added));
        assert_eq!(model.add(sig("F", "a.h", 9, "int")), Ok(Insertion::Duplicate));
        assert_eq!(model.len(), 1);
        assert_eq!(model.get("F").unwrap().origin, Location::new("a.cpp", 3));
    }

    #[test]
    fn test_differing_redeclaration_conflicts() {
        let mut model = DeclarationModel::new();
        model.add(sig("F", "a.cpp", 3, "int")).unwrap();
        let err = model.add(sig("F", "a.h", 9, "double")).unwrap_err();

        assert_eq!(err.first, Location::new("a.cpp", 3));
        assert_eq!(err.second, Location::new("a.h", 9));
        assert_eq!(model.len(), 1);

        let diag = err.to_diagnostic();
        assert!(diag.is_error());
        assert!(diag.context.iter().any(|c| c.contains("a.cpp:3")));
    }

    #[test]
    fn test_groups_follow_first_appearance() {
        let mut model = DeclarationModel::new();
        model.add(sig("B1", "b.cpp", 1, "int")).unwrap();
        model.add(sig("A1", "a.cpp", 1, "int")).unwrap();
        model.add(sig("B2", "b.cpp", 5, "int")).unwrap();

        let groups = model.groups();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, Path::new("b.cpp"));
        let names: Vec<_> = groups[0].1.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["B1", "B2"]);
        assert_eq!(groups[1].1[0].name, "A1");
    }
}
