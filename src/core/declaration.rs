//! Raw export candidates as recognized by the scanner.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A source location: file plus 1-based line.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, line: usize) -> Self {
        Location {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file.display(), self.line)
    }
}

/// One parameter exactly as written, split into type and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawParam {
    /// Type text, whitespace-normalized, array suffix included (`double[3]`)
    pub type_text: String,

    /// Parameter name
    pub name: String,
}

impl RawParam {
    pub fn new(type_text: impl Into<String>, name: impl Into<String>) -> Self {
        RawParam {
            type_text: type_text.into(),
            name: name.into(),
        }
    }
}

/// An exported function declaration before type mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDeclaration {
    /// Where the declaration starts (the export marker line)
    pub location: Location,

    /// Return type text
    pub return_type: String,

    /// Function name
    pub name: String,

    /// Parameters in declaration order
    pub params: Vec<RawParam>,

    /// Explicit calling-convention token, if one was written
    pub convention: Option<String>,

    /// Trailing `//` comment on the declaration's last line
    pub doc: Option<String>,
}

impl RawDeclaration {
    pub fn file(&self) -> &Path {
        &self.location.file
    }

    pub fn line(&self) -> usize {
        self.location.line
    }
}
