//! Structured diagnostic records.
//!
//! Every warning and error produced by a generation run is recorded as a
//! [`Diagnostic`] carrying the originating file and line, so the caller can
//! decide how to present it (terminal text, JSON, IDE problem list).

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Common suggestion messages for consistent reporting.
pub mod suggestions {
    /// Suggestion when a preprocessor expression could not be evaluated.
    pub const UNSUPPORTED_CONDITION: &str =
        "help: Rewrite the condition using only defined(SYM) joined by && or ||";

    /// Suggestion when a native type fell back to IntPtr.
    pub const UNRESOLVED_TYPE: &str =
        "help: Add the type to [mapping.typedefs], [mapping.value_structs] or [mapping.handles]";

    /// Suggestion when a parameter has no name.
    pub const MISSING_PARAM_NAME: &str = "help: Name every parameter of an exported function";

    /// Suggestion when two bindings disagree.
    pub const SIGNATURE_CONFLICT: &str =
        "help: Make the header declaration and the definition agree";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Note,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
            Severity::Note => write!(f, "note"),
        }
    }
}

/// A diagnostic message tied to a source location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Originating file
    pub file: Option<PathBuf>,
    /// 1-based line in `file`
    pub line: Option<usize>,
    /// Additional context lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
    /// Suggested fixes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl Diagnostic {
    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity,
            file: None,
            line: None,
            context: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Severity::Error, message)
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    /// Create a new note.
    pub fn note(message: impl Into<String>) -> Self {
        Self::new(Severity::Note, message)
    }

    /// Attach a file and line.
    pub fn at(mut self, file: impl Into<PathBuf>, line: usize) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }

    /// Attach a file without a line.
    pub fn in_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// `file:line` for display, when a location is known.
    pub fn location(&self) -> Option<String> {
        let file = self.file.as_deref()?;
        Some(match self.line {
            Some(line) => format!("{}:{}", file.display(), line),
            None => file.display().to_string(),
        })
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = if color {
            match self.severity {
                Severity::Error => "\x1b[1;31merror\x1b[0m",
                Severity::Warning => "\x1b[1;33mwarning\x1b[0m",
                Severity::Note => "\x1b[1;36mnote\x1b[0m",
            }
        } else {
            match self.severity {
                Severity::Error => "error",
                Severity::Warning => "warning",
                Severity::Note => "note",
            }
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(location) = self.location() {
            output.push_str(&format!("  --> {}\n", location));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        for suggestion in &self.suggestions {
            output.push_str(&format!("  {}\n", suggestion));
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// Append-only sink for the diagnostics of one generation pass.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSink {
    records: Vec<Diagnostic>,
}

impl DiagnosticSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic, mirroring it to the log.
    pub fn push(&mut self, diagnostic: Diagnostic) {
        tracing::debug!(
            "{}: {} {}",
            diagnostic.severity,
            diagnostic.location().unwrap_or_default(),
            diagnostic.message
        );
        self.records.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for diagnostic in diagnostics {
            self.push(diagnostic);
        }
    }

    /// Warnings in the order they were recorded.
    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records.iter().filter(|d| d.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(Diagnostic::is_error)
    }

    /// Warnings attributed to `file`.
    pub fn warnings_for<'a>(&'a self, file: &'a Path) -> impl Iterator<Item = &'a Diagnostic> {
        self.warnings()
            .filter(move |d| d.file.as_deref() == Some(file))
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_formatting() {
        let diag = Diagnostic::warning("unresolved native type `HFOO`")
            .at("src/foo.cpp", 12)
            .with_context("parameter `handle` of `RHC_Foo` defaulted to IntPtr")
            .with_suggestion(suggestions::UNRESOLVED_TYPE);

        let output = diag.format(false);
        assert!(output.starts_with("warning: unresolved native type `HFOO`"));
        assert!(output.contains("--> src/foo.cpp:12"));
        assert!(output.contains("defaulted to IntPtr"));
        assert!(output.contains("[mapping.typedefs]"));
    }

    #[test]
    fn test_location_without_line() {
        let diag = Diagnostic::error("cannot read").in_file("a.h");
        assert_eq!(diag.location().as_deref(), Some("a.h"));
        assert_eq!(Diagnostic::note("x").location(), None);
    }

    #[test]
    fn test_sink_partitions_by_severity() {
        let mut sink = DiagnosticSink::new();
        sink.push(Diagnostic::warning("w1").at("a.h", 1));
        sink.push(Diagnostic::error("e1").at("b.h", 2));
        sink.push(Diagnostic::warning("w2").at("b.h", 3));

        assert!(sink.has_errors());
        assert_eq!(sink.warnings().count(), 2);
        assert_eq!(sink.errors().count(), 1);
        assert_eq!(sink.warnings_for(Path::new("b.h")).count(), 1);
    }

    #[test]
    fn test_serializes_as_structured_record() {
        let diag = Diagnostic::warning("w").at("a.h", 7);
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"severity\":\"warning\""));
        assert!(json.contains("\"line\":7"));
        assert!(!json.contains("suggestions"));
    }
}
