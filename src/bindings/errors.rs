//! Fatal errors of a generation run.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use super::preprocess::PreprocessError;
use crate::core::ConflictError;
use crate::util::diagnostic::Diagnostic;

/// An error that aborts the current library target.
///
/// No output file is written for a target that reported one of these.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum FatalError {
    #[error("unbalanced conditional in {}: {source}", file.display())]
    #[diagnostic(
        code(methodgen::preprocess::unbalanced),
        help("Check that every #if, #ifdef and #ifndef has a matching #endif")
    )]
    UnbalancedConditional {
        file: PathBuf,
        #[source]
        source: PreprocessError,
    },

    #[error(transparent)]
    #[diagnostic(
        code(methodgen::model::conflict),
        help("Make the header declaration and the definition agree")
    )]
    SignatureConflict(#[from] ConflictError),

    #[error("source directory `{}` does not exist", path.display())]
    #[diagnostic(
        code(methodgen::config::source_dir),
        help("Pass an existing directory or fix `source_dir` in the configuration")
    )]
    SourceDirectory { path: PathBuf },

    #[error("I/O failure on `{}`: {message}", path.display())]
    #[diagnostic(
        code(methodgen::io),
        help("Check that the sources are readable and the output directory is writable")
    )]
    Io { path: PathBuf, message: String },
}

impl FatalError {
    pub fn unbalanced(file: impl Into<PathBuf>, source: PreprocessError) -> Self {
        FatalError::UnbalancedConditional {
            file: file.into(),
            source,
        }
    }

    /// Wrap an I/O failure on `path`, keeping its context chain.
    pub fn io(path: impl Into<PathBuf>, error: &anyhow::Error) -> Self {
        FatalError::Io {
            path: path.into(),
            message: format!("{:#}", error),
        }
    }

    /// Convert to a structured diagnostic record.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            FatalError::UnbalancedConditional { file, source } => {
                Diagnostic::error(format!("unbalanced conditional: {}", source))
                    .at(file, source.line())
                    .with_context("the file was not scanned")
            }
            FatalError::SignatureConflict(conflict) => conflict.to_diagnostic(),
            FatalError::SourceDirectory { path } => {
                Diagnostic::error(format!("source directory `{}` does not exist", path.display()))
                    .in_file(path)
                    .with_suggestion(
                        "help: Pass an existing directory or fix `source_dir` in the configuration",
                    )
            }
            FatalError::Io { path, message } => {
                Diagnostic::error(format!("I/O failure: {}", message)).in_file(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Location;
    use crate::util::diagnostic::suggestions;

    #[test]
    fn test_unbalanced_diagnostic_points_at_line() {
        let err = FatalError::unbalanced(
            "rh_mesh.cpp",
            PreprocessError::Unmatched {
                directive: "endif".to_string(),
                line: 42,
            },
        );
        assert!(err.to_string().contains("rh_mesh.cpp"));

        let diag = err.to_diagnostic();
        assert!(diag.is_error());
        assert_eq!(diag.line, Some(42));
        assert_eq!(diag.file.as_deref(), Some(std::path::Path::new("rh_mesh.cpp")));
    }

    #[test]
    fn test_conflict_keeps_both_locations() {
        let err: FatalError = ConflictError {
            name: "F".to_string(),
            first: Location::new("a.cpp", 1),
            second: Location::new("b.h", 2),
            first_signature: "void F(int)".to_string(),
            second_signature: "void F(double)".to_string(),
        }
        .into();
        let diag = err.to_diagnostic();
        assert!(diag.message.contains("`F`"));
        assert!(diag.context.iter().any(|c| c.contains("a.cpp:1")));
        assert!(diag.context.iter().any(|c| c.contains("b.h:2")));
        assert_eq!(
            diag.suggestions,
            vec![suggestions::SIGNATURE_CONFLICT.to_string()]
        );
    }

    #[test]
    fn test_io_failure_keeps_context_chain() {
        let error = anyhow::anyhow!("permission denied").context("failed to write file: out.cs");
        let err = FatalError::io("out.cs", &error);
        let diag = err.to_diagnostic();
        assert!(diag.is_error());
        assert!(diag.message.contains("failed to write file: out.cs: permission denied"));
        assert_eq!(diag.location().as_deref(), Some("out.cs"));
    }

    #[test]
    fn test_miette_codes() {
        let err = FatalError::SourceDirectory {
            path: PathBuf::from("missing"),
        };
        let code = MietteDiagnostic::code(&err).map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("methodgen::config::source_dir"));
    }
}
