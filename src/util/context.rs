//! Per-target generation context.
//!
//! Everything one library target accumulates while it is generated lives in
//! a [`GenerationContext`] value owned by that pass, so two targets in the
//! same run never share symbols, diagnostics or declarations.

use crate::bindings::{FatalError, ScanPolicy, TypeMapper};
use crate::core::{DeclarationModel, FunctionSignature, Insertion, SymbolSet};
use crate::util::diagnostic::{Diagnostic, DiagnosticSink};

/// State of one generation pass.
#[derive(Debug)]
pub struct GenerationContext {
    symbols: SymbolSet,
    scan: ScanPolicy,
    mapper: TypeMapper,
    diagnostics: DiagnosticSink,
    model: DeclarationModel,
    fatal: Vec<FatalError>,
}

impl GenerationContext {
    pub fn new(symbols: SymbolSet, scan: ScanPolicy, mapper: TypeMapper) -> Self {
        GenerationContext {
            symbols,
            scan,
            mapper,
            diagnostics: DiagnosticSink::new(),
            model: DeclarationModel::new(),
            fatal: Vec::new(),
        }
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    pub fn scan_policy(&self) -> &ScanPolicy {
        &self.scan
    }

    pub fn mapper(&self) -> &TypeMapper {
        &self.mapper
    }

    pub fn model(&self) -> &DeclarationModel {
        &self.model
    }

    pub fn diagnostics(&self) -> &DiagnosticSink {
        &self.diagnostics
    }

    pub fn warn(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn warn_all(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Record an error that prevents this target's output from being written.
    pub fn fail(&mut self, error: FatalError) {
        self.diagnostics.push(error.to_diagnostic());
        self.fatal.push(error);
    }

    pub fn has_failed(&self) -> bool {
        !self.fatal.is_empty()
    }

    /// Add a signature to the model; a conflicting redeclaration fails the pass.
    pub fn add_signature(&mut self, signature: FunctionSignature) -> Option<Insertion> {
        match self.model.add(signature) {
            Ok(insertion) => Some(insertion),
            Err(conflict) => {
                self.fail(conflict.into());
                None
            }
        }
    }

    pub fn into_parts(self) -> (DeclarationModel, DiagnosticSink, Vec<FatalError>) {
        (self.model, self.diagnostics, self.fatal)
    }
}
