//! methodgen - P/Invoke declaration generator for exported C functions
//!
//! This crate scans a directory of C/C++ sources for functions carrying an
//! export marker, maps their native signatures to C# interop types and
//! writes one `DllImport` declaration file per native library.

pub mod bindings;
pub mod core;
pub mod ops;
pub mod util;

/// Test utilities for methodgen unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests.
#[cfg(test)]
pub mod test_support;

pub use bindings::{CSharpGenerator, FatalError, TypeMapper};
pub use core::{DeclarationModel, FunctionSignature, SymbolSet};
pub use ops::{generate, generate_all, GenerateOptions, GenerateResult};
pub use util::config::{Config, TargetConfig};
pub use util::GenerationContext;
