//! Binding generation from native export declarations.
//!
//! The pipeline for one file is `preprocess` (drop inactive conditional
//! blocks), `scanner` (find marked declarations), `mapper` (resolve native
//! types to managed types and marshaling directives). `csharp` renders the
//! merged declaration model.

pub mod csharp;
pub mod errors;
pub mod lexer;
pub mod mapper;
pub mod preprocess;
pub mod scanner;
pub mod types;

pub use csharp::{emit, CSharpGenerator, EmitOptions};
pub use errors::FatalError;
pub use mapper::{MappingPolicy, OutBufferPolicy, TypeMapper};
pub use preprocess::{filter, Filtered, LiveLine, PreprocessError};
pub use scanner::{scan_lines, ScanOutput, ScanPolicy, Scanner};
pub use types::CType;
