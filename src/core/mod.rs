//! Core data model for binding generation.

pub mod declaration;
pub mod model;
pub mod signature;
pub mod symbols;

pub use declaration::{Location, RawDeclaration, RawParam};
pub use model::{ConflictError, DeclarationModel, Insertion};
pub use signature::{
    BufferExtent, CallingConvention, FunctionSignature, MappedParameter, MappedType,
    MarshalDirective, StringEncoding,
};
pub use symbols::SymbolSet;
