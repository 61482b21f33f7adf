//! Resolved, marshaling-annotated function signatures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::declaration::Location;

/// Calling conventions an exported function can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallingConvention {
    /// C calling convention (default)
    #[default]
    Cdecl,
    /// Windows stdcall
    Stdcall,
}

impl CallingConvention {
    /// Recognize a calling-convention keyword in native source.
    pub fn from_keyword(token: &str) -> Option<Self> {
        match token {
            "__cdecl" | "_cdecl" | "CDECL" => Some(CallingConvention::Cdecl),
            "__stdcall" | "_stdcall" | "WINAPI" | "CALLBACK" | "APIENTRY" => {
                Some(CallingConvention::Stdcall)
            }
            _ => None,
        }
    }

    /// Member name in `System.Runtime.InteropServices.CallingConvention`.
    pub fn as_csharp(&self) -> &'static str {
        match self {
            CallingConvention::Cdecl => "Cdecl",
            CallingConvention::Stdcall => "StdCall",
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallingConvention::Cdecl => write!(f, "cdecl"),
            CallingConvention::Stdcall => write!(f, "stdcall"),
        }
    }
}

impl FromStr for CallingConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cdecl" => Ok(CallingConvention::Cdecl),
            "stdcall" => Ok(CallingConvention::Stdcall),
            other => Err(format!("unknown calling convention `{}`", other)),
        }
    }
}

/// Character encoding of a string crossing the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringEncoding {
    /// Narrow `char` strings (`UnmanagedType.LPStr`)
    Ansi,
    /// Wide strings (`UnmanagedType.LPWStr`)
    Unicode,
}

impl StringEncoding {
    pub fn unmanaged_type(&self) -> &'static str {
        match self {
            StringEncoding::Ansi => "LPStr",
            StringEncoding::Unicode => "LPWStr",
        }
    }
}

/// How many elements a mutable pointer refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BufferExtent {
    /// A single element passed by reference
    Single,
    /// A caller-allocated array
    Array,
}

/// Strategy for moving one value across the interop boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarshalDirective {
    /// Scalar passed by value with identical width on both sides
    ByValueScalar,

    /// Pointer the managed side only carries around (`IntPtr`)
    PointerOpaque,

    /// Pointer to data the callee may write
    PointerToMutableBuffer { extent: BufferExtent, writable: bool },

    /// `T[N]` parameter
    FixedLengthArray { length: usize },

    /// Read-only, null-terminated input string
    NullTerminatedStringIn { encoding: StringEncoding },

    /// Writable character buffer paired with a length parameter
    NullTerminatedStringOutBuffer {
        encoding: StringEncoding,
        length_param: usize,
    },

    /// Pointer or reference to a value-like struct (`ref T`)
    StructByPointer,

    /// Value-like struct copied by value
    StructByValue,
}

impl MarshalDirective {
    pub fn is_by_value_scalar(&self) -> bool {
        matches!(self, MarshalDirective::ByValueScalar)
    }

    /// Short name used in reports.
    pub fn name(&self) -> &'static str {
        match self {
            MarshalDirective::ByValueScalar => "by-value-scalar",
            MarshalDirective::PointerOpaque => "pointer-opaque",
            MarshalDirective::PointerToMutableBuffer { .. } => "pointer-to-mutable-buffer",
            MarshalDirective::FixedLengthArray { .. } => "fixed-length-array",
            MarshalDirective::NullTerminatedStringIn { .. } => "null-terminated-string-in",
            MarshalDirective::NullTerminatedStringOutBuffer { .. } => {
                "null-terminated-string-out-buffer"
            }
            MarshalDirective::StructByPointer => "struct-by-pointer",
            MarshalDirective::StructByValue => "struct-by-value",
        }
    }
}

/// A native type resolved to its managed counterpart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MappedType {
    /// Managed element or value type (`double`, `IntPtr`, `Point3d`, `string`)
    pub managed: String,

    /// Marshaling strategy
    pub directive: MarshalDirective,

    /// The native text this was resolved from
    pub native: String,

    /// False when the mapper fell back to a default
    pub resolved: bool,
}

impl MappedType {
    pub fn new(managed: impl Into<String>, directive: MarshalDirective, native: &str) -> Self {
        MappedType {
            managed: managed.into(),
            directive,
            native: native.to_string(),
            resolved: true,
        }
    }

    pub fn void() -> Self {
        MappedType::new("void", MarshalDirective::ByValueScalar, "void")
    }

    /// Best-effort fallback for native text the mapper does not know.
    pub fn unresolved(native: &str) -> Self {
        MappedType {
            managed: "IntPtr".to_string(),
            directive: MarshalDirective::PointerOpaque,
            native: native.to_string(),
            resolved: false,
        }
    }

    pub fn is_void(&self) -> bool {
        self.managed == "void"
    }

    /// Equality of what ends up in the binding, ignoring native spelling.
    pub fn same_binding(&self, other: &MappedType) -> bool {
        self.managed == other.managed && self.directive == other.directive
    }
}

/// A resolved parameter: interop type, directive and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedParameter {
    pub name: String,
    pub ty: MappedType,
}

impl MappedParameter {
    pub fn new(name: impl Into<String>, ty: MappedType) -> Self {
        MappedParameter {
            name: name.into(),
            ty,
        }
    }
}

/// A fully resolved exported function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSignature {
    /// Function name, unique within one library target
    pub name: String,

    pub return_type: MappedType,

    pub params: Vec<MappedParameter>,

    /// Where the function was first declared
    pub origin: Location,

    pub convention: CallingConvention,

    /// Documentation carried over from the native declaration
    pub doc: Option<String>,
}

impl FunctionSignature {
    /// True when both signatures would produce the same binding.
    ///
    /// Parameter names, documentation and origin are not part of the
    /// binding: a header may name parameters differently from the definition.
    pub fn same_binding(&self, other: &FunctionSignature) -> bool {
        self.name == other.name
            && self.convention == other.convention
            && self.return_type.same_binding(&other.return_type)
            && self.params.len() == other.params.len()
            && self
                .params
                .iter()
                .zip(&other.params)
                .all(|(a, b)| a.ty.same_binding(&b.ty))
    }

    /// Types and parameters that fell back to a default mapping.
    pub fn unresolved(&self) -> impl Iterator<Item = (&str, &MappedType)> {
        std::iter::once(("return", &self.return_type))
            .chain(self.params.iter().map(|p| (p.name.as_str(), &p.ty)))
            .filter(|(_, ty)| !ty.resolved)
    }

    /// One-line native-style rendering, used in conflict reports.
    pub fn describe(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{} {}", p.ty.managed, p.ty.directive.name()))
            .collect();
        format!(
            "{} {}({})",
            self.return_type.managed,
            self.name,
            params.join(", ")
        )
    }
}
