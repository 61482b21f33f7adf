//! Native type representation.
//!
//! [`CType`] is a structural parse of the type text of one parameter or
//! return value. It knows the C/C++ builtin spellings; everything else is a
//! [`CType::Named`] type left for the mapper to resolve.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lexer::{find_word, normalize_ws};

/// C type representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CType {
    /// Void type
    Void,

    /// Signed integer types
    Int8,
    Int16,
    Int32,
    Int64,

    /// Unsigned integer types
    UInt8,
    UInt16,
    UInt32,
    UInt64,

    /// Floating point types
    Float,
    Double,

    /// Boolean (one byte in C++)
    Bool,

    /// Character types
    Char,
    SChar,
    UChar,
    WChar,

    /// Size types
    Size,
    SSize,
    PtrDiff,
    IntPtr,
    UIntPtr,

    /// Pointer to another type
    Pointer(Box<CType>),

    /// Pointer to const
    ConstPointer(Box<CType>),

    /// C++ reference
    Reference(Box<CType>),

    /// Reference to const
    ConstReference(Box<CType>),

    /// Fixed-size array
    Array(Box<CType>, usize),

    /// Explicit `struct X` / `class X`
    Struct(String),

    /// Explicit `enum X`
    Enum(String),

    /// Any other identifier: typedef, class, template instance
    Named(String),

    /// Text that could not be parsed as a type
    Opaque(String),
}

impl CType {
    /// Parse C type text such as `const ON_3dPoint*` or `double[3]`.
    pub fn parse(s: &str) -> Self {
        let s = normalize_ws(s);
        let s = strip_declarator_cv(&s);

        if let Some(inner) = s.strip_suffix(']') {
            let Some(open) = inner.rfind('[') else {
                return CType::Opaque(s.to_string());
            };
            return match inner[open + 1..].trim().parse::<usize>() {
                Ok(len) => CType::Array(Box::new(CType::parse(&inner[..open])), len),
                Err(_) => CType::Opaque(s.to_string()),
            };
        }

        if let Some(inner) = s.strip_suffix('*') {
            let inner = inner.trim();
            return if has_const(inner) {
                CType::ConstPointer(Box::new(CType::parse(inner)))
            } else {
                CType::Pointer(Box::new(CType::parse(inner)))
            };
        }

        if let Some(inner) = s.strip_suffix('&') {
            let inner = inner.trim();
            return if has_const(inner) {
                CType::ConstReference(Box::new(CType::parse(inner)))
            } else {
                CType::Reference(Box::new(CType::parse(inner)))
            };
        }

        parse_base(s)
    }

    /// Check if this is a pointer type.
    pub fn is_pointer(&self) -> bool {
        matches!(self, CType::Pointer(_) | CType::ConstPointer(_))
    }

    /// Check if this is a void type.
    pub fn is_void(&self) -> bool {
        matches!(self, CType::Void)
    }

    /// The pointed-to or referenced type.
    pub fn pointee(&self) -> Option<&CType> {
        match self {
            CType::Pointer(inner)
            | CType::ConstPointer(inner)
            | CType::Reference(inner)
            | CType::ConstReference(inner) => Some(inner),
            _ => None,
        }
    }

    /// True for pointers and references to const.
    pub fn is_const_indirection(&self) -> bool {
        matches!(self, CType::ConstPointer(_) | CType::ConstReference(_))
    }

    /// Builtin arithmetic types and `bool`.
    pub fn is_scalar(&self) -> bool {
        self.scalar_csharp().is_some()
    }

    /// Exact-width C# equivalent of a builtin scalar.
    pub fn scalar_csharp(&self) -> Option<&'static str> {
        Some(match self {
            CType::Int8 | CType::SChar => "sbyte",
            CType::Int16 => "short",
            CType::Int32 => "int",
            CType::Int64 => "long",
            CType::UInt8 | CType::Char | CType::UChar => "byte",
            CType::UInt16 => "ushort",
            CType::UInt32 => "uint",
            CType::UInt64 => "ulong",
            CType::Float => "float",
            CType::Double => "double",
            CType::Bool => "bool",
            CType::WChar => "char",
            CType::Size => "UIntPtr",
            CType::SSize | CType::PtrDiff | CType::IntPtr => "IntPtr",
            CType::UIntPtr => "UIntPtr",
            _ => return None,
        })
    }
}

impl fmt::Display for CType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CType::Void => write!(f, "void"),
            CType::Int8 => write!(f, "int8_t"),
            CType::Int16 => write!(f, "int16_t"),
            CType::Int32 => write!(f, "int"),
            CType::Int64 => write!(f, "int64_t"),
            CType::UInt8 => write!(f, "uint8_t"),
            CType::UInt16 => write!(f, "uint16_t"),
            CType::UInt32 => write!(f, "unsigned int"),
            CType::UInt64 => write!(f, "uint64_t"),
            CType::Float => write!(f, "float"),
            CType::Double => write!(f, "double"),
            CType::Bool => write!(f, "bool"),
            CType::Char => write!(f, "char"),
            CType::SChar => write!(f, "signed char"),
            CType::UChar => write!(f, "unsigned char"),
            CType::WChar => write!(f, "wchar_t"),
            CType::Size => write!(f, "size_t"),
            CType::SSize => write!(f, "ssize_t"),
            CType::PtrDiff => write!(f, "ptrdiff_t"),
            CType::IntPtr => write!(f, "intptr_t"),
            CType::UIntPtr => write!(f, "uintptr_t"),
            CType::Pointer(inner) => write!(f, "{}*", inner),
            CType::ConstPointer(inner) => write!(f, "const {}*", inner),
            CType::Reference(inner) => write!(f, "{}&", inner),
            CType::ConstReference(inner) => write!(f, "const {}&", inner),
            CType::Array(inner, len) => write!(f, "{}[{}]", inner, len),
            CType::Struct(name) => write!(f, "struct {}", name),
            CType::Enum(name) => write!(f, "enum {}", name),
            CType::Named(name) | CType::Opaque(name) => write!(f, "{}", name),
        }
    }
}

/// Drop `const`/`volatile` that qualify the pointer itself (`char* const`).
fn strip_declarator_cv(s: &str) -> &str {
    let mut s = s.trim();
    loop {
        let Some(rest) = s
            .strip_suffix("const")
            .or_else(|| s.strip_suffix("volatile"))
        else {
            return s;
        };
        let rest = rest.trim_end();
        if rest.ends_with('*') || rest.ends_with('&') {
            s = rest;
        } else {
            return s;
        }
    }
}

/// `const` outside of template arguments.
fn has_const(s: &str) -> bool {
    let mut outer = String::with_capacity(s.len());
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '<' => depth += 1,
            '>' => depth = depth.saturating_sub(1),
            _ if depth == 0 => outer.push(c),
            _ => {}
        }
    }
    find_word(&outer, "const").is_some()
}

fn compact_template(args: &str) -> String {
    args.replace("< ", "<")
        .replace(" >", ">")
        .replace(" *", "*")
        .replace(" ,", ",")
        .replace(", ", ",")
}

fn parse_base(s: &str) -> CType {
    if let Some(lt) = s.find('<') {
        let head = s[..lt].trim_end();
        let start = head.rfind(' ').map_or(0, |i| i + 1);
        return CType::Named(format!("{}{}", &head[start..], compact_template(&s[lt..])));
    }

    let words: Vec<&str> = s
        .split_whitespace()
        .filter(|w| !matches!(*w, "const" | "volatile"))
        .collect();

    match words.as_slice() {
        [] => return CType::Opaque(s.to_string()),
        ["struct" | "class" | "union", name] => return CType::Struct(name.to_string()),
        ["enum", name] => return CType::Enum(name.to_string()),
        _ => {}
    }

    let is_unsigned = words.contains(&"unsigned");
    let core: Vec<&str> = words
        .iter()
        .copied()
        .filter(|w| !matches!(*w, "unsigned" | "signed"))
        .collect();
    let explicitly_signed = words.contains(&"signed");

    match core.join(" ").as_str() {
        "void" => CType::Void,
        "bool" | "_Bool" => CType::Bool,
        "char" if is_unsigned => CType::UChar,
        "char" if explicitly_signed => CType::SChar,
        "char" => CType::Char,
        "wchar_t" => CType::WChar,
        "short" | "short int" if is_unsigned => CType::UInt16,
        "short" | "short int" => CType::Int16,
        "" | "int" if is_unsigned => CType::UInt32,
        "" if explicitly_signed => CType::Int32,
        "int" => CType::Int32,
        // long is 32 bits under the LLP64 model of Windows targets
        "long" | "long int" if is_unsigned => CType::UInt32,
        "long" | "long int" => CType::Int32,
        "long long" | "long long int" | "__int64" if is_unsigned => CType::UInt64,
        "long long" | "long long int" => CType::Int64,
        "float" => CType::Float,
        "double" => CType::Double,
        "long double" => CType::Double,

        // Fixed-width types
        "int8_t" | "__int8" => CType::Int8,
        "int16_t" | "__int16" => CType::Int16,
        "int32_t" | "__int32" => CType::Int32,
        "int64_t" | "__int64" => CType::Int64,
        "uint8_t" => CType::UInt8,
        "uint16_t" => CType::UInt16,
        "uint32_t" => CType::UInt32,
        "uint64_t" => CType::UInt64,

        // Size types
        "size_t" => CType::Size,
        "ssize_t" => CType::SSize,
        "ptrdiff_t" => CType::PtrDiff,
        "intptr_t" => CType::IntPtr,
        "uintptr_t" => CType::UIntPtr,

        other if core.len() == 1 => CType::Named(other.to_string()),
        _ => CType::Opaque(s.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ctype_parse() {
        assert_eq!(CType::parse("void"), CType::Void);
        assert_eq!(CType::parse("int"), CType::Int32);
        assert_eq!(CType::parse("unsigned int"), CType::UInt32);
        assert_eq!(CType::parse("unsigned"), CType::UInt32);
        assert_eq!(CType::parse("int64_t"), CType::Int64);
        assert_eq!(CType::parse("unsigned __int64"), CType::UInt64);
        assert_eq!(CType::parse("char*"), CType::Pointer(Box::new(CType::Char)));
        assert_eq!(
            CType::parse("const char*"),
            CType::ConstPointer(Box::new(CType::Char))
        );
        assert_eq!(
            CType::parse("char const *"),
            CType::ConstPointer(Box::new(CType::Char))
        );
        assert_eq!(
            CType::parse("struct MyStruct"),
            CType::Struct("MyStruct".to_string())
        );
    }

    #[test]
    fn test_parse_arrays_and_references() {
        assert_eq!(
            CType::parse("double[3]"),
            CType::Array(Box::new(CType::Double), 3)
        );
        assert_eq!(CType::parse("double[N]"), CType::Opaque("double[N]".to_string()));
        assert_eq!(
            CType::parse("const ON_3dPoint &"),
            CType::ConstReference(Box::new(CType::Named("ON_3dPoint".to_string())))
        );
        assert_eq!(
            CType::parse("ON_Curve**"),
            CType::Pointer(Box::new(CType::Pointer(Box::new(CType::Named(
                "ON_Curve".to_string()
            )))))
        );
    }

    #[test]
    fn test_pointer_const_qualifier_is_ignored() {
        assert_eq!(CType::parse("char* const"), CType::Pointer(Box::new(CType::Char)));
    }

    #[test]
    fn test_templates_are_named() {
        assert_eq!(
            CType::parse("ON_SimpleArray< int >*"),
            CType::Pointer(Box::new(CType::Named("ON_SimpleArray<int>".to_string())))
        );
        assert_eq!(
            CType::parse("ON_SimpleArray<const ON_Curve *>*"),
            CType::Pointer(Box::new(CType::Named(
                "ON_SimpleArray<const ON_Curve*>".to_string()
            )))
        );
    }

    #[test]
    fn test_scalar_csharp_widths() {
        assert_eq!(CType::Int32.scalar_csharp(), Some("int"));
        assert_eq!(CType::UInt64.scalar_csharp(), Some("ulong"));
        assert_eq!(CType::Char.scalar_csharp(), Some("byte"));
        assert_eq!(CType::parse("long").scalar_csharp(), Some("int"));
        assert_eq!(CType::Named("X".into()).scalar_csharp(), None);
    }

    #[test]
    fn test_display_round_trips_shape() {
        assert_eq!(CType::parse("const ON_Mesh *").to_string(), "const ON_Mesh*");
        assert_eq!(CType::parse("int [4]").to_string(), "int[4]");
    }
}
