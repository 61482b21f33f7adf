//! Native to managed type mapping.
//!
//! Resolution is a lookup-then-rule pipeline over the parsed [`CType`]:
//! typedefs are expanded first, then scalars, strings, arrays, value-like
//! structs and opaque struct pointers are recognized in that order. Anything
//! left over falls back to `IntPtr` and is reported as a warning.

use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::types::CType;
use crate::core::{
    BufferExtent, CallingConvention, FunctionSignature, MappedParameter, MappedType,
    MarshalDirective, RawDeclaration, StringEncoding,
};
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Typedef chains longer than this are treated as cyclic.
const MAX_TYPEDEF_DEPTH: usize = 8;

const CSHARP_KEYWORDS: &[&str] = &[
    "abstract", "as", "base", "bool", "break", "byte", "case", "catch", "char", "checked",
    "class", "const", "continue", "decimal", "default", "delegate", "do", "double", "else",
    "enum", "event", "explicit", "extern", "false", "finally", "fixed", "float", "for",
    "foreach", "goto", "if", "implicit", "in", "int", "interface", "internal", "is", "lock",
    "long", "namespace", "new", "null", "object", "operator", "out", "override", "params",
    "private", "protected", "public", "readonly", "ref", "return", "sbyte", "sealed", "short",
    "sizeof", "stackalloc", "static", "string", "struct", "switch", "this", "throw", "true",
    "try", "typeof", "uint", "ulong", "unchecked", "unsafe", "ushort", "using", "virtual",
    "void", "volatile", "while",
];

/// Managed type of a writable string buffer.
pub const STRING_BUILDER: &str = "System.Text.StringBuilder";

/// Which neighbouring parameter may carry the capacity of a `char*` buffer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutBufferPolicy {
    /// The parameter right after the buffer, else the one right before
    #[default]
    Adjacent,
    Preceding,
    Following,
    /// Never treat `char*` as an output string
    Never,
}

/// Tables driving the mapper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingPolicy {
    /// Name prefixes of native classes passed around as opaque pointers
    pub struct_prefixes: Vec<String>,

    /// Native struct name -> managed value type with identical layout
    pub value_structs: BTreeMap<String, String>,

    /// Native typedef -> builtin C type text
    pub typedefs: BTreeMap<String, String>,

    /// Opaque handle typedefs
    pub handles: BTreeSet<String>,

    /// Native enums marshaled as `int`
    pub enums: BTreeSet<String>,

    /// String element type -> encoding
    pub strings: BTreeMap<String, StringEncoding>,

    pub out_buffer: OutBufferPolicy,

    /// Block comment token marking a pointer as a caller-allocated array
    pub array_annotation: String,
}

impl Default for MappingPolicy {
    fn default() -> Self {
        let pairs = |items: &[(&str, &str)]| -> BTreeMap<String, String> {
            items
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };

        MappingPolicy {
            struct_prefixes: vec!["ON_".into(), "ONX_".into(), "CRh".into()],
            value_structs: pairs(&[
                ("ON_2DPOINT_STRUCT", "Point2d"),
                ("ON_2dPoint", "Point2d"),
                ("ON_2dVector", "Vector2d"),
                ("ON_3DPOINT_STRUCT", "Point3d"),
                ("ON_3dPoint", "Point3d"),
                ("ON_3DVECTOR_STRUCT", "Vector3d"),
                ("ON_3dVector", "Vector3d"),
                ("ON_3fPoint", "Point3f"),
                ("ON_3fVector", "Vector3f"),
                ("ON_4dPoint", "Point4d"),
                ("ON_BoundingBox", "BoundingBox"),
                ("ON_CIRCLE_STRUCT", "Circle"),
                ("ON_COMPONENT_INDEX", "ComponentIndex"),
                ("ON_INTERVAL_STRUCT", "Interval"),
                ("ON_Interval", "Interval"),
                ("ON_Line", "Line"),
                ("ON_PLANE_STRUCT", "Plane"),
                ("ON_UUID", "Guid"),
                ("ON_Xform", "Transform"),
            ]),
            typedefs: pairs(&[
                ("BOOL", "int"),
                ("DWORD", "uint32_t"),
                ("UINT", "unsigned int"),
                ("UINT_PTR", "uintptr_t"),
                ("INT_PTR", "intptr_t"),
                ("ON__INT8", "int8_t"),
                ("ON__UINT8", "uint8_t"),
                ("ON__INT16", "int16_t"),
                ("ON__UINT16", "uint16_t"),
                ("ON__INT32", "int32_t"),
                ("ON__UINT32", "uint32_t"),
                ("ON__INT64", "int64_t"),
                ("ON__UINT64", "uint64_t"),
                ("ON__INT_PTR", "intptr_t"),
                ("ON__UINT_PTR", "uintptr_t"),
                ("ON_Color", "unsigned int"),
            ]),
            handles: [
                "HANDLE", "HBITMAP", "HCURSOR", "HDC", "HFONT", "HICON", "HINSTANCE", "HMENU",
                "HMODULE", "HWND",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            enums: BTreeSet::new(),
            strings: [
                ("char", StringEncoding::Ansi),
                ("wchar_t", StringEncoding::Unicode),
                ("RHMONO_STRING", StringEncoding::Unicode),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), *v))
            .collect(),
            out_buffer: OutBufferPolicy::default(),
            array_annotation: "ARRAY".to_string(),
        }
    }
}

/// A mapped declaration and the warnings raised while mapping it.
#[derive(Debug, Clone)]
pub struct Mapped {
    pub signature: FunctionSignature,
    pub warnings: Vec<Diagnostic>,
}

/// Maps native type text to managed types and marshaling directives.
#[derive(Debug, Clone)]
pub struct TypeMapper {
    policy: MappingPolicy,
    convention: CallingConvention,
    annotation: Regex,
}

impl TypeMapper {
    pub fn new(policy: MappingPolicy, convention: CallingConvention) -> Result<Self, regex::Error> {
        let annotation = Regex::new(&format!(
            r"/\*\s*{}\s*\*/",
            regex::escape(&policy.array_annotation)
        ))?;
        Ok(TypeMapper {
            policy,
            convention,
            annotation,
        })
    }

    pub fn policy(&self) -> &MappingPolicy {
        &self.policy
    }

    /// Resolve every type in a raw declaration.
    pub fn map_declaration(&self, decl: &RawDeclaration) -> Mapped {
        let mut warnings = Vec::new();
        let mut unresolved = |what: String, text: &str| {
            warnings.push(
                Diagnostic::warning(format!(
                    "cannot map type `{}` of {} in `{}`; defaulting to IntPtr",
                    text, what, decl.name
                ))
                .at(decl.file(), decl.line())
                .with_suggestion(suggestions::UNRESOLVED_TYPE),
            );
        };

        let return_type = self.map_return(&decl.return_type).unwrap_or_else(|| {
            unresolved("the return value".to_string(), &decl.return_type);
            MappedType::unresolved(&decl.return_type)
        });

        let mut params: Vec<MappedParameter> = decl
            .params
            .iter()
            .map(|p| {
                let ty = self.map_param(&p.type_text).unwrap_or_else(|| {
                    unresolved(format!("parameter `{}`", p.name), &p.type_text);
                    MappedType::unresolved(&p.type_text)
                });
                MappedParameter::new(escape_identifier(&p.name), ty)
            })
            .collect();

        self.bind_out_buffers(decl, &mut params);

        if let Some(token) = &decl.convention {
            if let Some(declared) = CallingConvention::from_keyword(token) {
                if declared != self.convention {
                    warnings.push(
                        Diagnostic::warning(format!(
                            "`{}` is declared `{}` but bindings use {}",
                            decl.name, token, self.convention
                        ))
                        .at(decl.file(), decl.line()),
                    );
                }
            }
        }

        Mapped {
            signature: FunctionSignature {
                name: decl.name.clone(),
                return_type,
                params,
                origin: decl.location.clone(),
                convention: self.convention,
                doc: decl.doc.clone(),
            },
            warnings,
        }
    }

    /// Map a parameter type; `None` when no rule applies.
    pub fn map_param(&self, text: &str) -> Option<MappedType> {
        let annotated = self.annotation.is_match(text);
        let native = self.annotation.replace_all(text, " ");
        let native = native.trim();
        let parsed = CType::parse(native);
        let ctype = self.expand(&parsed, 0);

        if let Some(mapped) = self.map_value(&ctype, native) {
            return Some(mapped);
        }

        match &ctype {
            CType::Array(elem, length) => {
                let managed = self.element_name(elem)?;
                Some(MappedType::new(
                    managed,
                    MarshalDirective::FixedLengthArray { length: *length },
                    native,
                ))
            }
            CType::Pointer(inner) | CType::ConstPointer(inner) => {
                let writable = !ctype.is_const_indirection();
                let element = parsed.pointee().unwrap_or(&**inner);
                // An annotated `char*` is a byte buffer, not text
                let encoding = if annotated {
                    None
                } else {
                    self.string_encoding(element)
                };
                if let Some(encoding) = encoding {
                    return Some(if writable {
                        // Becomes an output buffer once a length parameter is found
                        MappedType::new("IntPtr", MarshalDirective::PointerOpaque, native)
                    } else {
                        MappedType::new(
                            "string",
                            MarshalDirective::NullTerminatedStringIn { encoding },
                            native,
                        )
                    });
                }
                self.map_indirect(inner, writable, annotated, native)
            }
            CType::Reference(inner) | CType::ConstReference(inner) => {
                let writable = !ctype.is_const_indirection();
                self.map_indirect(inner, writable, false, native)
            }
            _ => None,
        }
    }

    /// Map a return type. Pointers come back as `IntPtr`.
    pub fn map_return(&self, text: &str) -> Option<MappedType> {
        let native = text.trim();
        let ctype = self.expand(&CType::parse(native), 0);
        if ctype.is_void() {
            return Some(MappedType::void());
        }
        if let Some(mapped) = self.map_value(&ctype, native) {
            return Some(mapped);
        }
        match ctype.pointee() {
            Some(inner) if ctype.is_pointer() && self.is_known(inner) => Some(MappedType::new(
                "IntPtr",
                MarshalDirective::PointerOpaque,
                native,
            )),
            _ => None,
        }
    }

    /// Types passed by value: scalars, enums, handles, value structs.
    fn map_value(&self, ctype: &CType, native: &str) -> Option<MappedType> {
        if let Some(managed) = ctype.scalar_csharp() {
            return Some(MappedType::new(managed, MarshalDirective::ByValueScalar, native));
        }
        match ctype {
            CType::Enum(_) => Some(MappedType::new("int", MarshalDirective::ByValueScalar, native)),
            CType::Named(name) if self.policy.enums.contains(name) => {
                Some(MappedType::new("int", MarshalDirective::ByValueScalar, native))
            }
            CType::Named(name) if self.policy.handles.contains(name) => {
                Some(MappedType::new("IntPtr", MarshalDirective::PointerOpaque, native))
            }
            _ => self
                .value_struct(ctype)
                .map(|managed| MappedType::new(managed, MarshalDirective::StructByValue, native)),
        }
    }

    /// Pointer or reference to `inner`.
    fn map_indirect(
        &self,
        inner: &CType,
        writable: bool,
        annotated: bool,
        native: &str,
    ) -> Option<MappedType> {
        let extent = if annotated {
            BufferExtent::Array
        } else {
            BufferExtent::Single
        };
        let buffer = MarshalDirective::PointerToMutableBuffer { extent, writable };

        if let Some(managed) = inner.scalar_csharp() {
            return Some(MappedType::new(managed, buffer, native));
        }
        if let Some(managed) = self.value_struct(inner) {
            let directive = if annotated {
                buffer
            } else {
                MarshalDirective::StructByPointer
            };
            return Some(MappedType::new(managed, directive, native));
        }
        if self.is_enum(inner) {
            return Some(MappedType::new("int", buffer, native));
        }
        if self.is_opaque_target(inner) {
            return Some(MappedType::new("IntPtr", MarshalDirective::PointerOpaque, native));
        }
        None
    }

    /// Rewrite pointers to `char`/`wchar_t` next to an integer length into
    /// output string buffers.
    fn bind_out_buffers(&self, decl: &RawDeclaration, params: &mut [MappedParameter]) {
        if self.policy.out_buffer == OutBufferPolicy::Never {
            return;
        }
        for i in 0..params.len() {
            let text = &decl.params[i].type_text;
            if self.annotation.is_match(text) {
                continue;
            }
            let native = CType::parse(text);
            let Some(element) = native.pointee() else {
                continue;
            };
            if !matches!(native, CType::Pointer(_)) {
                continue;
            }
            let Some(encoding) = self.string_encoding(element) else {
                continue;
            };

            let following = (i + 1 < params.len()).then_some(i + 1);
            let preceding = i.checked_sub(1);
            let candidates = match self.policy.out_buffer {
                OutBufferPolicy::Adjacent => [following, preceding],
                OutBufferPolicy::Following => [following, None],
                OutBufferPolicy::Preceding => [preceding, None],
                OutBufferPolicy::Never => [None, None],
            };
            if let Some(length_param) = candidates
                .into_iter()
                .flatten()
                .find(|&j| is_length(&params[j].ty))
            {
                params[i].ty.managed = STRING_BUILDER.to_string();
                params[i].ty.directive = MarshalDirective::NullTerminatedStringOutBuffer {
                    encoding,
                    length_param,
                };
            }
        }
    }

    fn expand(&self, ctype: &CType, depth: usize) -> CType {
        if depth > MAX_TYPEDEF_DEPTH {
            return ctype.clone();
        }
        let wrap = |inner: &CType| Box::new(self.expand(inner, depth + 1));
        match ctype {
            CType::Named(name) => match self.policy.typedefs.get(name) {
                Some(target) => self.expand(&CType::parse(target), depth + 1),
                None => ctype.clone(),
            },
            CType::Pointer(inner) => CType::Pointer(wrap(inner)),
            CType::ConstPointer(inner) => CType::ConstPointer(wrap(inner)),
            CType::Reference(inner) => CType::Reference(wrap(inner)),
            CType::ConstReference(inner) => CType::ConstReference(wrap(inner)),
            CType::Array(inner, len) => CType::Array(wrap(inner), *len),
            other => other.clone(),
        }
    }

    fn string_encoding(&self, element: &CType) -> Option<StringEncoding> {
        let key = match element {
            CType::Char => "char",
            CType::WChar => "wchar_t",
            CType::Named(name) => name.as_str(),
            _ => return None,
        };
        self.policy.strings.get(key).copied()
    }

    fn value_struct(&self, ctype: &CType) -> Option<&str> {
        match ctype {
            CType::Struct(name) | CType::Named(name) => {
                self.policy.value_structs.get(name).map(String::as_str)
            }
            _ => None,
        }
    }

    fn is_enum(&self, ctype: &CType) -> bool {
        match ctype {
            CType::Enum(_) => true,
            CType::Named(name) => self.policy.enums.contains(name),
            _ => false,
        }
    }

    /// Pointee types that the managed side only holds as `IntPtr`.
    fn is_opaque_target(&self, ctype: &CType) -> bool {
        match ctype {
            CType::Void | CType::Struct(_) => true,
            CType::Pointer(_) | CType::ConstPointer(_) => true,
            CType::Named(name) => {
                self.policy.handles.contains(name)
                    || self
                        .policy
                        .struct_prefixes
                        .iter()
                        .any(|prefix| name.starts_with(prefix.as_str()))
            }
            _ => false,
        }
    }

    fn is_known(&self, ctype: &CType) -> bool {
        ctype.is_scalar()
            || self.string_encoding(ctype).is_some()
            || self.value_struct(ctype).is_some()
            || self.is_enum(ctype)
            || self.is_opaque_target(ctype)
    }

    fn element_name(&self, elem: &CType) -> Option<String> {
        elem.scalar_csharp()
            .or_else(|| self.value_struct(elem))
            .map(str::to_string)
    }
}

fn is_length(ty: &MappedType) -> bool {
    ty.directive.is_by_value_scalar()
        && matches!(
            ty.managed.as_str(),
            "int" | "uint" | "long" | "ulong" | "short" | "ushort" | "UIntPtr"
        )
}

/// Prefix C# keywords with `@` so they can be used as parameter names.
pub fn escape_identifier(name: &str) -> String {
    if CSHARP_KEYWORDS.contains(&name) {
        format!("@{}", name)
    } else {
        name.to_string()
    }
}
