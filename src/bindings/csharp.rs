//! C# P/Invoke declaration generator.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::core::{
    BufferExtent, DeclarationModel, FunctionSignature, MappedParameter, MappedType,
    MarshalDirective,
};

const INDENT: &str = "  ";

/// Namespaces every generated file imports.
const BASE_USINGS: &[&str] = &["System", "System.Runtime.InteropServices"];

/// Options for one generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmitOptions {
    /// Link target embedded in every `DllImport`
    pub library: String,

    /// Enclosing namespace; none when absent
    pub namespace: Option<String>,

    /// Name of the partial class holding the declarations
    pub class_name: String,

    /// Class holding library name constants (`Import.lib`)
    pub import_class: Option<String>,

    /// Additional `using` namespaces, in order
    pub usings: Vec<String>,

    /// Input fingerprint recorded in the header
    pub fingerprint: Option<String>,
}

impl Default for EmitOptions {
    fn default() -> Self {
        EmitOptions {
            library: "lib".to_string(),
            namespace: None,
            class_name: "UnsafeNativeMethods".to_string(),
            import_class: None,
            usings: Vec::new(),
            fingerprint: None,
        }
    }
}

/// Renders a [`DeclarationModel`] as C# source.
#[derive(Debug, Clone, Default)]
pub struct CSharpGenerator {
    options: EmitOptions,
}

impl CSharpGenerator {
    pub fn new(options: EmitOptions) -> Self {
        CSharpGenerator { options }
    }

    pub fn options(&self) -> &EmitOptions {
        &self.options
    }

    /// Generate the whole file.
    pub fn generate(&self, model: &DeclarationModel) -> String {
        let mut out = String::new();
        self.write_header(&mut out);

        let mut depth = 0;
        if let Some(ns) = &self.options.namespace {
            let _ = writeln!(out, "namespace {}", ns);
            out.push_str("{\n");
            depth += 1;
        }

        line(&mut out, depth, &format!("internal partial class {}", self.options.class_name));
        line(&mut out, depth, "{");

        for (index, (file, signatures)) in model.groups().into_iter().enumerate() {
            if index > 0 {
                out.push('\n');
            }
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.display().to_string());
            line(&mut out, depth + 1, &format!("// {}", name));
            for signature in signatures {
                self.write_function(&mut out, depth + 1, signature);
            }
        }

        line(&mut out, depth, "}");
        if self.options.namespace.is_some() {
            out.push_str("}\n");
        }
        out
    }

    fn write_header(&self, out: &mut String) {
        out.push_str("// <auto-generated>\n");
        out.push_str("// Generated by methodgen from native export declarations.\n");
        out.push_str("// Do not edit by hand: changes are lost when the file is regenerated.\n");
        let _ = writeln!(out, "// Library: {}", self.options.library);
        if let Some(fingerprint) = &self.options.fingerprint {
            let _ = writeln!(out, "// Fingerprint: {}", fingerprint);
        }
        out.push_str("// </auto-generated>\n\n");

        let mut seen: Vec<&str> = Vec::new();
        for using in BASE_USINGS
            .iter()
            .copied()
            .chain(self.options.usings.iter().map(|u| normalize_using(u)))
        {
            if !using.is_empty() && !seen.contains(&using) {
                let _ = writeln!(out, "using {};", using);
                seen.push(using);
            }
        }
        out.push('\n');
    }

    fn write_function(&self, out: &mut String, depth: usize, signature: &FunctionSignature) {
        if let Some(doc) = &signature.doc {
            line(out, depth, &format!("// {}", doc));
        }
        for (what, ty) in signature.unresolved() {
            let what = if what == "return" {
                "return value".to_string()
            } else {
                format!("parameter `{}`", what)
            };
            line(
                out,
                depth,
                &format!(
                    "// NOTE: native type `{}` of {} is unresolved; defaulted to {}",
                    ty.native, what, ty.managed
                ),
            );
        }

        line(
            out,
            depth,
            &format!(
                "[DllImport({}, CallingConvention = CallingConvention.{})]",
                self.link_target(),
                signature.convention.as_csharp()
            ),
        );
        if is_bool(&signature.return_type) {
            line(out, depth, "[return: MarshalAs(UnmanagedType.U1)]");
        }

        let params: Vec<String> = signature.params.iter().map(render_parameter).collect();
        line(
            out,
            depth,
            &format!(
                "internal static extern {} {}({});",
                signature.return_type.managed,
                signature.name,
                params.join(", ")
            ),
        );
        out.push('\n');
    }

    /// `Import.lib` when an import class is configured, else a string literal.
    pub fn link_target(&self) -> String {
        match &self.options.import_class {
            Some(class) => format!("{}.{}", class, self.options.library),
            None => format!("\"{}\"", self.options.library.replace('"', "\\\"")),
        }
    }
}

/// Generate a file for `library` with default options.
pub fn emit(model: &DeclarationModel, library: &str) -> String {
    CSharpGenerator::new(EmitOptions {
        library: library.to_string(),
        ..EmitOptions::default()
    })
    .generate(model)
}

/// Render one parameter with its marshaling attributes.
pub fn render_parameter(param: &MappedParameter) -> String {
    let ty = &param.ty;
    let managed = ty.managed.as_str();
    let declared = match &ty.directive {
        MarshalDirective::ByValueScalar if is_bool(ty) => {
            "[MarshalAs(UnmanagedType.U1)]bool".to_string()
        }
        MarshalDirective::ByValueScalar
        | MarshalDirective::PointerOpaque
        | MarshalDirective::StructByValue => managed.to_string(),
        MarshalDirective::PointerToMutableBuffer {
            extent: BufferExtent::Single,
            ..
        } if is_bool(ty) => "[MarshalAs(UnmanagedType.U1)]ref bool".to_string(),
        MarshalDirective::PointerToMutableBuffer {
            extent: BufferExtent::Single,
            ..
        }
        | MarshalDirective::StructByPointer => format!("ref {}", managed),
        MarshalDirective::PointerToMutableBuffer {
            extent: BufferExtent::Array,
            writable,
        } => {
            let direction = if *writable { "In, Out" } else { "In" };
            if is_bool(ty) {
                format!(
                    "[{}, MarshalAs(UnmanagedType.LPArray, ArraySubType = UnmanagedType.U1)]bool[]",
                    direction
                )
            } else {
                format!("[{}]{}[]", direction, managed)
            }
        }
        MarshalDirective::FixedLengthArray { length } => {
            format!("[MarshalAs(UnmanagedType.LPArray, SizeConst = {})]{}[]", length, managed)
        }
        MarshalDirective::NullTerminatedStringIn { encoding }
        | MarshalDirective::NullTerminatedStringOutBuffer { encoding, .. } => {
            format!("[MarshalAs(UnmanagedType.{})]{}", encoding.unmanaged_type(), managed)
        }
    };
    format!("{} {}", declared, param.name)
}

fn is_bool(ty: &MappedType) -> bool {
    ty.managed == "bool"
}

/// Accept `System.Text`, `using System.Text;` and `using System.Text`.
fn normalize_using(text: &str) -> &str {
    let text = text.trim();
    let text = text.strip_prefix("using ").unwrap_or(text);
    text.trim_end_matches(';').trim()
}

fn line(out: &mut String, depth: usize, text: &str) {
    for _ in 0..depth {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}
