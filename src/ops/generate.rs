//! Implementation of `methodgen generate` and `methodgen check`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;

use crate::bindings::preprocess::{self, Filtered, PreprocessError};
use crate::bindings::{scan_lines, CSharpGenerator, FatalError, ScanPolicy, TypeMapper};
use crate::core::{FunctionSignature, SymbolSet};
use crate::util::config::{Config, TargetConfig};
use crate::util::context::GenerationContext;
use crate::util::diagnostic::Diagnostic;
use crate::util::{fs, hash};

/// Options for a generation run.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Run the whole pipeline but do not write output files
    pub check_only: bool,

    /// Number of scanning threads (None = one per core)
    pub jobs: Option<usize>,
}

/// Outcome of one library target.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateResult {
    /// Link target of the generated file
    pub library: String,

    /// Where the file is (or would be) written
    pub output_path: PathBuf,

    /// No fatal error occurred
    pub success: bool,

    /// The output file was written
    pub written: bool,

    /// Number of declarations in the generated file
    pub functions_emitted: usize,

    /// Number of source files scanned
    pub files_scanned: usize,

    /// Fingerprint of the inputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Recoverable problems, with file and line
    pub warnings: Vec<Diagnostic>,

    /// Fatal problems; non-empty exactly when `success` is false
    pub errors: Vec<Diagnostic>,

    /// Generated text, when the pass succeeded
    #[serde(skip)]
    pub text: Option<String>,

    /// The fatal errors behind `errors`, for rich rendering
    #[serde(skip)]
    pub fatal: Vec<FatalError>,
}

/// Declarations found in one source file, already mapped.
#[derive(Debug, Clone)]
pub struct FileScan {
    pub file: PathBuf,
    pub signatures: Vec<FunctionSignature>,
    pub warnings: Vec<Diagnostic>,
    pub error: Option<PreprocessError>,
}

/// Filter, scan and map one file. Pure; safe to run in parallel.
pub fn scan_source(
    file: &Path,
    text: &str,
    symbols: &SymbolSet,
    policy: &ScanPolicy,
    mapper: &TypeMapper,
) -> FileScan {
    let mut scan = FileScan {
        file: file.to_path_buf(),
        signatures: Vec::new(),
        warnings: Vec::new(),
        error: None,
    };

    let Filtered { lines, warnings } = match preprocess::filter(text, symbols, file) {
        Ok(filtered) => filtered,
        Err(e) => {
            scan.error = Some(e);
            return scan;
        }
    };
    scan.warnings = warnings;

    let found = scan_lines(policy, file, &lines);
    scan.warnings.extend(found.warnings);
    for decl in &found.declarations {
        let mapped = mapper.map_declaration(decl);
        scan.warnings.extend(mapped.warnings);
        scan.signatures.push(mapped.signature);
    }
    scan
}

/// Run the per-file pipeline over `sources` and merge the results into
/// `ctx` in the order given.
///
/// A file with unbalanced conditionals contributes nothing and fails the
/// pass; a conflicting redeclaration stops the merge.
pub fn process_sources(ctx: &mut GenerationContext, sources: &[(PathBuf, String)]) {
    let (symbols, policy, mapper) = (ctx.symbols(), ctx.scan_policy(), ctx.mapper());
    let scans: Vec<FileScan> = sources
        .par_iter()
        .map(|(file, text)| scan_source(file, text, symbols, policy, mapper))
        .collect();

    for scan in scans {
        tracing::debug!(
            "scanned {}: {} declaration(s)",
            scan.file.display(),
            scan.signatures.len()
        );
        ctx.warn_all(scan.warnings);
        if let Some(error) = scan.error {
            ctx.fail(FatalError::unbalanced(scan.file, error));
            continue;
        }
        for signature in scan.signatures {
            if ctx.add_signature(signature).is_none() {
                return;
            }
        }
    }
}

/// Generate the file for one target.
///
/// Problems in the sources and I/O failures are reported in the result;
/// only an invalid configuration is returned as an error. Output is written
/// only when the pass has no fatal error, and replaces any previous file in
/// full.
pub fn generate(
    config: &Config,
    target: &TargetConfig,
    opts: &GenerateOptions,
) -> Result<GenerateResult> {
    let mapper = TypeMapper::new(config.mapping.policy.clone(), config.scan.convention)
        .context("invalid array annotation in [mapping]")?;
    let mut ctx = GenerationContext::new(target.symbols(), config.scan_policy(), mapper);
    let output_path = target.output_path();

    if !target.source_dir.is_dir() {
        ctx.fail(FatalError::SourceDirectory {
            path: target.source_dir.clone(),
        });
        return Ok(finish(ctx, target, output_path, 0, None, None, false));
    }

    let files = match fs::list_sources(&target.source_dir) {
        Ok(files) => files,
        Err(e) => {
            ctx.fail(FatalError::io(&target.source_dir, &e));
            return Ok(finish(ctx, target, output_path, 0, None, None, false));
        }
    };
    tracing::debug!(
        "{} source file(s) in {}",
        files.len(),
        target.source_dir.display()
    );

    if let Some(jobs) = opts.jobs {
        rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build_global()
            .ok(); // Ignore if already set
    }

    let read: Result<Vec<(PathBuf, String)>> = files
        .par_iter()
        .map(|file| fs::read_source(file).map(|text| (file.clone(), text)))
        .collect();
    let sources = match read {
        Ok(sources) => sources,
        Err(e) => {
            ctx.fail(FatalError::io(&target.source_dir, &e));
            return Ok(finish(ctx, target, output_path, 0, None, None, false));
        }
    };

    process_sources(&mut ctx, &sources);

    let names: Vec<String> = sources.iter().map(|(file, _)| display_name(file)).collect();
    let fingerprint = hash::input_fingerprint(
        names
            .iter()
            .zip(&sources)
            .map(|(name, (_, text))| (name.as_str(), text.as_str())),
        ctx.symbols().iter(),
        &target.library,
    );

    if ctx.has_failed() {
        tracing::warn!(
            "not writing {}: generation for `{}` failed",
            output_path.display(),
            target.library
        );
        return Ok(finish(ctx, target, output_path, sources.len(), Some(fingerprint), None, false));
    }

    let mut options = config.emit_options(target);
    options.fingerprint = Some(fingerprint.clone());
    let text = CSharpGenerator::new(options).generate(ctx.model());

    let written = if opts.check_only {
        false
    } else if let Err(e) = fs::write_string(&output_path, &text) {
        ctx.fail(FatalError::io(&output_path, &e));
        return Ok(finish(
            ctx,
            target,
            output_path,
            sources.len(),
            Some(fingerprint),
            None,
            false,
        ));
    } else {
        tracing::info!(
            "wrote {} declaration(s) to {}",
            ctx.model().len(),
            output_path.display()
        );
        true
    };

    Ok(finish(
        ctx,
        target,
        output_path,
        sources.len(),
        Some(fingerprint),
        Some(text),
        written,
    ))
}

/// Generate every configured target. Targets are independent: a failure in
/// one does not stop the next.
pub fn generate_all(config: &Config, opts: &GenerateOptions) -> Result<Vec<GenerateResult>> {
    config
        .targets
        .iter()
        .map(|target| generate(config, target, opts))
        .collect()
}

fn finish(
    ctx: GenerationContext,
    target: &TargetConfig,
    output_path: PathBuf,
    files_scanned: usize,
    fingerprint: Option<String>,
    text: Option<String>,
    written: bool,
) -> GenerateResult {
    let (model, diagnostics, fatal) = ctx.into_parts();
    let success = fatal.is_empty();
    let diagnostics = diagnostics.into_vec();
    let (errors, warnings): (Vec<_>, Vec<_>) =
        diagnostics.into_iter().partition(Diagnostic::is_error);

    GenerateResult {
        library: target.library.clone(),
        output_path,
        success,
        written,
        functions_emitted: if success { model.len() } else { 0 },
        files_scanned,
        fingerprint,
        warnings,
        errors,
        text,
        fatal,
    }
}

fn display_name(file: &Path) -> String {
    file.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::MappingPolicy;
    use crate::core::CallingConvention;
    use crate::test_support::{sample_point_source, SourceTreeFixture};

    fn context(defines: &[&str]) -> GenerationContext {
        let mapper = TypeMapper::new(MappingPolicy::default(), CallingConvention::Cdecl).unwrap();
        GenerationContext::new(
            defines.iter().copied().collect(),
            ScanPolicy::default(),
            mapper,
        )
    }

    fn sources(files: &[(&str, &str)]) -> Vec<(PathBuf, String)> {
        files
            .iter()
            .map(|(name, text)| (PathBuf::from(name), text.to_string()))
            .collect()
    }

    #[test]
    fn test_header_and_definition_collapse() {
        let mut ctx = context(&[]);
        process_sources(
            &mut ctx,
            &sources(&[
                ("rh_a.cpp", "RH_C_FUNCTION int Count(const ON_Mesh* pMesh)\n{\n  return 0;\n}\n"),
                ("rh_a.h", "RH_C_FUNCTION int Count(const ON_Mesh* mesh);\n"),
            ]),
        );
        assert!(!ctx.has_failed());
        assert_eq!(ctx.model().len(), 1);
        assert_eq!(ctx.model().get("Count").unwrap().origin.file, PathBuf::from("rh_a.cpp"));
    }

    #[test]
    fn test_unbalanced_file_fails_but_others_are_scanned() {
        let mut ctx = context(&[]);
        process_sources(
            &mut ctx,
            &sources(&[
                ("bad.cpp", "RH_C_FUNCTION void A();\n#endif\n"),
                ("good.cpp", "RH_C_FUNCTION void B();\n"),
            ]),
        );
        assert!(ctx.has_failed());
        assert!(ctx.model().get("A").is_none());
        assert!(ctx.model().get("B").is_some());
    }

    #[test]
    fn test_defines_select_declarations() {
        let text = "#if defined(RHINO_SDK)\nRH_C_FUNCTION void SdkOnly();\n#else\nRH_C_FUNCTION void Standalone();\n#endif\n";
        let mut with = context(&["RHINO_SDK"]);
        process_sources(&mut with, &sources(&[("a.cpp", text)]));
        assert!(with.model().get("SdkOnly").is_some());
        assert!(with.model().get("Standalone").is_none());

        let mut without = context(&[]);
        process_sources(&mut without, &sources(&[("a.cpp", text)]));
        assert!(without.model().get("SdkOnly").is_none());
        assert!(without.model().get("Standalone").is_some());
    }

    #[test]
    fn test_generate_writes_output() {
        let fixture = SourceTreeFixture::new()
            .file(
                "foo.h",
                "RH_C_FUNCTION void RHC_DoThing(const char* name, int count, double values[3]);\n",
            )
            .build();
        let target = fixture.target();
        let result = generate(&Config::default(), &target, &GenerateOptions::default()).unwrap();

        assert!(result.success);
        assert!(result.written);
        assert_eq!(result.functions_emitted, 1);
        assert!(result.warnings.is_empty());

        let text = std::fs::read_to_string(&result.output_path).unwrap();
        assert_eq!(Some(&text), result.text.as_ref());
        assert!(text.contains(
            "internal static extern void RHC_DoThing([MarshalAs(UnmanagedType.LPStr)]string name, int count, [MarshalAs(UnmanagedType.LPArray, SizeConst = 3)]double[] values);"
        ));
        assert!(text.contains("[DllImport(\"lib\", CallingConvention = CallingConvention.Cdecl)]"));
    }

    #[test]
    fn test_target_defines_reach_the_filter() {
        let opts = GenerateOptions {
            check_only: true,
            ..GenerateOptions::default()
        };
        let sdk = SourceTreeFixture::new()
            .file("on_point.cpp", sample_point_source())
            .define("RHINO_SDK")
            .build();
        let result = generate(&Config::default(), &sdk.target(), &opts).unwrap();
        assert_eq!(result.functions_emitted, 3);
        let text = result.text.unwrap();
        assert!(text.contains(
            "internal static extern IntPtr ON_3dPoint_New(double x, double y, double z);"
        ));

        let standalone = SourceTreeFixture::new()
            .file("on_point.cpp", sample_point_source())
            .build();
        let result = generate(&Config::default(), &standalone.target(), &opts).unwrap();
        assert_eq!(result.functions_emitted, 2);
    }

    #[test]
    fn test_conflict_writes_nothing_and_keeps_old_output() {
        let fixture = SourceTreeFixture::new()
            .file("a.cpp", "RH_C_FUNCTION void F(int x);\n")
            .file("a.h", "RH_C_FUNCTION void F(double x);\n")
            .output("AutoNativeMethods.cs", "previous")
            .build();
        let target = fixture.target();
        let result = generate(&Config::default(), &target, &GenerateOptions::default()).unwrap();

        assert!(!result.success);
        assert!(!result.written);
        assert_eq!(result.functions_emitted, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(
            std::fs::read_to_string(target.output_path()).unwrap(),
            "previous"
        );
    }

    #[test]
    fn test_check_only_does_not_write() {
        let fixture = SourceTreeFixture::new()
            .file("a.cpp", "RH_C_FUNCTION void F(int x);\n")
            .build();
        let target = fixture.target();
        let opts = GenerateOptions {
            check_only: true,
            ..GenerateOptions::default()
        };
        let result = generate(&Config::default(), &target, &opts).unwrap();
        assert!(result.success);
        assert!(!result.written);
        assert!(result.text.is_some());
        assert!(!target.output_path().exists());
    }

    #[test]
    fn test_missing_source_directory() {
        let target = TargetConfig::new("/nonexistent/methodgen/src", "/nonexistent/out");
        let result = generate(&Config::default(), &target, &GenerateOptions::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.files_scanned, 0);
        assert!(result.errors[0].message.contains("does not exist"));
    }

    #[test]
    fn test_output_is_byte_identical_across_runs() {
        let fixture = SourceTreeFixture::new()
            .file("b.cpp", "RH_C_FUNCTION bool B(ON_3dPoint* pt);\n")
            .file("a.cpp", "RH_C_FUNCTION double A(const ON_Curve* crv, double t);\n")
            .file("c.h", "RH_C_FUNCTION void C(Mystery m);\n")
            .build();
        let target = fixture.target();
        let opts = GenerateOptions {
            check_only: true,
            ..GenerateOptions::default()
        };
        let first = generate(&Config::default(), &target, &opts).unwrap();
        let second = generate(&Config::default(), &target, &opts).unwrap();
        assert_eq!(first.text, second.text);
        assert_eq!(first.fingerprint, second.fingerprint);
        assert_eq!(first.warnings.len(), 1);

        let text = first.text.unwrap();
        let a = text.find("// a.cpp").unwrap();
        let b = text.find("// b.cpp").unwrap();
        let c = text.find("// c.h").unwrap();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_targets_are_independent() {
        let broken = SourceTreeFixture::new()
            .file("a.cpp", "#if defined(X)\nRH_C_FUNCTION void F();\n")
            .build();
        let healthy = SourceTreeFixture::new()
            .file("a.cpp", "RH_C_FUNCTION void G();\n")
            .build();
        let mut config = Config::default();
        config.targets = vec![broken.target(), healthy.target()];

        let results = generate_all(&config, &GenerateOptions::default()).unwrap();
        assert!(!results[0].success);
        assert!(results[1].success);
        assert!(results[1].written);
    }

    #[test]
    fn test_write_failure_does_not_stop_next_target() {
        let blocked = SourceTreeFixture::new()
            .file("a.cpp", "RH_C_FUNCTION void F();\n")
            .build();
        let healthy = SourceTreeFixture::new()
            .file("a.cpp", "RH_C_FUNCTION void G();\n")
            .build();
        let mut first = blocked.target();
        first.output_dir = blocked.source_dir().join("a.cpp");

        let mut config = Config::default();
        config.targets = vec![first, healthy.target()];

        let results = generate_all(&config, &GenerateOptions::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(!results[0].written);
        assert_eq!(results[0].fatal.len(), 1);
        assert!(matches!(results[0].fatal[0], FatalError::Io { .. }));
        assert!(results[0].errors[0].message.contains("failed to write file"));
        assert!(results[1].success);
        assert!(results[1].written);
    }
}
