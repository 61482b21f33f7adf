//! Configuration file support for methodgen.
//!
//! Two formats are accepted:
//! - `methodgen.toml`: one `[[target]]` table per library, plus `[scan]` and
//!   `[mapping]` sections shared by all targets
//! - `methodgen.cfg.txt`: the legacy line format (source dir, output dir,
//!   then `using X;` and `define SYM` lines)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::bindings::{EmitOptions, MappingPolicy, ScanPolicy};
use crate::core::{CallingConvention, SymbolSet};

/// Name of the TOML configuration file.
pub const CONFIG_FILE: &str = "methodgen.toml";

/// Name of the legacy line-based configuration file.
pub const LEGACY_CONFIG_FILE: &str = "methodgen.cfg.txt";

/// Output file name when a target does not name one.
pub const DEFAULT_OUTPUT_FILE: &str = "AutoNativeMethods.cs";

/// Namespaces imported when Rhino declarations are enabled.
pub const RHINO_USINGS: &[&str] = &["Rhino", "Rhino.Geometry"];

/// methodgen configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Library targets, generated independently and in order
    #[serde(rename = "target")]
    pub targets: Vec<TargetConfig>,

    /// Declaration scanning settings
    pub scan: ScanConfig,

    /// Type mapping and output settings
    pub mapping: MappingConfig,
}

/// One library target: a source directory and the file generated from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Directory scanned (non-recursively) for `.cpp` and `.h` files
    pub source_dir: PathBuf,

    /// Directory the generated file is written to
    pub output_dir: PathBuf,

    /// Generated file name
    pub output_file: String,

    /// Link target embedded in every declaration
    pub library: String,

    /// Enclosing namespace of the generated class
    pub namespace: Option<String>,

    /// Preprocessor symbols treated as defined
    pub defines: Vec<String>,

    /// Extra `using` namespaces
    pub usings: Vec<String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        TargetConfig {
            source_dir: PathBuf::from("."),
            output_dir: PathBuf::from("."),
            output_file: DEFAULT_OUTPUT_FILE.to_string(),
            library: "lib".to_string(),
            namespace: None,
            defines: Vec::new(),
            usings: Vec::new(),
        }
    }
}

impl TargetConfig {
    pub fn new(source_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        TargetConfig {
            source_dir: source_dir.into(),
            output_dir: output_dir.into(),
            ..TargetConfig::default()
        }
    }

    pub fn output_path(&self) -> PathBuf {
        self.output_dir.join(&self.output_file)
    }

    pub fn symbols(&self) -> SymbolSet {
        self.defines.iter().map(String::as_str).collect()
    }

    /// Rebase relative directories onto `base`.
    fn rebase(&mut self, base: &Path) {
        if self.source_dir.is_relative() {
            self.source_dir = base.join(&self.source_dir);
        }
        if self.output_dir.is_relative() {
            self.output_dir = base.join(&self.output_dir);
        }
    }
}

/// Scanner settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Tokens that mark an exported function
    pub markers: Vec<String>,

    /// Maximum lines joined into one declaration
    pub lookahead: usize,

    /// Calling convention of every generated declaration
    pub convention: CallingConvention,
}

impl Default for ScanConfig {
    fn default() -> Self {
        let policy = ScanPolicy::default();
        ScanConfig {
            markers: policy.markers,
            lookahead: policy.lookahead,
            convention: CallingConvention::default(),
        }
    }
}

/// Mapping and output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Partial class the declarations are emitted into
    pub class_name: String,

    /// Class with library name constants; link targets become `Class.library`
    pub import_class: Option<String>,

    /// Import `Rhino` and `Rhino.Geometry`
    pub include_rhino_declarations: bool,

    #[serde(flatten)]
    pub policy: MappingPolicy,
}

impl Default for MappingConfig {
    fn default() -> Self {
        MappingConfig {
            class_name: "UnsafeNativeMethods".to_string(),
            import_class: None,
            include_rhino_declarations: true,
            policy: MappingPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// Relative target directories are resolved against the file's directory.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let mut config: Config = toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        if let Some(base) = path.parent() {
            for target in &mut config.targets {
                target.rebase(base);
            }
        }
        Ok(config)
    }

    /// Load either format, chosen by file name.
    pub fn load_any(path: &Path) -> Result<Self> {
        if path.file_name().is_some_and(|n| n == LEGACY_CONFIG_FILE) {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file: {}", path.display()))?;
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            Self::from_legacy(&text, base)
                .with_context(|| format!("failed to parse config file: {}", path.display()))
        } else {
            Self::load(path)
        }
    }

    /// Parse the legacy line format.
    ///
    /// A `using` line also turns off the Rhino namespace imports.
    pub fn from_legacy(text: &str, base: &Path) -> Result<Self> {
        let mut lines = text.lines().map(str::trim);
        let (Some(source), Some(output)) = (lines.next(), lines.next()) else {
            bail!("expected a source directory and an output directory on the first two lines");
        };
        if source.is_empty() || output.is_empty() {
            bail!("source and output directories must not be empty");
        }

        let mut config = Config::default();
        let mut target = TargetConfig::new(source, output);
        target.rebase(base);

        for line in lines {
            if line.starts_with("using") {
                config.mapping.include_rhino_declarations = false;
                target.usings.push(line.to_string());
            } else if let Some(define) = line.strip_prefix("define") {
                let define = define.trim();
                if !define.is_empty() {
                    target.defines.push(define.to_string());
                }
            }
        }

        config.targets.push(target);
        Ok(config)
    }

    /// Scanner policy for these settings.
    pub fn scan_policy(&self) -> ScanPolicy {
        ScanPolicy {
            markers: self.scan.markers.clone(),
            lookahead: self.scan.lookahead,
            annotations: vec![self.mapping.policy.array_annotation.clone()],
        }
    }

    /// Emitter options for `target`, without a fingerprint.
    pub fn emit_options(&self, target: &TargetConfig) -> EmitOptions {
        let mut usings: Vec<String> = Vec::new();
        if self.mapping.include_rhino_declarations {
            usings.extend(RHINO_USINGS.iter().map(|u| u.to_string()));
        }
        usings.extend(target.usings.iter().cloned());

        EmitOptions {
            library: target.library.clone(),
            namespace: target.namespace.clone(),
            class_name: self.mapping.class_name.clone(),
            import_class: self.mapping.import_class.clone(),
            usings,
            fingerprint: None,
        }
    }
}

/// Find a configuration file in `dir`, preferring the TOML format.
pub fn find_config(dir: &Path) -> Option<PathBuf> {
    [CONFIG_FILE, LEGACY_CONFIG_FILE]
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bindings::OutBufferPolicy;
    use tempfile::TempDir;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert!(config.targets.is_empty());
        assert_eq!(config.scan.markers, vec!["RH_C_FUNCTION".to_string()]);
        assert_eq!(config.scan.lookahead, 32);
        assert_eq!(config.mapping.class_name, "UnsafeNativeMethods");
        assert!(config.mapping.include_rhino_declarations);
        assert_eq!(config.mapping.policy.array_annotation, "ARRAY");
    }

    #[test]
    fn test_parse_toml() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE);
        std::fs::write(
            &path,
            r#"
[[target]]
source_dir = "c"
output_dir = "dotnet"
library = "lib"
namespace = "Rhino.Native"
defines = ["RHINO_SDK"]

[[target]]
source_dir = "c_rdk"
output_dir = "dotnet"
output_file = "AutoNativeMethodsRdk.cs"
library = "librdk"

[scan]
markers = ["RH_C_FUNCTION", "RDK_C_FUNCTION"]
convention = "stdcall"

[mapping]
import_class = "Import"
include_rhino_declarations = false
out_buffer = "following"
handles = ["HWND", "HRESULT_PTR"]

[mapping.value_structs]
MY_POINT = "Point3d"
"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.targets.len(), 2);
        assert_eq!(config.targets[0].source_dir, tmp.path().join("c"));
        assert_eq!(config.targets[0].output_file, DEFAULT_OUTPUT_FILE);
        assert_eq!(config.targets[0].symbols().len(), 1);
        assert_eq!(config.targets[1].library, "librdk");
        assert_eq!(
            config.targets[1].output_path(),
            tmp.path().join("dotnet").join("AutoNativeMethodsRdk.cs")
        );
        assert_eq!(config.scan.markers.len(), 2);
        assert_eq!(config.scan.convention, CallingConvention::Stdcall);
        assert_eq!(config.scan.lookahead, 32);
        assert_eq!(config.mapping.import_class.as_deref(), Some("Import"));
        assert_eq!(config.mapping.policy.out_buffer, OutBufferPolicy::Following);
        assert!(config.mapping.policy.handles.contains("HRESULT_PTR"));
        assert_eq!(
            config.mapping.policy.value_structs.get("MY_POINT").map(String::as_str),
            Some("Point3d")
        );
    }

    #[test]
    fn test_legacy_format() {
        let text = "src/c\nsrc/dotnet\nusing MyLib.Geometry;\ndefine OPENNURBS_BUILD\ndefine  RHINO_V6\n";
        let config = Config::from_legacy(text, Path::new("/work")).unwrap();
        let target = &config.targets[0];

        assert_eq!(target.source_dir, PathBuf::from("/work/src/c"));
        assert_eq!(target.output_dir, PathBuf::from("/work/src/dotnet"));
        assert_eq!(target.usings, vec!["using MyLib.Geometry;".to_string()]);
        assert_eq!(target.defines, vec!["OPENNURBS_BUILD", "RHINO_V6"]);
        assert!(!config.mapping.include_rhino_declarations);

        let options = config.emit_options(target);
        assert_eq!(options.usings, vec!["using MyLib.Geometry;".to_string()]);
    }

    #[test]
    fn test_legacy_format_requires_two_directories() {
        assert!(Config::from_legacy("only/one\n", Path::new(".")).is_err());
    }

    #[test]
    fn test_emit_options_include_rhino_usings() {
        let config = Config::default();
        let target = TargetConfig::new("c", "dotnet");
        let options = config.emit_options(&target);
        assert_eq!(options.usings, vec!["Rhino", "Rhino.Geometry"]);
        assert_eq!(options.library, "lib");
        assert_eq!(options.namespace, None);
    }

    #[test]
    fn test_find_config_prefers_toml() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join(LEGACY_CONFIG_FILE), "a\nb\n").unwrap();
        assert_eq!(
            find_config(tmp.path()),
            Some(tmp.path().join(LEGACY_CONFIG_FILE))
        );
        std::fs::write(tmp.path().join(CONFIG_FILE), "").unwrap();
        assert_eq!(find_config(tmp.path()), Some(tmp.path().join(CONFIG_FILE)));
    }
}
