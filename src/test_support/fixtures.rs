//! Source tree fixtures written to temporary directories.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::util::config::TargetConfig;

/// Builder for a native source directory plus an output directory.
#[derive(Debug, Clone, Default)]
pub struct SourceTreeFixture {
    /// Source files (name relative to the source dir -> content).
    files: Vec<(String, String)>,
    /// Files already present in the output dir.
    outputs: Vec<(String, String)>,
    defines: Vec<String>,
}

impl SourceTreeFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source file.
    pub fn file(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.files.push((name.into(), content.into()));
        self
    }

    /// Add a file to the output directory, e.g. a previously generated one.
    pub fn output(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.outputs.push((name.into(), content.into()));
        self
    }

    /// Treat a preprocessor symbol as defined for the fixture's target.
    pub fn define(mut self, symbol: impl Into<String>) -> Self {
        self.defines.push(symbol.into());
        self
    }

    /// Write the fixture under a fresh temporary directory.
    pub fn build(self) -> SourceTree {
        let root = TempDir::new().expect("failed to create temp dir");
        let source_dir = root.path().join("src");
        let output_dir = root.path().join("out");
        std::fs::create_dir_all(&source_dir).expect("failed to create source dir");

        for (name, content) in &self.files {
            std::fs::write(source_dir.join(name), content).expect("failed to write source");
        }
        if !self.outputs.is_empty() {
            std::fs::create_dir_all(&output_dir).expect("failed to create output dir");
        }
        for (name, content) in &self.outputs {
            std::fs::write(output_dir.join(name), content).expect("failed to write output");
        }

        SourceTree {
            root,
            source_dir,
            output_dir,
            defines: self.defines,
        }
    }
}

/// A fixture written to disk; removed when dropped.
#[derive(Debug)]
pub struct SourceTree {
    root: TempDir,
    source_dir: PathBuf,
    output_dir: PathBuf,
    defines: Vec<String>,
}

impl SourceTree {
    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn source_dir(&self) -> &Path {
        &self.source_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// A target reading this tree's sources and writing the default output file.
    pub fn target(&self) -> TargetConfig {
        let mut target = TargetConfig::new(&self.source_dir, &self.output_dir);
        target.defines = self.defines.clone();
        target
    }
}

/// A small exported-function file in the style of the RhinoCommon C layer.
pub fn sample_point_source() -> &'static str {
    r#"#include "StdAfx.h"

RH_C_FUNCTION ON_3dPoint* ON_3dPoint_New(double x, double y, double z)
{
  return new ON_3dPoint(x, y, z);
}

RH_C_FUNCTION void ON_3dPoint_Delete(ON_3dPoint* pPoint)
{
  delete pPoint;
}

#if defined(RHINO_SDK)
RH_C_FUNCTION bool ON_3dPoint_IsValid(const ON_3dPoint* pConstPoint)
{
  return pConstPoint && pConstPoint->IsValid();
}
#endif
"#
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_layout() {
        let tree = SourceTreeFixture::new()
            .file("a.cpp", "int x;")
            .output("Old.cs", "old")
            .define("RHINO_SDK")
            .build();
        assert!(tree.source_dir().join("a.cpp").is_file());
        assert!(tree.output_dir().join("Old.cs").is_file());
        assert!(tree.path().is_dir());

        let target = tree.target();
        assert_eq!(target.source_dir, tree.source_dir());
        assert_eq!(target.defines, vec!["RHINO_SDK".to_string()]);
    }
}
