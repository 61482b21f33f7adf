//! Locating a RhinoCommon checkout when no configuration is given.

use std::path::{Path, PathBuf};

use crate::util::config::{Config, TargetConfig, DEFAULT_OUTPUT_FILE};

/// Name of the project directory searched for (compared case-insensitively).
pub const PROJECT_DIR: &str = "RhinoCommon";

/// Output file of the extension (RDK) target.
pub const RDK_OUTPUT_FILE: &str = "AutoNativeMethodsRdk.cs";

/// Native and managed directories of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirs {
    /// Directory holding the exported C sources
    pub native: PathBuf,

    /// Directory the generated file goes into
    pub managed: PathBuf,
}

/// Walk up from `start` to the first `RhinoCommon` directory holding both a
/// native directory (`c`, or `c_rdk` when `rdk` is set) and `dotnet`.
pub fn find_project_dirs(start: &Path, rdk: bool) -> Option<ProjectDirs> {
    let native_name = if rdk { "c_rdk" } else { "c" };

    for dir in start.ancestors() {
        let is_project = dir
            .file_name()
            .is_some_and(|name| name.to_string_lossy().eq_ignore_ascii_case(PROJECT_DIR));
        if !is_project {
            continue;
        }

        let native = dir.join(native_name);
        let managed = dir.join("dotnet");
        if native.is_dir() && managed.is_dir() {
            tracing::debug!("found project directory {}", dir.display());
            return Some(ProjectDirs { native, managed });
        }
    }
    None
}

/// Class holding the library name constants of a RhinoCommon project.
pub const IMPORT_CLASS: &str = "Import";

/// Default targets for a discovered project: the core library, plus the
/// RDK library when its sources exist. Link targets go through the
/// project's `Import` constants.
pub fn discovered_config(start: &Path) -> Option<Config> {
    let core = find_project_dirs(start, false)?;

    let mut main = TargetConfig::new(core.native, core.managed);
    main.output_file = DEFAULT_OUTPUT_FILE.to_string();
    main.library = "lib".to_string();

    let mut config = Config::default();
    config.mapping.import_class = Some(IMPORT_CLASS.to_string());
    config.targets.push(main);

    match find_project_dirs(start, true) {
        Some(rdk) => {
            let mut ext = TargetConfig::new(rdk.native, rdk.managed);
            ext.output_file = RDK_OUTPUT_FILE.to_string();
            ext.library = "librdk".to_string();
            config.targets.push(ext);
        }
        None => tracing::info!(
            "no RDK sources found; this is expected for a standalone openNURBS build"
        ),
    }

    Some(config)
}
