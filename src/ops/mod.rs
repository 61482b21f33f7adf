//! High-level operations.
//!
//! This module contains the implementation of methodgen commands.

pub mod discover;
pub mod generate;

pub use discover::{discovered_config, find_project_dirs, ProjectDirs};
pub use generate::{
    generate, generate_all, process_sources, scan_source, FileScan, GenerateOptions,
    GenerateResult,
};
