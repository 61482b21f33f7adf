//! `methodgen generate` command

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::cli::GenerateArgs;
use methodgen::ops::discover::{discovered_config, RDK_OUTPUT_FILE};
use methodgen::ops::generate::{generate_all, GenerateOptions, GenerateResult};
use methodgen::util::config::{find_config, Config, TargetConfig};

/// Report printed with `--json`.
#[derive(Serialize)]
struct RunReport<'a> {
    success: bool,
    check_only: bool,
    targets: &'a [GenerateResult],
}

pub fn execute(args: GenerateArgs, check_only: bool, color: bool) -> Result<bool> {
    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let config = resolve_config(&args, &cwd)?;

    let opts = GenerateOptions {
        check_only,
        jobs: args.jobs,
    };
    let results = generate_all(&config, &opts)?;
    let success = results.iter().all(|r| r.success);

    if args.json {
        let report = RunReport {
            success,
            check_only,
            targets: &results,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for result in &results {
            print_result(result, check_only, color);
        }
    }

    Ok(success)
}

/// Positional directories > `--config` > config file in the current
/// directory > project discovery (from the current directory, then from
/// the executable's directory). Command-line options then override.
///
/// A config file still supplies `[scan]` and `[mapping]` settings when the
/// directories are given on the command line.
fn resolve_config(args: &GenerateArgs, cwd: &Path) -> Result<Config> {
    let config_path = args.config.clone().or_else(|| find_config(cwd));
    let mut config = match &config_path {
        Some(path) => {
            tracing::debug!("using configuration {}", path.display());
            Config::load_any(path)?
        }
        None if args.source_dir.is_some() => Config::default(),
        None => match discovered_config(cwd).or_else(discover_from_exe) {
            Some(config) => config,
            None => bail!(
                "unable to locate project directories; pass SOURCE_DIR and OUTPUT_DIR or a --config file"
            ),
        },
    };

    if let (Some(source), Some(output)) = (&args.source_dir, &args.output_dir) {
        config.targets = vec![TargetConfig::new(cwd.join(source), cwd.join(output))];
    }
    if config.targets.is_empty() {
        bail!("no targets configured");
    }

    if let Some(ext_source) = &args.ext_source_dir {
        let mut ext = TargetConfig::new(cwd.join(ext_source), config.targets[0].output_dir.clone());
        ext.library = args.ext_library.clone().unwrap_or_else(|| "librdk".to_string());
        ext.output_file = args
            .ext_output_file
            .clone()
            .unwrap_or_else(|| RDK_OUTPUT_FILE.to_string());
        config.targets.truncate(1);
        config.targets.push(ext);
    }

    if let Some(main) = config.targets.first_mut() {
        if let Some(library) = &args.library {
            main.library = library.clone();
        }
        if let Some(output_file) = &args.output_file {
            main.output_file = output_file.clone();
        }
    }
    for target in &mut config.targets {
        if args.namespace.is_some() {
            target.namespace = args.namespace.clone();
        }
        target.defines.extend(args.defines.iter().cloned());
    }

    Ok(config)
}

/// Discovery from the directory of the running executable.
fn discover_from_exe() -> Option<Config> {
    let exe = std::env::current_exe().ok()?;
    discovered_config(exe.parent()?)
}

fn print_result(result: &GenerateResult, check_only: bool, color: bool) {
    for warning in &result.warnings {
        eprint!("{}", warning.format(color));
    }
    for (fatal, diagnostic) in result.fatal.iter().zip(&result.errors) {
        eprintln!("{:?}", miette::Report::new(fatal.clone()));
        if let Some(location) = diagnostic.location() {
            eprintln!("  --> {}", location);
        }
        for ctx in &diagnostic.context {
            eprintln!("  = {}", ctx);
        }
    }

    if !result.success {
        eprintln!(
            "error: generation for `{}` failed; {} was not written",
            result.library,
            result.output_path.display()
        );
    } else if check_only {
        eprintln!(
            "     Checked `{}`: {} declaration(s) from {} file(s), {} warning(s)",
            result.library,
            result.functions_emitted,
            result.files_scanned,
            result.warnings.len()
        );
    } else {
        eprintln!(
            "    Finished `{}` -> {} ({} declaration(s))",
            result.library,
            result.output_path.display(),
            result.functions_emitted
        );
    }
}
