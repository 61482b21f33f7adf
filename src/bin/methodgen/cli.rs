//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// methodgen - Generate P/Invoke declarations from exported C functions
#[derive(Parser)]
#[command(name = "methodgen")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan native sources and write the C# declaration files
    Generate(GenerateArgs),

    /// Run the whole pipeline and report problems without writing anything
    Check(GenerateArgs),
}

#[derive(Args)]
pub struct GenerateArgs {
    /// Directory with the exported C/C++ sources
    #[arg(requires = "output_dir")]
    pub source_dir: Option<PathBuf>,

    /// Directory the generated file is written to
    pub output_dir: Option<PathBuf>,

    /// Configuration file (methodgen.toml or methodgen.cfg.txt)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Namespace enclosing the generated class
    #[arg(long)]
    pub namespace: Option<String>,

    /// Link target of the main library
    #[arg(long)]
    pub library: Option<String>,

    /// Output file name of the main library
    #[arg(long)]
    pub output_file: Option<String>,

    /// Preprocessor symbol treated as defined (repeatable)
    #[arg(short = 'D', long = "define")]
    pub defines: Vec<String>,

    /// Source directory of a second, independent library
    #[arg(long)]
    pub ext_source_dir: Option<PathBuf>,

    /// Link target of the second library [default: librdk]
    #[arg(long, requires = "ext_source_dir")]
    pub ext_library: Option<String>,

    /// Output file name of the second library [default: AutoNativeMethodsRdk.cs]
    #[arg(long, requires = "ext_source_dir")]
    pub ext_output_file: Option<String>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Number of scanning threads
    #[arg(short, long)]
    pub jobs: Option<usize>,
}
