//! `methodgen check` command

use anyhow::Result;

use crate::cli::GenerateArgs;

pub fn execute(args: GenerateArgs, color: bool) -> Result<bool> {
    super::generate::execute(args, true, color)
}
