//! Shell completion scripts for the `kyc` binary.
//!
//! Save the output where your shell looks for completions, e.g.
//! `kyc completions zsh > ~/.zfunc/_kyc`.

use std::io;

use clap::CommandFactory;
use clap_complete::Shell;

/// Generate shell completion scripts
#[derive(Debug, clap::Parser)]
pub struct Complete {
    /// Shell to generate completions for
    #[arg(value_enum)]
    shell: Shell,
}

impl Complete {
    /// Writes the completion script to stdout.
    pub fn run(self) {
        let mut cmd = crate::cli::Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "kyc", &mut io::stdout());
    }
}
