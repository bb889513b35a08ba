use std::io::{self, Write};

use clap_complete::{generate, Shell};

/// Print a completion file for the given shell.
///
/// Example: `portal completions zsh | source /dev/stdin`.
#[derive(Debug, clap::Parser)]
pub struct CompletionsCommand {
    shell: Shell,
}

impl CompletionsCommand {
    pub fn exec<T: clap::CommandFactory>(self) -> anyhow::Result<()> {
        self.write::<T>(&mut io::stdout())
    }

    pub fn write<T: clap::CommandFactory>(self, out: &mut dyn Write) -> anyhow::Result<()> {
        let Self { shell } = self;
        let mut cmd = T::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, out);
        out.flush()?;
        Ok(())
    }
}
