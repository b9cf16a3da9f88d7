use miette::{Context, IntoDiagnostic, Result};
use std::fs;
use std::path::Path;

pub mod audio;
pub mod emz;
pub mod install;
pub mod names;
pub mod table;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Inspect and rewrite engine tables
    Table {
        #[command(subcommand)]
        command: table::TableCommands,
    },
    /// Handle compressed envelopes
    Emz {
        #[command(subcommand)]
        command: emz::EmzCommands,
    },
    /// Edit audio stream headers
    Audio {
        #[command(subcommand)]
        command: audio::AudioCommands,
    },
    /// Read obfuscated name lists
    Names {
        #[command(subcommand)]
        command: names::NamesCommands,
    },
    /// Install a mod package into a game directory
    Install(install::InstallArgs),
    /// Remove a previously installed mod package
    Uninstall(install::UninstallArgs),
}

impl Commands {
    pub fn handle(&self) -> Result<()> {
        match self {
            Commands::Table { command } => command.handle(),
            Commands::Emz { command } => command.handle(),
            Commands::Audio { command } => command.handle(),
            Commands::Names { command } => command.handle(),
            Commands::Install(install) => install.handle(),
            Commands::Uninstall(uninstall) => uninstall.handle(),
        }
    }
}

pub(crate) fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path)
        .into_diagnostic()
        .context(format!("reading {}", path.display()))
}

/// Write `data` to `path`, refusing to replace an existing file unless `overwrite` is set.
pub(crate) fn write(path: &Path, data: &[u8], overwrite: bool) -> Result<()> {
    let result = if overwrite {
        fs::write(path, data)
    } else {
        fs::File::create_new(path).and_then(|mut file| std::io::Write::write_all(&mut file, data))
    };
    result
        .into_diagnostic()
        .context(format!("writing {}", path.display()))
}
