pub mod canon;
pub mod diff;
pub mod dump;
pub mod info;

use miette::Result;
use modkit_formats::AnyTable;
use std::path::Path;

#[derive(clap::Subcommand)]
pub enum TableCommands {
    /// Show the format and entries of a table
    Info(info::InfoArgs),
    /// Write a table as JSON
    Dump(dump::DumpArgs),
    /// Sort a table and encode it again
    Canon(canon::CanonArgs),
    /// Compare two tables entry by entry
    Diff(diff::DiffArgs),
}

impl TableCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            TableCommands::Info(info) => info.handle(),
            TableCommands::Dump(dump) => dump.handle(),
            TableCommands::Canon(canon) => canon.handle(),
            TableCommands::Diff(diff) => diff.handle(),
        }
    }
}

pub(crate) fn open(path: &Path) -> Result<AnyTable> {
    let data = super::read(path)?;
    Ok(AnyTable::decode(&data)?)
}
