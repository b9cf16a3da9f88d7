use clap::Args;
use itertools::Itertools;
use miette::{IntoDiagnostic, Result};
use modkit_formats::name_list::NameList;
use std::path::PathBuf;

#[derive(clap::Subcommand)]
pub enum NamesCommands {
    /// Print every name of a name list
    Dump(DumpArgs),
}

impl NamesCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            NamesCommands::Dump(dump) => dump.handle(),
        }
    }
}

#[derive(Args)]
pub struct DumpArgs {
    /// An input name list
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Print JSON instead of one `id<TAB>name` line per name
    #[arg(long, default_value_t = false)]
    json: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let names = NameList::decode(&super::read(&self.file)?)?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&names).into_diagnostic()?);
        } else if !names.names.is_empty() {
            println!(
                "{}",
                names
                    .names
                    .iter()
                    .map(|n| format!("{}\t{}", n.id, n.name))
                    .join("\n")
            );
        }
        Ok(())
    }
}
