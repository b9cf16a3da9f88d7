use clap::Args;
use itertools::Itertools;
use miette::Result;
use owo_colors::OwoColorize;
use std::path::PathBuf;

#[derive(Args)]
pub struct InfoArgs {
    /// An input table
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Only print the summary line
    #[arg(short, long, default_value_t = false)]
    summary: bool,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let table = super::open(&self.file)?;
        let kind = table.kind();

        println!(
            "{} {} ({}), {} entries",
            self.file.display(),
            kind.bold(),
            kind.signature_str(),
            table.len()
        );
        if self.summary {
            return Ok(());
        }

        let rows = table
            .rows()
            .into_iter()
            .map(|row| format!("{:>8}  {}", row.sort_id.dimmed(), row.index))
            .join("\n");
        if !rows.is_empty() {
            println!("{rows}");
        }
        Ok(())
    }
}
