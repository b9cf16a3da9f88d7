use clap::Args;
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct DumpArgs {
    /// An input table
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Target JSON file, stdout when missing
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl DumpArgs {
    pub fn handle(&self) -> Result<()> {
        let table = super::open(&self.file)?;
        let json = serde_json::to_string_pretty(&table).into_diagnostic()?;

        match &self.output {
            Some(output) => {
                info!("writing {}", output.display());
                crate::commands::write(output, json.as_bytes(), self.overwrite)
            }
            None => {
                println!("{json}");
                Ok(())
            }
        }
    }
}
