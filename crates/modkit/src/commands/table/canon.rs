use clap::Args;
use miette::Result;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct CanonArgs {
    /// An input table
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// Target file, the input is replaced when missing
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl CanonArgs {
    pub fn handle(&self) -> Result<()> {
        let data = crate::commands::read(&self.file)?;
        let mut table = modkit_formats::AnyTable::decode(&data)?;
        table.canonicalize()?;
        let out = table.encode()?;

        if self.output.is_none() && out == data {
            info!("{} is already canonical", self.file.display());
            return Ok(());
        }

        let (target, overwrite) = match &self.output {
            Some(output) => (output, self.overwrite),
            None => (&self.file, true),
        };
        info!(before = data.len(), after = out.len(), "writing {}", target.display());
        crate::commands::write(target, &out, overwrite)
    }
}
