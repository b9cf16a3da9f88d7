use clap::Args;
use miette::Result;
use modkit_formats::emz::{self, EmzPayload};
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Subcommand)]
pub enum EmzCommands {
    /// Decompress an envelope
    Unwrap(UnwrapArgs),
    /// Compress a bundle or material table into an envelope
    Wrap(WrapArgs),
}

impl EmzCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            EmzCommands::Unwrap(unwrap) => unwrap.handle(),
            EmzCommands::Wrap(wrap) => wrap.handle(),
        }
    }
}

#[derive(Args)]
pub struct UnwrapArgs {
    /// An input envelope
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target file for the payload
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl UnwrapArgs {
    pub fn handle(&self) -> Result<()> {
        let payload = emz::unwrap(&super::read(&self.file)?)?;
        match EmzPayload::sniff(&payload)? {
            EmzPayload::Bundle(bundle) => info!(files = bundle.files.len(), "bundle payload"),
            EmzPayload::Material(table) => info!(entries = table.len(), "material payload"),
        }

        info!("writing {}", self.output.display());
        super::write(&self.output, &payload, self.overwrite)
    }
}

#[derive(Args)]
pub struct WrapArgs {
    /// An input bundle or material table
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target envelope
    #[arg(short, long, value_name = "FILE")]
    output: PathBuf,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl WrapArgs {
    pub fn handle(&self) -> Result<()> {
        let payload = super::read(&self.file)?;
        EmzPayload::sniff(&payload)?;
        let out = emz::wrap(&payload)?;

        info!(before = payload.len(), after = out.len(), "writing {}", self.output.display());
        super::write(&self.output, &out, self.overwrite)
    }
}
