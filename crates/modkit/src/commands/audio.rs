use clap::Args;
use miette::{miette, Result};
use modkit_formats::audio_loop::{AudioFile, LoopInfo};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;

#[derive(clap::Subcommand)]
pub enum AudioCommands {
    /// Show the header chunks and loop points of a stream
    Info(InfoArgs),
    /// Set or clear the loop points of a stream
    Loop(LoopArgs),
}

impl AudioCommands {
    pub fn handle(&self) -> Result<()> {
        match self {
            AudioCommands::Info(info) => info.handle(),
            AudioCommands::Loop(looping) => looping.handle(),
        }
    }
}

#[derive(Args)]
pub struct InfoArgs {
    /// An input stream
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,
}

impl InfoArgs {
    pub fn handle(&self) -> Result<()> {
        let audio = AudioFile::parse(super::read(&self.file)?)?;
        let checksum = if audio.checksum_valid()? {
            "ok".green().to_string()
        } else {
            "bad".red().to_string()
        };

        println!(
            "version {:#06X}, header {} bytes, checksum {checksum}",
            audio.version(),
            audio.header_size()
        );
        for chunk in audio.chunks() {
            println!("{:>6X}  {:<4}  {} bytes", chunk.offset, chunk.tag_str(), chunk.len);
        }
        match audio.loop_info()? {
            Some(info) => println!(
                "loop frames {}..{}, {} pre samples, {} post samples",
                info.start_frame, info.end_frame, info.pre_samples, info.post_samples
            ),
            None => println!("no loop"),
        }
        Ok(())
    }
}

#[derive(Args)]
pub struct LoopArgs {
    /// An input stream
    #[arg(short, long, value_name = "FILE")]
    file: PathBuf,

    /// A target file, the input is replaced when missing
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// First frame of the loop
    #[arg(long, requires = "end", conflicts_with = "clear")]
    start: Option<u32>,

    /// Last frame of the loop
    #[arg(long, requires = "start")]
    end: Option<u32>,

    #[arg(long, default_value_t = 0x80)]
    pre_samples: u16,

    #[arg(long, default_value_t = 0)]
    post_samples: u16,

    /// Remove the loop chunk
    #[arg(long, default_value_t = false)]
    clear: bool,

    /// Allow overwriting the target
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl LoopArgs {
    pub fn handle(&self) -> Result<()> {
        let mut audio = AudioFile::parse(super::read(&self.file)?)?;

        match (self.start, self.end, self.clear) {
            (Some(start_frame), Some(end_frame), false) => {
                if end_frame < start_frame {
                    return Err(miette!("loop ends at {end_frame} before it starts at {start_frame}"));
                }
                audio.set_loop(LoopInfo {
                    start_frame,
                    end_frame,
                    pre_samples: self.pre_samples,
                    post_samples: self.post_samples,
                })?;
                info!(start_frame, end_frame, "set loop");
            }
            (None, None, true) => {
                if !audio.clear_loop()? {
                    info!("{} has no loop", self.file.display());
                    return Ok(());
                }
                info!("cleared loop");
            }
            _ => return Err(miette!("pass either --start and --end or --clear")),
        }

        let (target, overwrite) = match &self.output {
            Some(output) => (output, self.overwrite),
            None => (&self.file, true),
        };
        info!("writing {}", target.display());
        super::write(target, audio.as_bytes(), overwrite)
    }
}
