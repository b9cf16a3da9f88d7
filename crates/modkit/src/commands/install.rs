use clap::Args;
use miette::{IntoDiagnostic, Result};
use modkit_install::package::DirectoryPackage;
use modkit_install::{InstallManifest, Installer, InstallerOptions, Uninstaller};
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tracing::info;

#[derive(Args)]
pub struct InstallArgs {
    /// An unpacked mod package
    #[arg(short, long, value_name = "DIR")]
    package: PathBuf,

    /// The game directory
    #[arg(short, long, value_name = "DIR", env = "MODKIT_ROOT")]
    root: PathBuf,

    /// Where to write the install manifest, stdout when missing
    #[arg(short, long, value_name = "FILE")]
    manifest: Option<PathBuf>,

    /// Locales that get names for new music
    #[arg(short, long, value_name = "LOCALE", value_delimiter = ',', default_value = "en")]
    locales: Vec<String>,

    /// Allow replacing existing game files
    #[arg(long, default_value_t = false)]
    overwrite: bool,
}

impl InstallArgs {
    pub fn handle(&self) -> Result<()> {
        let options = InstallerOptions::builder()
            .root(&self.root)
            .locales(self.locales.clone())
            .overwrite(self.overwrite)
            .build();

        let manifest = Installer::new(options).install(&DirectoryPackage::new(&self.package))?;
        info!(
            files = manifest.created_files.len(),
            entries = manifest.table_entries.len(),
            tracks = manifest.cue_ids.len(),
            "installed {}",
            self.package.display()
        );

        let json = serde_json::to_string_pretty(&manifest).into_diagnostic()?;
        match &self.manifest {
            Some(path) => super::write(path, json.as_bytes(), true),
            None => {
                println!("{json}");
                Ok(())
            }
        }
    }
}

#[derive(Args)]
pub struct UninstallArgs {
    /// The game directory
    #[arg(short, long, value_name = "DIR", env = "MODKIT_ROOT")]
    root: PathBuf,

    /// Manifest written by the install
    #[arg(short, long, value_name = "FILE")]
    manifest: PathBuf,

    /// Locales the package was installed with
    #[arg(short, long, value_name = "LOCALE", value_delimiter = ',', default_value = "en")]
    locales: Vec<String>,
}

impl UninstallArgs {
    pub fn handle(&self) -> Result<()> {
        let manifest: InstallManifest =
            serde_json::from_slice(&super::read(&self.manifest)?).into_diagnostic()?;
        let options = InstallerOptions::builder()
            .root(&self.root)
            .locales(self.locales.clone())
            .build();

        let report = Uninstaller::new(options).uninstall(&manifest)?;
        for path in &report.restored {
            println!("🔃 {}", path.blue());
        }
        for path in &report.removed {
            println!("❌ {}", path.red());
        }
        for (path, reason) in &report.skipped {
            println!("⚠️ {}: {}", path.yellow(), reason);
        }
        info!(%report, "uninstalled");
        Ok(())
    }
}
