//! Installs mod packages into a game directory and takes them out again.
//!
//! An [`Installer`] reads a [`package::PackageSource`], copies raw files, merges table fragments
//! into the game's tables by index and registers new music tracks under freshly allocated cue
//! ids. Everything a run changes goes through a [`cache::FileCache`] that keeps the prior state of
//! every path, so a failed run puts the directory back the way it found it.
//!
//! ```no_run
//! # fn doit() -> modkit_install::error::Result<()> {
//! use modkit_install::package::DirectoryPackage;
//! use modkit_install::{Installer, InstallerOptions, Uninstaller};
//!
//! let options = InstallerOptions::builder().root("game").build();
//! let manifest = Installer::new(options.clone()).install(&DirectoryPackage::new("my_mod"))?;
//!
//! // later
//! Uninstaller::new(options).uninstall(&manifest)?;
//! # Ok(())
//! # }
//! ```
//!

pub mod allocator;
pub mod cache;
pub mod error;
pub mod installer;
pub mod manifest;
pub mod package;
pub mod path;

pub use installer::{Installer, InstallerOptions, Uninstaller};
pub use manifest::InstallManifest;
