//! Install and uninstall runs
//!
//! A run stages every change in a [`FileCache`] and commits at the end. When staging or committing
//! fails, everything the run already wrote is rolled back and the error carries the
//! [`RestoreReport`].

use bon::Builder;
use modkit_formats::audio_loop::AudioFile;
use modkit_formats::cue::{CueEntry, CueTable};
use modkit_formats::lookup::{BgmLookupEntry, BgmLookupExt, BgmLookupTable};
use modkit_formats::message::{keyed_name, MessageTable, MessageTableExt};
use modkit_formats::{AnyTable, TableKind};
use std::path::PathBuf;
use std::slice;
use tracing::{debug, info, instrument, warn};

use crate::allocator::{IdAllocator, IdRegistry, KeyedMessages};
use crate::cache::{FileCache, PathState, RestoreReport};
use crate::error::{Error, Result};
use crate::manifest::{InstallManifest, InstalledEntry};
use crate::package::{EntryRole, PackageSource};
use crate::path::CanonicalPath;

/// Largest file kept as a whole in memory for rollback
pub const DEFAULT_BACKUP_CEILING: u64 = 64 * 1024 * 1024;

/// Settings shared by installs and uninstalls
#[derive(Debug, Clone, Builder)]
pub struct InstallerOptions {
    /// Game directory everything is installed into
    #[builder(into)]
    pub root: PathBuf,

    #[builder(default = DEFAULT_BACKUP_CEILING)]
    pub backup_ceiling: u64,

    /// First cue id handed out to new music
    #[builder(default = 500)]
    pub cue_floor: u32,

    #[builder(default = 9999)]
    pub cue_ceiling: u32,

    /// Locales whose message tables name new music
    #[builder(default = vec!["en".to_string()])]
    pub locales: Vec<String>,

    #[builder(into, default = String::from("data/sound/cue.bin"))]
    pub cue_table: String,

    #[builder(into, default = String::from("data/sound/bgm_lookup.bin"))]
    pub lookup_table: String,

    /// Message table per locale, `{locale}` is replaced by the locale
    #[builder(into, default = String::from("data/msg/{locale}/bgm_name.msg"))]
    pub message_table: String,

    /// Prefix of the message names bound to a cue id
    #[builder(into, default = String::from("BGM_NAME_"))]
    pub message_prefix: String,

    /// Directory new music is written to, as `<cue id>.hca`
    #[builder(into, default = String::from("data/sound/bgm"))]
    pub bgm_dir: String,

    /// Replace existing files with package files
    #[builder(default)]
    pub overwrite: bool,
}

struct RegistryPaths {
    cue: CanonicalPath,
    lookup: CanonicalPath,
    messages: Vec<CanonicalPath>,
}

impl RegistryPaths {
    fn new(options: &InstallerOptions) -> Result<Self> {
        Ok(Self {
            cue: CanonicalPath::new(&options.cue_table)?,
            lookup: CanonicalPath::new(&options.lookup_table)?,
            messages: options
                .locales
                .iter()
                .map(|locale| CanonicalPath::new(options.message_table.replace("{locale}", locale)))
                .collect::<Result<_>>()?,
        })
    }
}

fn rolled_back(cache: &mut FileCache, source: Error) -> Error {
    let report = cache.rollback();
    warn!(%report, "rolled back");
    Error::RolledBack {
        source: Box::new(source),
        report,
    }
}

fn not_cached(path: &CanonicalPath) -> Error {
    Error::NotCached(path.to_string())
}

/// One install run
#[derive(Debug)]
pub struct Installer {
    options: InstallerOptions,
    cache: FileCache,
    allocator: IdAllocator,
    manifest: InstallManifest,
}

impl Installer {
    pub fn new(options: InstallerOptions) -> Self {
        Self {
            cache: FileCache::new(&options.root, options.backup_ceiling),
            allocator: IdAllocator::new(options.cue_floor, options.cue_ceiling),
            manifest: InstallManifest::default(),
            options,
        }
    }

    /// Install every entry of `package`, returns what was added.
    #[instrument(skip_all, fields(root = %self.options.root.display()), err)]
    pub fn install(mut self, package: &impl PackageSource) -> Result<InstallManifest> {
        match self.stage(package).and_then(|_| self.cache.commit()) {
            Ok(written) => {
                info!(files = written.len(), "installed");
                Ok(self.manifest)
            }
            Err(source) => Err(rolled_back(&mut self.cache, source)),
        }
    }

    fn stage(&mut self, package: &impl PackageSource) -> Result<()> {
        for entry in package.entries()? {
            match entry.role()? {
                EntryRole::File(target) => self.install_file(&target, entry.data)?,
                EntryRole::Table(target) => self.merge_table(&target, &entry.data)?,
                EntryRole::Music { title } => self.install_music(&title, entry.data)?,
                EntryRole::Unknown => warn!(path = %entry.path, "ignoring package entry"),
            }
        }
        Ok(())
    }

    fn install_file(&mut self, target: &CanonicalPath, data: Vec<u8>) -> Result<()> {
        let existed = self.cache.exists(target);
        if existed && !self.options.overwrite {
            return Err(Error::FileExists(target.to_string()));
        }

        self.cache.write_stream(target, data)?;
        if !existed {
            self.manifest.record_file(target.as_str());
        }
        debug!(path = %target, existed, "staged file");
        Ok(())
    }

    fn merge_table(&mut self, target: &CanonicalPath, data: &[u8]) -> Result<()> {
        let fragment = AnyTable::decode(data)?;
        let kind = fragment.kind();
        let indices = fragment.content_indices();

        self.cache.load(target, kind)?;
        self.cache.touch_records(target, &indices)?;

        let installed = {
            let table = self.cache.table(target).ok_or_else(|| not_cached(target))?;
            indices
                .iter()
                .filter(|index| !self.manifest.has_entry(target.as_str(), index))
                .map(|index| -> Result<InstalledEntry> {
                    let prior = if table.contains(index) {
                        Some(table.select(slice::from_ref(index)).encode()?)
                    } else {
                        None
                    };
                    Ok(InstalledEntry {
                        path: target.as_str().to_string(),
                        index: index.clone(),
                        prior,
                    })
                })
                .collect::<Result<Vec<_>>>()?
        };

        let merged = self.cache.table_mut(target, kind)?.merge(&fragment)?;
        debug!(
            path = %target,
            %kind,
            count = merged.len(),
            replaced = installed.iter().filter(|e| e.prior.is_some()).count(),
            "staged table entries"
        );
        for entry in installed {
            self.manifest.record_entry(entry);
        }
        Ok(())
    }

    fn install_music(&mut self, title: &str, data: Vec<u8>) -> Result<()> {
        let audio = AudioFile::parse(data)?;
        let paths = RegistryPaths::new(&self.options)?;

        self.cache.load(&paths.cue, TableKind::Cue)?;
        self.cache.load(&paths.lookup, TableKind::BgmLookup)?;
        for path in &paths.messages {
            self.cache.load(path, TableKind::Message)?;
        }

        let id = {
            let cues = self
                .cache
                .model_ref::<CueTable>(&paths.cue)
                .ok_or_else(|| not_cached(&paths.cue))?;
            let lookup = self
                .cache
                .model_ref::<BgmLookupTable>(&paths.lookup)
                .ok_or_else(|| not_cached(&paths.lookup))?;
            let messages = paths
                .messages
                .iter()
                .map(|path| {
                    self.cache
                        .model_ref::<MessageTable>(path)
                        .map(|table| KeyedMessages {
                            table,
                            prefix: &self.options.message_prefix,
                        })
                        .ok_or_else(|| not_cached(path))
                })
                .collect::<Result<Vec<_>>>()?;

            let mut registries: Vec<&dyn IdRegistry> = Vec::with_capacity(2 + messages.len());
            registries.push(cues);
            registries.push(lookup);
            registries.extend(messages.iter().map(|m| m as &dyn IdRegistry));
            self.allocator.allocate(&registries)?
        };

        self.cache.touch_records(&paths.cue, &[id.to_string()])?;
        self.cache
            .model::<CueTable>(&paths.cue)?
            .upsert(CueEntry::stream(id, title));

        let slot = self
            .cache
            .model_ref::<BgmLookupTable>(&paths.lookup)
            .map(|lookup| lookup.next_slot())
            .unwrap_or_default();
        self.cache.touch_records(&paths.lookup, &[slot.to_string()])?;
        self.cache
            .model::<BgmLookupTable>(&paths.lookup)?
            .upsert(BgmLookupEntry {
                slot,
                cue_id: id,
                name: Some(title.to_string()),
            });

        let name = keyed_name(&self.options.message_prefix, id);
        for path in &paths.messages {
            self.cache.touch_records(path, &[name.clone()])?;
            self.cache
                .model::<MessageTable>(path)?
                .upsert_keyed(&self.options.message_prefix, id, title);
        }

        let target = CanonicalPath::new(format!("{}/{id}.hca", self.options.bgm_dir))?;
        self.install_file(&target, audio.into_bytes())?;
        self.manifest.cue_ids.push(id);

        info!(id, slot, title, "staged music track");
        Ok(())
    }
}

/// One uninstall run
#[derive(Debug)]
pub struct Uninstaller {
    options: InstallerOptions,
    cache: FileCache,
}

impl Uninstaller {
    pub fn new(options: InstallerOptions) -> Self {
        Self {
            cache: FileCache::new(&options.root, options.backup_ceiling),
            options,
        }
    }

    /// Undo everything `manifest` lists. Things that are already gone are skipped.
    #[instrument(skip_all, fields(root = %self.options.root.display()), err)]
    pub fn uninstall(mut self, manifest: &InstallManifest) -> Result<RestoreReport> {
        match self.stage(manifest).and_then(|_| self.cache.commit()) {
            Ok(written) => {
                let mut report = RestoreReport::default();
                for (path, state) in written {
                    match state {
                        PathState::Removed => report.removed.push(path.to_string()),
                        _ => report.restored.push(path.to_string()),
                    }
                }
                info!(%report, "uninstalled");
                Ok(report)
            }
            Err(source) => Err(rolled_back(&mut self.cache, source)),
        }
    }

    fn stage(&mut self, manifest: &InstallManifest) -> Result<()> {
        if !manifest.cue_ids.is_empty() {
            self.remove_cues(&manifest.cue_ids)?;
        }

        for entry in &manifest.table_entries {
            let path = CanonicalPath::new(&entry.path)?;
            if !self.cache.exists(&path) {
                warn!(%path, "table is gone, skipping");
                continue;
            }
            let kind = self.cache.load_existing(&path)?;
            let index = slice::from_ref(&entry.index);
            self.cache.touch_records(&path, index)?;

            match &entry.prior {
                Some(bytes) => {
                    let prior = AnyTable::decode_as(kind, bytes)?;
                    self.cache.table_mut(&path, kind)?.restore(&prior, index)?;
                    debug!(%path, index = %entry.index, "restored replaced entry");
                }
                None => {
                    if !self.cache.table_mut(&path, kind)?.remove_index(&entry.index) {
                        debug!(%path, index = %entry.index, "entry already removed");
                    }
                }
            }
        }

        for file in &manifest.created_files {
            let path = CanonicalPath::new(file)?;
            if self.cache.exists(&path) {
                self.cache.remove_stream(&path)?;
            } else {
                warn!(%path, "file is gone, skipping");
            }
        }
        Ok(())
    }

    fn remove_cues(&mut self, ids: &[u32]) -> Result<()> {
        let paths = RegistryPaths::new(&self.options)?;

        if self.cache.exists(&paths.cue) {
            let indices = ids.iter().map(u32::to_string).collect::<Vec<_>>();
            self.cache.load(&paths.cue, TableKind::Cue)?;
            self.cache.touch_records(&paths.cue, &indices)?;
            let cues = self.cache.model::<CueTable>(&paths.cue)?;
            for index in &indices {
                cues.remove(index);
            }
        }

        if self.cache.exists(&paths.lookup) {
            self.cache.load(&paths.lookup, TableKind::BgmLookup)?;
            let slots = self
                .cache
                .model_ref::<BgmLookupTable>(&paths.lookup)
                .map(|lookup| {
                    lookup
                        .entries
                        .iter()
                        .filter(|entry| ids.contains(&entry.cue_id))
                        .map(|entry| entry.slot.to_string())
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            self.cache.touch_records(&paths.lookup, &slots)?;
            self.cache
                .model::<BgmLookupTable>(&paths.lookup)?
                .entries
                .retain(|entry| !ids.contains(&entry.cue_id));
        }

        let names = ids
            .iter()
            .map(|id| keyed_name(&self.options.message_prefix, *id))
            .collect::<Vec<_>>();
        for path in &paths.messages {
            if !self.cache.exists(path) {
                continue;
            }
            self.cache.load(path, TableKind::Message)?;
            self.cache.touch_records(path, &names)?;
            let messages = self.cache.model::<MessageTable>(path)?;
            for name in &names {
                messages.remove(name);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use modkit_formats::chara::{CharaEntry, CharaTable, DlcFlags};
    use modkit_formats::cue::{CueEntry, CueTable};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tracing_test::traced_test;

    use super::{InstallerOptions, Uninstaller};
    use crate::cache::Backup;
    use crate::error::Result;
    use crate::manifest::{InstallManifest, InstalledEntry};
    use crate::path::CanonicalPath;

    fn chara(id: u32, short_name: &str) -> CharaEntry {
        CharaEntry {
            id,
            short_name: short_name.into(),
            dlc: DlcFlags::empty(),
            model_path: None,
        }
    }

    #[traced_test]
    #[test]
    fn uninstall_keeps_record_backups() -> Result<()> {
        let dir = tempfile::tempdir().unwrap();
        let cue = CanonicalPath::new("data/sound/cue.bin")?;
        let list = CanonicalPath::new("data/system/chara_list.cms")?;
        let cues = CueTable::new(vec![
            CueEntry::stream(500, "title"),
            CueEntry::stream(501, "rival"),
        ]);
        let charas = CharaTable::new(vec![chara(0, "GOK"), chara(1, "VEG")]);
        fs::create_dir_all(dir.path().join("data/sound")).unwrap();
        fs::create_dir_all(dir.path().join("data/system")).unwrap();
        fs::write(cue.to_path(dir.path()), cues.encode()?).unwrap();
        fs::write(list.to_path(dir.path()), charas.encode()?).unwrap();

        let manifest = InstallManifest {
            table_entries: vec![InstalledEntry {
                path: list.to_string(),
                index: "1".into(),
                prior: None,
            }],
            cue_ids: vec![501],
            ..Default::default()
        };

        // both tables are above a zero byte ceiling
        let options = InstallerOptions::builder()
            .root(dir.path())
            .backup_ceiling(0)
            .build();
        let mut uninstaller = Uninstaller::new(options);
        uninstaller.stage(&manifest)?;
        assert!(matches!(
            uninstaller.cache.backup(&cue),
            Some(Backup::Records { touched, .. }) if *touched == ["501".to_string()]
        ));
        assert!(matches!(
            uninstaller.cache.backup(&list),
            Some(Backup::Records { touched, .. }) if *touched == ["1".to_string()]
        ));

        uninstaller.cache.commit()?;
        let removed = CueTable::decode(&fs::read(cue.to_path(dir.path())).unwrap())?;
        assert_eq!(removed.entries, vec![CueEntry::stream(500, "title")]);

        let report = uninstaller.cache.rollback();
        assert_eq!(
            report.restored,
            vec![
                "data/system/chara_list.cms".to_string(),
                "data/sound/cue.bin".to_string()
            ]
        );
        assert_eq!(
            CueTable::decode(&fs::read(cue.to_path(dir.path())).unwrap())?,
            cues
        );
        assert_eq!(
            CharaTable::decode(&fs::read(list.to_path(dir.path())).unwrap())?,
            charas
        );
        Ok(())
    }
}
