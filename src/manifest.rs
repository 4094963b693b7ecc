//! Manifest loading - ingest the output of a volume/filesystem walker
//!
//! A manifest is a JSON description of what a walker found in one or more
//! images. The loader replays it against a [`CaseDb`] strictly
//! parent-before-child: image, volume systems, volumes, filesystems, then
//! the files of each filesystem in walker order.
//!
//! Each image is loaded in its own transaction and each file in its own
//! savepoint, so one bad file can be rolled back without losing the image.

use std::path::Path;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use crate::{Error, Result};
use crate::container::{FsInfo, ImageInfo, VolumeInfo, VsInfo};
use crate::file::{FsAttr, FsFile};
use crate::object::ObjId;
use crate::storage::CaseDb;

/// Everything a walker reported, image by image
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    pub images: Vec<ImageEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageEntry {
    #[serde(flatten)]
    pub info: ImageInfo,
    /// Segment file names, in sequence order
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub volume_systems: Vec<VsEntry>,
    /// Filesystems found directly in the image (no partition table)
    #[serde(default)]
    pub filesystems: Vec<FsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VsEntry {
    #[serde(flatten)]
    pub info: VsInfo,
    #[serde(default)]
    pub volumes: Vec<VolumeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeEntry {
    #[serde(flatten)]
    pub info: VolumeInfo,
    #[serde(default)]
    pub filesystems: Vec<FsEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsEntry {
    #[serde(flatten)]
    pub info: FsInfo,
    /// Files in walker order: every directory before its contents
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub carved: Vec<CarvedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEntry {
    #[serde(flatten)]
    pub file: FsFile,
    #[serde(default)]
    pub attr: Option<FsAttr>,
    /// Path of the parent directory, e.g. `/Windows/System32/`
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub runs: Vec<Run>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CarvedEntry {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub runs: Vec<Run>,
}

/// A byte range of the image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    pub start: u64,
    pub len: u64,
}

impl Manifest {
    /// Read a manifest from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(json)?;
        if manifest.images.is_empty() {
            return Err(Error::Manifest("manifest lists no images".to_string()));
        }
        Ok(manifest)
    }

    /// Number of file and carved entries, for progress reporting
    pub fn entry_count(&self) -> u64 {
        self.images
            .iter()
            .flat_map(ImageEntry::all_filesystems)
            .map(|fs| (fs.files.len() + fs.carved.len()) as u64)
            .sum()
    }
}

impl ImageEntry {
    fn all_filesystems(&self) -> impl Iterator<Item = &FsEntry> {
        self.volume_systems
            .iter()
            .flat_map(|vs| vs.volumes.iter())
            .flat_map(|vol| vol.filesystems.iter())
            .chain(self.filesystems.iter())
    }
}

/// Counts of what a load wrote
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub images: usize,
    pub volume_systems: usize,
    pub volumes: usize,
    pub filesystems: usize,
    pub files: usize,
    pub carved_files: usize,
    pub layout_runs: usize,
    /// Entries without a name, not recorded
    pub unnamed: usize,
    /// Entries rolled back after an error
    pub failed: usize,
}

impl std::fmt::Display for LoadStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Load Statistics:")?;
        writeln!(f, "  Images: {}", self.images)?;
        writeln!(f, "  Volume systems: {}", self.volume_systems)?;
        writeln!(f, "  Volumes: {}", self.volumes)?;
        writeln!(f, "  Filesystems: {}", self.filesystems)?;
        writeln!(f, "  Files: {}", self.files)?;
        writeln!(f, "  Carved files: {}", self.carved_files)?;
        writeln!(f, "  Layout runs: {}", self.layout_runs)?;
        writeln!(f, "  Unnamed entries: {}", self.unnamed)?;
        writeln!(f, "  Failed entries: {}", self.failed)
    }
}

/// Replays a [`Manifest`] into a [`CaseDb`]
pub struct Loader<'a> {
    db: &'a mut CaseDb,
    stop_on_error: bool,
    progress: ProgressBar,
    next_savepoint: u64,
    stats: LoadStats,
}

impl<'a> Loader<'a> {
    pub fn new(db: &'a mut CaseDb) -> Self {
        Self {
            db,
            stop_on_error: false,
            progress: ProgressBar::hidden(),
            next_savepoint: 0,
            stats: LoadStats::default(),
        }
    }

    /// Abort the image on the first failing file instead of skipping it
    pub fn stop_on_error(mut self, stop: bool) -> Self {
        self.stop_on_error = stop;
        self
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Load every image of `manifest`, one transaction per image.
    ///
    /// A failure outside a file entry (or any failure with `stop_on_error`)
    /// rolls back the current image and is returned; images committed
    /// before it stay.
    pub fn load(mut self, manifest: &Manifest) -> Result<LoadStats> {
        self.db.setup()?;

        for image in &manifest.images {
            self.db.begin()?;
            match self.load_image(image) {
                Ok(()) => self.db.commit()?,
                Err(e) => {
                    if let Err(rollback_err) = self.db.rollback() {
                        tracing::warn!("Rollback after failed image also failed: {}", rollback_err);
                    }
                    self.progress.abandon();
                    return Err(e);
                }
            }
        }

        self.db.cleanup();
        self.progress.finish_and_clear();
        Ok(self.stats)
    }

    fn load_image(&mut self, image: &ImageEntry) -> Result<()> {
        let img_id = self.db.add_image_info(&image.info)?;
        for (sequence, name) in image.names.iter().enumerate() {
            self.db.add_image_name(img_id, name, sequence as i64)?;
        }
        self.stats.images += 1;
        tracing::debug!("Image {} ({} segments)", img_id, image.names.len());

        for vs in &image.volume_systems {
            let vs_id = self.db.add_vs_info(&vs.info, img_id)?;
            self.stats.volume_systems += 1;
            for vol in &vs.volumes {
                let vol_id = self.db.add_volume_info(&vol.info, vs_id)?;
                self.stats.volumes += 1;
                for fs in &vol.filesystems {
                    self.load_fs(fs, vol_id)?;
                }
            }
        }

        for fs in &image.filesystems {
            self.load_fs(fs, img_id)?;
        }
        Ok(())
    }

    fn load_fs(&mut self, fs: &FsEntry, par_obj_id: ObjId) -> Result<()> {
        let fs_obj_id = self.db.add_fs_info(&fs.info, par_obj_id)?;
        self.stats.filesystems += 1;
        tracing::debug!(
            "Filesystem {} at offset {} ({} files, {} carved)",
            fs_obj_id,
            fs.info.offset,
            fs.files.len(),
            fs.carved.len()
        );

        for entry in &fs.files {
            if let Some(name) = &entry.file.name {
                self.progress.set_message(name.name.clone());
            }
            let outcome = self.in_savepoint(|db| {
                let added = db.add_fs_file(&entry.file, entry.attr.as_ref(), &entry.path, fs_obj_id)?;
                match added {
                    Some(obj_id) => Ok(Some(add_runs(db, fs_obj_id, obj_id, &entry.runs)?)),
                    None => Ok(None),
                }
            });
            match self.settle(outcome, || describe_file(entry))? {
                Some(Some(runs)) => {
                    self.stats.files += 1;
                    self.stats.layout_runs += runs;
                }
                Some(None) => self.stats.unnamed += 1,
                None => self.stats.failed += 1,
            }
            self.progress.inc(1);
        }

        for carved in &fs.carved {
            self.progress.set_message(carved.name.clone());
            let outcome = self.in_savepoint(|db| {
                let obj_id = db.add_carved_file_info(fs_obj_id, &carved.name, carved.size)?;
                add_runs(db, fs_obj_id, obj_id, &carved.runs)
            });
            match self.settle(outcome, || format!("carved file {}", carved.name))? {
                Some(runs) => {
                    self.stats.carved_files += 1;
                    self.stats.layout_runs += runs;
                }
                None => self.stats.failed += 1,
            }
            self.progress.inc(1);
        }
        Ok(())
    }

    /// Run `op` inside a fresh savepoint, rolling back to it on failure
    fn in_savepoint<T>(&mut self, op: impl FnOnce(&CaseDb) -> Result<T>) -> Result<T> {
        self.next_savepoint += 1;
        let name = format!("file_{}", self.next_savepoint);

        self.db.savepoint(&name)?;
        let result = op(&*self.db);
        if result.is_err() {
            self.db.rollback_savepoint(&name)?;
        }
        self.db.release_savepoint(&name)?;
        result
    }

    /// Turn a failed entry into a skip, unless loads stop on error
    fn settle<T>(&self, outcome: Result<T>, describe: impl FnOnce() -> String) -> Result<Option<T>> {
        match outcome {
            Ok(value) => Ok(Some(value)),
            Err(e) if self.stop_on_error => Err(e),
            Err(e @ Error::TransactionFailed { .. }) => Err(e),
            Err(e) => {
                tracing::warn!("Skipping {}: {}", describe(), e);
                Ok(None)
            }
        }
    }
}

fn add_runs(db: &CaseDb, fs_obj_id: ObjId, file_obj_id: ObjId, runs: &[Run]) -> Result<usize> {
    if runs.is_empty() {
        return Ok(0);
    }
    if !db.block_layout_enabled() {
        tracing::trace!("Ignoring {} runs of object {}: block layout off", runs.len(), file_obj_id);
        return Ok(0);
    }
    for run in runs {
        db.add_fs_block_info(fs_obj_id, file_obj_id, run.start, run.len)?;
    }
    Ok(runs.len())
}

fn describe_file(entry: &FileEntry) -> String {
    match &entry.file.name {
        Some(name) => format!("{}{} (meta_addr {})", entry.path, name.name, name.meta_addr),
        None => "unnamed entry".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectType;

    const MANIFEST: &str = r#"
    {
      "images": [
        {
          "container_type": 1,
          "sector_size": 512,
          "names": ["disk.001", "disk.002"],
          "volume_systems": [
            {
              "vs_type": 1,
              "offset": 0,
              "block_size": 512,
              "volumes": [
                { "addr": 0, "start": 0, "len": 63, "desc": "Unallocated", "flags": 2 },
                {
                  "addr": 2, "start": 63, "len": 204800, "desc": "Linux (0x83)", "flags": 1,
                  "filesystems": [
                    {
                      "offset": 32256, "fs_type": 8, "block_size": 4096, "block_count": 25600,
                      "root_inum": 2, "first_inum": 1, "last_inum": 6400,
                      "files": [
                        { "name": { "name": "", "meta_addr": 2, "par_addr": 2, "type": "dir", "flags": 1 },
                          "meta": { "type": "dir", "flags": 5, "size": 4096 }, "path": "/" },
                        { "name": { "name": "home", "meta_addr": 11, "par_addr": 2, "type": "dir", "flags": 1 },
                          "meta": { "type": "dir", "flags": 5, "size": 4096 }, "path": "/" },
                        { "name": { "name": "O'Brien.txt", "meta_addr": 12, "par_addr": 11, "type": "reg", "flags": 1 },
                          "meta": { "type": "reg", "flags": 5, "size": 10, "mtime": 1300000000 },
                          "path": "/home/", "runs": [ { "start": 1048576, "len": 4096 } ] },
                        { "name": { "name": "stray", "meta_addr": 99, "par_addr": 98, "type": "reg", "flags": 2 },
                          "path": "/lost/" },
                        { "meta": { "type": "reg", "size": 1 } }
                      ],
                      "carved": [ { "name": "carved_0.jpg", "size": 2048, "runs": [ { "start": 65536, "len": 2048 } ] } ]
                    }
                  ]
                }
              ]
            }
          ]
        }
      ]
    }
    "#;

    fn new_db(block_layout: bool) -> CaseDb {
        let mut db = CaseDb::open_in_memory().unwrap();
        db.initialize(block_layout).unwrap();
        db
    }

    #[test]
    fn test_manifest_parse() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        assert_eq!(manifest.images.len(), 1);
        assert_eq!(manifest.entry_count(), 6);
        let vol = &manifest.images[0].volume_systems[0].volumes[1];
        assert_eq!(vol.info.desc, "Linux (0x83)");
        assert_eq!(vol.filesystems[0].info.root_inum, 2);
    }

    #[test]
    fn test_empty_manifest_rejected() {
        assert!(matches!(Manifest::from_json(r#"{"images": []}"#), Err(Error::Manifest(_))));
    }

    #[test]
    fn test_load_skips_orphan_and_unnamed() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let mut db = new_db(true);

        let stats = Loader::new(&mut db).load(&manifest).unwrap();

        assert_eq!(stats.images, 1);
        assert_eq!(stats.volume_systems, 1);
        assert_eq!(stats.volumes, 2);
        assert_eq!(stats.filesystems, 1);
        assert_eq!(stats.files, 3);
        assert_eq!(stats.carved_files, 1);
        assert_eq!(stats.layout_runs, 2);
        assert_eq!(stats.unnamed, 1);
        assert_eq!(stats.failed, 1);

        let db_stats = db.stats().unwrap();
        assert_eq!(db_stats.files, 4);
        assert_eq!(db_stats.carved_files, 1);
        assert_eq!(db_stats.layout_runs, Some(2));
    }

    #[test]
    fn test_loaded_hierarchy() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let mut db = new_db(false);
        Loader::new(&mut db).load(&manifest).unwrap();

        let images = db.stats().unwrap().images;
        assert_eq!(images, 1);

        // image -> vs -> two volumes; the second holds the filesystem
        let img_id = 1;
        assert_eq!(db.get_image_names(img_id).unwrap().len(), 2);
        let vs = db.children_of(img_id).unwrap();
        assert_eq!(vs.len(), 1);
        assert_eq!(vs[0].kind, ObjectType::VolumeSystem);
        let vols = db.children_of(vs[0].obj_id).unwrap();
        assert_eq!(vols.len(), 2);
        let fs = db.children_of(vols[1].obj_id).unwrap();
        assert_eq!(fs.len(), 1);
        assert_eq!(fs[0].kind, ObjectType::Filesystem);

        // root dir and the carved file hang off the filesystem
        let under_fs = db.children_of(fs[0].obj_id).unwrap();
        assert_eq!(under_fs.len(), 2);
        let root = db.get_file(under_fs[0].obj_id).unwrap().unwrap();
        assert_eq!(root.meta_addr, Some(2));

        let home = db.children_of(root.obj_id).unwrap();
        assert_eq!(home.len(), 1);
        let leaf = db.children_of(home[0].obj_id).unwrap();
        let leaf = db.get_file(leaf[0].obj_id).unwrap().unwrap();
        assert_eq!(leaf.name, "O''Brien.txt");
        assert_eq!(db.get_file_path(leaf.obj_id).unwrap().as_deref(), Some("/home/"));
    }

    #[test]
    fn test_stop_on_error_rolls_back_image() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let mut db = new_db(false);

        let err = Loader::new(&mut db).stop_on_error(true).load(&manifest).unwrap_err();
        assert!(err.is_parent_lookup());

        let stats = db.stats().unwrap();
        assert_eq!(stats.objects, 0);
        assert_eq!(stats.files, 0);
    }

    #[test]
    fn test_runs_ignored_without_layout() {
        let manifest = Manifest::from_json(MANIFEST).unwrap();
        let mut db = new_db(false);
        let stats = Loader::new(&mut db).load(&manifest).unwrap();
        assert_eq!(stats.layout_runs, 0);
        assert_eq!(stats.files, 3);
    }
}
