//! Batch orchestration over a roadmap base directory
//!
//! # Example
//!
//! ```rust,no_run
//! use roadmap::{CreateMode, RoadmapManager, RoadmapOptions};
//!
//! let manager = RoadmapManager::new("/srv/roadmap", RoadmapOptions::default())?;
//! manager.create(CreateMode::Parallel, false)?;
//! manager.update_lc()?;
//! let exported = manager.pointage(None)?;
//! println!("exported rows: {}", exported);
//! # Ok::<(), roadmap::RoadmapError>(())
//! ```

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use rayon::prelude::*;

use crate::archive::zip_folder;
use crate::collaborators::read_collaborators;
use crate::error::{RoadmapError, RoadmapResult};
use crate::export::{scan_pointage, write_xml};
use crate::interface::{build_interface, build_interface_in_place};
use crate::layout::{
    archive_zip_name, deleted_zip_name, interface_file_name, is_temp_file, orphans_zip_name,
    timestamp, ARCHIVED_DIR, DELETED_DIR, INTERFACES_DIR, MASTER_FILE, ORPHAN_SCRATCH_PREFIX,
    POINTAGE_OUTPUT, TEMPLATE_FILE,
};
use crate::options::RoadmapOptions;
use crate::reference::load_reference;
use crate::retry::rmtree_with_retry;
use crate::sync::{update_lc_in_file, FileRole, SyncOutcome};

/// How interface files are produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CreateMode {
    /// One after the other from the template bytes
    #[default]
    Sequential,
    /// On a bounded worker pool from the template bytes
    Parallel,
    /// Copy the template file, then patch the copy
    InPlace,
}

/// Counts reported by an interface creation run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CreateSummary {
    /// Collaborators whose file already existed
    pub existing: usize,
    /// Files written
    pub created: usize,
    /// Files that could not be built
    pub failed: usize,
}

/// Counts reported by an LC synchronization run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Files now holding the snapshot
    pub updated: usize,
    /// Files left alone (locked or without an LC sheet)
    pub skipped: usize,
    /// Files that failed
    pub failed: usize,
}

/// Orchestrates interface files under one base directory
#[derive(Debug, Clone)]
pub struct RoadmapManager {
    base_dir: PathBuf,
    master_file: PathBuf,
    template_file: PathBuf,
    interfaces_dir: PathBuf,
    archived_dir: PathBuf,
    deleted_dir: PathBuf,
    pointage_output: PathBuf,
    all_ok: bool,
    options: RoadmapOptions,
}

impl RoadmapManager {
    /// Resolve the layout of `base_dir` and create its working directories
    ///
    /// A missing master workbook or template is logged; every operation then
    /// becomes a no-op (see [`is_ready`](Self::is_ready)).
    pub fn new<P: AsRef<Path>>(base_dir: P, options: RoadmapOptions) -> RoadmapResult<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        let manager = Self {
            master_file: base_dir.join(MASTER_FILE),
            template_file: base_dir.join(TEMPLATE_FILE),
            interfaces_dir: base_dir.join(INTERFACES_DIR),
            archived_dir: base_dir.join(ARCHIVED_DIR),
            deleted_dir: base_dir.join(DELETED_DIR),
            pointage_output: base_dir.join(POINTAGE_OUTPUT),
            base_dir,
            all_ok: false,
            options,
        };

        for dir in [
            &manager.interfaces_dir,
            &manager.archived_dir,
            &manager.deleted_dir,
        ] {
            ensure_dir(dir)?;
        }

        let all_ok = manager.master_file.exists() && manager.template_file.exists();
        if !all_ok {
            log::error!(
                "Required files '{}' or '{}' are missing. Please check the base directory.",
                MASTER_FILE,
                TEMPLATE_FILE
            );
        }

        Ok(Self { all_ok, ..manager })
    }

    /// Base directory
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Master workbook path
    pub fn master_file(&self) -> &Path {
        &self.master_file
    }

    /// Template path
    pub fn template_file(&self) -> &Path {
        &self.template_file
    }

    /// Directory of interface files
    pub fn interfaces_dir(&self) -> &Path {
        &self.interfaces_dir
    }

    /// Directory of on-request snapshots
    pub fn archived_dir(&self) -> &Path {
        &self.archived_dir
    }

    /// Directory of deletion zips
    pub fn deleted_dir(&self) -> &Path {
        &self.deleted_dir
    }

    /// Pointage export path
    pub fn pointage_output(&self) -> &Path {
        &self.pointage_output
    }

    /// Whether the master workbook and the template were both found
    pub fn is_ready(&self) -> bool {
        self.all_ok
    }

    /// Options in use
    pub fn options(&self) -> &RoadmapOptions {
        &self.options
    }

    fn ready(&self, tag: &str) -> bool {
        if !self.all_ok {
            log::error!("[{}] Required files are missing. Cannot proceed.", tag);
        }
        self.all_ok
    }

    /// Interface files currently present, sorted by file name
    ///
    /// Lock files (`~$...`) are left out. A missing directory is empty.
    pub fn interface_files(&self) -> RoadmapResult<Vec<PathBuf>> {
        let entries = match std::fs::read_dir(&self.interfaces_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let is_xlsx = path
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("xlsx"));
            let name = entry.file_name();
            if is_xlsx && entry.file_type()?.is_file() && !is_temp_file(&name.to_string_lossy()) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Collaborators from the configured source
    pub fn collaborators(&self) -> Vec<String> {
        read_collaborators(self.options.source, &self.base_dir, &self.master_file)
    }

    /// Create interface files in the given mode, optionally snapshotting the
    /// current interfaces into `Archived/` first
    ///
    /// The snapshot is taken only when at least one file is missing.
    pub fn create(&self, mode: CreateMode, archive: bool) -> RoadmapResult<CreateSummary> {
        if !self.ready("CREATE_INTERFACES") {
            return Ok(CreateSummary::default());
        }
        self.create_missing(mode, archive)
    }

    /// Zip the interfaces directory into `Archived/` without touching it
    ///
    /// Returns the archive path, or `None` when zipping failed.
    pub fn archive_interfaces(&self) -> Option<PathBuf> {
        let zip_path = self
            .archived_dir
            .join(archive_zip_name(&timestamp(Local::now())));
        if let Err(e) = ensure_dir(&self.interfaces_dir) {
            log::error!("[CREATE_INTERFACES] Error while archiving folder: {}", e);
            return None;
        }
        match zip_folder(&self.interfaces_dir, &zip_path) {
            Ok(count) => {
                log::info!(
                    "[CREATE_INTERFACES] Archived {} file(s) to {}",
                    count,
                    display_name(&zip_path)
                );
                Some(zip_path)
            }
            Err(e) => {
                log::error!("[CREATE_INTERFACES] Error while archiving folder: {}", e);
                None
            }
        }
    }

    /// Build the missing interface files one after the other
    pub fn create_interfaces(&self) -> RoadmapResult<CreateSummary> {
        self.create(CreateMode::Sequential, false)
    }

    /// Build the missing interface files on a pool of `max_workers` threads
    pub fn create_interfaces_fast(&self) -> RoadmapResult<CreateSummary> {
        self.create(CreateMode::Parallel, false)
    }

    /// Build the missing interface files by copying the template file and
    /// patching each copy
    pub fn create_interfaces_in_place(&self) -> RoadmapResult<CreateSummary> {
        self.create(CreateMode::InPlace, false)
    }

    fn create_missing(&self, mode: CreateMode, archive: bool) -> RoadmapResult<CreateSummary> {
        match mode {
            CreateMode::Sequential => {
                log::info!("[CREATE_INTERFACES] interface creation (Normal processing mode)")
            }
            CreateMode::Parallel => {
                log::info!("[CREATE_INTERFACES] Parallel processing mode interface creation")
            }
            CreateMode::InPlace => {
                log::info!("[CREATE_INTERFACES] Starting interface creation (copy mode)")
            }
        }

        let (missing, existing) = self.missing_collaborators()?;
        let nothing_built = CreateSummary {
            existing,
            ..CreateSummary::default()
        };
        if missing.is_empty() {
            return Ok(nothing_built);
        }
        if archive && self.archive_interfaces().is_none() {
            log::error!("[CREATE_INTERFACES] Archive failed, creation aborted");
            return Ok(nothing_built);
        }

        let layout = self.options.layout;
        let results: Vec<_> = match mode {
            CreateMode::Sequential => {
                let Some(template) = self.read_template() else {
                    return Ok(nothing_built);
                };
                missing
                    .iter()
                    .map(|name| {
                        let output = self.interfaces_dir.join(interface_file_name(name));
                        (name.as_str(), build_interface(&template, &output, name, &layout))
                    })
                    .collect()
            }
            CreateMode::Parallel => {
                let Some(template) = self.read_template() else {
                    return Ok(nothing_built);
                };
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(self.options.max_workers.max(1))
                    .thread_name(|i| format!("roadmap-worker-{}", i))
                    .build()?;

                let interfaces_dir = &self.interfaces_dir;
                let template = template.as_slice();
                pool.install(|| {
                    missing
                        .par_iter()
                        .map(|name| {
                            let output = interfaces_dir.join(interface_file_name(name));
                            (name.as_str(), build_interface(template, &output, name, &layout))
                        })
                        .collect()
                })
            }
            CreateMode::InPlace => missing
                .iter()
                .map(|name| {
                    let output = self.interfaces_dir.join(interface_file_name(name));
                    let result = build_interface_in_place(&self.template_file, &output, name, &layout);
                    (name.as_str(), result)
                })
                .collect(),
        };

        Ok(self.report_creation(existing, results))
    }

    /// Collaborators without an interface file, and how many already have one
    fn missing_collaborators(&self) -> RoadmapResult<(Vec<String>, usize)> {
        let collaborators = self.collaborators();
        if collaborators.is_empty() {
            log::info!(
                "[CREATE_INTERFACES] the list of CE is empty. Please check XML file or '{}' sheet in '{}'",
                crate::layout::COLLABORATORS_SHEET,
                self.master_file.display()
            );
            return Ok((Vec::new(), 0));
        }
        log::info!(
            "[CREATE_INTERFACES] Found {} collaborators",
            collaborators.len()
        );

        ensure_dir(&self.interfaces_dir)?;

        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        let mut existing = 0;
        for name in collaborators {
            if !seen.insert(name.clone()) {
                log::warn!("[CREATE_INTERFACES] Duplicate collaborator ignored: {}", name);
                continue;
            }
            let target = self.interfaces_dir.join(interface_file_name(&name));
            if target.exists() {
                log::debug!(
                    "[CREATE_INTERFACES] File already exists: {}",
                    display_name(&target)
                );
                existing += 1;
            } else {
                missing.push(name);
            }
        }

        if missing.is_empty() {
            log::info!("[CREATE_INTERFACES] All collaborator files already exist. Nothing to create.");
            return Ok((missing, existing));
        }
        log::info!(
            "[CREATE_INTERFACES] Creating {} missing interface file(s)",
            missing.len()
        );
        Ok((missing, existing))
    }

    /// Template bytes, or `None` (logged) when the template cannot be read
    fn read_template(&self) -> Option<Vec<u8>> {
        match std::fs::read(&self.template_file) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                log::error!(
                    "'{}' is opened. Please close the excel file",
                    self.template_file.display()
                );
                None
            }
            Err(e) => {
                log::error!(
                    "[CREATE_INTERFACES] Cannot read template {}: {}",
                    self.template_file.display(),
                    e
                );
                None
            }
        }
    }

    fn report_creation(
        &self,
        existing: usize,
        results: Vec<(&str, RoadmapResult<()>)>,
    ) -> CreateSummary {
        let mut summary = CreateSummary {
            existing,
            ..CreateSummary::default()
        };
        for (name, result) in results {
            match result {
                Ok(()) => {
                    log::debug!("[CREATE_INTERFACES] Created {}", interface_file_name(name));
                    summary.created += 1;
                }
                Err(e) => {
                    log::error!(
                        "[CREATE_INTERFACES] error building {}: {}",
                        interface_file_name(name),
                        e
                    );
                    summary.failed += 1;
                }
            }
        }
        log::info!(
            "[CREATE_INTERFACES] creation done: {} created, {} failed",
            summary.created,
            summary.failed
        );
        summary
    }

    /// Replace the LC sheet of the template and of every interface file
    pub fn update_lc(&self) -> RoadmapResult<UpdateSummary> {
        let mut summary = UpdateSummary::default();
        if !self.ready("UPDATE_LC") {
            return Ok(summary);
        }
        log::info!("[UPDATE_LC] Starting LC update process");

        let snapshot = load_reference(self.options.source, &self.base_dir, &self.master_file);
        if snapshot.is_empty() {
            log::warn!("[UPDATE_LC] No LC data found. Nothing to update.");
            return Ok(summary);
        }
        log::info!("[UPDATE_LC] Loaded {} rows of LC data", snapshot.len());

        let mut targets = vec![self.template_file.clone()];
        match self.interface_files() {
            Ok(files) => {
                log::info!("[UPDATE_LC] Updating {} collaborator files...", files.len());
                targets.extend(files);
            }
            Err(e) => log::error!("[UPDATE_LC] Cannot list {}: {}", INTERFACES_DIR, e),
        }

        for path in targets {
            log::info!("[UPDATE_LC] Updating {}", display_name(&path));
            match update_lc_in_file(
                &path,
                &snapshot,
                FileRole::of(&path),
                &self.options.layout,
                self.options.temp_cleanup_retry,
            ) {
                Ok(SyncOutcome::Updated) => summary.updated += 1,
                Ok(SyncOutcome::Skipped) => summary.skipped += 1,
                Err(e) => {
                    log::error!("[UPDATE_LC] Error updating {}: {}", display_name(&path), e);
                    summary.failed += 1;
                }
            }
        }

        log::info!(
            "[UPDATE_LC] LC update completed: {} updated, {} skipped, {} failed",
            summary.updated,
            summary.skipped,
            summary.failed
        );
        Ok(summary)
    }

    /// Export the POINTAGE rows of every interface file (or of the
    /// `choice`-th one, 1-based) into the pointage XML
    ///
    /// The export file is always written, empty when there is nothing to
    /// export. Returns whether any row was exported.
    pub fn pointage(&self, choice: Option<usize>) -> RoadmapResult<bool> {
        if !self.ready("POINTAGE") {
            return Ok(false);
        }

        let mut files = match self.interface_files() {
            Ok(files) => files,
            Err(e) => {
                log::error!("[POINTAGE] Cannot list {}: {}", INTERFACES_DIR, e);
                write_xml(&[], &self.pointage_output)?;
                return Ok(false);
            }
        };
        if files.is_empty() {
            log::warn!("[POINTAGE] No collaborator files found");
            write_xml(&[], &self.pointage_output)?;
            return Ok(false);
        }

        if let Some(choice) = choice {
            for (idx, path) in files.iter().enumerate() {
                log::info!("  {}. {}", idx + 1, display_name(path));
            }
            if choice == 0 || choice > files.len() {
                log::error!("[POINTAGE] Invalid selection: {}", choice);
                write_xml(&[], &self.pointage_output)?;
                return Ok(false);
            }
            files = vec![files.swap_remove(choice - 1)];
        }

        log::info!("[POINTAGE] Processing {} collaborator files", files.len());
        let mut all_rows = Vec::new();
        for path in &files {
            log::info!("[POINTAGE] Reading {}", path.display());
            match scan_pointage(path) {
                Ok(rows) => all_rows.extend(rows),
                Err(e) => log::error!("[POINTAGE] Skipping {}: {}", display_name(path), e),
            }
        }

        write_xml(&all_rows, &self.pointage_output)?;
        if all_rows.is_empty() {
            log::info!("[POINTAGE] No data to export, created EMPTY XML");
            return Ok(false);
        }
        log::info!(
            "[POINTAGE] XML successfully created with {} rows: {}",
            all_rows.len(),
            self.pointage_output.display()
        );
        Ok(true)
    }

    /// Zip the interfaces directory into `Deleted/` (and first into
    /// `Archived/` when `archive` is set), then remove it
    ///
    /// Nothing is removed unless every requested zip was written.
    pub fn delete_and_archive_interfaces(&self, archive: bool) -> RoadmapResult<()> {
        if !self.ready("DELETE_INTERFACES") {
            return Ok(());
        }
        log::info!("[DELETE_INTERFACES] Starting interface deletion");

        if !self.interfaces_dir.exists() {
            log::warn!("[DELETE_INTERFACES] {} folder does not exist", INTERFACES_DIR);
            return Ok(());
        }

        let count = self.interface_files()?.len();
        if count == 0 {
            log::warn!("[DELETE_INTERFACES] {} folder is empty", INTERFACES_DIR);
            if rmtree_with_retry(&self.interfaces_dir, self.options.rmtree_retry) {
                log::info!("[DELETE_INTERFACES] Empty folder removed");
            }
            return Ok(());
        }

        let ts = timestamp(Local::now());
        if archive {
            let archived = self.archived_dir.join(archive_zip_name(&ts));
            if let Err(e) = zip_folder(&self.interfaces_dir, &archived) {
                log::error!("[DELETE_INTERFACES] Error while archiving folder: {}", e);
                return Ok(());
            }
            log::info!(
                "[DELETE_INTERFACES] Archived {} interface file(s) to {}",
                count,
                display_name(&archived)
            );
        }

        let deleted = self.deleted_dir.join(deleted_zip_name(&ts));
        if let Err(e) = zip_folder(&self.interfaces_dir, &deleted) {
            log::error!("[DELETE_INTERFACES] Error while zipping folder: {}", e);
            return Ok(());
        }

        if rmtree_with_retry(&self.interfaces_dir, self.options.rmtree_retry) {
            log::info!(
                "[DELETE_INTERFACES] Deleted & Moved {} interface file(s) to {}",
                count,
                display_name(&deleted)
            );
        } else {
            log::warn!("[DELETE_INTERFACES] Could not remove original folder, but zip was created");
        }
        Ok(())
    }

    /// Remove interface files whose collaborator left the list, after
    /// zipping them into `Deleted/`
    ///
    /// Returns how many files were deleted.
    pub fn delete_missing_collaborators(&self) -> RoadmapResult<usize> {
        if !self.ready("DELETE_MISSING_COLLABORATORS") {
            return Ok(0);
        }
        log::info!("[DELETE_MISSING_COLLABORATORS] Starting cleanup of missing collaborators");

        if !self.interfaces_dir.exists() {
            log::warn!(
                "[DELETE_MISSING_COLLABORATORS] {} folder does not exist",
                INTERFACES_DIR
            );
            return Ok(0);
        }

        let collaborators = self.collaborators();
        if collaborators.is_empty() {
            log::warn!("[DELETE_MISSING_COLLABORATORS] No collaborators found. Skipping cleanup.");
            return Ok(0);
        }
        log::info!(
            "[DELETE_MISSING_COLLABORATORS] Found {} collaborators",
            collaborators.len()
        );

        let expected: HashSet<String> = collaborators
            .iter()
            .map(|name| interface_file_name(name))
            .collect();
        let orphans: Vec<PathBuf> = self
            .interface_files()?
            .into_iter()
            .filter(|path| !expected.contains(&display_name(path)))
            .collect();

        if orphans.is_empty() {
            log::info!(
                "[DELETE_MISSING_COLLABORATORS] All files match collaborators. Nothing to delete."
            );
            return Ok(0);
        }
        log::info!(
            "[DELETE_MISSING_COLLABORATORS] Found {} file(s) to delete",
            orphans.len()
        );

        let zip_name = orphans_zip_name(&timestamp(Local::now()));
        match self.archive_orphans(&orphans, &self.deleted_dir.join(&zip_name)) {
            Ok(()) => log::info!("[DELETE_MISSING_COLLABORATORS] Created archive: {}", zip_name),
            Err(e) => log::error!(
                "[DELETE_MISSING_COLLABORATORS] Error creating zip archive: {}",
                e
            ),
        }

        let mut deleted = 0;
        for path in &orphans {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    log::info!("[DELETE_MISSING_COLLABORATORS] Deleted: {}", display_name(path));
                    deleted += 1;
                }
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => log::warn!(
                    "[DELETE_MISSING_COLLABORATORS] Cannot delete {} - file may be open in Excel",
                    display_name(path)
                ),
                Err(e) => log::error!(
                    "[DELETE_MISSING_COLLABORATORS] Error deleting {}: {}",
                    display_name(path),
                    e
                ),
            }
        }

        log::info!(
            "[DELETE_MISSING_COLLABORATORS] Cleanup complete. Deleted {} file(s). Archive saved to: {}",
            deleted,
            zip_name
        );
        Ok(deleted)
    }

    /// Copy the orphans into a scratch directory under the base directory
    /// and zip it; the scratch directory is always removed
    fn archive_orphans(&self, orphans: &[PathBuf], zip_path: &Path) -> RoadmapResult<()> {
        let scratch = tempfile::Builder::new()
            .prefix(ORPHAN_SCRATCH_PREFIX)
            .tempdir_in(&self.base_dir)?;

        let result = orphans
            .iter()
            .try_for_each(|path| -> RoadmapResult<()> {
                std::fs::copy(path, scratch.path().join(display_name(path)))?;
                log::debug!(
                    "[DELETE_MISSING_COLLABORATORS] Copied to temp folder: {}",
                    display_name(path)
                );
                Ok(())
            })
            .and_then(|()| zip_folder(scratch.path(), zip_path).map(|_| ()));

        if let Err(e) = scratch.close() {
            log::warn!(
                "[DELETE_MISSING_COLLABORATORS] Could not remove temporary folder: {}",
                e
            );
        }
        result
    }
}

fn ensure_dir(dir: &Path) -> RoadmapResult<()> {
    match std::fs::create_dir(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(e) => Err(RoadmapError::Io(e)),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
