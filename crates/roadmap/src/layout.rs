//! File and directory names inside a roadmap base directory

use std::path::Path;

use chrono::{DateTime, Local};

/// Master workbook; its presence is required before any operation runs
pub const MASTER_FILE: &str = "Synthèse_RM_CE.xlsm";

/// Template every interface file is built from
pub const TEMPLATE_FILE: &str = "RM_template.xlsx";

/// Directory holding one interface file per collaborator
pub const INTERFACES_DIR: &str = "RM_Collaborateurs";

/// Snapshots taken on request before destructive operations
pub const ARCHIVED_DIR: &str = "Archived";

/// Zips of everything that was removed
pub const DELETED_DIR: &str = "Deleted";

/// Consolidated pointage export
pub const POINTAGE_OUTPUT: &str = "pointage_output.xml";

/// Collaborator handoff written by the master workbook (consumed once)
pub const COLLABORATORS_XML: &str = "collabs.xml";

/// Standalone LC export written by the master workbook (consumed once)
pub const LC_WORKBOOK: &str = "LC.xlsx";

/// Time-entry sheet of an interface file
pub const POINTAGE_SHEET: &str = "POINTAGE";

/// Reference-list sheet
pub const LC_SHEET: &str = "LC";

/// Collaborator list sheet of the master workbook
pub const COLLABORATORS_SHEET: &str = "Gestion_Interfaces";

/// Name prefix shared by interface files and the template
pub const INTERFACE_PREFIX: &str = "RM_";

/// Name prefix of lock files left by an open spreadsheet
pub const TEMP_FILE_PREFIX: &str = "~$";

/// Prefix of the scratch directory used while archiving orphans
pub const ORPHAN_SCRATCH_PREFIX: &str = "missing_collabs_";

/// Timestamp pattern used in archive names
pub const TIMESTAMP_FORMAT: &str = "%d%m%Y_%H%M%S";

/// Interface file name for a collaborator
pub fn interface_file_name(collaborator: &str) -> String {
    format!("{}{}.xlsx", INTERFACE_PREFIX, collaborator)
}

/// Whether a workbook is laid out like an interface file: its name carries
/// the `RM_` prefix or it sits in the interfaces directory
pub fn has_interface_layout(path: &Path) -> bool {
    let named = path
        .file_name()
        .map_or(false, |n| n.to_string_lossy().starts_with(INTERFACE_PREFIX));
    let placed = path
        .parent()
        .and_then(Path::file_name)
        .map_or(false, |d| d == INTERFACES_DIR);
    named || placed
}

/// Whether a file name is a spreadsheet lock file
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with(TEMP_FILE_PREFIX)
}

/// Timestamp suffix for archive names
pub fn timestamp(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// `Archive_RM_Collaborateurs_<ts>.zip`
pub fn archive_zip_name(ts: &str) -> String {
    format!("Archive_{}_{}.zip", INTERFACES_DIR, ts)
}

/// `Deleted_RM_Collaborateurs_<ts>.zip`
pub fn deleted_zip_name(ts: &str) -> String {
    format!("Deleted_{}_{}.zip", INTERFACES_DIR, ts)
}

/// `Deleted_Missing_RM_collaborators_<ts>.zip`
pub fn orphans_zip_name(ts: &str) -> String {
    format!("Deleted_Missing_RM_collaborators_{}.zip", ts)
}
