//! LC synchronization of one workbook
//!
//! The target is never opened directly: it is copied to a private temporary
//! file, the copy is patched and saved, then copied back over the target.

use std::io;
use std::path::{Path, PathBuf};

use roadmap_core::CellValue;
use roadmap_xlsx::{Worksheet, XlsxWorkbook};

use crate::error::RoadmapResult;
use crate::interface::install_validations;
use crate::layout::{has_interface_layout, LC_SHEET, POINTAGE_SHEET};
use crate::options::ValidationLayout;
use crate::reference::{ReferenceSnapshot, LC_FIRST_COLUMN, LC_WIDTH};
use crate::retry::{retry, RetryPolicy};

/// What a synchronized file is, which decides whether its dropdowns are rebuilt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// Any other workbook: only the LC sheet is replaced
    Plain,
    /// Interface layout (interface files and the template): LC is replaced
    /// and POINTAGE dropdowns rebuilt
    Interface,
}

impl FileRole {
    /// Role of a workbook, from its name and location
    pub fn of(path: &Path) -> Self {
        if has_interface_layout(path) {
            FileRole::Interface
        } else {
            FileRole::Plain
        }
    }
}

/// Result of synchronizing one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The file now holds the snapshot
    Updated,
    /// The file was left alone (locked, unreadable copy, or no LC sheet)
    Skipped,
}

/// Replace the LC sheet of `path` with `snapshot`
///
/// Locked targets and targets without an LC sheet are skipped with a
/// warning. Any other failure is returned and the target is left unchanged.
pub fn update_lc_in_file(
    path: &Path,
    snapshot: &ReferenceSnapshot,
    role: FileRole,
    layout: &ValidationLayout,
    cleanup: RetryPolicy,
) -> RoadmapResult<SyncOutcome> {
    let file_name = display_name(path);
    let temp_path = private_copy_path()?;

    let result = match std::fs::copy(path, &temp_path) {
        Ok(_) => patch_copy(path, &temp_path, snapshot, role, layout),
        Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
            log::warn!(
                "[UPDATE_LC] Cannot update {} - it may be open in Excel. Skipping this file.",
                file_name
            );
            Ok(SyncOutcome::Skipped)
        }
        Err(e) => {
            log::warn!(
                "[UPDATE_LC] Error copying {}: {}. Skipping this file.",
                file_name,
                e
            );
            Ok(SyncOutcome::Skipped)
        }
    };

    remove_private_copy(&temp_path, cleanup);
    result
}

fn patch_copy(
    target: &Path,
    temp_path: &Path,
    snapshot: &ReferenceSnapshot,
    role: FileRole,
    layout: &ValidationLayout,
) -> RoadmapResult<SyncOutcome> {
    let file_name = display_name(target);
    let mut workbook = XlsxWorkbook::open(temp_path)?;
    if !workbook.has_sheet(LC_SHEET) {
        log::warn!("[UPDATE_LC] LC sheet not found in {}", file_name);
        return Ok(SyncOutcome::Skipped);
    }

    let mut lc = workbook.worksheet(LC_SHEET)?;
    write_snapshot(&mut workbook, &mut lc, snapshot)?;
    workbook.put_worksheet(&lc)?;

    if role == FileRole::Interface && workbook.has_sheet(POINTAGE_SHEET) {
        log::info!(
            "[UPDATE_LC] Recreating data validation lists for {}",
            file_name
        );
        let mut pointage = workbook.worksheet(POINTAGE_SHEET)?;
        install_validations(&mut pointage, layout);
        workbook.put_worksheet(&pointage)?;
    }

    workbook.save(temp_path)?;
    std::fs::copy(temp_path, target)?;
    Ok(SyncOutcome::Updated)
}

/// Clear the LC area and write the snapshot into it as text
///
/// Values at or below the snapshot's first row, from column B rightwards, are
/// removed first, so rows past the new data end up empty. Each of the eight
/// written cells per row gets the text (`@`) format on top of its own style.
pub fn write_snapshot(
    workbook: &mut XlsxWorkbook,
    sheet: &mut Worksheet,
    snapshot: &ReferenceSnapshot,
) -> RoadmapResult<()> {
    let first_row = snapshot.first_row.saturating_sub(1);
    let cleared = sheet.clear_region(first_row, LC_FIRST_COLUMN);
    log::debug!("[UPDATE_LC] Cleared {} old LC cell(s)", cleared);

    for (offset, fields) in snapshot.rows.iter().enumerate() {
        let row = first_row + offset as u32;
        for (i, field) in fields.iter().enumerate().take(LC_WIDTH) {
            let col = LC_FIRST_COLUMN + i as u16;
            let style = workbook.text_style(sheet.style(row, col))?;
            let value = match field.as_deref().map(str::trim) {
                Some(text) if !text.is_empty() => CellValue::text(text),
                _ => CellValue::Empty,
            };
            sheet.set_value_with_style(row, col, value, style);
        }
    }
    Ok(())
}

/// Reserve a private temporary file and hand back its path
fn private_copy_path() -> io::Result<PathBuf> {
    let temp = tempfile::Builder::new()
        .prefix("roadmap_lc_")
        .suffix(".xlsx")
        .tempfile()?;
    let (_file, path) = temp.keep().map_err(io::Error::from)?;
    Ok(path)
}

fn remove_private_copy(path: &Path, policy: RetryPolicy) {
    let removed = retry(
        policy,
        |_: &io::Error| true,
        |_, _| {},
        || match std::fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
    );
    if removed.is_err() {
        log::warn!(
            "[UPDATE_LC] Could not delete temporary file {}, but operation completed successfully",
            path.display()
        );
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
