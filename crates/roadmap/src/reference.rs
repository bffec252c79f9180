//! LC reference table: loading and cell normalization
//!
//! The LC table is a list of 8-field rows (columns B to I) that feeds the
//! dropdowns of every interface file. It is read either from the `LC.xlsx`
//! handoff (rows from 2, file consumed) or from the master workbook's `LC`
//! sheet (rows from 3, file kept).

use std::path::Path;

use roadmap_core::{excel_serial_to_datetime, CellValue};
use roadmap_xlsx::{Worksheet, XlsxWorkbook};

use crate::error::{RoadmapError, RoadmapResult};
use crate::layout::{LC_SHEET, LC_WORKBOOK};
use crate::options::DataSource;

/// Fields per LC row (columns B to I)
pub const LC_WIDTH: usize = 8;

/// First LC column (B, 0-based)
pub const LC_FIRST_COLUMN: u16 = 1;

/// First LC data row (1-based) in the `LC.xlsx` handoff
pub const HANDOFF_FIRST_ROW: u32 = 2;

/// First LC data row (1-based) in the master workbook
pub const MASTER_FIRST_ROW: u32 = 3;

/// One LC row; `None` is an empty cell
pub type LcRow = [Option<String>; LC_WIDTH];

/// Ordered LC rows and the sheet row the first one came from
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReferenceSnapshot {
    /// Rows in sheet order, none of them fully empty
    pub rows: Vec<LcRow>,
    /// 1-based sheet row of `rows[0]`; targets are written from the same row
    pub first_row: u32,
}

impl ReferenceSnapshot {
    /// Create a snapshot
    pub fn new(rows: Vec<LcRow>, first_row: u32) -> Self {
        Self { rows, first_row }
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there is nothing to write
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Load the LC table from the configured source
///
/// Never fails: every problem is logged and yields an empty snapshot.
pub fn load_reference(source: DataSource, base_dir: &Path, master: &Path) -> ReferenceSnapshot {
    match source {
        DataSource::Xml => load_lc_workbook(base_dir),
        DataSource::Master => load_lc_master(master),
    }
}

/// Read and consume `<base_dir>/LC.xlsx`
pub fn load_lc_workbook(base_dir: &Path) -> ReferenceSnapshot {
    let excel_file = base_dir.join(LC_WORKBOOK);
    if !excel_file.exists() {
        log::warn!(
            "[LOAD_LC_EXCEL] {} file not found: {}",
            LC_WORKBOOK,
            excel_file.display()
        );
        return ReferenceSnapshot::default();
    }

    log::info!("[LOAD_LC_EXCEL] Reading from Excel file: {}", excel_file.display());
    let snapshot = match read_snapshot(&excel_file, HANDOFF_FIRST_ROW) {
        Ok(snapshot) => snapshot,
        Err(RoadmapError::MissingSheet { sheet, path }) => {
            log::warn!("[LOAD_LC_EXCEL] {} sheet not found in {}", sheet, path.display());
            return ReferenceSnapshot::default();
        }
        Err(e) => {
            log::error!("[LOAD_LC_EXCEL] Error reading Excel file: {}", e);
            return ReferenceSnapshot::default();
        }
    };
    log::info!(
        "[LOAD_LC_EXCEL] Loaded {} rows of LC data from Excel",
        snapshot.len()
    );

    match std::fs::remove_file(&excel_file) {
        Ok(()) => log::info!("[LOAD_LC_EXCEL] Deleted Excel file: {}", excel_file.display()),
        Err(e) => log::warn!("[LOAD_LC_EXCEL] Could not delete Excel file: {}", e),
    }

    snapshot
}

/// Read the `LC` sheet of the master workbook (the file is kept)
pub fn load_lc_master(master: &Path) -> ReferenceSnapshot {
    log::info!("[LOAD_LC_EXCEL] Reading LC sheet of {}", master.display());
    match read_snapshot(master, MASTER_FIRST_ROW) {
        Ok(snapshot) => {
            log::info!(
                "[LOAD_LC_EXCEL] Loaded {} rows of LC data from the master workbook",
                snapshot.len()
            );
            snapshot
        }
        Err(RoadmapError::MissingSheet { sheet, path }) => {
            log::warn!("[LOAD_LC_EXCEL] {} sheet not found in {}", sheet, path.display());
            ReferenceSnapshot::default()
        }
        Err(e) => {
            log::error!("[LOAD_LC_EXCEL] Error reading {}: {}", master.display(), e);
            ReferenceSnapshot::default()
        }
    }
}

fn read_snapshot(path: &Path, first_row: u32) -> RoadmapResult<ReferenceSnapshot> {
    let workbook = XlsxWorkbook::open(path)?;
    if !workbook.has_sheet(LC_SHEET) {
        return Err(RoadmapError::MissingSheet {
            sheet: LC_SHEET.to_string(),
            path: path.to_path_buf(),
        });
    }
    let sheet = workbook.worksheet(LC_SHEET)?;
    Ok(ReferenceSnapshot::new(
        read_lc_rows(&workbook, &sheet, first_row),
        first_row,
    ))
}

/// LC rows from `first_row` (1-based), stopping at the first fully-empty row
pub fn read_lc_rows(workbook: &XlsxWorkbook, sheet: &Worksheet, first_row: u32) -> Vec<LcRow> {
    let Some(last_row) = sheet.max_row() else {
        return Vec::new();
    };

    let mut rows = Vec::new();
    for row in first_row.saturating_sub(1)..=last_row {
        let mut fields: LcRow = Default::default();
        for (i, field) in fields.iter_mut().enumerate() {
            *field = normalize_cell(workbook, sheet, row, LC_FIRST_COLUMN + i as u16);
        }
        if fields.iter().all(Option::is_none) {
            break;
        }
        rows.push(fields);
    }
    rows
}

/// Text of a cell as it should travel in the LC table
///
/// The result of [`cell_text`], trimmed; empty text becomes `None`.
pub fn normalize_cell(
    workbook: &XlsxWorkbook,
    sheet: &Worksheet,
    row: u32,
    col: u16,
) -> Option<String> {
    let text = cell_text(workbook, sheet, row, col)?;
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Text of a non-empty cell, with dates written the ISO way
///
/// Cells formatted as text keep their literal value; numbers under a date
/// format become `YYYY-MM-DD`, or `YYYY-MM-DD HH:MM:SS` when the format shows
/// a time. Everything else reads as displayed without a number format.
pub fn cell_text(workbook: &XlsxWorkbook, sheet: &Worksheet, row: u32, col: u16) -> Option<String> {
    let value = sheet.value(row, col);
    if matches!(value, CellValue::Empty) {
        return None;
    }

    let format = workbook.number_format(sheet.style(row, col));
    let text = match &value {
        CellValue::Number(n) if !format.is_text() && format.is_date() => {
            match excel_serial_to_datetime(*n, workbook.date1904()) {
                Ok(dt) if format.has_time() => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
                Ok(dt) => dt.format("%Y-%m-%d").to_string(),
                Err(_) => value.display_text(),
            }
        }
        other => other.display_text(),
    };
    Some(text)
}
