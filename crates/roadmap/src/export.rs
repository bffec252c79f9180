//! Pointage export: POINTAGE row scan and the consolidated XML artifact
//!
//! The artifact is what the master workbook imports:
//!
//! ```xml
//! <?xml version="1.0" encoding="utf-8"?>
//! <rows><row><col1>S01</col1><col2></col2>...</row></rows>
//! ```

use std::path::Path;

use quick_xml::escape::escape;
use roadmap_core::{excel_serial_to_datetime, CellValue};
use roadmap_xlsx::{Worksheet, XlsxWorkbook};

use crate::error::{RoadmapError, RoadmapResult};
use crate::layout::POINTAGE_SHEET;

/// First data row of POINTAGE (0-based, sheet row 4)
pub const POINTAGE_FIRST_ROW: u32 = 3;

/// Columns read per row (A to K)
pub const POINTAGE_WIDTH: u16 = 11;

/// One exported row; `None` is an empty cell
pub type ExportRow = Vec<Option<String>>;

/// Rows of a collaborator file's POINTAGE sheet
///
/// Each row holds A to K followed by the sheet's K1 total (`0` when K1 is
/// empty). The scan stops at the first row whose eleven cells are empty.
pub fn scan_pointage(path: &Path) -> RoadmapResult<Vec<ExportRow>> {
    let workbook = XlsxWorkbook::open(path)?;
    if !workbook.has_sheet(POINTAGE_SHEET) {
        return Err(RoadmapError::MissingSheet {
            sheet: POINTAGE_SHEET.to_string(),
            path: path.to_path_buf(),
        });
    }
    let sheet = workbook.worksheet(POINTAGE_SHEET)?;
    Ok(pointage_rows(&workbook, &sheet))
}

/// Rows of an already opened POINTAGE sheet, see [`scan_pointage`]
pub fn pointage_rows(workbook: &XlsxWorkbook, sheet: &Worksheet) -> Vec<ExportRow> {
    let Some(last_row) = sheet.max_row() else {
        return Vec::new();
    };
    // K1
    let total = export_text(workbook, sheet, 0, 10).unwrap_or_else(|| "0".to_string());

    let mut rows = Vec::new();
    for row in POINTAGE_FIRST_ROW..=last_row {
        let mut values: ExportRow = (0..POINTAGE_WIDTH)
            .map(|col| export_text(workbook, sheet, row, col))
            .collect();
        if values.iter().all(Option::is_none) {
            break;
        }
        values.push(Some(total.clone()));
        rows.push(values);
    }
    rows
}

/// Text of an exported cell, `None` when empty
///
/// Numbers under a date format become `YYYY-MM-DD HH:MM:SS`; serials below
/// one day are times of day (`HH:MM:SS`) and elapsed formats read as a
/// duration (`H:MM:SS`, prefixed by `N days, ` past a day). Other cells read
/// as displayed without a number format.
pub fn export_text(workbook: &XlsxWorkbook, sheet: &Worksheet, row: u32, col: u16) -> Option<String> {
    let value = sheet.value(row, col);
    let text = match value {
        CellValue::Empty => return None,
        CellValue::Number(n) => {
            let format = workbook.number_format(sheet.style(row, col));
            if format.is_text() || !format.is_date() {
                value.display_text()
            } else if format.is_elapsed() {
                duration_text(n).unwrap_or_else(|| value.display_text())
            } else {
                match excel_serial_to_datetime(n, workbook.date1904()) {
                    Ok(dt) if (0.0..1.0).contains(&n) => dt.format("%H:%M:%S").to_string(),
                    Ok(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
                    Err(_) => value.display_text(),
                }
            }
        }
        other => other.display_text(),
    };
    Some(text)
}

fn duration_text(days: f64) -> Option<String> {
    if !days.is_finite() || days < 0.0 {
        return None;
    }
    let seconds = (days * 86_400.0).round() as u64;
    let (whole_days, rest) = (seconds / 86_400, seconds % 86_400);
    let clock = format!("{}:{:02}:{:02}", rest / 3600, rest % 3600 / 60, rest % 60);
    Some(match whole_days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    })
}

/// Serialize rows as `rows` / `row` / `colN`
pub fn export_xml(rows: &[ExportRow]) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    if rows.is_empty() {
        out.push_str("<rows/>");
        return out;
    }

    out.push_str("<rows>");
    for row in rows {
        out.push_str("<row>");
        for (i, value) in row.iter().enumerate() {
            let text = value.as_deref().unwrap_or("");
            out.push_str(&format!("<col{n}>{}</col{n}>", escape(text), n = i + 1));
        }
        out.push_str("</row>");
    }
    out.push_str("</rows>");
    out
}

/// Write the export artifact, replacing any previous one
pub fn write_xml(rows: &[ExportRow], output: &Path) -> RoadmapResult<()> {
    std::fs::write(output, export_xml(rows))?;
    Ok(())
}
