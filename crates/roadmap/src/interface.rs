//! Interface files: one workbook per collaborator, built from the template

use std::path::Path;

use roadmap_core::{CellAddress, CellRange, DataValidation};
use roadmap_xlsx::{Worksheet, XlsxWorkbook};

use crate::error::RoadmapResult;
use crate::layout::{LC_SHEET, POINTAGE_SHEET};
use crate::options::ValidationLayout;

/// Cell receiving the collaborator name (POINTAGE!B1)
const NAME_CELL: (u32, u16) = (0, 1);

/// The four dropdowns of POINTAGE
///
/// Entries are `(target column, source sheet, source column, first source
/// row)`. The week selector points at the single cell A2 of POINTAGE, the
/// others run down LC to the layout's end.
const DROPDOWNS: [(u16, &str, u16, u32); 4] = [
    // D: week
    (3, POINTAGE_SHEET, 0, 2),
    // E: key
    (4, LC_SHEET, 1, 3),
    // F: label
    (5, LC_SHEET, 2, 3),
    // G: function
    (6, LC_SHEET, 3, 3),
];

/// Build one interface file from the template bytes
///
/// Writes the name into POINTAGE!B1, installs the dropdowns and saves the
/// result to `output_path`. Nothing is shared with other calls besides the
/// template bytes, so calls may run in parallel.
pub fn build_interface(
    template: &[u8],
    output_path: &Path,
    collaborator: &str,
    layout: &ValidationLayout,
) -> RoadmapResult<()> {
    let mut workbook = XlsxWorkbook::from_bytes(template)?;
    stamp_interface(&mut workbook, collaborator, layout)?;
    workbook.save(output_path)?;
    Ok(())
}

/// Copy the template file to `output_path`, then patch the copy in place
///
/// A copy that could not be patched is removed again.
pub fn build_interface_in_place(
    template_path: &Path,
    output_path: &Path,
    collaborator: &str,
    layout: &ValidationLayout,
) -> RoadmapResult<()> {
    std::fs::copy(template_path, output_path)?;
    let result = patch_copy(output_path, collaborator, layout);
    if result.is_err() {
        if let Err(e) = std::fs::remove_file(output_path) {
            log::warn!("Could not remove partial copy {}: {}", output_path.display(), e);
        }
    }
    result
}

fn patch_copy(path: &Path, collaborator: &str, layout: &ValidationLayout) -> RoadmapResult<()> {
    let mut workbook = XlsxWorkbook::open(path)?;
    stamp_interface(&mut workbook, collaborator, layout)?;
    workbook.save(path)?;
    Ok(())
}

fn stamp_interface(
    workbook: &mut XlsxWorkbook,
    collaborator: &str,
    layout: &ValidationLayout,
) -> RoadmapResult<()> {
    let mut pointage = workbook.worksheet(POINTAGE_SHEET)?;
    let (row, col) = NAME_CELL;
    pointage.set_value(row, col, collaborator);
    install_validations(&mut pointage, layout);
    workbook.put_worksheet(&pointage)?;
    Ok(())
}

/// Replace every validation of `sheet` with the four standard dropdowns
///
/// Running it again leaves the same four validations.
pub fn install_validations(sheet: &mut Worksheet, layout: &ValidationLayout) {
    sheet.clear_data_validations();
    for validation in standard_validations(layout) {
        sheet.add_data_validation(validation);
    }
}

/// The four dropdowns (D to G) for a layout
pub fn standard_validations(layout: &ValidationLayout) -> Vec<DataValidation> {
    let first = layout.start_row.saturating_sub(1);
    let last = layout.end_row.saturating_sub(1);

    DROPDOWNS
        .iter()
        .map(|&(target, source_sheet, source_col, source_row)| {
            let source_last = if source_sheet == POINTAGE_SHEET {
                source_row
            } else {
                layout.source_end_row
            };
            let source = CellRange::new(
                CellAddress::absolute(source_row - 1, source_col),
                CellAddress::absolute(source_last.saturating_sub(1), source_col),
            );
            DataValidation::list(source.to_sheet_reference(source_sheet))
                .with_range(CellRange::column(target, first, last))
        })
        .collect()
}
