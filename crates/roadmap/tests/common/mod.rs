//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use roadmap::layout::{
    COLLABORATORS_SHEET, COLLABORATORS_XML, INTERFACES_DIR, LC_SHEET, LC_WORKBOOK, MASTER_FILE,
    POINTAGE_SHEET, TEMPLATE_FILE,
};
use roadmap::{RoadmapManager, RoadmapOptions, Worksheet, XlsxWorkbook};
use roadmap_xlsx::Package;
use tempfile::TempDir;

/// Part holding the first sheet (POINTAGE) of every fixture workbook
pub const POINTAGE_PART: &str = "xl/worksheets/sheet1.xml";

/// A base directory with the master workbook and the template in place
pub struct BaseDir {
    pub dir: TempDir,
}

impl BaseDir {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_master(&dir.path().join(MASTER_FILE), &[], &[]);
        write_template(&dir.path().join(TEMPLATE_FILE));
        Self { dir }
    }

    /// A base directory without the master workbook
    pub fn without_master() -> Self {
        let dir = tempfile::tempdir().unwrap();
        write_template(&dir.path().join(TEMPLATE_FILE));
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn manager(&self) -> RoadmapManager {
        RoadmapManager::new(self.path(), RoadmapOptions::default()).unwrap()
    }

    pub fn manager_with(&self, options: RoadmapOptions) -> RoadmapManager {
        RoadmapManager::new(self.path(), options).unwrap()
    }

    pub fn interfaces_dir(&self) -> PathBuf {
        self.path().join(INTERFACES_DIR)
    }

    pub fn interface(&self, name: &str) -> PathBuf {
        self.interfaces_dir().join(format!("RM_{}.xlsx", name))
    }

    pub fn template(&self) -> PathBuf {
        self.path().join(TEMPLATE_FILE)
    }

    pub fn master(&self) -> PathBuf {
        self.path().join(MASTER_FILE)
    }

    /// Write the `collabs.xml` handoff
    pub fn write_collaborators(&self, names: &[&str]) {
        let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<collaborators>\n");
        for name in names {
            xml.push_str(&format!("  <collaborator>{}</collaborator>\n", name));
        }
        xml.push_str("</collaborators>\n");
        std::fs::write(self.path().join(COLLABORATORS_XML), xml).unwrap();
    }

    /// Write the `LC.xlsx` handoff: a header row then `rows` from row 2
    pub fn write_lc_workbook(&self, rows: &[[&str; 8]]) {
        let mut workbook = XlsxWorkbook::blank(&[LC_SHEET]).unwrap();
        let mut sheet = workbook.worksheet(LC_SHEET).unwrap();
        sheet.set_value(0, 1, "Key");
        fill_lc(&mut sheet, 1, rows);
        workbook.put_worksheet(&sheet).unwrap();
        workbook.save(self.path().join(LC_WORKBOOK)).unwrap();
    }

    /// Place an interface file with POINTAGE rows starting at sheet row 4
    pub fn write_interface(&self, name: &str, total: Option<f64>, rows: &[&[&str]]) -> PathBuf {
        let path = self.interface(name);
        std::fs::create_dir_all(self.interfaces_dir()).unwrap();
        let mut workbook = XlsxWorkbook::blank(&[POINTAGE_SHEET, LC_SHEET]).unwrap();
        let mut sheet = workbook.worksheet(POINTAGE_SHEET).unwrap();
        sheet.set_value(0, 1, name);
        if let Some(total) = total {
            sheet.set_value(0, 10, total);
        }
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                if !value.is_empty() {
                    sheet.set_value(3 + r as u32, c as u16, *value);
                }
            }
        }
        workbook.put_worksheet(&sheet).unwrap();
        workbook.save(&path).unwrap();
        path
    }
}

impl BaseDir {
    /// Place an interface file whose POINTAGE sheet is filled by `fill`,
    /// which may add number formats to the workbook
    pub fn write_interface_with(
        &self,
        name: &str,
        fill: impl FnOnce(&mut XlsxWorkbook, &mut Worksheet),
    ) -> PathBuf {
        let path = self.interface(name);
        std::fs::create_dir_all(self.interfaces_dir()).unwrap();
        let mut workbook = XlsxWorkbook::blank(&[POINTAGE_SHEET, LC_SHEET]).unwrap();
        let mut sheet = workbook.worksheet(POINTAGE_SHEET).unwrap();
        sheet.set_value(0, 1, name);
        fill(&mut workbook, &mut sheet);
        workbook.put_worksheet(&sheet).unwrap();
        workbook.save(&path).unwrap();
        path
    }
}

/// Master workbook with collaborators from B3 and LC rows from row 3
pub fn write_master(path: &Path, collaborators: &[&str], lc_rows: &[[&str; 8]]) {
    let mut workbook = XlsxWorkbook::blank(&[COLLABORATORS_SHEET, LC_SHEET]).unwrap();

    let mut sheet = workbook.worksheet(COLLABORATORS_SHEET).unwrap();
    sheet.set_value(1, 1, "Collaborateur");
    for (i, name) in collaborators.iter().enumerate() {
        sheet.set_value(2 + i as u32, 1, *name);
    }
    workbook.put_worksheet(&sheet).unwrap();

    let mut sheet = workbook.worksheet(LC_SHEET).unwrap();
    sheet.set_value(1, 1, "Key");
    fill_lc(&mut sheet, 2, lc_rows);
    workbook.put_worksheet(&sheet).unwrap();

    workbook.save(path).unwrap();
}

/// Template with empty POINTAGE and LC sheets
pub fn write_template(path: &Path) {
    XlsxWorkbook::blank(&[POINTAGE_SHEET, LC_SHEET])
        .unwrap()
        .save(path)
        .unwrap();
}

/// Template whose POINTAGE sheet also carries an `x14` list validation in
/// its extension list, the way spreadsheet applications save cross-sheet lists
pub fn write_template_with_extension_validations(path: &Path) {
    write_template(path);
    let mut package = Package::open(path).unwrap();
    let xml = package.get_text(POINTAGE_PART).unwrap();
    let end = xml.rfind("</worksheet>").unwrap();
    let patched = format!(
        "{}{}{}",
        &xml[..end],
        concat!(
            r#"<extLst><ext uri="{CCE6A557-97BC-4b89-ADB6-D9C93CAAB3DF}" xmlns:x14="http://schemas.microsoft.com/office/spreadsheetml/2009/9/main">"#,
            r#"<x14:dataValidations count="1" xmlns:xm="http://schemas.microsoft.com/office/excel/2006/main">"#,
            r#"<x14:dataValidation type="list" allowBlank="1" showErrorMessage="1">"#,
            r#"<x14:formula1><xm:f>LC!$B$3:$B$50</xm:f></x14:formula1><xm:sqref>E3:E1000</xm:sqref>"#,
            r#"</x14:dataValidation></x14:dataValidations></ext></extLst>"#
        ),
        &xml[end..]
    );
    package.set(POINTAGE_PART, patched.into_bytes());
    package.save(path).unwrap();
}

/// Raw POINTAGE sheet XML of a workbook
pub fn pointage_xml(path: &Path) -> String {
    Package::open(path).unwrap().get_text(POINTAGE_PART).unwrap()
}

/// `sqref` of every classic validation on a workbook's POINTAGE sheet
pub fn validation_targets(path: &Path) -> Vec<String> {
    XlsxWorkbook::open(path)
        .unwrap()
        .worksheet(POINTAGE_SHEET)
        .unwrap()
        .data_validations()
        .iter()
        .map(|v| v.sqref())
        .collect()
}

fn fill_lc(sheet: &mut Worksheet, first_row0: u32, rows: &[[&str; 8]]) {
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.set_value(first_row0 + r as u32, 1 + c as u16, *value);
            }
        }
    }
}

/// Column B of a workbook's LC sheet, from 1-based `first_row` to the last value
pub fn lc_column_b(path: &Path, first_row: u32) -> Vec<String> {
    let workbook = XlsxWorkbook::open(path).unwrap();
    let sheet = workbook.worksheet(LC_SHEET).unwrap();
    let Some(last) = sheet.max_row() else {
        return Vec::new();
    };
    (first_row - 1..=last)
        .map(|row| sheet.value(row, 1).display_text())
        .collect()
}

/// A full LC row keyed by `key`
pub fn lc_row(key: &'static str) -> [&'static str; 8] {
    [key, "label", "function", "d", "e", "f", "g", "h"]
}

/// Entry names of a zip archive
pub fn zip_entries(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

/// Files directly under `dir`, sorted
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
