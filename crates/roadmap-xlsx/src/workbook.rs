//! Workbook-level access: sheet lookup, shared strings, formats, save

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::package::Package;
use crate::styles::{minimal_styles_xml, StyleSheet, STYLES_PART};
use crate::worksheet::Worksheet;
use crate::xml::{attr_value, decode_excel_escapes, escape_xml};
use roadmap_core::NumberFormat;

const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

#[derive(Debug, Clone)]
struct SheetEntry {
    name: String,
    path: String,
}

/// An XLSX workbook opened for patching
///
/// Reads are served from the package as loaded; [`put_worksheet`] writes a
/// modified sheet back. Parts nobody touched are saved unchanged.
///
/// [`put_worksheet`]: XlsxWorkbook::put_worksheet
#[derive(Debug, Clone)]
pub struct XlsxWorkbook {
    package: Package,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
    styles: StyleSheet,
    date1904: bool,
}

impl XlsxWorkbook {
    /// Open a workbook from a file path
    pub fn open<P: AsRef<Path>>(path: P) -> XlsxResult<Self> {
        let file = File::open(path)?;
        Self::read(BufReader::new(file))
    }

    /// Open a workbook from an in-memory copy of the file
    pub fn from_bytes(bytes: &[u8]) -> XlsxResult<Self> {
        Self::read(Cursor::new(bytes))
    }

    /// Open a workbook from a reader
    pub fn read<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        Self::from_package(Package::read(reader)?)
    }

    fn from_package(package: Package) -> XlsxResult<Self> {
        let workbook_xml = package.get_text(WORKBOOK_PART)?;
        let (sheet_ids, date1904) = read_workbook_xml(&workbook_xml)?;
        let targets = read_workbook_rels(&package.get_text(WORKBOOK_RELS_PART)?)?;

        let mut sheets = Vec::with_capacity(sheet_ids.len());
        for (name, r_id) in sheet_ids {
            match targets.get(&r_id) {
                Some(path) => sheets.push(SheetEntry { name, path: path.clone() }),
                None => log::debug!("Sheet '{}' has no worksheet relationship, skipped", name),
            }
        }

        let shared_strings = if package.contains(SHARED_STRINGS_PART) {
            read_shared_strings(&package.get_text(SHARED_STRINGS_PART)?)?
        } else {
            Vec::new()
        };

        let styles_xml = if package.contains(STYLES_PART) {
            Some(package.get_text(STYLES_PART)?)
        } else {
            None
        };
        let styles = StyleSheet::parse(styles_xml)?;

        Ok(Self {
            package,
            sheets,
            shared_strings,
            styles,
            date1904,
        })
    }

    /// A minimal valid workbook with the given (empty) sheets
    pub fn blank(sheet_names: &[&str]) -> XlsxResult<Self> {
        if sheet_names.is_empty() {
            return Err(XlsxError::InvalidFormat(
                "A workbook needs at least one sheet".into(),
            ));
        }

        let mut package = Package::new();
        package.set(CONTENT_TYPES_PART, blank_content_types(sheet_names.len()).into_bytes());
        package.set("_rels/.rels", BLANK_ROOT_RELS.as_bytes().to_vec());
        package.set(WORKBOOK_PART, blank_workbook_xml(sheet_names).into_bytes());
        package.set(WORKBOOK_RELS_PART, blank_workbook_rels(sheet_names.len()).into_bytes());
        package.set(STYLES_PART, minimal_styles_xml().into_bytes());
        for i in 0..sheet_names.len() {
            package.set(
                &format!("xl/worksheets/sheet{}.xml", i + 1),
                BLANK_WORKSHEET.as_bytes().to_vec(),
            );
        }

        Self::from_package(package)
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    /// Whether a sheet with this exact name exists
    pub fn has_sheet(&self, name: &str) -> bool {
        self.sheets.iter().any(|s| s.name == name)
    }

    /// Whether the workbook uses the 1904 date system
    pub fn date1904(&self) -> bool {
        self.date1904
    }

    /// Decode a sheet by name
    pub fn worksheet(&self, name: &str) -> XlsxResult<Worksheet> {
        let entry = self
            .sheets
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| XlsxError::SheetNotFound(name.to_string()))?;
        let xml = self.package.get_text(&entry.path)?;
        Worksheet::parse(&entry.name, &entry.path, &xml, &self.shared_strings)
    }

    /// Write a modified sheet back into the package
    ///
    /// The calculation chain is dropped on the first rewrite; the application
    /// rebuilds it on the next recalculation.
    pub fn put_worksheet(&mut self, sheet: &Worksheet) -> XlsxResult<()> {
        if !self.package.contains(sheet.path()) {
            return Err(XlsxError::MissingPart(sheet.path().to_string()));
        }
        self.package.set(sheet.path(), sheet.to_xml().into_bytes());
        self.drop_calc_chain()?;
        Ok(())
    }

    /// Number format attached to a style index
    pub fn number_format(&self, style: u32) -> NumberFormat {
        self.styles.number_format(style)
    }

    /// Style index equal to `base_style` but with the built-in `num_fmt_id`
    pub fn style_with_number_format(&mut self, base_style: u32, num_fmt_id: u32) -> XlsxResult<u32> {
        let (index, updated) = self.styles.with_number_format(base_style, num_fmt_id)?;
        if let Some(xml) = updated {
            self.package.set(STYLES_PART, xml.into_bytes());
        }
        Ok(index)
    }

    /// Style index equal to `base_style` but formatted as text (`@`)
    pub fn text_style(&mut self, base_style: u32) -> XlsxResult<u32> {
        self.style_with_number_format(base_style, NumberFormat::ID_TEXT)
    }

    /// Save to a file path
    pub fn save<P: AsRef<Path>>(&self, path: P) -> XlsxResult<()> {
        self.package.save(path)
    }

    /// Serialize to bytes
    pub fn to_bytes(&self) -> XlsxResult<Vec<u8>> {
        self.package.to_bytes()
    }

    fn drop_calc_chain(&mut self) -> XlsxResult<()> {
        if !self.package.remove(CALC_CHAIN_PART) {
            return Ok(());
        }

        let content_types = self.package.get_text(CONTENT_TYPES_PART)?;
        let content_types = remove_elements(&content_types, "Override", "/xl/calcChain.xml");
        self.package.set(CONTENT_TYPES_PART, content_types.into_bytes());

        let rels = self.package.get_text(WORKBOOK_RELS_PART)?;
        let rels = remove_elements(&rels, "Relationship", "calcChain.xml\"");
        self.package.set(WORKBOOK_RELS_PART, rels.into_bytes());

        log::debug!("Dropped {} after sheet rewrite", CALC_CHAIN_PART);
        Ok(())
    }
}

/// Remove every empty `<name .../>` element whose markup contains `needle`
fn remove_elements(xml: &str, name: &str, needle: &str) -> String {
    let open = format!("<{} ", name);
    let mut out = String::with_capacity(xml.len());
    let mut rest = xml;

    while let Some(start) = rest.find(&open) {
        let Some(len) = rest[start..].find("/>") else {
            break;
        };
        let end = start + len + 2;
        out.push_str(&rest[..start]);
        if !rest[start..end].contains(needle) {
            out.push_str(&rest[start..end]);
        }
        rest = &rest[end..];
    }
    out.push_str(rest);
    out
}

/// Sheet (name, relationship id) pairs and the date1904 flag
fn read_workbook_xml(xml: &str) -> XlsxResult<(Vec<(String, String)>, bool)> {
    let mut reader = Reader::from_str(xml);
    let mut sheets = Vec::new();
    let mut date1904 = false;

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) => match e.name().as_ref() {
                b"sheet" => {
                    let name = attr_value(&e, b"name");
                    let r_id = attr_value(&e, b"r:id");
                    if let (Some(name), Some(r_id)) = (name, r_id) {
                        sheets.push((name, r_id));
                    }
                }
                b"workbookPr" => {
                    date1904 = attr_value(&e, b"date1904")
                        .map_or(false, |v| v == "1" || v.eq_ignore_ascii_case("true"));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok((sheets, date1904))
}

/// Worksheet relationship id → part path
fn read_workbook_rels(xml: &str) -> XlsxResult<HashMap<String, String>> {
    let mut reader = Reader::from_str(xml);
    let mut rels = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Empty(e) | Event::Start(e) if e.name().as_ref() == b"Relationship" => {
                let id = attr_value(&e, b"Id");
                let target = attr_value(&e, b"Target");
                let rel_type = attr_value(&e, b"Type");

                // Only include worksheet relationships
                if let (Some(id), Some(target), Some(rel_type)) = (id, target, rel_type) {
                    if rel_type.ends_with("/worksheet") {
                        // Target is relative to xl/ folder
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        };
                        rels.insert(id, full_path);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rels)
}

/// Read the shared strings table (phonetic runs excluded)
fn read_shared_strings(xml: &str) -> XlsxResult<Vec<String>> {
    let mut reader = Reader::from_str(xml);
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_si = false;
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"si" => {
                    in_si = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_si && !in_phonetic => in_t = true,
                _ => {}
            },
            Event::Empty(e) if e.name().as_ref() == b"si" => strings.push(String::new()),
            Event::End(e) => match e.name().as_ref() {
                b"si" => {
                    strings.push(decode_excel_escapes(&current));
                    in_si = false;
                }
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Text(e) if in_t => current.push_str(&e.unescape()?),
            Event::CData(e) if in_t => current.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(strings)
}

const BLANK_ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const BLANK_WORKSHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><dimension ref="A1"/><sheetData/><pageMargins left="0.7" right="0.7" top="0.75" bottom="0.75" header="0.3" footer="0.3"/></worksheet>"#;

fn blank_content_types(sheet_count: usize) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );

    // Add an override for each worksheet
    for i in 0..sheet_count {
        content.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i + 1
        ));
    }

    content.push_str("</Types>");
    content
}

fn blank_workbook_xml(sheet_names: &[&str]) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );

    for (i, name) in sheet_names.iter().enumerate() {
        content.push_str(&format!(
            r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
            escape_xml(name),
            i + 1,
            i + 1
        ));
    }

    content.push_str("</sheets></workbook>");
    content
}

fn blank_workbook_rels(sheet_count: usize) -> String {
    let mut content = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for i in 0..sheet_count {
        content.push_str(&format!(
            r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i + 1,
            i + 1
        ));
    }

    // Styles relationship
    content.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        sheet_count + 1
    ));

    content.push_str("</Relationships>");
    content
}
