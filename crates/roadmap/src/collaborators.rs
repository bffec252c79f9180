//! Collaborator list sources
//!
//! The canonical source is the `collabs.xml` handoff written next to the
//! master workbook, consumed (deleted) once read. The legacy source is
//! column B of the master workbook's `Gestion_Interfaces` sheet. Neither
//! source ever raises: anything unreadable degrades to an empty list.

use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;
use roadmap_xlsx::{Worksheet, XlsxWorkbook};

use crate::error::RoadmapResult;
use crate::layout::{COLLABORATORS_SHEET, COLLABORATORS_XML};
use crate::options::DataSource;

/// First data row of the collaborator column (0-based, sheet row 3)
const SHEET_FIRST_ROW: u32 = 2;
/// Collaborator column (B)
const SHEET_COLUMN: u16 = 1;

/// Read the collaborator list from the configured source
pub fn read_collaborators(source: DataSource, base_dir: &Path, master: &Path) -> Vec<String> {
    match source {
        DataSource::Xml => read_collaborators_xml(base_dir),
        DataSource::Master => read_collaborators_master(master),
    }
}

/// Read and consume `<base_dir>/collabs.xml`
pub fn read_collaborators_xml(base_dir: &Path) -> Vec<String> {
    let xml_file = base_dir.join(COLLABORATORS_XML);
    if !xml_file.exists() {
        log::info!(
            "[GET_COLLABORATORS] {} file not found: {}",
            COLLABORATORS_XML,
            xml_file.display()
        );
        return Vec::new();
    }

    log::info!("[GET_COLLABORATORS] Reading from XML file: {}", xml_file.display());
    let collaborators = match std::fs::read_to_string(&xml_file)
        .map_err(Into::into)
        .and_then(|text| parse_collaborators_xml(&text))
    {
        Ok(collaborators) => collaborators,
        Err(e) => {
            log::error!("[GET_COLLABORATORS] Error reading XML file: {}", e);
            return Vec::new();
        }
    };
    log::info!(
        "[GET_COLLABORATORS] Read {} collaborators from XML",
        collaborators.len()
    );

    match std::fs::remove_file(&xml_file) {
        Ok(()) => log::info!("[GET_COLLABORATORS] Deleted XML file: {}", xml_file.display()),
        Err(e) => log::warn!("[GET_COLLABORATORS] Could not delete XML file: {}", e),
    }

    collaborators
}

/// Names from the direct `<collaborator>` children of the root element
///
/// Text is trimmed and empty entries are dropped; every entry is read.
pub fn parse_collaborators_xml(xml: &str) -> RoadmapResult<Vec<String>> {
    let xml = xml.strip_prefix('\u{feff}').unwrap_or(xml);
    let mut reader = Reader::from_str(xml);
    let mut names = Vec::new();

    let mut depth = 0usize;
    // Text of the collaborator element being read, until its first child
    let mut current: Option<String> = None;
    let mut child_seen = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                if depth == 2 && e.name().as_ref() == b"collaborator" {
                    current = Some(String::new());
                    child_seen = false;
                } else if depth > 2 {
                    child_seen = true;
                }
            }
            Event::Text(t) if depth == 2 && !child_seen => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&t.unescape()?);
                }
            }
            Event::CData(t) if depth == 2 && !child_seen => {
                if let Some(text) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    if let Some(text) = current.take() {
                        let name = text.trim();
                        if !name.is_empty() {
                            names.push(name.to_string());
                        }
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(names)
}

/// Read column B of the master workbook's `Gestion_Interfaces` sheet
pub fn read_collaborators_master(master: &Path) -> Vec<String> {
    let workbook = match XlsxWorkbook::open(master) {
        Ok(workbook) => workbook,
        Err(e) => {
            log::error!(
                "[GET_COLLABORATORS] Error reading {}: {}",
                master.display(),
                e
            );
            return Vec::new();
        }
    };

    match workbook.worksheet(COLLABORATORS_SHEET) {
        Ok(sheet) => {
            let collaborators = collaborators_from_sheet(&sheet);
            log::info!(
                "[GET_COLLABORATORS] Read {} collaborators from '{}'",
                collaborators.len(),
                COLLABORATORS_SHEET
            );
            collaborators
        }
        Err(e) => {
            log::error!("[GET_COLLABORATORS] {}", e);
            Vec::new()
        }
    }
}

/// Names from B3 downward, stopping at the first blank cell
pub fn collaborators_from_sheet(sheet: &Worksheet) -> Vec<String> {
    (SHEET_FIRST_ROW..)
        .map(|row| sheet.value(row, SHEET_COLUMN))
        .take_while(|value| !value.is_empty())
        .map(|value| value.display_text().trim().to_string())
        .collect()
}
