//! Worksheet part: decoded cells plus everything needed to write it back
//!
//! A [`Worksheet`] is a detached copy of one sheet. Cells that are never
//! touched keep their original XML (formulas, rich text, shared formulas),
//! and the markup around `sheetData` is carried as text. Serializing rebuilds
//! `sheetData`, refreshes `<dimension>` and, when the validation list was
//! changed, swaps the `<dataValidations>` block and drops the extension
//! (`x14`) validations.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{
    attr_value, decode_excel_escapes, element_span, encode_excel_escapes, escape_text, escape_xml,
    find_tag, position, raw_attributes, tag_start,
};
use roadmap_core::{format_number, CellAddress, CellRange, CellValue, DataValidation, ValidationType};

/// Elements that may follow `dataValidations` in a worksheet, in schema order
const AFTER_DATA_VALIDATIONS: &[&str] = &[
    "hyperlinks",
    "printOptions",
    "pageMargins",
    "pageSetup",
    "headerFooter",
    "rowBreaks",
    "colBreaks",
    "customProperties",
    "cellWatches",
    "ignoredErrors",
    "smartTags",
    "drawing",
    "legacyDrawing",
    "legacyDrawingHF",
    "drawingHF",
    "picture",
    "oleObjects",
    "controls",
    "webPublishItems",
    "tableParts",
    "extLst",
];

#[derive(Debug, Clone, Default)]
struct Cell {
    value: CellValue,
    style: u32,
    /// Original `<c>` markup, dropped as soon as the cell is modified
    raw: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct Row {
    /// Attributes other than `r` and `spans`, still escaped
    attrs: Vec<(String, String)>,
    cells: BTreeMap<u16, Cell>,
}

#[derive(Debug, Clone)]
struct SheetValidation {
    rule: DataValidation,
    raw: Option<String>,
}

/// A worksheet decoded from, and serializable back into, its XML part
#[derive(Debug, Clone)]
pub struct Worksheet {
    name: String,
    path: String,
    prefix: String,
    suffix: String,
    rows: BTreeMap<u32, Row>,
    validations: Vec<SheetValidation>,
    validations_changed: bool,
}

impl Worksheet {
    /// Decode a worksheet part
    pub(crate) fn parse(
        name: &str,
        path: &str,
        xml: &str,
        shared_strings: &[String],
    ) -> XlsxResult<Self> {
        let (start, end) = element_span(xml, "sheetData")
            .ok_or_else(|| XlsxError::Parse(format!("{} has no sheetData", path)))?;

        let prefix = xml[..start].to_string();
        let suffix = xml[end..].to_string();
        let rows = parse_sheet_data(&xml[start..end], shared_strings)?;
        let validations = match element_span(&suffix, "dataValidations") {
            Some((s, e)) => parse_validations(&suffix[s..e])?,
            None => Vec::new(),
        };

        Ok(Self {
            name: name.to_string(),
            path: path.to_string(),
            prefix,
            suffix,
            rows,
            validations,
            validations_changed: false,
        })
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Part path inside the package
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    fn cell(&self, row: u32, col: u16) -> Option<&Cell> {
        self.rows.get(&row).and_then(|r| r.cells.get(&col))
    }

    /// Value of a cell (0-based); missing cells are empty
    pub fn value(&self, row: u32, col: u16) -> CellValue {
        self.cell(row, col)
            .map(|c| c.value.clone())
            .unwrap_or_default()
    }

    /// Value of a cell by A1 reference
    pub fn value_at(&self, reference: &str) -> XlsxResult<CellValue> {
        let addr = CellAddress::parse(reference)?;
        Ok(self.value(addr.row, addr.col))
    }

    /// `cellXfs` index of a cell; 0 when unstyled or missing
    pub fn style(&self, row: u32, col: u16) -> u32 {
        self.cell(row, col).map(|c| c.style).unwrap_or(0)
    }

    /// Set a value, keeping the cell's current style
    pub fn set_value(&mut self, row: u32, col: u16, value: impl Into<CellValue>) {
        let style = self.style(row, col);
        self.set_value_with_style(row, col, value, style);
    }

    /// Set a value together with its style
    pub fn set_value_with_style(
        &mut self,
        row: u32,
        col: u16,
        value: impl Into<CellValue>,
        style: u32,
    ) {
        let cell = self
            .rows
            .entry(row)
            .or_default()
            .cells
            .entry(col)
            .or_default();
        cell.value = value.into();
        cell.style = style;
        cell.raw = None;
    }

    /// Remove a cell's value but keep its style; returns whether it held one
    pub fn clear_value(&mut self, row: u32, col: u16) -> bool {
        let Some(r) = self.rows.get_mut(&row) else {
            return false;
        };
        let Some(cell) = r.cells.get_mut(&col) else {
            return false;
        };
        let had_value = !matches!(cell.value, CellValue::Empty);
        if cell.style == 0 {
            r.cells.remove(&col);
        } else {
            cell.value = CellValue::Empty;
            cell.raw = None;
        }
        had_value
    }

    /// Clear every value at or below `min_row` and at or right of `min_col`
    ///
    /// Cell styles stay in place. Returns how many cells held a value.
    pub fn clear_region(&mut self, min_row: u32, min_col: u16) -> usize {
        let mut cleared = 0;
        for (_, row) in self.rows.range_mut(min_row..) {
            row.cells.retain(|&col, cell| {
                if col < min_col {
                    return true;
                }
                if !matches!(cell.value, CellValue::Empty) {
                    cleared += 1;
                }
                cell.value = CellValue::Empty;
                cell.raw = None;
                cell.style != 0
            });
        }
        cleared
    }

    /// Highest row (0-based) holding a non-empty value
    pub fn max_row(&self) -> Option<u32> {
        self.rows
            .iter()
            .rev()
            .find(|(_, row)| row.cells.values().any(|c| !c.value.is_empty()))
            .map(|(&r, _)| r)
    }

    /// Data validations, in document order
    pub fn data_validations(&self) -> Vec<&DataValidation> {
        self.validations.iter().map(|v| &v.rule).collect()
    }

    /// Remove every data validation
    pub fn clear_data_validations(&mut self) {
        self.validations.clear();
        self.validations_changed = true;
    }

    /// Append a data validation
    pub fn add_data_validation(&mut self, validation: DataValidation) {
        self.validations.push(SheetValidation {
            rule: validation,
            raw: None,
        });
        self.validations_changed = true;
    }

    /// Serialize back into a complete worksheet part
    pub(crate) fn to_xml(&self) -> String {
        let mut out = String::with_capacity(self.prefix.len() + self.suffix.len() + 4096);
        out.push_str(&self.dimension_patched_prefix());
        self.write_sheet_data(&mut out);

        if self.validations_changed {
            out.push_str(&self.suffix_with_validations());
        } else {
            out.push_str(&self.suffix);
        }
        out
    }

    fn used_range(&self) -> Option<CellRange> {
        let mut bounds: Option<(u32, u16, u32, u16)> = None;
        for (&r, row) in &self.rows {
            for (&c, _) in row.cells.iter() {
                bounds = Some(match bounds {
                    None => (r, c, r, c),
                    Some((r0, c0, r1, c1)) => (r0.min(r), c0.min(c), r1.max(r), c1.max(c)),
                });
            }
        }
        bounds.map(|(r0, c0, r1, c1)| {
            CellRange::new(CellAddress::new(r0, c0), CellAddress::new(r1, c1))
        })
    }

    fn dimension_patched_prefix(&self) -> String {
        let Some((start, end)) = element_span(&self.prefix, "dimension") else {
            return self.prefix.clone();
        };
        let reference = self
            .used_range()
            .map(|r| r.to_a1_string())
            .unwrap_or_else(|| "A1".to_string());
        format!(
            "{}<dimension ref=\"{}\"/>{}",
            &self.prefix[..start],
            reference,
            &self.prefix[end..]
        )
    }

    fn write_sheet_data(&self, out: &mut String) {
        let rows: Vec<_> = self
            .rows
            .iter()
            .filter(|(_, row)| !row.cells.is_empty() || !row.attrs.is_empty())
            .collect();
        if rows.is_empty() {
            out.push_str("<sheetData/>");
            return;
        }

        out.push_str("<sheetData>");
        for (&r, row) in rows {
            out.push_str(&format!("<row r=\"{}\"", r + 1));
            for (key, value) in &row.attrs {
                out.push_str(&format!(" {}=\"{}\"", key, value));
            }
            if row.cells.is_empty() {
                out.push_str("/>");
                continue;
            }
            out.push('>');
            for (&c, cell) in &row.cells {
                match &cell.raw {
                    Some(raw) => out.push_str(raw),
                    None => write_cell(out, r, c, cell),
                }
            }
            out.push_str("</row>");
        }
        out.push_str("</sheetData>");
    }

    fn validations_xml(&self) -> String {
        let mut out = format!("<dataValidations count=\"{}\">", self.validations.len());
        for validation in &self.validations {
            match &validation.raw {
                Some(raw) => out.push_str(raw),
                None => write_validation(&mut out, &validation.rule),
            }
        }
        out.push_str("</dataValidations>");
        out
    }

    fn suffix_with_validations(&self) -> String {
        let mut suffix = self.suffix.clone();
        if let Some((start, end)) = element_span(&suffix, "dataValidations") {
            suffix.replace_range(start..end, "");
        }
        strip_extension_validations(&mut suffix);
        if self.validations.is_empty() {
            return suffix;
        }

        let insert_at = AFTER_DATA_VALIDATIONS
            .iter()
            .filter_map(|name| find_tag(&suffix, name))
            .min()
            .or_else(|| suffix.rfind("</worksheet>"))
            .unwrap_or(suffix.len());
        suffix.insert_str(insert_at, &self.validations_xml());
        suffix
    }
}

/// Drop `x14:dataValidations` from `extLst`, then any `ext` or `extLst`
/// left without content
fn strip_extension_validations(suffix: &mut String) {
    while let Some((start, end)) = element_span(suffix, "x14:dataValidations") {
        suffix.replace_range(start..end, "");

        let Some(ext_start) = enclosing_tag(suffix, start, "ext") else {
            continue;
        };
        if let Some((open_end, close_start, end)) = element_parts(suffix, ext_start, "ext") {
            if suffix[open_end..close_start].trim().is_empty() {
                suffix.replace_range(ext_start..end, "");
            }
        }
    }

    if let Some(list_start) = find_tag(suffix, "extLst") {
        if let Some((open_end, close_start, end)) = element_parts(suffix, list_start, "extLst") {
            if suffix[open_end..close_start].trim().is_empty() {
                suffix.replace_range(list_start..end, "");
            }
        }
    }
}

/// Start of the last `name` tag opened before `at`
fn enclosing_tag(xml: &str, at: usize, name: &str) -> Option<usize> {
    let mut found = None;
    let mut from = 0;
    while let Some(idx) = find_tag(&xml[from..at], name) {
        found = Some(from + idx);
        from += idx + name.len() + 1;
    }
    found
}

/// Open tag end, close tag start and element end of the `name` element at
/// `start`; a self-closing element has an empty body
fn element_parts(xml: &str, start: usize, name: &str) -> Option<(usize, usize, usize)> {
    let (span_start, end) = element_span(&xml[start..], name)?;
    let (span_start, end) = (start + span_start, start + end);
    let open_end = span_start + xml[span_start..end].find('>')? + 1;
    if open_end == end {
        return Some((open_end, open_end, end));
    }
    let close_start = xml[..end].rfind("</")?;
    Some((open_end, close_start, end))
}

fn write_cell(out: &mut String, row: u32, col: u16, cell: &Cell) {
    let reference = CellAddress::new(row, col).to_a1_string();
    let style = if cell.style != 0 {
        format!(" s=\"{}\"", cell.style)
    } else {
        String::new()
    };

    match &cell.value {
        CellValue::Empty => {
            out.push_str(&format!("<c r=\"{}\"{}/>", reference, style));
        }
        CellValue::Number(n) => {
            out.push_str(&format!(
                "<c r=\"{}\"{}><v>{}</v></c>",
                reference,
                style,
                format_number(*n)
            ));
        }
        CellValue::Text(s) => {
            let space = if s.trim() != s || s.contains('\n') {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            out.push_str(&format!(
                "<c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
                reference,
                style,
                space,
                escape_text(&encode_excel_escapes(s))
            ));
        }
        CellValue::Boolean(b) => {
            out.push_str(&format!(
                "<c r=\"{}\"{} t=\"b\"><v>{}</v></c>",
                reference,
                style,
                if *b { 1 } else { 0 }
            ));
        }
        CellValue::Error(e) => {
            out.push_str(&format!(
                "<c r=\"{}\"{} t=\"e\"><v>{}</v></c>",
                reference,
                style,
                escape_text(e)
            ));
        }
    }
}

fn write_validation(out: &mut String, validation: &DataValidation) {
    out.push_str(&format!(
        "<dataValidation type=\"{}\"",
        escape_xml(validation.validation_type.xlsx_type())
    ));
    if validation.allow_blank {
        out.push_str(" allowBlank=\"1\"");
    }
    // showDropDown="1" hides the in-cell arrow
    if !validation.show_dropdown {
        out.push_str(" showDropDown=\"1\"");
    }
    if validation.show_error_alert {
        out.push_str(" showErrorMessage=\"1\"");
    }
    out.push_str(&format!(" sqref=\"{}\">", validation.sqref()));

    let formula = match &validation.validation_type {
        ValidationType::List { source } => {
            if source.contains('!') || source.starts_with('$') || source.starts_with('"') {
                Some(source.clone())
            } else {
                Some(format!("\"{}\"", source))
            }
        }
        ValidationType::Custom { formula } => Some(formula.trim_start_matches('=').to_string()),
        ValidationType::Other { .. } => None,
    };
    if let Some(formula) = formula {
        out.push_str(&format!("<formula1>{}</formula1>", escape_text(&formula)));
    }
    out.push_str("</dataValidation>");
}

#[derive(Default)]
struct PendingCell {
    start: usize,
    col: u16,
    style: u32,
    kind: Option<String>,
    has_ref: bool,
    value: Option<String>,
    inline: String,
    in_inline: bool,
}

fn parse_sheet_data(xml: &str, shared_strings: &[String]) -> XlsxResult<BTreeMap<u32, Row>> {
    let mut rows: BTreeMap<u32, Row> = BTreeMap::new();
    let mut reader = Reader::from_str(xml);

    let mut current_row: u32 = 0;
    let mut next_row: u32 = 0;
    let mut next_col: u16 = 0;
    let mut cell: Option<PendingCell> = None;
    let mut in_value = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.name().as_ref() {
                b"row" => {
                    current_row = open_row(&e, next_row, &mut rows)?;
                    next_row = current_row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let pending = open_cell(&e, tag_start(xml, &reader), next_col)?;
                    next_col = pending.col.saturating_add(1);
                    cell = Some(pending);
                }
                b"v" if cell.is_some() => in_value = true,
                b"is" => {
                    if let Some(pending) = cell.as_mut() {
                        pending.in_inline = true;
                    }
                }
                b"rPh" => in_phonetic = true,
                b"t" if !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) => match e.name().as_ref() {
                b"row" => {
                    current_row = open_row(&e, next_row, &mut rows)?;
                    next_row = current_row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let pending = open_cell(&e, tag_start(xml, &reader), next_col)?;
                    next_col = pending.col.saturating_add(1);
                    let raw = &xml[pending.start..position(&reader)];
                    finish_cell(&mut rows, current_row, pending, raw, shared_strings)?;
                }
                _ => {}
            },
            Event::Text(t) => {
                if let Some(pending) = cell.as_mut() {
                    let text = t.unescape()?;
                    if in_value {
                        pending.value.get_or_insert_with(String::new).push_str(&text);
                    } else if in_text && pending.in_inline {
                        pending.inline.push_str(&text);
                    }
                }
            }
            Event::CData(t) => {
                if let Some(pending) = cell.as_mut() {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    if in_value {
                        pending.value.get_or_insert_with(String::new).push_str(&text);
                    } else if in_text && pending.in_inline {
                        pending.inline.push_str(&text);
                    }
                }
            }
            Event::End(e) => match e.name().as_ref() {
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let raw = &xml[pending.start..position(&reader)];
                        finish_cell(&mut rows, current_row, pending, raw, shared_strings)?;
                    }
                }
                b"v" => in_value = false,
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(rows)
}

fn open_row(e: &BytesStart<'_>, next_row: u32, rows: &mut BTreeMap<u32, Row>) -> XlsxResult<u32> {
    let index = match attr_value(e, b"r") {
        Some(r) => r
            .parse::<u32>()
            .ok()
            .filter(|&n| n >= 1)
            .map(|n| n - 1)
            .ok_or_else(|| XlsxError::Parse(format!("Invalid row number '{}'", r)))?,
        None => next_row,
    };

    let attrs = raw_attributes(e)
        .into_iter()
        .filter(|(k, _)| k != "r" && k != "spans")
        .collect();
    rows.entry(index).or_default().attrs = attrs;
    Ok(index)
}

fn open_cell(e: &BytesStart<'_>, start: usize, next_col: u16) -> XlsxResult<PendingCell> {
    let reference = attr_value(e, b"r");
    let col = match &reference {
        Some(r) => {
            CellAddress::parse(r)
                .map_err(|err| {
                    XlsxError::Parse(format!("Invalid cell reference '{}': {}", r, err))
                })?
                .col
        }
        None => next_col,
    };

    Ok(PendingCell {
        start,
        col,
        style: attr_value(e, b"s")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0),
        kind: attr_value(e, b"t"),
        has_ref: reference.is_some(),
        ..PendingCell::default()
    })
}

fn finish_cell(
    rows: &mut BTreeMap<u32, Row>,
    row: u32,
    pending: PendingCell,
    raw: &str,
    shared_strings: &[String],
) -> XlsxResult<()> {
    let value = decode_value(&pending, shared_strings)?;
    let raw = if pending.has_ref {
        Some(raw.to_string())
    } else {
        None
    };
    rows.entry(row).or_default().cells.insert(
        pending.col,
        Cell {
            value,
            style: pending.style,
            raw,
        },
    );
    Ok(())
}

fn decode_value(pending: &PendingCell, shared_strings: &[String]) -> XlsxResult<CellValue> {
    if pending.kind.as_deref() == Some("inlineStr") {
        return Ok(match (pending.in_inline, &pending.value) {
            (true, _) => CellValue::Text(decode_excel_escapes(&pending.inline)),
            (false, Some(v)) => CellValue::Text(decode_excel_escapes(v)),
            (false, None) => CellValue::Empty,
        });
    }

    let Some(value) = pending.value.as_deref() else {
        return Ok(CellValue::Empty);
    };

    Ok(match pending.kind.as_deref() {
        // Shared string
        Some("s") => {
            let idx: usize = value.trim().parse().map_err(|_| {
                XlsxError::Parse(format!("Invalid shared string index: {}", value))
            })?;
            let s = shared_strings.get(idx).ok_or_else(|| {
                XlsxError::Parse(format!("Shared string index {} out of bounds", idx))
            })?;
            CellValue::Text(s.clone())
        }

        // Boolean
        Some("b") => CellValue::Boolean(value == "1" || value.eq_ignore_ascii_case("true")),

        // Error
        Some("e") => CellValue::Error(value.to_string()),

        // Formula string result, or an ISO date written as text
        Some("str") | Some("d") => CellValue::Text(decode_excel_escapes(value)),

        // Number (default type or explicit "n")
        None | Some("n") => match value.trim().parse::<f64>() {
            Ok(n) => CellValue::Number(n),
            Err(_) => CellValue::Text(value.to_string()),
        },

        // Unknown type - treat as string
        Some(_) => CellValue::Text(value.to_string()),
    })
}

fn parse_validations(xml: &str) -> XlsxResult<Vec<SheetValidation>> {
    let mut validations = Vec::new();
    let mut reader = Reader::from_str(xml);

    let mut current: Option<(usize, DataValidation)> = None;
    let mut in_formula1 = false;
    let mut formula1 = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) if e.name().as_ref() == b"dataValidation" => {
                current = Some((tag_start(xml, &reader), validation_from_attrs(&e)));
                formula1.clear();
            }
            Event::Empty(e) if e.name().as_ref() == b"dataValidation" => {
                let start = tag_start(xml, &reader);
                validations.push(SheetValidation {
                    rule: validation_from_attrs(&e),
                    raw: Some(xml[start..position(&reader)].to_string()),
                });
            }
            Event::Start(e) if e.name().as_ref() == b"formula1" => in_formula1 = true,
            Event::Text(t) if in_formula1 => formula1.push_str(&t.unescape()?),
            Event::End(e) => match e.name().as_ref() {
                b"formula1" => in_formula1 = false,
                b"dataValidation" => {
                    if let Some((start, mut rule)) = current.take() {
                        apply_formula(&mut rule, &formula1);
                        validations.push(SheetValidation {
                            rule,
                            raw: Some(xml[start..position(&reader)].to_string()),
                        });
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(validations)
}

fn validation_from_attrs(e: &BytesStart<'_>) -> DataValidation {
    let kind = attr_value(e, b"type").unwrap_or_else(|| "none".to_string());
    let mut validation = match kind.as_str() {
        "list" => DataValidation::list(""),
        "custom" => DataValidation::custom(""),
        _ => DataValidation {
            validation_type: ValidationType::Other { kind },
            ..DataValidation::default()
        },
    };

    let flag = |key: &[u8]| attr_value(e, key).map(|v| v == "1" || v == "true");
    validation.allow_blank = flag(b"allowBlank").unwrap_or(false);
    validation.show_dropdown = !flag(b"showDropDown").unwrap_or(false);
    validation.show_error_alert = flag(b"showErrorMessage").unwrap_or(false);
    if let Some(sqref) = attr_value(e, b"sqref") {
        validation.ranges = sqref
            .split_whitespace()
            .filter_map(|s| CellRange::parse(s).ok())
            .collect();
    }
    validation
}

fn apply_formula(validation: &mut DataValidation, formula1: &str) {
    match &mut validation.validation_type {
        ValidationType::List { source } => *source = formula1.trim_matches('"').to_string(),
        ValidationType::Custom { formula } => *formula = formula1.to_string(),
        ValidationType::Other { .. } => {}
    }
}
