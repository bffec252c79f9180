//! Cell format table (`xl/styles.xml`)
//!
//! Only what number-format handling needs is decoded: the custom `numFmts`
//! and the `numFmtId` of every `cellXfs` entry. New formats are appended by
//! cloning an existing `xf` so fonts, fills, borders and alignment carry over.

use std::collections::HashMap;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::{XlsxError, XlsxResult};
use crate::xml::{attr_value, escape_xml, position, raw_attributes, tag_start};
use roadmap_core::NumberFormat;

pub(crate) const STYLES_PART: &str = "xl/styles.xml";

#[derive(Debug, Clone)]
struct CellXf {
    num_fmt_id: u32,
    raw: String,
}

/// Parsed view over the styles part, kept alongside its text
#[derive(Debug, Clone, Default)]
pub(crate) struct StyleSheet {
    xml: Option<String>,
    num_fmts: HashMap<u32, String>,
    cell_xfs: Vec<CellXf>,
    derived: HashMap<(u32, u32), u32>,
}

impl StyleSheet {
    /// Parse the styles part; `None` means the package has none
    pub(crate) fn parse(xml: Option<String>) -> XlsxResult<Self> {
        let Some(text) = xml else {
            return Ok(Self::default());
        };

        let mut num_fmts = HashMap::new();
        let mut cell_xfs = Vec::new();

        let mut reader = Reader::from_str(&text);
        let mut in_cell_xfs = false;
        let mut xf_start: Option<(usize, u32)> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) | Event::Empty(e) if e.name().as_ref() == b"numFmt" => {
                    let id = attr_value(&e, b"numFmtId").and_then(|s| s.parse().ok());
                    let code = attr_value(&e, b"formatCode");
                    if let (Some(id), Some(code)) = (id, code) {
                        num_fmts.insert(id, code);
                    }
                }
                Event::Start(e) if e.name().as_ref() == b"cellXfs" => in_cell_xfs = true,
                Event::End(e) if e.name().as_ref() == b"cellXfs" => in_cell_xfs = false,
                Event::Empty(e) if in_cell_xfs && e.name().as_ref() == b"xf" => {
                    let start = tag_start(&text, &reader);
                    cell_xfs.push(CellXf {
                        num_fmt_id: num_fmt_id_of(&e),
                        raw: text[start..position(&reader)].to_string(),
                    });
                }
                Event::Start(e) if in_cell_xfs && e.name().as_ref() == b"xf" => {
                    xf_start = Some((tag_start(&text, &reader), num_fmt_id_of(&e)));
                }
                Event::End(e) if in_cell_xfs && e.name().as_ref() == b"xf" => {
                    if let Some((start, num_fmt_id)) = xf_start.take() {
                        cell_xfs.push(CellXf {
                            num_fmt_id,
                            raw: text[start..position(&reader)].to_string(),
                        });
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(Self {
            xml: Some(text),
            num_fmts,
            cell_xfs,
            derived: HashMap::new(),
        })
    }

    /// Number format of a `cellXfs` index (unknown indexes read as General)
    pub(crate) fn number_format(&self, style: u32) -> NumberFormat {
        match self.cell_xfs.get(style as usize) {
            Some(xf) => NumberFormat::from_parts(
                xf.num_fmt_id,
                self.num_fmts.get(&xf.num_fmt_id).map(String::as_str),
            ),
            None => NumberFormat::General,
        }
    }

    /// Index of a format equal to `base` except for its `numFmtId`
    ///
    /// Returns the updated part text when a new `xf` had to be appended.
    pub(crate) fn with_number_format(
        &mut self,
        base: u32,
        num_fmt_id: u32,
    ) -> XlsxResult<(u32, Option<String>)> {
        if let Some(xf) = self.cell_xfs.get(base as usize) {
            if xf.num_fmt_id == num_fmt_id {
                return Ok((base, None));
            }
        }
        if let Some(&existing) = self.derived.get(&(base, num_fmt_id)) {
            return Ok((existing, None));
        }

        let xml = self
            .xml
            .as_ref()
            .ok_or_else(|| XlsxError::MissingPart(STYLES_PART.to_string()))?;

        let template = self
            .cell_xfs
            .get(base as usize)
            .or_else(|| self.cell_xfs.first())
            .map(|xf| xf.raw.clone())
            .unwrap_or_else(|| {
                r#"<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>"#.to_string()
            });
        let raw = rewrite_open_tag(
            &template,
            &[
                ("numFmtId", num_fmt_id.to_string()),
                ("applyNumberFormat", "1".to_string()),
            ],
        )?;

        let close_at = xml
            .find("</cellXfs>")
            .ok_or_else(|| XlsxError::InvalidFormat("styles.xml has no cellXfs list".into()))?;
        let new_index = self.cell_xfs.len() as u32;

        let mut updated = String::with_capacity(xml.len() + raw.len());
        updated.push_str(&xml[..close_at]);
        updated.push_str(&raw);
        updated.push_str(&xml[close_at..]);

        let open_at = crate::xml::find_tag(&updated, "cellXfs")
            .ok_or_else(|| XlsxError::InvalidFormat("styles.xml has no cellXfs list".into()))?;
        let open_end = open_at
            + updated[open_at..]
                .find('>')
                .ok_or_else(|| XlsxError::Parse("unterminated cellXfs tag".into()))?
            + 1;
        let open_tag = rewrite_open_tag(
            &updated[open_at..open_end],
            &[("count", (new_index + 1).to_string())],
        )?;
        updated.replace_range(open_at..open_end, &open_tag);

        self.cell_xfs.push(CellXf { num_fmt_id, raw });
        self.derived.insert((base, num_fmt_id), new_index);
        self.xml = Some(updated.clone());

        Ok((new_index, Some(updated)))
    }
}

fn num_fmt_id_of(e: &quick_xml::events::BytesStart<'_>) -> u32 {
    attr_value(e, b"numFmtId")
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}

/// Rewrite the opening tag at the start of `element`, setting attributes
///
/// Existing attributes keep their order; new ones are appended. Everything
/// after the opening tag is copied unchanged.
fn rewrite_open_tag(element: &str, set: &[(&str, String)]) -> XlsxResult<String> {
    let mut reader = Reader::from_str(element);
    let (name, mut attrs, self_closing) = loop {
        match reader.read_event()? {
            Event::Start(e) => {
                break (
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    raw_attributes(&e),
                    false,
                )
            }
            Event::Empty(e) => {
                break (
                    String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    raw_attributes(&e),
                    true,
                )
            }
            Event::Eof => return Err(XlsxError::Parse("expected an element".into())),
            _ => {}
        }
    };
    let rest = &element[position(&reader)..];

    for (key, value) in set {
        let value = escape_xml(value);
        match attrs.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => *existing = value,
            None => attrs.push((key.to_string(), value)),
        }
    }

    let mut out = format!("<{}", name);
    for (key, value) in &attrs {
        out.push_str(&format!(" {}=\"{}\"", key, value));
    }
    out.push_str(if self_closing { "/>" } else { ">" });
    out.push_str(rest);
    Ok(out)
}

/// Minimal styles part: one font, the two mandatory fills, one border
pub(crate) fn minimal_styles_xml() -> String {
    String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts count="1">
    <font><sz val="11"/><name val="Calibri"/><family val="2"/></font>
  </fonts>
  <fills count="2">
    <fill><patternFill patternType="none"/></fill>
    <fill><patternFill patternType="gray125"/></fill>
  </fills>
  <borders count="1">
    <border><left/><right/><top/><bottom/><diagonal/></border>
  </borders>
  <cellStyleXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
  </cellStyleXfs>
  <cellXfs count="1">
    <xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
  </cellXfs>
  <cellStyles count="1">
    <cellStyle name="Normal" xfId="0" builtinId="0"/>
  </cellStyles>
  <dxfs count="0"/>
  <tableStyles count="0" defaultTableStyle="TableStyleMedium9" defaultPivotStyle="PivotStyleLight16"/>
</styleSheet>"#,
    )
}
