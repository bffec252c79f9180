//! Small helpers shared by the part parsers and serializers

use quick_xml::events::BytesStart;
use quick_xml::reader::Reader;

/// Escape text for use in element content or a double-quoted attribute
pub(crate) fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape text for use in element content
pub(crate) fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// Excel uses this format to encode characters XML cannot carry:
/// - `_x000d_` = CR (carriage return)
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore (escaped underscore)
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    if !s.contains("_x") {
        return s.to_string();
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(idx) = rest.find("_x") {
        result.push_str(&rest[..idx]);
        let candidate = &rest[idx..];
        match parse_escape(candidate) {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push('_');
                rest = &candidate[1..];
            }
        }
    }
    result.push_str(rest);

    result
}

/// Encode characters that need `_xHHHH_` escaping in cell text
///
/// Control characters other than tab, CR and LF are not valid XML. A literal
/// `_xHHHH_` in user text gets its underscore escaped so it reads back as is.
pub(crate) fn encode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for (i, c) in s.char_indices() {
        if c == '_' && parse_escape(&s[i..]).is_some() {
            result.push_str("_x005F_");
        } else if c.is_control() && !matches!(c, '\t' | '\n' | '\r') && (c as u32) < 0x20 {
            result.push_str(&format!("_x{:04X}_", c as u32));
        } else {
            result.push(c);
        }
    }
    result
}

fn parse_escape(s: &str) -> Option<char> {
    let bytes = s.as_bytes();
    if bytes.len() < 7 || &bytes[..2] != b"_x" || bytes[6] != b'_' {
        return None;
    }
    let hex = s.get(2..6)?;
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

/// Unescaped value of an attribute, if present
pub(crate) fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.as_ref() == key)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.to_string()))
}

/// Attributes exactly as written (still escaped), in document order
pub(crate) fn raw_attributes(e: &BytesStart<'_>) -> Vec<(String, String)> {
    e.attributes()
        .flatten()
        .map(|attr| {
            (
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                String::from_utf8_lossy(&attr.value).into_owned(),
            )
        })
        .collect()
}

/// Byte offset of the `<` that opened the element just returned by `reader`
pub(crate) fn tag_start(xml: &str, reader: &Reader<&[u8]>) -> usize {
    let end = reader.buffer_position() as usize;
    xml[..end].rfind('<').unwrap_or(0)
}

/// Position right after the last event returned by `reader`
pub(crate) fn position(reader: &Reader<&[u8]>) -> usize {
    reader.buffer_position() as usize
}

/// Find `<name` followed by a tag boundary (whitespace, `>` or `/`)
pub(crate) fn find_tag(xml: &str, name: &str) -> Option<usize> {
    let needle = format!("<{}", name);
    let mut from = 0;
    while let Some(idx) = xml[from..].find(&needle) {
        let at = from + idx;
        match xml.as_bytes().get(at + needle.len()) {
            Some(b' ') | Some(b'>') | Some(b'/') | Some(b'\t') | Some(b'\r') | Some(b'\n') => {
                return Some(at)
            }
            _ => from = at + needle.len(),
        }
    }
    None
}

/// Span `[start, end)` of the first `name` element, self-closing or not
pub(crate) fn element_span(xml: &str, name: &str) -> Option<(usize, usize)> {
    let start = find_tag(xml, name)?;
    let open_end = start + xml[start..].find('>')? + 1;
    if xml[..open_end].ends_with("/>") {
        return Some((start, open_end));
    }
    let close = format!("</{}>", name);
    let close_at = open_end + xml[open_end..].find(&close)?;
    Some((start, close_at + close.len()))
}
