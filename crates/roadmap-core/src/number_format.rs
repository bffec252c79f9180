//! Number format classification and serial date conversion

use crate::error::{Error, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Number format attached to a cell style
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum NumberFormat {
    /// General format (default)
    #[default]
    General,

    /// Built-in format by ID
    BuiltIn(u32),

    /// Custom format string
    Custom(String),
}

impl NumberFormat {
    /// 0 - General
    pub const ID_GENERAL: u32 = 0;
    /// 14 - mm-dd-yy
    pub const ID_DATE_SHORT: u32 = 14;
    /// 22 - m/d/yy h:mm
    pub const ID_DATETIME: u32 = 22;
    /// 49 - @
    pub const ID_TEXT: u32 = 49;

    /// Classify a `numFmtId` with an optional custom code from `<numFmts>`
    pub fn from_parts(id: u32, code: Option<&str>) -> Self {
        match code {
            Some(code) if code.eq_ignore_ascii_case("general") => NumberFormat::General,
            Some(code) => NumberFormat::Custom(code.to_string()),
            None if id == Self::ID_GENERAL => NumberFormat::General,
            None => NumberFormat::BuiltIn(id),
        }
    }

    /// Text format (@)
    pub fn text() -> Self {
        NumberFormat::BuiltIn(Self::ID_TEXT)
    }

    /// Get the format string
    pub fn format_string(&self) -> &str {
        match self {
            NumberFormat::General => "General",
            NumberFormat::BuiltIn(id) => builtin_format_string(*id),
            NumberFormat::Custom(s) => s,
        }
    }

    /// Whether the cell is formatted as text (`@`)
    pub fn is_text(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => *id == Self::ID_TEXT,
            NumberFormat::Custom(s) => s.trim() == "@",
            NumberFormat::General => false,
        }
    }

    /// Whether numbers with this format display as a date or time
    pub fn is_date(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => matches!(id, 14..=22 | 45..=47),
            NumberFormat::Custom(s) => !date_tokens(s).is_empty(),
            NumberFormat::General => false,
        }
    }

    /// Whether a date format also shows a time of day
    pub fn has_time(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => matches!(id, 18..=22 | 45..=47),
            NumberFormat::Custom(s) => {
                let tokens = date_tokens(s);
                tokens.iter().any(|c| matches!(c, 'h' | 's'))
            }
            NumberFormat::General => false,
        }
    }

    /// Whether a date format shows elapsed time (`[h]:mm:ss`)
    pub fn is_elapsed(&self) -> bool {
        match self {
            NumberFormat::BuiltIn(id) => *id == 46,
            NumberFormat::Custom(s) => has_elapsed_bracket(s),
            NumberFormat::General => false,
        }
    }
}

fn has_elapsed_bracket(code: &str) -> bool {
    let section = code.split(';').next().unwrap_or("");
    section.split('[').skip(1).any(|rest| {
        let inner = rest.split(']').next().unwrap_or("");
        !inner.is_empty() && inner.chars().all(|b| matches!(b.to_ascii_lowercase(), 'h' | 'm' | 's'))
    })
}

fn builtin_format_string(id: u32) -> &'static str {
    match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "mm-dd-yy",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "m/d/yy h:mm",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        49 => "@",
        _ => "General",
    }
}

/// Date/time placeholder letters (lowercased) of the first format section
///
/// Quoted literals, backslash escapes and bracket sections (`[Red]`,
/// `[$-409]`) are skipped. Elapsed-time brackets like `[h]` count as `h`.
fn date_tokens(code: &str) -> Vec<char> {
    let section = code.split(';').next().unwrap_or("");
    let mut tokens = Vec::new();
    let mut chars = section.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                for q in chars.by_ref() {
                    if q == '"' {
                        break;
                    }
                }
            }
            '\\' | '_' | '*' => {
                chars.next();
            }
            '[' => {
                let inner: String = chars.by_ref().take_while(|&b| b != ']').collect();
                let lower = inner.to_ascii_lowercase();
                if !lower.is_empty() && lower.chars().all(|b| matches!(b, 'h' | 'm' | 's')) {
                    tokens.extend(lower.chars().take(1));
                }
            }
            _ => {
                let lower = c.to_ascii_lowercase();
                if matches!(lower, 'y' | 'm' | 'd' | 'h' | 's') {
                    tokens.push(lower);
                }
            }
        }
    }

    tokens
}

/// Convert a spreadsheet serial number into a calendar date-time
///
/// The 1900 system counts from 1899-12-30 and keeps the historical leap-year
/// bug (serial 60 is the nonexistent 1900-02-29), so serials below 60 are
/// shifted by one day. The 1904 system counts from 1904-01-01.
pub fn excel_serial_to_datetime(serial: f64, date1904: bool) -> Result<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 || serial > 2_958_466.0 {
        return Err(Error::InvalidSerialDate(serial));
    }

    let (epoch, adjusted) = if date1904 {
        (NaiveDate::from_ymd_opt(1904, 1, 1), serial)
    } else if serial < 60.0 {
        (NaiveDate::from_ymd_opt(1899, 12, 31), serial)
    } else {
        (NaiveDate::from_ymd_opt(1899, 12, 30), serial)
    };
    let epoch = epoch
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(Error::InvalidSerialDate(serial))?;

    let days = adjusted.trunc() as i64;
    // Whole seconds; stored fractions carry float noise.
    let millis = ((adjusted - adjusted.trunc()) * 86_400_000.0).round() as i64;
    let millis = (millis + 500) / 1000 * 1000;

    epoch
        .checked_add_signed(Duration::days(days) + Duration::milliseconds(millis))
        .ok_or(Error::InvalidSerialDate(serial))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_formats() {
        assert!(NumberFormat::text().is_text());
        assert!(NumberFormat::Custom("@".into()).is_text());
        assert!(!NumberFormat::General.is_text());
        assert!(!NumberFormat::BuiltIn(14).is_text());
        assert_eq!(NumberFormat::text().format_string(), "@");
    }

    #[test]
    fn test_builtin_date_formats() {
        assert!(NumberFormat::BuiltIn(14).is_date());
        assert!(!NumberFormat::BuiltIn(14).has_time());
        assert!(NumberFormat::BuiltIn(22).is_date());
        assert!(NumberFormat::BuiltIn(22).has_time());
        assert!(NumberFormat::BuiltIn(46).is_date());
        assert!(!NumberFormat::BuiltIn(2).is_date());
        assert!(!NumberFormat::General.is_date());
    }

    #[test]
    fn test_custom_date_formats() {
        assert!(NumberFormat::Custom("dd/mm/yyyy".into()).is_date());
        assert!(!NumberFormat::Custom("dd/mm/yyyy".into()).has_time());
        assert!(NumberFormat::Custom("yyyy-mm-dd hh:mm".into()).has_time());
        assert!(NumberFormat::Custom("[$-40C]d mmmm yyyy".into()).is_date());
        assert!(NumberFormat::Custom("[h]:mm".into()).has_time());
    }

    #[test]
    fn test_elapsed_formats() {
        assert!(NumberFormat::BuiltIn(46).is_elapsed());
        assert!(NumberFormat::Custom("[hh]:mm".into()).is_elapsed());
        assert!(!NumberFormat::BuiltIn(21).is_elapsed());
        assert!(!NumberFormat::Custom("[$-40C]d mmmm yyyy".into()).is_elapsed());
        assert!(!NumberFormat::Custom("[Red]0.00".into()).is_elapsed());
    }

    #[test]
    fn test_custom_non_date_formats() {
        assert!(!NumberFormat::Custom("0.00".into()).is_date());
        assert!(!NumberFormat::Custom("#,##0 \"days\"".into()).is_date());
        assert!(!NumberFormat::Custom("[Red]0.00".into()).is_date());
        assert!(!NumberFormat::Custom("0\\h".into()).is_date());
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(NumberFormat::from_parts(0, None), NumberFormat::General);
        assert_eq!(NumberFormat::from_parts(14, None), NumberFormat::BuiltIn(14));
        assert_eq!(
            NumberFormat::from_parts(164, Some("dd/mm/yyyy")),
            NumberFormat::Custom("dd/mm/yyyy".into())
        );
        assert_eq!(NumberFormat::from_parts(164, Some("General")), NumberFormat::General);
    }

    #[test]
    fn test_serial_to_datetime_1900() {
        let dt = excel_serial_to_datetime(45292.0, false).unwrap();
        assert_eq!(dt.to_string(), "2024-01-01 00:00:00");

        let dt = excel_serial_to_datetime(45292.5, false).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2024-01-01 12:00:00");

        let dt = excel_serial_to_datetime(1.0, false).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());

        let dt = excel_serial_to_datetime(61.0, false).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1900, 3, 1).unwrap());
    }

    #[test]
    fn test_serial_to_datetime_1904() {
        let dt = excel_serial_to_datetime(0.0, true).unwrap();
        assert_eq!(dt.date(), NaiveDate::from_ymd_opt(1904, 1, 1).unwrap());
    }

    #[test]
    fn test_serial_rounding() {
        // 10:30:00 stored with float noise
        let dt = excel_serial_to_datetime(45292.437_499_999, false).unwrap();
        assert_eq!(dt.format("%H:%M:%S").to_string(), "10:30:00");
    }

    #[test]
    fn test_invalid_serial() {
        assert!(excel_serial_to_datetime(-1.0, false).is_err());
        assert!(excel_serial_to_datetime(f64::NAN, false).is_err());
    }
}
