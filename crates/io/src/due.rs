//! Due-date handling: timestamp parsing and the lateness rule.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Parse a timestamp as written by form and LMS exports.
///
/// Tries RFC 3339, then the common layouts above, then a bare date (midnight).
/// Offsets are dropped: everything is compared as local wall-clock time.
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(text, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Spreadsheet serial date (days since 1899-12-30, fraction = time of day).
pub fn parse_serial(text: &str) -> Option<NaiveDateTime> {
    let serial: f64 = text.trim().parse().ok()?;
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let millis = (serial * 86_400_000.0).round() as i64;
    epoch.checked_add_signed(Duration::milliseconds(millis))
}

/// Timestamp text or, failing that, a spreadsheet serial number.
pub fn parse_turn_in(text: &str) -> Option<NaiveDateTime> {
    parse_timestamp(text).or_else(|| parse_serial(text))
}

/// Annotation recorded on a late submission.
pub fn late_note(received: NaiveDateTime) -> String {
    format!("late - received {}", received.format("%b %d, %H:%M:%S"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, s).unwrap()
    }

    #[test]
    fn parses_common_layouts() {
        assert_eq!(parse_timestamp("2026-01-15 23:59:59"), Some(at(2026, 1, 15, 23, 59, 59)));
        assert_eq!(parse_timestamp("1/15/2026 9:05:00"), Some(at(2026, 1, 15, 9, 5, 0)));
        assert_eq!(parse_timestamp("12/31/9999 23:59:59"), Some(at(9999, 12, 31, 23, 59, 59)));
        assert_eq!(parse_timestamp("2026-01-15T08:00:00Z"), Some(at(2026, 1, 15, 8, 0, 0)));
        assert_eq!(parse_timestamp("2026-01-15"), Some(at(2026, 1, 15, 0, 0, 0)));
        assert_eq!(parse_timestamp("soon"), None);
    }

    #[test]
    fn serial_dates() {
        assert_eq!(parse_serial("25569"), Some(at(1970, 1, 1, 0, 0, 0)));
        assert_eq!(parse_serial("46037.5"), Some(at(2026, 1, 15, 12, 0, 0)));
        assert_eq!(parse_serial("-1"), None);
        assert_eq!(parse_turn_in("46037.5"), Some(at(2026, 1, 15, 12, 0, 0)));
    }

    #[test]
    fn late_note_format() {
        assert_eq!(late_note(at(2026, 1, 16, 8, 30, 5)), "late - received Jan 16, 08:30:05");
    }
}
