//! Named cleaning filters applied to raw cell text.
//!
//! Each filter either rewrites the text or rejects it. Filters run left to
//! right, so `["strip", "remove#", "8char"]` trims, drops a leading `#`, then
//! checks the length of what is left.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{CleanError, IoError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Strip,
    ToUpper,
    RemoveHash,
    /// Exactly this many characters.
    Length(usize),
    UcsdId,
    NvToZero,
    NoneToZero,
    StripDenominator,
    ToFloat,
}

impl FromStr for Filter {
    type Err = IoError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let filter = match name {
            "strip" => Self::Strip,
            "toUpper" => Self::ToUpper,
            "remove#" => Self::RemoveHash,
            "ucsdIDCheck" => Self::UcsdId,
            "NVto0" => Self::NvToZero,
            "NoneTo0" => Self::NoneToZero,
            "stripDenominator" => Self::StripDenominator,
            "toFloat" => Self::ToFloat,
            other => match other.strip_suffix("char").map(str::parse::<usize>) {
                Some(Ok(n)) => Self::Length(n),
                _ => return Err(IoError::UnknownFilter(other.to_string())),
            },
        };
        Ok(filter)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Strip => f.write_str("strip"),
            Self::ToUpper => f.write_str("toUpper"),
            Self::RemoveHash => f.write_str("remove#"),
            Self::Length(n) => write!(f, "{n}char"),
            Self::UcsdId => f.write_str("ucsdIDCheck"),
            Self::NvToZero => f.write_str("NVto0"),
            Self::NoneToZero => f.write_str("NoneTo0"),
            Self::StripDenominator => f.write_str("stripDenominator"),
            Self::ToFloat => f.write_str("toFloat"),
        }
    }
}

fn ucsd_id() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[AU]\d{8}$").expect("static regex"))
}

impl Filter {
    pub fn apply(&self, value: String) -> Result<String, CleanError> {
        let reject = |value: String| CleanError::IncorrectFormat { filter: self.to_string(), value };

        match self {
            Self::Strip => Ok(value.trim().to_string()),
            Self::ToUpper => Ok(value.to_uppercase()),
            Self::RemoveHash => Ok(value.strip_prefix('#').map(str::to_string).unwrap_or(value)),
            Self::Length(n) if value.chars().count() == *n => Ok(value),
            Self::Length(_) => Err(reject(value)),
            Self::UcsdId if ucsd_id().is_match(&value) => Ok(value),
            Self::UcsdId => Err(reject(value)),
            Self::NvToZero if value == "NV" => Ok("0".into()),
            Self::NoneToZero if value.is_empty() || value == "None" => Ok("0".into()),
            Self::NvToZero | Self::NoneToZero => Ok(value),
            Self::StripDenominator => Ok(value.split('/').next().unwrap_or_default().trim().to_string()),
            Self::ToFloat => match value.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(format_number(n)),
                _ => Err(reject(value)),
            },
        }
    }
}

pub fn parse_filters(names: &[String]) -> Result<Vec<Filter>, IoError> {
    names.iter().map(|n| n.parse()).collect()
}

/// Run `value` through every filter in order.
pub fn check_and_clean(value: &str, filters: &[Filter]) -> Result<String, CleanError> {
    filters.iter().try_fold(value.to_string(), |acc, filter| filter.apply(acc))
}

/// Shortest decimal text for a number: `3.10` -> `3.1`, `3.00` -> `3`.
pub fn format_number(n: f64) -> String {
    let text = format!("{n:.6}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" => "0".to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(names: &[&str]) -> Vec<Filter> {
        parse_filters(&names.iter().map(|s| s.to_string()).collect::<Vec<_>>()).unwrap()
    }

    #[test]
    fn clicker_id_pipeline() {
        let f = filters(&["strip", "remove#", "8char", "toUpper"]);
        assert_eq!(check_and_clean("  #1a2b3c4d ", &f).unwrap(), "1A2B3C4D");
        assert!(check_and_clean("#1a2b3c", &f).is_err());
    }

    #[test]
    fn student_id_check() {
        let f = filters(&["strip", "toUpper", "ucsdIDCheck"]);
        assert_eq!(check_and_clean(" a12345678", &f).unwrap(), "A12345678");
        let err = check_and_clean("B12345678", &f).unwrap_err();
        assert_eq!(err.to_string(), "'B12345678' fails ucsdIDCheck");
    }

    #[test]
    fn score_pipeline() {
        let f = filters(&["strip", "stripDenominator", "toFloat"]);
        assert_eq!(check_and_clean(" 7.50 / 10", &f).unwrap(), "7.5");
        assert_eq!(check_and_clean("3.00", &f).unwrap(), "3");
        assert!(check_and_clean("abc / 10", &f).is_err());
    }

    #[test]
    fn zero_substitutions() {
        assert_eq!(check_and_clean("NV", &filters(&["NVto0"])).unwrap(), "0");
        assert_eq!(check_and_clean("", &filters(&["NoneTo0"])).unwrap(), "0");
        assert_eq!(check_and_clean("None", &filters(&["NoneTo0"])).unwrap(), "0");
        assert_eq!(check_and_clean("4", &filters(&["NoneTo0", "NVto0"])).unwrap(), "4");
    }

    #[test]
    fn remove_hash_only_drops_one() {
        assert_eq!(check_and_clean("##A", &filters(&["remove#"])).unwrap(), "#A");
        assert_eq!(check_and_clean("", &filters(&["remove#"])).unwrap(), "");
    }

    #[test]
    fn unknown_filter_rejected() {
        let err = parse_filters(&["strip".into(), "sparkle".into()]).unwrap_err();
        assert!(matches!(err, IoError::UnknownFilter(ref n) if n == "sparkle"));
        assert!(parse_filters(&["xchar".into()]).is_err());
    }

    #[test]
    fn filter_names_round_trip() {
        for name in ["strip", "toUpper", "remove#", "9char", "ucsdIDCheck", "NVto0", "NoneTo0", "stripDenominator", "toFloat"] {
            assert_eq!(name.parse::<Filter>().unwrap().to_string(), name);
        }
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.1), "3.1");
        assert_eq!(format_number(10.0), "10");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.125), "0.125");
    }
}
