use std::collections::{BTreeMap, HashSet};

use rollbook_roster::{AttributeFlags, AttributeSchema, RosterError};
use serde::{Deserialize, Serialize};

use crate::clean::parse_filters;
use crate::due::parse_timestamp;
use crate::error::IoError;
use crate::rows::Layout;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CourseConfig {
    /// Report title.
    pub name: String,
    #[serde(default)]
    pub disclaimer: String,
    /// Ceiling on resolution passes; unset means run to the fixed point.
    #[serde(default)]
    pub max_passes: Option<usize>,
    /// Declaration order is the order identifiers are consulted.
    pub attributes: Vec<AttributeConfig>,
    /// Declaration order is the processing order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub report: ReportConfig,
}

// ---------------------------------------------------------------------------
// Attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeConfig {
    pub name: String,
    #[serde(default)]
    pub identifies_student: bool,
    #[serde(default)]
    pub one_per_student: bool,
    #[serde(default)]
    pub filters: Vec<String>,
    /// Students without this attribute get no text or HTML report.
    #[serde(default)]
    pub only_print_if_present: bool,
}

impl AttributeConfig {
    pub fn flags(&self) -> AttributeFlags {
        AttributeFlags {
            identifies_student: self.identifies_student,
            one_per_student: self.one_per_student,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    /// Path relative to the course file.
    pub file: String,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub sheet: Option<String>,
    /// Column header -> attribute name.
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    #[serde(default)]
    pub assignments: Vec<AssignmentConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AssignmentConfig {
    pub name: String,
    /// Absent means completion credit: appearing in the source earns `max_points`.
    #[serde(default)]
    pub score_column: Option<String>,
    pub max_points: f64,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "default_score_filters")]
    pub filters: Vec<String>,
    #[serde(default)]
    pub due: Option<String>,
    #[serde(default)]
    pub timestamp_column: Option<String>,
}

fn default_category() -> String {
    "unknown".into()
}

fn default_score_filters() -> Vec<String> {
    vec!["strip".into(), "NoneTo0".into(), "toFloat".into()]
}

// ---------------------------------------------------------------------------
// Report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportConfig {
    #[serde(default)]
    pub sections: Vec<ReportSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReportSection {
    pub title: String,
    pub category: String,
}

// ---------------------------------------------------------------------------
// Assignment catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentInfo {
    pub name: String,
    pub max_points: f64,
    pub category: String,
}

/// Every assignment any source declares, in first-seen order. A later
/// declaration of the same name replaces the earlier one in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AssignmentCatalog {
    entries: Vec<AssignmentInfo>,
}

impl AssignmentCatalog {
    pub fn insert(&mut self, info: AssignmentInfo) {
        match self.entries.iter_mut().find(|e| e.name == info.name) {
            Some(existing) => *existing = info,
            None => self.entries.push(info),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AssignmentInfo> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssignmentInfo> {
        self.entries.iter()
    }

    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a AssignmentInfo> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl CourseConfig {
    pub fn from_toml(input: &str) -> Result<Self, IoError> {
        let config: CourseConfig =
            toml::from_str(input).map_err(|e| IoError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn schema(&self) -> Result<AttributeSchema, RosterError> {
        AttributeSchema::new(self.attributes.iter().map(|a| (a.name.clone(), a.flags())))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeConfig> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn catalog(&self) -> AssignmentCatalog {
        let mut catalog = AssignmentCatalog::default();
        for assignment in self.sources.iter().flat_map(|s| &s.assignments) {
            catalog.insert(AssignmentInfo {
                name: assignment.name.clone(),
                max_points: assignment.max_points,
                category: assignment.category.clone(),
            });
        }
        catalog
    }

    /// Attributes a student must have to get a printed report.
    pub fn print_filters(&self) -> Vec<&str> {
        self.attributes
            .iter()
            .filter(|a| a.only_print_if_present)
            .map(|a| a.name.as_str())
            .collect()
    }

    pub fn validate(&self) -> Result<(), IoError> {
        self.schema()?;

        for attribute in &self.attributes {
            parse_filters(&attribute.filters)?;
        }

        if self.max_passes == Some(0) {
            return Err(IoError::ConfigValidation("max_passes must be at least 1".into()));
        }

        let declared: HashSet<&str> = self.attributes.iter().map(|a| a.name.as_str()).collect();

        for source in &self.sources {
            for (column, attribute) in &source.attributes {
                if !declared.contains(attribute.as_str()) {
                    return Err(IoError::ConfigValidation(format!(
                        "source '{}': column '{column}' maps to undeclared attribute '{attribute}'",
                        source.file
                    )));
                }
            }

            let mut mapped = HashSet::new();
            for attribute in source.attributes.values() {
                if !mapped.insert(attribute.as_str()) {
                    return Err(IoError::ConfigValidation(format!(
                        "source '{}': attribute '{attribute}' is mapped from more than one column",
                        source.file
                    )));
                }
            }

            for assignment in &source.assignments {
                parse_filters(&assignment.filters)?;

                if !assignment.max_points.is_finite() || assignment.max_points < 0.0 {
                    return Err(IoError::ConfigValidation(format!(
                        "assignment '{}': max_points must be a non-negative number",
                        assignment.name
                    )));
                }

                if let Some(ref due) = assignment.due {
                    if parse_timestamp(due).is_none() {
                        return Err(IoError::BadDueDate {
                            assignment: assignment.name.clone(),
                            value: due.clone(),
                        });
                    }
                    if assignment.timestamp_column.is_none() {
                        return Err(IoError::ConfigValidation(format!(
                            "assignment '{}': due requires timestamp_column",
                            assignment.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "CSE 101 Grade Report"
disclaimer = "Email the staff about discrepancies."

[[attributes]]
name = "Roster Name"
one_per_student = true
only_print_if_present = true

[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
filters = ["strip", "toUpper"]

[[attributes]]
name = "Clicker ID"
identifies_student = true
filters = ["strip", "remove#", "8char", "toUpper"]

[[sources]]
file = "roster.csv"
layout = "roster"
[sources.attributes]
PID = "Student ID"
Student = "Roster Name"

[[sources]]
file = "clicker.csv"
[sources.attributes]
Remote = "Clicker ID"
[[sources.assignments]]
name = "attendance 1"
max_points = 1
category = "participation"

[[sources]]
file = "quiz.csv"
[sources.attributes]
SID = "Student ID"
[[sources.assignments]]
name = "quiz 1"
score_column = "Score"
max_points = 10
category = "quiz"
filters = ["strip", "stripDenominator", "toFloat"]
due = "2026-01-15 23:59:59"
timestamp_column = "Timestamp"

[[report.sections]]
title = "Quizzes"
category = "quiz"
"#;

    #[test]
    fn parse_valid() {
        let config = CourseConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "CSE 101 Grade Report");
        assert_eq!(config.attributes.len(), 3);
        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].layout, Layout::Roster);
        assert_eq!(config.sources[1].layout, Layout::Table);
        assert_eq!(config.report.sections.len(), 1);
        assert_eq!(config.max_passes, None);

        let schema = config.schema().unwrap();
        assert_eq!(schema.primary(), "Student ID");
        assert_eq!(config.print_filters(), vec!["Roster Name"]);
    }

    #[test]
    fn assignment_defaults() {
        let config = CourseConfig::from_toml(VALID).unwrap();
        let attendance = &config.sources[1].assignments[0];
        assert_eq!(attendance.score_column, None);
        assert_eq!(attendance.filters, vec!["strip", "NoneTo0", "toFloat"]);
        assert_eq!(attendance.due, None);
    }

    #[test]
    fn catalog_keeps_first_position_last_value() {
        let input = format!(
            r#"{VALID}
[[sources]]
file = "regrades.csv"
[[sources.assignments]]
name = "attendance 1"
max_points = 2
category = "participation"
"#
        );
        let config = CourseConfig::from_toml(&input).unwrap();
        let catalog = config.catalog();
        assert_eq!(catalog.len(), 2);
        let names: Vec<_> = catalog.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["attendance 1", "quiz 1"]);
        assert_eq!(catalog.get("attendance 1").unwrap().max_points, 2.0);
        assert_eq!(catalog.in_category("quiz").count(), 1);
    }

    #[test]
    fn reject_missing_primary() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Email"
identifies_student = true
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, IoError::Schema(RosterError::NoPrimaryIdentifier)));
    }

    #[test]
    fn reject_two_primaries() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
[[attributes]]
name = "Email"
identifies_student = true
one_per_student = true
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("more than one primary"));
    }

    #[test]
    fn reject_undeclared_attribute() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
[[sources]]
file = "a.csv"
[sources.attributes]
Section = "Section"
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("undeclared attribute 'Section'"));
    }

    #[test]
    fn reject_unknown_filter() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
filters = ["strip", "shout"]
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, IoError::UnknownFilter(ref f) if f == "shout"));
    }

    #[test]
    fn reject_due_without_timestamp_column() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
[[sources]]
file = "a.csv"
[[sources.assignments]]
name = "form"
max_points = 1
due = "2026-01-15 23:59:59"
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(err.to_string().contains("due requires timestamp_column"));
    }

    #[test]
    fn reject_bad_due_date() {
        let input = r#"
name = "Bad"
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
[[sources]]
file = "a.csv"
[[sources.assignments]]
name = "form"
max_points = 1
due = "next tuesday"
timestamp_column = "Timestamp"
"#;
        let err = CourseConfig::from_toml(input).unwrap_err();
        assert!(matches!(err, IoError::BadDueDate { .. }));
    }

    #[test]
    fn reject_unknown_key() {
        let input = r#"
name = "Bad"
sorces = []
[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true
"#;
        assert!(matches!(CourseConfig::from_toml(input), Err(IoError::ConfigParse(_))));
    }
}
