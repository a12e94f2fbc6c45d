use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Value of the primary identifier. Every roster entry is keyed by one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct StudentId(String);

impl StudentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StudentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StudentId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for StudentId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

// ---------------------------------------------------------------------------
// Grades
// ---------------------------------------------------------------------------

/// A recorded score. `Marker` carries non-numeric sentinel text and is never
/// compared against numeric scores.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Score {
    Points(f64),
    Marker(String),
}

impl Score {
    pub fn points(&self) -> Option<f64> {
        match self {
            Self::Points(p) => Some(*p),
            Self::Marker(_) => None,
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Points(p) => write!(f, "{p}"),
            Self::Marker(m) => f.write_str(m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grade {
    pub score: Score,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl Grade {
    pub fn points(points: f64) -> Self {
        Self { score: Score::Points(points), annotation: None }
    }

    pub fn marker(text: impl Into<String>) -> Self {
        Self { score: Score::Marker(text.into()), annotation: None }
    }

    pub fn annotated(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.annotation {
            Some(note) => write!(f, "{} ({note})", self.score),
            None => write!(f, "{}", self.score),
        }
    }
}

/// A grade as held by the roster, remembering which record contributed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GradeCell {
    #[serde(flatten)]
    pub grade: Grade,
    pub origin: RecordOrigin,
}

// ---------------------------------------------------------------------------
// Source records
// ---------------------------------------------------------------------------

/// Where a record came from: source label plus 1-based data row.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RecordOrigin {
    pub source: String,
    pub row: usize,
}

impl RecordOrigin {
    pub fn new(source: impl Into<String>, row: usize) -> Self {
        Self { source: source.into(), row }
    }
}

impl fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} row {}", self.source, self.row)
    }
}

/// One cleaned row of one source: whatever attributes it observed plus its grades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRecord {
    pub origin: RecordOrigin,
    pub attributes: BTreeMap<String, String>,
    pub grades: BTreeMap<String, Grade>,
}

impl SourceRecord {
    pub fn new(origin: RecordOrigin) -> Self {
        Self { origin, attributes: BTreeMap::new(), grades: BTreeMap::new() }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_grade(mut self, assignment: impl Into<String>, grade: Grade) -> Self {
        self.grades.insert(assignment.into(), grade);
        self
    }
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// Stored value of one attribute on a roster entry.
///
/// Singleton attributes hold `One`; every other attribute accumulates a `Many`
/// set of observed values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    One(String),
    Many(BTreeSet<String>),
}

impl InfoValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            Self::One(v) => vec![v.as_str()],
            Self::Many(set) => set.iter().map(String::as_str).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Many(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RosterEntry {
    pub info: BTreeMap<String, InfoValue>,
    pub grades: BTreeMap<String, GradeCell>,
}

/// Per identifying attribute: observed value -> owning student.
///
/// Grows monotonically; a value is never re-pointed at another student.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct IdentityIndex {
    by_attribute: BTreeMap<String, BTreeMap<String, StudentId>>,
}

impl IdentityIndex {
    pub fn lookup(&self, attribute: &str, value: &str) -> Option<&StudentId> {
        self.by_attribute.get(attribute).and_then(|values| values.get(value))
    }

    /// Link `value` to `student` unless the value is already linked. Returns
    /// whether a new link was recorded.
    pub fn register(&mut self, attribute: &str, value: &str, student: &StudentId) -> bool {
        let values = self.by_attribute.entry(attribute.to_string()).or_default();
        if values.contains_key(value) {
            return false;
        }
        values.insert(value.to_string(), student.clone());
        true
    }

    pub fn len(&self) -> usize {
        self.by_attribute.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The whole resolution state, owned by the driver for the duration of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Roster {
    pub index: IdentityIndex,
    pub entries: BTreeMap<StudentId, RosterEntry>,
}

impl Roster {
    pub fn get(&self, student: &StudentId) -> Option<&RosterEntry> {
        self.entries.get(student)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
