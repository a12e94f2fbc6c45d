//! `rollbook init`: guess a starter course file from a folder of CSV exports.
//!
//! Each file's kind is inferred from its header row. Columns are matched to
//! the default attributes by name or keyword; only identifying attributes are
//! mapped, everything else is listed as ignored in the generated comments.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use rollbook_io::rows::{read_rows, Layout, Rows};

use crate::exit_codes::{io_exit_code, EXIT_WRITE};
use crate::CliError;

const FAR_FUTURE: &str = "12/31/9999 23:59:59";
const ROSTER_PREAMBLE: [&str; 4] = ["Sect ID", "Course", "Title", "SecCode"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Registrar roster with a section table above the student table.
    Roster,
    /// LMS export: every score column is followed by `<name> - Max Points`.
    Gradescope,
    /// Form responses with a `Score` column.
    ScoredForm,
    /// Form responses without a score: submitting earns the credit.
    UnscoredForm,
    Other,
}

impl SourceKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Roster => "roster",
            Self::Gradescope => "gradescope",
            Self::ScoredForm => "scored_form",
            Self::UnscoredForm => "unscored_form",
            Self::Other => "other",
        }
    }
}

pub fn infer_kind(headers: &[String]) -> SourceKind {
    if headers.len() >= ROSTER_PREAMBLE.len()
        && headers.iter().zip(ROSTER_PREAMBLE).all(|(h, want)| h == want)
    {
        return SourceKind::Roster;
    }
    if headers.windows(2).any(|w| w[1] == format!("{} - Max Points", w[0])) {
        return SourceKind::Gradescope;
    }
    if headers.first().map(String::as_str) == Some("Timestamp") {
        if headers.iter().any(|h| h == "Score") {
            return SourceKind::ScoredForm;
        }
        return SourceKind::UnscoredForm;
    }
    SourceKind::Other
}

// ---------------------------------------------------------------------------
// Generated config shape
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct StarterConfig {
    name: String,
    disclaimer: String,
    attributes: Vec<StarterAttribute>,
    sources: Vec<StarterSource>,
    report: StarterReport,
}

#[derive(Debug, Clone, Serialize)]
struct StarterAttribute {
    name: &'static str,
    #[serde(skip_serializing_if = "is_false")]
    identifies_student: bool,
    #[serde(skip_serializing_if = "is_false")]
    one_per_student: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    filters: Vec<&'static str>,
    #[serde(skip_serializing_if = "is_false")]
    only_print_if_present: bool,
}

#[derive(Debug, Serialize)]
struct StarterSource {
    file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    layout: Option<&'static str>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    attributes: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    assignments: Vec<StarterAssignment>,
}

#[derive(Debug, Serialize)]
struct StarterAssignment {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    score_column: Option<String>,
    max_points: f64,
    category: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    filters: Option<Vec<&'static str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    due: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp_column: Option<&'static str>,
}

#[derive(Debug, Default, Serialize)]
struct StarterReport {
    sections: Vec<StarterSection>,
}

#[derive(Debug, Serialize)]
struct StarterSection {
    title: String,
    category: String,
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn default_attributes() -> Vec<StarterAttribute> {
    let attr = |name| StarterAttribute {
        name,
        identifies_student: false,
        one_per_student: false,
        filters: Vec::new(),
        only_print_if_present: false,
    };
    vec![
        StarterAttribute { one_per_student: true, only_print_if_present: true, ..attr("Roster Name") },
        StarterAttribute { one_per_student: true, ..attr("Section") },
        attr("Email"),
        StarterAttribute {
            identifies_student: true,
            one_per_student: true,
            filters: vec!["strip", "9char", "toUpper"],
            ..attr("Student ID")
        },
        StarterAttribute {
            identifies_student: true,
            filters: vec!["strip", "remove#", "8char", "toUpper"],
            ..attr("Clicker ID")
        },
    ]
}

fn keywords() -> &'static [(&'static str, Regex)] {
    static KEYWORDS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    KEYWORDS.get_or_init(|| {
        [
            ("Roster Name", r"name\b"),
            ("Section", r"\bsection\b|\bsect\b|\bsec\b"),
            ("Email", r"\bemail\b"),
            ("Student ID", r"\bpid\b|\bsid\b"),
            ("Clicker ID", r"\bclicker\b|\biclicker\b|\bremote\b"),
        ]
        .into_iter()
        .map(|(attr, pattern)| (attr, Regex::new(pattern).expect("static regex")))
        .collect()
    })
}

/// Attribute a column header refers to. An exact (case-insensitive) attribute
/// name beats a keyword hit.
pub fn match_attribute(column: &str, attributes: &[&'static str]) -> Option<&'static str> {
    let lowered = column.to_lowercase();
    if let Some(exact) = attributes.iter().find(|a| a.to_lowercase() == lowered) {
        return Some(*exact);
    }
    keywords()
        .iter()
        .filter(|(attr, _)| attributes.contains(attr))
        .find(|(_, re)| re.is_match(&lowered))
        .map(|(attr, _)| *attr)
}

// ---------------------------------------------------------------------------
// Guessing
// ---------------------------------------------------------------------------

struct Guess {
    source: StarterSource,
    kind: SourceKind,
    ignored: Vec<String>,
}

fn roster_source(file: String) -> StarterSource {
    StarterSource {
        file,
        layout: Some("roster"),
        attributes: [("PID", "Student ID"), ("Student", "Roster Name"), ("Email", "Email")]
            .into_iter()
            .map(|(c, a)| (c.to_string(), a.to_string()))
            .collect(),
        assignments: Vec::new(),
    }
}

/// `7 / 10` -> 10
fn denominator(score: &str) -> Option<f64> {
    score.split('/').nth(1)?.trim().parse().ok()
}

fn guess_source(file: String, stem: &str, rows: &Rows, attributes: &[StarterAttribute]) -> Guess {
    let kind = infer_kind(&rows.headers);
    if kind == SourceKind::Roster {
        return Guess { source: roster_source(file), kind, ignored: Vec::new() };
    }

    let names: Vec<&'static str> = attributes.iter().map(|a| a.name).collect();
    let first_row = rows.rows.first();
    let mut source = StarterSource { file, layout: None, attributes: BTreeMap::new(), assignments: Vec::new() };
    let mut ignored = Vec::new();

    let mut seen = HashSet::new();
    for header in &rows.headers {
        if !seen.insert(header.as_str()) {
            warn!(file = %source.file, column = %header, "duplicate column");
        }
    }

    for (i, column) in rows.headers.iter().enumerate() {
        if let Some(attr) = match_attribute(column, &names) {
            let identifying = attributes.iter().any(|a| a.name == attr && a.identifies_student);
            if source.attributes.values().any(|mapped| mapped == attr) {
                warn!(file = %source.file, attribute = attr, column = %column, "found two columns for attribute");
                ignored.push(column.clone());
            } else if identifying {
                source.attributes.insert(column.clone(), attr.to_string());
            } else {
                ignored.push(column.clone());
            }
            continue;
        }

        match kind {
            SourceKind::Other => {
                let lowered = column.to_lowercase();
                let category = if ["hw", "assignment", "homework"].iter().any(|k| lowered.contains(k)) {
                    "homework"
                } else {
                    "unknown"
                };
                source.assignments.push(StarterAssignment {
                    name: column.clone(),
                    score_column: Some(column.clone()),
                    max_points: 1.0,
                    category: category.into(),
                    filters: None,
                    due: None,
                    timestamp_column: None,
                });
            }
            SourceKind::Gradescope => {
                let max_column = format!("{column} - Max Points");
                if rows.headers.get(i + 1) == Some(&max_column) {
                    let max_points = first_row
                        .and_then(|r| r.get(&max_column))
                        .and_then(|v| v.trim().parse().ok())
                        .unwrap_or(1.0);
                    source.assignments.push(StarterAssignment {
                        name: column.clone(),
                        score_column: Some(column.clone()),
                        max_points,
                        category: kind.as_str().into(),
                        filters: None,
                        due: None,
                        timestamp_column: None,
                    });
                }
            }
            SourceKind::Roster | SourceKind::ScoredForm | SourceKind::UnscoredForm => {}
        }
    }

    match kind {
        SourceKind::ScoredForm => source.assignments.push(StarterAssignment {
            name: stem.to_string(),
            score_column: Some("Score".into()),
            max_points: first_row
                .and_then(|r| r.get("Score"))
                .and_then(denominator)
                .unwrap_or(1.0),
            category: kind.as_str().into(),
            filters: Some(vec!["strip", "stripDenominator", "toFloat"]),
            due: Some(FAR_FUTURE),
            timestamp_column: Some("Timestamp"),
        }),
        SourceKind::UnscoredForm => source.assignments.push(StarterAssignment {
            name: stem.to_string(),
            score_column: None,
            max_points: 1.0,
            category: kind.as_str().into(),
            filters: None,
            due: Some(FAR_FUTURE),
            timestamp_column: Some("Timestamp"),
        }),
        _ => {}
    }

    Guess { source, kind, ignored }
}

/// `path` as seen from `base`: relative when it lives under `base`, absolute
/// otherwise. Without a base the path is kept as given.
fn source_path(path: &Path, base: Option<&Path>) -> String {
    let Some(base) = base else {
        return path.display().to_string();
    };
    let Ok(absolute) = path.canonicalize() else {
        return path.display().to_string();
    };
    match absolute.strip_prefix(base) {
        Ok(relative) => relative.display().to_string(),
        Err(_) => absolute.display().to_string(),
    }
}

/// Scan `dir` and build the starter TOML text.
pub fn generate(dir: &Path, relative_to: Option<&Path>) -> Result<String, CliError> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| CliError::usage(format!("cannot read {}: {e}", dir.display())))?;

    let mut files: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
    files.sort();

    // `run` resolves source paths against the course file's directory.
    let base = relative_to.and_then(|p| p.canonicalize().ok());

    let attributes = default_attributes();
    let mut guesses = Vec::new();
    for path in files {
        if !path.is_file() {
            continue;
        }
        let is_csv = path.extension().and_then(|e| e.to_str()).is_some_and(|e| e.eq_ignore_ascii_case("csv"));
        if !is_csv {
            warn!(file = %path.display(), "skipping: only CSV exports are scanned");
            continue;
        }

        let rows = read_rows(&path, Layout::Table, None).map_err(|e| CliError::new(io_exit_code(&e), e.to_string()))?;
        let stem = path.file_stem().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let file = source_path(&path, base.as_deref());
        guesses.push(guess_source(file, &stem, &rows, &attributes));
    }

    let mut sections: Vec<StarterSection> = Vec::new();
    for assignment in guesses.iter().flat_map(|g| &g.source.assignments) {
        if !sections.iter().any(|s| s.category == assignment.category) {
            sections.push(StarterSection { title: assignment.category.clone(), category: assignment.category.clone() });
        }
    }

    let mut header = format!("# Generated by `rollbook init` from {}.\n#\n", dir.display());
    for guess in &guesses {
        header.push_str(&format!("# {}: {}", guess.source.file, guess.kind.as_str()));
        if !guess.ignored.is_empty() {
            header.push_str(&format!(" (ignored columns: {})", guess.ignored.join(", ")));
        }
        header.push('\n');
    }
    header.push('\n');

    let starter = StarterConfig {
        name: "CSEnn Grade Report".into(),
        disclaimer: "These are all the scores recorded for you in this course. If there are any \
                     discrepancies between the scores you see here and your own records, email..."
            .into(),
        attributes,
        sources: guesses.into_iter().map(|g| g.source).collect(),
        report: StarterReport { sections },
    };

    let body = toml::to_string_pretty(&starter)
        .map_err(|e| CliError::general(format!("cannot serialize course file: {e}")))?;
    Ok(header + &body)
}

pub fn cmd_init(dir: PathBuf, output: Option<PathBuf>) -> Result<(), CliError> {
    let relative_to = match output {
        Some(ref path) => path.parent().map(|p| if p.as_os_str().is_empty() { Path::new(".") } else { p }),
        None => None,
    };
    if let Some(parent) = relative_to {
        std::fs::create_dir_all(parent)
            .map_err(|e| CliError::new(EXIT_WRITE, format!("cannot create {}: {e}", parent.display())))?;
    }
    let text = generate(&dir, relative_to)?;

    match output {
        Some(path) => {
            std::fs::write(&path, &text)
                .map_err(|e| CliError::new(EXIT_WRITE, format!("cannot write {}: {e}", path.display())))?;
            eprintln!("wrote {}", path.display());
        }
        None => print!("{text}"),
    }
    Ok(())
}
