//! Report rendering: per-student text and HTML, plus the CSV summary.

use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use rollbook_io::clean::format_number;
use rollbook_io::{AssignmentCatalog, AssignmentInfo, CourseConfig};
use rollbook_roster::{AttributeSchema, GradeCell, Roster, RosterEntry, Score, StudentId};
use tracing::warn;

const RULE: &str = "--------------------------";

pub struct ReportContext<'a> {
    pub config: &'a CourseConfig,
    pub schema: &'a AttributeSchema,
    pub catalog: AssignmentCatalog,
}

impl<'a> ReportContext<'a> {
    pub fn new(config: &'a CourseConfig, schema: &'a AttributeSchema) -> Self {
        Self { config, schema, catalog: config.catalog() }
    }

    /// Students missing any `only_print_if_present` attribute get no text or HTML report.
    pub fn printable(&self, entry: &RosterEntry) -> bool {
        self.config.print_filters().iter().all(|attr| entry.info.contains_key(*attr))
    }

    /// Attribute shown as the student's name: the first print-filter attribute,
    /// else the first non-identifying singleton.
    fn display_attribute(&self) -> Option<&str> {
        self.config.print_filters().first().copied().or_else(|| {
            self.schema
                .iter()
                .find(|(_, flags)| flags.one_per_student && !flags.identifies_student)
                .map(|(name, _)| name)
        })
    }

    fn sections(&self) -> impl Iterator<Item = (&str, Vec<&AssignmentInfo>)> {
        self.config
            .report
            .sections
            .iter()
            .map(|s| (s.title.as_str(), self.catalog.in_category(&s.category).collect()))
    }
}

// ---------------------------------------------------------------------------
// Score formatting
// ---------------------------------------------------------------------------

pub fn format_score(score: &Score) -> String {
    match score {
        Score::Points(p) => format_number(*p),
        Score::Marker(text) => text.clone(),
    }
}

/// `7.5/10`, `0/10 (late - received ...)`; a missing grade shows as `0`.
fn score_line(cell: Option<&GradeCell>, info: &AssignmentInfo) -> String {
    let max = format_number(info.max_points);
    match cell {
        None => format!("0/{max}"),
        Some(cell) => {
            let score = format_score(&cell.grade.score);
            match cell.grade.annotation {
                Some(ref note) => format!("{score}/{max} ({note})"),
                None => format!("{score}/{max}"),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

pub fn render_text(ctx: &ReportContext<'_>, student: &StudentId, entry: &RosterEntry) -> String {
    let mut out = String::new();
    out.push('\n');
    out.push_str(RULE);
    out.push('\n');
    out.push_str(&format!("{student}\n"));

    for (name, value) in &entry.info {
        out.push_str(&format!("{name}: {}\n", value.values().join(", ")));
    }

    for (title, assignments) in ctx.sections() {
        out.push_str(&format!("{title}\n"));
        for info in assignments {
            let line = score_line(entry.grades.get(&info.name), info);
            out.push_str(&format!("\t{}\t{line}\n", info.name));
        }
    }

    out.push_str(RULE);
    out.push('\n');
    out
}

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// `Clicker ID: unknown`, `Clicker ID: X`, or `Clicker IDs: X, Y`.
fn identifier_line(attribute: &str, values: &[&str]) -> String {
    match values {
        [] => format!("{attribute}: unknown"),
        [one] => format!("{attribute}: {one}"),
        many => format!("{attribute}s: {}", many.join(", ")),
    }
}

pub fn render_html(ctx: &ReportContext<'_>, student: &StudentId, entry: &RosterEntry) -> String {
    let mut header = Vec::new();
    if let Some(attr) = ctx.display_attribute() {
        if let Some(value) = entry.info.get(attr) {
            header.push(format!("{attr}: {}", value.values().join(", ")));
        }
    }
    header.push(format!("{}: {student}", ctx.schema.primary()));
    for attr in ctx.schema.secondary_identifiers() {
        let values = entry.info.get(attr).map(|v| v.values()).unwrap_or_default();
        header.push(identifier_line(attr, &values));
    }
    let header: Vec<String> = header.iter().map(|line| escape_html(line)).collect();

    let mut body = String::new();
    for (title, assignments) in ctx.sections() {
        body.push_str(&format!("<h2>{}</h2>\n", escape_html(title)));
        for info in assignments {
            let line = score_line(entry.grades.get(&info.name), info);
            body.push_str(&format!(
                "<p><b>{}:</b> {}</p>\n",
                escape_html(&info.name),
                escape_html(&line)
            ));
        }
    }

    format!(
        "<html>\n<head><meta charset=\"utf-8\"><title>{title}</title></head>\n<body>\n\
         <h1>{title}</h1>\n<h2>{header}</h2>\n<div>{disclaimer}</div>\n{body}</body>\n</html>\n",
        title = escape_html(&ctx.config.name),
        header = header.join(" <br/>\n"),
        disclaimer = escape_html(&ctx.config.disclaimer),
    )
}

/// One `<student id>.html` per printable student. Returns how many were written.
pub fn write_html_reports(ctx: &ReportContext<'_>, roster: &Roster, dir: &Path) -> std::io::Result<usize> {
    std::fs::create_dir_all(dir)?;
    let mut used = HashSet::new();
    let mut written = 0;
    for (student, entry) in &roster.entries {
        if !ctx.printable(entry) {
            continue;
        }
        let stem = unique_stem(file_stem(student), &mut used);
        if stem != student.as_str() {
            warn!(student = %student, file = %format!("{stem}.html"), "report file renamed");
        }
        std::fs::write(dir.join(format!("{stem}.html")), render_html(ctx, student, entry))?;
        written += 1;
    }
    Ok(written)
}

/// Two ids can sanitize to the same stem (`A/1`, `A_1`); later ones get `-2`, `-3`, ...
fn unique_stem(stem: String, used: &mut HashSet<String>) -> String {
    let mut candidate = stem.clone();
    let mut n = 1;
    while !used.insert(candidate.clone()) {
        n += 1;
        candidate = format!("{stem}-{n}");
    }
    candidate
}

/// Student ids come from user data; keep them to a single path component.
fn file_stem(student: &StudentId) -> String {
    student
        .as_str()
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect()
}

// ---------------------------------------------------------------------------
// CSV summary
// ---------------------------------------------------------------------------

/// Primary id, every other attribute in schema order, then every catalog
/// assignment. Multi-valued attributes are joined with `; `.
pub fn write_csv_summary<W: Write>(ctx: &ReportContext<'_>, roster: &Roster, out: W) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(out);

    let attributes: Vec<&str> = ctx
        .schema
        .iter()
        .map(|(name, _)| name)
        .filter(|name| *name != ctx.schema.primary())
        .collect();

    let mut header: Vec<&str> = vec![ctx.schema.primary()];
    header.extend(&attributes);
    header.extend(ctx.catalog.iter().map(|a| a.name.as_str()));
    writer.write_record(&header)?;

    for (student, entry) in &roster.entries {
        let mut row = vec![student.to_string()];
        for attr in &attributes {
            row.push(entry.info.get(*attr).map(|v| v.values().join("; ")).unwrap_or_default());
        }
        for info in ctx.catalog.iter() {
            row.push(
                entry
                    .grades
                    .get(&info.name)
                    .map(|cell| format_score(&cell.grade.score))
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rollbook_roster::{run, Grade, RecordOrigin, RunOptions, SourceRecord};

    const COURSE: &str = r#"
name = "CSE 101 <Winter>"
disclaimer = "Email the staff."

[[attributes]]
name = "Roster Name"
one_per_student = true
only_print_if_present = true

[[attributes]]
name = "Student ID"
identifies_student = true
one_per_student = true

[[attributes]]
name = "Clicker ID"
identifies_student = true

[[sources]]
file = "quiz.csv"
[sources.attributes]
SID = "Student ID"
[[sources.assignments]]
name = "quiz 1"
score_column = "Score"
max_points = 10
category = "quiz"
[[sources.assignments]]
name = "quiz 2"
score_column = "Score2"
max_points = 10
category = "quiz"

[[report.sections]]
title = "Quizzes"
category = "quiz"
"#;

    fn roster(schema: &AttributeSchema) -> Roster {
        let records = vec![
            SourceRecord::new(RecordOrigin::new("roster.csv", 1))
                .with_attribute("Student ID", "A1")
                .with_attribute("Roster Name", "Lovelace, Ada"),
            SourceRecord::new(RecordOrigin::new("roster.csv", 2)).with_attribute("Student ID", "A2"),
            SourceRecord::new(RecordOrigin::new("clicker.csv", 1))
                .with_attribute("Student ID", "A1")
                .with_attribute("Clicker ID", "C1"),
            SourceRecord::new(RecordOrigin::new("clicker.csv", 2))
                .with_attribute("Student ID", "A1")
                .with_attribute("Clicker ID", "C2"),
            SourceRecord::new(RecordOrigin::new("quiz.csv", 1))
                .with_attribute("Student ID", "A1")
                .with_grade("quiz 1", Grade::points(7.5))
                .with_grade("quiz 2", Grade::points(0.0).annotated("late - received Jan 16, 08:30:05")),
        ];
        run(schema, records, &RunOptions::default()).unwrap().roster
    }

    fn fixture() -> (CourseConfig, AttributeSchema) {
        let config = CourseConfig::from_toml(COURSE).unwrap();
        let schema = config.schema().unwrap();
        (config, schema)
    }

    #[test]
    fn text_report_lists_sections_and_missing_grades() {
        let (config, schema) = fixture();
        let roster = roster(&schema);
        let ctx = ReportContext::new(&config, &schema);
        let student = StudentId::from("A1");
        let text = render_text(&ctx, &student, roster.get(&student).unwrap());

        assert!(text.starts_with("\n--------------------------\nA1\n"));
        assert!(text.contains("Clicker ID: C1, C2\n"));
        assert!(text.contains("Roster Name: Lovelace, Ada\n"));
        assert!(text.contains("Quizzes\n\tquiz 1\t7.5/10\n"));
        assert!(text.contains("\tquiz 2\t0/10 (late - received Jan 16, 08:30:05)\n"));
        assert!(text.ends_with("--------------------------\n"));

        let other = StudentId::from("A2");
        let text = render_text(&ctx, &other, roster.get(&other).unwrap());
        assert!(text.contains("\tquiz 1\t0/10\n"));
    }

    #[test]
    fn print_filter_skips_students_without_name() {
        let (config, schema) = fixture();
        let roster = roster(&schema);
        let ctx = ReportContext::new(&config, &schema);
        assert!(ctx.printable(roster.get(&"A1".into()).unwrap()));
        assert!(!ctx.printable(roster.get(&"A2".into()).unwrap()));
    }

    #[test]
    fn identifier_lines_cover_zero_one_many() {
        assert_eq!(identifier_line("Clicker ID", &[]), "Clicker ID: unknown");
        assert_eq!(identifier_line("Clicker ID", &["C1"]), "Clicker ID: C1");
        assert_eq!(identifier_line("Clicker ID", &["C1", "C2"]), "Clicker IDs: C1, C2");
    }

    #[test]
    fn html_report_is_escaped() {
        let (config, schema) = fixture();
        let roster = roster(&schema);
        let ctx = ReportContext::new(&config, &schema);
        let student = StudentId::from("A1");
        let html = render_html(&ctx, &student, roster.get(&student).unwrap());

        assert!(html.contains("<h1>CSE 101 &lt;Winter&gt;</h1>"));
        assert!(html.contains("Roster Name: Lovelace, Ada"));
        assert!(html.contains("Student ID: A1"));
        assert!(html.contains("Clicker IDs: C1, C2"));
        assert!(html.contains("<p><b>quiz 1:</b> 7.5/10</p>"));
        assert!(html.contains("<div>Email the staff.</div>"));
    }

    #[test]
    fn html_reports_skip_unprintable_students() {
        let (config, schema) = fixture();
        let roster = roster(&schema);
        let ctx = ReportContext::new(&config, &schema);
        let dir = tempfile::tempdir().unwrap();

        let written = write_html_reports(&ctx, &roster, dir.path()).unwrap();
        assert_eq!(written, 1);
        assert!(dir.path().join("A1.html").exists());
        assert!(!dir.path().join("A2.html").exists());
    }

    #[test]
    fn csv_summary_has_every_student() {
        let (config, schema) = fixture();
        let roster = roster(&schema);
        let ctx = ReportContext::new(&config, &schema);
        let mut out = Vec::new();
        write_csv_summary(&ctx, &roster, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Student ID,Roster Name,Clicker ID,quiz 1,quiz 2");
        assert_eq!(lines[1], "A1,\"Lovelace, Ada\",C1; C2,7.5,0");
        assert_eq!(lines[2], "A2,,,,");
    }

    #[test]
    fn file_stem_stays_in_directory() {
        assert_eq!(file_stem(&"../x/y".into()), ".._x_y");
    }

    #[test]
    fn colliding_file_stems_get_distinct_reports() {
        let (config, schema) = fixture();
        let records = ["A/1", "A_1"]
            .iter()
            .enumerate()
            .map(|(i, id)| {
                SourceRecord::new(RecordOrigin::new("roster.csv", i + 1))
                    .with_attribute("Student ID", *id)
                    .with_attribute("Roster Name", format!("Student {id}"))
            })
            .collect();
        let roster = run(&schema, records, &RunOptions::default()).unwrap().roster;
        let ctx = ReportContext::new(&config, &schema);

        let dir = tempfile::tempdir().unwrap();
        assert_eq!(write_html_reports(&ctx, &roster, dir.path()).unwrap(), 2);

        let first = std::fs::read_to_string(dir.path().join("A_1.html")).unwrap();
        let second = std::fs::read_to_string(dir.path().join("A_1-2.html")).unwrap();
        assert!(first.contains("Student A/1"));
        assert!(second.contains("Student A_1"));
    }
}
