//! `rollbook run` and `rollbook validate`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use rollbook_io::{extract_all, CourseConfig};
use rollbook_roster::{run, RosterError, RunOptions, RunResult, RunWarning};

use crate::exit_codes::{io_exit_code, roster_exit_code, EXIT_INVALID_CONFIG, EXIT_STRICT_WARNINGS, EXIT_WRITE};
use crate::report::{render_text, write_csv_summary, write_html_reports, ReportContext};
use crate::CliError;

pub struct RunArgs {
    pub course: PathBuf,
    pub json: bool,
    pub output: Option<PathBuf>,
    pub reports: Option<PathBuf>,
    pub csv: Option<PathBuf>,
    pub text: bool,
    pub strict: bool,
}

/// JSON document for `--json` / `--output`.
#[derive(Serialize)]
struct RunDocument<'a> {
    course: &'a str,
    generated_at: String,
    /// Problems found while reading sources, before resolution started.
    extraction_warnings: &'a [RunWarning],
    #[serde(flatten)]
    result: &'a RunResult,
}

fn write_err(path: &Path, e: impl std::fmt::Display) -> CliError {
    CliError::new(EXIT_WRITE, format!("cannot write {}: {e}", path.display()))
}

fn load_config(path: &Path) -> Result<CourseConfig, CliError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::usage(format!("cannot read {}: {e}", path.display())))?;
    CourseConfig::from_toml(&text).map_err(|e| {
        CliError::new(io_exit_code(&e), e.to_string())
            .with_hint(format!("check {}; `rollbook init` can generate a starter file", path.display()))
    })
}

pub fn cmd_validate(course: PathBuf) -> Result<(), CliError> {
    let config = load_config(&course)?;
    let assignments = config.catalog().len();
    eprintln!(
        "{}: ok ({} attributes, {} sources, {} assignments)",
        course.display(),
        config.attributes.len(),
        config.sources.len(),
        assignments,
    );
    Ok(())
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = load_config(&args.course)?;
    let schema = config
        .schema()
        .map_err(|e| CliError::new(EXIT_INVALID_CONFIG, e.to_string()))?;

    let base_dir = args.course.parent().unwrap_or_else(|| Path::new("."));
    let extraction = extract_all(&config, base_dir).map_err(|e| CliError::new(io_exit_code(&e), e.to_string()))?;
    info!(records = extraction.records.len(), "sources extracted");

    let options = RunOptions { max_passes: config.max_passes };
    let result = run(&schema, extraction.records, &options).map_err(|e| {
        let err = CliError::new(roster_exit_code(&e), e.to_string());
        match e {
            RosterError::NoConvergence { .. } => {
                err.with_hint("raise max_passes in the course file or remove it")
            }
            _ => err,
        }
    })?;

    let ctx = ReportContext::new(&config, &schema);

    if args.json || args.output.is_some() {
        let doc = RunDocument {
            course: &config.name,
            generated_at: chrono::Utc::now().to_rfc3339(),
            extraction_warnings: &extraction.warnings,
            result: &result,
        };
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| CliError::general(format!("JSON serialization error: {e}")))?;

        if let Some(ref path) = args.output {
            std::fs::write(path, &json).map_err(|e| write_err(path, e))?;
            eprintln!("wrote {}", path.display());
        }
        if args.json {
            println!("{json}");
        }
    }

    if args.text {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for (student, entry) in &result.roster.entries {
            if ctx.printable(entry) {
                out.write_all(render_text(&ctx, student, entry).as_bytes())
                    .map_err(|e| CliError::new(EXIT_WRITE, format!("cannot write report: {e}")))?;
            }
        }
    }

    if let Some(ref dir) = args.reports {
        let written = write_html_reports(&ctx, &result.roster, dir).map_err(|e| write_err(dir, e))?;
        eprintln!("wrote {written} report(s) to {}", dir.display());
    }

    if let Some(ref path) = args.csv {
        let file = std::fs::File::create(path).map_err(|e| write_err(path, e))?;
        write_csv_summary(&ctx, &result.roster, file).map_err(|e| write_err(path, e))?;
        eprintln!("wrote {}", path.display());
    }

    let warnings = extraction.warnings.len() + result.warnings.len();
    print_summary(&result, &extraction.warnings);

    if args.strict && warnings > 0 {
        return Err(CliError::new(
            EXIT_STRICT_WARNINGS,
            format!("{warnings} warning(s) raised (--strict)"),
        ));
    }

    Ok(())
}

/// Human summary on stderr; stdout stays clean for reports and JSON.
fn print_summary(result: &RunResult, extraction_warnings: &[RunWarning]) {
    let s = &result.summary;
    eprintln!(
        "{} records in {} pass(es): {} students, {} resolved, {} rejected merges, {} duplicate grades, {} unresolved",
        s.records, s.passes, s.students, s.resolved, s.rejected_merges, s.duplicate_grades, s.unresolved,
    );

    let mut by_kind: BTreeMap<&str, usize> = BTreeMap::new();
    for warning in extraction_warnings.iter().chain(&result.warnings) {
        *by_kind.entry(warning_kind(warning)).or_default() += 1;
    }
    if !by_kind.is_empty() {
        let parts: Vec<String> = by_kind.iter().map(|(kind, n)| format!("{n} {kind}")).collect();
        eprintln!("warnings: {}", parts.join(", "));
    }
}

fn warning_kind(warning: &RunWarning) -> &'static str {
    match warning {
        RunWarning::MergeRejected { .. } => "merge_rejected",
        RunWarning::DuplicateGrade { .. } => "duplicate_grade",
        RunWarning::Unidentified { .. } => "unidentified",
        RunWarning::InvalidValue { .. } => "invalid_value",
        RunWarning::UnreadableScore { .. } => "unreadable_score",
        RunWarning::UnreadableTimestamp { .. } => "unreadable_timestamp",
    }
}
