// rollbook - merge course grade exports into one roster and per-student reports

mod exit_codes;
mod init;
mod logging;
mod report;
mod run;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};

use exit_codes::{EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "rollbook")]
#[command(about = "Merge roster, clicker, form and LMS exports into per-student grade reports")]
#[command(version)]
struct Cli {
    /// More log output (-v info, -vv debug)
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve every source against the roster and render reports
    #[command(after_help = "\
Examples:
  rollbook run cse101.course.toml --text
  rollbook run cse101.course.toml --reports reports/ --csv summary.csv
  rollbook run cse101.course.toml --json > result.json
  rollbook run cse101.course.toml --output result.json --strict")]
    Run {
        /// Path to the course TOML file
        course: PathBuf,

        /// Print the full run result as JSON to stdout
        #[arg(long)]
        json: bool,

        /// Write the JSON run result to a file
        #[arg(long)]
        output: Option<PathBuf>,

        /// Write one HTML report per student into this directory
        #[arg(long, value_name = "DIR")]
        reports: Option<PathBuf>,

        /// Write a one-row-per-student CSV summary
        #[arg(long, value_name = "FILE")]
        csv: Option<PathBuf>,

        /// Print the per-student text report to stdout
        #[arg(long, conflicts_with = "json")]
        text: bool,

        /// Exit non-zero if any warning was raised
        #[arg(long)]
        strict: bool,
    },

    /// Check a course file without reading any source
    #[command(after_help = "\
Examples:
  rollbook validate cse101.course.toml")]
    Validate {
        /// Path to the course TOML file
        course: PathBuf,
    },

    /// Guess a starter course file from a directory of CSV exports
    #[command(after_help = "\
Examples:
  rollbook init data/
  rollbook init data/ --output data/cse101.course.toml")]
    Init {
        /// Directory holding the exports
        dir: PathBuf,

        /// Write the course file here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn general(msg: impl Into<String>) -> Self {
        Self::new(EXIT_ERROR, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let result = match cli.command {
        Commands::Run { course, json, output, reports, csv, text, strict } => {
            run::cmd_run(run::RunArgs { course, json, output, reports, csv, text, strict })
        }
        Commands::Validate { course } => run::cmd_validate(course),
        Commands::Init { dir, output } => init::cmd_init(dir, output),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}
