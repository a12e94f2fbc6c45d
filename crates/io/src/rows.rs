//! Row extraction from CSV and spreadsheet sources.
//!
//! Every source becomes a list of [`Row`]s keyed by header text. Cell values
//! stay as text; typing happens later in [`crate::clean`].

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use serde::{Deserialize, Serialize};

use crate::error::IoError;

/// How the header row is located.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// First row is the header.
    #[default]
    Table,
    /// Registrar export: a section summary table, blank row(s), then the real header.
    Roster,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    /// 1-based position among data rows (the header is not counted).
    pub number: usize,
    pub cells: HashMap<String, String>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rows {
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xls", "xlsb", "ods"];

/// Read every data row of `path`, dispatching on the file extension.
pub fn read_rows(path: &Path, layout: Layout, sheet: Option<&str>) -> Result<Rows, IoError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let grid = if ext == "csv" {
        if sheet.is_some() {
            return Err(IoError::SheetNotAllowed(path.to_path_buf()));
        }
        let content = read_file_as_utf8(path)?;
        csv_grid(&content).map_err(|message| IoError::Read { path: path.to_path_buf(), message })?
    } else if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
        let sheet = sheet.ok_or_else(|| IoError::SheetRequired(path.to_path_buf()))?;
        spreadsheet_grid(path, sheet)?
    } else {
        return Err(IoError::UnsupportedFileType(path.to_path_buf()));
    };

    let grid = match layout {
        Layout::Table => grid,
        Layout::Roster => skip_roster_preamble(grid)
            .ok_or_else(|| IoError::RosterHeaderNotFound(path.to_path_buf()))?,
    };

    Ok(rows_from_grid(grid))
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252 exports).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let read_err = |e: std::io::Error| IoError::Read { path: path.to_path_buf(), message: e.to_string() };

    let mut file = std::fs::File::open(path).map_err(read_err)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(read_err)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

pub fn csv_grid(content: &str) -> Result<Vec<Vec<String>>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    // The reader drops empty lines; roster exports rely on one to end the
    // preamble, so a gap in line numbers becomes an empty row.
    let mut grid = Vec::new();
    let mut expected_line = 1;
    for record in reader.records() {
        let record = record.map_err(|e| e.to_string())?;
        let line = record.position().map(|p| p.line()).unwrap_or(expected_line);
        if line > expected_line && !grid.is_empty() {
            grid.push(Vec::new());
        }
        let embedded: u64 = record.iter().map(|f| f.matches('\n').count() as u64).sum();
        expected_line = line + 1 + embedded;
        grid.push(record.iter().map(str::to_string).collect());
    }
    Ok(grid)
}

fn spreadsheet_grid(path: &Path, sheet: &str) -> Result<Vec<Vec<String>>, IoError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| IoError::Read { path: path.to_path_buf(), message: e.to_string() })?;

    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(IoError::SheetNotFound { path: path.to_path_buf(), sheet: sheet.to_string() });
    }

    let range = workbook
        .worksheet_range(sheet)
        .map_err(|e| IoError::Read { path: path.to_path_buf(), message: e.to_string() })?;

    Ok(range.rows().map(|row| row.iter().map(cell_text).collect()).collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        Data::Float(n) => format!("{n}"),
        Data::Int(n) => format!("{n}"),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::Error(e) => format!("#{e:?}"),
        // Serial number; lateness parsing understands these.
        Data::DateTime(dt) => format!("{}", dt.as_f64()),
    }
}

fn is_blank(row: &[String]) -> bool {
    row.first().map(|c| c.trim().is_empty()).unwrap_or(true)
}

/// Drop the section summary table and the blank line(s) after it.
fn skip_roster_preamble(grid: Vec<Vec<String>>) -> Option<Vec<Vec<String>>> {
    let first_blank = grid.iter().position(|row| is_blank(row))?;
    let header = first_blank + grid[first_blank..].iter().position(|row| !is_blank(row))?;
    Some(grid.into_iter().skip(header).collect())
}

fn rows_from_grid(grid: Vec<Vec<String>>) -> Rows {
    let mut lines = grid.into_iter();
    let headers: Vec<String> = lines
        .next()
        .unwrap_or_default()
        .into_iter()
        .map(|h| h.trim().to_string())
        .collect();

    let rows = lines
        .filter(|line| line.iter().any(|c| !c.trim().is_empty()))
        .enumerate()
        .map(|(i, line)| Row {
            number: i + 1,
            cells: headers
                .iter()
                .zip(line.into_iter().chain(std::iter::repeat(String::new())))
                .map(|(h, v)| (h.clone(), v))
                .collect(),
        })
        .collect();

    Rows { headers, rows }
}
