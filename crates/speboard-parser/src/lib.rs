//! # speboard-parser
//!
//! Spreadsheet intake and tabular normalization for speboard.
//!
//! This crate provides:
//! - Byte-source reading (XLSX/XLS/ODS via calamine) into [`RawTable`]s
//! - Header alias resolution (`columns`)
//! - The normalizer turning raw rows into typed process, track and task rows
//!   (`normalize`)
//!
//! The three sources have no ordering dependency, so [`read_sources`] reads
//! them concurrently; it returns only once all three are materialized.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use speboard_core::table::{Cell, RawTable};
//! use speboard_parser::{normalize_tables, RawTables};
//!
//! let processes = RawTable::new(["ID Processo", "SPE", "Cliente"])
//!     .row(vec![Cell::text("P-001"), Cell::text("Solar Um"), Cell::text("Grupo Sol")]);
//! let tracks = RawTable::new(["ID Processo", "Esteira"]);
//! let tasks = RawTable::new(["ID Processo", "Esteira", "Tarefa"]);
//!
//! let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
//! let rows = normalize_tables(&RawTables { processes, tracks, tasks }, now).unwrap();
//! assert_eq!(rows.processes.rows[0].name, "Solar Um");
//! ```

pub mod columns;
pub mod normalize;

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use speboard_core::dates::from_serial_exact;
use speboard_core::table::{Cell, RawTable};
use speboard_core::Timestamp;
use thiserror::Error;

pub use normalize::{
    canonical_phase, canonical_responsibility, canonical_status, coerce_date, Normalized,
    ProcessRow, TaskRow, TrackRow,
};

/// Which of the three import sources a table came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Processes,
    Tracks,
    Tasks,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Processes => "processes",
            SourceKind::Tracks => "tracks",
            SourceKind::Tasks => "tasks",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Parsing error
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unreadable {kind} spreadsheet: {message}")]
    Workbook { kind: SourceKind, message: String },

    #[error("The {0} spreadsheet has no sheet with a header row")]
    EmptySheet(SourceKind),

    #[error("The {kind} spreadsheet is missing the required column '{column}'")]
    MissingColumn { kind: SourceKind, column: &'static str },

    #[error("The {0} spreadsheet has no row with a process identifier")]
    NoUsableRows(SourceKind),
}

/// The three raw byte sources supplied by file intake
#[derive(Debug, Clone, Default)]
pub struct TabularSources {
    pub processes: Vec<u8>,
    pub tracks: Vec<u8>,
    pub tasks: Vec<u8>,
}

/// The three sources, materialized as raw tables
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTables {
    pub processes: RawTable,
    pub tracks: RawTable,
    pub tasks: RawTable,
}

/// Typed rows of all three sources
#[derive(Debug, Clone)]
pub struct NormalizedSources {
    pub processes: Normalized<ProcessRow>,
    pub tracks: Normalized<TrackRow>,
    pub tasks: Normalized<TaskRow>,
}

/// Read the first sheet of a spreadsheet byte source
pub fn read_table(bytes: &[u8], source: SourceKind) -> Result<RawTable, ParseError> {
    let workbook_error = |e: calamine::Error| ParseError::Workbook {
        kind: source,
        message: e.to_string(),
    };

    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(workbook_error)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(ParseError::EmptySheet(source))?
        .map_err(workbook_error)?;

    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or(ParseError::EmptySheet(source))?
        .iter()
        .map(|cell| convert_cell(cell).as_text())
        .collect();
    if header.iter().all(String::is_empty) {
        return Err(ParseError::EmptySheet(source));
    }

    let table_rows: Vec<Vec<Cell>> = rows
        .map(|row| row.iter().map(convert_cell).collect::<Vec<_>>())
        .filter(|row| !row.iter().all(Cell::is_empty))
        .collect();

    tracing::debug!(%source, rows = table_rows.len(), "read spreadsheet source");
    Ok(RawTable {
        header,
        rows: table_rows,
    })
}

fn convert_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => from_serial_exact(dt.as_f64()).map_or(Cell::Empty, Cell::Date),
    }
}

/// Read all three byte sources concurrently; any failure fails the whole read
pub fn read_sources(sources: &TabularSources) -> Result<RawTables, ParseError> {
    let (processes, (tracks, tasks)) = rayon::join(
        || read_table(&sources.processes, SourceKind::Processes),
        || {
            rayon::join(
                || read_table(&sources.tracks, SourceKind::Tracks),
                || read_table(&sources.tasks, SourceKind::Tasks),
            )
        },
    );
    Ok(RawTables {
        processes: processes?,
        tracks: tracks?,
        tasks: tasks?,
    })
}

/// Normalize all three raw tables into typed rows
pub fn normalize_tables(tables: &RawTables, now: Timestamp) -> Result<NormalizedSources, ParseError> {
    let processes = normalize::process_rows(&tables.processes)?;
    if processes.rows.is_empty() {
        return Err(ParseError::NoUsableRows(SourceKind::Processes));
    }
    let tracks = normalize::track_rows(&tables.tracks)?;
    let tasks = normalize::task_rows(&tables.tasks, now)?;

    tracing::info!(
        processes = processes.rows.len(),
        tracks = tracks.rows.len(),
        tasks = tasks.rows.len(),
        skipped = processes.skipped + tracks.skipped + tasks.skipped,
        "normalized import sources"
    );
    Ok(NormalizedSources {
        processes,
        tracks,
        tasks,
    })
}

/// Read and normalize the three byte sources
pub fn parse_sources(sources: &TabularSources, now: Timestamp) -> Result<NormalizedSources, ParseError> {
    normalize_tables(&read_sources(sources)?, now)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_bytes_are_a_workbook_error() {
        let err = read_table(b"definitely not a spreadsheet", SourceKind::Tracks).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Workbook {
                kind: SourceKind::Tracks,
                ..
            }
        ));
    }

    #[test]
    fn one_bad_source_fails_the_whole_read() {
        let sources = TabularSources::default();
        assert!(read_sources(&sources).is_err());
    }

    #[test]
    fn parse_error_display() {
        let err = ParseError::MissingColumn {
            kind: SourceKind::Tasks,
            column: "process_id",
        };
        let msg = err.to_string();
        assert!(msg.contains("tasks"));
        assert!(msg.contains("process_id"));
        assert!(ParseError::NoUsableRows(SourceKind::Processes)
            .to_string()
            .contains("processes"));
    }

    #[test]
    fn error_cells_become_empty() {
        assert_eq!(convert_cell(&Data::Empty), Cell::Empty);
        assert_eq!(convert_cell(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(convert_cell(&Data::String("x".into())), Cell::text("x"));
    }
}
