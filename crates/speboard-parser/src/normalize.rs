//! Tabular normalizer
//!
//! Turns raw rows into typed rows. Nothing in here fails on bad cell
//! content: unparseable dates and numbers become `None`, unknown phase or
//! responsibility text falls back to a documented default, and rows without
//! a process identifier are counted and dropped.
//!
//! Every text heuristic is an ordered rule table evaluated first-match-wins:
//!
//! | Heuristic | Order | Default |
//! |-----------|-------|---------|
//! | Phase | Viability, Juridical, Financial, Engineering, Integration | Viability |
//! | Status | completion date, blocked, completed, deadline passed, delayed, at risk | On Track |
//! | Responsibility | Client, Third Party | Internal |
//!
//! Unmatched phase text lands in Viability. That is a known weakness of the
//! heuristic, kept for parity with existing exports.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use speboard_core::classify::{first_match, Rule};
use speboard_core::dates::{from_serial, start_of_day};
use speboard_core::table::{Cell, RawTable};
use speboard_core::{EntityMetadata, Phase, Responsibility, TaskStatus, Timestamp};

use crate::columns::{Column, HeaderMap};
use crate::{ParseError, SourceKind};

/// Rows that survived normalization, plus the count of dropped rows
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub rows: Vec<T>,
    /// Rows dropped for lacking a process identifier
    pub skipped: usize,
}

/// A process (entity head) row
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRow {
    pub process_id: String,
    pub name: String,
    pub group: String,
    pub start_date: Option<Timestamp>,
    pub metadata: EntityMetadata,
    /// Completion dates aligned with `CANONICAL_MILESTONES`
    pub milestone_dates: [Option<Timestamp>; 4],
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub updated_at: Option<Timestamp>,
}

/// A track ("esteira") row
#[derive(Debug, Clone, PartialEq)]
pub struct TrackRow {
    pub process_id: String,
    pub track_name: String,
    pub phase: Phase,
    pub sla_days: Option<u32>,
}

/// A task row
#[derive(Debug, Clone, PartialEq)]
pub struct TaskRow {
    pub process_id: String,
    pub track_name: String,
    pub phase: Phase,
    pub name: String,
    pub assignee: String,
    pub responsibility: Responsibility,
    pub start_date: Option<Timestamp>,
    pub due_date: Option<Timestamp>,
    /// Present if and only if `status` is `Completed`
    pub completed_date: Option<Timestamp>,
    pub status: TaskStatus,
    pub comment: String,
    pub critical: bool,
    pub sla_days: Option<u32>,
}

// ============================================================================
// Rule tables
// ============================================================================

pub const PHASE_RULES: &[Rule<Phase>] = &[
    Rule::new(&["viab"], Phase::Viability),
    Rule::new(&["jur", "legal"], Phase::Juridical),
    Rule::new(&["financ"], Phase::Financial),
    Rule::new(&["engenh", "engin"], Phase::Engineering),
    Rule::new(&["integra", "carteira", "portfolio"], Phase::Integration),
];

pub const RESPONSIBILITY_RULES: &[Rule<Responsibility>] = &[
    Rule::new(&["cliente", "client"], Responsibility::Client),
    Rule::new(
        &["terceir", "cartori", "cartóri", "third", "registry", "registro", "orgao", "órgão"],
        Responsibility::ThirdParty,
    ),
];

const BLOCKED_KEYWORDS: &[&str] = &["bloq", "block", "imped"];
const COMPLETED_KEYWORDS: &[&str] = &["conclu", "finaliz", "complet", "done", "feito"];
const DELAYED_KEYWORDS: &[&str] = &["atras", "delay", "late"];
const AT_RISK_KEYWORDS: &[&str] = &["risco", "risk", "atenc", "atenç"];

/// One step of the status precedence table
#[derive(Debug, Clone, Copy)]
pub enum StatusRule {
    /// A completion date is present
    CompletionDate,
    /// The status text contains a keyword
    Keyword(Rule<TaskStatus>),
    /// A due date exists and `now` is past it
    DeadlinePassed,
}

pub const STATUS_RULES: &[StatusRule] = &[
    StatusRule::CompletionDate,
    StatusRule::Keyword(Rule::new(BLOCKED_KEYWORDS, TaskStatus::Blocked)),
    StatusRule::Keyword(Rule::new(COMPLETED_KEYWORDS, TaskStatus::Completed)),
    StatusRule::DeadlinePassed,
    StatusRule::Keyword(Rule::new(DELAYED_KEYWORDS, TaskStatus::Delayed)),
    StatusRule::Keyword(Rule::new(AT_RISK_KEYWORDS, TaskStatus::AtRisk)),
];

impl StatusRule {
    fn outcome(
        &self,
        lowered: &str,
        due: Option<Timestamp>,
        completed: Option<Timestamp>,
        now: Timestamp,
    ) -> Option<TaskStatus> {
        match self {
            StatusRule::CompletionDate => completed.map(|_| TaskStatus::Completed),
            StatusRule::Keyword(rule) => rule.matches(lowered).then_some(rule.outcome),
            StatusRule::DeadlinePassed => due
                .filter(|due| now > *due)
                .map(|_| TaskStatus::Delayed),
        }
    }
}

/// Map free-text track/category names onto the phase enumeration
pub fn canonical_phase(text: &str) -> Phase {
    first_match(PHASE_RULES, text).unwrap_or(Phase::Viability)
}

/// Canonical task status from text and dates
pub fn canonical_status(
    text: &str,
    due: Option<Timestamp>,
    completed: Option<Timestamp>,
    now: Timestamp,
) -> TaskStatus {
    let lowered = text.to_lowercase();
    STATUS_RULES
        .iter()
        .find_map(|rule| rule.outcome(&lowered, due, completed, now))
        .unwrap_or(TaskStatus::OnTrack)
}

pub fn canonical_responsibility(text: &str) -> Responsibility {
    first_match(RESPONSIBILITY_RULES, text).unwrap_or(Responsibility::Internal)
}

// ============================================================================
// Cell coercion
// ============================================================================

/// Coerce a cell to an instant; anything unparseable is `None`
pub fn coerce_date(cell: &Cell) -> Option<Timestamp> {
    match cell {
        Cell::Date(at) => Some(*at),
        Cell::Number(serial) => from_serial(*serial),
        Cell::Text(text) => parse_date_text(text),
        Cell::Empty | Cell::Bool(_) => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%Y/%m/%d"];

/// Parse a date-like string (RFC 3339, ISO, or day-first)
pub fn parse_date_text(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    if let Some(naive) = DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
    {
        return Some(naive.and_utc());
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .map(start_of_day)
}

/// Coerce a cell to a number; decimal commas are accepted
pub fn coerce_number(cell: &Cell) -> Option<f64> {
    match cell {
        Cell::Number(n) if n.is_finite() => Some(*n),
        Cell::Text(text) => text
            .trim()
            .replace(',', ".")
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Coerce a cell to a count of whole days
pub fn coerce_days(cell: &Cell) -> Option<u32> {
    coerce_number(cell)
        .filter(|n| *n >= 0.0 && *n <= f64::from(u32::MAX))
        .map(|n| n.round() as u32)
}

pub fn coerce_flag(cell: &Cell) -> bool {
    match cell {
        Cell::Bool(b) => *b,
        Cell::Number(n) => *n != 0.0,
        Cell::Text(text) => matches!(
            text.trim().to_lowercase().as_str(),
            "sim" | "s" | "yes" | "y" | "true" | "x" | "1" | "verdadeiro"
        ),
        Cell::Empty | Cell::Date(_) => false,
    }
}

fn split_tags(text: &str) -> Vec<String> {
    text.split([',', ';'])
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

// ============================================================================
// Row extraction
// ============================================================================

fn require_process_id(map: &HeaderMap, kind: SourceKind) -> Result<(), ParseError> {
    if map.has(Column::ProcessId) {
        Ok(())
    } else {
        Err(ParseError::MissingColumn {
            kind,
            column: Column::ProcessId.name(),
        })
    }
}

fn date_at(map: &HeaderMap, row: &[Cell], column: Column) -> Option<Timestamp> {
    map.cell(row, column).and_then(coerce_date)
}

fn days_at(map: &HeaderMap, row: &[Cell], column: Column) -> Option<u32> {
    map.cell(row, column).and_then(coerce_days)
}

/// Drop rows without a process identifier, counting them
fn collect_rows<T>(
    table: &RawTable,
    map: &HeaderMap,
    kind: SourceKind,
    mut build: impl FnMut(String, &[Cell]) -> T,
) -> Normalized<T> {
    let mut rows = Vec::with_capacity(table.rows.len());
    let mut skipped = 0usize;
    for row in &table.rows {
        let process_id = map.text(row, Column::ProcessId);
        if process_id.is_empty() {
            skipped += 1;
            continue;
        }
        rows.push(build(process_id, row));
    }
    if skipped > 0 {
        tracing::debug!(%kind, skipped, "dropped rows without a process identifier");
    }
    Normalized { rows, skipped }
}

const PROCESS_COLUMNS: &[Column] = &[
    Column::ProcessId,
    Column::EntityName,
    Column::Group,
    Column::StartDate,
    Column::RegistrationNumber,
    Column::ErpId,
    Column::CrmId,
    Column::City,
    Column::Region,
    Column::Tags,
    Column::Notes,
    Column::UpdatedAt,
    Column::KickoffDate,
    Column::DocumentationDate,
    Column::ContractDate,
    Column::OperationDate,
];

/// Milestone completion columns, aligned with `CANONICAL_MILESTONES`
const MILESTONE_COLUMNS: [Column; 4] = [
    Column::KickoffDate,
    Column::DocumentationDate,
    Column::ContractDate,
    Column::OperationDate,
];

pub fn process_rows(table: &RawTable) -> Result<Normalized<ProcessRow>, ParseError> {
    let map = HeaderMap::resolve(&table.header, PROCESS_COLUMNS);
    require_process_id(&map, SourceKind::Processes)?;

    Ok(collect_rows(table, &map, SourceKind::Processes, |process_id, row| {
        let name = map
            .optional_text(row, Column::EntityName)
            .unwrap_or_else(|| process_id.clone());
        ProcessRow {
            name,
            group: map.text(row, Column::Group),
            start_date: date_at(&map, row, Column::StartDate),
            metadata: EntityMetadata {
                registration_number: map.optional_text(row, Column::RegistrationNumber),
                erp_id: map.optional_text(row, Column::ErpId),
                crm_id: map.optional_text(row, Column::CrmId),
                city: map.optional_text(row, Column::City),
                region: map.optional_text(row, Column::Region),
            },
            milestone_dates: MILESTONE_COLUMNS.map(|column| date_at(&map, row, column)),
            tags: split_tags(&map.text(row, Column::Tags)),
            notes: map.optional_text(row, Column::Notes),
            updated_at: date_at(&map, row, Column::UpdatedAt),
            process_id,
        }
    }))
}

const TRACK_COLUMNS: &[Column] = &[Column::ProcessId, Column::Track, Column::SlaDays];

pub fn track_rows(table: &RawTable) -> Result<Normalized<TrackRow>, ParseError> {
    let map = HeaderMap::resolve(&table.header, TRACK_COLUMNS);
    require_process_id(&map, SourceKind::Tracks)?;

    Ok(collect_rows(table, &map, SourceKind::Tracks, |process_id, row| {
        let track_name = map.text(row, Column::Track);
        TrackRow {
            process_id,
            phase: canonical_phase(&track_name),
            track_name,
            sla_days: days_at(&map, row, Column::SlaDays),
        }
    }))
}

const TASK_COLUMNS: &[Column] = &[
    Column::ProcessId,
    Column::Track,
    Column::TaskName,
    Column::Assignee,
    Column::Responsibility,
    Column::StartDate,
    Column::DueDate,
    Column::CompletedDate,
    Column::Status,
    Column::Comment,
    Column::Critical,
    Column::SlaDays,
];

/// Normalize task rows; `now` drives deadline-based status and stamps
/// keyword-completed tasks that carry no completion date
pub fn task_rows(table: &RawTable, now: Timestamp) -> Result<Normalized<TaskRow>, ParseError> {
    let map = HeaderMap::resolve(&table.header, TASK_COLUMNS);
    require_process_id(&map, SourceKind::Tasks)?;

    Ok(collect_rows(table, &map, SourceKind::Tasks, |process_id, row| {
        let track_name = map.text(row, Column::Track);
        let due_date = date_at(&map, row, Column::DueDate);
        let completed = date_at(&map, row, Column::CompletedDate);
        let status = canonical_status(&map.text(row, Column::Status), due_date, completed, now);
        let completed_date = if status == TaskStatus::Completed {
            completed.or(Some(now))
        } else {
            None
        };

        TaskRow {
            process_id,
            phase: canonical_phase(&track_name),
            track_name,
            name: map
                .optional_text(row, Column::TaskName)
                .unwrap_or_else(|| "(sem nome)".to_string()),
            assignee: map.text(row, Column::Assignee),
            responsibility: canonical_responsibility(&map.text(row, Column::Responsibility)),
            start_date: date_at(&map, row, Column::StartDate),
            due_date,
            completed_date,
            status,
            comment: map.text(row, Column::Comment),
            critical: map.cell(row, Column::Critical).is_some_and(coerce_flag),
            sla_days: days_at(&map, row, Column::SlaDays),
        }
    }))
}
