//! # speboard-core
//!
//! Core domain model and utilities for the speboard onboarding engine.
//!
//! This crate provides:
//! - Domain types: `Entity`, `Workflow`, `Task`, `Milestone`, `UpdateEntry`
//! - Date utilities (`dates`) and ordered classification rule tables (`classify`)
//! - The loosely-typed raw table model fed by spreadsheet intake (`table`)
//! - Portfolio read models for dashboards (`portfolio`)
//! - The `Renderer` trait and error types
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use speboard_core::{Phase, Task, TaskStatus, Workflow};
//!
//! let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
//! let mut workflow = Workflow::new("P-001-viability", Phase::Viability, 15);
//! workflow.tasks.push(Task::new("P-001-T001", "Levantamento", start).status(TaskStatus::Completed));
//! workflow.tasks.push(Task::new("P-001-T002", "Parecer", start));
//!
//! assert_eq!(workflow.computed_progress(), 50);
//! ```

pub mod classify;
pub mod dates;
pub mod portfolio;
pub mod table;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;

pub use classify::{classify_milestone, classify_root_cause, RootCause};
pub use dates::{day_difference, task_age};

// ============================================================================
// Type Aliases
// ============================================================================

/// An instant on the onboarding timeline
pub type Timestamp = DateTime<Utc>;

/// Externally sourced process identifier (join key across the three sources)
pub type ProcessId = String;

/// Unique identifier for a task
pub type TaskId = String;

/// Group label carried by entities synthesized for orphaned task rows
pub const GHOST_GROUP: &str = "FALHA DE INTEGRIDADE";

/// Tag carried by entities synthesized for orphaned task rows
pub const ORPHAN_TAG: &str = "orphan";

// ============================================================================
// Enumerations
// ============================================================================

/// Onboarding phase, in canonical order
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Viability,
    Juridical,
    Financial,
    Engineering,
    Integration,
}

impl Phase {
    /// All phases in canonical order
    pub const ALL: [Phase; 5] = [
        Phase::Viability,
        Phase::Juridical,
        Phase::Financial,
        Phase::Engineering,
        Phase::Integration,
    ];

    /// Stable key used in identifiers
    pub fn key(&self) -> &'static str {
        match self {
            Phase::Viability => "viability",
            Phase::Juridical => "juridical",
            Phase::Financial => "financial",
            Phase::Engineering => "engineering",
            Phase::Integration => "integration",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Viability => "Viability",
            Phase::Juridical => "Juridical",
            Phase::Financial => "Financial",
            Phase::Engineering => "Engineering",
            Phase::Integration => "Integration",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Viability => "Viabilidade",
            Phase::Juridical => "Jurídico",
            Phase::Financial => "Financeiro",
            Phase::Engineering => "Engenharia",
            Phase::Integration => "Integração",
        }
    }

    /// Position in the canonical phase order
    pub fn order(&self) -> usize {
        *self as usize
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Task status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    OnTrack,
    AtRisk,
    Delayed,
    Blocked,
    Completed,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 5] = [
        TaskStatus::OnTrack,
        TaskStatus::AtRisk,
        TaskStatus::Delayed,
        TaskStatus::Blocked,
        TaskStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::OnTrack => "On Track",
            TaskStatus::AtRisk => "At Risk",
            TaskStatus::Delayed => "Delayed",
            TaskStatus::Blocked => "Blocked",
            TaskStatus::Completed => "Completed",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::OnTrack => "No Prazo",
            TaskStatus::AtRisk => "Em Risco",
            TaskStatus::Delayed => "Atrasado",
            TaskStatus::Blocked => "Bloqueado",
            TaskStatus::Completed => "Concluído",
        }
    }

    /// Parse a status from its English name, Portuguese label or snake_case key
    pub fn from_name(name: &str) -> Option<Self> {
        let folded = name.trim().to_lowercase().replace(['_', '-'], " ");
        Self::ALL.into_iter().find(|status| {
            folded == status.as_str().to_lowercase() || folded == status.label().to_lowercase()
        })
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Aggregate status of an entity
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityStatus {
    #[default]
    OnTrack,
    AtRisk,
    Delayed,
    Completed,
}

impl EntityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::OnTrack => "On Track",
            EntityStatus::AtRisk => "At Risk",
            EntityStatus::Delayed => "Delayed",
            EntityStatus::Completed => "Completed",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            EntityStatus::OnTrack => "No Prazo",
            EntityStatus::AtRisk => "Em Risco",
            EntityStatus::Delayed => "Atrasado",
            EntityStatus::Completed => "Concluído",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Party responsible for moving a task forward
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Responsibility {
    /// The onboarding operator (Trinus)
    #[default]
    Internal,
    Client,
    ThirdParty,
}

impl Responsibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Responsibility::Internal => "Internal",
            Responsibility::Client => "Client",
            Responsibility::ThirdParty => "Third Party",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            Responsibility::Internal => "Trinus",
            Responsibility::Client => "Cliente",
            Responsibility::ThirdParty => "Terceiros",
        }
    }
}

impl std::fmt::Display for Responsibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derived state of a milestone
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MilestoneStatus {
    Completed,
    Pending,
    Delayed,
}

impl MilestoneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MilestoneStatus::Completed => "Completed",
            MilestoneStatus::Pending => "Pending",
            MilestoneStatus::Delayed => "Delayed",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            MilestoneStatus::Completed => "Concluído",
            MilestoneStatus::Pending => "Pendente",
            MilestoneStatus::Delayed => "Atrasado",
        }
    }
}

impl std::fmt::Display for MilestoneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of journal entry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    #[default]
    General,
    Blocker,
    Progress,
}

impl UpdateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::General => "General",
            UpdateKind::Blocker => "Blocker",
            UpdateKind::Progress => "Progress",
        }
    }

    /// Portuguese display label
    pub fn label(&self) -> &'static str {
        match self {
            UpdateKind::General => "Geral",
            UpdateKind::Blocker => "Impedimento",
            UpdateKind::Progress => "Avanço",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "general" | "geral" => Some(UpdateKind::General),
            "blocker" | "impedimento" => Some(UpdateKind::Blocker),
            "progress" | "avanço" | "avanco" => Some(UpdateKind::Progress),
            _ => None,
        }
    }
}

impl std::fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where a journal entry came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    /// Derived from the imported source data
    #[default]
    Imported,
    /// Authored by the local user and persisted in the annotation repository
    User,
}

// ============================================================================
// Task
// ============================================================================

/// Atomic unit of work within a workflow
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub assignee: String,
    pub responsibility: Responsibility,
    pub start_date: Timestamp,
    pub due_date: Option<Timestamp>,
    /// Present if and only if `status` is `Completed`
    pub completed_date: Option<Timestamp>,
    pub status: TaskStatus,
    /// Free text; source of root-cause classification
    pub comment: String,
    pub critical: bool,
}

impl Task {
    pub fn new(id: impl Into<String>, name: impl Into<String>, start_date: Timestamp) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            assignee: String::new(),
            responsibility: Responsibility::Internal,
            start_date,
            due_date: None,
            completed_date: None,
            status: TaskStatus::OnTrack,
            comment: String::new(),
            critical: false,
        }
    }

    /// Set the status (builder pattern).
    ///
    /// Keeps the completion invariant: completing without an explicit date
    /// stamps the start date, any other status clears the completion date.
    pub fn status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        if status == TaskStatus::Completed {
            self.completed_date = self.completed_date.or(Some(self.start_date));
        } else {
            self.completed_date = None;
        }
        self
    }

    /// Mark as completed at the given instant
    pub fn completed_at(mut self, at: Timestamp) -> Self {
        self.status = TaskStatus::Completed;
        self.completed_date = Some(at);
        self
    }

    pub fn due(mut self, due: Timestamp) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.assignee = assignee.into();
        self
    }

    pub fn responsibility(mut self, responsibility: Responsibility) -> Self {
        self.responsibility = responsibility;
        self
    }

    pub fn comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = comment.into();
        self
    }

    pub fn critical(mut self) -> Self {
        self.critical = true;
        self
    }

    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Days since start, frozen at the completion instant
    pub fn age(&self, now: Timestamp) -> i64 {
        task_age(self, now)
    }

    pub fn root_cause(&self) -> RootCause {
        classify_root_cause(&self.comment)
    }
}

// ============================================================================
// Workflow
// ============================================================================

/// Phase-scoped bucket of tasks within an entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub phase: Phase,
    /// Derived by the metrics aggregator (0-100)
    pub progress: u8,
    pub tasks: Vec<Task>,
    /// Declared SLA in calendar days (not measured)
    pub lead_time_days: u32,
}

impl Workflow {
    pub fn new(id: impl Into<String>, phase: Phase, lead_time_days: u32) -> Self {
        Self {
            id: id.into(),
            phase,
            progress: 0,
            tasks: Vec::new(),
            lead_time_days,
        }
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.is_completed()).count()
    }

    pub fn delayed_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Delayed)
            .count()
    }

    /// `round(100 * completed / total)`, or 0 for a workflow without tasks
    pub fn computed_progress(&self) -> u8 {
        let total = self.tasks.len();
        if total == 0 {
            return 0;
        }
        let completed = self.completed_count();
        // Integer half-up rounding of 100 * completed / total
        ((200 * completed + total) / (2 * total)) as u8
    }
}

// ============================================================================
// Milestone
// ============================================================================

/// Checkpoint on an entity's value-delivery timeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub key: String,
    pub label: String,
    pub completed_date: Option<Timestamp>,
    pub deadline: Option<Timestamp>,
}

impl Milestone {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            completed_date: None,
            deadline: None,
        }
    }

    /// Derived status, recomputed on every call
    pub fn status(&self, now: Timestamp) -> MilestoneStatus {
        classify_milestone(self.completed_date, self.deadline, now)
    }
}

/// A canonical milestone: deadline is the entity start plus `offset_days`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MilestoneDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub offset_days: i64,
}

/// The four value-delivery milestones, in timeline order
pub const CANONICAL_MILESTONES: [MilestoneDefinition; 4] = [
    MilestoneDefinition { key: "kickoff", label: "Kick-off", offset_days: 5 },
    MilestoneDefinition { key: "documentation", label: "Documentação Recebida", offset_days: 20 },
    MilestoneDefinition { key: "contract", label: "Contrato Assinado", offset_days: 45 },
    MilestoneDefinition { key: "operation", label: "Início da Operação", offset_days: 60 },
];

// ============================================================================
// Update log
// ============================================================================

/// Journal entry attached to an entity
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UpdateEntry {
    pub id: String,
    pub timestamp: Timestamp,
    pub author: String,
    pub kind: UpdateKind,
    pub content: String,
    #[serde(default)]
    pub origin: EntryOrigin,
}

impl UpdateEntry {
    /// New entry authored by the local user, with a fresh identifier
    pub fn user(
        author: impl Into<String>,
        kind: UpdateKind,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            author: author.into(),
            kind,
            content: content.into(),
            origin: EntryOrigin::User,
        }
    }

    pub fn is_user_authored(&self) -> bool {
        self.origin == EntryOrigin::User
    }
}

/// Sort entries newest first; entries with equal timestamps keep their order
pub fn sort_newest_first(entries: &mut [UpdateEntry]) {
    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
}

// ============================================================================
// Entity
// ============================================================================

/// Registration and external-system metadata of an entity
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    /// CNPJ
    pub registration_number: Option<String>,
    pub erp_id: Option<String>,
    pub crm_id: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
}

/// One onboarding case for a legal entity (SPE)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    /// Join key; unique across a published collection
    pub process_id: ProcessId,
    pub name: String,
    pub group: String,
    pub start_date: Timestamp,
    /// Workflows in canonical phase order, at most one per phase
    pub workflows: Vec<Workflow>,
    /// Derived by the metrics aggregator
    pub overall_status: EntityStatus,
    pub tags: BTreeSet<String>,
    /// Newest first
    pub updates: Vec<UpdateEntry>,
    pub metadata: EntityMetadata,
    pub milestones: Vec<Milestone>,
    pub last_activity: Timestamp,
}

impl Entity {
    pub fn new(process_id: impl Into<String>, name: impl Into<String>, start_date: Timestamp) -> Self {
        let process_id = process_id.into();
        Self {
            id: format!("spe-{process_id}"),
            process_id,
            name: name.into(),
            group: String::new(),
            start_date,
            workflows: Vec::new(),
            overall_status: EntityStatus::OnTrack,
            tags: BTreeSet::new(),
            updates: Vec::new(),
            metadata: EntityMetadata::default(),
            milestones: Vec::new(),
            last_activity: start_date,
        }
    }

    /// Synthesized placeholder for task rows without a matching process row
    pub fn ghost(process_id: impl Into<String>, now: Timestamp) -> Self {
        let process_id = process_id.into();
        let mut entity = Self::new(
            process_id.clone(),
            format!("SPE não cadastrada ({process_id})"),
            now,
        );
        entity.group = GHOST_GROUP.to_string();
        entity.tags.insert(ORPHAN_TAG.to_string());
        entity.overall_status = EntityStatus::AtRisk;
        entity
    }

    pub fn is_ghost(&self) -> bool {
        self.tags.contains(ORPHAN_TAG)
    }

    pub fn workflow(&self, phase: Phase) -> Option<&Workflow> {
        self.workflows.iter().find(|w| w.phase == phase)
    }

    pub fn workflow_mut(&mut self, phase: Phase) -> Option<&mut Workflow> {
        self.workflows.iter_mut().find(|w| w.phase == phase)
    }

    /// All tasks across workflows, in workflow order
    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.workflows.iter().flat_map(|w| w.tasks.iter())
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks().find(|t| t.id == id)
    }

    pub fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.workflows
            .iter_mut()
            .flat_map(|w| w.tasks.iter_mut())
            .find(|t| t.id == id)
    }

    pub fn delayed_task_count(&self) -> usize {
        self.workflows.iter().map(Workflow::delayed_count).sum()
    }

    /// Mean workflow progress, 0 without workflows
    pub fn progress(&self) -> u8 {
        if self.workflows.is_empty() {
            return 0;
        }
        let total: usize = self.workflows.iter().map(|w| w.progress as usize).sum();
        let count = self.workflows.len();
        ((2 * total + count) / (2 * count)) as u8
    }

    /// First workflow that is not finished yet
    pub fn current_phase(&self) -> Option<Phase> {
        self.workflows
            .iter()
            .find(|w| w.progress < 100)
            .map(|w| w.phase)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// Output renderer for a published entity collection
pub trait Renderer {
    type Output;

    fn render(&self, entities: &[Entity], as_of: Timestamp) -> Result<Self::Output, RenderError>;
}

// ============================================================================
// Errors
// ============================================================================

/// Rendering error
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Format error: {0}")]
    Format(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),
}

// ============================================================================
// Tests
// ============================================================================
