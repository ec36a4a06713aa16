//! # speboard-engine
//!
//! Reconciliation and metrics for speboard.
//!
//! This crate provides:
//! - The three-pass reconciliation of process, track and task rows into an
//!   entity graph, with ghost entities for orphaned task rows (`reconcile`)
//! - The metrics aggregator deriving workflow progress and entity status
//!   (`metrics`)
//! - Pure entity transitions driven by change intents (`transitions`)
//! - The annotation repository contract and merge/extract logic (`annotations`)
//! - The published snapshot store (`store`)
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use speboard_core::table::{Cell, RawTable};
//! use speboard_core::EntityStatus;
//! use speboard_engine::{import_tables, EngineOptions};
//! use speboard_parser::RawTables;
//!
//! let tables = RawTables {
//!     processes: RawTable::new(["ID Processo", "SPE"])
//!         .row(vec![Cell::text("P1"), Cell::text("Solar Um")]),
//!     tracks: RawTable::new(["ID Processo", "Esteira"])
//!         .row(vec![Cell::text("P1"), Cell::text("Viabilidade")]),
//!     tasks: RawTable::new(["ID Processo", "Esteira", "Tarefa", "Status"])
//!         .row(vec![Cell::text("P1"), Cell::text("Viabilidade"), Cell::text("Estudo"), Cell::text("Concluído")])
//!         .row(vec![Cell::text("P1"), Cell::text("Viabilidade"), Cell::text("Parecer"), Cell::Empty]),
//! };
//!
//! let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
//! let imported = import_tables(&tables, &EngineOptions::default(), now).unwrap();
//! assert_eq!(imported.entities[0].workflows[0].progress, 50);
//! assert_eq!(imported.entities[0].overall_status, EntityStatus::OnTrack);
//! ```

pub mod annotations;
pub mod metrics;
pub mod reconcile;
pub mod store;
pub mod transitions;

use serde::{Deserialize, Serialize};
use speboard_core::Timestamp;
use speboard_parser::{normalize_tables, parse_sources, ParseError, RawTables, TabularSources};
use thiserror::Error;

pub use annotations::{
    extract_annotations, merge_annotations, AnnotationRepository, Annotations,
    InMemoryRepository, JsonFileRepository, RepositoryError, TaskOverride,
};
pub use metrics::{finalize_entity, overall_status};
pub use reconcile::{reconcile, ReconcileReport, Reconciled};
pub use store::{PortfolioStore, Snapshot};
pub use transitions::{apply_change, transition_task, EntityChange};

/// Import-time defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Lead time of a track row without a declared SLA
    pub default_track_sla_days: u32,
    /// Lead time of a workflow created ad hoc for a task row
    pub default_task_sla_days: u32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_track_sla_days: 15,
            default_task_sla_days: 10,
        }
    }
}

/// Import failure; the previously published snapshot stays active
#[derive(Debug, Error)]
pub enum ImportError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Could not load annotations: {0}")]
    Repository(#[from] RepositoryError),
}

/// Failure of the entity update path
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("No entity with process id '{0}'")]
    EntityNotFound(String),

    #[error("Entity '{process_id}' has no task '{task_id}'")]
    TaskNotFound { process_id: String, task_id: String },

    #[error("Entity '{process_id}' has no update '{update_id}'")]
    UpdateNotFound { process_id: String, update_id: String },

    #[error("Entity '{entity_id}' cannot move from process id '{from}' to '{to}'")]
    ProcessIdChanged {
        entity_id: String,
        from: String,
        to: String,
    },

    #[error("Could not persist annotations: {0}")]
    Repository(#[from] RepositoryError),
}

/// Normalize and reconcile three already-read tables
pub fn import_tables(
    tables: &RawTables,
    options: &EngineOptions,
    now: Timestamp,
) -> Result<Reconciled, ImportError> {
    let normalized = normalize_tables(tables, now)?;
    Ok(reconcile(&normalized, options, now))
}

/// Read, normalize and reconcile three spreadsheet byte sources
pub fn import_sources(
    sources: &TabularSources,
    options: &EngineOptions,
    now: Timestamp,
) -> Result<Reconciled, ImportError> {
    let normalized = parse_sources(sources, now)?;
    Ok(reconcile(&normalized, options, now))
}
