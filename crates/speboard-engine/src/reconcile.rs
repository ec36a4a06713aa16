//! Three-pass reconciliation
//!
//! Joins the normalized process, track and task rows by process identifier:
//!
//! 1. Head pass: one entity per distinct process row, with its milestone scaffold
//! 2. Track pass: one workflow per (entity, phase); rows for unknown processes
//!    are dropped
//! 3. Task pass: every task row is attached to its entity and phase workflow,
//!    synthesizing a ghost entity or an ad-hoc workflow when missing
//! 4. Finalization: canonical phase order, then the metrics aggregator
//!
//! Each pass runs to completion before the next begins, and the graph is
//! owned by the call until it returns.

use std::collections::HashMap;

use serde::Serialize;
use speboard_core::dates::add_days;
use speboard_core::{
    Entity, EntryOrigin, Milestone, Phase, Task, Timestamp, UpdateEntry, UpdateKind,
    Workflow, CANONICAL_MILESTONES,
};
use speboard_parser::{NormalizedSources, ProcessRow, TaskRow, TrackRow};

use crate::metrics::finalize_entity;
use crate::EngineOptions;

/// Author recorded on journal entries derived from source data
pub const IMPORT_AUTHOR: &str = "Importação";

/// Counters describing one reconciliation run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub entities: usize,
    pub workflows: usize,
    pub tasks: usize,
    pub ghost_entities: usize,
    /// Normalizer rows without a process identifier, all three sources
    pub skipped_rows: usize,
    /// Process rows repeating an already seen identifier
    pub duplicate_processes: usize,
    /// Track rows whose process has no head row
    pub dropped_tracks: usize,
    /// Track rows folded into an existing workflow of the same phase
    pub merged_tracks: usize,
}

/// Finalized entities in head-table order, ghosts last
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub entities: Vec<Entity>,
    pub report: ReconcileReport,
}

/// Entity graph under construction, indexed by process identifier
struct Graph {
    entities: Vec<Entity>,
    index: HashMap<String, usize>,
}

impl Graph {
    fn new() -> Self {
        Self {
            entities: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn get_mut(&mut self, process_id: &str) -> Option<&mut Entity> {
        self.index
            .get(process_id)
            .copied()
            .and_then(|i| self.entities.get_mut(i))
    }

    fn insert(&mut self, entity: Entity) -> usize {
        let position = self.entities.len();
        self.index.insert(entity.process_id.clone(), position);
        self.entities.push(entity);
        position
    }
}

/// Reconcile normalized rows into a finalized entity collection
pub fn reconcile(sources: &NormalizedSources, options: &EngineOptions, now: Timestamp) -> Reconciled {
    let mut graph = Graph::new();
    let mut report = ReconcileReport {
        skipped_rows: sources.processes.skipped + sources.tracks.skipped + sources.tasks.skipped,
        ..ReconcileReport::default()
    };

    head_pass(&mut graph, &sources.processes.rows, now, &mut report);
    track_pass(&mut graph, &sources.tracks.rows, options, &mut report);
    task_pass(&mut graph, &sources.tasks.rows, options, now, &mut report);

    let mut entities = graph.entities;
    for entity in &mut entities {
        entity.workflows.sort_by_key(|w| w.phase.order());
        finalize_entity(entity);
    }

    report.entities = entities.len();
    report.workflows = entities.iter().map(|e| e.workflows.len()).sum();
    report.tasks = entities.iter().map(|e| e.tasks().count()).sum();

    tracing::info!(
        entities = report.entities,
        workflows = report.workflows,
        tasks = report.tasks,
        ghosts = report.ghost_entities,
        "reconciled portfolio"
    );
    Reconciled { entities, report }
}

// ============================================================================
// Passes
// ============================================================================

fn head_pass(graph: &mut Graph, rows: &[ProcessRow], now: Timestamp, report: &mut ReconcileReport) {
    for row in rows {
        if graph.index.contains_key(&row.process_id) {
            report.duplicate_processes += 1;
            continue;
        }
        graph.insert(entity_from_row(row, now));
    }
    if report.duplicate_processes > 0 {
        tracing::warn!(
            duplicates = report.duplicate_processes,
            "repeated process identifiers kept their first row"
        );
    }
    tracing::debug!(entities = graph.entities.len(), "head pass complete");
}

fn entity_from_row(row: &ProcessRow, now: Timestamp) -> Entity {
    let start = row.start_date.unwrap_or(now);
    let mut entity = Entity::new(row.process_id.clone(), row.name.clone(), start);
    entity.group = row.group.clone();
    entity.metadata = row.metadata.clone();
    entity.tags.extend(row.tags.iter().cloned());
    entity.milestones = CANONICAL_MILESTONES
        .iter()
        .zip(row.milestone_dates)
        .map(|(definition, completed_date)| Milestone {
            completed_date,
            deadline: Some(add_days(start, definition.offset_days)),
            ..Milestone::new(definition.key, definition.label)
        })
        .collect();

    if let Some(notes) = &row.notes {
        entity.updates.push(UpdateEntry {
            id: format!("{}-notes", row.process_id),
            timestamp: row.updated_at.unwrap_or(start),
            author: IMPORT_AUTHOR.to_string(),
            kind: UpdateKind::General,
            content: notes.clone(),
            origin: EntryOrigin::Imported,
        });
    }
    entity
}

fn track_pass(graph: &mut Graph, rows: &[TrackRow], options: &EngineOptions, report: &mut ReconcileReport) {
    for row in rows {
        let Some(entity) = graph.get_mut(&row.process_id) else {
            report.dropped_tracks += 1;
            continue;
        };
        if entity.workflow(row.phase).is_some() {
            report.merged_tracks += 1;
            continue;
        }
        let id = workflow_id(&entity.process_id, row.phase);
        entity.workflows.push(Workflow::new(
            id,
            row.phase,
            row.sla_days.unwrap_or(options.default_track_sla_days),
        ));
    }
    if report.dropped_tracks > 0 {
        tracing::warn!(
            dropped = report.dropped_tracks,
            "track rows reference processes without a head row"
        );
    }
    tracing::debug!(merged = report.merged_tracks, "track pass complete");
}

fn workflow_id(process_id: &str, phase: Phase) -> String {
    format!("{process_id}-{}", phase.key())
}

fn task_pass(
    graph: &mut Graph,
    rows: &[TaskRow],
    options: &EngineOptions,
    now: Timestamp,
    report: &mut ReconcileReport,
) {
    let mut sequence: HashMap<&str, usize> = HashMap::new();

    for row in rows {
        let existing = graph.index.get(&row.process_id).copied();
        let position = match existing {
            Some(position) => position,
            None => {
                tracing::warn!(
                    process_id = %row.process_id,
                    "task row references an unknown process, synthesizing entity"
                );
                report.ghost_entities += 1;
                graph.insert(Entity::ghost(row.process_id.clone(), now))
            }
        };
        let Some(entity) = graph.entities.get_mut(position) else {
            continue;
        };

        let number = sequence.entry(row.process_id.as_str()).or_insert(0);
        *number += 1;
        let task = task_from_row(row, *number, now);

        if entity.workflow(row.phase).is_none() {
            entity.workflows.push(Workflow::new(
                workflow_id(&row.process_id, row.phase),
                row.phase,
                row.sla_days.unwrap_or(options.default_task_sla_days),
            ));
        }
        if let Some(workflow) = entity.workflow_mut(row.phase) {
            workflow.tasks.push(task);
        }
    }
    tracing::debug!(tasks = rows.len(), ghosts = report.ghost_entities, "task pass complete");
}

fn task_from_row(row: &TaskRow, number: usize, now: Timestamp) -> Task {
    Task {
        id: format!("{}-T{number:03}", row.process_id),
        name: row.name.clone(),
        assignee: row.assignee.clone(),
        responsibility: row.responsibility,
        start_date: row.start_date.unwrap_or(now),
        due_date: row.due_date,
        completed_date: row.completed_date,
        status: row.status,
        comment: row.comment.clone(),
        critical: row.critical,
    }
}
