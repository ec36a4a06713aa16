//! User annotations and their repository
//!
//! Annotations are keyed by process identifier and hold what the local user
//! authored on top of the imported data: journal entries and task overrides
//! (status, completion date, comment). Every save replaces the annotations
//! of one process.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use speboard_core::{sort_newest_first, Entity, Phase, Task, TaskStatus, Timestamp, UpdateEntry};
use thiserror::Error;

use crate::metrics::finalize_entity;

/// Repository failure
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Annotation store IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Annotation store is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// User state of one task relative to the imported baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOverride {
    pub task_id: String,
    /// Task name and phase at save time; task ids follow row order, so these
    /// confirm the id still points at the same task after a re-import
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub phase: Option<Phase>,
    pub status: TaskStatus,
    pub completed_date: Option<Timestamp>,
    pub comment: String,
}

/// Everything the local user authored for one process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
    #[serde(default)]
    pub entries: Vec<UpdateEntry>,
    #[serde(default)]
    pub task_overrides: Vec<TaskOverride>,
}

impl Annotations {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.task_overrides.is_empty()
    }
}

/// Storage contract for annotations, keyed by process identifier
pub trait AnnotationRepository {
    /// Annotations of one process; empty when nothing was saved
    fn load(&self, process_id: &str) -> Result<Annotations, RepositoryError>;

    /// Replace the annotations of one process
    fn save(&mut self, process_id: &str, annotations: &Annotations) -> Result<(), RepositoryError>;

    /// The whole mapping
    fn load_all(&self) -> Result<BTreeMap<String, Annotations>, RepositoryError>;
}

// ============================================================================
// In-memory backend
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    store: BTreeMap<String, Annotations>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, process_id: impl Into<String>, annotations: Annotations) -> Self {
        self.store.insert(process_id.into(), annotations);
        self
    }
}

impl AnnotationRepository for InMemoryRepository {
    fn load(&self, process_id: &str) -> Result<Annotations, RepositoryError> {
        Ok(self.store.get(process_id).cloned().unwrap_or_default())
    }

    fn save(&mut self, process_id: &str, annotations: &Annotations) -> Result<(), RepositoryError> {
        if annotations.is_empty() {
            self.store.remove(process_id);
        } else {
            self.store.insert(process_id.to_string(), annotations.clone());
        }
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, Annotations>, RepositoryError> {
        Ok(self.store.clone())
    }
}

// ============================================================================
// JSON file backend
// ============================================================================

/// One JSON document holding the whole mapping, rewritten on every save
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AnnotationRepository for JsonFileRepository {
    fn load(&self, process_id: &str) -> Result<Annotations, RepositoryError> {
        Ok(self.load_all()?.remove(process_id).unwrap_or_default())
    }

    fn save(&mut self, process_id: &str, annotations: &Annotations) -> Result<(), RepositoryError> {
        let mut all = self.load_all()?;
        if annotations.is_empty() {
            all.remove(process_id);
        } else {
            all.insert(process_id.to_string(), annotations.clone());
        }
        let json = serde_json::to_string_pretty(&all)?;
        fs::write(&self.path, json)?;
        tracing::debug!(path = %self.path.display(), process_id, "saved annotations");
        Ok(())
    }

    fn load_all(&self) -> Result<BTreeMap<String, Annotations>, RepositoryError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }
}

// ============================================================================
// Merge and extract
// ============================================================================

/// Merge persisted annotations into a freshly imported entity.
///
/// User entries are concatenated with the imported ones (an entry already
/// present by id is not duplicated) and the log is re-sorted newest first.
/// An override applies to the task with its id when the names agree,
/// otherwise to the only task of the same phase carrying its name. Overrides
/// for tasks that no longer exist are ignored.
pub fn merge_annotations(entity: &mut Entity, annotations: &Annotations) {
    for entry in &annotations.entries {
        if !entity.updates.iter().any(|e| e.id == entry.id) {
            entity.updates.push(entry.clone());
        }
    }
    sort_newest_first(&mut entity.updates);

    for task_override in &annotations.task_overrides {
        let Some(task) = overridden_task(entity, task_override) else {
            tracing::debug!(
                process_id = %entity.process_id,
                task_id = %task_override.task_id,
                "annotation refers to a task that is no longer imported"
            );
            continue;
        };
        task.status = task_override.status;
        task.completed_date = (task_override.status == TaskStatus::Completed)
            .then(|| task_override.completed_date.unwrap_or(task.start_date));
        task.comment = task_override.comment.clone();
    }
    finalize_entity(entity);
}

fn overridden_task<'a>(entity: &'a mut Entity, task_override: &TaskOverride) -> Option<&'a mut Task> {
    let same_name = |task: &Task| task_override.task_name.is_empty() || task.name == task_override.task_name;
    let mut by_id = None;
    let mut by_name = Vec::new();
    for (w, workflow) in entity.workflows.iter().enumerate() {
        for (t, task) in workflow.tasks.iter().enumerate() {
            if task.id == task_override.task_id && same_name(task) {
                by_id = Some((w, t));
            }
            if !task_override.task_name.is_empty()
                && task.name == task_override.task_name
                && task_override.phase.map_or(true, |phase| phase == workflow.phase)
            {
                by_name.push((w, t));
            }
        }
    }
    let (w, t) = match (by_id, by_name.as_slice()) {
        (Some(found), _) => found,
        (None, [only]) => *only,
        _ => return None,
    };
    entity.workflows.get_mut(w)?.tasks.get_mut(t)
}

/// The annotations attributable to the local user.
///
/// Overrides are recorded for every task whose status, completion date or
/// comment differs from `baseline` (the imported entity); without a baseline
/// every task is recorded.
pub fn extract_annotations(entity: &Entity, baseline: Option<&Entity>) -> Annotations {
    let entries = entity
        .updates
        .iter()
        .filter(|e| e.is_user_authored())
        .cloned()
        .collect();

    let task_overrides = entity
        .workflows
        .iter()
        .flat_map(|workflow| workflow.tasks.iter().map(move |task| (workflow.phase, task)))
        .filter(|(_, task)| {
            baseline.and_then(|b| b.task(&task.id)).map_or(true, |original| {
                original.status != task.status
                    || original.completed_date != task.completed_date
                    || original.comment != task.comment
            })
        })
        .map(|(phase, task)| TaskOverride {
            task_id: task.id.clone(),
            task_name: task.name.clone(),
            phase: Some(phase),
            status: task.status,
            completed_date: task.completed_date,
            comment: task.comment.clone(),
        })
        .collect();

    Annotations {
        entries,
        task_overrides,
    }
}
