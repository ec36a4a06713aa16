//! Pure entity transitions
//!
//! A change intent applied to an entity snapshot yields a new entity; the
//! input is never mutated. Every transition re-runs the metrics aggregator.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use speboard_core::{sort_newest_first, Entity, Task, TaskStatus, Timestamp, UpdateEntry, ORPHAN_TAG};

use crate::metrics::finalize_entity;
use crate::UpdateError;

/// A user intent against one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum EntityChange {
    SetTaskStatus { task_id: String, status: TaskStatus },
    SetTaskComment { task_id: String, comment: String },
    AddUpdate { entry: UpdateEntry },
    RemoveUpdate { update_id: String },
    SetTags { tags: BTreeSet<String> },
}

/// Move a task to `status`, keeping the completion invariant.
///
/// Entering `Completed` stamps `now`; a task already completed keeps its
/// original date. Leaving `Completed` clears the date.
pub fn transition_task(task: &mut Task, status: TaskStatus, now: Timestamp) {
    if status == TaskStatus::Completed {
        if !task.is_completed() || task.completed_date.is_none() {
            task.completed_date = Some(now);
        }
    } else {
        task.completed_date = None;
    }
    task.status = status;
}

/// Apply a change intent, returning the updated entity
pub fn apply_change(entity: &Entity, change: EntityChange, now: Timestamp) -> Result<Entity, UpdateError> {
    let mut next = entity.clone();
    let task_missing = |task_id: &str| UpdateError::TaskNotFound {
        process_id: entity.process_id.clone(),
        task_id: task_id.to_string(),
    };

    match change {
        EntityChange::SetTaskStatus { task_id, status } => {
            let task = next.task_mut(&task_id).ok_or_else(|| task_missing(&task_id))?;
            transition_task(task, status, now);
        }
        EntityChange::SetTaskComment { task_id, comment } => {
            let task = next.task_mut(&task_id).ok_or_else(|| task_missing(&task_id))?;
            task.comment = comment;
        }
        EntityChange::AddUpdate { entry } => {
            next.updates.push(entry);
            sort_newest_first(&mut next.updates);
        }
        EntityChange::RemoveUpdate { update_id } => {
            let before = next.updates.len();
            next.updates.retain(|u| u.id != update_id);
            if next.updates.len() == before {
                return Err(UpdateError::UpdateNotFound {
                    process_id: entity.process_id.clone(),
                    update_id,
                });
            }
        }
        EntityChange::SetTags { tags } => {
            // Orphan tag marks a synthesized entity and is not user editable
            let ghost = next.is_ghost();
            next.tags = tags;
            next.tags.remove(ORPHAN_TAG);
            if ghost {
                next.tags.insert(ORPHAN_TAG.to_string());
            }
        }
    }

    next.last_activity = next.last_activity.max(now);
    finalize_entity(&mut next);
    Ok(next)
}
