//! Portfolio read models
//!
//! This module answers the cockpit questions "how is the portfolio doing
//! right now?", "where does time go?" and "what is due next?". Everything
//! here is computed on demand from a finalized entity slice and an as-of
//! instant; nothing is cached on the entities.
//!
//! # Core Concepts
//!
//! - **PortfolioStatus**: aggregate counts across all entities
//! - **PhaseEfficiency**: task aging against declared lead times per phase
//! - **CalendarItem**: milestone and task-due events inside a window
//!
//! # Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use speboard_core::portfolio::PortfolioStatus;
//!
//! let as_of = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
//! let status = PortfolioStatus::from_entities(&[], as_of);
//! assert_eq!(status.total_entities, 0);
//! assert_eq!(status.average_progress, 0);
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::classify::RootCause;
use crate::{
    Entity, EntityStatus, MilestoneStatus, Phase, ProcessId, Responsibility, TaskStatus,
    Timestamp,
};

// ============================================================================
// Portfolio status
// ============================================================================

/// Entity count per overall status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub on_track: usize,
    pub at_risk: usize,
    pub delayed: usize,
    pub completed: usize,
}

impl StatusCounts {
    fn record(&mut self, status: EntityStatus) {
        match status {
            EntityStatus::OnTrack => self.on_track += 1,
            EntityStatus::AtRisk => self.at_risk += 1,
            EntityStatus::Delayed => self.delayed += 1,
            EntityStatus::Completed => self.completed += 1,
        }
    }
}

/// Milestone count per derived status
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MilestoneCounts {
    pub completed: usize,
    pub pending: usize,
    pub delayed: usize,
}

/// Aggregated portfolio metrics
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PortfolioStatus {
    /// As-of instant used for every time-dependent derivation
    pub as_of: Timestamp,

    pub total_entities: usize,

    /// Entities synthesized for orphaned task rows
    pub ghost_entities: usize,

    pub by_status: StatusCounts,

    /// Mean of per-entity progress (0-100)
    pub average_progress: u8,

    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub delayed_tasks: usize,
    pub blocked_tasks: usize,

    pub milestones: MilestoneCounts,

    /// Root cause of every blocked or delayed task
    pub root_causes: BTreeMap<RootCause, usize>,

    /// Responsible party of every open task
    pub open_by_responsibility: BTreeMap<Responsibility, usize>,
}

impl PortfolioStatus {
    pub fn from_entities(entities: &[Entity], as_of: Timestamp) -> Self {
        let mut by_status = StatusCounts::default();
        let mut milestones = MilestoneCounts::default();
        let mut root_causes = BTreeMap::new();
        let mut open_by_responsibility = BTreeMap::new();
        let mut total_tasks = 0usize;
        let mut completed_tasks = 0usize;
        let mut delayed_tasks = 0usize;
        let mut blocked_tasks = 0usize;
        let mut progress_sum = 0usize;

        for entity in entities {
            by_status.record(entity.overall_status);
            progress_sum += entity.progress() as usize;

            for milestone in &entity.milestones {
                match milestone.status(as_of) {
                    MilestoneStatus::Completed => milestones.completed += 1,
                    MilestoneStatus::Pending => milestones.pending += 1,
                    MilestoneStatus::Delayed => milestones.delayed += 1,
                }
            }

            for task in entity.tasks() {
                total_tasks += 1;
                match task.status {
                    TaskStatus::Completed => completed_tasks += 1,
                    TaskStatus::Delayed => delayed_tasks += 1,
                    TaskStatus::Blocked => blocked_tasks += 1,
                    TaskStatus::OnTrack | TaskStatus::AtRisk => {}
                }
                if matches!(task.status, TaskStatus::Delayed | TaskStatus::Blocked) {
                    *root_causes.entry(task.root_cause()).or_insert(0) += 1;
                }
                if !task.is_completed() {
                    *open_by_responsibility.entry(task.responsibility).or_insert(0) += 1;
                }
            }
        }

        let average_progress = if entities.is_empty() {
            0
        } else {
            ((2 * progress_sum + entities.len()) / (2 * entities.len())) as u8
        };

        Self {
            as_of,
            total_entities: entities.len(),
            ghost_entities: entities.iter().filter(|e| e.is_ghost()).count(),
            by_status,
            average_progress,
            total_tasks,
            completed_tasks,
            delayed_tasks,
            blocked_tasks,
            milestones,
            root_causes,
            open_by_responsibility,
        }
    }

    /// Share of tasks completed (0-100)
    pub fn task_completion_rate(&self) -> u8 {
        if self.total_tasks == 0 {
            return 0;
        }
        ((200 * self.completed_tasks + self.total_tasks) / (2 * self.total_tasks)) as u8
    }
}

// ============================================================================
// Efficiency
// ============================================================================

/// Task aging for one phase across the portfolio
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhaseEfficiency {
    pub phase: Phase,
    pub tasks: usize,
    pub open_tasks: usize,
    /// Mean task age in days (completed tasks frozen at completion)
    pub average_age_days: f64,
    /// Mean declared lead time of the workflows in this phase
    pub average_lead_time_days: f64,
    /// Tasks whose age exceeds their workflow's lead time
    pub over_lead_time: usize,
}

/// Per-phase efficiency, in canonical phase order; phases without workflows
/// are omitted
pub fn phase_efficiency(entities: &[Entity], as_of: Timestamp) -> Vec<PhaseEfficiency> {
    Phase::ALL
        .iter()
        .filter_map(|phase| {
            let workflows: Vec<_> = entities
                .iter()
                .filter_map(|e| e.workflow(*phase))
                .collect();
            if workflows.is_empty() {
                return None;
            }

            let mut tasks = 0usize;
            let mut open_tasks = 0usize;
            let mut age_sum = 0i64;
            let mut over_lead_time = 0usize;
            for workflow in &workflows {
                for task in &workflow.tasks {
                    let age = task.age(as_of);
                    tasks += 1;
                    age_sum += age;
                    if !task.is_completed() {
                        open_tasks += 1;
                    }
                    if age > i64::from(workflow.lead_time_days) {
                        over_lead_time += 1;
                    }
                }
            }

            let lead_sum: u64 = workflows.iter().map(|w| u64::from(w.lead_time_days)).sum();
            Some(PhaseEfficiency {
                phase: *phase,
                tasks,
                open_tasks,
                average_age_days: if tasks == 0 { 0.0 } else { age_sum as f64 / tasks as f64 },
                average_lead_time_days: lead_sum as f64 / workflows.len() as f64,
                over_lead_time,
            })
        })
        .collect()
}

// ============================================================================
// Calendar
// ============================================================================

/// What a calendar item refers to
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CalendarEvent {
    /// A milestone deadline, or its completion when completed
    Milestone { label: String, status: MilestoneStatus },
    /// An open task's due date
    TaskDue { task_id: String, name: String, status: TaskStatus },
}

/// A dated event on the portfolio calendar
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalendarItem {
    pub date: Timestamp,
    pub process_id: ProcessId,
    pub entity_name: String,
    pub event: CalendarEvent,
}

/// Calendar events dated within `[from, to]`, sorted by date
pub fn calendar(entities: &[Entity], from: Timestamp, to: Timestamp, as_of: Timestamp) -> Vec<CalendarItem> {
    let mut items = Vec::new();
    let in_window = |date: Timestamp| date >= from && date <= to;

    for entity in entities {
        for milestone in &entity.milestones {
            let Some(date) = milestone.completed_date.or(milestone.deadline) else {
                continue;
            };
            if in_window(date) {
                items.push(CalendarItem {
                    date,
                    process_id: entity.process_id.clone(),
                    entity_name: entity.name.clone(),
                    event: CalendarEvent::Milestone {
                        label: milestone.label.clone(),
                        status: milestone.status(as_of),
                    },
                });
            }
        }
        for task in entity.tasks().filter(|t| !t.is_completed()) {
            if let Some(due) = task.due_date.filter(|d| in_window(*d)) {
                items.push(CalendarItem {
                    date: due,
                    process_id: entity.process_id.clone(),
                    entity_name: entity.name.clone(),
                    event: CalendarEvent::TaskDue {
                        task_id: task.id.clone(),
                        name: task.name.clone(),
                        status: task.status,
                    },
                });
            }
        }
    }

    items.sort_by(|a, b| a.date.cmp(&b.date));
    items
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::add_days;
    use crate::{Milestone, Task, Workflow};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn at(year: i32, month: u32, day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn create_entity() -> Entity {
        let start = at(2025, 1, 1);
        let mut entity = Entity::new("P1", "Solar Um", start);

        let mut viability = Workflow::new("P1-viability", Phase::Viability, 10);
        viability.tasks.push(Task::new("P1-T001", "Estudo", start).completed_at(at(2025, 1, 5)));
        viability.tasks.push(
            Task::new("P1-T002", "Parecer", start)
                .status(TaskStatus::Blocked)
                .comment("Aguardando assinatura do cliente")
                .responsibility(Responsibility::Client)
                .due(at(2025, 1, 20)),
        );
        viability.progress = 50;

        let mut juridical = Workflow::new("P1-juridical", Phase::Juridical, 20);
        juridical.tasks.push(
            Task::new("P1-T003", "Contrato", start)
                .status(TaskStatus::Delayed)
                .comment("erro no sistema"),
        );
        juridical.progress = 0;

        entity.workflows = vec![viability, juridical];
        entity.overall_status = EntityStatus::AtRisk;

        let mut kickoff = Milestone::new("kickoff", "Kick-off");
        kickoff.deadline = Some(add_days(start, 5));
        kickoff.completed_date = Some(at(2025, 1, 4));
        let mut contract = Milestone::new("contract", "Contrato Assinado");
        contract.deadline = Some(add_days(start, 45));
        entity.milestones = vec![kickoff, contract];
        entity
    }

    #[test]
    fn portfolio_counts() {
        let entities = vec![create_entity(), Entity::ghost("X", at(2025, 1, 1))];
        let status = PortfolioStatus::from_entities(&entities, at(2025, 3, 1));

        assert_eq!(status.total_entities, 2);
        assert_eq!(status.ghost_entities, 1);
        assert_eq!(status.by_status.at_risk, 2);
        assert_eq!(status.total_tasks, 3);
        assert_eq!(status.completed_tasks, 1);
        assert_eq!(status.blocked_tasks, 1);
        assert_eq!(status.delayed_tasks, 1);
        assert_eq!(status.milestones.completed, 1);
        assert_eq!(status.milestones.delayed, 1);
        assert_eq!(status.root_causes.get(&RootCause::Documentation), Some(&1));
        assert_eq!(status.root_causes.get(&RootCause::AccessSystem), Some(&1));
        assert_eq!(status.open_by_responsibility.get(&Responsibility::Client), Some(&1));
        assert_eq!(status.open_by_responsibility.get(&Responsibility::Internal), Some(&1));
        // (25 + 0) / 2 rounds up
        assert_eq!(status.average_progress, 13);
        assert_eq!(status.task_completion_rate(), 33);
    }

    #[test]
    fn efficiency_freezes_completed_ages() {
        let entities = vec![create_entity()];
        let rows = phase_efficiency(&entities, at(2025, 1, 31));

        assert_eq!(rows.len(), 2);
        let viability = &rows[0];
        assert_eq!(viability.phase, Phase::Viability);
        assert_eq!(viability.tasks, 2);
        assert_eq!(viability.open_tasks, 1);
        // 4 days (frozen) and 30 days (open)
        assert_eq!(viability.average_age_days, 17.0);
        assert_eq!(viability.over_lead_time, 1);
        assert_eq!(viability.average_lead_time_days, 10.0);
    }

    #[test]
    fn calendar_window_and_order() {
        let entities = vec![create_entity()];
        let items = calendar(&entities, at(2025, 1, 1), at(2025, 2, 28), at(2025, 1, 10));

        let dates: Vec<_> = items.iter().map(|i| i.date).collect();
        assert_eq!(dates, vec![at(2025, 1, 4), at(2025, 1, 20), at(2025, 2, 15)]);
        assert!(matches!(
            items[1].event,
            CalendarEvent::TaskDue { status: TaskStatus::Blocked, .. }
        ));
        assert!(matches!(
            items[2].event,
            CalendarEvent::Milestone { status: MilestoneStatus::Pending, .. }
        ));
    }
}
