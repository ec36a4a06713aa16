//! Metrics aggregator
//!
//! Writes the derived scalar fields of an entity (workflow progress, overall
//! status, last activity) and never changes the shape of the graph.

use speboard_core::{Entity, EntityStatus, Timestamp};

/// Overall entity status; the first matching branch wins:
///
/// 1. more than 2 delayed tasks: `Delayed`
/// 2. 1 or 2 delayed tasks: `AtRisk`
/// 3. at least one workflow and all at 100%: `Completed`
/// 4. otherwise `OnTrack`
///
/// The delayed branches run before the completion check, so a set of fully
/// progressed workflows that still holds delayed tasks never reports
/// `Completed`. Workflow progress must be current when this is called.
pub fn overall_status(entity: &Entity) -> EntityStatus {
    let delayed = entity.delayed_task_count();
    if delayed > 2 {
        EntityStatus::Delayed
    } else if delayed > 0 {
        EntityStatus::AtRisk
    } else if !entity.workflows.is_empty() && entity.workflows.iter().all(|w| w.progress == 100) {
        EntityStatus::Completed
    } else {
        EntityStatus::OnTrack
    }
}

/// Most recent dated event of an entity
pub fn last_activity(entity: &Entity) -> Timestamp {
    let task_dates = entity
        .tasks()
        .flat_map(|t| std::iter::once(t.start_date).chain(t.completed_date));
    let update_dates = entity.updates.iter().map(|u| u.timestamp);

    task_dates
        .chain(update_dates)
        .fold(entity.start_date.max(entity.last_activity), Timestamp::max)
}

/// Recompute every derived field of an entity
pub fn finalize_entity(entity: &mut Entity) {
    for workflow in &mut entity.workflows {
        workflow.progress = workflow.computed_progress();
    }
    entity.overall_status = overall_status(entity);
    entity.last_activity = last_activity(entity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use speboard_core::{Phase, Task, TaskStatus, UpdateEntry, UpdateKind, Workflow};

    fn at(year: i32, month: u32, day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn entity_with(phases: &[(Phase, &[TaskStatus])]) -> Entity {
        let mut entity = Entity::new("P1", "Solar Um", at(2025, 1, 1));
        for (phase, statuses) in phases {
            let mut workflow = Workflow::new(format!("P1-{}", phase.key()), *phase, 15);
            for (i, status) in statuses.iter().enumerate() {
                workflow
                    .tasks
                    .push(Task::new(format!("{}-{i}", phase.key()), "t", at(2025, 1, 2)).status(*status));
            }
            entity.workflows.push(workflow);
        }
        finalize_entity(&mut entity);
        entity
    }

    #[test]
    fn more_than_two_delayed_is_delayed() {
        let entity = entity_with(&[
            (Phase::Viability, &[TaskStatus::Delayed, TaskStatus::Delayed]),
            (Phase::Juridical, &[TaskStatus::Delayed]),
        ]);
        assert_eq!(entity.overall_status, EntityStatus::Delayed);
    }

    #[test]
    fn one_or_two_delayed_is_at_risk() {
        let one = entity_with(&[(Phase::Viability, &[TaskStatus::Delayed, TaskStatus::OnTrack])]);
        assert_eq!(one.overall_status, EntityStatus::AtRisk);
        let two = entity_with(&[
            (Phase::Viability, &[TaskStatus::Delayed]),
            (Phase::Financial, &[TaskStatus::Delayed]),
        ]);
        assert_eq!(two.overall_status, EntityStatus::AtRisk);
    }

    #[test]
    fn blocked_tasks_do_not_count_as_delayed() {
        let entity = entity_with(&[(
            Phase::Viability,
            &[TaskStatus::Blocked, TaskStatus::Blocked, TaskStatus::Blocked],
        )]);
        assert_eq!(entity.overall_status, EntityStatus::OnTrack);
    }

    #[test]
    fn completed_requires_every_workflow_at_100() {
        let done = entity_with(&[
            (Phase::Viability, &[TaskStatus::Completed]),
            (Phase::Juridical, &[TaskStatus::Completed, TaskStatus::Completed]),
        ]);
        assert_eq!(done.overall_status, EntityStatus::Completed);

        // An empty workflow sits at 0 and holds completion back
        let partial = entity_with(&[(Phase::Viability, &[TaskStatus::Completed]), (Phase::Juridical, &[])]);
        assert_eq!(partial.overall_status, EntityStatus::OnTrack);

        let bare = entity_with(&[]);
        assert_eq!(bare.overall_status, EntityStatus::OnTrack);
    }

    #[test]
    fn delayed_branches_win_over_full_progress() {
        // Progress is forced to 100 while a delayed task remains; the
        // delayed-count branches are evaluated first.
        let mut entity = entity_with(&[(Phase::Viability, &[TaskStatus::Delayed])]);
        entity.workflows[0].progress = 100;
        assert_eq!(overall_status(&entity), EntityStatus::AtRisk);
    }

    #[test]
    fn last_activity_tracks_the_newest_event() {
        let mut entity = entity_with(&[(Phase::Viability, &[TaskStatus::OnTrack])]);
        assert_eq!(entity.last_activity, at(2025, 1, 2));

        entity.workflows[0].tasks[0] = entity.workflows[0].tasks[0].clone().completed_at(at(2025, 3, 1));
        entity
            .updates
            .push(UpdateEntry::user("ana", UpdateKind::Progress, "ok", at(2025, 2, 1)));
        finalize_entity(&mut entity);
        assert_eq!(entity.last_activity, at(2025, 3, 1));
    }
}
