//! Published snapshot store
//!
//! Readers hold an `Arc<Snapshot>` that never changes under them. Imports and
//! entity updates build a new snapshot and swap the reference; a failed
//! import or a failed write-back leaves the current snapshot in place.

use std::collections::HashMap;
use std::sync::Arc;

use speboard_core::{Entity, Timestamp};
use speboard_parser::{RawTables, TabularSources};

use crate::annotations::{extract_annotations, merge_annotations, AnnotationRepository};
use crate::metrics::finalize_entity;
use crate::reconcile::{ReconcileReport, Reconciled};
use crate::transitions::{apply_change, EntityChange};
use crate::{import_sources, import_tables, EngineOptions, ImportError, UpdateError};

/// An immutable view of the finalized portfolio
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub entities: Vec<Entity>,
    pub report: ReconcileReport,
    /// Instant the data was imported or last updated
    pub as_of: Timestamp,
}

impl Snapshot {
    pub fn empty(as_of: Timestamp) -> Self {
        Self {
            entities: Vec::new(),
            report: ReconcileReport::default(),
            as_of,
        }
    }

    pub fn entity(&self, process_id: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.process_id == process_id)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Owner of the published snapshot and the annotation repository
pub struct PortfolioStore<R: AnnotationRepository> {
    repository: R,
    options: EngineOptions,
    /// Imported entities before annotations, keyed by process identifier
    baseline: HashMap<String, Entity>,
    snapshot: Arc<Snapshot>,
}

impl<R: AnnotationRepository> PortfolioStore<R> {
    pub fn new(repository: R, options: EngineOptions, now: Timestamp) -> Self {
        Self {
            repository,
            options,
            baseline: HashMap::new(),
            snapshot: Arc::new(Snapshot::empty(now)),
        }
    }

    /// Import three spreadsheet byte sources and publish the result
    pub fn import(&mut self, sources: &TabularSources, now: Timestamp) -> Result<Arc<Snapshot>, ImportError> {
        let reconciled = import_sources(sources, &self.options, now)?;
        self.publish_import(reconciled, now)
    }

    /// Import three already-read tables and publish the result
    pub fn import_tables(&mut self, tables: &RawTables, now: Timestamp) -> Result<Arc<Snapshot>, ImportError> {
        let reconciled = import_tables(tables, &self.options, now)?;
        self.publish_import(reconciled, now)
    }

    fn publish_import(&mut self, reconciled: Reconciled, now: Timestamp) -> Result<Arc<Snapshot>, ImportError> {
        let mut annotations = self.repository.load_all()?;
        let baseline: HashMap<String, Entity> = reconciled
            .entities
            .iter()
            .map(|e| (e.process_id.clone(), e.clone()))
            .collect();

        let mut entities = reconciled.entities;
        let mut merged = 0usize;
        for entity in &mut entities {
            if let Some(notes) = annotations.remove(&entity.process_id) {
                merge_annotations(entity, &notes);
                merged += 1;
            }
        }
        if !annotations.is_empty() {
            tracing::debug!(
                unmatched = annotations.len(),
                "annotations kept for processes absent from this import"
            );
        }
        tracing::info!(entities = entities.len(), merged, "published imported snapshot");

        self.baseline = baseline;
        self.snapshot = Arc::new(Snapshot {
            entities,
            report: reconciled.report,
            as_of: now,
        });
        Ok(self.snapshot())
    }

    /// The current published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.snapshot)
    }

    /// Entity for drill-down
    pub fn select(&self, process_id: &str) -> Option<&Entity> {
        self.snapshot.entity(process_id)
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Republish a fully formed modified entity.
    ///
    /// Derived fields are recomputed, the user's annotations for the process
    /// are re-persisted (full replace), and only then is the new snapshot
    /// published.
    pub fn submit_update(&mut self, mut entity: Entity, now: Timestamp) -> Result<Arc<Snapshot>, UpdateError> {
        let position = self.position_of(&entity)?;
        finalize_entity(&mut entity);

        let annotations = extract_annotations(&entity, self.baseline.get(&entity.process_id));
        self.repository.save(&entity.process_id, &annotations)?;

        let mut entities = self.snapshot.entities.clone();
        entities[position] = entity;
        self.snapshot = Arc::new(Snapshot {
            entities,
            report: self.snapshot.report.clone(),
            as_of: now,
        });
        Ok(self.snapshot())
    }

    /// Apply a change intent to one entity and submit the result
    pub fn apply_change(
        &mut self,
        process_id: &str,
        change: EntityChange,
        now: Timestamp,
    ) -> Result<Arc<Snapshot>, UpdateError> {
        let current = self
            .select(process_id)
            .ok_or_else(|| UpdateError::EntityNotFound(process_id.to_string()))?;
        let next = apply_change(current, change, now)?;
        self.submit_update(next, now)
    }

    /// Slot of the entity, found by its stable id; the process id at that
    /// slot must not change
    fn position_of(&self, entity: &Entity) -> Result<usize, UpdateError> {
        let entities = &self.snapshot.entities;
        let Some(position) = entities.iter().position(|e| e.id == entity.id) else {
            return Err(UpdateError::EntityNotFound(entity.process_id.clone()));
        };
        let existing = &entities[position];
        if existing.process_id != entity.process_id {
            return Err(UpdateError::ProcessIdChanged {
                entity_id: entity.id.clone(),
                from: existing.process_id.clone(),
                to: entity.process_id.clone(),
            });
        }
        Ok(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotations::{Annotations, InMemoryRepository, RepositoryError};
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use speboard_core::table::{Cell, RawTable};
    use speboard_core::{TaskStatus, UpdateEntry, UpdateKind};
    use std::collections::BTreeMap;

    fn at(year: i32, month: u32, day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn tables() -> RawTables {
        RawTables {
            processes: RawTable::new(["ID Processo", "SPE"]).row(vec![Cell::text("P1"), Cell::text("Solar Um")]),
            tracks: RawTable::new(["ID Processo", "Esteira"]).row(vec![Cell::text("P1"), Cell::text("Jurídico")]),
            tasks: RawTable::new(["ID Processo", "Esteira", "Tarefa"])
                .row(vec![Cell::text("P1"), Cell::text("Jurídico"), Cell::text("Minuta")])
                .row(vec![Cell::text("P1"), Cell::text("Jurídico"), Cell::text("Registro")]),
        }
    }

    /// Repository whose writes always fail
    struct ReadOnly;

    impl AnnotationRepository for ReadOnly {
        fn load(&self, _: &str) -> Result<Annotations, RepositoryError> {
            Ok(Annotations::default())
        }

        fn save(&mut self, _: &str, _: &Annotations) -> Result<(), RepositoryError> {
            Err(RepositoryError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "read-only",
            )))
        }

        fn load_all(&self) -> Result<BTreeMap<String, Annotations>, RepositoryError> {
            Ok(BTreeMap::new())
        }
    }

    #[test]
    fn failed_import_keeps_the_published_snapshot() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        let before = store.import_tables(&tables(), now).unwrap();

        let mut broken = tables();
        broken.tasks = RawTable::new(["Tarefa"]).row(vec![Cell::text("x")]);
        assert!(store.import_tables(&broken, now).is_err());
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn snapshots_held_by_readers_do_not_change() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        let reader = store.import_tables(&tables(), now).unwrap();

        store
            .apply_change(
                "P1",
                EntityChange::SetTaskStatus {
                    task_id: "P1-T001".into(),
                    status: TaskStatus::Completed,
                },
                at(2025, 6, 2),
            )
            .unwrap();

        assert_eq!(reader.entities[0].workflows[0].progress, 0);
        assert_eq!(store.select("P1").unwrap().workflows[0].progress, 50);
    }

    #[test]
    fn updates_persist_and_survive_reimport() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        store.import_tables(&tables(), now).unwrap();

        let later = at(2025, 6, 3);
        store
            .apply_change(
                "P1",
                EntityChange::SetTaskStatus {
                    task_id: "P1-T002".into(),
                    status: TaskStatus::Completed,
                },
                later,
            )
            .unwrap();
        let entry = UpdateEntry::user("ana", UpdateKind::Progress, "Registro feito", later);
        store
            .apply_change("P1", EntityChange::AddUpdate { entry: entry.clone() }, later)
            .unwrap();

        let saved = store.repository().load("P1").unwrap();
        assert_eq!(saved.entries, vec![entry.clone()]);
        assert_eq!(saved.task_overrides.len(), 1);

        let reimported = store.import_tables(&tables(), at(2025, 6, 10)).unwrap();
        let entity = reimported.entity("P1").unwrap();
        assert_eq!(entity.updates[0].id, entry.id);
        assert_eq!(entity.task("P1-T002").unwrap().completed_date, Some(later));
        assert_eq!(entity.workflows[0].progress, 50);
    }

    #[test]
    fn failed_write_back_keeps_the_snapshot() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(ReadOnly, EngineOptions::default(), now);
        let before = store.import_tables(&tables(), now).unwrap();

        let err = store
            .apply_change(
                "P1",
                EntityChange::SetTaskComment {
                    task_id: "P1-T001".into(),
                    comment: "novo".into(),
                },
                now,
            )
            .unwrap_err();
        assert!(matches!(err, UpdateError::Repository(_)));
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn unknown_and_renamed_entities_are_rejected() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        store.import_tables(&tables(), now).unwrap();

        let err = store.apply_change("P404", EntityChange::SetTags { tags: Default::default() }, now);
        assert!(matches!(err, Err(UpdateError::EntityNotFound(_))));

        let mut renamed = store.select("P1").unwrap().clone();
        renamed.process_id = "P2".into();
        let err = store.submit_update(renamed, now).unwrap_err();
        assert!(matches!(err, UpdateError::ProcessIdChanged { .. }));
    }

    #[test]
    fn renaming_onto_another_process_leaves_both_untouched() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        let mut two = tables();
        two.processes.push_row(vec![Cell::text("P2"), Cell::text("Eólica Dois")]);
        let before = store.import_tables(&two, now).unwrap();

        let mut renamed = store.select("P1").unwrap().clone();
        renamed.process_id = "P2".into();
        let err = store.submit_update(renamed, now).unwrap_err();

        match err {
            UpdateError::ProcessIdChanged { entity_id, from, to } => {
                assert_eq!((entity_id.as_str(), from.as_str(), to.as_str()), ("spe-P1", "P1", "P2"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.select("P2").unwrap().name, "Eólica Dois");
        assert!(store.repository().load("P2").unwrap().is_empty());
    }

    #[test]
    fn entity_with_unknown_id_is_not_found() {
        let now = at(2025, 6, 1);
        let mut store = PortfolioStore::new(InMemoryRepository::new(), EngineOptions::default(), now);
        store.import_tables(&tables(), now).unwrap();

        let mut stranger = store.select("P1").unwrap().clone();
        stranger.id = "spe-other".into();
        let err = store.submit_update(stranger, now).unwrap_err();
        assert!(matches!(err, UpdateError::EntityNotFound(_)));
    }
}
