//! Deterministic sample portfolio
//!
//! Builds the three import sources for `n` entities. Entity `i` gets the
//! first `1 + i % 5` phases as tracks with three tasks each, cycling through
//! completed, in-progress, overdue, blocked and at-risk rows. With orphans
//! enabled, two task rows reference unregistered processes.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use speboard_core::dates::{add_days, start_of_day};
use speboard_core::table::{Cell, RawTable};
use speboard_core::{Phase, Timestamp};
use speboard_parser::RawTables;
use speboard_render::table_to_xlsx;

const KINDS: [&str; 4] = ["Solar", "Eólica", "Hidro", "Biomassa"];
const GROUPS: [&str; 3] = ["Grupo Sol", "Ventos do Norte", "Águas Claras"];
const CITIES: [(&str, &str); 4] = [
    ("Petrolina", "PE"),
    ("Mossoró", "RN"),
    ("Uberlândia", "MG"),
    ("Sorriso", "MT"),
];
const PARTIES: [&str; 3] = ["Trinus", "Cliente", "Cartório"];
const BLOCKERS: [&str; 4] = [
    "Aguardando assinatura do contrato social",
    "Sem acesso ao portal da prefeitura",
    "Erro na integração com o ERP",
    "Aguardando retorno do cliente",
];

/// Tasks generated per track
pub const TASKS_PER_TRACK: usize = 3;

/// Process identifiers of the generated orphan task rows
pub const ORPHAN_IDS: [&str; 2] = ["ORFA-0001", "ORFA-0002"];

/// File names of the three sources, in processes/tracks/tasks order
pub const FILE_NAMES: [&str; 3] = ["processos.xlsx", "esteiras.xlsx", "tarefas.xlsx"];

pub fn process_id(index: usize) -> String {
    format!("SPE-{:04}", index + 1)
}

/// Number of tracks generated for entity `index`
pub fn track_count(index: usize) -> usize {
    1 + index % Phase::ALL.len()
}

/// Build the three raw tables
pub fn sample_tables(entities: usize, orphans: bool, as_of: Timestamp) -> RawTables {
    let today = start_of_day(as_of.date_naive());

    let mut processes = RawTable::new([
        "ID Processo",
        "Nome SPE",
        "Grupo",
        "Data Início",
        "CNPJ",
        "Cidade",
        "UF",
        "Data Kickoff",
        "Tags",
    ]);
    let mut tracks = RawTable::new(["ID Processo", "Esteira", "SLA"]);
    let mut tasks = RawTable::new([
        "ID Processo",
        "Esteira",
        "Tarefa",
        "Responsável",
        "Responsabilidade",
        "Data Início",
        "Prazo",
        "Data Conclusão",
        "Status",
        "Comentário",
    ]);

    for i in 0..entities {
        let pid = process_id(i);
        let start = add_days(today, -(30 + 7 * i as i64));
        let (city, region) = CITIES[i % CITIES.len()];
        let kickoff = if i % 3 == 0 { Cell::Empty } else { Cell::Date(add_days(start, 4)) };

        processes.push_row(vec![
            Cell::text(&pid),
            Cell::text(format!("{} {:02} SPE", KINDS[i % KINDS.len()], i + 1)),
            Cell::text(GROUPS[i % GROUPS.len()]),
            Cell::Date(start),
            Cell::text(format!("{:02}.{:03}.{:03}/0001-{:02}", 10 + i % 90, 100 + i, 200 + i, i % 100)),
            Cell::text(city),
            Cell::text(region),
            kickoff,
            Cell::text(if i % 2 == 0 { "piloto" } else { "piloto;prioritario" }),
        ]);

        for phase in Phase::ALL.iter().take(track_count(i)) {
            let order = phase.order();
            tracks.push_row(vec![
                Cell::text(&pid),
                Cell::text(phase.label()),
                Cell::Number((10 + 5 * order) as f64),
            ]);

            for j in 0..TASKS_PER_TRACK {
                let task_start = add_days(start, (order * 3 + j) as i64);
                let mut row = vec![
                    Cell::text(&pid),
                    Cell::text(phase.label()),
                    Cell::text(format!("{} - etapa {}", phase.label(), j + 1)),
                    Cell::text(format!("Analista {}", (i + j) % 4 + 1)),
                    Cell::text(PARTIES[j % PARTIES.len()]),
                    Cell::Date(task_start),
                ];
                let (due, completed, status, comment) = match (i + j + order) % 6 {
                    0 | 1 => (
                        Cell::Empty,
                        Cell::Date(add_days(task_start, 2)),
                        Cell::text("Concluído"),
                        Cell::Empty,
                    ),
                    2 => (
                        Cell::Date(add_days(today, 5 + j as i64)),
                        Cell::Empty,
                        Cell::text("Em andamento"),
                        Cell::Empty,
                    ),
                    3 => (Cell::Date(add_days(today, -3)), Cell::Empty, Cell::Empty, Cell::Empty),
                    4 => (
                        Cell::Empty,
                        Cell::Empty,
                        Cell::text("Bloqueado"),
                        Cell::text(BLOCKERS[(i + order) % BLOCKERS.len()]),
                    ),
                    _ => (
                        Cell::Date(add_days(today, 1)),
                        Cell::Empty,
                        Cell::text("Em risco"),
                        Cell::Empty,
                    ),
                };
                row.extend([due, completed, status, comment]);
                tasks.push_row(row);
            }
        }
    }

    if orphans {
        for (k, pid) in ORPHAN_IDS.iter().enumerate() {
            tasks.push_row(vec![
                Cell::text(*pid),
                Cell::text(Phase::Juridical.label()),
                Cell::text(format!("Minuta {}", k + 1)),
                Cell::Empty,
                Cell::text("Cliente"),
                Cell::Date(add_days(today, -10)),
                Cell::Empty,
                Cell::Empty,
                Cell::text("Bloqueado"),
                Cell::text(BLOCKERS[3]),
            ]);
        }
    }

    RawTables {
        processes,
        tracks,
        tasks,
    }
}

/// Write the three tables as spreadsheets into `dir`
pub fn write_sample(dir: &Path, tables: &RawTables) -> Result<[PathBuf; 3]> {
    std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let write = |table: &RawTable, sheet: &str, file: &str| -> Result<PathBuf> {
        let path = dir.join(file);
        let bytes = table_to_xlsx(table, sheet).with_context(|| format!("Failed to render {file}"))?;
        std::fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), rows = table.len(), "wrote sample source");
        Ok(path)
    };
    Ok([
        write(&tables.processes, "Processos", FILE_NAMES[0])?,
        write(&tables.tracks, "Esteiras", FILE_NAMES[1])?,
        write(&tables.tasks, "Tarefas", FILE_NAMES[2])?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use speboard_core::TaskStatus;
    use speboard_engine::{import_tables, EngineOptions};

    fn as_of() -> Timestamp {
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn generation_is_deterministic() {
        assert_eq!(sample_tables(6, true, as_of()), sample_tables(6, true, as_of()));
    }

    #[test]
    fn sample_reconciles_into_the_generated_shape() {
        let entities = import_tables(&sample_tables(7, false, as_of()), &EngineOptions::default(), as_of())
            .unwrap()
            .entities;

        assert_eq!(entities.len(), 7);
        for (i, entity) in entities.iter().enumerate() {
            assert_eq!(entity.process_id, process_id(i));
            assert!(!entity.is_ghost());
            assert_eq!(entity.workflows.len(), track_count(i));
            assert_eq!(entity.tasks().count(), track_count(i) * TASKS_PER_TRACK);
            assert_eq!(entity.milestones.len(), 4);
        }
        let statuses: Vec<TaskStatus> = entities.iter().flat_map(|e| e.tasks()).map(|t| t.status).collect();
        for status in TaskStatus::ALL {
            assert!(statuses.contains(&status), "missing {status}");
        }
    }

    #[test]
    fn orphans_become_ghosts() {
        let entities = import_tables(&sample_tables(2, true, as_of()), &EngineOptions::default(), as_of())
            .unwrap()
            .entities;
        let ghosts: Vec<&str> = entities
            .iter()
            .filter(|e| e.is_ghost())
            .map(|e| e.process_id.as_str())
            .collect();
        assert_eq!(ghosts, ORPHAN_IDS.to_vec());
    }

    #[test]
    fn writes_three_sources() {
        let dir = tempfile::tempdir().unwrap();
        let paths = write_sample(dir.path(), &sample_tables(2, false, as_of())).unwrap();
        for (path, name) in paths.iter().zip(FILE_NAMES) {
            assert!(path.ends_with(name));
            assert!(std::fs::read(path).unwrap().starts_with(b"PK"));
        }
    }
}
