//! # speboard-render
//!
//! Presentation backends for a published speboard portfolio.
//!
//! This crate provides:
//! - A fixed-width text dashboard (`TextRenderer`)
//! - An XLSX portfolio report and raw-table export (`excel`)
//! - A MermaidJS milestone calendar (`mermaid`)
//!
//! Every renderer implements [`speboard_core::Renderer`] and reads the
//! entities as an immutable slice.
//!
//! ## Example
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use speboard_core::{Entity, Renderer};
//! use speboard_render::TextRenderer;
//!
//! let as_of = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
//! let entities = vec![Entity::new("P-001", "Solar Um", as_of)];
//! let text = TextRenderer::new().render(&entities, as_of).unwrap();
//! assert!(text.contains("Solar Um"));
//! ```

pub mod excel;
pub mod mermaid;

pub use excel::{table_to_xlsx, ExcelRenderer};
pub use mermaid::MilestoneCalendarRenderer;

use std::fmt::Write as _;

use speboard_core::portfolio::PortfolioStatus;
use speboard_core::{Entity, Phase, RenderError, Renderer, Timestamp};

/// Fixed-width console dashboard
#[derive(Clone, Debug)]
pub struct TextRenderer {
    /// Width of the entity name column
    pub name_width: usize,
    /// Print one row per entity
    pub show_table: bool,
    /// Append the portfolio summary after the entity table
    pub show_summary: bool,
}

impl Default for TextRenderer {
    fn default() -> Self {
        Self {
            name_width: 28,
            show_table: true,
            show_summary: true,
        }
    }
}

impl TextRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name_width(mut self, width: usize) -> Self {
        self.name_width = width.max(4);
        self
    }

    /// Render the entity table only
    pub fn no_summary(mut self) -> Self {
        self.show_summary = false;
        self
    }

    /// Render the portfolio summary only
    pub fn summary_only(mut self) -> Self {
        self.show_table = false;
        self.show_summary = true;
        self
    }

    fn fit(&self, text: &str, width: usize) -> String {
        if text.chars().count() <= width {
            return format!("{text:<width$}");
        }
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{cut}…")
    }

    fn write_table(&self, out: &mut String, entities: &[Entity]) -> std::fmt::Result {
        let phase_header: Vec<String> = Phase::ALL
            .iter()
            .map(|p| format!("{:>4}", abbreviation(*p)))
            .collect();
        writeln!(
            out,
            "{:<12} {} {:<18} {:<10} {:>5} {:>5} {}",
            "Processo",
            self.fit("SPE", self.name_width),
            "Grupo",
            "Status",
            "Prog",
            "Atr",
            phase_header.join(" ")
        )?;
        writeln!(out, "{}", "-".repeat(12 + self.name_width + 18 + 10 + 5 + 5 + 6 + 5 * 5))?;

        for entity in entities {
            let phases: Vec<String> = Phase::ALL
                .iter()
                .map(|phase| match entity.workflow(*phase) {
                    Some(workflow) => format!("{:>3}%", workflow.progress),
                    None => format!("{:>4}", "-"),
                })
                .collect();
            writeln!(
                out,
                "{} {} {} {} {:>4}% {:>5} {}",
                self.fit(&entity.process_id, 12),
                self.fit(&entity.name, self.name_width),
                self.fit(&entity.group, 18),
                self.fit(entity.overall_status.label(), 10),
                entity.progress(),
                entity.delayed_task_count(),
                phases.join(" ")
            )?;
        }
        Ok(())
    }

    fn write_summary(&self, out: &mut String, status: &PortfolioStatus) -> std::fmt::Result {
        writeln!(out)?;
        writeln!(out, "Resumo em {}", status.as_of.format("%Y-%m-%d"))?;
        writeln!(
            out,
            "  SPEs: {} ({} sem cadastro)  Progresso médio: {}%",
            status.total_entities, status.ghost_entities, status.average_progress
        )?;
        writeln!(
            out,
            "  No Prazo {} | Em Risco {} | Atrasado {} | Concluído {}",
            status.by_status.on_track,
            status.by_status.at_risk,
            status.by_status.delayed,
            status.by_status.completed
        )?;
        writeln!(
            out,
            "  Tarefas: {} ({} concluídas, {}%), {} atrasadas, {} bloqueadas",
            status.total_tasks,
            status.completed_tasks,
            status.task_completion_rate(),
            status.delayed_tasks,
            status.blocked_tasks
        )?;
        writeln!(
            out,
            "  Marcos: {} concluídos, {} pendentes, {} atrasados",
            status.milestones.completed, status.milestones.pending, status.milestones.delayed
        )?;
        if !status.root_causes.is_empty() {
            let causes: Vec<String> = status
                .root_causes
                .iter()
                .map(|(cause, count)| format!("{} {count}", cause.label()))
                .collect();
            writeln!(out, "  Causas raiz: {}", causes.join(", "))?;
        }
        if !status.open_by_responsibility.is_empty() {
            let parties: Vec<String> = status
                .open_by_responsibility
                .iter()
                .map(|(party, count)| format!("{} {count}", party.label()))
                .collect();
            writeln!(out, "  Tarefas abertas por responsável: {}", parties.join(", "))?;
        }
        Ok(())
    }
}

/// Three-letter column header of a phase
fn abbreviation(phase: Phase) -> &'static str {
    match phase {
        Phase::Viability => "VIA",
        Phase::Juridical => "JUR",
        Phase::Financial => "FIN",
        Phase::Engineering => "ENG",
        Phase::Integration => "INT",
    }
}

impl Renderer for TextRenderer {
    type Output = String;

    fn render(&self, entities: &[Entity], as_of: Timestamp) -> Result<String, RenderError> {
        let mut out = String::new();
        let format_error = |e: std::fmt::Error| RenderError::Format(e.to_string());

        if self.show_table {
            self.write_table(&mut out, entities).map_err(format_error)?;
        }
        if self.show_summary {
            let status = PortfolioStatus::from_entities(entities, as_of);
            self.write_summary(&mut out, &status).map_err(format_error)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use speboard_core::{Task, TaskStatus, Workflow};

    fn at(year: i32, month: u32, day: u32) -> Timestamp {
        Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap()
    }

    fn entity() -> Entity {
        let mut entity = Entity::new("P-001", "Solar Um", at(2025, 1, 1));
        entity.group = "Grupo Sol".into();
        let mut workflow = Workflow::new("P-001-juridical", Phase::Juridical, 15);
        workflow.tasks.push(Task::new("P-001-T001", "Minuta", at(2025, 1, 2)).status(TaskStatus::Completed));
        workflow.progress = 100;
        entity.workflows.push(workflow);
        entity
    }

    #[test]
    fn table_shows_phase_progress() {
        let text = TextRenderer::new().no_summary().render(&[entity()], at(2025, 6, 1)).unwrap();
        let row = text.lines().nth(2).unwrap();
        assert!(row.starts_with("P-001"));
        assert!(row.contains("Solar Um"));
        assert!(row.contains("100%"));
        assert!(row.contains('-'));
        assert!(!text.contains("Resumo"));
    }

    #[test]
    fn long_names_are_truncated() {
        let mut long = entity();
        long.name = "Sociedade de Propósito Específico Muito Longa".into();
        let text = TextRenderer::new().name_width(10).no_summary().render(&[long], at(2025, 6, 1)).unwrap();
        assert!(text.contains("Sociedade…"));
    }

    #[test]
    fn summary_counts_entities() {
        let text = TextRenderer::new().render(&[entity()], at(2025, 6, 1)).unwrap();
        assert!(text.contains("Resumo em 2025-06-01"));
        assert!(text.contains("SPEs: 1 (0 sem cadastro)"));
    }

    #[test]
    fn summary_only_skips_the_table() {
        let text = TextRenderer::new().summary_only().render(&[entity()], at(2025, 6, 1)).unwrap();
        assert!(!text.contains("Processo"));
        assert!(text.contains("Tarefas: 1 (1 concluídas, 100%)"));
    }
}
