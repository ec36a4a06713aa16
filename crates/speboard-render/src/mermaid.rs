//! MermaidJS milestone calendar
//!
//! One section per entity and one milestone marker per checkpoint, dated by
//! completion when completed and by deadline otherwise. Completed markers
//! are `done`, delayed ones `crit`.
//!
//! ## Example Output
//!
//! ```text
//! gantt
//!     title Marcos do portfólio
//!     dateFormat YYYY-MM-DD
//!     axisFormat %d/%m
//!
//!     section Solar Um (P-001)
//!     Kick-off                :done, milestone, P_001_kickoff, 2025-01-04, 0d
//!     Documentação Recebida   :crit, milestone, P_001_documentation, 2025-01-21, 0d
//! ```

use std::fmt::Write as _;

use speboard_core::portfolio::{calendar, CalendarEvent, CalendarItem};
use speboard_core::{Entity, MilestoneStatus, RenderError, Renderer, TaskStatus, Timestamp};

/// MermaidJS milestone calendar renderer
#[derive(Clone, Debug)]
pub struct MilestoneCalendarRenderer {
    pub title: String,
    /// Only events dated inside `[from, to]`
    pub window: Option<(Timestamp, Timestamp)>,
    /// Add open task due dates as one-day bars
    pub show_task_due_dates: bool,
}

impl Default for MilestoneCalendarRenderer {
    fn default() -> Self {
        Self {
            title: "Marcos do portfólio".into(),
            window: None,
            show_task_due_dates: false,
        }
    }
}

impl MilestoneCalendarRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn window(mut self, from: Timestamp, to: Timestamp) -> Self {
        self.window = Some((from, to));
        self
    }

    pub fn with_task_due_dates(mut self) -> Self {
        self.show_task_due_dates = true;
        self
    }

    /// Mermaid is sensitive to colons and special chars in labels
    fn sanitize_name(name: &str) -> String {
        name.replace([':', ';'], "-")
            .replace('#', "")
            .replace(['\n', '\r'], " ")
    }

    /// Mermaid IDs must be alphanumeric with underscores
    fn make_id(raw: &str) -> String {
        raw.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    fn write_item(&self, out: &mut String, item: &CalendarItem) -> std::fmt::Result {
        let date = item.date.format("%Y-%m-%d");
        match &item.event {
            CalendarEvent::Milestone { label, status } => {
                let modifier = match status {
                    MilestoneStatus::Completed => "done, ",
                    MilestoneStatus::Delayed => "crit, ",
                    MilestoneStatus::Pending => "",
                };
                let id = Self::make_id(&format!("{}_{}", item.process_id, label));
                writeln!(
                    out,
                    "    {:<24}:{modifier}milestone, {id}, {date}, 0d",
                    Self::sanitize_name(label)
                )
            }
            CalendarEvent::TaskDue { task_id, name, status } => {
                let modifier = match status {
                    TaskStatus::Delayed | TaskStatus::Blocked => "crit, ",
                    TaskStatus::AtRisk => "active, ",
                    TaskStatus::OnTrack | TaskStatus::Completed => "",
                };
                writeln!(
                    out,
                    "    {:<24}:{modifier}{}, {date}, 1d",
                    Self::sanitize_name(name),
                    Self::make_id(task_id)
                )
            }
        }
    }
}

impl Renderer for MilestoneCalendarRenderer {
    type Output = String;

    fn render(&self, entities: &[Entity], as_of: Timestamp) -> Result<String, RenderError> {
        let (from, to) = self.window.unwrap_or((Timestamp::MIN_UTC, Timestamp::MAX_UTC));
        let items: Vec<CalendarItem> = calendar(entities, from, to, as_of)
            .into_iter()
            .filter(|item| self.show_task_due_dates || matches!(item.event, CalendarEvent::Milestone { .. }))
            .collect();

        let mut out = String::new();
        let format_error = |e: std::fmt::Error| RenderError::Format(e.to_string());
        let result: std::fmt::Result = (|| {
            writeln!(out, "gantt")?;
            writeln!(out, "    title {}", Self::sanitize_name(&self.title))?;
            writeln!(out, "    dateFormat YYYY-MM-DD")?;
            writeln!(out, "    axisFormat %d/%m")?;

            for entity in entities {
                let mut section_items = items.iter().filter(|i| i.process_id == entity.process_id).peekable();
                if section_items.peek().is_none() {
                    continue;
                }
                writeln!(out)?;
                writeln!(
                    out,
                    "    section {} ({})",
                    Self::sanitize_name(&entity.name),
                    entity.process_id
                )?;
                for item in section_items {
                    self.write_item(&mut out, item)?;
                }
            }
            Ok(())
        })();
        result.map_err(format_error)?;
        Ok(out)
    }
}
