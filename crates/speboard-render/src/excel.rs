//! XLSX portfolio report
//!
//! Generates a workbook with one sheet per cockpit view:
//! - Portfolio: one row per entity with status, progress and metadata
//! - Tasks: every task with age, due date and root cause of delays
//! - Milestones: the four value-delivery checkpoints per entity
//! - Efficiency: task aging against declared lead time per phase
//!
//! Dates are written as spreadsheet serials with a date format, so the
//! report sorts and filters natively.
//!
//! ## Example Output Structure
//!
//! ```text
//! Sheet: Portfolio
//! | Processo | SPE      | Grupo     | Status   | Progresso | Fase atual | ...
//! |----------|----------|-----------|----------|-----------|------------|
//! | P-001    | Solar Um | Grupo Sol | No Prazo | 50%       | Jurídico   |
//! ```

use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet, XlsxError};
use speboard_core::dates::to_serial;
use speboard_core::portfolio::phase_efficiency;
use speboard_core::table::{Cell, RawTable};
use speboard_core::{Entity, EntityStatus, MilestoneStatus, RenderError, Renderer, TaskStatus, Timestamp};

fn xlsx_error(e: XlsxError) -> RenderError {
    RenderError::Format(format!("Failed to create Excel: {e}"))
}

/// XLSX portfolio report renderer
#[derive(Clone, Debug)]
pub struct ExcelRenderer {
    pub include_tasks: bool,
    pub include_milestones: bool,
    pub include_efficiency: bool,
    /// Leave ghost entities out of every sheet
    pub hide_ghosts: bool,
    /// Number format used for date cells
    pub date_format: String,
}

impl Default for ExcelRenderer {
    fn default() -> Self {
        Self {
            include_tasks: true,
            include_milestones: true,
            include_efficiency: true,
            hide_ghosts: false,
            date_format: "dd/mm/yyyy".into(),
        }
    }
}

impl ExcelRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_tasks(mut self) -> Self {
        self.include_tasks = false;
        self
    }

    pub fn no_milestones(mut self) -> Self {
        self.include_milestones = false;
        self
    }

    pub fn no_efficiency(mut self) -> Self {
        self.include_efficiency = false;
        self
    }

    pub fn hide_ghosts(mut self) -> Self {
        self.hide_ghosts = true;
        self
    }

    pub fn date_format(mut self, format: impl Into<String>) -> Self {
        self.date_format = format.into();
        self
    }

    /// Generate Excel workbook bytes
    pub fn render_to_bytes(&self, entities: &[Entity], as_of: Timestamp) -> Result<Vec<u8>, RenderError> {
        let selected: Vec<Entity> = entities
            .iter()
            .filter(|e| !(self.hide_ghosts && e.is_ghost()))
            .cloned()
            .collect();

        let mut workbook = Workbook::new();
        let formats = self.create_formats();

        self.add_portfolio_sheet(&mut workbook, &selected, &formats)?;
        if self.include_tasks {
            self.add_tasks_sheet(&mut workbook, &selected, as_of, &formats)?;
        }
        if self.include_milestones {
            self.add_milestones_sheet(&mut workbook, &selected, as_of, &formats)?;
        }
        if self.include_efficiency {
            self.add_efficiency_sheet(&mut workbook, &selected, as_of, &formats)?;
        }

        workbook.save_to_buffer().map_err(xlsx_error)
    }

    fn create_formats(&self) -> ReportFormats {
        let header = Format::new()
            .set_bold()
            .set_align(FormatAlign::Center)
            .set_background_color(0x4472C4)
            .set_font_color(0xFFFFFF)
            .set_border(FormatBorder::Thin);

        ReportFormats {
            header,
            text: Format::new().set_border(FormatBorder::Thin),
            integer: Format::new().set_num_format("#,##0").set_border(FormatBorder::Thin),
            decimal: Format::new().set_num_format("#,##0.0").set_border(FormatBorder::Thin),
            percent: Format::new().set_num_format("0%").set_border(FormatBorder::Thin),
            date: Format::new()
                .set_num_format(&self.date_format)
                .set_border(FormatBorder::Thin),
            // Status highlights
            good: Format::new().set_background_color(0xE2EFDA).set_border(FormatBorder::Thin),
            warning: Format::new().set_background_color(0xFFF2CC).set_border(FormatBorder::Thin),
            bad: Format::new().set_background_color(0xFFCCCC).set_border(FormatBorder::Thin),
        }
    }

    fn write_header(sheet: &mut Worksheet, columns: &[(&str, f64)], formats: &ReportFormats) -> Result<(), RenderError> {
        for (col, (label, width)) in columns.iter().enumerate() {
            let col = col as u16;
            sheet
                .write_string_with_format(0, col, *label, &formats.header)
                .map_err(xlsx_error)?;
            sheet.set_column_width(col, *width).ok();
        }
        sheet.set_freeze_panes(1, 0).ok();
        Ok(())
    }

    fn write_date(
        sheet: &mut Worksheet,
        row: u32,
        col: u16,
        date: Option<Timestamp>,
        formats: &ReportFormats,
    ) -> Result<(), RenderError> {
        match date {
            Some(at) => sheet.write_number_with_format(row, col, to_serial(at), &formats.date),
            None => sheet.write_blank(row, col, &formats.text),
        }
        .map_err(xlsx_error)?;
        Ok(())
    }

    fn add_portfolio_sheet(
        &self,
        workbook: &mut Workbook,
        entities: &[Entity],
        formats: &ReportFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Portfolio").map_err(xlsx_error)?;
        Self::write_header(
            sheet,
            &[
                ("Processo", 12.0),
                ("SPE", 30.0),
                ("Grupo", 20.0),
                ("Status", 12.0),
                ("Progresso", 10.0),
                ("Fase atual", 14.0),
                ("Tarefas", 8.0),
                ("Atrasadas", 10.0),
                ("Início", 12.0),
                ("Última atividade", 16.0),
                ("CNPJ", 20.0),
                ("Cidade", 16.0),
                ("UF", 6.0),
                ("Tags", 24.0),
            ],
            formats,
        )?;

        for (i, entity) in entities.iter().enumerate() {
            let row = (i + 1) as u32;
            let status_format = match entity.overall_status {
                EntityStatus::Completed | EntityStatus::OnTrack => &formats.good,
                EntityStatus::AtRisk => &formats.warning,
                EntityStatus::Delayed => &formats.bad,
            };
            let current_phase = entity.current_phase().map(|p| p.label()).unwrap_or("-");
            let tags: Vec<&str> = entity.tags.iter().map(String::as_str).collect();
            let metadata = &entity.metadata;

            sheet
                .write_string_with_format(row, 0, &entity.process_id, &formats.text)
                .and_then(|s| s.write_string_with_format(row, 1, &entity.name, &formats.text))
                .and_then(|s| s.write_string_with_format(row, 2, &entity.group, &formats.text))
                .and_then(|s| s.write_string_with_format(row, 3, entity.overall_status.label(), status_format))
                .and_then(|s| {
                    s.write_number_with_format(row, 4, f64::from(entity.progress()) / 100.0, &formats.percent)
                })
                .and_then(|s| s.write_string_with_format(row, 5, current_phase, &formats.text))
                .and_then(|s| s.write_number_with_format(row, 6, entity.tasks().count() as f64, &formats.integer))
                .and_then(|s| {
                    s.write_number_with_format(row, 7, entity.delayed_task_count() as f64, &formats.integer)
                })
                .map_err(xlsx_error)?;
            Self::write_date(sheet, row, 8, Some(entity.start_date), formats)?;
            Self::write_date(sheet, row, 9, Some(entity.last_activity), formats)?;
            sheet
                .write_string_with_format(row, 10, metadata.registration_number.as_deref().unwrap_or(""), &formats.text)
                .and_then(|s| s.write_string_with_format(row, 11, metadata.city.as_deref().unwrap_or(""), &formats.text))
                .and_then(|s| s.write_string_with_format(row, 12, metadata.region.as_deref().unwrap_or(""), &formats.text))
                .and_then(|s| s.write_string_with_format(row, 13, tags.join(", "), &formats.text))
                .map_err(xlsx_error)?;
        }
        Ok(())
    }

    fn add_tasks_sheet(
        &self,
        workbook: &mut Workbook,
        entities: &[Entity],
        as_of: Timestamp,
        formats: &ReportFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Tasks").map_err(xlsx_error)?;
        Self::write_header(
            sheet,
            &[
                ("Processo", 12.0),
                ("Fase", 14.0),
                ("ID", 12.0),
                ("Tarefa", 30.0),
                ("Responsável", 16.0),
                ("Responsabilidade", 16.0),
                ("Status", 12.0),
                ("Início", 12.0),
                ("Prazo", 12.0),
                ("Conclusão", 12.0),
                ("Idade (dias)", 12.0),
                ("Causa raiz", 16.0),
                ("Crítica", 8.0),
                ("Comentário", 40.0),
            ],
            formats,
        )?;

        let mut row = 1u32;
        for entity in entities {
            for workflow in &entity.workflows {
                for task in &workflow.tasks {
                    let status_format = match task.status {
                        TaskStatus::Completed | TaskStatus::OnTrack => &formats.good,
                        TaskStatus::AtRisk => &formats.warning,
                        TaskStatus::Delayed | TaskStatus::Blocked => &formats.bad,
                    };
                    let root_cause = match task.status {
                        TaskStatus::Delayed | TaskStatus::Blocked => task.root_cause().label(),
                        _ => "",
                    };

                    sheet
                        .write_string_with_format(row, 0, &entity.process_id, &formats.text)
                        .and_then(|s| s.write_string_with_format(row, 1, workflow.phase.label(), &formats.text))
                        .and_then(|s| s.write_string_with_format(row, 2, &task.id, &formats.text))
                        .and_then(|s| s.write_string_with_format(row, 3, &task.name, &formats.text))
                        .and_then(|s| s.write_string_with_format(row, 4, &task.assignee, &formats.text))
                        .and_then(|s| s.write_string_with_format(row, 5, task.responsibility.label(), &formats.text))
                        .and_then(|s| s.write_string_with_format(row, 6, task.status.label(), status_format))
                        .map_err(xlsx_error)?;
                    Self::write_date(sheet, row, 7, Some(task.start_date), formats)?;
                    Self::write_date(sheet, row, 8, task.due_date, formats)?;
                    Self::write_date(sheet, row, 9, task.completed_date, formats)?;
                    sheet
                        .write_number_with_format(row, 10, task.age(as_of) as f64, &formats.integer)
                        .and_then(|s| s.write_string_with_format(row, 11, root_cause, &formats.text))
                        .and_then(|s| {
                            s.write_string_with_format(row, 12, if task.critical { "Sim" } else { "" }, &formats.text)
                        })
                        .and_then(|s| s.write_string_with_format(row, 13, &task.comment, &formats.text))
                        .map_err(xlsx_error)?;
                    row += 1;
                }
            }
        }
        if row > 1 {
            sheet.autofilter(0, 0, row - 1, 13).ok();
        }
        Ok(())
    }

    fn add_milestones_sheet(
        &self,
        workbook: &mut Workbook,
        entities: &[Entity],
        as_of: Timestamp,
        formats: &ReportFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Milestones").map_err(xlsx_error)?;
        Self::write_header(
            sheet,
            &[
                ("Processo", 12.0),
                ("SPE", 30.0),
                ("Marco", 24.0),
                ("Prazo", 12.0),
                ("Conclusão", 12.0),
                ("Status", 12.0),
            ],
            formats,
        )?;

        let mut row = 1u32;
        for entity in entities {
            for milestone in &entity.milestones {
                let status = milestone.status(as_of);
                let status_format = match status {
                    MilestoneStatus::Completed => &formats.good,
                    MilestoneStatus::Pending => &formats.text,
                    MilestoneStatus::Delayed => &formats.bad,
                };
                sheet
                    .write_string_with_format(row, 0, &entity.process_id, &formats.text)
                    .and_then(|s| s.write_string_with_format(row, 1, &entity.name, &formats.text))
                    .and_then(|s| s.write_string_with_format(row, 2, &milestone.label, &formats.text))
                    .map_err(xlsx_error)?;
                Self::write_date(sheet, row, 3, milestone.deadline, formats)?;
                Self::write_date(sheet, row, 4, milestone.completed_date, formats)?;
                sheet
                    .write_string_with_format(row, 5, status.label(), status_format)
                    .map_err(xlsx_error)?;
                row += 1;
            }
        }
        Ok(())
    }

    fn add_efficiency_sheet(
        &self,
        workbook: &mut Workbook,
        entities: &[Entity],
        as_of: Timestamp,
        formats: &ReportFormats,
    ) -> Result<(), RenderError> {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Efficiency").map_err(xlsx_error)?;
        Self::write_header(
            sheet,
            &[
                ("Fase", 14.0),
                ("Tarefas", 10.0),
                ("Abertas", 10.0),
                ("Idade média (dias)", 18.0),
                ("Lead time médio (dias)", 22.0),
                ("Acima do lead time", 18.0),
            ],
            formats,
        )?;

        for (i, phase) in phase_efficiency(entities, as_of).iter().enumerate() {
            let row = (i + 1) as u32;
            let over_format = if phase.over_lead_time > 0 { &formats.bad } else { &formats.integer };
            sheet
                .write_string_with_format(row, 0, phase.phase.label(), &formats.text)
                .and_then(|s| s.write_number_with_format(row, 1, phase.tasks as f64, &formats.integer))
                .and_then(|s| s.write_number_with_format(row, 2, phase.open_tasks as f64, &formats.integer))
                .and_then(|s| s.write_number_with_format(row, 3, phase.average_age_days, &formats.decimal))
                .and_then(|s| s.write_number_with_format(row, 4, phase.average_lead_time_days, &formats.decimal))
                .and_then(|s| s.write_number_with_format(row, 5, phase.over_lead_time as f64, over_format))
                .map_err(xlsx_error)?;
        }
        Ok(())
    }
}

impl Renderer for ExcelRenderer {
    type Output = Vec<u8>;

    fn render(&self, entities: &[Entity], as_of: Timestamp) -> Result<Vec<u8>, RenderError> {
        self.render_to_bytes(entities, as_of)
    }
}

/// Reusable cell formats
struct ReportFormats {
    header: Format,
    text: Format,
    integer: Format,
    decimal: Format,
    percent: Format,
    date: Format,
    good: Format,
    warning: Format,
    bad: Format,
}

/// Write a raw table as a single-sheet workbook
pub fn table_to_xlsx(table: &RawTable, sheet_name: &str) -> Result<Vec<u8>, RenderError> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let header_format = Format::new().set_bold();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name).map_err(xlsx_error)?;

    for (col, label) in table.header.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, label, &header_format)
            .map_err(xlsx_error)?;
    }
    for (r, cells) in table.rows.iter().enumerate() {
        let row = (r + 1) as u32;
        for (c, cell) in cells.iter().enumerate() {
            let col = c as u16;
            match cell {
                Cell::Empty => continue,
                Cell::Text(text) => sheet.write_string(row, col, text),
                Cell::Number(n) => sheet.write_number(row, col, *n),
                Cell::Bool(b) => sheet.write_boolean(row, col, *b),
                Cell::Date(at) => sheet.write_number_with_format(row, col, to_serial(*at), &date_format),
            }
            .map_err(xlsx_error)?;
        }
    }
    workbook.save_to_buffer().map_err(xlsx_error)
}
