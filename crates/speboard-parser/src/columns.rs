//! Header alias resolution
//!
//! Spreadsheet exports name the same column in many ways ("ID Processo",
//! "process_id", "Processo"). Header cells are folded (lower-case, accents
//! removed, runs of non-alphanumerics collapsed to `_`) and matched exactly
//! against each column's alias list. Aliases are tried in priority order, so
//! a specific header ("ID Processo") beats a generic one ("ID") wherever the
//! two sit in the row.

use std::collections::HashMap;

use speboard_core::table::Cell;

/// Logical columns understood by the normalizer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ProcessId,
    EntityName,
    Group,
    StartDate,
    RegistrationNumber,
    ErpId,
    CrmId,
    City,
    Region,
    Tags,
    Notes,
    UpdatedAt,
    KickoffDate,
    DocumentationDate,
    ContractDate,
    OperationDate,
    Track,
    SlaDays,
    TaskName,
    Assignee,
    Responsibility,
    DueDate,
    CompletedDate,
    Status,
    Comment,
    Critical,
}

impl Column {
    /// Canonical name, used in error messages
    pub fn name(&self) -> &'static str {
        self.aliases()[0]
    }

    /// Folded aliases; the first one is the canonical name
    pub fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::ProcessId => &[
                "process_id",
                "id_processo",
                "processo",
                "id_do_processo",
                "cod_processo",
                "id",
            ],
            Column::EntityName => &["name", "spe", "nome", "nome_spe", "nome_da_spe", "razao_social"],
            Column::Group => &["group", "cliente", "grupo", "client", "grupo_economico"],
            Column::StartDate => &["start_date", "data_inicio", "data_de_inicio", "inicio", "start"],
            Column::RegistrationNumber => &["registration_number", "cnpj"],
            Column::ErpId => &["erp_id", "id_erp", "codigo_erp"],
            Column::CrmId => &["crm_id", "id_crm", "codigo_crm"],
            Column::City => &["city", "cidade", "municipio"],
            Column::Region => &["region", "uf", "estado", "regiao"],
            Column::Tags => &["tags", "etiquetas"],
            Column::Notes => &["notes", "observacoes", "observacao", "obs"],
            Column::UpdatedAt => &["updated_at", "data_atualizacao", "atualizado_em", "ultima_atualizacao"],
            Column::KickoffDate => &["kickoff_date", "data_kickoff", "kickoff", "data_kick_off"],
            Column::DocumentationDate => &[
                "documentation_date",
                "data_documentacao",
                "documentacao_recebida",
                "data_documentacao_recebida",
            ],
            Column::ContractDate => &["contract_date", "data_contrato", "contrato_assinado", "data_assinatura_contrato"],
            Column::OperationDate => &["operation_date", "data_operacao", "inicio_operacao", "data_inicio_operacao"],
            Column::Track => &["track", "esteira", "fase", "phase", "categoria", "nome_esteira"],
            Column::SlaDays => &["sla_days", "sla", "sla_dias", "lead_time", "prazo_sla"],
            Column::TaskName => &["task", "tarefa", "atividade", "nome_tarefa", "nome_da_tarefa"],
            Column::Assignee => &["assignee", "responsavel", "owner", "executor"],
            Column::Responsibility => &["responsibility", "responsabilidade", "parte_responsavel"],
            Column::DueDate => &["due_date", "prazo", "data_prazo", "vencimento", "deadline", "data_limite"],
            Column::CompletedDate => &[
                "completed_date",
                "data_conclusao",
                "conclusao",
                "completed_at",
                "data_de_conclusao",
            ],
            Column::Status => &["status", "situacao"],
            Column::Comment => &["comment", "comentario", "comentarios", "observacao", "obs"],
            Column::Critical => &["critical", "critica", "critico", "caminho_critico"],
        }
    }
}

/// Fold a header label: lower-case, strip accents, collapse separators
pub fn fold_header(label: &str) -> String {
    let mut folded = String::with_capacity(label.len());
    let mut pending_separator = false;
    for ch in label.trim().chars().flat_map(char::to_lowercase) {
        let ch = strip_accent(ch);
        if ch.is_ascii_alphanumeric() {
            if pending_separator && !folded.is_empty() {
                folded.push('_');
            }
            pending_separator = false;
            folded.push(ch);
        } else {
            pending_separator = true;
        }
    }
    folded
}

fn strip_accent(ch: char) -> char {
    match ch {
        'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ç' => 'c',
        'ñ' => 'n',
        other => other,
    }
}

/// Column positions resolved from a header row
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    positions: HashMap<Column, usize>,
}

impl HeaderMap {
    /// Resolve the requested columns against a header row
    pub fn resolve(header: &[String], wanted: &[Column]) -> Self {
        let folded: Vec<String> = header.iter().map(|h| fold_header(h)).collect();
        let positions = wanted
            .iter()
            .filter_map(|column| {
                column
                    .aliases()
                    .iter()
                    .find_map(|alias| folded.iter().position(|h| h == alias))
                    .map(|index| (*column, index))
            })
            .collect();
        Self { positions }
    }

    pub fn has(&self, column: Column) -> bool {
        self.positions.contains_key(&column)
    }

    /// The cell of `column` in `row`, if the column exists and the row reaches it
    pub fn cell<'a>(&self, row: &'a [Cell], column: Column) -> Option<&'a Cell> {
        self.positions.get(&column).and_then(|index| row.get(*index))
    }

    /// Trimmed text of the cell; empty when absent
    pub fn text(&self, row: &[Cell], column: Column) -> String {
        self.cell(row, column).map(Cell::as_text).unwrap_or_default()
    }

    /// Trimmed text of the cell, `None` when absent or blank
    pub fn optional_text(&self, row: &[Cell], column: Column) -> Option<String> {
        Some(self.text(row, column)).filter(|s| !s.is_empty())
    }
}
