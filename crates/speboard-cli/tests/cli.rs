//! E2E tests for the speboard binary
//!
//! Each test generates the sample sources into a temporary directory and
//! drives the binary from there, so the default annotations file lands in
//! the same directory.

use std::path::Path;
use std::process::Command;

use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

const AS_OF: &str = "2025-06-01";

/// Run the binary in `dir` and return (exit_code, stdout, stderr)
fn speboard(dir: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_speboard"))
        .current_dir(dir)
        .env_remove("SPEBOARD_CONFIG")
        .env_remove("RUST_LOG")
        .args(args)
        .output()
        .expect("failed to execute speboard");

    let exit_code = output.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (exit_code, stdout, stderr)
}

/// Sample workspace with four entities and two orphan task rows
fn workspace() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let (code, stdout, stderr) = speboard(
        dir.path(),
        &["sample", "--output-dir", ".", "--entities", "4", "--orphans", "--as-of", AS_OF],
    );
    assert_eq!(code, 0, "sample failed: {stderr}");
    assert_eq!(stdout.lines().count(), 3);
    dir
}

/// Command arguments followed by the shared source flags
fn with_sources<'a>(args: &[&'a str]) -> Vec<&'a str> {
    let mut all = args.to_vec();
    all.extend([
        "--processes",
        "processos.xlsx",
        "--tracks",
        "esteiras.xlsx",
        "--tasks",
        "tarefas.xlsx",
        "--as-of",
        AS_OF,
    ]);
    all
}

fn import_json(dir: &Path) -> Value {
    let (code, stdout, stderr) = speboard(dir, &with_sources(&["import", "--format", "json"]));
    assert_eq!(code, 0, "import failed: {stderr}");
    serde_json::from_str(&stdout).unwrap()
}

fn entity<'a>(snapshot: &'a Value, process_id: &str) -> &'a Value {
    snapshot["entities"]
        .as_array()
        .unwrap()
        .iter()
        .find(|e| e["process_id"] == process_id)
        .unwrap()
}

fn task<'a>(entity: &'a Value, task_id: &str) -> &'a Value {
    entity["workflows"]
        .as_array()
        .unwrap()
        .iter()
        .flat_map(|w| w["tasks"].as_array().unwrap())
        .find(|t| t["id"] == task_id)
        .unwrap()
}

// =============================================================================
// Read commands
// =============================================================================

#[test]
fn sample_writes_three_spreadsheets() {
    let dir = workspace();
    for file in ["processos.xlsx", "esteiras.xlsx", "tarefas.xlsx"] {
        let bytes = std::fs::read(dir.path().join(file)).unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }
}

#[test]
fn import_text_shows_dashboard_and_warns_about_orphans() {
    let dir = workspace();
    let (code, stdout, stderr) = speboard(dir.path(), &with_sources(&["import"]));

    assert_eq!(code, 0);
    assert!(stdout.contains("SPE-0001"));
    assert!(stdout.contains("Resumo em 2025-06-01"));
    assert!(stdout.contains("SPEs: 6 (2 sem cadastro)"));
    assert!(stderr.contains("2 process id(s) referenced by tasks are not registered"));
}

#[test]
fn import_json_contains_entities_and_report() {
    let dir = workspace();
    let snapshot = import_json(dir.path());

    assert_eq!(snapshot["entities"].as_array().unwrap().len(), 6);
    assert_eq!(snapshot["report"]["ghost_entities"], 2);
    assert_eq!(entity(&snapshot, "ORFA-0001")["group"], "FALHA DE INTEGRIDADE");
    // Entity 3 carries four tracks
    assert_eq!(entity(&snapshot, "SPE-0004")["workflows"].as_array().unwrap().len(), 4);
}

#[test]
fn import_writes_output_file() {
    let dir = workspace();
    let (code, stdout, _) = speboard(dir.path(), &with_sources(&["import", "--output", "dashboard.txt"]));

    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    let written = std::fs::read_to_string(dir.path().join("dashboard.txt")).unwrap();
    assert!(written.contains("Resumo em 2025-06-01"));
}

#[test]
fn status_json_reports_portfolio_metrics() {
    let dir = workspace();
    let (code, stdout, _) = speboard(dir.path(), &with_sources(&["status", "--format", "json"]));

    assert_eq!(code, 0);
    let status: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(status["status"]["total_entities"], 6);
    assert_eq!(status["status"]["ghost_entities"], 2);
    // Four sample entities reach up to the engineering phase
    assert_eq!(status["efficiency"].as_array().unwrap().len(), 4);
}

#[test]
fn report_writes_xlsx() {
    let dir = workspace();
    let (code, _, stderr) = speboard(dir.path(), &with_sources(&["report", "--output", "carteira.xlsx"]));

    assert_eq!(code, 0, "report failed: {stderr}");
    let bytes = std::fs::read(dir.path().join("carteira.xlsx")).unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[test]
fn calendar_prints_mermaid_gantt() {
    let dir = workspace();
    let (code, stdout, _) = speboard(dir.path(), &with_sources(&["calendar", "--days", "90"]));

    assert_eq!(code, 0);
    assert!(stdout.starts_with("gantt\n"));
    assert!(stdout.contains("dateFormat YYYY-MM-DD"));
    assert!(stdout.contains("section "));
}

#[test]
fn calendar_rejects_out_of_range_window() {
    let dir = workspace();
    let (code, stdout, stderr) = speboard(dir.path(), &with_sources(&["calendar", "--days", "100000000"]));

    assert_eq!(code, 1, "{stderr}");
    assert!(stdout.is_empty());
    assert!(stderr.contains("--days 100000000 reaches past the supported date range"));
}

// =============================================================================
// Update commands
// =============================================================================

#[test]
fn set_status_persists_across_imports() {
    let dir = workspace();
    let (code, stdout, stderr) = speboard(
        dir.path(),
        &with_sources(&["set-status", "--process", "SPE-0001", "--task", "SPE-0001-T003", "--status", "completed"]),
    );
    assert_eq!(code, 0, "set-status failed: {stderr}");
    assert!(stdout.starts_with("SPE-0001-T003: Completed"));
    assert!(dir.path().join("speboard-annotations.json").is_file());

    let snapshot = import_json(dir.path());
    let task = task(entity(&snapshot, "SPE-0001"), "SPE-0001-T003");
    assert_eq!(task["status"], "completed");
    assert_eq!(task["completed_date"], "2025-06-01T00:00:00Z");
}

#[test]
fn comment_is_recorded_with_configured_author() {
    let dir = workspace();
    std::fs::write(dir.path().join("speboard.toml"), "[annotations]\nauthor = \"Ana\"\n").unwrap();

    let (code, stdout, stderr) = speboard(
        dir.path(),
        &with_sources(&["comment", "--process", "SPE-0002", "--kind", "blocker", "--text", "Cartório fechado"]),
    );
    assert_eq!(code, 0, "comment failed: {stderr}");
    assert!(stdout.starts_with("Added blocker entry"));

    let snapshot = import_json(dir.path());
    let latest = &entity(&snapshot, "SPE-0002")["updates"][0];
    assert_eq!(latest["content"], "Cartório fechado");
    assert_eq!(latest["author"], "Ana");
    assert_eq!(latest["kind"], "blocker");
    assert_eq!(latest["origin"], "user");
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn unknown_status_is_rejected() {
    let dir = workspace();
    let (code, _, stderr) = speboard(
        dir.path(),
        &with_sources(&["set-status", "--process", "SPE-0001", "--task", "SPE-0001-T001", "--status", "maybe"]),
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("Unknown status 'maybe'"));
}

#[test]
fn unknown_process_is_rejected_without_writing() {
    let dir = workspace();
    let (code, _, stderr) = speboard(
        dir.path(),
        &with_sources(&["comment", "--process", "SPE-9999", "--text", "olá"]),
    );
    assert_eq!(code, 1);
    assert!(stderr.contains("No entity with process id 'SPE-9999'"));
    assert!(!dir.path().join("speboard-annotations.json").exists());
}

#[test]
fn missing_source_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (code, _, stderr) = speboard(dir.path(), &with_sources(&["import"]));
    assert_eq!(code, 1);
    assert!(stderr.contains("Failed to read processos.xlsx"));
}

#[test]
fn unreadable_workbook_fails_the_import() {
    let dir = workspace();
    std::fs::write(dir.path().join("processos.xlsx"), b"not a spreadsheet").unwrap();

    let (code, _, stderr) = speboard(dir.path(), &with_sources(&["import"]));
    assert_eq!(code, 1);
    assert!(stderr.contains("Import failed"));
}
