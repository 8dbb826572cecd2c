//! CLI integration tests for sql-graph-export.
//!
//! These tests verify command-line argument parsing, help output,
//! and exit codes for error conditions detected before any database
//! connection is opened.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

/// Get a command for the sql-graph-export binary.
fn cmd() -> Command {
    let mut cmd = Command::cargo_bin("sql-graph-export").unwrap();
    cmd.env_remove("SQL_GRAPH_EXPORT_PASSWORD");
    cmd
}

/// A syntactically valid single-resource mapping document.
const MAPPING: &str = r#"[
  {
    "name": "student",
    "graph-object-type": "Node",
    "sql": "SELECT `id`, `name` FROM `school`.`student` ORDER BY `id`",
    "mappings": [
      { "column": "id", "field": "id", "role": "id", "type": "int" },
      { "column": "name", "field": "name", "role": "data", "type": "string" }
    ]
  }
]"#;

/// Export arguments that pass config validation and point at `mapping`.
fn export_args(dir: &TempDir, mapping: &str) -> Vec<String> {
    vec![
        "export".to_string(),
        "--database".to_string(),
        "school".to_string(),
        "--user".to_string(),
        "etl".to_string(),
        // Nothing listens here; none of these tests get as far as connecting
        "--port".to_string(),
        "1".to_string(),
        "--destination".to_string(),
        dir.path().display().to_string(),
        "--mapping-file".to_string(),
        mapping.to_string(),
    ]
}

fn write_file(dir: &TempDir, name: &str, content: &str) -> String {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path.display().to_string()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate-mapping"))
        .stdout(predicate::str::contains("export"));
}

#[test]
fn test_export_subcommand_help() {
    cmd()
        .args(["export", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--parent-table"))
        .stdout(predicate::str::contains("--child-table"))
        .stdout(predicate::str::contains("--mapping-file"))
        .stdout(predicate::str::contains("--options-file"))
        .stdout(predicate::str::contains("--delimiter"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn test_generate_mapping_subcommand_help() {
    cmd()
        .args(["generate-mapping", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--relationship-name"))
        .stdout(predicate::str::contains("--db-type"))
        .stdout(predicate::str::contains("--delimiter").not());
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("sql-graph-export"));
}

#[test]
fn test_global_flags_exist() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"))
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("--progress"))
        .stdout(predicate::str::contains("--debug"));
}

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_unknown_db_type_is_rejected() {
    cmd()
        .args(["export", "--db-type", "oracle"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("oracle"));
}

#[test]
fn test_unknown_relationship_name_source_is_rejected() {
    cmd()
        .args(["generate-mapping", "--relationship-name", "row"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("'table' or 'column'"));
}

// =============================================================================
// Configuration Error Tests (exit code 2)
// =============================================================================

#[test]
fn test_missing_required_args_exits_with_code_2() {
    cmd()
        .arg("export")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("source.database is required"))
        .stderr(predicate::str::contains("source.user is required"));
}

#[test]
fn test_missing_tables_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    cmd()
        .args([
            "generate-mapping",
            "--database",
            "school",
            "--user",
            "etl",
            "--destination",
            dir.path().to_str().unwrap(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("export.parent_table"));
}

#[test]
fn test_invalid_yaml_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "export"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_required_yaml_fields_exits_with_code_2() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  type: postgres").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "export"])
        .assert()
        .code(2);
}

#[test]
fn test_missing_config_file_exits_with_code_1() {
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "export"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("IO error"));
}

#[test]
fn test_bad_delimiter_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let mapping = write_file(&dir, "mapping.json", MAPPING);

    cmd()
        .args(export_args(&dir, &mapping))
        .args(["--delimiter", ";;"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("delimiter"));
}

#[test]
fn test_delimiter_equal_to_quote_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let mapping = write_file(&dir, "mapping.json", MAPPING);

    cmd()
        .args(export_args(&dir, &mapping))
        .args(["--delimiter", "'", "--quote", "'"])
        .assert()
        .code(2);
}

#[test]
fn test_malformed_options_file_exits_with_code_2() {
    let dir = TempDir::new().unwrap();
    let mapping = write_file(&dir, "mapping.json", MAPPING);
    let options = write_file(&dir, "options.json", "[1, 2");

    cmd()
        .args(export_args(&dir, &mapping))
        .args(["--options-file", &options])
        .assert()
        .code(2);
}

// =============================================================================
// Mapping Document Tests (exit code 5)
// =============================================================================

#[test]
fn test_malformed_mapping_file_exits_with_code_5() {
    let dir = TempDir::new().unwrap();
    let mapping = write_file(&dir, "mapping.json", "{ not a mapping");

    cmd()
        .args(export_args(&dir, &mapping))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("Mapping document"));
}

#[test]
fn test_duplicate_resource_names_exit_with_code_5() {
    let dir = TempDir::new().unwrap();
    let body = MAPPING.trim().trim_start_matches('[').trim_end_matches(']');
    let mapping = write_file(&dir, "mapping.json", &format!("[{},{}]", body, body));

    cmd()
        .args(export_args(&dir, &mapping))
        .assert()
        .code(5)
        .stderr(predicate::str::contains("duplicate resource name 'student'"));
}

#[test]
fn test_unsupported_mapping_uri_exits_with_code_5() {
    let dir = TempDir::new().unwrap();

    cmd()
        .args(export_args(&dir, "https://example.com/mapping.json"))
        .assert()
        .code(5);
}
