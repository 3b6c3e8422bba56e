use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

fn unique_test_dir() -> PathBuf {
    let mut path = std::env::temp_dir();
    let stamp = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(value) => value.as_nanos(),
        Err(_) => 0,
    };
    let sequence = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    path.push(format!(
        "kp-importer-cli-test-{}-{stamp}-{sequence}",
        std::process::id()
    ));
    let created = fs::create_dir_all(&path);
    assert!(created.is_ok());
    path
}

struct CliRun {
    code: Option<i32>,
    stdout: String,
}

fn run_cli(args: &[&str]) -> CliRun {
    let mut command = Command::new(env!("CARGO_BIN_EXE_kp-importer"));
    command.args(args);
    command.env_remove("KP_IMPORTER_DB");
    command.env("RUST_LOG", "off");
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());

    let output = command.output();
    assert!(output.is_ok());
    if let Ok(result) = output {
        let stdout = String::from_utf8(result.stdout);
        assert!(stdout.is_ok());
        if let Ok(stdout) = stdout {
            return CliRun {
                code: result.status.code(),
                stdout,
            };
        }
    }
    CliRun {
        code: None,
        stdout: String::new(),
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

fn parse_json(body: &str) -> Value {
    let parsed = serde_json::from_str::<Value>(body);
    assert!(parsed.is_ok());
    if let Ok(value) = parsed {
        return value;
    }
    Value::Null
}

/// Exactly one JSON line with the three result keys and nothing else.
fn assert_result_contract(body: &str) -> Value {
    assert_eq!(body.lines().count(), 1);
    let payload = parse_json(body.trim_end());
    let keys = payload
        .as_object()
        .map(|object| object.keys().cloned().collect::<Vec<_>>())
        .unwrap_or_default();
    assert_eq!(keys.len(), 3);
    assert!(payload["success"].is_boolean());
    assert!(payload["message"].is_string());
    assert!(payload["message_detail"].is_string());
    payload
}

fn assert_pipe_close_does_not_panic(args: &[&str], expect_success: bool) {
    let mut producer = Command::new(env!("CARGO_BIN_EXE_kp-importer"));
    producer.args(args);
    producer.env_remove("KP_IMPORTER_DB");
    producer.stdout(Stdio::piped());
    producer.stderr(Stdio::piped());

    let producer_spawn = producer.spawn();
    assert!(producer_spawn.is_ok());
    if let Ok(mut producer_child) = producer_spawn {
        let producer_stdout = producer_child.stdout.take();
        let producer_stderr = producer_child.stderr.take();
        assert!(producer_stdout.is_some());
        assert!(producer_stderr.is_some());

        if let Some(stdout_pipe) = producer_stdout {
            let mut reader = BufReader::new(stdout_pipe);
            let mut first_line = String::new();
            let read_result = reader.read_line(&mut first_line);
            assert!(read_result.is_ok());
            assert!(!first_line.is_empty());
            drop(reader);
        }

        let status = producer_child.wait();
        assert!(status.is_ok());
        if let Ok(exit_status) = status {
            assert_eq!(exit_status.success(), expect_success);
        }

        if let Some(mut stderr_pipe) = producer_stderr {
            let mut stderr_bytes = Vec::new();
            let stderr_read = stderr_pipe.read_to_end(&mut stderr_bytes);
            assert!(stderr_read.is_ok());
            let stderr = String::from_utf8(stderr_bytes);
            assert!(stderr.is_ok());
            if let Ok(stderr_text) = stderr {
                assert!(!stderr_text.contains("Broken pipe"));
                assert!(!stderr_text.contains("panicked"));
            }
        }
    }
}

#[test]
fn root_command_prints_plaintext_help() {
    let run = run_cli(&[]);
    assert_eq!(run.code, Some(0));
    assert!(run.stdout.starts_with("kp-importer - spreadsheet importer"));
    assert!(run.stdout.contains("invoice-return-product"));

    let help = run_cli(&["--help"]);
    assert_eq!(help.code, Some(0));
    assert_eq!(help.stdout, run.stdout);
}

#[test]
fn subcommand_help_and_version_succeed() {
    let help = run_cli(&["giro", "--help"]);
    assert_eq!(help.code, Some(0));
    assert!(help.stdout.contains("--batch"));
    assert!(help.stdout.contains("--log-id"));

    let version = run_cli(&["--version"]);
    assert_eq!(version.code, Some(0));
    assert_eq!(version.stdout.trim(), "kp-importer 0.1.0");
}

#[test]
fn zero_batch_is_an_argument_error() {
    let run = run_cli(&["stock", "--batch", "0"]);
    assert_eq!(run.code, Some(1));
    let payload = assert_result_contract(&run.stdout);
    assert_eq!(payload["success"], Value::Bool(false));
    let detail = payload["message_detail"].as_str().unwrap_or("");
    assert!(detail.starts_with("invalid_argument: "));
    assert!(detail.contains("kp-importer stock --help"));
}

#[test]
fn unknown_flag_is_an_argument_error() {
    let run = run_cli(&["giro", "--nope"]);
    assert_eq!(run.code, Some(1));
    let payload = assert_result_contract(&run.stdout);
    assert_eq!(payload["success"], Value::Bool(false));
    assert!(payload["message"].as_str().unwrap_or("").contains("--nope"));
}

#[test]
fn missing_database_path_is_reported() {
    let run = run_cli(&["giro"]);
    assert_eq!(run.code, Some(1));
    let payload = assert_result_contract(&run.stdout);
    assert_eq!(payload["message"], "database path is required");
    assert!(
        payload["message_detail"]
            .as_str()
            .unwrap_or("")
            .contains("KP_IMPORTER_DB")
    );
}

#[test]
fn init_then_missing_workbook() {
    let dir = unique_test_dir();
    let db = path_arg(&dir.join("back_office.db"));

    let init = run_cli(&["init", "--db", &db]);
    assert_eq!(init.code, Some(0));
    let payload = assert_result_contract(&init.stdout);
    assert_eq!(payload["success"], Value::Bool(true));
    assert_eq!(payload["message"], "Database ready at schema version 1");

    let again = run_cli(&["init", "--db", &db]);
    assert_eq!(again.code, Some(0));

    let missing = path_arg(&dir.join("absent.xlsx"));
    let import = run_cli(&["deposit", "--db", &db, "--file", &missing]);
    assert_eq!(import.code, Some(1));
    let payload = assert_result_contract(&import.stdout);
    assert_eq!(payload["success"], Value::Bool(false));
    assert!(
        payload["message_detail"]
            .as_str()
            .unwrap_or("")
            .starts_with("file_not_found")
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn init_into_missing_directory_fails() {
    let dir = unique_test_dir();
    let db = path_arg(&dir.join("nested").join("back_office.db"));
    let run = run_cli(&["init", "--db", &db]);
    assert_eq!(run.code, Some(1));
    let payload = assert_result_contract(&run.stdout);
    assert!(
        payload["message_detail"]
            .as_str()
            .unwrap_or("")
            .starts_with("database_unavailable")
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn help_output_pipe_close_does_not_panic() {
    assert_pipe_close_does_not_panic(&["product", "--help"], true);
}

#[test]
fn error_output_pipe_close_does_not_panic() {
    assert_pipe_close_does_not_panic(&["giro", "--nope"], false);
}
