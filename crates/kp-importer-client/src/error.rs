use std::path::Path;

use serde_json::{Value, json};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClientError {
    pub code: String,
    pub message: String,
    pub recovery_steps: Vec<String>,
    pub data: Option<Value>,
}

impl ClientError {
    pub fn new(code: &str, message: &str, recovery_steps: Vec<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.to_string(),
            recovery_steps,
            data: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn invalid_argument(message: &str) -> Self {
        Self::invalid_argument_for_command(message, None)
    }

    pub fn invalid_argument_for_command(message: &str, command: Option<&str>) -> Self {
        let help_hint = match command {
            Some(cmd) => format!("Run `kp-importer {cmd} --help` for usage."),
            None => "Run `kp-importer --help` for usage.".to_string(),
        };
        let error = Self::new("invalid_argument", message, vec![help_hint]);
        if let Some(cmd) = command {
            return error.with_data(json!({
                "command_hint": cmd,
            }));
        }
        error
    }

    pub fn database_path_required() -> Self {
        Self::new(
            "invalid_argument",
            "database path is required",
            vec![
                "Pass `--db <path>` to the import command.".to_string(),
                "Or export `KP_IMPORTER_DB` with the database path.".to_string(),
            ],
        )
    }

    pub fn file_not_found(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "file_not_found",
            &format!("file not found: {location}"),
            vec![format!("Check that `{location}` exists and is readable.")],
        )
        .with_data(json!({ "path": location }))
    }

    pub fn workbook_open_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "workbook_open_failed",
            &format!("error opening file: {detail}"),
            vec![format!(
                "Save `{location}` as an .xlsx, .xls or .ods workbook and retry."
            )],
        )
        .with_data(json!({ "path": location }))
    }

    pub fn sheet_not_found(sheet: &str) -> Self {
        Self::new(
            "sheet_not_found",
            &format!("sheet `{sheet}` not found"),
            vec![
                "Check the sheet names in the workbook.".to_string(),
                "Pass `--sheet <name>` to pick another sheet.".to_string(),
            ],
        )
        .with_data(json!({ "sheet": sheet }))
    }

    pub fn workbook_empty() -> Self {
        Self::new(
            "sheet_not_found",
            "workbook has no sheets",
            vec!["Add at least one worksheet with data and retry.".to_string()],
        )
    }

    pub fn sheet_read_failed(sheet: &str, detail: &str) -> Self {
        Self::new(
            "workbook_open_failed",
            &format!("error reading sheet rows: {detail}"),
            Vec::new(),
        )
        .with_data(json!({ "sheet": sheet }))
    }

    pub fn invalid_identifier(identifier: &str) -> Self {
        Self::new(
            "internal_invalid_identifier",
            &format!("`{identifier}` is not a valid table or column name"),
            Vec::new(),
        )
    }

    pub fn internal_serialization(message: &str) -> Self {
        Self::new("internal_serialization_error", message, Vec::new())
    }

    pub fn database_locked(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "database_locked",
            &format!("Database is locked at `{location}`."),
            vec![format!(
                "Close other processes using `{location}` so the lock is released."
            )],
        )
    }

    pub fn database_corrupt(path: &Path) -> Self {
        let location = path.display().to_string();
        Self::new(
            "database_corrupt",
            &format!("Database appears corrupt at `{location}`."),
            vec![format!(
                "Replace `{location}` with a valid SQLite file or restore from backup."
            )],
        )
    }

    pub fn database_unavailable(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "database_unavailable",
            &format!("Cannot open database at `{location}`: {detail}"),
            vec![format!("Grant read and write access to `{location}`.")],
        )
    }

    pub fn database_error(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "database_error",
            detail,
            vec!["No rows were written. Fix the reported problem and rerun the import.".to_string()],
        )
        .with_data(json!({ "db_path": location }))
    }

    pub fn migration_failed(path: &Path, detail: &str) -> Self {
        let location = path.display().to_string();
        Self::new(
            "migration_failed",
            &format!("Schema migration failed at `{location}`: {detail}"),
            vec!["Resolve conflicting schema objects referenced in the error details.".to_string()],
        )
    }

    /// Prefixes the message with the step that failed, keeping code and hints.
    pub fn context(mut self, step: &str) -> Self {
        self.message = format!("{step}: {}", self.message);
        self
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::ClientError;

    #[test]
    fn context_prefixes_message_and_keeps_code() {
        let error = ClientError::database_error(Path::new("/tmp/x.db"), "UNIQUE constraint failed")
            .context("error inserting outlet batch");

        assert_eq!(error.code, "database_error");
        assert_eq!(
            error.message,
            "error inserting outlet batch: UNIQUE constraint failed"
        );
        assert!(!error.recovery_steps.is_empty());
    }

    #[test]
    fn invalid_argument_with_command_carries_hint() {
        let error = ClientError::invalid_argument_for_command("bad flag", Some("stock"));
        assert_eq!(error.code, "invalid_argument");
        assert_eq!(
            error.recovery_steps,
            vec!["Run `kp-importer stock --help` for usage.".to_string()]
        );
        assert!(error.data.is_some());
    }
}
