use std::path::PathBuf;

use crate::contracts::envelope::{SuccessEnvelope, success};
use crate::contracts::types::ImportKind;
use crate::import::{self, ImportJob, resolve_file};
use crate::state::resolve_db_path;
use crate::{ClientError, ClientResult};

pub const DEFAULT_ADMIN_ID: i64 = 1;
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Flags shared by every importer subcommand.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub kind: ImportKind,
    pub file: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub admin_id: i64,
    pub batch_size: usize,
    pub sheet: Option<String>,
    pub log_id: Option<String>,
}

impl ImportOptions {
    pub fn new(kind: ImportKind) -> Self {
        Self {
            kind,
            file: None,
            db_path: None,
            admin_id: DEFAULT_ADMIN_ID,
            batch_size: DEFAULT_BATCH_SIZE,
            sheet: None,
            log_id: None,
        }
    }
}

/// Runs one importer end to end and wraps its report for the CLI.
pub fn run_with_options(options: ImportOptions) -> ClientResult<SuccessEnvelope> {
    let command = options.kind.command();
    if options.batch_size == 0 {
        return Err(ClientError::invalid_argument_for_command(
            "--batch must be at least 1",
            Some(command),
        ));
    }
    if options.sheet.as_deref().is_some_and(|sheet| sheet.trim().is_empty()) {
        return Err(ClientError::invalid_argument_for_command(
            "--sheet must not be empty",
            Some(command),
        ));
    }

    let job = ImportJob {
        kind: options.kind,
        file: resolve_file(options.kind, options.file.as_deref()),
        db_path: resolve_db_path(options.db_path.as_deref())?,
        admin_id: options.admin_id,
        batch_size: options.batch_size,
        sheet: options.sheet,
        log_id: options.log_id,
    };
    let report = import::execute(&job)?;
    success(command, report)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::{ImportOptions, run_with_options};
    use crate::ImportKind;

    #[test]
    fn zero_batch_size_is_rejected_before_touching_files() {
        let result = run_with_options(ImportOptions {
            batch_size: 0,
            db_path: Some(PathBuf::from("/nonexistent/back_office.db")),
            ..ImportOptions::new(ImportKind::Giro)
        });
        assert!(result.is_err());
        if let Err(error) = result {
            assert_eq!(error.code, "invalid_argument");
            assert_eq!(
                error.recovery_steps,
                vec!["Run `kp-importer giro --help` for usage.".to_string()]
            );
        }
    }

    #[test]
    fn missing_workbook_is_reported() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let result = run_with_options(ImportOptions {
                file: Some(temp.path().join("absent.xlsx")),
                db_path: Some(temp.path().join("back_office.db")),
                ..ImportOptions::new(ImportKind::Outlet)
            });
            assert!(result.is_err());
            if let Err(error) = result {
                assert_eq!(error.code, "file_not_found");
            }
        }
    }
}
