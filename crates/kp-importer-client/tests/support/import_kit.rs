use std::path::{Path, PathBuf};

use kp_importer_client::commands;
use kp_importer_client::commands::import::ImportOptions;
use kp_importer_client::{ClientResult, ImportKind, SuccessEnvelope};
use rusqlite::Connection;
use rust_xlsxwriter::Workbook;
use tempfile::TempDir;

/// A migrated database plus a place to drop workbooks.
pub struct Scenario {
    pub dir: TempDir,
    pub db_path: PathBuf,
}

pub fn scenario() -> Option<Scenario> {
    let dir = tempfile::tempdir().ok()?;
    let db_path = dir.path().join("back_office.db");
    let initialized = commands::init::run(Some(&db_path));
    assert!(initialized.is_ok());
    Some(Scenario { dir, db_path })
}

impl Scenario {
    pub fn connection(&self) -> Option<Connection> {
        Connection::open(&self.db_path).ok()
    }

    pub fn seed(&self, sql: &str) {
        let connection = self.connection();
        assert!(connection.is_some());
        if let Some(connection) = connection {
            assert!(connection.execute_batch(sql).is_ok());
        }
    }

    pub fn count(&self, sql: &str) -> i64 {
        self.connection()
            .and_then(|connection| connection.query_row(sql, [], |row| row.get(0)).ok())
            .unwrap_or(-1)
    }

    /// Writes one sheet of text cells; blank strings leave the cell empty.
    pub fn workbook(&self, name: &str, sheet: &str, rows: &[&[&str]]) -> PathBuf {
        self.workbook_sheets(name, &[(sheet, rows)])
    }

    /// Writes the sheets in the given order.
    pub fn workbook_sheets(&self, name: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        let path = self.dir.path().join(name);
        let written = write_sheets(&path, sheets);
        assert!(written.is_ok());
        path
    }

    pub fn import(&self, kind: ImportKind, file: &Path) -> ClientResult<SuccessEnvelope> {
        self.import_with(ImportOptions {
            file: Some(file.to_path_buf()),
            ..ImportOptions::new(kind)
        })
    }

    pub fn import_with(&self, options: ImportOptions) -> ClientResult<SuccessEnvelope> {
        commands::import::run_with_options(ImportOptions {
            db_path: Some(self.db_path.clone()),
            ..options
        })
    }
}

fn write_sheets(
    path: &Path,
    sheets: &[(&str, &[&[&str]])],
) -> Result<(), rust_xlsxwriter::XlsxError> {
    let mut workbook = Workbook::new();
    for (sheet, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*sheet)?;
        for (row_index, row) in rows.iter().enumerate() {
            for (col_index, value) in row.iter().enumerate() {
                if value.is_empty() {
                    continue;
                }
                worksheet.write_string(row_index as u32, col_index as u16, *value)?;
            }
        }
    }
    workbook.save(path)
}
