use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, params_from_iter};
use tracing::debug;

use crate::ClientResult;
use crate::state::map_sqlite_error;

/// Upper bound on bound parameters per statement in bundled SQLite.
pub(crate) const MAX_BOUND_PARAMS: usize = 32_766;

/// Builds a single parameterized multi-row INSERT and its flat parameter list.
pub(crate) fn build_multi_insert(
    table: &str,
    columns: &[&str],
    rows: &[Vec<Value>],
) -> (String, Vec<Value>) {
    let placeholders = format!("({})", vec!["?"; columns.len()].join(","));
    let values = vec![placeholders.as_str(); rows.len()].join(",");
    let column_list = columns
        .iter()
        .map(|column| format!("\"{column}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!("INSERT INTO \"{table}\" ({column_list}) VALUES {values}");
    let params = rows.iter().flatten().cloned().collect::<Vec<_>>();
    (sql, params)
}

/// Row ids assigned by one flushed multi-row insert, assuming an
/// auto-increment step of 1 and no concurrent writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct InsertedIds {
    pub first: i64,
    pub count: usize,
}

impl InsertedIds {
    pub(crate) fn nth(&self, index: usize) -> i64 {
        self.first + index as i64
    }
}

/// Accumulates rows for one table and flushes them as multi-row INSERTs.
#[derive(Debug)]
pub(crate) struct InsertBatch {
    table: &'static str,
    columns: &'static [&'static str],
    rows: Vec<Vec<Value>>,
    limit: usize,
    written: usize,
}

impl InsertBatch {
    pub(crate) fn new(
        table: &'static str,
        columns: &'static [&'static str],
        batch_size: usize,
    ) -> Self {
        let param_cap = (MAX_BOUND_PARAMS / columns.len().max(1)).max(1);
        Self {
            table,
            columns,
            rows: Vec::new(),
            limit: batch_size.clamp(1, param_cap),
            written: 0,
        }
    }

    pub(crate) fn push(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "{} row width", self.table);
        self.rows.push(row);
    }

    pub(crate) fn is_full(&self) -> bool {
        self.rows.len() >= self.limit
    }

    #[cfg(test)]
    fn pending(&self) -> usize {
        self.rows.len()
    }

    /// Pushes a row and flushes when the batch reaches its threshold.
    pub(crate) fn push_and_flush(
        &mut self,
        connection: &Connection,
        db_path: &Path,
        row: Vec<Value>,
    ) -> ClientResult<Option<InsertedIds>> {
        self.push(row);
        if self.is_full() {
            return self.flush(connection, db_path);
        }
        Ok(None)
    }

    /// Writes every pending row; `None` when nothing was pending.
    pub(crate) fn flush(
        &mut self,
        connection: &Connection,
        db_path: &Path,
    ) -> ClientResult<Option<InsertedIds>> {
        if self.rows.is_empty() {
            return Ok(None);
        }
        let (sql, params) = build_multi_insert(self.table, self.columns, &self.rows);
        let count = self.rows.len();
        connection
            .execute(&sql, params_from_iter(params.iter()))
            .map_err(|error| {
                map_sqlite_error(db_path, &error)
                    .context(&format!("error inserting batch to {}", self.table))
            })?;
        let last = connection.last_insert_rowid();
        self.rows.clear();
        self.written += count;
        debug!(
            table = self.table,
            rows = count,
            total = self.written,
            "flushed batch"
        );
        Ok(Some(InsertedIds {
            first: last - count as i64 + 1,
            count,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rusqlite::Connection;
    use rusqlite::types::Value;

    use super::{InsertBatch, MAX_BOUND_PARAMS, build_multi_insert};

    const COLUMNS: [&str; 2] = ["giro_number", "giro_amount"];

    fn giro_row(number: &str, amount: f64) -> Vec<Value> {
        vec![Value::from(number.to_string()), Value::from(amount)]
    }

    fn memory_db() -> Option<Connection> {
        let connection = Connection::open_in_memory().ok()?;
        connection
            .execute_batch(
                "CREATE TABLE list_giro_check (
                    giro_id INTEGER PRIMARY KEY AUTOINCREMENT,
                    giro_number TEXT,
                    giro_amount REAL
                );",
            )
            .ok()?;
        Some(connection)
    }

    #[test]
    fn multi_insert_has_one_tuple_per_row() {
        let rows = vec![giro_row("G-1", 10.0), giro_row("G-2", 20.0)];
        let (sql, params) = build_multi_insert("list_giro_check", &COLUMNS, &rows);
        assert_eq!(
            sql,
            "INSERT INTO \"list_giro_check\" (\"giro_number\", \"giro_amount\") VALUES (?,?),(?,?)"
        );
        assert_eq!(params.len(), 4);
        assert_eq!(params[2], Value::Text("G-2".to_string()));
    }

    #[test]
    fn batch_flushes_at_threshold_and_reports_first_id() {
        let connection = memory_db();
        assert!(connection.is_some());
        if let Some(connection) = connection {
            let db_path = Path::new(":memory:");
            let mut batch = InsertBatch::new("list_giro_check", &COLUMNS, 2);

            let first = batch.push_and_flush(&connection, db_path, giro_row("G-1", 1.0));
            assert!(matches!(first, Ok(None)));
            let second = batch.push_and_flush(&connection, db_path, giro_row("G-2", 2.0));
            assert!(second.is_ok());
            if let Ok(Some(ids)) = second {
                assert_eq!(ids.first, 1);
                assert_eq!(ids.count, 2);
                assert_eq!(ids.nth(1), 2);
            }

            batch.push(giro_row("G-3", 3.0));
            let tail = batch.flush(&connection, db_path);
            assert!(tail.is_ok());
            if let Ok(Some(ids)) = tail {
                assert_eq!(ids.first, 3);
            }
            assert_eq!(batch.written, 3);
            assert_eq!(batch.pending(), 0);
            assert!(matches!(batch.flush(&connection, db_path), Ok(None)));
        }
    }

    #[test]
    fn batch_limit_respects_bound_parameter_cap() {
        let batch = InsertBatch::new("list_giro_check", &COLUMNS, 1_000_000);
        assert_eq!(batch.limit, MAX_BOUND_PARAMS / 2);
        let tiny = InsertBatch::new("list_giro_check", &COLUMNS, 0);
        assert_eq!(tiny.limit, 1);
    }

    #[test]
    fn failed_flush_names_the_table() {
        let connection = Connection::open_in_memory();
        assert!(connection.is_ok());
        if let Ok(connection) = connection {
            let mut batch = InsertBatch::new("list_giro_check", &COLUMNS, 10);
            batch.push(giro_row("G-1", 1.0));
            let result = batch.flush(&connection, Path::new(":memory:"));
            assert!(result.is_err());
            if let Err(error) = result {
                assert!(error.message.starts_with("error inserting batch to list_giro_check"));
            }
        }
    }
}
