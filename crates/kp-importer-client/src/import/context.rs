use std::cell::Cell;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Params, Row};

use crate::state::map_sqlite_error;
use crate::{ClientError, ClientResult};

/// Posting timestamp stamped on migrated legacy documents and opening stock.
pub(crate) const LEGACY_CUTOVER: &str = "2025-09-29 00:00:00";

/// Everything an importer needs while its transaction is open.
pub(crate) struct ImportContext<'conn> {
    pub conn: &'conn Connection,
    pub db_path: PathBuf,
    pub admin_id: i64,
    pub batch_size: usize,
    pub now: String,
    pub today: String,
    pub unix_seconds: i64,
    last_suffix: Cell<i64>,
}

impl<'conn> ImportContext<'conn> {
    pub(crate) fn new(
        conn: &'conn Connection,
        db_path: &Path,
        admin_id: i64,
        batch_size: usize,
    ) -> Self {
        let started = Local::now().naive_local();
        Self::at(conn, db_path, admin_id, batch_size, started)
    }

    pub(crate) fn at(
        conn: &'conn Connection,
        db_path: &Path,
        admin_id: i64,
        batch_size: usize,
        started: NaiveDateTime,
    ) -> Self {
        Self {
            conn,
            db_path: db_path.to_path_buf(),
            admin_id,
            batch_size,
            now: started.format("%Y-%m-%d %H:%M:%S").to_string(),
            today: started.format("%Y-%m-%d").to_string(),
            unix_seconds: started.and_utc().timestamp(),
            last_suffix: Cell::new(0),
        }
    }

    /// Maps a SQLite failure to a client error prefixed with the failing step.
    pub(crate) fn sql_error(&self, step: &str, error: &rusqlite::Error) -> ClientError {
        map_sqlite_error(&self.db_path, error).context(step)
    }

    /// Reads the first column of the first row as an id.
    pub(crate) fn query_id<P: Params>(
        &self,
        step: &str,
        sql: &str,
        params: P,
    ) -> ClientResult<Option<i64>> {
        self.query_opt(step, sql, params, |row| row.get::<_, i64>(0))
    }

    pub(crate) fn query_opt<T, P, F>(
        &self,
        step: &str,
        sql: &str,
        params: P,
        map: F,
    ) -> ClientResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        self.conn
            .query_row(sql, params, map)
            .optional()
            .map_err(|error| self.sql_error(step, &error))
    }

    pub(crate) fn exists<P: Params>(&self, step: &str, sql: &str, params: P) -> ClientResult<bool> {
        Ok(self
            .query_opt(step, sql, params, |row| row.get::<_, Value>(0))?
            .is_some())
    }

    pub(crate) fn execute<P: Params>(&self, step: &str, sql: &str, params: P) -> ClientResult<usize> {
        self.conn
            .execute(sql, params)
            .map_err(|error| self.sql_error(step, &error))
    }

    /// Runs a single-row INSERT and returns the new row id.
    pub(crate) fn insert<P: Params>(&self, step: &str, sql: &str, params: P) -> ClientResult<i64> {
        self.execute(step, sql, params)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Nanosecond stamp for generated document numbers, strictly increasing
    /// within one run.
    pub(crate) fn unique_suffix(&self) -> i64 {
        let clock = Utc::now()
            .timestamp_nanos_opt()
            .unwrap_or(self.unix_seconds * 1_000_000_000);
        let next = clock.max(self.last_suffix.get() + 1);
        self.last_suffix.set(next);
        next
    }
}

pub(crate) fn text<S: Into<String>>(value: S) -> Value {
    Value::Text(value.into())
}

pub(crate) fn opt_text(value: Option<String>) -> Value {
    value.map_or(Value::Null, Value::Text)
}

pub(crate) fn opt_int(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Integer)
}
