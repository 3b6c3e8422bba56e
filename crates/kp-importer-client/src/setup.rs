use std::path::Path;

use rusqlite::{Connection, OptionalExtension, params};

use crate::migrations::{latest_version, run_pending};
use crate::state::{map_sqlite_error, open_connection};
use crate::{ClientError, ClientResult};

const LIST_BRANCH_COLUMNS: [&str; 3] = ["branch_id", "branch_code", "branch_name"];
const LIST_OUTLET_COLUMNS: [&str; 4] = ["outlet_id", "outlet_code", "sipnap_code", "branch_id"];
const LIST_PRODUCT_COLUMNS: [&str; 3] = ["product_id", "product_code", "product_name"];
const LIST_SALES_INVOICE_COLUMNS: [&str; 5] = [
    "sales_invoice_id",
    "sales_invoice_number",
    "branch_id",
    "outlet_id",
    "amount",
];
const LIST_SKB_COLUMNS: [&str; 3] = ["skb_id", "skb_number", "skb_type_id"];
const GEMSTONE_ADMIN_COLUMNS: [&str; 3] = ["admin_id", "admin_name", "is_collector"];
const GEMSTONE_ACTIVITY_LOG_COLUMNS: [&str; 5] =
    ["log_id", "label", "target_link", "meta_data", "legacy_log"];

const REQUIRED_CORE_TABLES: [(&str, &[&str]); 7] = [
    ("list_branch", &LIST_BRANCH_COLUMNS),
    ("list_outlet", &LIST_OUTLET_COLUMNS),
    ("list_product", &LIST_PRODUCT_COLUMNS),
    ("list_sales_invoice", &LIST_SALES_INVOICE_COLUMNS),
    ("list_skb", &LIST_SKB_COLUMNS),
    ("gemstone_admin", &GEMSTONE_ADMIN_COLUMNS),
    ("gemstone_activity_log", &GEMSTONE_ACTIVITY_LOG_COLUMNS),
];

#[derive(Debug, Clone)]
pub struct SetupContext {
    pub db_path: String,
    pub schema_version: i64,
}

/// Creates or migrates the back-office schema at `db_path`, then checks the
/// tables the importers depend on.
pub fn ensure_initialized_at(db_path: &Path) -> ClientResult<SetupContext> {
    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        return Err(ClientError::database_unavailable(
            db_path,
            "parent directory does not exist",
        ));
    }

    let mut connection = open_connection(db_path)?;
    run_pending(&mut connection).map_err(|error| map_migration_error(db_path, &error))?;

    verify_core_tables(&connection, db_path)?;
    let schema_version = read_schema_version(&connection, db_path)?;
    if schema_version != latest_version() {
        return Err(ClientError::database_corrupt(db_path));
    }

    Ok(SetupContext {
        db_path: db_path.display().to_string(),
        schema_version,
    })
}

fn map_migration_error(db_path: &Path, error: &rusqlite_migration::Error) -> ClientError {
    match error {
        rusqlite_migration::Error::RusqliteError { query: _, err } => {
            let mapped = map_sqlite_error(db_path, err);
            if mapped.code == "database_locked"
                || mapped.code == "database_corrupt"
                || mapped.code == "database_unavailable"
            {
                mapped
            } else {
                ClientError::migration_failed(db_path, &error.to_string())
            }
        }
        _ => ClientError::migration_failed(db_path, &error.to_string()),
    }
}

fn verify_core_tables(connection: &Connection, db_path: &Path) -> ClientResult<()> {
    for (table_name, required_columns) in REQUIRED_CORE_TABLES {
        if !sqlite_object_exists(connection, "table", table_name, db_path)? {
            return Err(ClientError::database_corrupt(db_path));
        }

        let columns = table_columns(connection, table_name, db_path)?;
        for required_column in required_columns {
            if !columns.iter().any(|column| column == required_column) {
                return Err(ClientError::database_corrupt(db_path));
            }
        }
    }

    Ok(())
}

fn sqlite_object_exists(
    connection: &Connection,
    object_type: &str,
    object_name: &str,
    db_path: &Path,
) -> ClientResult<bool> {
    let exists = connection
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = ?1 AND name = ?2 LIMIT 1",
            params![object_type, object_name],
            |_row| Ok(true),
        )
        .optional()
        .map_err(|error| map_sqlite_error(db_path, &error))?
        .unwrap_or(false);

    Ok(exists)
}

fn table_columns(
    connection: &Connection,
    table_name: &str,
    db_path: &Path,
) -> ClientResult<Vec<String>> {
    if !is_required_core_table(table_name) {
        return Err(ClientError::invalid_identifier(table_name));
    }

    // `table_name` comes from REQUIRED_CORE_TABLES only.
    let sql = format!("PRAGMA table_info({table_name})");
    let mut statement = connection
        .prepare(&sql)
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let column_iter = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| map_sqlite_error(db_path, &error))?;

    let mut columns: Vec<String> = Vec::new();
    for row in column_iter {
        let column = row.map_err(|error| map_sqlite_error(db_path, &error))?;
        columns.push(column);
    }

    Ok(columns)
}

fn is_required_core_table(table_name: &str) -> bool {
    REQUIRED_CORE_TABLES
        .iter()
        .any(|(required_name, _)| required_name == &table_name)
}

fn read_schema_version(connection: &Connection, db_path: &Path) -> ClientResult<i64> {
    connection
        .query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0))
        .map_err(|error| map_sqlite_error(db_path, &error))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::ensure_initialized_at;

    #[test]
    fn initializes_fresh_database_and_is_idempotent() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let db_path = temp.path().join("back_office.db");
            let first = ensure_initialized_at(&db_path);
            assert!(first.is_ok());
            let second = ensure_initialized_at(&db_path);
            assert!(second.is_ok());
            if let Ok(context) = second {
                assert_eq!(context.schema_version, 1);
                assert!(context.db_path.ends_with("back_office.db"));
            }
        }
    }

    #[test]
    fn missing_parent_directory_is_unavailable() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let db_path = temp.path().join("missing").join("back_office.db");
            let result = ensure_initialized_at(&db_path);
            assert!(result.is_err());
            if let Err(error) = result {
                assert_eq!(error.code, "database_unavailable");
            }
        }
    }

    #[test]
    fn conflicting_table_fails_migration() {
        let temp = tempfile::tempdir();
        assert!(temp.is_ok());
        if let Ok(temp) = temp {
            let db_path = temp.path().join("back_office.db");
            let seeded = Connection::open(&db_path)
                .and_then(|connection| connection.execute_batch("CREATE TABLE list_branch (id INTEGER);"));
            assert!(seeded.is_ok());
            let result = ensure_initialized_at(&db_path);
            assert!(result.is_err());
            if let Err(error) = result {
                assert_eq!(error.code, "migration_failed");
            }
        }
    }
}
