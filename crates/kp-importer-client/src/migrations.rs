use rusqlite::Connection;
use rusqlite_migration::{M, Migrations};

const BACK_OFFICE_SQL: &str = include_str!("migrations/0001_back_office.sql");

const MIGRATION_SQL: [&str; 1] = [BACK_OFFICE_SQL];

fn migrations() -> Migrations<'static> {
    Migrations::new(MIGRATION_SQL.into_iter().map(M::up).collect())
}

pub fn run_pending(conn: &mut Connection) -> rusqlite_migration::Result<()> {
    migrations().to_latest(conn)
}

/// Number of migrations this build knows about; `PRAGMA user_version` after
/// [`run_pending`].
pub fn latest_version() -> i64 {
    MIGRATION_SQL.len() as i64
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::{latest_version, migrations, run_pending};

    #[test]
    fn migrations_are_valid() {
        assert!(migrations().validate().is_ok());
    }

    #[test]
    fn run_pending_is_idempotent_and_sets_user_version() {
        let connection = Connection::open_in_memory();
        assert!(connection.is_ok());
        if let Ok(mut connection) = connection {
            assert!(run_pending(&mut connection).is_ok());
            assert!(run_pending(&mut connection).is_ok());
            let version = connection.query_row("PRAGMA user_version", [], |row| row.get::<_, i64>(0));
            assert!(matches!(version, Ok(v) if v == latest_version()));
        }
    }

    #[test]
    fn system_admin_is_seeded() {
        let connection = Connection::open_in_memory();
        assert!(connection.is_ok());
        if let Ok(mut connection) = connection {
            assert!(run_pending(&mut connection).is_ok());
            let name = connection.query_row(
                "SELECT admin_name FROM gemstone_admin WHERE admin_id = 1",
                [],
                |row| row.get::<_, String>(0),
            );
            assert!(matches!(name.as_deref(), Ok("system")));
        }
    }
}
