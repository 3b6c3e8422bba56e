use rusqlite::params;
use serde_json::json;

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::context::ImportContext;

/// Stamps an activity-log row with the outcome of the import.
///
/// Returns the number of rows touched; a missing `log_id` touches none.
pub(crate) fn update_activity(
    ctx: &ImportContext<'_>,
    log_id: &str,
    label: &str,
    link: Option<&str>,
    summary: &ImportSummary,
    message_detail: &str,
) -> ClientResult<usize> {
    let meta_data = json!({
        "summary": summary,
        "message_detail": message_detail,
    })
    .to_string();
    ctx.execute(
        "error updating activity log",
        "UPDATE gemstone_activity_log
         SET label = ?1, target_link = ?2, meta_data = ?3, legacy_log = 0
         WHERE log_id = ?4",
        params![label, link, meta_data, log_id],
    )
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use rusqlite::Connection;

    use super::update_activity;
    use crate::contracts::types::ImportSummary;
    use crate::import::context::ImportContext;

    #[test]
    fn updates_label_link_and_meta() {
        let connection = Connection::open_in_memory();
        assert!(connection.is_ok());
        if let Ok(connection) = connection {
            let created = connection.execute_batch(
                "CREATE TABLE gemstone_activity_log (
                    log_id INTEGER PRIMARY KEY, label TEXT, target_link TEXT,
                    meta_data TEXT, legacy_log INTEGER DEFAULT 1
                 );
                 INSERT INTO gemstone_activity_log (log_id) VALUES (12);",
            );
            assert!(created.is_ok());
            let ctx = ImportContext::new(&connection, Path::new(":memory:"), 1, 500);
            let summary = ImportSummary {
                rows_read: 3,
                inserted: 2,
                skipped: 1,
                duplicates: 0,
            };

            let touched = update_activity(
                &ctx,
                "12",
                "IMPORT DATA OUTLET",
                Some("outlet/view_outlet_list"),
                &summary,
                "Total 2 rows inserted",
            );
            assert!(matches!(touched, Ok(1)));

            let missing = update_activity(&ctx, "99", "IMPORT DATA OUTLET", None, &summary, "");
            assert!(matches!(missing, Ok(0)));

            let row = connection.query_row(
                "SELECT label, target_link, legacy_log, meta_data FROM gemstone_activity_log WHERE log_id = 12",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            );
            assert!(row.is_ok());
            if let Ok((label, link, legacy, meta)) = row {
                assert_eq!(label, "IMPORT DATA OUTLET");
                assert_eq!(link, "outlet/view_outlet_list");
                assert_eq!(legacy, 0);
                assert!(meta.contains("\"inserted\":2"));
            }
        }
    }
}
