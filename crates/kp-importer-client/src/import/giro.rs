use rusqlite::types::Value;
use tracing::debug;

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, contains_ignore_case};
use crate::import::context::{ImportContext, text};
use crate::import::parse::{denorm_float, denorm_int, parse_date};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 6;
const GIRO_COLUMNS: [&str; 7] = [
    "giro_number",
    "outlet_id",
    "giro_amount",
    "due_date",
    "status_id",
    "createdAt",
    "createdBy",
];

/// 1 while the cheque has not cleared (`belum cair`), 2 once it has.
pub(crate) fn giro_status(label: Option<&str>) -> i64 {
    match label {
        Some(label) if contains_ignore_case(label, "belum") => 1,
        _ => 2,
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut giros = InsertBatch::new("list_giro_check", &GIRO_COLUMNS, ctx.batch_size);
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(giro_number) = row.cell(0) else {
            debug!(row = row_number, "empty giro number, stopping scan");
            break;
        };
        if giro_number == "Freetext" {
            continue;
        }
        summary.rows_read += 1;

        let due_date =
            parse_date(row.cell(4).as_deref()).unwrap_or_else(|| ctx.today.clone());
        giros.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                text(giro_number),
                Value::Integer(denorm_int(row.cell(1).as_deref())),
                Value::Real(denorm_float(row.cell(2).as_deref())),
                text(due_date),
                Value::Integer(giro_status(row.cell(5).as_deref())),
                text(ctx.now.as_str()),
                Value::Integer(ctx.admin_id),
            ],
        )?;
        summary.inserted += 1;
    }
    giros.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}

#[cfg(test)]
mod tests {
    use super::giro_status;

    #[test]
    fn uncleared_label_is_status_one() {
        assert_eq!(giro_status(Some("Belum Cair")), 1);
        assert_eq!(giro_status(Some("belum")), 1);
        assert_eq!(giro_status(Some("Cair")), 2);
        assert_eq!(giro_status(None), 2);
    }
}
