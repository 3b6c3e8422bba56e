use rusqlite::types::Value;
use tracing::warn;

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::Row;
use crate::import::context::ImportContext;
use crate::import::parse::denorm_float;
use crate::import::resolve::{Lookups, SALES_INVOICE_BY_NUMBER};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 3;
const FEE_COLUMNS: [&str; 3] = ["sales_invoice_id", "fee_type_id", "amount"];

/// `Ongkos Kirim` (shipping) is fee type 2; every other fee is 1.
pub(crate) fn fee_type(label: &str) -> i64 {
    if label == "Ongkos Kirim" { 2 } else { 1 }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut fees = InsertBatch::new("rel_sales_invoice_fees", &FEE_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            continue;
        }
        let (Some(invoice_number), Some(fee_name), Some(amount)) =
            (row.cell(0), row.cell(1), row.cell(2))
        else {
            continue;
        };
        summary.rows_read += 1;

        let Some(invoice_id) = lookups.find(ctx, &SALES_INVOICE_BY_NUMBER, &invoice_number)? else {
            warn!(row = row_number, invoice = %invoice_number, "skipping fee for unknown invoice");
            summary.skipped += 1;
            continue;
        };

        fees.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                Value::Integer(invoice_id),
                Value::Integer(fee_type(&fee_name)),
                Value::Real(denorm_float(Some(&amount))),
            ],
        )?;
        summary.inserted += 1;
    }
    fees.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}
