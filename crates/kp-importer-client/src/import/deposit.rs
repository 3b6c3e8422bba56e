use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, contains_ignore_case};
use crate::import::context::{ImportContext, opt_int, text};
use crate::import::parse::{denorm_float, denorm_int, parse_date};
use crate::import::resolve::{
    BRANCH_BY_CODE, INVOICE_RETURN_BY_NUMBER, Lookups, SALES_INVOICE_BY_NUMBER,
};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 5;

const DEPOSIT_COLUMNS: [&str; 14] = [
    "deposit_date",
    "deposit_number",
    "deposit_type_id",
    "outlet_id",
    "branch_id",
    "deposit_location_id",
    "debit",
    "credit",
    "note",
    "settlement_id",
    "sales_invoice_id",
    "return_invoice_id",
    "createdAt",
    "createdBy",
];

/// Deposit type id and ledger note for the sheet's type label.
pub(crate) fn deposit_kind(label: Option<&str>) -> (i64, &'static str) {
    match label {
        None => (3, "DEPOSIT"),
        Some(label) if contains_ignore_case(label, "pelunasan") => (1, "DEPOSIT PELUNASAN"),
        Some(_) => (3, "DEPOSIT INVOICE RETUR"),
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut deposits = InsertBatch::new("list_outlet_deposit", &DEPOSIT_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(date_cell) = row.cell(0) else {
            debug!(row = row_number, "empty date, stopping scan");
            break;
        };
        let Some(branch_code) = row.cell(2) else {
            debug!(row = row_number, "skipping row without branch code");
            continue;
        };
        if branch_code == "Freetext" {
            continue;
        }
        summary.rows_read += 1;

        let Some(branch_id) = lookups.find(ctx, &BRANCH_BY_CODE, &branch_code)? else {
            warn!(row = row_number, branch_code = %branch_code, "skipping row with unknown branch");
            summary.skipped += 1;
            continue;
        };

        let deposit_date = parse_date(Some(&date_cell)).unwrap_or_else(|| ctx.today.clone());
        let (deposit_type, note) = deposit_kind(row.cell(1).as_deref());

        let sales_invoice_id = match row.cell(6) {
            Some(number) => lookups.find(ctx, &SALES_INVOICE_BY_NUMBER, &number)?,
            None => None,
        };
        let mut deposit_number = row.text(5);
        let return_invoice_id = match row.cell(7) {
            Some(number) => {
                if deposit_number.is_empty() {
                    deposit_number = number.clone();
                }
                lookups.find(ctx, &INVOICE_RETURN_BY_NUMBER, &number)?
            }
            None => None,
        };

        deposits.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                text(deposit_date),
                text(deposit_number),
                Value::Integer(deposit_type),
                Value::Integer(denorm_int(row.cell(3).as_deref())),
                Value::Integer(branch_id),
                Value::Integer(branch_id),
                Value::Real(denorm_float(row.cell(4).as_deref())),
                Value::Integer(0),
                text(note),
                Value::Null,
                opt_int(sales_invoice_id),
                opt_int(return_invoice_id),
                text(ctx.now.as_str()),
                Value::Integer(ctx.admin_id),
            ],
        )?;
        summary.inserted += 1;
    }
    deposits.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}

#[cfg(test)]
mod tests {
    use super::deposit_kind;

    #[test]
    fn type_label_selects_deposit_kind() {
        assert_eq!(deposit_kind(None), (3, "DEPOSIT"));
        assert_eq!(deposit_kind(Some("Deposit Pelunasan")), (1, "DEPOSIT PELUNASAN"));
        assert_eq!(deposit_kind(Some("PELUNASAN")), (1, "DEPOSIT PELUNASAN"));
        assert_eq!(deposit_kind(Some("Retur")), (3, "DEPOSIT INVOICE RETUR"));
    }
}
