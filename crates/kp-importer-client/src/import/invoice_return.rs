use std::collections::HashSet;

use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::Row;
use crate::import::context::{ImportContext, opt_text, text};
use crate::import::invoice::division_id;
use crate::import::parse::{denorm_float, parse_date};
use crate::import::resolve::{
    BRANCH_BY_NAME, INVOICE_RETURN_BY_NUMBER, Lookups, Memo, OUTLET_BY_CODE,
};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 10;
const RETURN_STATUS_APPROVED: i64 = 2;
const STB_STATUS_APPROVED: i64 = 2;
const ISSUER_TYPE_OUTLET: i64 = 3;
const DESTINATION_TYPE_BRANCH: i64 = 1;

const RETURN_COLUMNS: [&str; 11] = [
    "return_number",
    "return_date",
    "return_note",
    "return_invoice_status_id",
    "branch_id",
    "outlet_id",
    "division_id",
    "createdAt",
    "createdBy",
    "cash_discount",
    "total_return",
];
const STB_COLUMNS: [&str; 15] = [
    "stb_number",
    "stb_date",
    "stb_status_id",
    "stb_type_id",
    "reference_number",
    "destination_warehouse_id",
    "issuer_type_id",
    "issuer_id",
    "issuer",
    "destination_type_id",
    "destination_id",
    "destination",
    "is_return_invoice_sales",
    "createdAt",
    "createdBy",
];

/// Goods-receipt voucher type for an outlet return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReturnKind {
    Damaged,
    Regular,
    Other,
}

impl ReturnKind {
    pub(crate) fn from_label(label: &str) -> Self {
        match label.trim() {
            "RO Barang Rusak" => Self::Damaged,
            "RO Barang Reguler" => Self::Regular,
            _ => Self::Other,
        }
    }

    pub(crate) fn stb_type(self) -> i64 {
        match self {
            Self::Damaged => 2,
            Self::Regular => 12,
            Self::Other => 1,
        }
    }

    /// Regular returns go back to the sellable warehouse (type 1); the rest
    /// land in the returns warehouse (type 2).
    pub(crate) fn warehouse_type(self) -> i64 {
        if self == Self::Regular { 1 } else { 2 }
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut returns = InsertBatch::new("list_invoice_return", &RETURN_COLUMNS, ctx.batch_size);
    let mut vouchers = InsertBatch::new("list_stb", &STB_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut warehouses: Memo<(i64, i64), i64> = Memo::default();
    let mut seen = HashSet::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(return_number) = row.cell(1) else {
            debug!(row = row_number, "skipping row without return number");
            continue;
        };
        summary.rows_read += 1;

        if !seen.insert(return_number.clone())
            || lookups.find(ctx, &INVOICE_RETURN_BY_NUMBER, &return_number)?.is_some()
        {
            debug!(row = row_number, return_number = %return_number, "return number already exists");
            summary.duplicates += 1;
            continue;
        }

        let branch_name = row.text(3);
        let Some(branch) = lookups.find_named(ctx, &BRANCH_BY_NAME, "branch_name", &branch_name)?
        else {
            warn!(row = row_number, branch = %branch_name, "skipping return with unknown branch");
            summary.skipped += 1;
            continue;
        };
        let outlet_code = row.text(9);
        let Some(outlet) = lookups.find_named(ctx, &OUTLET_BY_CODE, "outlet_name", &outlet_code)?
        else {
            warn!(row = row_number, outlet_code = %outlet_code, "skipping return with unknown outlet");
            summary.skipped += 1;
            continue;
        };

        let kind = ReturnKind::from_label(&row.text(8));
        let warehouse_type = kind.warehouse_type();
        let Some(warehouse_id) = warehouses.get_or_load((branch.id, warehouse_type), || {
            ctx.query_id(
                "error querying warehouse",
                "SELECT warehouse_id FROM list_warehouse
                 WHERE branch_id = ?1 AND warehouse_type_id = ?2
                 ORDER BY warehouse_id ASC LIMIT 1",
                params![branch.id, warehouse_type],
            )
        })?
        else {
            warn!(row = row_number, branch = %branch.name, warehouse_type, "skipping return without destination warehouse");
            summary.skipped += 1;
            continue;
        };

        let return_date = opt_text(parse_date(row.cell(0).as_deref()));
        returns.push(vec![
            text(return_number.as_str()),
            return_date.clone(),
            text(row.text(2)),
            Value::Integer(RETURN_STATUS_APPROVED),
            Value::Integer(branch.id),
            Value::Integer(outlet.id),
            Value::Integer(division_id(row.cell(5).as_deref())),
            text(ctx.now.as_str()),
            Value::Integer(ctx.admin_id),
            Value::Real(denorm_float(row.cell(6).as_deref())),
            Value::Real(denorm_float(row.cell(7).as_deref())),
        ]);
        vouchers.push(vec![
            text(return_number.as_str()),
            return_date,
            Value::Integer(STB_STATUS_APPROVED),
            Value::Integer(kind.stb_type()),
            text(return_number.as_str()),
            Value::Integer(warehouse_id),
            Value::Integer(ISSUER_TYPE_OUTLET),
            Value::Integer(outlet.id),
            text(outlet.name.as_str()),
            Value::Integer(DESTINATION_TYPE_BRANCH),
            Value::Integer(branch.id),
            text(branch.name.as_str()),
            Value::Integer(1),
            text(ctx.now.as_str()),
            Value::Integer(ctx.admin_id),
        ]);
        if returns.is_full() {
            returns.flush(ctx.conn, &ctx.db_path)?;
            vouchers.flush(ctx.conn, &ctx.db_path)?;
        }
        summary.inserted += 1;
    }
    returns.flush(ctx.conn, &ctx.db_path)?;
    vouchers.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}

#[cfg(test)]
mod tests {
    use super::ReturnKind;

    #[test]
    fn return_label_selects_voucher_and_warehouse_type() {
        let damaged = ReturnKind::from_label("RO Barang Rusak");
        assert_eq!((damaged.stb_type(), damaged.warehouse_type()), (2, 2));

        let regular = ReturnKind::from_label(" RO Barang Reguler ");
        assert_eq!((regular.stb_type(), regular.warehouse_type()), (12, 1));

        let other = ReturnKind::from_label("Retur Lainnya");
        assert_eq!((other.stb_type(), other.warehouse_type()), (1, 2));
    }
}
