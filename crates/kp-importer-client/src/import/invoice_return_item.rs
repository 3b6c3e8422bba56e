use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::Row;
use crate::import::context::{ImportContext, opt_text, text};
use crate::import::parse::{denorm_float, denorm_int, parse_date};
use crate::import::resolve::{INVOICE_RETURN_BY_NUMBER, Lookups, Memo, PRODUCT_BY_CODE, STB_BY_NUMBER};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 10;
const REFERENCE_TYPE_INVOICE: i64 = 1;

const ITEM_COLUMNS: [&str; 20] = [
    "return_invoice_id",
    "stb_id",
    "product_id",
    "unit",
    "qty",
    "qty_extra",
    "quoted_price",
    "discount_price",
    "discount_routine_branch",
    "discount_routine_central",
    "discount_program_branch",
    "discount_program_central",
    "discount_extra",
    "hna",
    "total_price",
    "batch_number",
    "serial_number",
    "expired_date",
    "reference_type_id",
    "reference_id",
];

/// Priced quantities of one returned product line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ReturnLine {
    pub price: f64,
    pub qty: i64,
    pub qty_extra: i64,
    pub routine_pct: f64,
    pub program_pct: f64,
}

impl ReturnLine {
    pub(crate) fn hna(&self) -> f64 {
        self.price * self.qty as f64
    }

    /// Bonus units are returned at list price and taken off the total.
    pub(crate) fn discount_extra(&self) -> f64 {
        self.price * self.qty_extra as f64
    }

    /// Percentage discounts of one unit price.
    pub(crate) fn discount_value(&self) -> f64 {
        (self.routine_pct + self.program_pct) / 100.0 * self.price
    }

    pub(crate) fn total(&self) -> f64 {
        self.hna() - self.discount_extra() - self.discount_value()
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut items = InsertBatch::new("rel_return_invoice_stb", &ITEM_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut had_items: Memo<i64, bool> = Memo::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let (Some(return_number), Some(product_code)) = (row.cell(0), row.cell(1)) else {
            debug!(row = row_number, "skipping row without return number or product code");
            continue;
        };
        summary.rows_read += 1;

        let Some(return_id) = lookups.find(ctx, &INVOICE_RETURN_BY_NUMBER, &return_number)? else {
            warn!(row = row_number, return_number = %return_number, "return invoice not found");
            summary.skipped += 1;
            continue;
        };
        // Checked on first sight, before this run writes any item for it.
        let already_itemised = had_items
            .get_or_load(return_id, || {
                ctx.exists(
                    "error querying return items",
                    "SELECT 1 FROM rel_return_invoice_stb WHERE return_invoice_id = ?1 LIMIT 1",
                    [return_id],
                )
                .map(Some)
            })?
            .unwrap_or(true);
        if already_itemised {
            debug!(row = row_number, return_number = %return_number, "return already has items");
            summary.duplicates += 1;
            continue;
        }

        let Some(stb_id) = lookups.find(ctx, &STB_BY_NUMBER, &return_number)? else {
            warn!(row = row_number, return_number = %return_number, "return voucher not found");
            summary.skipped += 1;
            continue;
        };
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping row with unknown product");
            summary.skipped += 1;
            continue;
        };

        let line = ReturnLine {
            price: denorm_float(row.cell(7).as_deref()),
            qty: denorm_int(row.cell(2).as_deref()),
            qty_extra: denorm_int(row.cell(3).as_deref()),
            routine_pct: denorm_float(row.cell(8).as_deref()),
            program_pct: denorm_float(row.cell(9).as_deref()),
        };
        if line.qty <= 0 {
            debug!(row = row_number, product_code = %product_code, "skipping line without quantity");
            summary.skipped += 1;
            continue;
        }

        items.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                Value::Integer(return_id),
                Value::Integer(stb_id),
                Value::Integer(product_id),
                Value::Integer(1),
                Value::Integer(line.qty),
                Value::Integer(line.qty_extra),
                Value::Real(line.price),
                Value::Null,
                Value::Real(line.routine_pct),
                Value::Integer(0),
                Value::Real(line.program_pct),
                Value::Integer(0),
                Value::Real(line.discount_extra()),
                Value::Real(line.hna()),
                Value::Real(line.total()),
                text(row.text(4)),
                Value::Null,
                opt_text(parse_date(row.cell(6).as_deref())),
                Value::Integer(REFERENCE_TYPE_INVOICE),
                Value::Null,
            ],
        )?;
        summary.inserted += 1;
    }
    items.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}
