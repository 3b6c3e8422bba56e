use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::Row;
use crate::import::context::{ImportContext, opt_int, opt_text, text};
use crate::import::intransit::SKB_TYPE_CENTRAL_TRANSFER;
use crate::import::parse::{denorm_float, denorm_int, parse_date};
use crate::import::resolve::{Lookups, Memo, PRODUCT_BY_CODE};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 7;
const REFERENCE_TYPE_TRANSFER: i64 = 2;

const ITEM_COLUMNS: [&str; 10] = [
    "skb_id",
    "product_id",
    "unit",
    "qty",
    "quoted_price",
    "batch_number",
    "expired_date",
    "reference_type_id",
    "reference_id",
    "is_extra",
];

#[derive(Debug, Clone, Copy)]
struct Voucher {
    id: i64,
    type_id: i64,
}

/// Central transfers reference their transfer document; other SKB types have
/// no reference.
pub(crate) fn reference_type(skb_type: i64) -> Option<i64> {
    (skb_type == SKB_TYPE_CENTRAL_TRANSFER).then_some(REFERENCE_TYPE_TRANSFER)
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut items = InsertBatch::new("rel_skb_item", &ITEM_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut vouchers: Memo<String, Voucher> = Memo::default();
    let mut had_items: Memo<i64, bool> = Memo::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let (Some(skb_number), Some(product_code)) = (row.cell(0), row.cell(1)) else {
            debug!(row = row_number, "skipping row without SKB number or product code");
            continue;
        };
        summary.rows_read += 1;

        let Some(voucher) = vouchers.get_or_load(skb_number.clone(), || {
            ctx.query_opt(
                "error querying skb",
                "SELECT skb_id, skb_type_id FROM list_skb WHERE skb_number = ?1 LIMIT 1",
                [skb_number.as_str()],
                |row| {
                    Ok(Voucher {
                        id: row.get(0)?,
                        type_id: row.get::<_, Option<i64>>(1)?.unwrap_or_default(),
                    })
                },
            )
        })?
        else {
            warn!(row = row_number, skb = %skb_number, "SKB not found");
            summary.skipped += 1;
            continue;
        };
        // Checked on first sight, before this run writes any item for it.
        let already_itemised = had_items
            .get_or_load(voucher.id, || {
                ctx.exists(
                    "error querying skb items",
                    "SELECT 1 FROM rel_skb_item WHERE skb_id = ?1 LIMIT 1",
                    [voucher.id],
                )
                .map(Some)
            })?
            .unwrap_or(true);
        if already_itemised {
            debug!(row = row_number, skb = %skb_number, "SKB already has items");
            summary.duplicates += 1;
            continue;
        }

        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping row with unknown product");
            summary.skipped += 1;
            continue;
        };

        let qty = denorm_int(row.cell(3).as_deref());
        let qty_extra = denorm_int(row.cell(4).as_deref());
        let price = denorm_float(row.cell(5).as_deref());
        let batch_number = row.text(6);
        let expired_date = parse_date(row.cell(9).as_deref());
        let reference = reference_type(voucher.type_id);

        for (quantity, is_extra) in [(qty, 0), (qty_extra, 1)] {
            if quantity <= 0 {
                continue;
            }
            items.push(vec![
                Value::Integer(voucher.id),
                Value::Integer(product_id),
                Value::Integer(1),
                Value::Integer(quantity),
                Value::Real(price),
                text(batch_number.as_str()),
                opt_text(expired_date.clone()),
                opt_int(reference),
                Value::Null,
                Value::Integer(is_extra),
            ]);
            summary.inserted += 1;
        }
        if items.is_full() {
            items.flush(ctx.conn, &ctx.db_path)?;
        }
    }
    items.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "items"))
}

#[cfg(test)]
mod tests {
    use super::reference_type;

    #[test]
    fn only_central_transfers_carry_a_reference_type() {
        assert_eq!(reference_type(3), Some(2));
        assert_eq!(reference_type(10), None);
        assert_eq!(reference_type(2), None);
    }
}
