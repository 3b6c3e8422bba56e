use std::collections::HashSet;

use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, contains_ignore_case};
use crate::import::context::{ImportContext, text};
use crate::import::parse::parse_date;
use crate::import::resolve::{BRANCH_BY_NAME, Lookups, Memo, SKB_BY_NUMBER};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 6;
const SKB_STATUS_INTRANSIT: i64 = 3;
const PARTY_TYPE_BRANCH: i64 = 1;

/// SKB type for central transfers and returns to the central warehouse.
pub(crate) const SKB_TYPE_CENTRAL_TRANSFER: i64 = 3;
const SKB_TYPE_REGULAR_RETURN: i64 = 10;
const SKB_TYPE_DAMAGED_RETURN: i64 = 2;

const SKB_COLUMNS: [&str; 16] = [
    "skb_number",
    "skb_date",
    "skb_status_id",
    "skb_type_id",
    "issuer_warehouse_id",
    "issuer_type_id",
    "issuer_id",
    "issuer",
    "destination_type_id",
    "destination_id",
    "destination",
    "skb_note",
    "is_complete",
    "createdAt",
    "createdBy",
    "division_id",
];

pub(crate) fn skb_type(label: Option<&str>) -> i64 {
    match label {
        Some(label) if contains_ignore_case(label, "mutasi pusat cabang") => {
            SKB_TYPE_CENTRAL_TRANSFER
        }
        Some(label) if contains_ignore_case(label, "retur barang reguler") => {
            SKB_TYPE_REGULAR_RETURN
        }
        Some(label) if contains_ignore_case(label, "retur barang rusak") => SKB_TYPE_DAMAGED_RETURN,
        _ => SKB_TYPE_CENTRAL_TRANSFER,
    }
}

/// Damaged-goods warehouses are type 2; everything else ships from type 1.
pub(crate) fn issuer_warehouse_type(label: Option<&str>) -> i64 {
    match label {
        Some(label)
            if !contains_ignore_case(label, "gudang aktif")
                && !contains_ignore_case(label, "reguler")
                && contains_ignore_case(label, "gudang barang rusak") =>
        {
            2
        }
        _ => 1,
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut vouchers = InsertBatch::new("list_skb", &SKB_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut warehouses: Memo<(i64, i64), i64> = Memo::default();
    let mut seen = HashSet::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(skb_number) = row.cell(0) else {
            debug!(row = row_number, "skipping row without SKB number");
            continue;
        };
        summary.rows_read += 1;

        if seen.contains(&skb_number)
            || lookups.find(ctx, &SKB_BY_NUMBER, &skb_number)?.is_some()
        {
            debug!(row = row_number, skb = %skb_number, "SKB already exists");
            summary.duplicates += 1;
            continue;
        }

        let Some(issuer_name) = row.cell(4) else {
            warn!(row = row_number, "skipping SKB without issuer");
            summary.skipped += 1;
            continue;
        };
        let Some(issuer) = lookups.find_named(ctx, &BRANCH_BY_NAME, "branch_name", &issuer_name)?
        else {
            warn!(row = row_number, branch = %issuer_name, "issuer branch not found");
            summary.skipped += 1;
            continue;
        };
        let Some(destination_name) = row.cell(5) else {
            warn!(row = row_number, "skipping SKB without destination");
            summary.skipped += 1;
            continue;
        };
        let Some(destination) =
            lookups.find_named(ctx, &BRANCH_BY_NAME, "branch_name", &destination_name)?
        else {
            warn!(row = row_number, branch = %destination_name, "destination branch not found");
            summary.skipped += 1;
            continue;
        };

        let warehouse_type = issuer_warehouse_type(row.cell(3).as_deref());
        let Some(warehouse_id) = warehouses.get_or_load((issuer.id, warehouse_type), || {
            ctx.query_id(
                "error querying warehouse",
                "SELECT warehouse_id FROM list_warehouse
                 WHERE branch_id = ?1 AND warehouse_type_id = ?2
                 ORDER BY warehouse_id ASC LIMIT 1",
                params![issuer.id, warehouse_type],
            )
        })?
        else {
            warn!(row = row_number, branch = %issuer.name, warehouse_type, "issuer warehouse not found");
            summary.skipped += 1;
            continue;
        };

        let skb_date = parse_date(row.cell(1).as_deref()).unwrap_or_else(|| ctx.today.clone());
        let division = if row.cell(7).as_deref() == Some("Hoslab") { 2 } else { 1 };
        vouchers.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                text(skb_number.as_str()),
                text(skb_date),
                Value::Integer(SKB_STATUS_INTRANSIT),
                Value::Integer(skb_type(row.cell(2).as_deref())),
                Value::Integer(warehouse_id),
                Value::Integer(PARTY_TYPE_BRANCH),
                Value::Integer(issuer.id),
                text(issuer.name.as_str()),
                Value::Integer(PARTY_TYPE_BRANCH),
                Value::Integer(destination.id),
                text(destination.name.as_str()),
                text(row.text(6)),
                Value::Integer(1),
                text(ctx.now.as_str()),
                Value::Integer(ctx.admin_id),
                Value::Integer(division),
            ],
        )?;
        seen.insert(skb_number);
        summary.inserted += 1;
    }
    vouchers.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "rows"))
}

#[cfg(test)]
mod tests {
    use super::{issuer_warehouse_type, skb_type};

    #[test]
    fn type_label_selects_skb_type() {
        assert_eq!(skb_type(Some("Mutasi Pusat Cabang")), 3);
        assert_eq!(skb_type(Some("Retur Barang Reguler ke Pusat")), 10);
        assert_eq!(skb_type(Some("RETUR BARANG RUSAK")), 2);
        assert_eq!(skb_type(None), 3);
    }

    #[test]
    fn only_damaged_goods_warehouse_is_type_two() {
        assert_eq!(issuer_warehouse_type(Some("Gudang Barang Rusak")), 2);
        assert_eq!(issuer_warehouse_type(Some("Gudang Aktif")), 1);
        assert_eq!(issuer_warehouse_type(None), 1);
    }
}
