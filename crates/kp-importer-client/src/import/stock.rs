use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, info, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, yes_flag};
use crate::import::context::{ImportContext, LEGACY_CUTOVER, text};
use crate::import::parse::{denorm_int, parse_date};
use crate::import::resolve::{BRANCH_BY_CODE, Lookups, Memo, PRODUCT_BY_CODE};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 8;
const TX_TYPE_OPENING: i64 = 1;

const TX_COLUMNS: [&str; 8] = [
    "tx_date",
    "tx_type_id",
    "product_id",
    "warehouse_id",
    "is_consignment",
    "unit",
    "debit",
    "credit",
];
const REL_COLUMNS: [&str; 3] = ["tx_id", "batch_id", "qty"];

/// Batch link waiting for its `list_tx` row id.
#[derive(Debug, Clone, Copy)]
struct PendingLink {
    batch_id: i64,
    qty: i64,
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut movements = InsertBatch::new("list_tx", &TX_COLUMNS, ctx.batch_size);
    let mut links = InsertBatch::new("rel_tx_batch", &REL_COLUMNS, ctx.batch_size);
    let mut pending = Vec::new();
    let mut lookups = Lookups::default();
    let mut product_batches: Memo<(i64, String, Option<String>), i64> = Memo::default();
    let mut warehouses: Memo<(i64, String), i64> = Memo::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            continue;
        }
        let (Some(branch_code), Some(product_code)) = (row.cell(0), row.cell(2)) else {
            continue;
        };
        summary.rows_read += 1;

        let qty = denorm_int(row.cell(7).as_deref());
        if qty == 0 {
            debug!(row = row_number, product_code = %product_code, "skipping zero stock");
            summary.skipped += 1;
            continue;
        }

        let Some(branch_id) = lookups.find(ctx, &BRANCH_BY_CODE, &branch_code)? else {
            warn!(row = row_number, branch_code = %branch_code, "skipping row with unknown branch");
            summary.skipped += 1;
            continue;
        };
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping row with unknown product");
            summary.skipped += 1;
            continue;
        };

        let batch_number = row.text(4);
        let expired_date = parse_date(row.cell(5).as_deref());
        let batch_id = product_batches
            .get_or_load((product_id, batch_number.clone(), expired_date.clone()), || {
                product_batch(ctx, product_id, &batch_number, expired_date.as_deref()).map(Some)
            })?
            .unwrap_or_default();

        let warehouse_name = row.text(6);
        let warehouse_id = warehouses
            .get_or_load((branch_id, warehouse_name.clone()), || {
                warehouse(ctx, branch_id, &warehouse_name).map(Some)
            })?
            .unwrap_or_default();

        movements.push(vec![
            text(LEGACY_CUTOVER),
            Value::Integer(TX_TYPE_OPENING),
            Value::Integer(product_id),
            Value::Integer(warehouse_id),
            Value::Integer(yes_flag(row.cell(10).as_deref())),
            Value::Integer(1),
            Value::Integer(qty),
            Value::Integer(0),
        ]);
        pending.push(PendingLink { batch_id, qty });
        if movements.is_full() {
            flush_movements(ctx, &mut movements, &mut links, &mut pending)?;
        }
        summary.inserted += 1;
    }
    flush_movements(ctx, &mut movements, &mut links, &mut pending)?;

    let synced = ctx.execute(
        "update batch_number failed",
        "UPDATE list_tx
         SET batch_number = (
            SELECT lpb.batch_number
            FROM rel_tx_batch rtb
            JOIN list_product_batch lpb ON lpb.batch_id = rtb.batch_id
            WHERE rtb.tx_id = list_tx.tx_id
            LIMIT 1
         )
         WHERE tx_id IN (SELECT tx_id FROM rel_tx_batch)",
        [],
    )?;
    debug!(rows = synced, "synced batch numbers");

    Ok(ImportOutcome::total(summary, "rows"))
}

/// Writes pending movements, then links each new row id to its product batch.
fn flush_movements(
    ctx: &ImportContext<'_>,
    movements: &mut InsertBatch,
    links: &mut InsertBatch,
    pending: &mut Vec<PendingLink>,
) -> ClientResult<()> {
    if let Some(ids) = movements.flush(ctx.conn, &ctx.db_path)? {
        for (index, link) in pending.drain(..).enumerate() {
            links.push(vec![
                Value::Integer(ids.nth(index)),
                Value::Integer(link.batch_id),
                Value::Integer(link.qty),
            ]);
        }
        links.flush(ctx.conn, &ctx.db_path)?;
    }
    Ok(())
}

fn product_batch(
    ctx: &ImportContext<'_>,
    product_id: i64,
    batch_number: &str,
    expired_date: Option<&str>,
) -> ClientResult<i64> {
    let existing = ctx.query_id(
        "error querying product batch",
        "SELECT batch_id FROM list_product_batch
         WHERE product_id = ?1 AND batch_number = ?2 AND expired_date IS ?3
         LIMIT 1",
        params![product_id, batch_number, expired_date],
    )?;
    if let Some(id) = existing {
        return Ok(id);
    }
    ctx.insert(
        "error inserting product batch",
        "INSERT INTO list_product_batch (product_id, batch_number, expired_date, createdAt, createdBy)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![product_id, batch_number, expired_date, ctx.now, ctx.admin_id],
    )
}

fn warehouse(ctx: &ImportContext<'_>, branch_id: i64, name: &str) -> ClientResult<i64> {
    let existing = ctx.query_id(
        "error querying warehouse",
        "SELECT warehouse_id FROM list_warehouse
         WHERE warehouse_name LIKE ?1 AND branch_id = ?2
         ORDER BY warehouse_id ASC LIMIT 1",
        params![format!("%{name}%"), branch_id],
    )?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = ctx.insert(
        "error inserting new warehouse",
        "INSERT INTO list_warehouse
            (warehouse_name, warehouse_type_id, warehouse_status_id, branch_id, createdAt, createdBy)
         VALUES (?1, 1, 2, ?2, ?3, ?4)",
        params![name, branch_id, ctx.now, ctx.admin_id],
    )?;
    info!(warehouse = name, branch_id, id, "created warehouse");
    Ok(id)
}
