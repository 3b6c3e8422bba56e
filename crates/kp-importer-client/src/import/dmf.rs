use std::collections::HashMap;

use rusqlite::params;
use tracing::{debug, info, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::cell::Row;
use crate::import::context::ImportContext;
use crate::import::parse::parse_date;
use crate::import::resolve::{
    BRANCH_BY_CODE, COURIER_BY_NAME, Lookups, OUTLET_BY_CODE, SALES_INVOICE_BY_NUMBER,
};
use crate::import::{ImportOutcome, data_rows};

/// Sheet read when `--sheet` is not given.
pub(crate) const SHEET: &str = "Sheet1";

const MIN_WIDTH: usize = 17;
const TRACK_STATUS_OPEN: i64 = 1;

/// Delivery-and-document-flow step recorded by one tracking history.
pub(crate) fn track_type(label: Option<&str>) -> i64 {
    match label.map(str::to_lowercase).as_deref() {
        Some("pengiriman barang") => 1,
        Some("penerimaan faktur kembali") => 2,
        Some("penyerahan faktur ke piutang") => 3,
        Some("penerimaan faktur oleh piutang") => 4,
        _ => 0,
    }
}

pub(crate) fn track_status(label: Option<&str>) -> i64 {
    match label.map(str::to_lowercase).as_deref() {
        Some("dalam perjalanan") => 2,
        Some("diterima") => 3,
        Some("dibatalkan transaksinya") => 4,
        Some("penjadwalan ulang") => 5,
        _ => 1,
    }
}

/// Where the paper invoice is: warehouse, loper, receivables, or elsewhere.
pub(crate) fn invoice_position(label: Option<&str>) -> i64 {
    match label.map(str::to_lowercase).as_deref() {
        Some("gudang") => 1,
        Some("loper") => 2,
        Some("piutang") => 3,
        _ => 4,
    }
}

#[derive(Debug, Clone, Copy)]
struct TrackedInvoice {
    outlet_id: i64,
    invoice_id: i64,
    status: i64,
    position: i64,
}

#[derive(Debug)]
struct TrackGroup {
    track_type: i64,
    branch_id: i64,
    loper_id: Option<i64>,
    courier_id: Option<i64>,
    receipt_number: String,
    note: String,
    invoices: Vec<TrackedInvoice>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct GroupKey {
    date: Option<String>,
    track_type: i64,
    branch_id: i64,
    admin_id: i64,
}

/// Who carries the documents for a row.
enum Carrier {
    Loper(i64),
    Courier(i64),
    Nobody,
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut lookups = Lookups::default();
    let mut groups: Vec<TrackGroup> = Vec::new();
    let mut group_index: HashMap<GroupKey, usize> = HashMap::new();
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
        let Some(branch_code) = row.cell(3) else {
            debug!(row = row_number, "skipping row without branch code");
            continue;
        };
        summary.rows_read += 1;

        let Some(branch_id) = lookups.find(ctx, &BRANCH_BY_CODE, &branch_code)? else {
            warn!(row = row_number, branch_code = %branch_code, "skipping row with unknown branch");
            summary.skipped += 1;
            continue;
        };

        let carrier = match (row.cell(4), row.cell(5)) {
            (Some(loper), _) => match lookups.admin_or_create(ctx, &loper)? {
                Some(id) => Carrier::Loper(id),
                None => {
                    summary.skipped += 1;
                    continue;
                }
            },
            (None, Some(courier)) => match courier_or_create(ctx, &mut lookups, &courier, branch_id)? {
                Some(id) => Carrier::Courier(id),
                None => {
                    summary.skipped += 1;
                    continue;
                }
            },
            (None, None) => Carrier::Nobody,
        };

        let Some(invoice_number) = row.cell(7) else {
            debug!(row = row_number, "skipping row without invoice number");
            summary.skipped += 1;
            continue;
        };
        let Some(invoice_id) = lookups.find(ctx, &SALES_INVOICE_BY_NUMBER, &invoice_number)? else {
            warn!(row = row_number, invoice = %invoice_number, "missing invoice");
            summary.skipped += 1;
            continue;
        };
        let Some(outlet_code) = row.cell(8) else {
            debug!(row = row_number, "skipping row without outlet code");
            summary.skipped += 1;
            continue;
        };
        let Some(outlet_id) = lookups.find(ctx, &OUTLET_BY_CODE, &outlet_code)? else {
            warn!(row = row_number, outlet_code = %outlet_code, "skipping row with unknown outlet");
            summary.skipped += 1;
            continue;
        };

        let admin_id = match row.cell(11) {
            Some(name) => match lookups.admin_or_create(ctx, &name)? {
                Some(id) => id,
                None => {
                    summary.skipped += 1;
                    continue;
                }
            },
            None => 0,
        };

        let kind = track_type(row.cell(1).as_deref());
        let key = GroupKey {
            date: parse_date(Some(&date_cell)),
            track_type: kind,
            branch_id,
            admin_id,
        };
        let index = *group_index.entry(key).or_insert_with(|| {
            let (loper_id, courier_id) = match carrier {
                Carrier::Loper(id) => (Some(id), None),
                Carrier::Courier(id) => (None, Some(id)),
                Carrier::Nobody => (None, None),
            };
            groups.push(TrackGroup {
                track_type: kind,
                branch_id,
                loper_id,
                courier_id,
                receipt_number: row.text(6),
                note: row.text(2),
                invoices: Vec::new(),
            });
            groups.len() - 1
        });
        if let Some(group) = groups.get_mut(index) {
            group.invoices.push(TrackedInvoice {
                outlet_id,
                invoice_id,
                status: track_status(row.cell(9).as_deref()),
                position: invoice_position(row.cell(10).as_deref()),
            });
        }
    }

    for (number, group) in groups.iter().enumerate() {
        let track_number = format!("DMF-{}-{}-{}", group.branch_id, ctx.unique_suffix(), number + 1);
        let history_id = ctx.insert(
            "error inserting track history",
            "INSERT INTO list_sales_invoice_track_history
                (track_number, invoice_track_status_id, invoice_track_type_id, branch_id,
                 loper_id, courier_id, receipt_number, markedAt, markedBy, note)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                track_number,
                TRACK_STATUS_OPEN,
                group.track_type,
                group.branch_id,
                group.loper_id,
                group.courier_id,
                group.receipt_number,
                ctx.now,
                ctx.admin_id,
                group.note,
            ],
        )?;
        for invoice in &group.invoices {
            ctx.execute(
                "error inserting invoice track history",
                "INSERT INTO rel_track_history_invoice
                    (track_history_id, outlet_id, sales_invoice_id, track_status_id,
                     track_position_id, date_track, admin_track, track_used_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL)",
                params![
                    history_id,
                    invoice.outlet_id,
                    invoice.invoice_id,
                    invoice.status,
                    invoice.position,
                    ctx.today,
                    ctx.admin_id,
                ],
            )?;
            summary.inserted += 1;
        }
        debug!(track_number = %track_number, invoices = group.invoices.len(), "wrote tracking history");
    }

    Ok(ImportOutcome::total(summary, "rows"))
}

/// Finds a courier by name, registering it under `branch_id` on a miss.
///
/// A failed insert is logged and resolves to `None`.
fn courier_or_create(
    ctx: &ImportContext<'_>,
    lookups: &mut Lookups,
    name: &str,
    branch_id: i64,
) -> ClientResult<Option<i64>> {
    if let Some(id) = lookups.find(ctx, &COURIER_BY_NAME, name)? {
        return Ok(Some(id));
    }
    let created = ctx.conn.execute(
        "INSERT INTO list_courier (courier_name, branch_id, is_active, createdBy, createdAt)
         VALUES (?1, ?2, 1, ?3, ?4)",
        params![name, branch_id, ctx.admin_id, ctx.now],
    );
    match created {
        Ok(_) => {
            let id = ctx.conn.last_insert_rowid();
            info!(courier = name, branch_id, id, "created courier");
            lookups.remember(&COURIER_BY_NAME, name, id);
            Ok(Some(id))
        }
        Err(error) => {
            warn!(courier = name, error = %error, "failed to create courier");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{invoice_position, track_status, track_type};

    #[test]
    fn track_labels_are_case_insensitive() {
        assert_eq!(track_type(Some("Pengiriman Barang")), 1);
        assert_eq!(track_type(Some("PENERIMAAN FAKTUR OLEH PIUTANG")), 4);
        assert_eq!(track_type(None), 0);
        assert_eq!(track_status(Some("Diterima")), 3);
        assert_eq!(track_status(Some("tidak dikenal")), 1);
    }

    #[test]
    fn unknown_position_is_other() {
        assert_eq!(invoice_position(Some("Gudang")), 1);
        assert_eq!(invoice_position(Some("LOPER")), 2);
        assert_eq!(invoice_position(Some("Piutang")), 3);
        assert_eq!(invoice_position(Some("Outlet")), 4);
        assert_eq!(invoice_position(None), 4);
    }
}
