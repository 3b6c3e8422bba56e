use rusqlite::params;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::cell::{Row, contains_ignore_case};
use crate::import::context::ImportContext;
use crate::import::parse::{denorm_float, parse_date};
use crate::import::resolve::{BRANCH_BY_NAME, DEPOSIT_BY_NUMBER, Lookups, Memo};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 8;

/// What a transfer row moves between branches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransferKind {
    Deposit,
    Outstanding,
}

impl TransferKind {
    pub(crate) fn from_label(label: &str) -> Option<Self> {
        if contains_ignore_case(label, "deposit") {
            Some(Self::Deposit)
        } else if contains_ignore_case(label, "outstanding") {
            Some(Self::Outstanding)
        } else {
            None
        }
    }
}

/// Header fields shared by both transfer documents.
#[derive(Debug)]
struct TransferRequest<'a> {
    source_id: i64,
    destination_id: i64,
    number: &'a str,
    note: &'a str,
    date: &'a str,
}

#[derive(Debug, Clone, Copy)]
struct InvoiceRef {
    id: i64,
    outlet_id: i64,
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut lookups = Lookups::default();
    let mut invoices: Memo<String, InvoiceRef> = Memo::default();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(transfer_number) = row.cell(0) else {
            debug!(row = row_number, "empty transfer number, stopping scan");
            break;
        };
        let (Some(document), Some(origin), Some(destination), Some(type_label)) =
            (row.cell(1), row.cell(2), row.cell(3), row.cell(7))
        else {
            debug!(row = row_number, "skipping incomplete transfer row");
            continue;
        };
        summary.rows_read += 1;

        let Some(source_id) = lookups.find(ctx, &BRANCH_BY_NAME, &origin)? else {
            warn!(row = row_number, branch = %origin, "origin branch not found");
            summary.skipped += 1;
            continue;
        };
        let Some(destination_id) = lookups.find(ctx, &BRANCH_BY_NAME, &destination)? else {
            warn!(row = row_number, branch = %destination, "destination branch not found");
            summary.skipped += 1;
            continue;
        };

        let date = parse_date(row.cell(5).as_deref()).unwrap_or_else(|| ctx.today.clone());
        let note = row.text(4);
        let request = TransferRequest {
            source_id,
            destination_id,
            number: &transfer_number,
            note: &note,
            date: &date,
        };

        match TransferKind::from_label(&type_label) {
            Some(TransferKind::Deposit) => {
                let Some(deposit_id) = lookups.find(ctx, &DEPOSIT_BY_NUMBER, &document)? else {
                    warn!(row = row_number, deposit = %document, "missing deposit");
                    summary.skipped += 1;
                    continue;
                };
                let transfer_id = insert_request(ctx, "list_deposit_transfer", &request)?;
                ctx.execute(
                    "error inserting deposit transfer transaction",
                    "INSERT INTO rel_deposit_transfer_transaction (deposit_transfer_id, deposit_id)
                     VALUES (?1, ?2)",
                    params![transfer_id, deposit_id],
                )?;
            }
            Some(TransferKind::Outstanding) => {
                let Some(invoice) = invoices.get_or_load(document.clone(), || {
                    ctx.query_opt(
                        "error querying invoice",
                        "SELECT sales_invoice_id, outlet_id FROM list_sales_invoice
                         WHERE sales_invoice_number = ?1 LIMIT 1",
                        [document.as_str()],
                        |row| {
                            Ok(InvoiceRef {
                                id: row.get(0)?,
                                outlet_id: row.get(1)?,
                            })
                        },
                    )
                })?
                else {
                    warn!(row = row_number, invoice = %document, "missing invoice");
                    summary.skipped += 1;
                    continue;
                };
                let transfer_id = insert_request(ctx, "list_outstanding_transfer", &request)?;
                ctx.execute(
                    "error inserting outstanding transfer transaction",
                    "INSERT INTO rel_outstanding_transfer_transaction (
                        outstanding_transfer_id, sales_invoice_id, outlet_id,
                        snapshot_amount, snapshot_settlement
                     ) VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        transfer_id,
                        invoice.id,
                        invoice.outlet_id,
                        denorm_float(row.cell(8).as_deref()),
                        denorm_float(row.cell(9).as_deref()),
                    ],
                )?;
            }
            None => {
                debug!(row = row_number, transfer_type = %type_label, "unknown transfer type");
                summary.skipped += 1;
                continue;
            }
        }
        summary.inserted += 1;
    }

    Ok(ImportOutcome::total(summary, "transfers"))
}

fn insert_request(
    ctx: &ImportContext<'_>,
    table: &'static str,
    request: &TransferRequest<'_>,
) -> ClientResult<i64> {
    ctx.insert(
        &format!("error inserting {table}"),
        &format!(
            "INSERT INTO {table} (
                branch_source_id, branch_destination_id, request_number,
                transfer_note, requestedAt, requestedBy
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
        ),
        params![
            request.source_id,
            request.destination_id,
            request.number,
            request.note,
            request.date,
            ctx.admin_id,
        ],
    )
}
