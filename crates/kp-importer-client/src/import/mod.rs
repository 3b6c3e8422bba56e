pub(crate) mod activity;
pub(crate) mod batch;
pub(crate) mod cell;
pub(crate) mod context;
pub(crate) mod parse;
pub(crate) mod resolve;

mod balance;
mod deposit;
mod dmf;
mod giro;
mod intransit;
mod intransit_item;
mod invoice;
mod invoice_fee;
mod invoice_item;
mod invoice_return;
mod invoice_return_item;
mod outlet;
mod product;
mod settlement;
mod stock;
mod transfer;

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::TransactionBehavior;
use tracing::{info, warn};

use crate::ClientResult;
use crate::contracts::types::{ImportKind, ImportReport, ImportSummary};
use crate::import::cell::Row;
use crate::import::context::ImportContext;
use crate::state::{map_sqlite_error, open_connection};
use crate::workbook::Workbook;

/// Settings for one importer invocation.
#[derive(Debug, Clone)]
pub(crate) struct ImportJob {
    pub kind: ImportKind,
    pub file: PathBuf,
    pub db_path: PathBuf,
    pub admin_id: i64,
    pub batch_size: usize,
    pub sheet: Option<String>,
    pub log_id: Option<String>,
}

/// What an importer reports back before the transaction commits.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImportOutcome {
    pub summary: ImportSummary,
    pub detail: String,
}

impl ImportOutcome {
    pub(crate) fn new(summary: ImportSummary, detail: String) -> Self {
        Self { summary, detail }
    }

    /// `Total N <noun> inserted`, the detail most importers report.
    pub(crate) fn total(summary: ImportSummary, noun: &str) -> Self {
        let detail = format!("Total {} {noun} inserted", summary.inserted);
        Self { summary, detail }
    }
}

/// Runs one importer inside a single immediate transaction.
///
/// Any error returned before the commit drops the transaction, which rolls
/// back every write of the run.
pub(crate) fn execute(job: &ImportJob) -> ClientResult<ImportReport> {
    let started = Instant::now();
    let mut workbook = Workbook::open(&job.file)?;
    let mut connection = open_connection(&job.db_path)?;
    let transaction = connection
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|error| map_sqlite_error(&job.db_path, &error).context("db begin error"))?;

    let (outcome, message_detail) = {
        let ctx = ImportContext::new(&transaction, &job.db_path, job.admin_id, job.batch_size);
        let outcome = dispatch(job, &ctx, &mut workbook)?;
        let message_detail = format!(
            "{}. Execution Time: {:.4}s",
            outcome.detail,
            started.elapsed().as_secs_f64()
        );
        if let Some(log_id) = job.log_id.as_deref() {
            let (label, link) = job.kind.activity();
            if let Err(error) =
                activity::update_activity(&ctx, log_id, label, link, &outcome.summary, &message_detail)
            {
                warn!(log_id, error = %error, "activity log update failed");
            }
        }
        (outcome, message_detail)
    };

    transaction
        .commit()
        .map_err(|error| map_sqlite_error(&job.db_path, &error).context("db commit error"))?;

    info!(
        command = job.kind.command(),
        rows_read = outcome.summary.rows_read,
        inserted = outcome.summary.inserted,
        skipped = outcome.summary.skipped,
        duplicates = outcome.summary.duplicates,
        elapsed_secs = started.elapsed().as_secs_f64(),
        "import complete"
    );

    Ok(ImportReport {
        command: job.kind.command().to_string(),
        message: job.kind.success_message().to_string(),
        message_detail,
        summary: outcome.summary,
    })
}

fn dispatch(
    job: &ImportJob,
    ctx: &ImportContext<'_>,
    workbook: &mut Workbook,
) -> ClientResult<ImportOutcome> {
    let sheet = job.sheet.as_deref();
    match job.kind {
        ImportKind::Product => product::run(ctx, workbook),
        ImportKind::Dmf => dmf::run(ctx, &read_sheet(workbook, sheet.or(Some(dmf::SHEET)))?),
        ImportKind::Outlet => outlet::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Stock => stock::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Invoice | ImportKind::InvoiceOutstanding => {
            invoice::run(ctx, &read_sheet(workbook, sheet)?)
        }
        ImportKind::InvoiceProduct
        | ImportKind::InvoiceOutstandingProduct
        | ImportKind::InvoiceProductMissing => invoice_item::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::InvoiceFee => invoice_fee::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::InvoiceReturn => invoice_return::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::InvoiceReturnProduct => {
            invoice_return_item::run(ctx, &read_sheet(workbook, sheet)?)
        }
        ImportKind::Deposit => deposit::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Giro => giro::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Settlement => settlement::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Intransit => intransit::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::IntransitProduct => intransit_item::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Transfer => transfer::run(ctx, &read_sheet(workbook, sheet)?),
        ImportKind::Balance => balance::run(ctx, &read_sheet(workbook, sheet)?),
    }
}

/// Reads the requested sheet, or the first sheet when none is named.
fn read_sheet(workbook: &mut Workbook, sheet: Option<&str>) -> ClientResult<Vec<Row>> {
    let name = match sheet {
        Some(name) => name.to_string(),
        None => workbook.first_sheet_name()?,
    };
    workbook.rows(&name)
}

/// Data rows after the header rows, paired with their 1-based sheet row number.
pub(crate) fn data_rows(rows: &[Row], header_rows: usize) -> impl Iterator<Item = (usize, &Row)> {
    rows.iter()
        .enumerate()
        .skip(header_rows)
        .map(|(index, row)| (index + 1, row))
}

pub(crate) fn resolve_file(kind: ImportKind, file: Option<&Path>) -> PathBuf {
    file.map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(kind.default_file()))
}
