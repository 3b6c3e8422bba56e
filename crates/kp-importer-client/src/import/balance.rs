use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::Row;
use crate::import::context::{ImportContext, opt_int, text};
use crate::import::parse::{denorm_float, parse_date};
use crate::import::resolve::{
    ACCOUNT_TYPE_BY_NAME, BANK_ACCOUNT_BY_NUMBER, BRANCH_BY_CODE, Lookups, PRINCIPAL_BY_CODE,
};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 6;

const LEDGER_COLUMNS: [&str; 13] = [
    "ledger_date",
    "ledger_number",
    "branch_id",
    "principal_id",
    "account_type_id",
    "bank_account_id",
    "debit",
    "note",
    "createdAt",
    "createdBy",
    "is_verified",
    "group_id",
    "snapshot_start_balance",
];

/// Maps legacy account type labels onto the names stored in `list_account_type`.
pub(crate) fn account_type_name(label: &str) -> &str {
    match label {
        "Bank Kas Besar" => "Bank Besar",
        "Bank Kas Kecil" => "Bank Kecil",
        other => other,
    }
}

pub(crate) fn ledger_number(unix_seconds: i64, group: usize) -> String {
    format!("LEDGER-{unix_seconds}-{group}")
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut ledger = InsertBatch::new("list_cash_ledger", &LEDGER_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut group = 0usize;
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        let Some(date_cell) = row.cell(0) else {
            debug!(row = row_number, "skipping row without ledger date");
            continue;
        };
        let (Some(branch_code), Some(account_label)) = (row.cell(1), row.cell(3)) else {
            debug!(row = row_number, "skipping row without branch or account type");
            continue;
        };
        summary.rows_read += 1;
        // Every complete row opens a group, even one skipped below.
        group += 1;

        let Some(branch_id) = lookups.find(ctx, &BRANCH_BY_CODE, &branch_code)? else {
            warn!(row = row_number, branch_code = %branch_code, "skipping row with unknown branch");
            summary.skipped += 1;
            continue;
        };
        let principal_id = match row.cell(2) {
            Some(code) => {
                let found = lookups.find(ctx, &PRINCIPAL_BY_CODE, &code)?;
                if found.is_none() {
                    debug!(row = row_number, principal_code = %code, "principal not found, storing NULL");
                }
                found
            }
            None => None,
        };
        let account_type = account_type_name(&account_label);
        let Some(account_type_id) = lookups.find(ctx, &ACCOUNT_TYPE_BY_NAME, account_type)? else {
            warn!(row = row_number, account_type, "skipping row with unknown account type");
            summary.skipped += 1;
            continue;
        };
        let bank_account_id = match row.cell(4) {
            Some(number) => {
                let Some(id) = lookups.find(ctx, &BANK_ACCOUNT_BY_NUMBER, &number)? else {
                    warn!(row = row_number, account_number = %number, "skipping row with unknown bank account");
                    summary.skipped += 1;
                    continue;
                };
                Some(id)
            }
            None => None,
        };

        let ledger_date = parse_date(Some(&date_cell)).unwrap_or_else(|| ctx.today.clone());
        let balance = denorm_float(row.cell(5).as_deref());
        ledger.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                text(ledger_date),
                text(ledger_number(ctx.unix_seconds, group)),
                Value::Integer(branch_id),
                opt_int(principal_id),
                Value::Integer(account_type_id),
                opt_int(bank_account_id),
                Value::Real(balance),
                text(row.text(6)),
                text(ctx.now.as_str()),
                Value::Integer(ctx.admin_id),
                Value::Integer(1),
                Value::Integer(i64::try_from(group).unwrap_or(i64::MAX)),
                Value::Real(balance),
            ],
        )?;
        summary.inserted += 1;
    }
    ledger.flush(ctx.conn, &ctx.db_path)?;

    Ok(ImportOutcome::total(summary, "ledger entries"))
}
