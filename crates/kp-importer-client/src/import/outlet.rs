use std::collections::HashSet;

use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, yes_flag};
use crate::import::context::{ImportContext, opt_int, text};
use crate::import::parse::denormalize_number;
use crate::import::resolve::{ColumnOptions, ColumnResolver};
use crate::import::{ImportOutcome, data_rows};

const OUTLET_COLUMNS: [&str; 27] = [
    "outlet_id",
    "outlet_name",
    "outlet_code",
    "outlet_pic",
    "outlet_status_id",
    "credit_limit",
    "top_lock",
    "top_value",
    "lock_discount",
    "lock_cash_discount",
    "minimum_invoice_value",
    "sipnap_code",
    "branch_id",
    "segment_internal_id",
    "npwp",
    "is_pkp",
    "pkp",
    "is_pbf",
    "pbf_code",
    "outlet_type_id",
    "show_npwp_print",
    "tax_document_type",
    "nik",
    "nitku",
    "outlet_note",
    "createdAt",
    "createdBy",
];

const HISTORY_COLUMNS: [&str; 28] = [
    "outlet_id",
    "outlet_name",
    "outlet_code",
    "outlet_pic",
    "outlet_status_id",
    "credit_limit",
    "top_lock",
    "top_value",
    "lock_discount",
    "lock_cash_discount",
    "minimum_invoice_value",
    "sipnap_code",
    "branch_id",
    "segment_internal_id",
    "npwp",
    "is_pkp",
    "pkp",
    "is_pbf",
    "pbf_code",
    "outlet_type_id",
    "show_npwp_print",
    "tax_document_type",
    "nik",
    "nitku",
    "outlet_note",
    "createdAt",
    "createdBy",
    "history_status_id",
];

const STATUS_ACTIVE: i64 = 2;
const STATUS_INACTIVE: i64 = 3;
const HISTORY_STATUS_CREATED: i64 = 2;

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut outlets = InsertBatch::new("list_outlet", &OUTLET_COLUMNS, ctx.batch_size);
    let mut history = InsertBatch::new("list_outlet_history", &HISTORY_COLUMNS, ctx.batch_size);
    let mut resolver = ColumnResolver::default();
    let mut seen_sipnap = HashSet::new();
    let mut duplicate_rows = Vec::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(outlet_id_text) = row.cell(0) else {
            continue;
        };
        summary.rows_read += 1;
        let Ok(outlet_id) = outlet_id_text.parse::<i64>() else {
            warn!(row = row_number, outlet_id = %outlet_id_text, "skipping row with invalid outlet_id");
            summary.skipped += 1;
            continue;
        };

        let sipnap_code = row.text(10);
        if !sipnap_code.is_empty() {
            let known = seen_sipnap.contains(&sipnap_code)
                || ctx.exists(
                    "db error checking duplicate",
                    "SELECT 1 FROM list_outlet WHERE sipnap_code = ?1 LIMIT 1",
                    [&sipnap_code],
                )?;
            if known {
                debug!(row = row_number, sipnap_code = %sipnap_code, "duplicate sipnap");
                duplicate_rows.push(row_number);
                summary.duplicates += 1;
                continue;
            }
            seen_sipnap.insert(sipnap_code.clone());
        }

        let branch_id = match row.cell(11) {
            Some(branch_name) => resolver.resolve(
                ctx,
                "branch_name",
                "list_branch",
                &branch_name,
                ColumnOptions::default(),
            )?,
            None => None,
        };
        let segment_id = match row.cell(12) {
            Some(segment) => resolver.resolve(
                ctx,
                "segment_name",
                "list_outlet_segment",
                &segment,
                ColumnOptions::default(),
            )?,
            None => None,
        };

        let values = outlet_values(ctx, row, outlet_id, sipnap_code, branch_id, segment_id);
        let mut history_values = values.clone();
        history_values.push(Value::Integer(HISTORY_STATUS_CREATED));

        outlets.push(values);
        history.push(history_values);
        if outlets.is_full() {
            outlets.flush(ctx.conn, &ctx.db_path)?;
            history.flush(ctx.conn, &ctx.db_path)?;
        }
        summary.inserted += 1;
    }

    outlets.flush(ctx.conn, &ctx.db_path)?;
    history.flush(ctx.conn, &ctx.db_path)?;

    let mut detail = format!(
        "Total {} rows inserted, {} duplicate rows skipped",
        summary.inserted, summary.duplicates
    );
    if !duplicate_rows.is_empty() {
        let listed = duplicate_rows
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        detail.push_str(&format!(" (duplicate sipnap at rows {listed})"));
    }
    Ok(ImportOutcome::new(summary, detail))
}

fn outlet_values(
    ctx: &ImportContext<'_>,
    row: &Row,
    outlet_id: i64,
    sipnap_code: String,
    branch_id: Option<i64>,
    segment_id: Option<i64>,
) -> Vec<Value> {
    let npwp = row.text(13);
    let pkp = row.text(14);
    let pbf_code = row.text(15);
    let outlet_type = match row.cell(16) {
        Some(label) if label.starts_with("01") => 1,
        _ => 2,
    };
    let status = match row.cell(20) {
        Some(label) if label.eq_ignore_ascii_case("AKTIF") => STATUS_ACTIVE,
        _ => STATUS_INACTIVE,
    };
    let tax_document_type = if npwp.is_empty() {
        "Dokumen dengan NIK"
    } else {
        "Dokumen dengan NPWP/NIK tervalidasi"
    };

    vec![
        Value::Integer(outlet_id),
        text(row.text(1)),
        text(row.text(2)),
        text(row.text(3)),
        Value::Integer(status),
        text(denormalize_number(row.cell(4).as_deref())),
        Value::Integer(yes_flag(row.cell(5).as_deref())),
        text(denormalize_number(row.cell(6).as_deref())),
        // discount lock is never imported as set
        Value::Integer(0),
        Value::Integer(yes_flag(row.cell(8).as_deref())),
        text(denormalize_number(row.cell(9).as_deref())),
        text(sipnap_code),
        opt_int(branch_id),
        opt_int(segment_id),
        text(npwp),
        Value::Integer(i64::from(!pkp.is_empty())),
        text(pkp),
        Value::Integer(i64::from(!pbf_code.is_empty())),
        text(pbf_code),
        Value::Integer(outlet_type),
        Value::Integer(1),
        text(tax_document_type),
        text(row.text(17)),
        text(row.text(18)),
        text(row.text(19)),
        text(ctx.now.clone()),
        Value::Integer(ctx.admin_id),
    ]
}
