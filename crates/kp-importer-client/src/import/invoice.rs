//! Legacy sales invoices: one sales order, one invoice and one outbound SKB
//! per row, all stamped with the cutover date.

use std::collections::HashSet;

use rusqlite::params;
use rusqlite::types::Value;
use tracing::{debug, info, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, title_case, yes_flag};
use crate::import::context::{ImportContext, LEGACY_CUTOVER, opt_int, text};
use crate::import::parse::{denormalize_number, parse_excel_date};
use crate::import::resolve::{
    BRANCH_BY_CODE, INVOICE_RETURN_BY_NUMBER, Lookups, Memo, OUTLET_BY_CODE, PRINCIPAL_BY_NAME,
    SALES_INVOICE_BY_NUMBER, SALES_SOURCE_BY_NAME,
};
use crate::import::{ImportOutcome, data_rows};

const ORDER_STATUS_DONE: i64 = 3;
const INVOICE_STATUS_DONE: i64 = 3;
const SKB_STATUS_DONE: i64 = 4;
const DEFAULT_PPN: i64 = 11;
const REGION_PURPOSE_SALES: i64 = 1;

const ORDER_COLUMNS: [&str; 22] = [
    "outlet_id",
    "division_id",
    "branch_id",
    "branch_billing_id",
    "sales_date",
    "sales_number",
    "sales_order_status_id",
    "payment_method",
    "sales_source_id",
    "sales_type_id",
    "salesman_id",
    "region_id",
    "principal_id",
    "stamp_duty",
    "is_ecatalogue",
    "term_days",
    "amount",
    "ppn",
    "cash_discount",
    "createdAt",
    "createdBy",
    "is_legacy",
];
const INVOICE_COLUMNS: [&str; 25] = [
    "outlet_id",
    "division_id",
    "branch_id",
    "branch_billing_id",
    "sales_invoice_date",
    "sales_invoice_number",
    "internal_note",
    "sales_invoice_status_id",
    "payment_method",
    "sales_source_id",
    "sales_invoice_type_id",
    "salesman_id",
    "region_id",
    "principal_id",
    "stamp_duty",
    "is_ecatalogue",
    "is_b2b",
    "term_days",
    "amount",
    "ppn",
    "cash_discount",
    "is_return_invoice",
    "createdAt",
    "createdBy",
    "is_legacy",
];
const SKB_COLUMNS: [&str; 19] = [
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
    "is_complete",
    "createdAt",
    "createdBy",
    "division_id",
    "approvedAt",
    "approvedBy",
    "pharmacist_verified_by",
    "pharmacist_verified_at",
];

/// Sales channel of an invoice and the SKB type its goods leave under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SalesType {
    Regular,
    Consignment,
    Tender,
}

impl SalesType {
    pub(crate) fn from_label(label: &str) -> Self {
        if label.eq_ignore_ascii_case("reguler") || label == "1" {
            Self::Regular
        } else if label.eq_ignore_ascii_case("konsinyasi") || label == "2" {
            Self::Consignment
        } else {
            Self::Tender
        }
    }

    pub(crate) fn id(self) -> i64 {
        match self {
            Self::Regular => 1,
            Self::Consignment => 2,
            Self::Tender => 3,
        }
    }

    pub(crate) fn skb_type(self) -> i64 {
        match self {
            Self::Regular => 6,
            Self::Consignment => 5,
            Self::Tender => 11,
        }
    }
}

/// `Pharmacy` is 1, `Hoslab` 2, anything else 3.
pub(crate) fn division_id(label: Option<&str>) -> i64 {
    match label {
        Some(division) if division.eq_ignore_ascii_case("Pharmacy") => 1,
        Some(division) if division.eq_ignore_ascii_case("Hoslab") => 2,
        _ => 3,
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut orders = InsertBatch::new("list_sales_order", &ORDER_COLUMNS, ctx.batch_size);
    let mut invoices = InsertBatch::new("list_sales_invoice", &INVOICE_COLUMNS, ctx.batch_size);
    let mut skbs = InsertBatch::new("list_skb", &SKB_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut regions: Memo<(String, i64), i64> = Memo::default();
    let mut issuer_warehouses: Memo<i64, i64> = Memo::default();
    let mut seen_invoices = HashSet::new();
    let mut return_links = Vec::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(raw_date) = row.cell(0) else {
            continue;
        };
        let Some(invoice_number) = row.cell(1) else {
            continue;
        };
        if invoice_number == "Freetext" {
            continue;
        }
        summary.rows_read += 1;

        if seen_invoices.contains(&invoice_number)
            || lookups.find(ctx, &SALES_INVOICE_BY_NUMBER, &invoice_number)?.is_some()
        {
            debug!(row = row_number, invoice = %invoice_number, "invoice already present");
            summary.duplicates += 1;
            continue;
        }

        let Some(branch_code) = row.cell(3) else {
            warn!(row = row_number, "skipping row without branch code");
            summary.skipped += 1;
            continue;
        };
        let Some(branch) = lookups.find_named(ctx, &BRANCH_BY_CODE, "branch_name", &branch_code)? else {
            warn!(row = row_number, branch_code = %branch_code, "skipping row with unknown branch");
            summary.skipped += 1;
            continue;
        };
        let Some(outlet_code) = row.cell(4) else {
            warn!(row = row_number, "skipping row without outlet code");
            summary.skipped += 1;
            continue;
        };
        let Some(outlet) = lookups.find_named(ctx, &OUTLET_BY_CODE, "outlet_name", &outlet_code)? else {
            warn!(row = row_number, outlet_code = %outlet_code, "skipping row with unknown outlet");
            summary.skipped += 1;
            continue;
        };

        let division = division_id(row.cell(5).as_deref());
        let principal_id = match row.cell(6) {
            Some(principal) => lookups.find(ctx, &PRINCIPAL_BY_NAME, &principal)?,
            None => None,
        };
        let payment_method = row
            .cell(7)
            .map(|method| title_case(&method.to_lowercase()))
            .unwrap_or_default();

        let Some(source) = row.cell(8) else {
            warn!(row = row_number, "skipping row without sales source");
            summary.skipped += 1;
            continue;
        };
        let Some(source_id) = lookups.find(ctx, &SALES_SOURCE_BY_NAME, &source.to_lowercase())? else {
            warn!(row = row_number, source = %source, "skipping row with unknown sales source");
            summary.skipped += 1;
            continue;
        };

        let Some(region_code) = row.cell(9) else {
            warn!(row = row_number, "skipping row without region");
            summary.skipped += 1;
            continue;
        };
        let region_id = regions
            .get_or_load((region_code.clone(), branch.id), || {
                sales_region(ctx, &region_code, branch.id).map(Some)
            })?
            .unwrap_or_default();

        let salesman_id = match row.cell(10) {
            Some(name) => lookups.admin_or_create(ctx, &name)?.unwrap_or(ctx.admin_id),
            None => ctx.admin_id,
        };

        let stamp_duty = yes_flag(row.cell(11).as_deref());
        let amount = denormalize_number(row.cell(12).as_deref());
        let discount = match row.cell(14) {
            Some(value) if value != "-" => value,
            _ => "0".to_string(),
        };
        let sales_type = SalesType::from_label(&row.text(15));

        if let Some(return_number) = row.cell(16)
            && let Some(return_id) = lookups.find(ctx, &INVOICE_RETURN_BY_NUMBER, &return_number)?
        {
            return_links.push((invoice_number.clone(), return_id));
        }

        let issuer_warehouse_id = issuer_warehouses
            .get_or_load(branch.id, || issuer_warehouse(ctx, branch.id).map(Some))?
            .unwrap_or_default();

        let invoice_date = parse_excel_date(&raw_date);
        seen_invoices.insert(invoice_number.clone());

        orders.push(vec![
            Value::Integer(outlet.id),
            Value::Integer(division),
            Value::Integer(branch.id),
            Value::Integer(branch.id),
            text(invoice_date.clone()),
            text(invoice_number.clone()),
            Value::Integer(ORDER_STATUS_DONE),
            text(payment_method.clone()),
            Value::Integer(source_id),
            Value::Integer(sales_type.id()),
            Value::Integer(salesman_id),
            Value::Integer(region_id),
            opt_int(principal_id),
            Value::Integer(stamp_duty),
            Value::Integer(0),
            Value::Integer(0),
            text(amount.clone()),
            Value::Integer(DEFAULT_PPN),
            text(discount.clone()),
            text(LEGACY_CUTOVER),
            Value::Integer(ctx.admin_id),
            Value::Integer(1),
        ]);
        invoices.push(vec![
            Value::Integer(outlet.id),
            Value::Integer(division),
            Value::Integer(branch.id),
            Value::Integer(branch.id),
            text(invoice_date.clone()),
            text(invoice_number.clone()),
            text(row.text(2)),
            Value::Integer(INVOICE_STATUS_DONE),
            text(payment_method),
            Value::Integer(source_id),
            Value::Integer(sales_type.id()),
            Value::Integer(salesman_id),
            Value::Integer(region_id),
            opt_int(principal_id),
            Value::Integer(stamp_duty),
            Value::Integer(0),
            Value::Integer(i64::from(principal_id.is_some())),
            Value::Integer(0),
            text(amount),
            Value::Integer(DEFAULT_PPN),
            text(discount),
            Value::Integer(0),
            text(LEGACY_CUTOVER),
            Value::Integer(ctx.admin_id),
            Value::Integer(1),
        ]);
        skbs.push(vec![
            text(invoice_number),
            text(invoice_date),
            Value::Integer(SKB_STATUS_DONE),
            Value::Integer(sales_type.skb_type()),
            Value::Integer(issuer_warehouse_id),
            Value::Integer(1),
            Value::Integer(branch.id),
            text(branch.name),
            Value::Integer(3),
            Value::Integer(outlet.id),
            text(outlet.name),
            Value::Integer(1),
            text(LEGACY_CUTOVER),
            Value::Integer(ctx.admin_id),
            Value::Integer(division),
            text(LEGACY_CUTOVER),
            Value::Integer(ctx.admin_id),
            Value::Integer(ctx.admin_id),
            text(LEGACY_CUTOVER),
        ]);
        summary.inserted += 1;

        if orders.is_full() {
            orders.flush(ctx.conn, &ctx.db_path)?;
            invoices.flush(ctx.conn, &ctx.db_path)?;
            skbs.flush(ctx.conn, &ctx.db_path)?;
        }
    }
    orders.flush(ctx.conn, &ctx.db_path)?;
    invoices.flush(ctx.conn, &ctx.db_path)?;
    skbs.flush(ctx.conn, &ctx.db_path)?;

    link_return_invoices(ctx, &return_links)?;
    Ok(ImportOutcome::total(summary, "rows"))
}

/// Region with the sales purpose for `code` in the branch, created on a miss.
fn sales_region(ctx: &ImportContext<'_>, code: &str, branch_id: i64) -> ClientResult<i64> {
    let existing = ctx.query_id(
        "db error querying region",
        "SELECT region_id FROM list_region
         WHERE region_code = ?1 AND branch_id = ?2 AND region_purpose_id = ?3
         ORDER BY region_id ASC LIMIT 1",
        params![code, branch_id, REGION_PURPOSE_SALES],
    )?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = ctx.insert(
        "error inserting region",
        "INSERT INTO list_region
            (region_name, region_code, branch_id, region_type_id, region_status_id, region_purpose_id, createdAt, createdBy)
         VALUES (?1, ?1, ?2, 1, 2, ?3, ?4, ?5)",
        params![code, branch_id, REGION_PURPOSE_SALES, ctx.now, ctx.admin_id],
    )?;
    info!(region = code, branch_id, id, "created region");
    Ok(id)
}

/// The branch's main warehouse, or a `Default` one created for it.
fn issuer_warehouse(ctx: &ImportContext<'_>, branch_id: i64) -> ClientResult<i64> {
    let existing = ctx.query_id(
        "db error querying issuer warehouse",
        "SELECT warehouse_id FROM list_warehouse
         WHERE branch_id = ?1 AND warehouse_type_id = 1
         ORDER BY warehouse_id ASC LIMIT 1",
        [branch_id],
    )?;
    if let Some(id) = existing {
        return Ok(id);
    }
    let id = ctx.insert(
        "error creating default warehouse",
        "INSERT INTO list_warehouse (warehouse_name, warehouse_type_id, branch_id, createdAt, createdBy)
         VALUES ('Default', 1, ?1, ?2, ?3)",
        params![branch_id, LEGACY_CUTOVER, ctx.admin_id],
    )?;
    info!(branch_id, id, "created default warehouse");
    Ok(id)
}

/// Points pending return vouchers at the invoices that settle them.
///
/// Failures here are logged and do not abort the import.
fn link_return_invoices(ctx: &ImportContext<'_>, links: &[(String, i64)]) -> ClientResult<()> {
    let mut invoice_ids: Memo<String, i64> = Memo::default();
    for (invoice_number, return_id) in links {
        let invoice_id = invoice_ids.get_or_load(invoice_number.clone(), || {
            ctx.query_id(
                "error querying imported invoice",
                "SELECT sales_invoice_id FROM list_sales_invoice WHERE sales_invoice_number = ?1 LIMIT 1",
                [invoice_number],
            )
        })?;
        let Some(invoice_id) = invoice_id else {
            continue;
        };
        if let Err(error) = ctx.conn.execute(
            "UPDATE rel_return_invoice_stb SET reference_id = ?1
             WHERE return_invoice_id = ?2 AND reference_id IS NULL",
            params![invoice_id, return_id],
        ) {
            warn!(return_invoice_id = return_id, error = %error, "failed to link return voucher");
        }
        if let Err(error) = ctx.conn.execute(
            "UPDATE list_sales_invoice SET is_return_invoice = 1 WHERE sales_invoice_id = ?1",
            [invoice_id],
        ) {
            warn!(sales_invoice_id = invoice_id, error = %error, "failed to flag return invoice");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{SalesType, division_id};

    #[test]
    fn sales_type_labels_map_to_skb_types() {
        assert_eq!(SalesType::from_label("REGULER"), SalesType::Regular);
        assert_eq!(SalesType::from_label("2"), SalesType::Consignment);
        assert_eq!(SalesType::from_label("Tender"), SalesType::Tender);
        assert_eq!(SalesType::Regular.skb_type(), 6);
        assert_eq!(SalesType::Consignment.skb_type(), 5);
        assert_eq!(SalesType::Tender.skb_type(), 11);
    }

    #[test]
    fn divisions_default_to_other() {
        assert_eq!(division_id(Some("pharmacy")), 1);
        assert_eq!(division_id(Some("HOSLAB")), 2);
        assert_eq!(division_id(Some("Alkes")), 3);
        assert_eq!(division_id(None), 3);
    }
}
