use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::params;
use tracing::{debug, info, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::cell::{Row, contains_ignore_case};
use crate::import::context::ImportContext;
use crate::import::parse::{denorm_float, parse_date};
use crate::import::resolve::{Memo, SYSTEM_ADMIN_ID};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 12;
const REGION_PURPOSE_COLLECTION: i64 = 2;

/// How an invoice was paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PaymentMethod {
    Cash,
    Transfer,
    Giro,
}

impl PaymentMethod {
    pub(crate) fn from_label(label: Option<&str>) -> Self {
        match label {
            Some(label) if contains_ignore_case(label, "cash") => Self::Cash,
            Some(label) if contains_ignore_case(label, "transfer") => Self::Transfer,
            Some(label) if contains_ignore_case(label, "giro") => Self::Giro,
            _ => Self::Cash,
        }
    }

    pub(crate) fn id(self) -> i64 {
        match self {
            Self::Cash => 1,
            Self::Transfer => 2,
            Self::Giro => 3,
        }
    }
}

#[derive(Debug, Clone)]
struct InvoiceRef {
    id: i64,
    branch_id: i64,
    outlet_id: i64,
    amount: f64,
}

#[derive(Debug, Clone)]
struct GiroRef {
    id: i64,
    due_date: Option<String>,
}

/// One invoice line of a settlement chain.
#[derive(Debug, Clone, Copy)]
struct SettledInvoice {
    invoice_id: i64,
    collected: f64,
    payment: f64,
    outstanding: f64,
}

/// Invoices paid with one giro, written as a single chain after the scan.
#[derive(Debug)]
struct GiroGroup {
    giro: GiroRef,
    giro_number: String,
    date: String,
    collector: i64,
    branch_id: i64,
    region_id: i64,
    outlet_id: i64,
    total_settlement: f64,
    total_giro: f64,
    invoices: Vec<SettledInvoice>,
}

/// Everything needed to write one collection-to-settlement chain.
#[derive(Debug)]
struct Chain<'a> {
    tag: &'static str,
    date: &'a str,
    collector: i64,
    branch_id: i64,
    region_id: i64,
    outlet_id: i64,
    method: PaymentMethod,
    cash: f64,
    giro: f64,
    transfer: f64,
    group_amount: f64,
    giro_number: Option<&'a str>,
    giro_due_date: Option<String>,
    invoices: &'a [SettledInvoice],
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut invoices: Memo<String, InvoiceRef> = Memo::default();
    let mut regions: Memo<i64, i64> = Memo::default();
    let mut collectors: Memo<i64, i64> = Memo::default();
    let mut giros: Memo<String, GiroRef> = Memo::default();
    let mut groups: Vec<GiroGroup> = Vec::new();
    let mut group_index: HashMap<i64, usize> = HashMap::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            debug!(row = row_number, width = row.width(), "skipping short row");
            continue;
        }
        if row.cell(0).as_deref() == Some("Freetext") {
            continue;
        }
        let Some(invoice_number) = row.cell(11) else {
            debug!(row = row_number, "skipping row without invoice number");
            continue;
        };
        summary.rows_read += 1;

        let date = parse_date(row.cell(2).as_deref()).unwrap_or_else(|| ctx.today.clone());
        let settlement_amount = denorm_float(row.cell(9).as_deref());
        let cash = denorm_float(row.cell(12).as_deref());
        let transfer = denorm_float(row.cell(13).as_deref());
        let giro_amount = denorm_float(row.cell(14).as_deref());

        let Some(invoice) = invoices.get_or_load(invoice_number.clone(), || {
            load_invoice(ctx, &invoice_number)
        })?
        else {
            warn!(row = row_number, invoice = %invoice_number, "skipping settlement for unknown invoice");
            summary.skipped += 1;
            continue;
        };
        let Some(region_id) = regions.get_or_load(invoice.branch_id, || {
            ctx.query_id(
                "error querying region",
                "SELECT region_id FROM list_region
                 WHERE region_purpose_id = ?1 AND branch_id = ?2
                 ORDER BY region_id ASC LIMIT 1",
                params![REGION_PURPOSE_COLLECTION, invoice.branch_id],
            )
        })?
        else {
            warn!(row = row_number, branch_id = invoice.branch_id, "skipping settlement without collection region");
            summary.skipped += 1;
            continue;
        };
        let collector = collectors
            .get_or_load(region_id, || load_collector(ctx, region_id).map(Some))?
            .unwrap_or(SYSTEM_ADMIN_ID);

        let method = PaymentMethod::from_label(row.cell(10).as_deref());
        if method == PaymentMethod::Giro {
            let Some(giro_number) = row.cell(15) else {
                warn!(row = row_number, "skipping giro payment without giro number");
                summary.skipped += 1;
                continue;
            };
            let Some(giro) = giros.get_or_load(giro_number.clone(), || load_giro(ctx, &giro_number))?
            else {
                warn!(row = row_number, giro = %giro_number, "skipping payment with unknown giro");
                summary.skipped += 1;
                continue;
            };
            ctx.execute(
                "error inserting giro invoice",
                "INSERT INTO rel_giro_invoice (giro_id, sales_invoice_id, amount) VALUES (?1, ?2, ?3)",
                params![giro.id, invoice.id, settlement_amount],
            )?;

            let index = *group_index.entry(giro.id).or_insert_with(|| {
                groups.push(GiroGroup {
                    giro: giro.clone(),
                    giro_number: giro_number.clone(),
                    date: date.clone(),
                    collector,
                    branch_id: invoice.branch_id,
                    region_id,
                    outlet_id: invoice.outlet_id,
                    total_settlement: 0.0,
                    total_giro: 0.0,
                    invoices: Vec::new(),
                });
                groups.len() - 1
            });
            if let Some(group) = groups.get_mut(index) {
                group.total_settlement += settlement_amount;
                group.total_giro += giro_amount;
                group.invoices.push(SettledInvoice {
                    invoice_id: invoice.id,
                    collected: settlement_amount,
                    payment: giro_amount,
                    outstanding: settlement_amount,
                });
            }
            continue;
        }

        let settled = [SettledInvoice {
            invoice_id: invoice.id,
            collected: settlement_amount,
            payment: settlement_amount,
            outstanding: invoice.amount,
        }];
        let giro_number = row.cell(15);
        write_chain(
            ctx,
            &Chain {
                tag: "",
                date: &date,
                collector,
                branch_id: invoice.branch_id,
                region_id,
                outlet_id: invoice.outlet_id,
                method,
                cash,
                giro: giro_amount,
                transfer,
                group_amount: settlement_amount,
                giro_number: giro_number.as_deref(),
                giro_due_date: None,
                invoices: &settled,
            },
        )?;
        summary.inserted += 1;
    }

    for group in &groups {
        let settlement_id = write_chain(
            ctx,
            &Chain {
                tag: "GIRO-",
                date: &group.date,
                collector: group.collector,
                branch_id: group.branch_id,
                region_id: group.region_id,
                outlet_id: group.outlet_id,
                method: PaymentMethod::Giro,
                cash: 0.0,
                giro: group.total_giro,
                transfer: 0.0,
                group_amount: group.total_settlement,
                giro_number: Some(&group.giro_number),
                giro_due_date: group.giro.due_date.as_deref().and_then(due_timestamp),
                invoices: &group.invoices,
            },
        )?;
        ctx.execute(
            "error updating giro check",
            "UPDATE list_giro_check SET settlement_id = ?1 WHERE giro_id = ?2",
            params![settlement_id, group.giro.id],
        )?;
        info!(giro = %group.giro_number, invoices = group.invoices.len(), settlement_id, "settled giro");
        summary.inserted += 1;
    }

    Ok(ImportOutcome::total(summary, "settlements"))
}

/// Writes collection, receipt, settlement, group and invoice links; returns
/// the settlement id.
fn write_chain(ctx: &ImportContext<'_>, chain: &Chain<'_>) -> ClientResult<i64> {
    let branch = chain.branch_id;
    let tag = chain.tag;

    let collection_id = ctx.insert(
        "error inserting debt collection",
        "INSERT INTO list_debt_collection (
            debt_collection_draft_number, debt_collection_number, debt_collection_date,
            debt_collection_status_id, debt_collection_type_id, collector,
            branch_id, region_id, createdAt, createdBy, approvedAt, approvedBy
         ) VALUES (?1, ?2, ?3, 3, 1, ?4, ?5, ?6, ?7, ?8, ?7, ?8)",
        params![
            document_number(ctx, &format!("DRAFT-DTH-{tag}"), branch),
            document_number(ctx, &format!("DTH-{tag}"), branch),
            chain.date,
            chain.collector,
            branch,
            chain.region_id,
            ctx.now,
            ctx.admin_id,
        ],
    )?;
    for invoice in chain.invoices {
        ctx.execute(
            "error inserting debt collection invoice",
            "INSERT INTO rel_debt_collection_invoice (debt_collection_id, outlet_id, invoice_id, amount_invoice)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection_id, chain.outlet_id, invoice.invoice_id, invoice.collected],
        )?;
    }

    let receipt_id = ctx.insert(
        "error inserting cashier receipt",
        "INSERT INTO list_cashier_receipt (
            cashier_receipt_number, cashier_receipt_status_id, debt_collection_id,
            cash, giro, transfer, createdAt, createdBy
         ) VALUES (?1, 2, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            document_number(ctx, &format!("CR-{tag}"), branch),
            collection_id,
            chain.cash,
            chain.giro,
            chain.transfer,
            ctx.now,
            ctx.admin_id,
        ],
    )?;

    let settlement_id = ctx.insert(
        "error inserting settlement",
        "INSERT INTO list_settlement (
            settlement_date, settlement_draft_number, settlement_number,
            debt_collection_id, cashier_receipt_id, settlement_status_id,
            branch_id, createdAt, createdBy
         ) VALUES (?1, ?2, ?3, ?4, ?5, 2, ?6, ?7, ?8)",
        params![
            chain.date,
            document_number(ctx, &format!("DRAFT-STL-{tag}"), branch),
            document_number(ctx, &format!("STL-{tag}"), branch),
            collection_id,
            receipt_id,
            branch,
            ctx.now,
            ctx.admin_id,
        ],
    )?;

    let group_id = ctx.insert(
        "error inserting settlement group",
        "INSERT INTO list_settlement_group (
            settlement_id, outlet_id, payment_method_id, settlement_amount,
            giro_number, giro_due_date
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            settlement_id,
            chain.outlet_id,
            chain.method.id(),
            chain.group_amount,
            chain.giro_number,
            chain.giro_due_date,
        ],
    )?;

    for invoice in chain.invoices {
        ctx.execute(
            "error inserting settle invoice",
            "INSERT INTO rel_settle_invoice (
                sales_invoice_id, settlement_id, settlement_group_id,
                payment_amount, rounding_amount, outstanding_balance
             ) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
            params![
                invoice.invoice_id,
                settlement_id,
                group_id,
                invoice.payment,
                invoice.outstanding,
            ],
        )?;
    }
    Ok(settlement_id)
}

fn document_number(ctx: &ImportContext<'_>, prefix: &str, branch_id: i64) -> String {
    format!("{prefix}{branch_id}-{}", ctx.unique_suffix())
}

/// Giro due dates are stored as a midnight timestamp on the settlement group.
fn due_timestamp(due_date: &str) -> Option<String> {
    let day = due_date.get(..10)?;
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => Some(format!("{} 00:00:00", date.format("%Y-%m-%d"))),
        Err(_) => {
            warn!(due_date, "unreadable giro due date, storing NULL");
            None
        }
    }
}

fn load_invoice(ctx: &ImportContext<'_>, number: &str) -> ClientResult<Option<InvoiceRef>> {
    ctx.query_opt(
        "error querying invoice",
        "SELECT sales_invoice_id, branch_id, outlet_id, amount
         FROM list_sales_invoice WHERE sales_invoice_number = ?1 LIMIT 1",
        [number],
        |row| {
            Ok(InvoiceRef {
                id: row.get(0)?,
                branch_id: row.get(1)?,
                outlet_id: row.get(2)?,
                amount: row.get::<_, Option<f64>>(3)?.unwrap_or_default(),
            })
        },
    )
}

/// First active, non-exclusive collector of the region; the system admin
/// otherwise.
fn load_collector(ctx: &ImportContext<'_>, region_id: i64) -> ClientResult<i64> {
    let found = ctx.query_id(
        "error querying collector",
        "SELECT ga.admin_id
         FROM rel_admin_region rar
         JOIN gemstone_admin ga ON ga.admin_id = rar.admin_id
         WHERE rar.region_id = ?1 AND rar.is_active = 1 AND rar.is_exclusive = 0 AND ga.is_collector = 1
         ORDER BY ga.admin_id ASC LIMIT 1",
        [region_id],
    )?;
    Ok(found.unwrap_or(SYSTEM_ADMIN_ID))
}

fn load_giro(ctx: &ImportContext<'_>, number: &str) -> ClientResult<Option<GiroRef>> {
    ctx.query_opt(
        "error querying giro",
        "SELECT giro_id, due_date FROM list_giro_check WHERE giro_number = ?1 LIMIT 1",
        [number],
        |row| {
            Ok(GiroRef {
                id: row.get(0)?,
                due_date: row.get(1)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::{PaymentMethod, due_timestamp};

    #[test]
    fn payment_label_defaults_to_cash() {
        assert_eq!(PaymentMethod::from_label(Some("CASH")), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::from_label(Some("Bank Transfer")), PaymentMethod::Transfer);
        assert_eq!(PaymentMethod::from_label(Some("Giro BCA")), PaymentMethod::Giro);
        assert_eq!(PaymentMethod::from_label(Some("Kartu")), PaymentMethod::Cash);
        assert_eq!(PaymentMethod::from_label(None).id(), 1);
    }

    #[test]
    fn giro_due_date_becomes_midnight_timestamp() {
        assert_eq!(
            due_timestamp("2025-10-18"),
            Some("2025-10-18 00:00:00".to_string())
        );
        assert_eq!(
            due_timestamp("2025-10-18 13:00:00"),
            Some("2025-10-18 00:00:00".to_string())
        );
        assert_eq!(due_timestamp("18/10/25"), None);
    }
}
