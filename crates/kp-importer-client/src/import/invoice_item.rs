//! Line items for legacy invoices already created by the invoice importer.
//!
//! Every row adds a product line to the sales order, the invoice and the SKB
//! sharing the row's invoice number. Bonus quantity is stored as a separate
//! "extra" line grouped under the main line.

use std::collections::HashSet;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter};
use tracing::{debug, info, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::cell::Row;
use crate::import::context::{ImportContext, opt_text, text};
use crate::import::parse::{parse_date, plain_float};
use crate::import::resolve::{Lookups, Memo, PRODUCT_BY_CODE, SALES_ORDER_BY_NUMBER, SKB_BY_NUMBER};
use crate::import::{ImportOutcome, data_rows};

const MIN_WIDTH: usize = 6;
/// Lines written by this importer; lines from an earlier pass carry 1.
const IMPORT_ITERATION: i64 = 2;
const PREVIOUS_ITERATION: i64 = 1;
const CONSIGNMENT_INVOICE: i64 = 2;
const SKB_REFERENCE_SALES_ORDER: i64 = 5;

/// Prices and quantities of one spreadsheet line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct ItemLine {
    pub price: f64,
    pub routine_pct: f64,
    pub program_pct: f64,
    pub qty: i64,
    pub qty_extra: i64,
}

impl ItemLine {
    pub(crate) fn routine_value(&self) -> f64 {
        self.routine_pct / 100.0 * self.price
    }

    pub(crate) fn program_value(&self) -> f64 {
        self.program_pct / 100.0 * self.price
    }

    pub(crate) fn discount_value(&self) -> f64 {
        self.routine_value() + self.program_value()
    }

    pub(crate) fn dpp(&self) -> f64 {
        self.price - self.discount_value()
    }
}

#[derive(Debug, Clone)]
struct InvoiceRef {
    id: i64,
    salesman_id: Option<i64>,
    type_id: Option<i64>,
}

/// Item table of a sales document.
#[derive(Debug, Clone, Copy)]
enum ItemTable {
    Order,
    Invoice,
}

impl ItemTable {
    fn table(self) -> &'static str {
        match self {
            Self::Order => "rel_sales_order_item",
            Self::Invoice => "rel_sales_invoice_item",
        }
    }

    fn parent(self) -> &'static str {
        match self {
            Self::Order => "sales_order_id",
            Self::Invoice => "sales_invoice_id",
        }
    }
}

/// Where a line is written: document, product, and for invoices the
/// salesman and (consignment only) batch number.
#[derive(Debug, Clone)]
struct LineTarget<'a> {
    table: ItemTable,
    parent_id: i64,
    product_id: i64,
    salesman_id: Option<i64>,
    batch_number: Option<&'a str>,
}

impl LineTarget<'_> {
    fn batch_filter(&self) -> &'static str {
        if self.batch_number.is_some() {
            " AND batch_number = ?3"
        } else {
            ""
        }
    }

    fn key_params(&self) -> Vec<Value> {
        let mut values = vec![Value::Integer(self.parent_id), Value::Integer(self.product_id)];
        if let Some(batch) = self.batch_number {
            values.push(text(batch));
        }
        values
    }

    /// Inserts a main line (`group_id` is `None`) or an extra line grouped
    /// under `group_id`, returning the new row id.
    fn insert(&self, ctx: &ImportContext<'_>, line: &ItemLine, group_id: Option<i64>) -> ClientResult<i64> {
        let mut columns = vec![
            self.table.parent(),
            "product_id",
            "quoted_price",
            "discount_value",
            "discount_routine_value",
            "discount_program_value",
            "discount_routine_branch",
            "discount_program_branch",
            "dpp",
            "unit",
            "qty",
            "qty_extra",
            "temp_iteration",
        ];
        let (dpp, qty, qty_extra) = match group_id {
            None => (line.dpp(), line.qty, 0),
            Some(_) => (0.0, 0, line.qty_extra),
        };
        let mut values = vec![
            Value::Integer(self.parent_id),
            Value::Integer(self.product_id),
            Value::Real(line.price),
            Value::Real(line.discount_value()),
            Value::Real(line.routine_value()),
            Value::Real(line.program_value()),
            Value::Real(line.routine_pct),
            Value::Real(line.program_pct),
            Value::Real(dpp),
            Value::Integer(1),
            Value::Integer(qty),
            Value::Integer(qty_extra),
            Value::Integer(IMPORT_ITERATION),
        ];
        if let Some(group_id) = group_id {
            columns.push("group_id");
            values.push(Value::Integer(group_id));
        }
        if let ItemTable::Invoice = self.table {
            columns.extend(["salesman_id", "batch_number"]);
            values.push(self.salesman_id.map_or(Value::Null, Value::Integer));
            values.push(opt_text(self.batch_number.map(str::to_string)));
        }

        let column_list = columns
            .iter()
            .map(|column| format!("\"{column}\""))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        ctx.insert(
            &format!("insert {} failed", self.table.table()),
            &format!(
                "INSERT INTO \"{}\" ({column_list}) VALUES ({placeholders})",
                self.table.table()
            ),
            params_from_iter(values),
        )
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, rows: &[Row]) -> ClientResult<ImportOutcome> {
    let mut lookups = Lookups::default();
    let mut invoices: Memo<String, InvoiceRef> = Memo::default();
    let mut skb_had_items: Memo<i64, bool> = Memo::default();
    let mut linked = HashSet::new();
    let mut summary = ImportSummary::default();

    for (row_number, row) in data_rows(rows, 1) {
        if row.width() < MIN_WIDTH {
            continue;
        }
        let Some(invoice_number) = row.cell(0) else {
            continue;
        };
        summary.rows_read += 1;

        let Some(order_id) = lookups.find(ctx, &SALES_ORDER_BY_NUMBER, &invoice_number)? else {
            warn!(row = row_number, invoice = %invoice_number, "skipping line with unknown sales order");
            summary.skipped += 1;
            continue;
        };
        let Some(invoice) = invoices.get_or_load(invoice_number.clone(), || {
            find_invoice(ctx, &invoice_number)
        })?
        else {
            warn!(row = row_number, invoice = %invoice_number, "skipping line with unknown invoice");
            summary.skipped += 1;
            continue;
        };
        let Some(skb_id) = lookups.find(ctx, &SKB_BY_NUMBER, &invoice_number)? else {
            warn!(row = row_number, invoice = %invoice_number, "skipping line with unknown skb");
            summary.skipped += 1;
            continue;
        };
        let Some(product_code) = row.cell(1) else {
            summary.skipped += 1;
            continue;
        };
        let product_id = product_or_create(ctx, &mut lookups, &product_code)?;

        let line = ItemLine {
            qty: plain_float(row.cell(3).as_deref()) as i64,
            qty_extra: plain_float(row.cell(4).as_deref()) as i64,
            price: plain_float(row.cell(5).as_deref()),
            routine_pct: plain_float(row.cell(6).as_deref()),
            program_pct: plain_float(row.cell(7).as_deref()),
        };
        let batch_number = row.cell(9);
        let expired_date = parse_date(row.cell(10).as_deref());

        let order_target = LineTarget {
            table: ItemTable::Order,
            parent_id: order_id,
            product_id,
            salesman_id: None,
            batch_number: None,
        };
        if imported_earlier(ctx, &order_target)? {
            debug!(row = row_number, invoice = %invoice_number, "order line imported earlier");
            summary.duplicates += 1;
            continue;
        }
        upsert_line(ctx, &order_target, &line)?;

        let invoice_target = LineTarget {
            table: ItemTable::Invoice,
            parent_id: invoice.id,
            product_id,
            salesman_id: invoice.salesman_id,
            batch_number: if invoice.type_id == Some(CONSIGNMENT_INVOICE) {
                Some(batch_number.as_deref().unwrap_or(""))
            } else {
                None
            },
        };
        if imported_earlier(ctx, &invoice_target)? {
            debug!(row = row_number, invoice = %invoice_number, "invoice line imported earlier");
            summary.duplicates += 1;
            continue;
        }
        upsert_line(ctx, &invoice_target, &line)?;

        // SKBs that already carried items before this run are left alone
        let had_items = skb_had_items
            .get_or_load(skb_id, || {
                ctx.exists(
                    "cek existing skb item failed",
                    "SELECT 1 FROM rel_skb_item WHERE skb_id = ?1 LIMIT 1",
                    [skb_id],
                )
                .map(Some)
            })?
            .unwrap_or_default();
        if !had_items {
            insert_skb_items(
                ctx,
                SkbLine {
                    skb_id,
                    product_id,
                    order_id,
                    batch_number: batch_number.as_deref(),
                    expired_date: expired_date.as_deref(),
                },
                &line,
            )?;
        }

        if linked.insert((invoice.id, skb_id)) {
            ctx.execute(
                "insert rel_sales_invoice_skb failed",
                "INSERT OR IGNORE INTO rel_sales_invoice_skb (sales_invoice_id, skb_id) VALUES (?1, ?2)",
                params![invoice.id, skb_id],
            )?;
        }

        summary.inserted += 1;
        if summary.inserted % ctx.batch_size as i64 == 0 {
            info!(rows = summary.inserted, "processed invoice lines");
        }
    }

    Ok(ImportOutcome::total(summary, "rows"))
}

fn find_invoice(ctx: &ImportContext<'_>, invoice_number: &str) -> ClientResult<Option<InvoiceRef>> {
    ctx.query_opt(
        "error querying invoice",
        "SELECT sales_invoice_id, salesman_id, sales_invoice_type_id
         FROM list_sales_invoice WHERE sales_invoice_number = ?1 LIMIT 1",
        [invoice_number],
        |row| {
            Ok(InvoiceRef {
                id: row.get(0)?,
                salesman_id: row.get(1)?,
                type_id: row.get(2)?,
            })
        },
    )
}

fn product_or_create(ctx: &ImportContext<'_>, lookups: &mut Lookups, code: &str) -> ClientResult<i64> {
    if let Some(id) = lookups.find(ctx, &PRODUCT_BY_CODE, code)? {
        return Ok(id);
    }
    let id = ctx.insert(
        "error inserting product",
        "INSERT INTO list_product (product_code, product_name, createdAt, createdBy) VALUES (?1, ?1, ?2, ?3)",
        params![code, ctx.now, ctx.admin_id],
    )?;
    info!(product_code = code, id, "created placeholder product");
    lookups.remember(&PRODUCT_BY_CODE, code, id);
    Ok(id)
}

fn imported_earlier(ctx: &ImportContext<'_>, target: &LineTarget<'_>) -> ClientResult<bool> {
    ctx.exists(
        &format!("cek existing {} failed", target.table.table()),
        &format!(
            "SELECT 1 FROM \"{}\" WHERE \"{}\" = ?1 AND product_id = ?2 AND temp_iteration = {PREVIOUS_ITERATION} LIMIT 1",
            target.table.table(),
            target.table.parent()
        ),
        params![target.parent_id, target.product_id],
    )
}

/// Adds `line` to the document: a fresh main line (plus extra) when the
/// product is new to it, otherwise the quantities are accumulated.
fn upsert_line(ctx: &ImportContext<'_>, target: &LineTarget<'_>, line: &ItemLine) -> ClientResult<()> {
    let table = target.table.table();
    let parent = target.table.parent();
    let filter = target.batch_filter();

    let main_line = ctx.query_id(
        &format!("error querying {table}"),
        &format!(
            "SELECT rel_id FROM \"{table}\" WHERE \"{parent}\" = ?1 AND product_id = ?2{filter} AND qty != 0 LIMIT 1"
        ),
        params_from_iter(target.key_params()),
    )?;

    let Some(main_id) = main_line else {
        let group_id = target.insert(ctx, line, None)?;
        if line.qty_extra > 0 {
            target.insert(ctx, line, Some(group_id))?;
        }
        return Ok(());
    };

    let mut update_params = target.key_params();
    update_params.push(Value::Integer(line.qty));
    let qty_slot = update_params.len();
    ctx.execute(
        &format!("update {table} failed"),
        &format!(
            "UPDATE \"{table}\" SET qty = qty + ?{qty_slot}
             WHERE \"{parent}\" = ?1 AND product_id = ?2{filter} AND qty_extra = 0"
        ),
        params_from_iter(update_params),
    )?;

    if line.qty_extra > 0 {
        let extra_line = ctx.query_id(
            &format!("error querying {table}"),
            &format!(
                "SELECT rel_id FROM \"{table}\" WHERE \"{parent}\" = ?1 AND product_id = ?2{filter} AND qty = 0 LIMIT 1"
            ),
            params_from_iter(target.key_params()),
        )?;
        match extra_line {
            Some(extra_id) => {
                ctx.execute(
                    &format!("update {table} failed"),
                    &format!("UPDATE \"{table}\" SET qty_extra = qty_extra + ?1 WHERE rel_id = ?2"),
                    params![line.qty_extra, extra_id],
                )?;
            }
            None => {
                target.insert(ctx, line, Some(main_id))?;
            }
        }
    }
    Ok(())
}

struct SkbLine<'a> {
    skb_id: i64,
    product_id: i64,
    order_id: i64,
    batch_number: Option<&'a str>,
    expired_date: Option<&'a str>,
}

fn insert_skb_items(ctx: &ImportContext<'_>, target: SkbLine<'_>, line: &ItemLine) -> ClientResult<()> {
    let SkbLine {
        skb_id,
        product_id,
        order_id,
        batch_number,
        expired_date,
    } = target;
    let sql = "INSERT INTO rel_skb_item
        (skb_id, product_id, unit, qty, quoted_price, batch_number, expired_date, reference_type_id, reference_id, is_extra)
        VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8, ?9)";
    ctx.execute(
        "insert skb item failed",
        sql,
        params![
            skb_id,
            product_id,
            line.qty,
            line.price,
            batch_number,
            expired_date,
            SKB_REFERENCE_SALES_ORDER,
            order_id,
            0
        ],
    )?;
    if line.qty_extra > 0 {
        ctx.execute(
            "insert skb extra failed",
            sql,
            params![
                skb_id,
                product_id,
                line.qty_extra,
                line.price,
                batch_number,
                expired_date,
                SKB_REFERENCE_SALES_ORDER,
                order_id,
                1
            ],
        )?;
    }
    Ok(())
}
