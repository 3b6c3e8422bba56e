//! Product master import spread over five named sheets.
//!
//! `Daftar Produk` creates the products; the remaining sheets link them to
//! substances, suppliers, tags and licences. All five run in one transaction
//! and a missing sheet fails the whole import.

use std::collections::HashSet;

use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::ClientResult;
use crate::contracts::types::ImportSummary;
use crate::import::batch::InsertBatch;
use crate::import::cell::{Row, yes_flag};
use crate::import::context::{ImportContext, opt_int, opt_text, text};
use crate::import::parse::{denormalize_number, parse_date};
use crate::import::resolve::{
    ColumnOptions, ColumnResolver, Lookups, PRODUCT_BY_CODE, PRODUCT_BY_NAME, SUPPLIER_BY_NAME,
    SYSTEM_ADMIN_ID, TAG_BY_NAME,
};
use crate::import::{ImportOutcome, data_rows};
use crate::workbook::Workbook;

pub(crate) const PRODUCT_SHEET: &str = "Daftar Produk";
pub(crate) const SUBSTANCE_SHEET: &str = "Zat Aktif Produk";
pub(crate) const SUPPLIER_SHEET: &str = "Supplier Produk";
pub(crate) const GROUP_SHEET: &str = "Grup Produk";
pub(crate) const LICENSE_SHEET: &str = "Izin Produk";

const PRODUCT_HEADER_ROWS: usize = 3;
const PRODUCT_WIDTH: usize = 44;
const DEFAULT_CLASSIFICATION: &str = "SUPLEMEN";
const GROUP_TAG_TYPE: i64 = 2;
const LICENSE_TYPE_PRODUCT: i64 = 3;
const LICENSE_STATUS_ACTIVE: i64 = 1;

const PRODUCT_COLUMNS: [&str; 47] = [
    "product_id",
    "product_name",
    "product_alias",
    "product_brand",
    "product_code",
    "product_status_id",
    "principal_id",
    "principal_division_id",
    "finished_drug_code",
    "old_code",
    "catalogue_code",
    "product_code_principal",
    "classification_id",
    "product_class",
    "division_id",
    "packaging",
    "size",
    "temperature_requirement",
    "expired_threshold",
    "length",
    "length_unit",
    "width",
    "width_unit",
    "height",
    "height_unit",
    "weight",
    "weight_unit",
    "volume",
    "volume_unit",
    "biggest_conv",
    "biggest_unit",
    "smallest_conv",
    "smallest_unit",
    "sale_unit",
    "manufacturer",
    "default_margin_principal",
    "lock_discount",
    "lock_sale",
    "stock_level_product",
    "form_id",
    "remark",
    "is_need_expired",
    "required_serial_number",
    "product_het",
    "default_hna",
    "createdAt",
    "createdBy",
];
const SUBSTANCE_COLUMNS: [&str; 4] = ["product_id", "substance_id", "createdAt", "createdBy"];
const SUPPLIER_COLUMNS: [&str; 5] = [
    "product_id",
    "supplier_id",
    "flag_id",
    "createdAt",
    "createdBy",
];
const TAG_COLUMNS: [&str; 4] = ["product_id", "tag_id", "assigned_date", "createdBy"];
const LICENSE_COLUMNS: [&str; 9] = [
    "license_type_id",
    "license_name",
    "license_number",
    "effective_date",
    "expired_date",
    "createdAt",
    "createdBy",
    "product_id",
    "license_status_id",
];

/// Counters for one worksheet, folded into the run summary at the end.
#[derive(Debug, Default)]
struct SheetTally {
    read: i64,
    inserted: i64,
    skipped: i64,
    duplicates: i64,
}

impl SheetTally {
    fn describe(&self, sheet: &str) -> String {
        if self.duplicates > 0 {
            format!(
                "{sheet}: {} rows inserted, {} duplicate rows skipped",
                self.inserted, self.duplicates
            )
        } else {
            format!("{sheet}: {} rows inserted", self.inserted)
        }
    }
}

pub(crate) fn run(ctx: &ImportContext<'_>, workbook: &mut Workbook) -> ClientResult<ImportOutcome> {
    let mut resolver = ColumnResolver::default();
    let mut lookups = Lookups::default();

    let products = import_products(ctx, &workbook.rows(PRODUCT_SHEET)?, &mut resolver)
        .map_err(|error| error.context(&format!("error importing {PRODUCT_SHEET}")))?;
    let substances = import_substances(ctx, &workbook.rows(SUBSTANCE_SHEET)?, &mut resolver)
        .map_err(|error| error.context(&format!("error importing {SUBSTANCE_SHEET}")))?;
    let suppliers = import_suppliers(ctx, &workbook.rows(SUPPLIER_SHEET)?, &mut lookups)
        .map_err(|error| error.context(&format!("error importing {SUPPLIER_SHEET}")))?;
    let groups = import_groups(ctx, &workbook.rows(GROUP_SHEET)?, &mut lookups)
        .map_err(|error| error.context(&format!("error importing {GROUP_SHEET}")))?;
    let licenses = import_licenses(ctx, &workbook.rows(LICENSE_SHEET)?, &mut lookups)
        .map_err(|error| error.context(&format!("error importing {LICENSE_SHEET}")))?;

    let tallies = [
        (PRODUCT_SHEET, &products),
        (SUBSTANCE_SHEET, &substances),
        (SUPPLIER_SHEET, &suppliers),
        (GROUP_SHEET, &groups),
        (LICENSE_SHEET, &licenses),
    ];
    let mut summary = ImportSummary::default();
    for (_, tally) in &tallies {
        summary.rows_read += tally.read;
        summary.inserted += tally.inserted;
        summary.skipped += tally.skipped;
        summary.duplicates += tally.duplicates;
    }
    let detail = tallies
        .iter()
        .map(|(sheet, tally)| tally.describe(sheet))
        .collect::<Vec<_>>()
        .join("; ");
    Ok(ImportOutcome::new(summary, detail))
}

fn import_products(
    ctx: &ImportContext<'_>,
    rows: &[Row],
    resolver: &mut ColumnResolver,
) -> ClientResult<SheetTally> {
    let mut batch = InsertBatch::new("list_product", &PRODUCT_COLUMNS, ctx.batch_size);
    let mut seen_codes = HashSet::new();
    let mut tally = SheetTally::default();

    for (row_number, row) in data_rows(rows, PRODUCT_HEADER_ROWS) {
        let Some(product_name) = row.cell(0) else {
            continue;
        };
        if product_name == "Free Text" {
            continue;
        }
        tally.read += 1;

        let product_code = row.text(3);
        if !product_code.is_empty() {
            let known = seen_codes.contains(&product_code)
                || ctx.exists(
                    "error checking duplicate product code",
                    "SELECT 1 FROM list_product WHERE product_code = ?1 LIMIT 1",
                    [&product_code],
                )?;
            if known {
                debug!(row = row_number, product_code = %product_code, "duplicate product code");
                tally.duplicates += 1;
                continue;
            }
        }
        let product_id = if product_code.is_empty() {
            None
        } else {
            match product_code.parse::<i64>() {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(row = row_number, product_code = %product_code, "skipping row with non-numeric product code");
                    tally.skipped += 1;
                    continue;
                }
            }
        };
        seen_codes.insert(product_code.clone());

        let values = product_values(ctx, row, resolver, product_id, product_name, product_code)?;
        batch.push_and_flush(ctx.conn, &ctx.db_path, values)?;
        tally.inserted += 1;
    }
    batch.flush(ctx.conn, &ctx.db_path)?;
    Ok(tally)
}

fn product_values(
    ctx: &ImportContext<'_>,
    row: &Row,
    resolver: &mut ColumnResolver,
    product_id: Option<i64>,
    product_name: String,
    product_code: String,
) -> ClientResult<Vec<Value>> {
    let mut padded = (0..PRODUCT_WIDTH).map(|index| row.cell(index));
    let mut next = || padded.next().flatten();
    let _name = next();
    let alias = next().unwrap_or_default();
    let brand = next().unwrap_or_default();
    let _code = next();
    let principal_name = next();
    let division_name = next();
    let finished_drug_code = next().unwrap_or_default();
    let old_code = next().unwrap_or_default();
    let catalogue_code = next().unwrap_or_default();
    let code_principal = next().unwrap_or_default();
    let classification = next().unwrap_or_else(|| DEFAULT_CLASSIFICATION.to_string());
    let product_class = next().unwrap_or_default();
    let division = next().unwrap_or_default();
    let packaging = next().unwrap_or_default();
    let size = next().unwrap_or_default();
    let temperature = next().unwrap_or_default();
    let expired_threshold = denormalize_number(next().as_deref());

    let principal_id = match principal_name {
        Some(name) => resolver.resolve(ctx, "principal_name", "list_principal", &name, ColumnOptions::default())?,
        None => None,
    };
    let division_id = match division_name {
        Some(name) => resolver.resolve(
            ctx,
            "division_name",
            "list_principal_division",
            &name,
            ColumnOptions {
                external: false,
                principal_id,
            },
        )?,
        None => None,
    };
    let classification_id = resolver.resolve(
        ctx,
        "classification_name",
        "list_product_classification",
        &classification,
        ColumnOptions::default(),
    )?;
    let product_division = if division.eq_ignore_ascii_case("Pharmacy") {
        1
    } else if division.eq_ignore_ascii_case("Hoslab") {
        2
    } else {
        3
    };

    let mut values = vec![
        opt_int(product_id),
        text(product_name),
        text(alias),
        text(brand),
        text(product_code),
        Value::Null,
        opt_int(principal_id),
        opt_int(division_id),
        text(finished_drug_code),
        text(old_code),
        text(catalogue_code),
        text(code_principal),
        opt_int(classification_id),
        text(product_class),
        Value::Integer(product_division),
        text(packaging),
        text(size),
        text(temperature),
        text(expired_threshold),
    ];

    // length, width, height, weight and volume each pair a measure with a unit
    for _ in 0..5 {
        let measure = denormalize_number(next().as_deref());
        let unit = match next() {
            Some(unit) => resolver.resolve(ctx, "unit_name", "list_unit", &unit, ColumnOptions::default())?,
            None => None,
        };
        values.push(text(measure));
        values.push(opt_int(unit));
    }

    let biggest_conv = denormalize_number(next().as_deref());
    let biggest_unit = next().unwrap_or_default();
    let smallest_conv = denormalize_number(next().as_deref());
    let smallest_unit = next().unwrap_or_default();
    let sale_unit = next().unwrap_or_default();
    let manufacturer = next().unwrap_or_default();
    let margin = next().unwrap_or_else(|| "0".to_string());
    let lock_discount = yes_flag(next().as_deref());
    let lock_sale = yes_flag(next().as_deref());
    let stock_level = next().unwrap_or_else(|| "0".to_string());
    let form_id = match next() {
        Some(form) => resolver.resolve(ctx, "form_name", "list_product_form", &form, ColumnOptions::default())?,
        None => None,
    };
    let remark = next().unwrap_or_default();
    let need_expired = yes_flag(next().as_deref());
    let serial_required = yes_flag(next().as_deref());
    let het = next().unwrap_or_else(|| "0".to_string());
    let hna = next().unwrap_or_else(|| "0".to_string());
    let status = match next() {
        Some(label) if label.eq_ignore_ascii_case("Aktif") => 2,
        _ => 1,
    };
    values[5] = Value::Integer(status);

    values.extend([
        text(biggest_conv),
        text(biggest_unit),
        text(smallest_conv),
        text(smallest_unit),
        text(sale_unit),
        text(manufacturer),
        text(margin),
        Value::Integer(lock_discount),
        Value::Integer(lock_sale),
        text(stock_level),
        opt_int(form_id),
        text(remark),
        Value::Integer(need_expired),
        Value::Integer(serial_required),
        text(het),
        text(hna),
        text(ctx.now.clone()),
        Value::Integer(ctx.admin_id),
    ]);
    Ok(values)
}

fn import_substances(
    ctx: &ImportContext<'_>,
    rows: &[Row],
    resolver: &mut ColumnResolver,
) -> ClientResult<SheetTally> {
    let mut batch = InsertBatch::new("rel_product_substance", &SUBSTANCE_COLUMNS, ctx.batch_size);
    let mut lookups = Lookups::default();
    let mut tally = SheetTally::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(product_code) = row.cell(0) else {
            continue;
        };
        tally.read += 1;
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping substance row for unknown product");
            tally.skipped += 1;
            continue;
        };
        let Some(substances) = row.cell(2) else {
            continue;
        };
        for substance in substances.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let substance_id = resolver.resolve(
                ctx,
                "substance_name",
                "list_substance",
                substance,
                ColumnOptions::default(),
            )?;
            batch.push_and_flush(
                ctx.conn,
                &ctx.db_path,
                vec![
                    Value::Integer(product_id),
                    opt_int(substance_id),
                    text(ctx.now.clone()),
                    Value::Integer(ctx.admin_id),
                ],
            )?;
            tally.inserted += 1;
        }
    }
    batch.flush(ctx.conn, &ctx.db_path)?;
    Ok(tally)
}

fn import_suppliers(
    ctx: &ImportContext<'_>,
    rows: &[Row],
    lookups: &mut Lookups,
) -> ClientResult<SheetTally> {
    let mut batch = InsertBatch::new("rel_product_supplier", &SUPPLIER_COLUMNS, ctx.batch_size);
    let mut tally = SheetTally::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(product_code) = row.cell(0) else {
            continue;
        };
        tally.read += 1;
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping supplier row for unknown product");
            tally.skipped += 1;
            continue;
        };
        let supplier_name = row.text(2);
        let Some(supplier_id) = lookups.find(ctx, &SUPPLIER_BY_NAME, &supplier_name)? else {
            warn!(row = row_number, supplier = %supplier_name, "skipping row with unknown supplier");
            tally.skipped += 1;
            continue;
        };
        let flag_id = match row.text(3).to_lowercase().as_str() {
            "reguler" => 1,
            "konsinyasi" => 2,
            _ => 3,
        };
        batch.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                Value::Integer(product_id),
                Value::Integer(supplier_id),
                Value::Integer(flag_id),
                text(ctx.now.clone()),
                Value::Integer(ctx.admin_id),
            ],
        )?;
        tally.inserted += 1;
    }
    batch.flush(ctx.conn, &ctx.db_path)?;
    Ok(tally)
}

fn import_groups(
    ctx: &ImportContext<'_>,
    rows: &[Row],
    lookups: &mut Lookups,
) -> ClientResult<SheetTally> {
    let mut batch = InsertBatch::new("rel_product_tag", &TAG_COLUMNS, ctx.batch_size);
    let mut tally = SheetTally::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(product_code) = row.cell(0) else {
            continue;
        };
        tally.read += 1;
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_CODE, &product_code)? else {
            warn!(row = row_number, product_code = %product_code, "skipping group row for unknown product");
            tally.skipped += 1;
            continue;
        };
        // only the last of several comma-separated groups is kept
        let group = row
            .text(2)
            .rsplit(',')
            .next()
            .map(str::trim)
            .unwrap_or_default()
            .to_string();
        let tag_id = match lookups.find(ctx, &TAG_BY_NAME, &group)? {
            Some(id) => id,
            None => {
                let id = ctx.insert(
                    "error creating product group tag",
                    "INSERT INTO list_tag (tag_name, tag_type_id, createdAt, createdBy) VALUES (?1, ?2, ?3, ?4)",
                    rusqlite::params![group, GROUP_TAG_TYPE, ctx.now, SYSTEM_ADMIN_ID],
                )?;
                lookups.remember(&TAG_BY_NAME, &group, id);
                id
            }
        };
        batch.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                Value::Integer(product_id),
                Value::Integer(tag_id),
                text(ctx.now.clone()),
                Value::Integer(ctx.admin_id),
            ],
        )?;
        tally.inserted += 1;
    }
    batch.flush(ctx.conn, &ctx.db_path)?;
    Ok(tally)
}

fn import_licenses(
    ctx: &ImportContext<'_>,
    rows: &[Row],
    lookups: &mut Lookups,
) -> ClientResult<SheetTally> {
    let mut batch = InsertBatch::new("list_license", &LICENSE_COLUMNS, ctx.batch_size);
    let mut tally = SheetTally::default();

    for (row_number, row) in data_rows(rows, 1) {
        let Some(product_name) = row.cell(0) else {
            continue;
        };
        tally.read += 1;
        let Some(product_id) = lookups.find(ctx, &PRODUCT_BY_NAME, &product_name)? else {
            warn!(row = row_number, product = %product_name, "skipping licence row for unknown product");
            tally.skipped += 1;
            continue;
        };
        batch.push_and_flush(
            ctx.conn,
            &ctx.db_path,
            vec![
                Value::Integer(LICENSE_TYPE_PRODUCT),
                text(row.text(2)),
                text(row.text(3)),
                opt_text(parse_date(row.cell(4).as_deref())),
                opt_text(parse_date(row.cell(5).as_deref())),
                text(ctx.now.clone()),
                Value::Integer(ctx.admin_id),
                Value::Integer(product_id),
                Value::Integer(LICENSE_STATUS_ACTIVE),
            ],
        )?;
        tally.inserted += 1;
    }
    batch.flush(ctx.conn, &ctx.db_path)?;
    Ok(tally)
}
