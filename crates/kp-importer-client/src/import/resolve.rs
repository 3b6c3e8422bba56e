//! Natural-key resolution against dimension tables.
//!
//! Lookups either match exactly or with a `LIKE '%value%'` wildcard. Misses are
//! handled by the caller: hard dependencies skip the row, soft dependencies
//! insert the dimension row with table-specific defaults. Every resolution is
//! memoized for the rest of the run.

use std::collections::HashMap;
use std::hash::Hash;

use rusqlite::params;
use tracing::{info, warn};

use crate::import::cell::title_case;
use crate::import::context::{ImportContext, opt_int};
use crate::{ClientError, ClientResult};

/// Actor recorded on dimension rows created by the generic resolver.
pub(crate) const SYSTEM_ADMIN_ID: i64 = 1;

/// Password hash given to admin accounts created during an import.
pub(crate) const DEFAULT_ADMIN_PASSWORD_HASH: &str =
    "$2y$10$BpYtQGwQSSTM79aUVJdW7.gwdOCJ.cY29g.sc1KS3qusyU8U4eHFu";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Match {
    Exact,
    Like,
}

/// A dimension table addressed by one natural-key column.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Dimension {
    pub table: &'static str,
    pub id: &'static str,
    pub key: &'static str,
    pub matching: Match,
}

impl Dimension {
    const fn exact(table: &'static str, id: &'static str, key: &'static str) -> Self {
        Self {
            table,
            id,
            key,
            matching: Match::Exact,
        }
    }

    const fn like(table: &'static str, id: &'static str, key: &'static str) -> Self {
        Self {
            table,
            id,
            key,
            matching: Match::Like,
        }
    }

    fn select_sql(&self) -> String {
        let operator = match self.matching {
            Match::Exact => "=",
            Match::Like => "LIKE",
        };
        format!(
            "SELECT \"{}\" FROM \"{}\" WHERE \"{}\" {operator} ?1 ORDER BY 1 ASC LIMIT 1",
            self.id, self.table, self.key
        )
    }
}

pub(crate) const BRANCH_BY_CODE: Dimension =
    Dimension::exact("list_branch", "branch_id", "branch_code");
pub(crate) const BRANCH_BY_NAME: Dimension =
    Dimension::exact("list_branch", "branch_id", "branch_name");
pub(crate) const OUTLET_BY_CODE: Dimension =
    Dimension::exact("list_outlet", "outlet_id", "outlet_code");
pub(crate) const PRODUCT_BY_CODE: Dimension =
    Dimension::exact("list_product", "product_id", "product_code");
pub(crate) const PRODUCT_BY_NAME: Dimension =
    Dimension::exact("list_product", "product_id", "product_name");
pub(crate) const PRINCIPAL_BY_NAME: Dimension =
    Dimension::exact("list_principal", "principal_id", "principal_name");
pub(crate) const PRINCIPAL_BY_CODE: Dimension =
    Dimension::exact("list_principal", "principal_id", "principal_code");
pub(crate) const SUPPLIER_BY_NAME: Dimension =
    Dimension::like("list_supplier", "supplier_id", "supplier_name");
pub(crate) const TAG_BY_NAME: Dimension = Dimension::like("list_tag", "tag_id", "tag_name");
pub(crate) const ADMIN_BY_NAME: Dimension =
    Dimension::exact("gemstone_admin", "admin_id", "admin_name");
pub(crate) const COURIER_BY_NAME: Dimension =
    Dimension::exact("list_courier", "courier_id", "courier_name");
pub(crate) const SALES_SOURCE_BY_NAME: Dimension =
    Dimension::exact("list_sales_source", "source_id", "source_name");
pub(crate) const SALES_INVOICE_BY_NUMBER: Dimension =
    Dimension::exact("list_sales_invoice", "sales_invoice_id", "sales_invoice_number");
pub(crate) const SALES_ORDER_BY_NUMBER: Dimension =
    Dimension::exact("list_sales_order", "sales_order_id", "sales_number");
pub(crate) const SKB_BY_NUMBER: Dimension = Dimension::exact("list_skb", "skb_id", "skb_number");
pub(crate) const STB_BY_NUMBER: Dimension = Dimension::exact("list_stb", "stb_id", "stb_number");
pub(crate) const INVOICE_RETURN_BY_NUMBER: Dimension =
    Dimension::exact("list_invoice_return", "return_invoice_id", "return_number");
pub(crate) const DEPOSIT_BY_NUMBER: Dimension =
    Dimension::exact("list_outlet_deposit", "deposit_id", "deposit_number");
pub(crate) const ACCOUNT_TYPE_BY_NAME: Dimension =
    Dimension::exact("list_account_type", "account_type_id", "account_type_name");
pub(crate) const BANK_ACCOUNT_BY_NUMBER: Dimension =
    Dimension::exact("list_bank_account", "bank_account_id", "account_number");

/// Looks a dimension row up by its natural key.
pub(crate) fn find(
    ctx: &ImportContext<'_>,
    dimension: &Dimension,
    value: &str,
) -> ClientResult<Option<i64>> {
    let needle = match dimension.matching {
        Match::Exact => value.to_string(),
        Match::Like => format!("%{value}%"),
    };
    ctx.query_id(
        &format!("error querying {}", dimension.table),
        &dimension.select_sql(),
        [needle],
    )
}

/// Per-run memo of natural key to resolved value, including misses.
#[derive(Debug)]
pub(crate) struct Memo<K, V> {
    entries: HashMap<K, Option<V>>,
}

impl<K, V> Default for Memo<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V: Clone> Memo<K, V> {
    /// Returns the memoized value or runs `load` once for this key.
    pub(crate) fn get_or_load<F>(&mut self, key: K, load: F) -> ClientResult<Option<V>>
    where
        F: FnOnce() -> ClientResult<Option<V>>,
    {
        if let Some(cached) = self.entries.get(&key) {
            return Ok(cached.clone());
        }
        let loaded = load()?;
        self.entries.insert(key, loaded.clone());
        Ok(loaded)
    }

    pub(crate) fn insert(&mut self, key: K, value: V) {
        self.entries.insert(key, Some(value));
    }
}

/// Memoized exact/LIKE lookups keyed by dimension and natural key.
#[derive(Debug, Default)]
pub(crate) struct Lookups {
    memo: Memo<(&'static str, &'static str, String), i64>,
    named: Memo<(&'static str, &'static str, String), Named>,
}

/// A dimension row's id together with its display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Named {
    pub id: i64,
    pub name: String,
}

impl Lookups {
    pub(crate) fn find(
        &mut self,
        ctx: &ImportContext<'_>,
        dimension: &Dimension,
        value: &str,
    ) -> ClientResult<Option<i64>> {
        let key = (dimension.table, dimension.key, value.to_string());
        self.memo.get_or_load(key, || find(ctx, dimension, value))
    }

    /// Records an id created during the run so later rows hit the memo.
    pub(crate) fn remember(&mut self, dimension: &Dimension, value: &str, id: i64) {
        self.memo
            .insert((dimension.table, dimension.key, value.to_string()), id);
    }

    /// Like [`Lookups::find`] but also reads `name_column` from the same row.
    pub(crate) fn find_named(
        &mut self,
        ctx: &ImportContext<'_>,
        dimension: &Dimension,
        name_column: &'static str,
        value: &str,
    ) -> ClientResult<Option<Named>> {
        let key = (dimension.table, dimension.key, value.to_string());
        self.named.get_or_load(key, || {
            ensure_identifier(name_column)?;
            ctx.query_opt(
                &format!("error querying {}", dimension.table),
                &format!(
                    "SELECT \"{}\", \"{name_column}\" FROM \"{}\" WHERE \"{}\" = ?1 ORDER BY 1 ASC LIMIT 1",
                    dimension.id, dimension.table, dimension.key
                ),
                [value],
                |row| {
                    Ok(Named {
                        id: row.get(0)?,
                        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    })
                },
            )
        })
    }

    /// Resolves an admin by login name, creating a tier-30 account on a miss.
    ///
    /// A failed insert is logged and resolves to `None` so the caller can
    /// apply its own fallback.
    pub(crate) fn admin_or_create(
        &mut self,
        ctx: &ImportContext<'_>,
        name: &str,
    ) -> ClientResult<Option<i64>> {
        if let Some(id) = self.find(ctx, &ADMIN_BY_NAME, name)? {
            return Ok(Some(id));
        }
        let created = ctx.conn.execute(
            "INSERT INTO gemstone_admin (admin_name, admin_fullname, admin_tier_id, password, admin_status, last_active)
             VALUES (?1, ?1, 30, ?2, 1, ?3)",
            params![name, DEFAULT_ADMIN_PASSWORD_HASH, ctx.now],
        );
        match created {
            Ok(_) => {
                let id = ctx.conn.last_insert_rowid();
                info!(admin = name, id, "created admin");
                self.remember(&ADMIN_BY_NAME, name, id);
                Ok(Some(id))
            }
            Err(error) => {
                warn!(admin = name, error = %error, "failed to create admin");
                Ok(None)
            }
        }
    }
}

/// Per-table options for [`check_import_column`].
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ColumnOptions {
    pub external: bool,
    pub principal_id: Option<i64>,
}

/// Resolves `value` in `table.field` by wildcard match, inserting the row with
/// the table's defaults on a miss. `list_town` misses resolve to `None`.
pub(crate) fn check_import_column(
    ctx: &ImportContext<'_>,
    field: &str,
    table: &str,
    value: &str,
    options: ColumnOptions,
) -> ClientResult<Option<i64>> {
    ensure_identifier(field)?;
    ensure_identifier(table)?;
    let step = format!("error checkImportColumn({table})");

    let existing = ctx.query_id(
        &step,
        &format!("SELECT * FROM \"{table}\" WHERE \"{field}\" LIKE ?1 ORDER BY 1 ASC LIMIT 1"),
        [format!("%{value}%")],
    )?;
    if existing.is_some() {
        return Ok(existing);
    }

    let created = match table {
        "list_branch" => {
            let branch_name = title_case(value);
            let town_id = ctx
                .query_id(
                    &step,
                    "SELECT town_id FROM list_town WHERE town_name LIKE ?1 ORDER BY 1 ASC LIMIT 1",
                    [format!("%{branch_name}%")],
                )?
                .unwrap_or(1);
            ctx.insert(
                &step,
                &format!(
                    "INSERT INTO list_branch (\"{field}\", branch_code, branch_postal_code, town_id, createdAt, createdBy)
                     VALUES (?1, '00', '0000', ?2, ?3, ?4)"
                ),
                params![branch_name, town_id, ctx.now, SYSTEM_ADMIN_ID],
            )?
        }
        "list_outlet_segment" => {
            let segment_type_id = if options.external { 2 } else { 1 };
            ctx.insert(
                &step,
                &format!(
                    "INSERT INTO list_outlet_segment (\"{field}\", segment_type_id, segment_classification_id, createdAt)
                     VALUES (?1, ?2, 1, ?3)"
                ),
                params![value, segment_type_id, ctx.now],
            )?
        }
        "list_town" => return Ok(None),
        "list_principal_division" => ctx.insert(
            &step,
            &format!(
                "INSERT INTO list_principal_division (\"{field}\", old_code, division_code, principal_id)
                 VALUES (?1, NULL, NULL, ?2)"
            ),
            params![value, opt_int(options.principal_id)],
        )?,
        "list_tag" => ctx.insert(
            &step,
            &format!(
                "INSERT INTO list_tag (\"{field}\", tag_type_id, createdAt, createdBy) VALUES (?1, 1, ?2, ?3)"
            ),
            params![value, ctx.now, SYSTEM_ADMIN_ID],
        )?,
        _ => {
            if has_audit_columns(ctx, &step, table)? {
                ctx.insert(
                    &step,
                    &format!(
                        "INSERT INTO \"{table}\" (\"{field}\", createdAt, createdBy) VALUES (?1, ?2, ?3)"
                    ),
                    params![value, ctx.now, SYSTEM_ADMIN_ID],
                )?
            } else {
                ctx.insert(
                    &step,
                    &format!("INSERT INTO \"{table}\" (\"{field}\") VALUES (?1)"),
                    [value],
                )?
            }
        }
    };

    info!(table, field, value, id = created, "created dimension row");
    Ok(Some(created))
}

/// Table, field, value, external flag and principal of one resolution.
type ColumnKey = (String, String, String, bool, Option<i64>);

/// Memoized front for [`check_import_column`].
#[derive(Debug, Default)]
pub(crate) struct ColumnResolver {
    memo: Memo<ColumnKey, i64>,
}

impl ColumnResolver {
    pub(crate) fn resolve(
        &mut self,
        ctx: &ImportContext<'_>,
        field: &str,
        table: &str,
        value: &str,
        options: ColumnOptions,
    ) -> ClientResult<Option<i64>> {
        let key = (
            table.to_string(),
            field.to_string(),
            value.to_string(),
            options.external,
            options.principal_id,
        );
        self.memo.get_or_load(key, || {
            check_import_column(ctx, field, table, value, options)
        })
    }
}

fn has_audit_columns(ctx: &ImportContext<'_>, step: &str, table: &str) -> ClientResult<bool> {
    let mut statement = ctx
        .conn
        .prepare(&format!("PRAGMA table_info(\"{table}\")"))
        .map_err(|error| ctx.sql_error(step, &error))?;
    let names = statement
        .query_map([], |row| row.get::<_, String>(1))
        .map_err(|error| ctx.sql_error(step, &error))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|error| ctx.sql_error(step, &error))?;
    let has = |name: &str| names.iter().any(|column| column == name);
    Ok(has("createdAt") && has("createdBy"))
}

fn ensure_identifier(identifier: &str) -> ClientResult<()> {
    let valid = !identifier.is_empty()
        && identifier
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_');
    if valid {
        Ok(())
    } else {
        Err(ClientError::invalid_identifier(identifier))
    }
}
