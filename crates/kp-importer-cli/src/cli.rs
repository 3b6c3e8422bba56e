use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use kp_importer_client::ImportKind;
use kp_importer_client::commands::import::{DEFAULT_ADMIN_ID, DEFAULT_BATCH_SIZE};

pub fn parse_batch_size(value: &str) -> Result<usize, String> {
    match value.trim().parse::<usize>() {
        Ok(0) => Err("batch size must be at least 1".to_string()),
        Ok(size) => Ok(size),
        Err(_) => Err("batch size must be a positive whole number".to_string()),
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "kp-importer",
    version,
    about = "spreadsheet importer for the back-office database",
    disable_help_subcommand = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Flags accepted by every importer.
#[derive(Debug, Clone, Args)]
pub struct ImportArgs {
    /// Workbook to read (defaults to ./uploads/<command>.xlsx)
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// SQLite database path (defaults to $KP_IMPORTER_DB)
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Actor id written to createdBy-style columns
    #[arg(long, default_value_t = DEFAULT_ADMIN_ID)]
    pub admin_id: i64,
    /// Rows per multi-row INSERT
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, value_parser = parse_batch_size)]
    pub batch: usize,
    /// Sheet to read instead of the importer's default
    #[arg(long)]
    pub sheet: Option<String>,
    /// Activity-log row to stamp after a successful import
    #[arg(long)]
    pub log_id: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Create or migrate the back-office schema
    Init {
        /// SQLite database path (defaults to $KP_IMPORTER_DB)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Import outlets with their history rows
    Outlet(ImportArgs),
    /// Import products from the five product sheets
    Product(ImportArgs),
    /// Import opening stock per warehouse and batch
    Stock(ImportArgs),
    /// Import legacy sales invoices with their orders and SKBs
    Invoice(ImportArgs),
    /// Import outstanding sales invoices (same layout as `invoice`)
    InvoiceOutstanding(ImportArgs),
    /// Import sales invoice line items
    InvoiceProduct(ImportArgs),
    /// Import outstanding invoice line items (same layout as `invoice-product`)
    InvoiceOutstandingProduct(ImportArgs),
    /// Import line items whose products may be missing (same layout as `invoice-product`)
    InvoiceProductMissing(ImportArgs),
    /// Import sales invoice fees
    InvoiceFee(ImportArgs),
    /// Import invoice returns with their STBs
    InvoiceReturn(ImportArgs),
    /// Import invoice return line items
    InvoiceReturnProduct(ImportArgs),
    /// Import outlet deposits
    Deposit(ImportArgs),
    /// Import giro checks
    Giro(ImportArgs),
    /// Import invoice settlements
    Settlement(ImportArgs),
    /// Import central intransit SKBs
    Intransit(ImportArgs),
    /// Import central intransit SKB items
    IntransitProduct(ImportArgs),
    /// Import deposit and outstanding transfers between branches
    Transfer(ImportArgs),
    /// Import beginning cash and bank balances
    Balance(ImportArgs),
    /// Import delivery and document flow tracking
    Dmf(ImportArgs),
}

impl Commands {
    /// The importer and its flags, or `None` for `init`.
    pub fn import(&self) -> Option<(ImportKind, &ImportArgs)> {
        let pair = match self {
            Self::Init { .. } => return None,
            Self::Outlet(args) => (ImportKind::Outlet, args),
            Self::Product(args) => (ImportKind::Product, args),
            Self::Stock(args) => (ImportKind::Stock, args),
            Self::Invoice(args) => (ImportKind::Invoice, args),
            Self::InvoiceOutstanding(args) => (ImportKind::InvoiceOutstanding, args),
            Self::InvoiceProduct(args) => (ImportKind::InvoiceProduct, args),
            Self::InvoiceOutstandingProduct(args) => (ImportKind::InvoiceOutstandingProduct, args),
            Self::InvoiceProductMissing(args) => (ImportKind::InvoiceProductMissing, args),
            Self::InvoiceFee(args) => (ImportKind::InvoiceFee, args),
            Self::InvoiceReturn(args) => (ImportKind::InvoiceReturn, args),
            Self::InvoiceReturnProduct(args) => (ImportKind::InvoiceReturnProduct, args),
            Self::Deposit(args) => (ImportKind::Deposit, args),
            Self::Giro(args) => (ImportKind::Giro, args),
            Self::Settlement(args) => (ImportKind::Settlement, args),
            Self::Intransit(args) => (ImportKind::Intransit, args),
            Self::IntransitProduct(args) => (ImportKind::IntransitProduct, args),
            Self::Transfer(args) => (ImportKind::Transfer, args),
            Self::Balance(args) => (ImportKind::Balance, args),
            Self::Dmf(args) => (ImportKind::Dmf, args),
        };
        Some(pair)
    }
}

#[cfg(test)]
pub fn parse_from<I, T>(itr: I) -> Result<Cli, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    Cli::try_parse_from(itr)
}
