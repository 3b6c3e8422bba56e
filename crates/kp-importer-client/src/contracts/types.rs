use serde::Serialize;

/// One importer entry point. Aliases share an implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    Outlet,
    Product,
    Stock,
    Invoice,
    InvoiceOutstanding,
    InvoiceProduct,
    InvoiceOutstandingProduct,
    InvoiceProductMissing,
    InvoiceFee,
    InvoiceReturn,
    InvoiceReturnProduct,
    Deposit,
    Giro,
    Settlement,
    Intransit,
    IntransitProduct,
    Transfer,
    Balance,
    Dmf,
}

impl ImportKind {
    pub const ALL: [ImportKind; 19] = [
        Self::Outlet,
        Self::Product,
        Self::Stock,
        Self::Invoice,
        Self::InvoiceOutstanding,
        Self::InvoiceProduct,
        Self::InvoiceOutstandingProduct,
        Self::InvoiceProductMissing,
        Self::InvoiceFee,
        Self::InvoiceReturn,
        Self::InvoiceReturnProduct,
        Self::Deposit,
        Self::Giro,
        Self::Settlement,
        Self::Intransit,
        Self::IntransitProduct,
        Self::Transfer,
        Self::Balance,
        Self::Dmf,
    ];

    pub const fn command(self) -> &'static str {
        match self {
            Self::Outlet => "outlet",
            Self::Product => "product",
            Self::Stock => "stock",
            Self::Invoice => "invoice",
            Self::InvoiceOutstanding => "invoice-outstanding",
            Self::InvoiceProduct => "invoice-product",
            Self::InvoiceOutstandingProduct => "invoice-outstanding-product",
            Self::InvoiceProductMissing => "invoice-product-missing",
            Self::InvoiceFee => "invoice-fee",
            Self::InvoiceReturn => "invoice-return",
            Self::InvoiceReturnProduct => "invoice-return-product",
            Self::Deposit => "deposit",
            Self::Giro => "giro",
            Self::Settlement => "settlement",
            Self::Intransit => "intransit",
            Self::IntransitProduct => "intransit-product",
            Self::Transfer => "transfer",
            Self::Balance => "balance",
            Self::Dmf => "dmf",
        }
    }

    /// Workbook path used when `--file` is omitted.
    pub fn default_file(self) -> String {
        format!("./uploads/{}.xlsx", self.command().replace('-', "_"))
    }

    pub const fn success_message(self) -> &'static str {
        match self {
            Self::Outlet => "Import Outlet Success",
            Self::Product => "Import Product Success",
            Self::Stock => "Import Initial Stock Success",
            Self::Invoice | Self::InvoiceOutstanding => "Import Sales Invoice Success",
            Self::InvoiceProduct
            | Self::InvoiceOutstandingProduct
            | Self::InvoiceProductMissing => "Import Sales Invoice Product Success",
            Self::InvoiceFee => "Import Sales Invoice Fee Success",
            Self::InvoiceReturn => "Import Sales Invoice Return Success",
            Self::InvoiceReturnProduct => "Import Sales Invoice Return Product Success",
            Self::Deposit => "Import Deposit Success",
            Self::Giro => "Import Giro Success",
            Self::Settlement => "Import Settlement Success",
            Self::Intransit => "Import SKB Central Intransit Success",
            Self::IntransitProduct => "Import SKB Central Intransit Product Success",
            Self::Transfer => "Import Transfer Outstanding Success",
            Self::Balance => "Import Beginning Balance Success",
            Self::Dmf => "Import DMF Success",
        }
    }

    /// Label and link written to the activity log after a successful run.
    pub const fn activity(self) -> (&'static str, Option<&'static str>) {
        match self {
            Self::Outlet => ("IMPORT DATA OUTLET", Some("outlet/view_outlet_list")),
            Self::Product => ("IMPORT DATA PRODUCT", Some("product/view_product_list")),
            Self::Invoice | Self::InvoiceOutstanding => {
                ("IMPORT DATA SALES INVOICE", Some("sales/view_invoice_list"))
            }
            Self::Stock => ("IMPORT DATA INITIAL STOCK", None),
            Self::InvoiceProduct
            | Self::InvoiceOutstandingProduct
            | Self::InvoiceProductMissing => ("IMPORT DATA SALES INVOICE PRODUCT", None),
            Self::InvoiceFee => ("IMPORT DATA SALES INVOICE FEE", None),
            Self::InvoiceReturn => ("IMPORT DATA SALES INVOICE RETURN", None),
            Self::InvoiceReturnProduct => ("IMPORT DATA SALES INVOICE RETURN PRODUCT", None),
            Self::Deposit => ("IMPORT DATA DEPOSIT", None),
            Self::Giro => ("IMPORT DATA GIRO", None),
            Self::Settlement => ("IMPORT DATA SETTLEMENT", None),
            Self::Intransit => ("IMPORT DATA SKB INTRANSIT", None),
            Self::IntransitProduct => ("IMPORT DATA SKB INTRANSIT PRODUCT", None),
            Self::Transfer => ("IMPORT DATA TRANSFER OUTSTANDING", None),
            Self::Balance => ("IMPORT DATA BEGINNING BALANCE", None),
            Self::Dmf => ("IMPORT DATA DMF", None),
        }
    }
}

/// Row counters shared by every importer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_read: i64,
    pub inserted: i64,
    pub skipped: i64,
    pub duplicates: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportReport {
    pub command: String,
    pub message: String,
    pub message_detail: String,
    pub summary: ImportSummary,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitData {
    pub db_path: String,
    pub schema_version: i64,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::ImportKind;

    #[test]
    fn default_files_follow_command_names() {
        assert_eq!(ImportKind::Outlet.default_file(), "./uploads/outlet.xlsx");
        assert_eq!(
            ImportKind::InvoiceReturnProduct.default_file(),
            "./uploads/invoice_return_product.xlsx"
        );
    }

    #[test]
    fn command_names_are_unique() {
        let mut names = ImportKind::ALL
            .iter()
            .map(|kind| kind.command())
            .collect::<Vec<_>>();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ImportKind::ALL.len());
    }

    #[test]
    fn aliases_share_success_messages() {
        assert_eq!(
            ImportKind::InvoiceOutstanding.success_message(),
            ImportKind::Invoice.success_message()
        );
        assert_eq!(
            ImportKind::InvoiceProductMissing.success_message(),
            "Import Sales Invoice Product Success"
        );
    }
}
