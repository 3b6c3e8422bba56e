mod support;

use kp_importer_client::ImportKind;
use serde_json::Value;
use support::import_kit::scenario;

const INVOICE_HEADER: [&str; 17] = [
    "Tanggal", "No Faktur", "Catatan", "Cabang", "Outlet", "Divisi", "Principal", "Pembayaran",
    "Sumber", "Rayon", "Salesman", "Materai", "Nominal", "PPN", "Diskon", "Tipe", "No Retur",
];
const ITEM_HEADER: [&str; 11] = [
    "No Faktur", "Kode Produk", "Produk", "Qty", "Bonus", "Harga", "Disc Reguler",
    "Disc Program", "Catatan", "Batch", "ED",
];
const RETURN_HEADER: [&str; 10] = [
    "Tanggal", "No Retur", "Catatan", "Cabang", "Keterangan", "Divisi", "Cash Disc", "Total",
    "Tipe", "Outlet",
];
const RETURN_ITEM_HEADER: [&str; 10] = [
    "No Retur", "Kode Produk", "Qty", "Bonus", "Batch", "Produk", "ED", "Harga", "Disc Reguler",
    "Disc Program",
];

const BRANCH_AND_OUTLET: &str =
    "INSERT INTO list_branch (branch_id, branch_name, branch_code) VALUES (5, 'Jakarta', 'JKT');
     INSERT INTO list_outlet (outlet_id, outlet_name, outlet_code, branch_id)
        VALUES (1001, 'Apotek Sehat', 'O1', 5);
     INSERT INTO list_product (product_id, product_name, product_code) VALUES (10, 'Paracetamol', 'P-01');";

#[test]
fn invoices_then_their_lines_build_orders_invoices_and_skbs() {
    let scenario = scenario();
    assert!(scenario.is_some());
    if let Some(scenario) = scenario {
        scenario.seed(BRANCH_AND_OUTLET);
        scenario.seed(
            "INSERT INTO list_sales_source (source_id, source_name) VALUES (1, 'sales');
             INSERT INTO list_invoice_return (return_invoice_id, return_number) VALUES (9, 'RET-9');
             INSERT INTO rel_return_invoice_stb (return_invoice_id, product_id, qty) VALUES (9, 10, 1);",
        );
        let invoices = scenario.workbook(
            "invoice.xlsx",
            "Faktur",
            &[
                &INVOICE_HEADER,
                &[
                    "2024-01-15", "INV-1", "Faktur lama", "JKT", "O1", "Pharmacy", "", "CREDIT",
                    "Sales", "R1", "andi", "Ya", "1,500,000", "11", "0", "Reguler", "RET-9",
                ],
                &[
                    "16/01/2024", "INV-2", "", "JKT", "O1", "Hoslab", "", "cash", "Sales", "R1",
                    "andi", "", "250000", "11", "-", "Konsinyasi",
                ],
                &[
                    "2024-01-17", "INV-1", "", "JKT", "O1", "", "", "", "Sales", "R1", "andi", "",
                    "1", "11", "0", "Reguler",
                ],
                &[
                    "2024-01-18", "INV-3", "", "XXX", "O1", "", "", "", "Sales", "R1", "andi", "",
                    "1", "11", "0", "Reguler",
                ],
            ],
        );

        let result = scenario.import(ImportKind::Invoice, &invoices);
        assert!(result.is_ok());
        if let Ok(envelope) = result {
            assert_eq!(envelope.data["summary"]["rows_read"], Value::from(4));
            assert_eq!(envelope.data["summary"]["inserted"], Value::from(2));
            assert_eq!(envelope.data["summary"]["duplicates"], Value::from(1));
            assert_eq!(envelope.data["summary"]["skipped"], Value::from(1));
        }
        assert_eq!(scenario.count("SELECT COUNT(*) FROM list_sales_order WHERE is_legacy = 1"), 2);
        assert_eq!(scenario.count("SELECT COUNT(*) FROM list_sales_invoice"), 2);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_sales_invoice
                 WHERE sales_invoice_number = 'INV-2' AND sales_invoice_date = '2024-01-16'
                   AND sales_invoice_type_id = 2 AND division_id = 2 AND payment_method = 'Cash'"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_skb s JOIN list_warehouse w ON w.warehouse_id = s.issuer_warehouse_id
                 WHERE (s.skb_number = 'INV-1' AND s.skb_type_id = 6 OR s.skb_number = 'INV-2' AND s.skb_type_id = 5)
                   AND s.destination = 'Apotek Sehat' AND s.issuer = 'Jakarta' AND w.warehouse_name = 'Default'"
            ),
            2
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM list_warehouse"), 1);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_region
                 WHERE region_code = 'R1' AND branch_id = 5 AND region_purpose_id = 1"
            ),
            1
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM gemstone_admin WHERE admin_name = 'andi'"), 1);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_return_invoice_stb r
                 JOIN list_sales_invoice i ON i.sales_invoice_id = r.reference_id
                 WHERE r.return_invoice_id = 9 AND i.sales_invoice_number = 'INV-1'
                   AND i.is_return_invoice = 1"
            ),
            1
        );

        // an SKB that already carried items keeps only those
        scenario.seed(
            "INSERT INTO rel_skb_item (skb_id, product_id, qty)
             SELECT skb_id, 10, 1 FROM list_skb WHERE skb_number = 'INV-2';",
        );
        let lines = scenario.workbook(
            "invoice_product.xlsx",
            "Produk Faktur",
            &[
                &ITEM_HEADER,
                &["INV-1", "P-01", "Paracetamol", "4", "1", "10000", "10", "0", "", "B1", "2026-01-31"],
                &["INV-1", "P-01", "Paracetamol", "2", "", "10000", "10", "0", "", "B1", "2026-01-31"],
                &["INV-1", "P-02", "Vitamin C", "3", "", "5000", "", "", "", "B2", "2026-05-31"],
                &["INV-2", "P-01", "Paracetamol", "5", "", "10000", "", "", "", "B9", "2026-01-31"],
                &["INV-404", "P-01", "Paracetamol", "1", "", "100"],
            ],
        );

        let result = scenario.import(ImportKind::InvoiceProduct, &lines);
        assert!(result.is_ok());
        if let Ok(envelope) = result {
            assert_eq!(envelope.data_str("message"), Some("Import Sales Invoice Product Success"));
            assert_eq!(envelope.data["summary"]["rows_read"], Value::from(5));
            assert_eq!(envelope.data["summary"]["inserted"], Value::from(4));
            assert_eq!(envelope.data["summary"]["skipped"], Value::from(1));
        }

        assert_eq!(scenario.count("SELECT COUNT(*) FROM list_product"), 2);
        assert_eq!(scenario.count("SELECT COUNT(*) FROM rel_sales_order_item"), 4);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_order_item r
                 JOIN list_sales_order o ON o.sales_order_id = r.sales_order_id
                 WHERE o.sales_number = 'INV-1' AND r.product_id = 10 AND r.qty = 6
                   AND r.qty_extra = 0 AND r.temp_iteration = 2"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_order_item extra
                 JOIN rel_sales_order_item main ON main.rel_id = extra.group_id
                 WHERE extra.qty = 0 AND extra.qty_extra = 1 AND main.qty = 6"
            ),
            1
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM rel_sales_invoice_item"), 4);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_invoice_item r
                 JOIN gemstone_admin a ON a.admin_id = r.salesman_id
                 WHERE a.admin_name = 'andi'"
            ),
            4
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_invoice_item WHERE batch_number IS NOT NULL"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_skb_item r JOIN list_skb s ON s.skb_id = r.skb_id
                 WHERE s.skb_number = 'INV-1' AND r.reference_type_id = 5"
            ),
            4
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_skb_item r JOIN list_skb s ON s.skb_id = r.skb_id
                 WHERE s.skb_number = 'INV-1' AND r.is_extra = 1 AND r.qty = 1"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_skb_item r JOIN list_skb s ON s.skb_id = r.skb_id
                 WHERE s.skb_number = 'INV-2'"
            ),
            1
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM rel_sales_invoice_skb"), 2);
    }
}

#[test]
fn invoice_fees_attach_to_known_invoices() {
    let scenario = scenario();
    assert!(scenario.is_some());
    if let Some(scenario) = scenario {
        scenario.seed(
            "INSERT INTO list_sales_invoice (sales_invoice_id, sales_invoice_number) VALUES (50, 'INV-50');",
        );
        let file = scenario.workbook(
            "invoice_fee.xlsx",
            "Biaya",
            &[
                &["No Faktur", "Biaya", "Nominal"],
                &["INV-50", "Ongkos Kirim", "25000"],
                &["INV-50", "Biaya Admin", "5000,50"],
                &["INV-404", "Ongkos Kirim", "1000"],
                &["INV-50", "Materai"],
            ],
        );

        let result = scenario.import(ImportKind::InvoiceFee, &file);
        assert!(result.is_ok());
        if let Ok(envelope) = result {
            let detail = envelope.data_str("message_detail").unwrap_or("");
            assert!(detail.starts_with("Total 2 rows inserted"));
            assert_eq!(envelope.data["summary"]["rows_read"], Value::from(3));
            assert_eq!(envelope.data["summary"]["skipped"], Value::from(1));
        }
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_invoice_fees
                 WHERE sales_invoice_id = 50 AND fee_type_id = 2 AND amount = 25000"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_sales_invoice_fees
                 WHERE sales_invoice_id = 50 AND fee_type_id = 1 AND amount = 5000.5"
            ),
            1
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM rel_sales_invoice_fees"), 2);
    }
}

#[test]
fn invoice_returns_then_their_lines_fill_the_return_vouchers() {
    let scenario = scenario();
    assert!(scenario.is_some());
    if let Some(scenario) = scenario {
        scenario.seed(BRANCH_AND_OUTLET);
        scenario.seed(
            "INSERT INTO list_product (product_id, product_name, product_code) VALUES (11, 'Vitamin C', 'P-02');
             INSERT INTO list_warehouse (warehouse_id, warehouse_name, warehouse_type_id, branch_id)
                VALUES (1, 'Gudang Utama', 1, 5), (2, 'Gudang Retur', 2, 5);",
        );
        let returns = scenario.workbook(
            "invoice_return.xlsx",
            "Retur",
            &[
                &RETURN_HEADER,
                &[
                    "2024-02-01", "RET-1", "Retur rusak", "Jakarta", "", "Pharmacy", "0", "150000",
                    "RO Barang Rusak", "O1",
                ],
                &[
                    "2024-02-02", "RET-2", "", "Jakarta", "", "Hoslab", "0", "90000",
                    "RO Barang Reguler", "O1",
                ],
                &["2024-02-02", "RET-1", "", "Jakarta", "", "", "0", "1", "RO Barang Rusak", "O1"],
                &["2024-02-03", "RET-3", "", "Bandung", "", "", "0", "1", "RO Barang Rusak", "O1"],
            ],
        );

        let result = scenario.import(ImportKind::InvoiceReturn, &returns);
        assert!(result.is_ok());
        if let Ok(envelope) = result {
            assert_eq!(envelope.data["summary"]["inserted"], Value::from(2));
            assert_eq!(envelope.data["summary"]["duplicates"], Value::from(1));
            assert_eq!(envelope.data["summary"]["skipped"], Value::from(1));
        }
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_invoice_return
                 WHERE return_number = 'RET-1' AND return_date = '2024-02-01' AND branch_id = 5
                   AND outlet_id = 1001 AND division_id = 1 AND total_return = 150000"
            ),
            1
        );
        assert_eq!(scenario.count("SELECT COUNT(*) FROM list_invoice_return"), 2);
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_stb
                 WHERE stb_number = 'RET-1' AND stb_type_id = 2 AND destination_warehouse_id = 2
                   AND issuer_id = 1001 AND destination_id = 5 AND is_return_invoice_sales = 1"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM list_stb
                 WHERE stb_number = 'RET-2' AND stb_type_id = 12 AND destination_warehouse_id = 1"
            ),
            1
        );

        // a return that already has lines is left alone
        scenario.seed(
            "INSERT INTO rel_return_invoice_stb (return_invoice_id, product_id, qty)
             SELECT return_invoice_id, 10, 1 FROM list_invoice_return WHERE return_number = 'RET-2';",
        );
        let lines = scenario.workbook(
            "invoice_return_product.xlsx",
            "Produk Retur",
            &[
                &RETURN_ITEM_HEADER,
                &["RET-1", "P-01", "5", "1", "B1", "Paracetamol", "2026-01-31", "10000", "10", "5"],
                &["RET-1", "P-02", "2", "", "B2", "Vitamin C", "2026-06-30", "5000", "0", "0"],
                &["RET-1", "P-01", "0", "", "B1", "Paracetamol", "", "10000", "0", "0"],
                &["RET-2", "P-01", "3", "", "B1", "Paracetamol", "", "10000", "0", "0"],
                &["RET-404", "P-01", "1", "", "B1", "Paracetamol", "", "1", "0", "0"],
            ],
        );

        let result = scenario.import(ImportKind::InvoiceReturnProduct, &lines);
        assert!(result.is_ok());
        if let Ok(envelope) = result {
            assert_eq!(envelope.data["summary"]["rows_read"], Value::from(5));
            assert_eq!(envelope.data["summary"]["inserted"], Value::from(2));
            assert_eq!(envelope.data["summary"]["duplicates"], Value::from(1));
            assert_eq!(envelope.data["summary"]["skipped"], Value::from(2));
        }
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_return_invoice_stb r
                 JOIN list_invoice_return ir ON ir.return_invoice_id = r.return_invoice_id
                 JOIN list_stb s ON s.stb_id = r.stb_id
                 WHERE ir.return_number = 'RET-1' AND s.stb_number = 'RET-1'
                   AND r.reference_type_id = 1"
            ),
            2
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_return_invoice_stb
                 WHERE product_id = 10 AND qty = 5 AND qty_extra = 1 AND hna = 50000
                   AND discount_extra = 10000 AND total_price = 38500
                   AND expired_date = '2026-01-31'"
            ),
            1
        );
        assert_eq!(
            scenario.count(
                "SELECT COUNT(*) FROM rel_return_invoice_stb r
                 JOIN list_invoice_return ir ON ir.return_invoice_id = r.return_invoice_id
                 WHERE ir.return_number = 'RET-2'"
            ),
            1
        );
    }
}
