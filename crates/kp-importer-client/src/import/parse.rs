use chrono::{Datelike, Duration, NaiveDate};
use tracing::warn;

/// Serial of 9999-12-31 in the 1900 date system.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

const TEXT_DATE_LAYOUTS: [&str; 7] = [
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d %b %Y",
    "%Y/%m/%d",
    "%d.%m.%Y",
    "%d-%b-%Y",
];

pub(crate) fn format_iso_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Converts a 1900-system spreadsheet serial to a calendar date.
///
/// Serials below 61 sit before the phantom 1900-02-29, so they count from one
/// day later than the rest.
pub(crate) fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let days = serial.trunc() as i64;
    let epoch = if days < 61 {
        NaiveDate::from_ymd_opt(1899, 12, 31)?
    } else {
        NaiveDate::from_ymd_opt(1899, 12, 30)?
    };
    epoch.checked_add_signed(Duration::days(days))
}

/// Best-effort date parsing for loosely formatted cells.
///
/// Tries a spreadsheet serial first, then the fixed text layouts, then a manual
/// `D/M/Y` split that expands two-digit years. Returns `YYYY-MM-DD`, or `None`
/// (logged) when nothing matches.
pub(crate) fn parse_date(cell: Option<&str>) -> Option<String> {
    let text = cell?.trim();
    if text.is_empty() {
        return None;
    }

    if let Some(date) = parse_serial(text) {
        return Some(format_iso_date(&date));
    }

    for layout in TEXT_DATE_LAYOUTS {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout)
            && date.year() >= 1000
        {
            return Some(format_iso_date(&date));
        }
    }

    if let Some(date) = parse_slash_date(text) {
        return Some(format_iso_date(&date));
    }

    warn!(value = text, "cannot parse date, storing NULL");
    None
}

/// Invoice-sheet date parsing: `DD/MM/YYYY`, then ISO, then a serial.
///
/// Unrecognized text is passed through unchanged for the database to judge.
pub(crate) fn parse_excel_date(value: &str) -> String {
    let text = value.trim();
    if text.is_empty() {
        return String::new();
    }
    for layout in ["%d/%m/%Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, layout)
            && date.year() >= 1000
        {
            return format_iso_date(&date);
        }
    }
    if let Some(date) = parse_serial(text) {
        return format_iso_date(&date);
    }
    text.to_string()
}

fn parse_serial(text: &str) -> Option<NaiveDate> {
    let serial = text.parse::<f64>().ok()?;
    excel_serial_to_date(serial)
}

fn parse_slash_date(text: &str) -> Option<NaiveDate> {
    let parts = text.split('/').map(str::trim).collect::<Vec<_>>();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    let mut year_value = year.parse::<i32>().ok()?;
    if year.len() == 2 {
        year_value += if year_value >= 50 { 1900 } else { 2000 };
    }
    let day_value = day.parse::<u32>().ok()?;
    let month_value = month.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year_value, month_value, day_value)
}

/// Locale-aware float parsing.
///
/// When both `,` and `.` appear, whichever comes last is the decimal
/// separator; a lone `,` is a decimal separator. Anything unparseable is `0.0`.
pub(crate) fn denorm_float(value: Option<&str>) -> f64 {
    let Some(raw) = value else {
        return 0.0;
    };
    let mut text = raw.trim().replace(' ', "");
    if text.is_empty() {
        return 0.0;
    }

    match (text.rfind(','), text.rfind('.')) {
        (Some(comma), Some(dot)) => {
            if comma > dot {
                text = text.replace('.', "").replace(',', ".");
            } else {
                text = text.replace(',', "");
            }
        }
        (Some(_), None) => {
            text = text.replace(',', ".");
        }
        _ => {}
    }

    match text.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed,
        _ => 0.0,
    }
}

/// Integer parsing that drops `,` and `.` thousands separators, falling back
/// to a truncated float. Anything unparseable is `0`.
pub(crate) fn denorm_int(value: Option<&str>) -> i64 {
    let Some(raw) = value else {
        return 0;
    };
    let text = raw.trim().replace([',', '.'], "");
    if text.is_empty() {
        return 0;
    }
    if let Ok(parsed) = text.parse::<i64>() {
        return parsed;
    }
    match text.parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed.trunc() as i64,
        _ => 0,
    }
}

/// Strips thousands commas for columns that store numeric text.
pub(crate) fn denormalize_number(value: Option<&str>) -> String {
    match value {
        None | Some("") => "0".to_string(),
        Some(text) => text.replace(',', ""),
    }
}

/// Float parsing for item sheets, which only ever use `,` as a thousands mark.
pub(crate) fn plain_float(value: Option<&str>) -> f64 {
    let text = value.unwrap_or("").replace(',', "");
    match text.trim().parse::<f64>() {
        Ok(parsed) if parsed.is_finite() => parsed,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        denorm_float, denorm_int, denormalize_number, excel_serial_to_date, format_iso_date,
        parse_date, parse_excel_date, plain_float,
    };

    #[test]
    fn parse_date_accepts_every_text_layout() {
        let cases = [
            ("2025-09-29", "2025-09-29"),
            ("29/09/2025", "2025-09-29"),
            ("9/3/2025", "2025-03-09"),
            ("29-09-2025", "2025-09-29"),
            ("29 Sep 2025", "2025-09-29"),
            ("2025/09/29", "2025-09-29"),
            ("29.09.2025", "2025-09-29"),
            ("9-Sep-2025", "2025-09-09"),
        ];
        for (input, expected) in cases {
            assert_eq!(parse_date(Some(input)), Some(expected.to_string()), "{input}");
        }
    }

    #[test]
    fn parse_date_reads_spreadsheet_serials() {
        assert_eq!(parse_date(Some("45929")), Some("2025-09-29".to_string()));
        assert_eq!(parse_date(Some("1")), Some("1900-01-01".to_string()));
        assert_eq!(parse_date(Some("61")), Some("1900-03-01".to_string()));
    }

    #[test]
    fn parse_date_expands_two_digit_years() {
        assert_eq!(parse_date(Some("31/12/25")), Some("2025-12-31".to_string()));
        assert_eq!(parse_date(Some("1/2/75")), Some("1975-02-01".to_string()));
    }

    #[test]
    fn parse_date_returns_none_for_garbage() {
        assert_eq!(parse_date(Some("besok pagi")), None);
        assert_eq!(parse_date(Some("31/02/2025")), None);
        assert_eq!(parse_date(Some("   ")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn parse_excel_date_passes_unknown_text_through() {
        assert_eq!(parse_excel_date("29/09/2025"), "2025-09-29");
        assert_eq!(parse_excel_date("2025-09-29"), "2025-09-29");
        assert_eq!(parse_excel_date("45929"), "2025-09-29");
        assert_eq!(parse_excel_date("Sept 29"), "Sept 29");
        assert_eq!(parse_excel_date(""), "");
    }

    #[test]
    fn serial_conversion_rejects_out_of_range_values() {
        assert!(excel_serial_to_date(-1.0).is_none());
        assert!(excel_serial_to_date(f64::NAN).is_none());
        assert!(excel_serial_to_date(1.0e12).is_none());
        let date = excel_serial_to_date(45929.75);
        assert!(date.is_some());
        if let Some(value) = date {
            assert_eq!(format_iso_date(&value), "2025-09-29");
        }
    }

    #[test]
    fn denorm_float_detects_decimal_convention() {
        assert_eq!(denorm_float(Some("1.234,56")), 1234.56);
        assert_eq!(denorm_float(Some("1,234.56")), 1234.56);
        assert_eq!(denorm_float(Some("12,5")), 12.5);
        assert_eq!(denorm_float(Some("1 500 000")), 1_500_000.0);
        assert_eq!(denorm_float(Some("-250.75")), -250.75);
    }

    #[test]
    fn denorm_float_is_zero_when_unparseable() {
        assert_eq!(denorm_float(Some("abc")), 0.0);
        assert_eq!(denorm_float(Some("")), 0.0);
        assert_eq!(denorm_float(None), 0.0);
        assert_eq!(denorm_float(Some("inf")), 0.0);
    }

    #[test]
    fn denorm_int_strips_thousands_separators() {
        assert_eq!(denorm_int(Some("1,250")), 1250);
        assert_eq!(denorm_int(Some("1.250")), 1250);
        assert_eq!(denorm_int(Some(" 42 ")), 42);
        assert_eq!(denorm_int(Some("1e3")), 1000);
        assert_eq!(denorm_int(Some("-")), 0);
        assert_eq!(denorm_int(None), 0);
    }

    #[test]
    fn denormalize_number_keeps_text_but_drops_commas() {
        assert_eq!(denormalize_number(Some("1,500,000")), "1500000");
        assert_eq!(denormalize_number(Some("12.5")), "12.5");
        assert_eq!(denormalize_number(Some("")), "0");
        assert_eq!(denormalize_number(None), "0");
    }

    #[test]
    fn plain_float_drops_commas_only() {
        assert_eq!(plain_float(Some("1,500.5")), 1500.5);
        assert_eq!(plain_float(Some("x")), 0.0);
        assert_eq!(plain_float(None), 0.0);
    }
}
