use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use calamine::{Data, Range, Reader, Sheets, open_workbook_auto};

use crate::import::cell::Row;
use crate::import::parse::{excel_serial_to_date, format_iso_date};
use crate::{ClientError, ClientResult};

/// An opened spreadsheet whose sheets are read as positional text rows.
pub(crate) struct Workbook {
    sheets: Sheets<BufReader<File>>,
}

impl Workbook {
    pub(crate) fn open(path: &Path) -> ClientResult<Self> {
        if !path.is_file() {
            return Err(ClientError::file_not_found(path));
        }
        let sheets = open_workbook_auto(path)
            .map_err(|error| ClientError::workbook_open_failed(path, &error.to_string()))?;
        Ok(Self { sheets })
    }

    pub(crate) fn sheet_names(&self) -> Vec<String> {
        self.sheets.sheet_names()
    }

    pub(crate) fn first_sheet_name(&self) -> ClientResult<String> {
        self.sheet_names()
            .into_iter()
            .next()
            .ok_or_else(ClientError::workbook_empty)
    }

    /// Every row of `sheet` from the top-left corner, so index 0 is the first
    /// sheet row even when leading rows or columns are blank.
    pub(crate) fn rows(&mut self, sheet: &str) -> ClientResult<Vec<Row>> {
        if !self.sheet_names().iter().any(|name| name == sheet) {
            return Err(ClientError::sheet_not_found(sheet));
        }
        let range = self
            .sheets
            .worksheet_range(sheet)
            .map_err(|error| ClientError::sheet_read_failed(sheet, &error.to_string()))?;
        Ok(range_rows(&range))
    }
}

fn range_rows(range: &Range<Data>) -> Vec<Row> {
    let Some((last_row, last_col)) = range.end() else {
        return Vec::new();
    };
    (0..=last_row)
        .map(|row| {
            let cells = (0..=last_col)
                .map(|col| range.get_value((row, col)).map(render_cell).unwrap_or_default())
                .collect();
            Row::new(cells)
        })
        .collect()
}

/// Renders a cell the way it reads on screen: whole numbers without a
/// fraction and date cells as `YYYY-MM-DD`.
pub(crate) fn render_cell(cell: &Data) -> String {
    match cell {
        Data::String(text) => text.clone(),
        Data::Int(value) => value.to_string(),
        Data::Float(value) => {
            if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
                (*value as i64).to_string()
            } else {
                value.to_string()
            }
        }
        Data::Bool(value) => value.to_string(),
        Data::DateTime(value) => excel_serial_to_date(value.as_f64())
            .map(|date| format_iso_date(&date))
            .unwrap_or_else(|| value.as_f64().to_string()),
        Data::DateTimeIso(text) => text.split('T').next().unwrap_or_default().to_string(),
        Data::DurationIso(text) => text.clone(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}
