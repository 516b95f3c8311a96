use crate::error::AppError;
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Workbook,
    Delimited,
}

impl SheetFormat {
    /// Accepted upload extensions; anything else is refused before parsing.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(SheetFormat::Workbook),
            "csv" => Some(SheetFormat::Delimited),
            _ => None,
        }
    }
}

/// One data row of an uploaded sheet, keyed by normalized header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetRow {
    /// 1-based line in the sheet; the header occupies line 1.
    pub line: usize,
    pub fields: BTreeMap<String, String>,
}

impl SheetRow {
    /// Non-empty cell text under a header, if any.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .map(|s| s.as_str())
            .filter(|s| !s.is_empty())
    }

    pub fn text(&self, key: &str) -> &str {
        self.field(key).unwrap_or("")
    }
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_lowercase()
}

/// Reads the first worksheet (or the whole CSV) into normalized rows.
pub fn read_rows(path: &Path, format: SheetFormat) -> Result<Vec<SheetRow>, AppError> {
    let grid = match format {
        SheetFormat::Workbook => read_workbook_grid(path)?,
        SheetFormat::Delimited => read_csv_grid(path)?,
    };
    Ok(rows_from_grid(grid))
}

fn read_workbook_grid(path: &Path) -> Result<Vec<Vec<String>>, AppError> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(range) = workbook.worksheet_range_at(0) else {
        return Ok(Vec::new());
    };
    let range = range?;
    Ok(range
        .rows()
        .map(|cells| cells.iter().map(cell_text).collect())
        .collect())
}

fn read_csv_grid(path: &Path) -> Result<Vec<Vec<String>>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record?;
        // The reader skips blank lines; pad them back so row numbers match the file.
        if let Some(pos) = record.position() {
            while !grid.is_empty() && (grid.len() as u64) + 1 < pos.line() {
                grid.push(Vec::new());
            }
        }
        grid.push(record.iter().map(|s| s.to_string()).collect());
    }
    Ok(grid)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => number_text(*f),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => number_text(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        _ => String::new(),
    }
}

/// Integral floats drop the fractional part: spreadsheets store `5` as `5.0`.
pub fn number_text(v: f64) -> String {
    if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// First grid row is the header. Blank rows are dropped but keep their line numbers.
fn rows_from_grid(grid: Vec<Vec<String>>) -> Vec<SheetRow> {
    let mut lines = grid.into_iter();
    let Some(header) = lines.next() else {
        return Vec::new();
    };
    let keys: Vec<String> = header.iter().map(|h| normalize_key(h)).collect();

    let mut rows = Vec::new();
    for (i, cells) in lines.enumerate() {
        let mut fields = BTreeMap::new();
        for (key, value) in keys.iter().zip(cells.iter()) {
            if key.is_empty() {
                continue;
            }
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            fields
                .entry(key.clone())
                .or_insert_with(|| value.to_string());
        }
        if fields.is_empty() {
            continue;
        }
        rows.push(SheetRow {
            line: i + 2,
            fields,
        });
    }
    rows
}
