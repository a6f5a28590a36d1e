use anyhow::Context;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;

/// A decoded cell. Only the shapes the pipeline distinguishes are kept.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    Date(String),
}

impl CellValue {
    /// Display text, trimmed; `None` when the cell carries nothing.
    pub fn text(&self) -> Option<String> {
        let s = match self {
            CellValue::Empty => return None,
            CellValue::Text(s) | CellValue::Date(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        };
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    /// Header labels are only ever read from text cells.
    pub fn label(&self) -> Option<&str> {
        match self {
            CellValue::Text(s) if !s.trim().is_empty() => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

pub type Row = Vec<CellValue>;

#[derive(Debug, Clone)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Row>,
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => {
                let t = ndt.time();
                if t == chrono::NaiveTime::MIN {
                    CellValue::Date(ndt.format("%Y-%m-%d").to_string())
                } else {
                    CellValue::Date(ndt.format("%Y-%m-%d %H:%M").to_string())
                }
            }
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => CellValue::Date(s.clone()),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

/// Decodes every sheet of an xlsx/xls/xlsb/ods payload into a grid whose row 0
/// and column 0 are the sheet's own A1, whatever range the file declares.
pub fn decode_workbook(bytes: &[u8]) -> anyhow::Result<Vec<SheetGrid>> {
    let mut workbook =
        open_workbook_auto_from_rs(Cursor::new(bytes)).context("open workbook")?;
    let sheet_names = workbook.sheet_names().to_owned();

    let mut out = Vec::with_capacity(sheet_names.len());
    for sheet_name in sheet_names {
        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("read worksheet range {sheet_name}"))?;

        let (row_offset, col_offset) = range.start().unwrap_or((0, 0));
        let mut rows: Vec<Row> = vec![Vec::new(); row_offset as usize];
        for src in range.rows() {
            let mut row: Row = vec![CellValue::Empty; col_offset as usize];
            row.extend(src.iter().map(convert_cell));
            rows.push(row);
        }
        out.push(SheetGrid {
            name: sheet_name,
            rows,
        });
    }
    Ok(out)
}
