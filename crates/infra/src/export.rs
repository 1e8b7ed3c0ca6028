//! Spreadsheet output.

use std::path::{Path, PathBuf};

use rust_xlsxwriter::{Format, FormatAlign, Workbook, XlsxError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("export io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("xlsx error: {0}")]
    Xlsx(String),

    #[error("export task failed: {0}")]
    Task(String),
}

impl From<XlsxError> for ExportError {
    fn from(value: XlsxError) -> Self {
        ExportError::Xlsx(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    pub fn opt_number(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }
}

/// One worksheet: a bold header row followed by data rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

pub fn write_xlsx(path: &Path, sheet: &Sheet) -> Result<(), ExportError> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold_left = Format::new().set_bold().set_align(FormatAlign::Left);

    for (col, title) in sheet.columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, title, &bold_left)?;
    }
    for (i, row) in sheet.rows.iter().enumerate() {
        let row_num = (i + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(row_num, col, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(row_num, col, *n)?;
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

/// Write on the blocking pool, creating the parent directory first.
pub async fn write_xlsx_file(path: PathBuf, sheet: Sheet) -> Result<(), ExportError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::task::spawn_blocking(move || write_xlsx(&path, &sheet))
        .await
        .map_err(|e| ExportError::Task(e.to_string()))?
}
