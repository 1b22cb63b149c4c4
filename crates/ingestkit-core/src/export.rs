use crate::dataset::Dataset;
use crate::error::{IngestError, Result};
use rust_xlsxwriter::Workbook;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default location of spreadsheet exports
pub const DEFAULT_SPREADSHEET_PATH: &str = "output.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Csv,
    Json,
    Spreadsheet,
}

impl FromStr for ExportFormat {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            "spreadsheet" | "xlsx" | "excel" => Ok(ExportFormat::Spreadsheet),
            _ => Err(IngestError::UnsupportedFormat {
                format: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => write!(f, "csv"),
            ExportFormat::Json => write!(f, "json"),
            ExportFormat::Spreadsheet => write!(f, "spreadsheet"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    /// Where spreadsheet exports are written
    pub spreadsheet_path: PathBuf,
    /// Worksheet name used for spreadsheet exports
    pub sheet_name: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            spreadsheet_path: PathBuf::from(DEFAULT_SPREADSHEET_PATH),
            sheet_name: "data".to_string(),
        }
    }
}

impl ExportOptions {
    pub fn spreadsheet_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.spreadsheet_path = path.into();
        self
    }
}

/// What an export produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Exported {
    /// Serialized CSV or JSON text
    Text(String),
    /// A file written to disk
    File(PathBuf),
}

impl Exported {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Exported::Text(text) => Some(text),
            Exported::File(_) => None,
        }
    }
}

/// Serialize a dataset. Only the spreadsheet format touches the filesystem.
pub fn export(data: &Dataset, format: ExportFormat, options: &ExportOptions) -> Result<Exported> {
    tracing::debug!(%format, rows = data.len(), "exporting dataset");
    match format {
        ExportFormat::Csv => Ok(Exported::Text(data.to_csv_string()?)),
        ExportFormat::Json => Ok(Exported::Text(data.to_json_string()?)),
        ExportFormat::Spreadsheet => {
            write_spreadsheet(data, &options.spreadsheet_path, &options.sheet_name)?;
            Ok(Exported::File(options.spreadsheet_path.clone()))
        }
    }
}

fn write_spreadsheet(data: &Dataset, path: &Path, sheet_name: &str) -> Result<()> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name(sheet_name)?;

    for (col, column) in data.columns().iter().enumerate() {
        let col = u16::try_from(col).map_err(|_| IngestError::Export {
            message: "too many columns for a spreadsheet".to_string(),
        })?;
        sheet.write_string(0, col, &column.name)?;

        for (row, value) in column.values.iter().enumerate() {
            let row = u32::try_from(row + 1).map_err(|_| IngestError::Export {
                message: "too many rows for a spreadsheet".to_string(),
            })?;
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    sheet.write_boolean(row, col, *b)?;
                }
                Value::Number(n) => match n.as_f64() {
                    Some(f) => {
                        sheet.write_number(row, col, f)?;
                    }
                    None => {
                        sheet.write_string(row, col, n.to_string())?;
                    }
                },
                Value::String(s) => {
                    sheet.write_string(row, col, s)?;
                }
                other => {
                    sheet.write_string(row, col, other.to_string())?;
                }
            }
        }
    }

    workbook.save(path)?;
    tracing::info!(path = %path.display(), rows = data.len(), "wrote spreadsheet");
    Ok(())
}
