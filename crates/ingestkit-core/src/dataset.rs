use crate::error::{IngestError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Read;

/// A named column of values
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

/// In-memory tabular result of a load: ordered columns of equal length
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    columns: Vec<Column>,
}

impl Dataset {
    /// Build a dataset from columns. All columns must have the same length
    /// and column names must be unique.
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        if let Some(first) = columns.first() {
            let len = first.values.len();
            if let Some(bad) = columns.iter().find(|c| c.values.len() != len) {
                return Err(IngestError::InvalidDataset {
                    message: format!(
                        "column '{}' has {} value(s), expected {}",
                        bad.name,
                        bad.values.len(),
                        len
                    ),
                });
            }
        }

        for (i, col) in columns.iter().enumerate() {
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(IngestError::InvalidDataset {
                    message: format!("duplicate column '{}'", col.name),
                });
            }
        }

        Ok(Self { columns })
    }

    /// Build a dataset from a list of JSON objects.
    ///
    /// Column order follows first appearance; keys missing from a record become null.
    pub fn from_records(records: &[Value]) -> Result<Self> {
        let mut names: Vec<String> = Vec::new();
        for (i, record) in records.iter().enumerate() {
            let obj = record.as_object().ok_or_else(|| {
                IngestError::parse("json records", format!("record {} is not an object", i))
            })?;
            for key in obj.keys() {
                if !names.iter().any(|n| n == key) {
                    names.push(key.clone());
                }
            }
        }

        let columns = names
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|r| r.get(&name).cloned().unwrap_or(Value::Null))
                    .collect();
                Column::new(name, values)
            })
            .collect();

        Self::new(columns)
    }

    /// Build a dataset from any of the JSON shapes we accept:
    /// - array of objects (one row each)
    /// - object whose values are all arrays (column oriented)
    /// - any other object (a single row)
    pub fn from_json_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(records) => Self::from_records(records),
            Value::Object(map) if !map.is_empty() && map.values().all(Value::is_array) => {
                let columns = map
                    .iter()
                    .map(|(name, values)| {
                        Column::new(name.clone(), values.as_array().cloned().unwrap_or_default())
                    })
                    .collect();
                Self::new(columns)
            }
            Value::Object(_) => Self::from_records(std::slice::from_ref(value)),
            other => Err(IngestError::parse(
                "json document",
                format!("expected an array or object, found {}", json_kind(other)),
            )),
        }
    }

    /// Parse CSV with a header row. Cells are typed: integers, floats and
    /// booleans are recognised, empty cells become null, the rest stay strings.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::Headers)
            .from_reader(reader);

        let headers: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::new(h.clone(), Vec::new()))
            .collect();

        for record in rdr.records() {
            let record = record?;
            for (col, cell) in columns.iter_mut().zip(record.iter()) {
                col.values.push(infer_cell(cell));
            }
        }

        Self::new(columns)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |c| c.values.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values of row `index`, in column order
    pub fn row(&self, index: usize) -> Option<Vec<&Value>> {
        if index >= self.len() {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.values[index]).collect())
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.len()).map(|i| self.columns.iter().map(|c| &c.values[i]).collect())
    }

    /// First `n` rows as a new dataset
    pub fn head(&self, n: usize) -> Dataset {
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), c.values.iter().take(n).cloned().collect()))
            .collect();
        Dataset { columns }
    }

    /// Rows as JSON objects, keys in column order
    pub fn to_records(&self) -> Vec<Value> {
        self.rows()
            .map(|row| {
                let obj: Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(c, v)| (c.name.clone(), v.clone()))
                    .collect();
                Value::Object(obj)
            })
            .collect()
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.to_records())
            .map_err(|e| IngestError::Export {
                message: e.to_string(),
            })
    }

    pub fn to_csv_string(&self) -> Result<String> {
        let mut wtr = csv::Writer::from_writer(Vec::new());
        wtr.write_record(self.column_names())?;
        for row in self.rows() {
            wtr.write_record(row.into_iter().map(cell_text))?;
        }
        let bytes = wtr.into_inner().map_err(|e| IngestError::Export {
            message: e.to_string(),
        })?;
        String::from_utf8(bytes).map_err(|e| IngestError::Export {
            message: e.to_string(),
        })
    }

    pub(crate) fn columns_mut(&mut self) -> &mut Vec<Column> {
        &mut self.columns
    }
}

/// Text form of a cell for CSV / spreadsheet output
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn infer_cell(cell: &str) -> Value {
    if cell.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = cell.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = cell.parse::<f64>()
        && f.is_finite()
    {
        return Value::from(f);
    }
    match cell {
        "true" | "True" | "TRUE" => Value::Bool(true),
        "false" | "False" | "FALSE" => Value::Bool(false),
        _ => Value::String(cell.to_string()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
