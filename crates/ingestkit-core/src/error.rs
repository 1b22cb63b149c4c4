use crate::schema::{Mismatch, Schema};
use std::path::PathBuf;

pub type Result<T, E = IngestError> = std::result::Result<T, E>;

/// Everything that can go wrong while loading, validating or exporting data.
///
/// Backend errors (sqlx, reqwest, csv, xlsx) are flattened into these variants
/// where they happen so callers only ever match on one taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// The path's extension does not match the format the source expects
    #[error("format mismatch for '{}': expected {expected}, found {actual}", .path.display())]
    FormatMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("schema mismatch: {mismatch} (schema: {schema})")]
    SchemaMismatch { mismatch: Mismatch, schema: Schema },

    /// HTTP endpoint or database could not be reached, carries the last HTTP status if any
    #[error("{}", connection_message(.status, *.attempts, .cause.as_deref()))]
    ApiConnection {
        status: Option<u16>,
        attempts: u32,
        cause: Option<String>,
    },

    /// Transport-level failure (refused, timeout, DNS), not an HTTP status
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },

    #[error("query failed: {message}")]
    Query { message: String },

    #[error("unsupported export format '{format}' (expected csv, json or spreadsheet)")]
    UnsupportedFormat { format: String },

    #[error("no data loaded for {source_label}")]
    NotLoaded { source_label: String },

    #[error("failed to read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("export failed: {message}")]
    Export { message: String },

    #[error("invalid dataset: {message}")]
    InvalidDataset { message: String },

    #[error("invalid configuration: {message}")]
    Config { message: String },
}

fn connection_message(status: &Option<u16>, attempts: u32, cause: Option<&str>) -> String {
    let mut msg = match status {
        Some(code) => format!("connection failed with HTTP status {code}"),
        None => "connection failed".to_string(),
    };
    msg.push_str(&format!(" after {attempts} attempt(s)"));
    if let Some(cause) = cause {
        msg.push_str(": ");
        msg.push_str(cause);
    }
    msg
}

impl IngestError {
    /// HTTP status carried by an `ApiConnection` error
    pub fn status(&self) -> Option<u16> {
        match self {
            IngestError::ApiConnection { status, .. } => *status,
            _ => None,
        }
    }

    pub fn parse(what: impl Into<String>, err: impl std::fmt::Display) -> Self {
        IngestError::Parse {
            what: what.into(),
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for IngestError {
    fn from(err: csv::Error) -> Self {
        IngestError::parse("csv", err)
    }
}

impl From<rust_xlsxwriter::XlsxError> for IngestError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        IngestError::Export {
            message: err.to_string(),
        }
    }
}
