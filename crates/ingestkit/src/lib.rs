//! Schema-validated data ingestion.
//!
//! Files, HTTP APIs and PostgreSQL-compatible databases all load into the same
//! [`Dataset`] behind the [`DataSource`] trait, checked against a [`Schema`]
//! before anything is cached.

pub mod config;
pub mod logging;

pub use config::{IngestConfig, SourceConfig, load_config};

pub use ingestkit_core::{
    Column, DataSource, Dataset, DropNullRows, ExportFormat, ExportOptions, Exported, FileFormat,
    FileSource, IngestError, LoadPolicy, Mismatch, RenameColumn, Result, RetryPolicy,
    SAMPLE_ROWS, Schema, SelectColumns, Transform, TransformOutcome, TransformPipeline,
    ValidationOutcome, source_type, validate,
};

pub use ingestkit_api::{ApiEndpoint, ApiSource, HttpConfig, HttpTransport, Transport};
pub use ingestkit_db::{Credentials, DatabaseSource, Dialect, DialectKind, Postgres, Redshift};
