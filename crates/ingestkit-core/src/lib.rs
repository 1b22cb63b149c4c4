pub mod dataset;
pub mod error;
pub mod export;
pub mod file;
pub mod retry;
pub mod schema;
pub mod source;
pub mod transform;

pub use dataset::{Column, Dataset};
pub use error::{IngestError, Result};
pub use export::{ExportFormat, ExportOptions, Exported};
pub use file::{FileFormat, FileSource, source_type};
pub use retry::{Attempt, RetryFailure, RetryPolicy, with_backoff};
pub use schema::{Mismatch, Schema, ValidationOutcome, validate};
pub use source::{DataSource, LoadPolicy, SAMPLE_ROWS, TransformOutcome};
pub use transform::{DropNullRows, RenameColumn, SelectColumns, Transform, TransformPipeline};
