use crate::dataset::Dataset;
use crate::error::{IngestError, Result};
use crate::schema::Schema;
use crate::source::{Cache, DataSource, LoadPolicy};
use crate::transform::TransformPipeline;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// File formats a `FileSource` can parse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Csv,
    Json,
}

impl FileFormat {
    /// Format tag as it appears in a file extension
    pub fn tag(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Derive the format tag of a path from its extension, lower-cased
pub fn source_type(path: &Path) -> Result<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| IngestError::FormatMismatch {
            path: path.to_path_buf(),
            expected: "a file extension".to_string(),
            actual: "none".to_string(),
        })
}

/// Local CSV or JSON file, loaded eagerly when constructed
#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    format: FileFormat,
    schema: Schema,
    cache: Cache,
    pipeline: Option<TransformPipeline>,
}

impl FileSource {
    /// Open and load a file. Fails (and returns no source) if the extension
    /// does not match `format`, the file cannot be parsed, or the schema
    /// does not match.
    pub async fn open(path: impl Into<PathBuf>, format: FileFormat, schema: Schema) -> Result<Self> {
        let mut source = Self {
            path: path.into(),
            format,
            schema,
            cache: Cache::default(),
            pipeline: None,
        };
        source.load().await?;
        Ok(source)
    }

    pub async fn csv(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        Self::open(path, FileFormat::Csv, schema).await
    }

    pub async fn json(path: impl Into<PathBuf>, schema: Schema) -> Result<Self> {
        Self::open(path, FileFormat::Json, schema).await
    }

    /// Attach a transform pipeline used by `transform`
    pub fn with_pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    /// Format tag derived from the path
    pub fn source_type(&self) -> Result<String> {
        source_type(&self.path)
    }

    fn check_format(&self) -> Result<()> {
        let actual = self.source_type()?;
        if actual != self.format.tag() {
            return Err(IngestError::FormatMismatch {
                path: self.path.clone(),
                expected: self.format.tag().to_string(),
                actual,
            });
        }
        Ok(())
    }

    async fn read(&self) -> Result<Dataset> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| IngestError::Io {
                path: self.path.clone(),
                source,
            })?;

        match self.format {
            FileFormat::Csv => Dataset::from_csv_reader(bytes.as_slice()),
            FileFormat::Json => {
                let value: serde_json::Value = serde_json::from_slice(&bytes)
                    .map_err(|e| IngestError::parse(self.path.display().to_string(), e))?;
                Dataset::from_json_value(&value)
            }
        }
    }
}

#[async_trait]
impl DataSource for FileSource {
    fn label(&self) -> String {
        format!("{} file {}", self.format, self.path.display())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn load_policy(&self) -> LoadPolicy {
        LoadPolicy::Eager
    }

    async fn load(&mut self) -> Result<&Dataset> {
        // Reject mismatched extensions before touching the file
        self.check_format()?;

        tracing::debug!(path = %self.path.display(), format = %self.format, "loading file");
        let dataset = self.read().await?;

        self.schema
            .validate(&dataset.column_names())
            .into_result(&self.schema)?;

        tracing::info!(
            path = %self.path.display(),
            rows = dataset.len(),
            columns = dataset.width(),
            "loaded file"
        );
        Ok(self.cache.replace(dataset))
    }

    fn dataset(&self) -> Result<&Dataset> {
        self.cache.get(|| self.label())
    }

    fn pipeline(&self) -> Option<&TransformPipeline> {
        self.pipeline.as_ref()
    }
}
