use crate::dataset::Dataset;
use crate::error::{IngestError, Result};
use crate::export::{ExportFormat, ExportOptions, Exported, export};
use crate::schema::Schema;
use crate::transform::TransformPipeline;
use async_trait::async_trait;

/// Rows returned by `get_sample`
pub const SAMPLE_ROWS: usize = 5;

/// When a source performs its first load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadPolicy {
    /// Loaded during construction, construction fails if the load fails (files)
    Eager,
    /// Loaded on first use (HTTP APIs, databases)
    Lazy,
}

/// Result of `DataSource::transform`
#[derive(Debug, Clone, PartialEq)]
pub enum TransformOutcome {
    /// No pipeline is attached, the cached data was left alone
    Unchanged { note: String },
    Transformed(Dataset),
}

/// Uniform capability over every kind of backend.
///
/// Implementors own their connector, their schema and the cached dataset.
/// `load` either fully replaces the cache or leaves it untouched.
#[async_trait]
pub trait DataSource: Send {
    /// Human readable description of where the data comes from
    fn label(&self) -> String;

    fn schema(&self) -> &Schema;

    fn load_policy(&self) -> LoadPolicy;

    /// Fetch, validate and cache the dataset, replacing any previous one
    async fn load(&mut self) -> Result<&Dataset>;

    /// The cached dataset, or `NotLoaded` when nothing was loaded yet
    fn dataset(&self) -> Result<&Dataset>;

    fn pipeline(&self) -> Option<&TransformPipeline> {
        None
    }

    /// Load only if nothing is cached yet
    async fn ensure_loaded(&mut self) -> Result<&Dataset> {
        if self.dataset().is_ok() {
            return self.dataset();
        }
        self.load().await
    }

    /// First `SAMPLE_ROWS` rows of the cached dataset
    fn get_sample(&self) -> Result<Dataset> {
        Ok(self.dataset()?.head(SAMPLE_ROWS))
    }

    /// Apply the attached pipeline to a copy of the cached dataset
    fn transform(&self) -> Result<TransformOutcome> {
        let data = self.dataset()?;
        match self.pipeline() {
            Some(pipeline) if !pipeline.is_empty() => {
                tracing::debug!(source = %self.label(), steps = pipeline.len(), "transforming");
                Ok(TransformOutcome::Transformed(pipeline.apply(data)?))
            }
            _ => Ok(TransformOutcome::Unchanged {
                note: format!("no transformations configured for {}", self.label()),
            }),
        }
    }

    fn export(&self, format: ExportFormat, options: &ExportOptions) -> Result<Exported> {
        export(self.dataset()?, format, options)
    }
}

/// Cached dataset slot shared by the concrete sources
#[derive(Debug, Default)]
pub struct Cache {
    dataset: Option<Dataset>,
}

impl Cache {
    pub fn get(&self, source_label: impl FnOnce() -> String) -> Result<&Dataset> {
        self.dataset.as_ref().ok_or_else(|| IngestError::NotLoaded {
            source_label: source_label(),
        })
    }

    /// Replace the cached dataset and return a reference to it
    pub fn replace(&mut self, dataset: Dataset) -> &Dataset {
        self.dataset.insert(dataset)
    }
}
