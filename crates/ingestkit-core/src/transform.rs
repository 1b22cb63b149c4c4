use crate::dataset::{Column, Dataset};
use crate::error::{IngestError, Result};
use serde_json::Value;
use std::fmt;

/// One step of a transformation pipeline. Steps never mutate their input.
pub trait Transform: Send + Sync {
    fn name(&self) -> String;

    fn apply(&self, data: &Dataset) -> Result<Dataset>;
}

/// Ordered list of transforms applied to a copy of a source's dataset
#[derive(Default)]
pub struct TransformPipeline {
    steps: Vec<Box<dyn Transform>>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step
    pub fn with(mut self, step: impl Transform + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn apply(&self, data: &Dataset) -> Result<Dataset> {
        let mut current = data.clone();
        for step in &self.steps {
            current = step.apply(&current)?;
        }
        Ok(current)
    }
}

impl fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = self.steps.iter().map(|s| s.name()).collect();
        f.debug_struct("TransformPipeline")
            .field("steps", &names)
            .finish()
    }
}

/// Keep only the named columns, in the given order
pub struct SelectColumns {
    names: Vec<String>,
}

impl SelectColumns {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for SelectColumns {
    fn name(&self) -> String {
        format!("select({})", self.names.join(", "))
    }

    fn apply(&self, data: &Dataset) -> Result<Dataset> {
        let columns = self
            .names
            .iter()
            .map(|name| {
                data.column(name).cloned().ok_or_else(|| IngestError::InvalidDataset {
                    message: format!("cannot select unknown column '{}'", name),
                })
            })
            .collect::<Result<Vec<Column>>>()?;
        Dataset::new(columns)
    }
}

pub struct RenameColumn {
    from: String,
    to: String,
}

impl RenameColumn {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Transform for RenameColumn {
    fn name(&self) -> String {
        format!("rename({} -> {})", self.from, self.to)
    }

    fn apply(&self, data: &Dataset) -> Result<Dataset> {
        if data.column(&self.from).is_none() {
            return Err(IngestError::InvalidDataset {
                message: format!("cannot rename unknown column '{}'", self.from),
            });
        }
        let mut out = data.clone();
        for col in out.columns_mut().iter_mut() {
            if col.name == self.from {
                col.name = self.to.clone();
            }
        }
        // re-check for collisions with an existing column
        Dataset::new(out.columns().to_vec())
    }
}

/// Drop every row that has a null in any of the given columns
/// (all columns when none are given)
pub struct DropNullRows {
    columns: Vec<String>,
}

impl DropNullRows {
    pub fn any() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    pub fn in_columns<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transform for DropNullRows {
    fn name(&self) -> String {
        if self.columns.is_empty() {
            "drop_nulls(*)".to_string()
        } else {
            format!("drop_nulls({})", self.columns.join(", "))
        }
    }

    fn apply(&self, data: &Dataset) -> Result<Dataset> {
        let checked: Vec<&Column> = if self.columns.is_empty() {
            data.columns().iter().collect()
        } else {
            self.columns
                .iter()
                .map(|name| {
                    data.column(name).ok_or_else(|| IngestError::InvalidDataset {
                        message: format!("unknown column '{}'", name),
                    })
                })
                .collect::<Result<_>>()?
        };

        let keep: Vec<usize> = (0..data.len())
            .filter(|&i| checked.iter().all(|c| !c.values[i].is_null()))
            .collect();

        let columns = data
            .columns()
            .iter()
            .map(|c| {
                let values: Vec<Value> = keep.iter().map(|&i| c.values[i].clone()).collect();
                Column::new(c.name.clone(), values)
            })
            .collect();
        Dataset::new(columns)
    }
}
