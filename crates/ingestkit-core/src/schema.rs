use crate::error::{IngestError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Declared shape of a dataset: either required field names or a field count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Schema {
    /// Fields that must be present. Extra observed fields are tolerated.
    Fields(Vec<String>),
    /// Exact number of fields expected
    Count(usize),
}

impl Schema {
    /// Build a field schema, dropping duplicate names but keeping first-seen order
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let fields = names
            .into_iter()
            .map(Into::into)
            .filter(|name: &String| seen.insert(name.clone()))
            .collect();
        Schema::Fields(fields)
    }

    pub fn count(n: usize) -> Self {
        Schema::Count(n)
    }

    /// Validate observed field names against this schema
    pub fn validate<S: AsRef<str>>(&self, observed: &[S]) -> ValidationOutcome {
        validate(self, observed)
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schema::Fields(fields) => write!(f, "[{}]", fields.join(", ")),
            Schema::Count(n) => write!(f, "{} field(s)", n),
        }
    }
}

/// Why an observed set of fields failed validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Mismatch {
    /// Required fields absent from the observed set, in schema order
    MissingFields { missing: Vec<String> },
    FieldCount { expected: usize, observed: usize },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::MissingFields { missing } => {
                write!(f, "missing field(s): {}", missing.join(", "))
            }
            Mismatch::FieldCount { expected, observed } => {
                write!(f, "expected {} field(s), found {}", expected, observed)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Pass,
    Fail(Mismatch),
}

impl ValidationOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, ValidationOutcome::Pass)
    }

    /// Turn a failed outcome into a `SchemaMismatch` error carrying the schema
    pub fn into_result(self, schema: &Schema) -> Result<()> {
        match self {
            ValidationOutcome::Pass => Ok(()),
            ValidationOutcome::Fail(mismatch) => Err(IngestError::SchemaMismatch {
                mismatch,
                schema: schema.clone(),
            }),
        }
    }
}

/// Check observed field names against a schema.
///
/// A count schema passes iff the number of observed fields matches exactly.
/// A field schema passes iff every declared field was observed.
pub fn validate<S: AsRef<str>>(schema: &Schema, observed: &[S]) -> ValidationOutcome {
    match schema {
        Schema::Count(expected) => {
            if observed.len() == *expected {
                ValidationOutcome::Pass
            } else {
                ValidationOutcome::Fail(Mismatch::FieldCount {
                    expected: *expected,
                    observed: observed.len(),
                })
            }
        }
        Schema::Fields(fields) => {
            let present: HashSet<&str> = observed.iter().map(AsRef::as_ref).collect();
            let missing: Vec<String> = fields
                .iter()
                .filter(|f| !present.contains(f.as_str()))
                .cloned()
                .collect();

            if missing.is_empty() {
                ValidationOutcome::Pass
            } else {
                ValidationOutcome::Fail(Mismatch::MissingFields { missing })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fields_exact_match_passes() {
        let schema = Schema::fields(["id", "name"]);
        assert!(schema.validate(&["name", "id"]).is_pass());
    }

    #[test]
    fn test_fields_superset_passes() {
        let schema = Schema::fields(["id", "name"]);
        assert!(schema.validate(&["id", "name", "email", "age"]).is_pass());
    }

    #[test]
    fn test_fields_missing_reported_in_schema_order() {
        let schema = Schema::fields(["id", "name", "email"]);
        let outcome = schema.validate(&["name"]);

        assert_eq!(
            outcome,
            ValidationOutcome::Fail(Mismatch::MissingFields {
                missing: vec!["id".to_string(), "email".to_string()]
            })
        );
    }

    #[test]
    fn test_empty_field_schema_always_passes() {
        let schema = Schema::fields(Vec::<String>::new());
        assert!(schema.validate::<&str>(&[]).is_pass());
        assert!(schema.validate(&["anything"]).is_pass());
    }

    #[test]
    fn test_count_schema() {
        let schema = Schema::count(3);
        assert!(schema.validate(&["a", "b", "c"]).is_pass());
        assert_eq!(
            schema.validate(&["a", "b"]),
            ValidationOutcome::Fail(Mismatch::FieldCount {
                expected: 3,
                observed: 2
            })
        );
        assert!(!schema.validate(&["a", "b", "c", "d"]).is_pass());
    }

    #[test]
    fn test_duplicate_fields_collapsed() {
        let schema = Schema::fields(["id", "id", "name"]);
        assert_eq!(
            schema,
            Schema::Fields(vec!["id".to_string(), "name".to_string()])
        );
    }

    #[test]
    fn test_into_result_carries_schema() {
        let schema = Schema::fields(["id"]);
        let err = schema.validate(&["name"]).into_result(&schema).unwrap_err();

        match err {
            IngestError::SchemaMismatch { mismatch, schema: s } => {
                assert_eq!(
                    mismatch,
                    Mismatch::MissingFields {
                        missing: vec!["id".to_string()]
                    }
                );
                assert_eq!(s, schema);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_schema_deserializes_from_list_or_count() {
        let fields: Schema = serde_json::from_str(r#"["id", "name"]"#).unwrap();
        assert_eq!(fields, Schema::fields(["id", "name"]));

        let count: Schema = serde_json::from_str("4").unwrap();
        assert_eq!(count, Schema::count(4));
    }

    #[test]
    fn test_display() {
        assert_eq!(Schema::fields(["id", "name"]).to_string(), "[id, name]");
        assert_eq!(Schema::count(2).to_string(), "2 field(s)");
    }
}
