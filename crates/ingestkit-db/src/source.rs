use crate::connection::{ConnectionPool, DEFAULT_CONNECT_TIMEOUT};
use crate::dialect::{Credentials, Dialect};
use crate::query::fetch_dataset;
use async_trait::async_trait;
use ingestkit_core::export::export;
use ingestkit_core::source::Cache;
use ingestkit_core::{
    DataSource, Dataset, ExportFormat, ExportOptions, Exported, IngestError, LoadPolicy, Result,
    RetryPolicy, Schema, TransformPipeline,
};
use serde_json::Value;
use std::time::Duration;

/// Query run by `load`
#[derive(Debug, Clone, PartialEq)]
pub struct SourceQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Relational database source. Connects lazily and holds at most one
/// connection, released by `close_connection` or when the source is dropped.
#[derive(Debug)]
pub struct DatabaseSource {
    credentials: Credentials,
    dialect: Box<dyn Dialect>,
    schema: Schema,
    retry: RetryPolicy,
    connect_timeout: Duration,
    query: Option<SourceQuery>,
    export_options: ExportOptions,
    conn: Option<ConnectionPool>,
    cache: Cache,
    pipeline: Option<TransformPipeline>,
}

impl DatabaseSource {
    /// Describe a database source. No connection is opened here.
    pub fn new(credentials: Credentials, dialect: impl Dialect + 'static, schema: Schema) -> Self {
        Self::with_dialect(credentials, Box::new(dialect), schema)
    }

    pub fn with_dialect(credentials: Credentials, dialect: Box<dyn Dialect>, schema: Schema) -> Self {
        Self {
            credentials,
            dialect,
            schema,
            retry: RetryPolicy::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            query: None,
            export_options: ExportOptions::default(),
            conn: None,
            cache: Cache::default(),
            pipeline: None,
        }
    }

    /// Set the query `load` runs
    pub fn with_query(mut self, sql: impl Into<String>, params: Vec<Value>) -> Self {
        self.query = Some(SourceQuery {
            sql: sql.into(),
            params,
        });
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Per-attempt connect timeout, retries come on top of it
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_export_options(mut self, options: ExportOptions) -> Self {
        self.export_options = options;
        self
    }

    pub fn with_pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn dialect(&self) -> &dyn Dialect {
        self.dialect.as_ref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Connection string for the configured dialect. Contains the password.
    pub fn connection_url(&self) -> String {
        self.dialect.connection_url(&self.credentials)
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Open the connection if it is not open yet
    pub async fn connect(&mut self) -> Result<&ConnectionPool> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                tracing::debug!(
                    dialect = self.dialect.name(),
                    host = %self.credentials.host,
                    database = %self.credentials.database,
                    "connecting"
                );
                ConnectionPool::connect(&self.connection_url(), &self.retry, self.connect_timeout)
                    .await?
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Run a parameterized query, connecting first if needed
    pub async fn run_query(&mut self, sql: &str, params: &[Value]) -> Result<Dataset> {
        let conn = self.connect().await?;
        fetch_dataset(conn.pool(), sql, params).await
    }

    /// Run a query and serialize the result.
    ///
    /// The format is checked before anything touches the database, so an
    /// unsupported format performs no I/O at all.
    pub async fn export_data(&mut self, sql: &str, params: &[Value], format: &str) -> Result<Exported> {
        let format: ExportFormat = format.parse()?;
        let data = self.run_query(sql, params).await?;
        export(&data, format, &self.export_options)
    }

    /// Release the connection. Safe to call any number of times.
    pub async fn close_connection(&mut self) {
        if let Some(conn) = self.conn.take() {
            conn.close().await;
            tracing::debug!(dialect = self.dialect.name(), "connection closed");
        }
    }
}

#[async_trait]
impl DataSource for DatabaseSource {
    fn label(&self) -> String {
        format!(
            "{} database {}/{}",
            self.dialect.name(),
            self.credentials.host,
            self.credentials.database
        )
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn load_policy(&self) -> LoadPolicy {
        LoadPolicy::Lazy
    }

    async fn load(&mut self) -> Result<&Dataset> {
        let query = self.query.clone().ok_or_else(|| IngestError::Config {
            message: format!("no query configured for {}", self.label()),
        })?;

        let dataset = self.run_query(&query.sql, &query.params).await?;
        self.schema
            .validate(&dataset.column_names())
            .into_result(&self.schema)?;

        tracing::info!(
            source = %self.label(),
            rows = dataset.len(),
            columns = dataset.width(),
            "loaded query result"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::{Postgres, Redshift};

    fn source() -> DatabaseSource {
        DatabaseSource::new(
            Credentials::new("ingest", "secret", "127.0.0.1", Some(1), "ingest"),
            Postgres,
            Schema::fields(["id"]),
        )
        .with_retry(RetryPolicy::new(1, Duration::from_millis(10)))
    }

    #[test]
    fn test_new_does_not_connect() {
        let src = source();
        assert!(!src.is_connected());
        assert_eq!(src.load_policy(), LoadPolicy::Lazy);
        assert!(matches!(src.dataset(), Err(IngestError::NotLoaded { .. })));
    }

    #[test]
    fn test_connection_url_uses_dialect() {
        let src = DatabaseSource::new(
            Credentials::new("u", "p", "warehouse.example.com", None, "dw"),
            Redshift,
            Schema::count(1),
        );
        assert_eq!(
            src.connection_url(),
            "postgres://u:p@warehouse.example.com:5439/dw?sslmode=require"
        );
        assert_eq!(src.label(), "redshift database warehouse.example.com/dw");
    }

    #[tokio::test]
    async fn test_unsupported_export_format_skips_database() {
        // port 1 would fail to connect: getting UnsupportedFormat proves we never tried
        let mut src = source();
        let err = src.export_data("SELECT 1", &[], "xml").await.unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedFormat { .. }));
        assert!(!src.is_connected());
    }

    #[tokio::test]
    async fn test_load_without_query_is_config_error() {
        let mut src = source();
        assert!(matches!(
            src.load().await,
            Err(IngestError::Config { .. })
        ));
    }

    #[tokio::test]
    async fn test_close_connection_is_idempotent() {
        let mut src = source();
        src.close_connection().await;
        src.close_connection().await;
        assert!(!src.is_connected());
    }
}
