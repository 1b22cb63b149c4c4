//! Layered configuration for ingestkit.
//!
//! Uses `figment`: built-in defaults -> optional TOML file -> `INGESTKIT_`
//! environment variables (`__` separates nested keys, so
//! `INGESTKIT_RETRY__MAX_RETRIES=5` sets `retry.max_retries`).

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use ingestkit_api::{ApiEndpoint, ApiSource, HttpConfig};
use ingestkit_core::{
    DataSource, ExportOptions, FileFormat, FileSource, IngestError, Result, RetryPolicy, Schema,
};
use ingestkit_db::{Credentials, DatabaseSource, DialectKind};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "INGESTKIT_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Backoff used by API and database sources without their own policy
    pub retry: RetryPolicy,
    pub http: HttpConfig,
    pub export: ExportOptions,
    /// Named sources
    pub sources: BTreeMap<String, SourceConfig>,
}

/// One named source entry, tagged by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Csv {
        path: PathBuf,
        schema: Schema,
    },
    Json {
        path: PathBuf,
        schema: Schema,
    },
    Api {
        base_url: String,
        endpoint: String,
        schema: Schema,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        #[serde(default)]
        params: BTreeMap<String, String>,
        #[serde(default)]
        retry: Option<RetryPolicy>,
    },
    Database {
        #[serde(default)]
        dialect: DialectKind,
        credentials: Credentials,
        schema: Schema,
        /// Query run on load
        #[serde(default)]
        query: Option<String>,
        #[serde(default)]
        params: Vec<Value>,
        #[serde(default)]
        retry: Option<RetryPolicy>,
        #[serde(default)]
        connect_timeout_secs: Option<u64>,
    },
}

impl SourceConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceConfig::Csv { .. } => "csv",
            SourceConfig::Json { .. } => "json",
            SourceConfig::Api { .. } => "api",
            SourceConfig::Database { .. } => "database",
        }
    }
}

/// Load configuration, layering an optional TOML file and the environment
/// over the defaults. An explicit path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let mut figment = Figment::from(Serialized::defaults(IngestConfig::default()));

    if let Some(path) = path {
        if !path.exists() {
            return Err(IngestError::Config {
                message: format!("config file not found: {}", path.display()),
            });
        }
        figment = figment.merge(Toml::file(path));
    }

    figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: IngestConfig = figment.extract().map_err(|e| IngestError::Config {
        message: e.to_string(),
    })?;
    tracing::debug!(sources = config.sources.len(), "configuration loaded");
    Ok(config)
}

impl IngestConfig {
    pub fn source_config(&self, name: &str) -> Result<&SourceConfig> {
        self.sources.get(name).ok_or_else(|| IngestError::Config {
            message: format!("no source named '{}'", name),
        })
    }

    /// Open a named csv or json source. Files load eagerly, so this reads
    /// and validates the file.
    pub async fn open_file_source(&self, name: &str) -> Result<FileSource> {
        match self.source_config(name)? {
            SourceConfig::Csv { path, schema } => {
                FileSource::open(path, FileFormat::Csv, schema.clone()).await
            }
            SourceConfig::Json { path, schema } => {
                FileSource::open(path, FileFormat::Json, schema.clone()).await
            }
            other => Err(wrong_kind(name, "file", other)),
        }
    }

    /// Build a named API source. Nothing is requested until it is loaded.
    pub fn api_source(&self, name: &str) -> Result<ApiSource> {
        match self.source_config(name)? {
            SourceConfig::Api {
                base_url,
                endpoint,
                schema,
                headers,
                params,
                retry,
            } => {
                let mut ep = ApiEndpoint::new(base_url.as_str(), endpoint.as_str());
                for (k, v) in headers {
                    ep = ep.header(k.as_str(), v.as_str());
                }
                for (k, v) in params {
                    ep = ep.param(k.as_str(), v.as_str());
                }
                let source = ApiSource::new(ep, schema.clone(), &self.http)?
                    .with_retry(retry.clone().unwrap_or_else(|| self.retry.clone()));
                Ok(source)
            }
            other => Err(wrong_kind(name, "api", other)),
        }
    }

    /// Build a named database source. Connects on first use.
    pub fn database_source(&self, name: &str) -> Result<DatabaseSource> {
        match self.source_config(name)? {
            SourceConfig::Database {
                dialect,
                credentials,
                schema,
                query,
                params,
                retry,
                connect_timeout_secs,
            } => {
                let mut source =
                    DatabaseSource::with_dialect(credentials.clone(), dialect.dialect(), schema.clone())
                        .with_retry(retry.clone().unwrap_or_else(|| self.retry.clone()))
                        .with_export_options(self.export.clone());
                if let Some(sql) = query {
                    source = source.with_query(sql.as_str(), params.clone());
                }
                if let Some(secs) = connect_timeout_secs {
                    source = source.with_connect_timeout(Duration::from_secs(*secs));
                }
                Ok(source)
            }
            other => Err(wrong_kind(name, "database", other)),
        }
    }

    /// Build any named source behind the common trait
    pub async fn source(&self, name: &str) -> Result<Box<dyn DataSource>> {
        let source: Box<dyn DataSource> = match self.source_config(name)? {
            SourceConfig::Csv { .. } | SourceConfig::Json { .. } => {
                Box::new(self.open_file_source(name).await?)
            }
            SourceConfig::Api { .. } => Box::new(self.api_source(name)?),
            SourceConfig::Database { .. } => Box::new(self.database_source(name)?),
        };
        Ok(source)
    }
}

fn wrong_kind(name: &str, wanted: &str, found: &SourceConfig) -> IngestError {
    IngestError::Config {
        message: format!(
            "source '{}' is a {} source, not a {} source",
            name,
            found.kind(),
            wanted
        ),
    }
}
