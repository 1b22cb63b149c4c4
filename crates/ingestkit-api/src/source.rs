use crate::endpoint::ApiEndpoint;
use crate::transport::{HttpConfig, HttpTransport, RawResponse, Transport};
use async_trait::async_trait;
use ingestkit_core::source::Cache;
use ingestkit_core::{
    Attempt, DataSource, Dataset, IngestError, LoadPolicy, Mismatch, Result, RetryPolicy, Schema,
    TransformPipeline, ValidationOutcome, with_backoff,
};
use serde_json::Value;

/// Why a single request attempt failed
#[derive(Debug)]
enum RequestFailure {
    Status(u16),
    Transport(IngestError),
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestFailure::Status(status) => write!(f, "HTTP status {}", status),
            RequestFailure::Transport(err) => write!(f, "{}", err),
        }
    }
}

/// JSON HTTP endpoint. Nothing is fetched until the first `load`.
#[derive(Debug)]
pub struct ApiSource<T: Transport = HttpTransport> {
    endpoint: ApiEndpoint,
    schema: Schema,
    retry: RetryPolicy,
    transport: T,
    cache: Cache,
    pipeline: Option<TransformPipeline>,
}

impl ApiSource<HttpTransport> {
    /// Source using a reqwest client built from `http`
    pub fn new(endpoint: ApiEndpoint, schema: Schema, http: &HttpConfig) -> Result<Self> {
        Ok(Self::with_transport(endpoint, schema, HttpTransport::new(http)?))
    }
}

impl<T: Transport> ApiSource<T> {
    pub fn with_transport(endpoint: ApiEndpoint, schema: Schema, transport: T) -> Self {
        Self {
            endpoint,
            schema,
            retry: RetryPolicy::default(),
            transport,
            cache: Cache::default(),
            pipeline: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_pipeline(mut self, pipeline: TransformPipeline) -> Self {
        self.pipeline = Some(pipeline);
        self
    }

    pub fn endpoint(&self) -> &ApiEndpoint {
        &self.endpoint
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn build_url(&self) -> String {
        self.endpoint.build_url()
    }

    /// GET the endpoint and parse the JSON body.
    ///
    /// - 200: parsed body
    /// - 404: `ApiConnection { status: 404 }` straight away, never retried
    /// - other statuses: retried with doubling delay, then `ApiConnection`
    ///   carrying the last status
    /// - transport failures: `Request` straight away, unless the retry policy
    ///   opts into retrying them
    pub async fn request_data(&self) -> Result<Value> {
        let url = self.build_url();
        let retry_transport = self.retry.retry_transport_errors;

        let result = with_backoff(&self.retry, &url, |attempt| {
            let url = url.as_str();
            async move {
                tracing::debug!(url, attempt, "requesting");
                match self
                    .transport
                    .get(url, &self.endpoint.headers, &self.endpoint.params)
                    .await
                {
                    Ok(RawResponse { status: 200, body }) => Ok(body),
                    Ok(RawResponse { status: 404, .. }) => {
                        Err(Attempt::Abort(RequestFailure::Status(404)))
                    }
                    Ok(RawResponse { status, .. }) => {
                        Err(Attempt::Retry(RequestFailure::Status(status)))
                    }
                    Err(err) if retry_transport => {
                        Err(Attempt::Retry(RequestFailure::Transport(err)))
                    }
                    Err(err) => Err(Attempt::Abort(RequestFailure::Transport(err))),
                }
            }
        })
        .await;

        match result {
            Ok(body) => serde_json::from_str(&body).map_err(|e| IngestError::parse(url, e)),
            Err(failure) => Err(match failure.error {
                RequestFailure::Status(status) => IngestError::ApiConnection {
                    status: Some(status),
                    attempts: failure.attempts,
                    cause: None,
                },
                RequestFailure::Transport(err) if failure.exhausted => {
                    IngestError::ApiConnection {
                        status: None,
                        attempts: failure.attempts,
                        cause: Some(err.to_string()),
                    }
                }
                RequestFailure::Transport(err) => err,
            }),
        }
    }

    /// Check the parsed body against the schema.
    ///
    /// For an object every schema field must be a top-level key. For an array
    /// of records the columns gathered from all records are checked. Any other
    /// body, including arrays holding non-objects, has no fields at all.
    pub fn validate_response(&self, body: &Value) -> Result<()> {
        let outcome = match body {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().map(String::as_str).collect();
                self.schema.validate(&keys)
            }
            Value::Array(items) if items.iter().all(Value::is_object) => {
                let dataset = Dataset::from_json_value(body)?;
                self.schema.validate(&dataset.column_names())
            }
            _ => self.schema.validate::<&str>(&[]),
        };

        if let ValidationOutcome::Fail(Mismatch::MissingFields { missing }) = &outcome {
            tracing::warn!(url = %self.build_url(), ?missing, "response is missing fields");
        }
        outcome.into_result(&self.schema)
    }
}

#[async_trait]
impl<T: Transport> DataSource for ApiSource<T> {
    fn label(&self) -> String {
        format!("api {}", self.build_url())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn load_policy(&self) -> LoadPolicy {
        LoadPolicy::Lazy
    }

    async fn load(&mut self) -> Result<&Dataset> {
        let body = self.request_data().await?;
        self.validate_response(&body)?;
        let dataset = Dataset::from_json_value(&body)?;

        tracing::info!(
            url = %self.build_url(),
            rows = dataset.len(),
            columns = dataset.width(),
            "loaded api response"
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
