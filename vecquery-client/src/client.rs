//! HTTP transport for similarity searches.

use crate::config::{ClientConfig, ConfigError};
use crate::context::RequestContext;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::Instrument;
use vecquery_core::{
    decode_response, GraphQLError, QueryError, QueryResult, SearchRequest, SearchResponse,
    ServerError,
};

/// Path of the GraphQL endpoint below the service root.
pub const GRAPHQL_PATH: &str = "/v1/graphql";

#[derive(Debug, Serialize)]
struct GraphQLRequest<'a> {
    query: &'a str,
}

/// Error bodies come as a GraphQL envelope or as a REST `error` list.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<serde_json::Value>,
    #[serde(default)]
    error: Vec<serde_json::Value>,
}

/// Client for the query service. Cheap to clone; clones share the
/// connection pool.
#[derive(Clone)]
pub struct VectorClient {
    client: reqwest::Client,
    graphql_url: String,
}

impl VectorClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .default_headers(build_headers(config)?)
            .build()?;
        Ok(Self {
            client,
            graphql_url: format!("{}{}", config.endpoint_root(), GRAPHQL_PATH),
        })
    }

    pub fn graphql_url(&self) -> &str {
        &self.graphql_url
    }

    /// Run one search. Exactly one HTTP round trip, no retries.
    pub async fn execute(
        &self,
        request: &SearchRequest,
        ctx: &RequestContext,
    ) -> QueryResult<SearchResponse> {
        let span = tracing::info_span!("vector_query", class = %request.class_name());
        let result = ctx.run(self.send(request)).instrument(span.clone()).await;
        span.in_scope(|| match &result {
            Ok(response) => tracing::debug!(objects = response.len(), "query succeeded"),
            Err(QueryError::Cancelled) => tracing::warn!("query cancelled"),
            Err(QueryError::DeadlineExceeded) => tracing::warn!("query deadline exceeded"),
            Err(err) => tracing::warn!(error = %err, "query failed"),
        });
        result
    }

    async fn send(&self, request: &SearchRequest) -> QueryResult<SearchResponse> {
        let query = request.to_query();
        tracing::debug!(url = %self.graphql_url, query = %query, "sending query");

        let response = self
            .client
            .post(&self.graphql_url)
            .json(&GraphQLRequest { query: &query })
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;
        if !status.is_success() {
            return Err(ServerError::from_status(status.as_u16(), error_messages(status, &body)).into());
        }
        decode_response(request, &body)
    }
}

impl std::fmt::Debug for VectorClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorClient")
            .field("graphql_url", &self.graphql_url)
            .finish()
    }
}

fn build_headers(config: &ClientConfig) -> Result<HeaderMap, ConfigError> {
    let mut headers = HeaderMap::new();
    if let Some(auth) = &config.auth {
        let value = format!("Bearer {}", auth.api_key);
        let mut value = HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidValue {
            field: "auth.api_key".to_string(),
            reason: e.to_string(),
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    for (name, value) in &config.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidValue {
                field: format!("headers.{}", name),
                reason: e.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidValue {
            field: format!("headers.{}", name),
            reason: e.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

fn transport_error(err: reqwest::Error) -> QueryError {
    if err.is_timeout() {
        return QueryError::DeadlineExceeded;
    }
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        reason.push_str(": ");
        reason.push_str(&cause.to_string());
        source = cause.source();
    }
    QueryError::Transport { reason }
}

fn error_messages(status: reqwest::StatusCode, body: &[u8]) -> Vec<GraphQLError> {
    if let Ok(parsed) = serde_json::from_slice::<ErrorBody>(body) {
        let errors: Vec<GraphQLError> = parsed
            .errors
            .iter()
            .chain(parsed.error.iter())
            .map(GraphQLError::from_value)
            .collect();
        if !errors.is_empty() {
            return errors;
        }
    }
    let text = String::from_utf8_lossy(body);
    let message = if text.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        text.trim().to_string()
    };
    vec![GraphQLError::new(message)]
}
