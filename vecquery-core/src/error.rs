//! Error types for vecquery operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// A single entry of a GraphQL `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphQLError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<ErrorLocation>,
}

/// Line/column position of a GraphQL error inside the query document.
/// Missing coordinates read as 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorLocation {
    pub line: u32,
    pub column: u32,
}

impl GraphQLError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            path: Vec::new(),
            locations: Vec::new(),
        }
    }

    /// Read one `errors` entry without rejecting unexpected shapes.
    ///
    /// A missing or non-string `message` falls back to the entry's JSON
    /// text; malformed `path` or `locations` are dropped.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let message = match value.get("message") {
            Some(serde_json::Value::String(message)) => message.clone(),
            _ => value.to_string(),
        };
        let path = value
            .get("path")
            .and_then(serde_json::Value::as_array)
            .cloned()
            .unwrap_or_default();
        let locations = value
            .get("locations")
            .and_then(serde_json::Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|item| serde_json::from_value(item.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        Self {
            message,
            path,
            locations,
        }
    }
}

/// Failure reported by the query service.
///
/// Either a non-success HTTP status (`status` is set) or a non-empty
/// GraphQL `errors` array on an otherwise successful response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub status: Option<u16>,
    pub errors: Vec<GraphQLError>,
}

impl ServerError {
    pub fn from_errors(errors: Vec<GraphQLError>) -> Self {
        Self {
            status: None,
            errors,
        }
    }

    pub fn from_status(status: u16, errors: Vec<GraphQLError>) -> Self {
        Self {
            status: Some(status),
            errors,
        }
    }

    /// All error messages joined with `"; "`.
    pub fn messages(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.messages()),
            None => write!(f, "{}", self.messages()),
        }
    }
}

/// Master error type for all vecquery errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum QueryError {
    #[error("Invalid argument for {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error("Incomplete request: {field} is required")]
    IncompleteRequest { field: &'static str },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Server error: {0}")]
    Server(ServerError),

    #[error("Decode error at {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("Request cancelled")]
    Cancelled,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,
}

impl QueryError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    pub fn decode(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for failures detected before anything was sent.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::IncompleteRequest { .. }
        )
    }

    /// True when repeating the same request could succeed.
    ///
    /// The library never retries on its own; this is a hint for callers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { .. } | Self::DeadlineExceeded => true,
            Self::Server(err) => matches!(err.status, Some(status) if status >= 500),
            _ => false,
        }
    }
}

impl From<ServerError> for QueryError {
    fn from(err: ServerError) -> Self {
        Self::Server(err)
    }
}

/// Result type alias for vecquery operations.
pub type QueryResult<T> = Result<T, QueryError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_argument_display() {
        let err = QueryError::invalid("limit", "must be >= 0, got -1");
        let msg = format!("{}", err);
        assert!(msg.contains("limit"));
        assert!(msg.contains("-1"));
    }

    #[test]
    fn test_incomplete_request_display() {
        let err = QueryError::IncompleteRequest { field: "class_name" };
        assert!(format!("{}", err).contains("class_name"));
    }

    #[test]
    fn test_server_error_display_with_status() {
        let err = QueryError::from(ServerError::from_status(
            422,
            vec![GraphQLError::new("no such class"), GraphQLError::new("bad")],
        ));
        let msg = format!("{}", err);
        assert!(msg.contains("HTTP 422"));
        assert!(msg.contains("no such class; bad"));
    }

    #[test]
    fn test_decode_error_display_carries_path() {
        let err = QueryError::decode("data.Get.JeopardyQuestion[1].answer", "missing");
        assert!(format!("{}", err).contains("data.Get.JeopardyQuestion[1].answer"));
    }

    #[test]
    fn test_classification() {
        assert!(QueryError::invalid("offset", "negative").is_client_side());
        assert!(!QueryError::Cancelled.is_client_side());
        assert!(QueryError::DeadlineExceeded.is_retryable());
        assert!(!QueryError::Cancelled.is_retryable());
        assert!(QueryError::from(ServerError::from_status(503, vec![])).is_retryable());
        assert!(!QueryError::from(ServerError::from_errors(vec![])).is_retryable());
    }

    #[test]
    fn test_graphql_error_deserializes_without_optional_parts() {
        let err: GraphQLError = serde_json::from_str(r#"{"message":"boom"}"#).unwrap();
        assert_eq!(err, GraphQLError::new("boom"));
    }
}
