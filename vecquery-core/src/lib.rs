//! vecquery Core - Request Model and Response Decoding
//!
//! Pure data types for similarity-search queries against a vector database
//! GraphQL `Get` API. No I/O lives here: requests are built and rendered to
//! a query document, response bodies are decoded into typed objects. The
//! HTTP transport is in `vecquery-client`.
//!
//! # Example
//! ```
//! use vecquery_core::{FieldSelector, NearText, SearchRequest};
//!
//! let request = SearchRequest::builder()
//!     .with_class_name("JeopardyQuestion")
//!     .with_fields([
//!         FieldSelector::new("question"),
//!         FieldSelector::new("answer"),
//!         FieldSelector::additional(["distance"]),
//!     ])
//!     .with_near_text(NearText::new(["animals in movies"]))
//!     .with_limit(2)
//!     .build()?;
//!
//! assert!(request.to_query().starts_with("{Get{JeopardyQuestion("));
//! # Ok::<(), vecquery_core::QueryError>(())
//! ```

pub mod error;
pub mod field;
pub mod filter;
pub mod graphql;
pub mod near;
pub mod request;
pub mod response;

pub use error::{ErrorLocation, GraphQLError, QueryError, QueryResult, ServerError};
pub use field::{FieldSelector, ADDITIONAL};
pub use filter::{FilterOperator, FilterValue, PredicateBuilder, WhereFilter};
pub use near::{NearClause, NearObject, NearText, NearVector, Threshold};
pub use request::{GroupBy, GroupByArgs, SearchRequest, SearchRequestBuilder, GET_OPERATION, MAX_COUNT};
pub use response::{
    decode_response, decode_value, Additional, GroupInfo, GroupedBy, ResultObject, SearchResponse,
};
