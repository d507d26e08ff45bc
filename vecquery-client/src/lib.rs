//! vecquery Client - HTTP Execution of Similarity Searches
//!
//! Sends a [`SearchRequest`] to the service's GraphQL endpoint and decodes
//! the reply into a [`SearchResponse`]. Each call is bounded by a
//! [`RequestContext`] carrying a cancellation token and an optional
//! deadline.
//!
//! ```no_run
//! use std::time::Duration;
//! use vecquery_client::{ClientConfig, RequestContext, VectorClient};
//! use vecquery_core::{FieldSelector, NearText, SearchRequest};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = VectorClient::new(&ClientConfig::new("http://localhost:8080", 30_000))?;
//! let request = SearchRequest::builder()
//!     .with_class_name("JeopardyQuestion")
//!     .with_fields([FieldSelector::new("question"), FieldSelector::additional(["distance"])])
//!     .with_near_text(NearText::new(["animals in movies"]))
//!     .with_limit(2)
//!     .build()?;
//! let ctx = RequestContext::background().with_timeout(Duration::from_secs(5));
//! let response = client.execute(&request, &ctx).await?;
//! for object in response.objects("JeopardyQuestion") {
//!     println!("{:?} {:?}", object.get_str("question"), object.distance());
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod context;

pub use client::{VectorClient, GRAPHQL_PATH};
pub use config::{AuthConfig, ClientConfig, ConfigError, CONFIG_ENV};
pub use context::RequestContext;
pub use tokio_util::sync::CancellationToken;
pub use vecquery_core::{QueryError, QueryResult, SearchRequest, SearchResponse};
