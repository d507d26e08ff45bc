//! vecquery Test Utilities
//!
//! Centralized test infrastructure for the vecquery workspace:
//! - Proptest generators for request parts
//! - Canned response fixtures modeled on the Jeopardy demo dataset
//! - A mock GraphQL endpoint built on wiremock
//! - Custom assertions for the documented response properties

// Re-export core types for convenience
pub use vecquery_core::{
    FieldSelector, FilterOperator, FilterValue, GroupBy, NearClause, NearObject, NearText,
    NearVector, QueryError, QueryResult, ResultObject, SearchRequest, SearchResponse, WhereFilter,
};

use std::sync::Once;

static TRACING: Once = Once::new();

/// Install a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_test_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for generating request parts.

    use super::*;
    use proptest::prelude::*;
    use uuid::Uuid;

    /// Valid collection name: leading letter, then alphanumerics.
    pub fn arb_class_name() -> impl Strategy<Value = String> {
        "[A-Z][A-Za-z0-9_]{0,24}"
    }

    /// Property name that is never `_additional`.
    pub fn arb_property_name() -> impl Strategy<Value = String> {
        "[a-z][A-Za-z0-9]{0,15}"
    }

    /// Distinct leaf property selectors.
    pub fn arb_properties() -> impl Strategy<Value = Vec<String>> {
        prop::collection::btree_set(arb_property_name(), 1..6)
            .prop_map(|names| names.into_iter().collect())
    }

    /// Field tree of bounded depth with distinct names per level.
    pub fn arb_field_tree() -> impl Strategy<Value = Vec<FieldSelector>> {
        let leaf = arb_property_name().prop_map(FieldSelector::new);
        let tree = leaf.prop_recursive(3, 24, 4, |inner| {
            (arb_property_name(), prop::collection::vec(inner, 1..4))
                .prop_map(|(name, children)| FieldSelector::new(name).with_fields(dedup(children)))
        });
        prop::collection::vec(tree, 1..5).prop_map(dedup)
    }

    fn dedup(fields: Vec<FieldSelector>) -> Vec<FieldSelector> {
        let mut seen = std::collections::BTreeSet::new();
        fields
            .into_iter()
            .filter(|f| seen.insert(f.name.clone()))
            .collect()
    }

    pub fn arb_uuid() -> impl Strategy<Value = Uuid> {
        any::<[u8; 16]>().prop_map(Uuid::from_bytes)
    }

    pub fn arb_vector(dimensions: usize) -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0f32, dimensions)
    }

    /// Any well-formed near clause.
    pub fn arb_near_clause() -> impl Strategy<Value = NearClause> {
        prop_oneof![
            (prop::collection::vec("[a-z]{1,10}( [a-z]{1,10})?", 1..4), prop::option::of(0.0f32..2.0))
                .prop_map(|(concepts, distance)| {
                    let clause = NearText::new(concepts);
                    match distance {
                        Some(d) => NearClause::from(clause.with_distance(d)),
                        None => NearClause::from(clause),
                    }
                }),
            arb_uuid().prop_map(|id| NearClause::from(NearObject::from_uuid(id))),
            (1usize..64)
                .prop_flat_map(arb_vector)
                .prop_map(|v| NearClause::from(NearVector::new(v))),
        ]
    }

    /// Leaf predicates with scalar values.
    pub fn arb_predicate() -> impl Strategy<Value = WhereFilter> {
        let operator = prop_oneof![
            Just(FilterOperator::Equal),
            Just(FilterOperator::NotEqual),
            Just(FilterOperator::GreaterThan),
            Just(FilterOperator::GreaterThanEqual),
            Just(FilterOperator::LessThan),
            Just(FilterOperator::LessThanEqual),
        ];
        let value = prop_oneof![
            ".{0,20}".prop_map(FilterValue::Text),
            any::<i64>().prop_map(FilterValue::Int),
            (-1.0e6f64..1.0e6).prop_map(FilterValue::Number),
            any::<bool>().prop_map(FilterValue::Boolean),
        ];
        (prop::collection::vec(arb_property_name(), 1..3), operator, value)
            .prop_map(|(path, operator, value)| WhereFilter::path(path).op(operator, value))
    }

    /// Filter trees mixing `And`/`Or` over predicates.
    pub fn arb_where_filter() -> impl Strategy<Value = WhereFilter> {
        arb_predicate().prop_recursive(3, 16, 3, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 1..3).prop_map(WhereFilter::and),
                prop::collection::vec(inner, 1..3).prop_map(WhereFilter::or),
            ]
        })
    }

    /// Negative counts, always rejected by the builder.
    pub fn arb_negative_count() -> impl Strategy<Value = i64> {
        i64::MIN..0i64
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Canned requests and response bodies.

    use super::*;
    use serde_json::{json, Value};

    pub const JEOPARDY_CLASS: &str = "JeopardyQuestion";

    pub const ANIMALS_IN_MOVIES: &str = "animals in movies";

    /// Reference object used by near-object searches.
    pub const REFERENCE_OBJECT_ID: &str = "56b9449e-65db-5df4-887b-0a4773f52aa7";

    /// 32-dimensional query embedding.
    pub fn query_vector() -> Vec<f32> {
        vec![
            -0.0125526935, -0.021168863, -0.01076519, -0.02589537, -0.0070362035, 0.019870078,
            -0.010001986, -0.019120263, 0.00090044655, -0.017393013, 0.021302758, 0.010055545,
            0.02937665, -0.003816019, 0.007692291, 0.012385325, 0.032750815, 0.020847514,
            0.020311933, -0.022159688, -0.0009924996, 0.009399457, 0.0022226637, -0.029510546,
            0.014393755, -0.007223657, 0.018276723, -0.03639277, -0.010001986, -0.022842556,
            0.010363504, -0.020927852,
        ]
    }

    /// `question answer _additional{distance}`
    pub fn question_fields() -> Vec<FieldSelector> {
        vec![
            FieldSelector::new("question"),
            FieldSelector::new("answer"),
            FieldSelector::additional(["distance"]),
        ]
    }

    /// Full group projection used by group-by searches.
    pub fn group_fields() -> Vec<FieldSelector> {
        vec![FieldSelector::additional([FieldSelector::new("group").with_fields([
            FieldSelector::new("id"),
            FieldSelector::new("groupedBy").with_fields(["path", "value"]),
            FieldSelector::new("count"),
            FieldSelector::new("minDistance"),
            FieldSelector::new("maxDistance"),
            FieldSelector::new("hits").with_fields(["question", "answer"]),
        ])])]
    }

    /// One Jeopardy question object with a distance.
    pub fn question(question: &str, answer: &str, distance: f64) -> Value {
        json!({
            "question": question,
            "answer": answer,
            "_additional": {"distance": distance}
        })
    }

    /// Same as [`question`] with a `round` property.
    pub fn question_in_round(question: &str, answer: &str, round: &str, distance: f64) -> Value {
        json!({
            "question": question,
            "answer": answer,
            "round": round,
            "_additional": {"distance": distance}
        })
    }

    /// Animal-themed questions ordered by distance.
    pub fn animal_questions() -> Vec<Value> {
        vec![
            question(
                "Its a good guess that this film's title character is a pig",
                "Babe",
                0.1510,
            ),
            question(
                "In a 1994 Disney film, this lion cub grows up to rule the Pride Lands",
                "The Lion King",
                0.1616,
            ),
            question(
                "An 1869 novel and a 1939 film feature this horse named for a country",
                "Black Beauty",
                0.1774,
            ),
            question(
                "This dog starred in 1930s films as a German shepherd",
                "Rin Tin Tin",
                0.1901,
            ),
        ]
    }

    /// `{"data":{"Get":{class: objects}}}`
    pub fn get_body(class: &str, objects: Vec<Value>) -> Value {
        json!({"data": {"Get": {class: objects}}})
    }

    /// One group object as returned by a group-by search.
    pub fn group(id: i64, round: &str, hits: Vec<(&str, &str, f64)>) -> Value {
        let min = hits.iter().map(|h| h.2).fold(f64::INFINITY, f64::min);
        let max = hits.iter().map(|h| h.2).fold(f64::NEG_INFINITY, f64::max);
        let hits: Vec<Value> = hits
            .into_iter()
            .map(|(q, a, d)| {
                json!({"question": q, "answer": a, "_additional": {"id": uuid::Uuid::now_v7(), "distance": d}})
            })
            .collect();
        json!({
            "_additional": {"group": {
                "id": id,
                "groupedBy": {"path": ["round"], "value": round},
                "count": hits.len(),
                "minDistance": min,
                "maxDistance": max,
                "hits": hits
            }}
        })
    }

    /// Body with a GraphQL `errors` array and empty data.
    pub fn error_body(message: &str) -> Value {
        json!({
            "data": {"Get": {JEOPARDY_CLASS: null}},
            "errors": [{"message": message, "locations": [{"line": 1, "column": 6}], "path": ["Get", JEOPARDY_CLASS]}]
        })
    }
}

// ============================================================================
// MOCK GRAPHQL ENDPOINT
// ============================================================================

pub mod mock_server {
    //! wiremock helpers for the `/v1/graphql` endpoint.

    use serde_json::Value;
    use std::time::Duration;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const GRAPHQL_PATH: &str = "/v1/graphql";

    pub async fn start() -> MockServer {
        super::init_test_tracing();
        MockServer::start().await
    }

    /// Answer every GraphQL POST with `body`.
    pub async fn respond(server: &MockServer, body: Value) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    /// Answer only when the query document contains `needle`; expect one hit.
    pub async fn respond_when_query_contains(server: &MockServer, needle: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }

    /// Answer with `status` and a raw body.
    pub async fn respond_status(server: &MockServer, status: u16, body: &str) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    /// Answer with `body` after `delay`.
    pub async fn respond_delayed(server: &MockServer, body: Value, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(body).set_delay(delay))
            .mount(server)
            .await;
    }

    /// Require a bearer token on every request.
    pub async fn respond_authorized(server: &MockServer, api_key: &str, body: Value) {
        Mock::given(method("POST"))
            .and(path(GRAPHQL_PATH))
            .and(header("authorization", format!("Bearer {}", api_key).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(1)
            .mount(server)
            .await;
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Checks for the documented response properties.

    use super::*;

    /// Every object carries each named property and `_additional.distance`.
    #[track_caller]
    pub fn assert_has_fields(objects: &[ResultObject], names: &[&str]) {
        for (i, object) in objects.iter().enumerate() {
            for name in names {
                assert!(object.contains(name), "object {} is missing {:?}: {:?}", i, name, object);
            }
        }
    }

    #[track_caller]
    pub fn assert_has_distance(objects: &[ResultObject]) {
        for (i, object) in objects.iter().enumerate() {
            assert!(object.distance().is_some(), "object {} has no distance: {:?}", i, object);
        }
    }

    /// Every distance is strictly below `max_distance`.
    #[track_caller]
    pub fn assert_within_distance(objects: &[ResultObject], max_distance: f32) {
        for object in objects {
            let distance = object.distance().expect("distance requested");
            assert!(
                distance < f64::from(max_distance),
                "distance {} not below {}",
                distance,
                max_distance
            );
        }
    }

    /// Group count and per-group hit count stay within the requested caps.
    #[track_caller]
    pub fn assert_group_caps(objects: &[ResultObject], max_groups: usize, max_hits: usize) {
        assert!(objects.len() <= max_groups, "{} groups > {}", objects.len(), max_groups);
        for object in objects {
            let group = object.group().expect("group requested");
            assert!(group.hits().len() <= max_hits, "{} hits > {}", group.hits().len(), max_hits);
        }
    }

    #[track_caller]
    pub fn assert_server_error<T: std::fmt::Debug>(result: &QueryResult<T>) {
        match result {
            Err(QueryError::Server(_)) => {}
            other => panic!("Expected Server error, got: {:?}", other),
        }
    }

    #[track_caller]
    pub fn assert_decode_error_at<T: std::fmt::Debug>(result: &QueryResult<T>, expected: &str) {
        match result {
            Err(QueryError::Decode { path, .. }) => assert_eq!(path, expected),
            other => panic!("Expected Decode error at {}, got: {:?}", expected, other),
        }
    }
}
