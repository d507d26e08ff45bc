//! Typed search response and the schema-driven decoder.
//!
//! Decoding walks the request's field tree: every requested field must be
//! present in each object (a JSON `null` counts as present), fields that
//! were not requested are kept when the server sends them but never
//! required. Failures carry the JSON path of the offending value.

use crate::error::{GraphQLError, QueryError, QueryResult, ServerError};
use crate::field::{self, FieldSelector, ADDITIONAL};
use crate::request::{SearchRequest, GET_OPERATION};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

/// Decoded `data` section: operation -> collection -> objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    pub data: BTreeMap<String, BTreeMap<String, Vec<ResultObject>>>,
}

impl SearchResponse {
    /// Objects returned for `class` by the `Get` operation.
    pub fn objects(&self, class: &str) -> &[ResultObject] {
        self.data
            .get(GET_OPERATION)
            .and_then(|classes| classes.get(class))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Total number of objects across all collections.
    pub fn len(&self) -> usize {
        self.data
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One result: the requested properties plus `_additional` metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultObject {
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub additional: Option<Additional>,
}

impl ResultObject {
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        if name == ADDITIONAL {
            self.additional.is_some()
        } else {
            self.properties.contains_key(name)
        }
    }

    pub fn distance(&self) -> Option<f64> {
        self.additional.as_ref().and_then(|a| a.distance)
    }

    pub fn group(&self) -> Option<&GroupInfo> {
        self.additional.as_ref().and_then(|a| a.group.as_ref())
    }
}

/// Metadata from the `_additional` namespace.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Additional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certainty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector: Option<Vec<f32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<GroupInfo>,
    /// Metadata with no typed slot (e.g. `creationTimeUnix`).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

impl Additional {
    pub fn group(&self) -> Option<&GroupInfo> {
        self.group.as_ref()
    }
}

/// One group produced by a `groupBy` query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grouped_by: Option<GroupedBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<f64>,
    #[serde(default)]
    pub hits: Vec<ResultObject>,
}

impl GroupInfo {
    pub fn hits(&self) -> &[ResultObject] {
        &self.hits
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupedBy {
    #[serde(default)]
    pub path: Vec<String>,
    #[serde(default)]
    pub value: String,
}

// ============================================================================
// DECODER
// ============================================================================

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<Value>>,
}

/// Parse a raw response body for `request`.
pub fn decode_response(request: &SearchRequest, body: &[u8]) -> QueryResult<SearchResponse> {
    let envelope: Envelope =
        serde_json::from_slice(body).map_err(|e| QueryError::decode("$", e.to_string()))?;
    decode_envelope(request, envelope)
}

/// Same as [`decode_response`] for an already parsed JSON value.
pub fn decode_value(request: &SearchRequest, value: Value) -> QueryResult<SearchResponse> {
    let envelope: Envelope =
        serde_json::from_value(value).map_err(|e| QueryError::decode("$", e.to_string()))?;
    decode_envelope(request, envelope)
}

fn decode_envelope(request: &SearchRequest, envelope: Envelope) -> QueryResult<SearchResponse> {
    if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
        let errors = errors.iter().map(GraphQLError::from_value).collect();
        return Err(ServerError::from_errors(errors).into());
    }

    let data = match envelope.data {
        Some(Value::Object(data)) => data,
        Some(Value::Null) | None => return Err(QueryError::decode("data", "missing")),
        Some(other) => return Err(type_error("data", "an object", &other)),
    };

    let get_path = format!("data.{}", GET_OPERATION);
    let classes = match data.get(GET_OPERATION) {
        Some(Value::Object(classes)) => classes,
        Some(other) => return Err(type_error(&get_path, "an object", other)),
        None => return Err(QueryError::decode(get_path, "missing")),
    };

    let class = request.class_name();
    let class_path = format!("{}.{}", get_path, class);
    let items: &[Value] = match classes.get(class) {
        Some(Value::Array(items)) => items.as_slice(),
        Some(Value::Null) => &[],
        Some(other) => return Err(type_error(&class_path, "an array", other)),
        None => return Err(QueryError::decode(class_path, "missing")),
    };

    let objects = items
        .iter()
        .enumerate()
        .map(|(i, item)| decode_object(item, request.fields(), &format!("{}[{}]", class_path, i)))
        .collect::<QueryResult<Vec<_>>>()?;

    let mut collections = BTreeMap::new();
    collections.insert(class.to_string(), objects);
    let mut response = SearchResponse::default();
    response.data.insert(GET_OPERATION.to_string(), collections);
    Ok(response)
}

fn decode_object(value: &Value, fields: &[FieldSelector], path: &str) -> QueryResult<ResultObject> {
    let map = as_object(value, path)?;
    require_fields(map, fields, path)?;

    let mut object = ResultObject::default();
    for (key, value) in map {
        let key_path = format!("{}.{}", path, key);
        if key == ADDITIONAL {
            let selection = field::find(fields, ADDITIONAL).map(|f| f.fields.as_slice()).unwrap_or(&[]);
            if !value.is_null() {
                object.additional = Some(decode_additional(value, selection, &key_path)?);
            }
            continue;
        }
        if let Some(selector) = field::find(fields, key) {
            check_nested(value, &selector.fields, &key_path)?;
        }
        object.properties.insert(key.clone(), value.clone());
    }
    Ok(object)
}

/// Presence check for nested (reference or object) properties.
fn check_nested(value: &Value, fields: &[FieldSelector], path: &str) -> QueryResult<()> {
    if fields.is_empty() {
        return Ok(());
    }
    match value {
        Value::Null => Ok(()),
        Value::Object(map) => {
            require_fields(map, fields, path)?;
            for selector in fields {
                if let Some(child) = map.get(&selector.name) {
                    check_nested(child, &selector.fields, &format!("{}.{}", path, selector.name))?;
                }
            }
            Ok(())
        }
        Value::Array(items) => items
            .iter()
            .enumerate()
            .try_for_each(|(i, item)| check_nested(item, fields, &format!("{}[{}]", path, i))),
        other => Err(type_error(path, "an object or array", other)),
    }
}

fn decode_additional(value: &Value, fields: &[FieldSelector], path: &str) -> QueryResult<Additional> {
    let map = as_object(value, path)?;
    require_fields(map, fields, path)?;

    let mut additional = Additional::default();
    for (key, value) in map {
        let key_path = format!("{}.{}", path, key);
        match key.as_str() {
            "id" => additional.id = typed(value, &key_path)?,
            "distance" => additional.distance = typed(value, &key_path)?,
            "certainty" => additional.certainty = typed(value, &key_path)?,
            "score" => additional.score = typed(value, &key_path)?,
            "vector" => additional.vector = typed(value, &key_path)?,
            "group" => {
                if !value.is_null() {
                    let selection = field::find(fields, "group").map(|f| f.fields.as_slice()).unwrap_or(&[]);
                    additional.group = Some(decode_group(value, selection, &key_path)?);
                }
            }
            _ => {
                additional.extra.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(additional)
}

fn decode_group(value: &Value, fields: &[FieldSelector], path: &str) -> QueryResult<GroupInfo> {
    let map = as_object(value, path)?;
    require_fields(map, fields, path)?;

    let mut group = GroupInfo::default();
    for (key, value) in map {
        let key_path = format!("{}.{}", path, key);
        match key.as_str() {
            "id" => group.id = typed(value, &key_path)?,
            "groupedBy" => group.grouped_by = typed(value, &key_path)?,
            "count" => group.count = typed(value, &key_path)?,
            "minDistance" => group.min_distance = typed(value, &key_path)?,
            "maxDistance" => group.max_distance = typed(value, &key_path)?,
            "hits" => {
                let selection = field::find(fields, "hits").map(|f| f.fields.as_slice()).unwrap_or(&[]);
                group.hits = match value {
                    Value::Null => Vec::new(),
                    Value::Array(items) => items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| decode_object(item, selection, &format!("{}[{}]", key_path, i)))
                        .collect::<QueryResult<Vec<_>>>()?,
                    other => return Err(type_error(&key_path, "an array", other)),
                };
            }
            _ => {
                tracing::debug!(path = %key_path, "ignoring unknown group field");
            }
        }
    }
    Ok(group)
}

fn as_object<'a>(value: &'a Value, path: &str) -> QueryResult<&'a Map<String, Value>> {
    value
        .as_object()
        .ok_or_else(|| type_error(path, "an object", value))
}

fn require_fields(map: &Map<String, Value>, fields: &[FieldSelector], path: &str) -> QueryResult<()> {
    match fields
        .iter()
        .find(|f| !f.is_fragment() && !map.contains_key(&f.name))
    {
        Some(missing) => Err(QueryError::decode(
            format!("{}.{}", path, missing.name),
            "requested field missing",
        )),
        None => Ok(()),
    }
}

fn typed<T: DeserializeOwned>(value: &Value, path: &str) -> QueryResult<Option<T>> {
    if value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|e| QueryError::decode(path, e.to_string()))
}

fn type_error(path: &str, expected: &str, found: &Value) -> QueryError {
    let kind = match found {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    };
    QueryError::decode(path, format!("expected {}, found {}", expected, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorLocation;
    use crate::near::NearText;
    use crate::request::GroupBy;
    use serde_json::json;

    fn request() -> SearchRequest {
        SearchRequest::builder()
            .with_class_name("JeopardyQuestion")
            .with_fields([
                FieldSelector::new("question"),
                FieldSelector::new("answer"),
                FieldSelector::additional(["distance"]),
            ])
            .with_near_text(NearText::new(["animals in movies"]))
            .with_limit(2)
            .build()
            .unwrap()
    }

    #[test]
    fn test_decode_objects() {
        let body = json!({"data": {"Get": {"JeopardyQuestion": [
            {"question": "q1", "answer": "a1", "_additional": {"distance": 0.15}},
            {"question": "q2", "answer": null, "_additional": {"distance": 0.17}}
        ]}}});
        let response = decode_value(&request(), body).unwrap();
        let objects = response.objects("JeopardyQuestion");
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].get_str("question"), Some("q1"));
        assert_eq!(objects[0].distance(), Some(0.15));
        assert!(objects[1].contains("answer"));
        assert_eq!(objects[1].get("answer"), Some(&Value::Null));
        assert_eq!(response.len(), 2);
    }

    #[test]
    fn test_errors_array_wins_over_data() {
        let body = json!({
            "data": {"Get": {"JeopardyQuestion": []}},
            "errors": [{"message": "explorer: get class: vectorize params", "locations": [{"line": 1, "column": 6}]}]
        });
        let err = decode_value(&request(), body).unwrap_err();
        match err {
            QueryError::Server(server) => {
                assert_eq!(server.status, None);
                assert_eq!(server.errors[0].locations[0].column, 6);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_loosely_shaped_errors_are_server_errors() {
        let body = json!({
            "data": {"Get": {"JeopardyQuestion": []}},
            "errors": [
                {"message": "boom", "locations": [{"line": 1}]},
                {"msg": "no message key"}
            ]
        });
        match decode_value(&request(), body) {
            Err(QueryError::Server(server)) => {
                assert_eq!(server.errors.len(), 2);
                assert_eq!(server.errors[0].message, "boom");
                assert_eq!(server.errors[0].locations[0], ErrorLocation { line: 1, column: 0 });
                assert!(server.errors[1].message.contains("no message key"));
                assert!(server.errors[1].locations.is_empty());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_errors_array_is_ignored() {
        let body = json!({"data": {"Get": {"JeopardyQuestion": []}}, "errors": []});
        assert!(decode_value(&request(), body).unwrap().is_empty());
    }

    #[test]
    fn test_missing_sections_report_path() {
        let cases = [
            (json!({}), "data"),
            (json!({"data": null}), "data"),
            (json!({"data": {}}), "data.Get"),
            (json!({"data": {"Get": {"Other": []}}}), "data.Get.JeopardyQuestion"),
            (
                json!({"data": {"Get": {"JeopardyQuestion": [{"question": "q", "_additional": {"distance": 0.1}}]}}}),
                "data.Get.JeopardyQuestion[0].answer",
            ),
            (
                json!({"data": {"Get": {"JeopardyQuestion": [{"question": "q", "answer": "a", "_additional": {}}]}}}),
                "data.Get.JeopardyQuestion[0]._additional.distance",
            ),
        ];
        for (body, expected) in cases {
            match decode_value(&request(), body) {
                Err(QueryError::Decode { path, .. }) => assert_eq!(path, expected),
                other => panic!("expected decode error at {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_wrong_types_report_path() {
        let body = json!({"data": {"Get": {"JeopardyQuestion": [
            {"question": "q", "answer": "a", "_additional": {"distance": "far"}}
        ]}}});
        match decode_value(&request(), body) {
            Err(QueryError::Decode { path, .. }) => {
                assert_eq!(path, "data.Get.JeopardyQuestion[0]._additional.distance")
            }
            other => panic!("unexpected: {other:?}"),
        }

        let body = json!({"data": {"Get": {"JeopardyQuestion": {"question": "q"}}}});
        assert!(matches!(
            decode_value(&request(), body),
            Err(QueryError::Decode { .. })
        ));
    }

    #[test]
    fn test_invalid_json_body() {
        let err = decode_response(&request(), b"<html>").unwrap_err();
        assert!(matches!(err, QueryError::Decode { ref path, .. } if path == "$"));
    }

    #[test]
    fn test_null_collection_is_empty() {
        let body = json!({"data": {"Get": {"JeopardyQuestion": null}}});
        assert!(decode_value(&request(), body).unwrap().is_empty());
    }

    #[test]
    fn test_unrequested_fields_kept() {
        let body = json!({"data": {"Get": {"JeopardyQuestion": [
            {"question": "q", "answer": "a", "round": "Jeopardy!",
             "_additional": {"distance": 0.1, "id": "56b9449e-65db-5df4-887b-0a4773f52aa7", "creationTimeUnix": "1"}}
        ]}}});
        let response = decode_value(&request(), body).unwrap();
        let object = &response.objects("JeopardyQuestion")[0];
        assert_eq!(object.get_str("round"), Some("Jeopardy!"));
        let additional = object.additional.as_ref().unwrap();
        assert!(additional.id.is_some());
        assert!(additional.extra.contains_key("creationTimeUnix"));
    }

    #[test]
    fn test_decode_groups() {
        let request = SearchRequest::builder()
            .with_class_name("JeopardyQuestion")
            .with_near_text(NearText::new(["animals in movies"]))
            .with_group_by(GroupBy::new(["round"], 2, 2))
            .with_fields([FieldSelector::additional([FieldSelector::new("group").with_fields([
                FieldSelector::new("id"),
                FieldSelector::new("groupedBy").with_fields(["path", "value"]),
                FieldSelector::new("count"),
                FieldSelector::new("hits").with_fields(["question", "answer"]),
            ])])])
            .build()
            .unwrap();
        let body = json!({"data": {"Get": {"JeopardyQuestion": [
            {"_additional": {"group": {
                "id": 0,
                "groupedBy": {"path": ["round"], "value": "Jeopardy!"},
                "count": 2,
                "hits": [
                    {"question": "q1", "answer": "a1", "_additional": {"distance": 0.1}},
                    {"question": "q2", "answer": "a2"}
                ]
            }}}
        ]}}});
        let response = decode_value(&request, body).unwrap();
        let group = response.objects("JeopardyQuestion")[0].group().unwrap();
        assert_eq!(group.id, Some(0));
        assert_eq!(group.grouped_by.as_ref().unwrap().value, "Jeopardy!");
        assert_eq!(group.hits().len(), 2);
        assert_eq!(group.hits()[1].get_str("answer"), Some("a2"));
    }

    #[test]
    fn test_group_hit_missing_field() {
        let request = SearchRequest::builder()
            .with_class_name("JeopardyQuestion")
            .with_fields([FieldSelector::additional([FieldSelector::new("group")
                .with_fields([FieldSelector::new("hits").with_fields(["question"])])])])
            .build()
            .unwrap();
        let body = json!({"data": {"Get": {"JeopardyQuestion": [
            {"_additional": {"group": {"hits": [{"answer": "a"}]}}}
        ]}}});
        match decode_value(&request, body) {
            Err(QueryError::Decode { path, .. }) => assert_eq!(
                path,
                "data.Get.JeopardyQuestion[0]._additional.group.hits[0].question"
            ),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_nested_reference_selection() {
        let request = SearchRequest::builder()
            .with_class_name("JeopardyQuestion")
            .with_fields([FieldSelector::new("hasCategory")
                .with_fields([FieldSelector::fragment("JeopardyCategory", ["title"])])])
            .build()
            .unwrap();
        let body = json!({"data": {"Get": {"JeopardyQuestion": [{"hasCategory": [{"title": "ANIMALS"}]}]}}});
        assert!(decode_value(&request, body).is_ok());

        let request = SearchRequest::builder()
            .with_class_name("JeopardyQuestion")
            .with_fields([FieldSelector::new("category").with_fields(["title"])])
            .build()
            .unwrap();
        let ok = json!({"data": {"Get": {"JeopardyQuestion": [{"category": [{"title": "ANIMALS"}]}]}}});
        assert!(decode_value(&request, ok).is_ok());
        let bad = json!({"data": {"Get": {"JeopardyQuestion": [{"category": [{"name": "ANIMALS"}]}]}}});
        assert!(matches!(decode_value(&request, bad), Err(QueryError::Decode { .. })));
    }
}
