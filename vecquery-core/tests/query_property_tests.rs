use proptest::prelude::*;
use serde_json::{json, Value};
use vecquery_core::{
    decode_value, FieldSelector, GroupBy, NearText, QueryError, SearchRequest, MAX_COUNT,
};
use vecquery_test_utils::assertions::{assert_group_caps, assert_within_distance};
use vecquery_test_utils::fixtures::{self, JEOPARDY_CLASS};
use vecquery_test_utils::generators::*;

fn property_request(properties: &[String]) -> SearchRequest {
    SearchRequest::builder()
        .with_class_name(JEOPARDY_CLASS)
        .with_fields(properties.iter().map(|p| FieldSelector::new(p.as_str())))
        .build()
        .unwrap()
}

fn object_with(properties: &[String], distance: f64) -> Value {
    let mut object = serde_json::Map::new();
    for name in properties {
        object.insert(name.clone(), json!(format!("{}-value", name)));
    }
    object.insert("_additional".to_string(), json!({"distance": distance}));
    Value::Object(object)
}

fn field_names(fields: &[FieldSelector], out: &mut Vec<String>) {
    for field in fields {
        out.push(field.name.clone());
        field_names(&field.fields, out);
    }
}

#[test]
fn near_text_query_document() {
    let request = SearchRequest::builder()
        .with_class_name(JEOPARDY_CLASS)
        .with_fields(fixtures::question_fields())
        .with_near_text(NearText::new([fixtures::ANIMALS_IN_MOVIES]))
        .with_limit(2)
        .build()
        .unwrap();
    assert_eq!(
        request.to_query(),
        r#"{Get{JeopardyQuestion(nearText:{concepts:["animals in movies"]} limit:2){question answer _additional{distance}}}}"#
    );
}

#[test]
fn count_above_max_rejected() {
    let result = SearchRequest::builder()
        .with_class_name(JEOPARDY_CLASS)
        .with_limit(MAX_COUNT + 1)
        .build();
    assert!(matches!(result, Err(QueryError::InvalidArgument { field: "limit", .. })));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn negative_limit_rejected(n in arb_negative_count()) {
        let result = SearchRequest::builder().with_class_name(JEOPARDY_CLASS).with_limit(n).build();
        let rejected = matches!(result, Err(QueryError::InvalidArgument { field: "limit", .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn negative_offset_rejected(n in arb_negative_count()) {
        let result = SearchRequest::builder().with_class_name(JEOPARDY_CLASS).with_offset(n).build();
        let rejected = matches!(result, Err(QueryError::InvalidArgument { field: "offset", .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn negative_autocut_rejected(n in arb_negative_count()) {
        let result = SearchRequest::builder().with_class_name(JEOPARDY_CLASS).with_autocut(n).build();
        prop_assert!(result.unwrap_err().is_client_side());
    }

    #[test]
    fn first_error_wins(n in arb_negative_count(), m in arb_negative_count()) {
        let result = SearchRequest::builder()
            .with_limit(n)
            .with_offset(m)
            .with_class_name(JEOPARDY_CLASS)
            .build();
        let limit_first = matches!(result, Err(QueryError::InvalidArgument { field: "limit", .. }));
        prop_assert!(limit_first);
    }

    #[test]
    fn valid_counts_render(limit in 0i64..=MAX_COUNT, offset in 0i64..1000) {
        let request = SearchRequest::builder()
            .with_class_name(JEOPARDY_CLASS)
            .with_fields(fixtures::question_fields())
            .with_limit(limit)
            .with_offset(offset)
            .build()
            .unwrap();
        let expected = format!("limit:{} offset:{}", limit, offset);
        prop_assert!(request.to_query().contains(&expected));
    }

    #[test]
    fn query_contains_every_field(class in arb_class_name(), fields in arb_field_tree()) {
        let request = SearchRequest::builder()
            .with_class_name(class.clone())
            .with_fields(fields.clone())
            .build()
            .unwrap();
        let query = request.to_query();
        let expected_prefix = format!("{{Get{{{}{{", class);
        prop_assert!(query.starts_with(&expected_prefix));
        let mut names = Vec::new();
        field_names(&fields, &mut names);
        for name in names {
            prop_assert!(query.contains(&name));
        }
    }

    #[test]
    fn where_renders_before_near(near in arb_near_clause(), filter in arb_where_filter()) {
        let request = SearchRequest::builder()
            .with_class_name(JEOPARDY_CLASS)
            .with_fields(fixtures::question_fields())
            .with_near(near.clone())
            .with_where(filter)
            .build()
            .unwrap();
        let query = request.to_query();
        let where_at = query.find("where:").unwrap();
        let near_at = query.find(near.kind()).unwrap();
        prop_assert!(where_at < near_at);
    }

    #[test]
    fn decode_preserves_requested_fields(properties in arb_properties(), count in 0usize..5) {
        let request = property_request(&properties);
        let objects: Vec<Value> = (0..count).map(|_| object_with(&properties, 0.1)).collect();
        let response = decode_value(&request, fixtures::get_body(JEOPARDY_CLASS, objects)).unwrap();
        let decoded = response.objects(JEOPARDY_CLASS);
        prop_assert_eq!(decoded.len(), count);
        for object in decoded {
            for name in &properties {
                let expected = format!("{}-value", name);
                prop_assert_eq!(object.get_str(name), Some(expected.as_str()));
            }
        }
    }

    #[test]
    fn decode_reports_first_missing_field(properties in arb_properties()) {
        let request = property_request(&properties);
        let missing = properties[0].clone();
        let mut object = object_with(&properties, 0.1);
        object.as_object_mut().unwrap().remove(&missing);
        let err = decode_value(&request, fixtures::get_body(JEOPARDY_CLASS, vec![object])).unwrap_err();
        prop_assert_eq!(
            err,
            QueryError::Decode {
                path: format!("data.Get.{}[0].{}", JEOPARDY_CLASS, missing),
                reason: "requested field missing".to_string(),
            }
        );
    }

    #[test]
    fn decode_keeps_server_object_count(limit in 0i64..20, available in 0usize..40) {
        let properties = vec!["question".to_string()];
        let request = SearchRequest::builder()
            .with_class_name(JEOPARDY_CLASS)
            .with_fields(properties.iter().map(|p| FieldSelector::new(p.as_str())))
            .with_limit(limit)
            .build()
            .unwrap();
        let returned = available.min(request.limit().unwrap() as usize);
        let objects = (0..returned).map(|_| object_with(&properties, 0.1)).collect();
        let response = decode_value(&request, fixtures::get_body(JEOPARDY_CLASS, objects)).unwrap();
        let decoded = response.objects(JEOPARDY_CLASS);
        prop_assert_eq!(decoded.len(), returned);
        prop_assert!(decoded.len() as i64 <= limit);
    }

    #[test]
    fn decoded_distances_below_threshold(distances in prop::collection::vec(0.0f64..0.179, 0..10)) {
        let properties = vec!["question".to_string()];
        let request = property_request(&properties);
        let objects = distances.iter().map(|d| object_with(&properties, *d)).collect();
        let response = decode_value(&request, fixtures::get_body(JEOPARDY_CLASS, objects)).unwrap();
        assert_within_distance(response.objects(JEOPARDY_CLASS), 0.18);
    }

    #[test]
    fn decoded_groups_within_caps(groups in 1i64..4, per_group in 1usize..4) {
        let request = SearchRequest::builder()
            .with_class_name(JEOPARDY_CLASS)
            .with_fields(fixtures::group_fields())
            .with_group_by(GroupBy::new(["round"], groups, per_group as i64))
            .build()
            .unwrap();
        let body: Vec<Value> = (0..groups)
            .map(|id| {
                let hits = (0..per_group).map(|i| ("q", "a", 0.1 + i as f64 / 100.0)).collect();
                fixtures::group(id, "Jeopardy!", hits)
            })
            .collect();
        let response = decode_value(&request, fixtures::get_body(JEOPARDY_CLASS, body)).unwrap();
        assert_group_caps(response.objects(JEOPARDY_CLASS), groups as usize, per_group);
    }
}
