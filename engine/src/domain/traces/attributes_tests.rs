use super::*;
use serde_json::json;

fn pairs(items: &[(&str, JsonValue)]) -> Vec<(String, JsonValue)> {
    items
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

fn unflat(items: &[(&str, JsonValue)]) -> JsonValue {
    JsonValue::Object(unflatten(pairs(items), DEFAULT_SEPARATOR))
}

fn sample_tree() -> JsonValue {
    json!({
        "input": {"value": "what is phoenix?", "mime_type": "text/plain"},
        "llm": {
            "token_count": {"prompt": 10, "completion": 20},
            "input_messages": [
                {"message": {"role": "system", "content": "be nice"}},
                {"message": {"role": "user", "content": "hi"}}
            ]
        },
        "retrieval": {
            "documents": [
                {"document": {"content": "A", "score": 1.0}},
                {"document": {"content": "B", "score": 2.0}},
                {"document": {"content": "C", "score": 3.0}}
            ]
        },
        "tag": {"tags": ["x", "y"]},
        "openinference": {"span": {"kind": "LLM"}}
    })
}

// ============================================================================
// flatten
// ============================================================================

#[test]
fn test_flatten_indexes_object_sequences() {
    let tree = sample_tree();
    let options = FlattenOptions::default();
    let flat: Vec<(String, JsonValue)> = flatten(&tree, &options).collect();

    assert!(flat.contains(&(
        "retrieval.documents.1.document.content".to_string(),
        json!("B")
    )));
    assert!(flat.contains(&("llm.token_count.prompt".to_string(), json!(10))));
    assert!(flat.contains(&("tag.tags".to_string(), json!(["x", "y"]))));
}

#[test]
fn test_flatten_preserves_depth_first_order() {
    let tree = json!({"a": {"b": 1, "c": [{"d": 2}, {"d": 3}]}, "e": 4});
    let options = FlattenOptions::default();
    let keys: Vec<String> = flatten(&tree, &options).map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a.b", "a.c.0.d", "a.c.1.d", "e"]);
}

#[test]
fn test_flatten_skips_null_and_scalar_elements_of_object_sequences() {
    let tree = json!({"a": null, "b": [{"c": 1}, "loose", {"c": null}]});
    let options = FlattenOptions::default();
    let flat: Vec<(String, JsonValue)> = flatten(&tree, &options).collect();
    assert_eq!(flat, vec![("b.0.c".to_string(), json!(1))]);
}

#[test]
fn test_flatten_without_sequence_recursion() {
    let tree = json!({"docs": [{"id": 1}]});
    let options = FlattenOptions {
        recurse_on_sequence: false,
        ..Default::default()
    };
    let flat: Vec<(String, JsonValue)> = flatten(&tree, &options).collect();
    assert_eq!(flat, vec![("docs".to_string(), json!([{"id": 1}]))]);
}

#[test]
fn test_flatten_json_string_attributes() {
    let tree = json!({
        "metadata": {"user": {"id": 7}},
        "llm": {"prompt_template": {"variables": {"city": "Paris"}}},
        "tool": {"name": "search"}
    });
    let options = FlattenOptions {
        json_string_attributes: true,
        ..Default::default()
    };
    let flat: Vec<(String, JsonValue)> = flatten(&tree, &options).collect();
    assert_eq!(
        flat,
        vec![
            ("metadata".to_string(), json!(r#"{"user":{"id":7}}"#)),
            (
                "llm.prompt_template.variables".to_string(),
                json!(r#"{"city":"Paris"}"#)
            ),
            ("tool.name".to_string(), json!("search")),
        ]
    );
}

#[test]
fn test_flatten_custom_separator() {
    let tree = json!({"a": {"b": [{"c": true}]}});
    let options = FlattenOptions {
        separator: "/".to_string(),
        ..Default::default()
    };
    let keys: Vec<String> = flatten(&tree, &options).map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["a/b/0/c"]);
}

// ============================================================================
// unflatten
// ============================================================================

#[test]
fn test_round_trip() {
    let tree = sample_tree();
    let options = FlattenOptions::default();
    let rebuilt = unflatten(flatten(&tree, &options), DEFAULT_SEPARATOR);
    assert_eq!(JsonValue::Object(rebuilt), tree);
}

#[test]
fn test_order_independence() {
    let tree = sample_tree();
    let options = FlattenOptions::default();
    let mut flat: Vec<(String, JsonValue)> = flatten(&tree, &options).collect();
    flat.reverse();
    assert_eq!(JsonValue::Object(unflatten(flat.clone(), ".")), tree);

    // Deterministic shuffle: interleave odd and even positions
    let (even, odd): (Vec<_>, Vec<_>) = flat
        .into_iter()
        .enumerate()
        .partition(|(i, _)| i % 2 == 0);
    let shuffled = odd.into_iter().chain(even).map(|(_, pair)| pair);
    assert_eq!(JsonValue::Object(unflatten(shuffled, ".")), tree);
}

#[test]
fn test_array_ordering() {
    let result = unflat(&[
        ("items.2.name", json!("third")),
        ("items.0.name", json!("first")),
        ("items.1.name", json!("second")),
    ]);
    assert_eq!(
        result,
        json!({"items": [{"name": "first"}, {"name": "second"}, {"name": "third"}]})
    );
}

#[test]
fn test_array_gaps_are_compacted() {
    let result = unflat(&[("items.5.v", json!(5)), ("items.1.v", json!(1))]);
    assert_eq!(result, json!({"items": [{"v": 1}, {"v": 5}]}));
}

#[test]
fn test_terminal_conflict_becomes_dotted_sibling() {
    let result = unflat(&[("a", json!({"b": 1})), ("a.b", json!(2))]);
    assert_eq!(result, json!({"a": {"b": 1}, "a.b": 2}));
}

#[test]
fn test_terminal_conflict_remainder_is_fully_dotted() {
    let result = unflat(&[("a", json!(1)), ("a.b.c", json!(2))]);
    assert_eq!(result, json!({"a": 1, "a.b.c": 2}));

    let result = unflat(&[("a", json!(1)), ("a.b.c", json!(2)), ("a.b.d.0.e", json!(3))]);
    assert_eq!(result, json!({"a": 1, "a.b.c": 2, "a.b.d.0.e": 3}));
}

#[test]
fn test_deep_terminal_conflict_at_intermediate_level() {
    let result = unflat(&[("x.a", json!({"b": 1})), ("x.a.b.c", json!(2))]);
    assert_eq!(result, json!({"x": {"a": {"b": 1}, "a.b.c": 2}}));
}

#[test]
fn test_terminal_conflict_at_intermediate_level() {
    let result = unflat(&[("x.a", json!(1)), ("x.a.b", json!(2)), ("x.c", json!(3))]);
    assert_eq!(result, json!({"x": {"a": 1, "a.b": 2, "c": 3}}));
}

#[test]
fn test_value_after_list_keeps_elements_as_dotted_keys() {
    let result = unflat(&[("a.0.b", json!(1)), ("a", json!(5))]);
    assert_eq!(result, json!({"a": 5, "a.0.b": 1}));
}

#[test]
fn test_terminal_index_segment_is_a_key() {
    let result = unflat(&[("a.0", json!("x")), ("a.1", json!("y"))]);
    assert_eq!(result, json!({"a": {"0": "x", "1": "y"}}));
}

#[test]
fn test_terminal_and_element_with_same_index() {
    let result = unflat(&[("a.0", json!("x")), ("a.0.b", json!(1))]);
    assert_eq!(result, json!({"a": [{"b": 1}], "a.0": "x"}));
}

#[test]
fn test_none_is_skipped() {
    let expected = json!({"a": {"b": 1}});
    assert_eq!(unflat(&[("a", JsonValue::Null), ("a.b", json!(1))]), expected);
    assert_eq!(unflat(&[("a.b", json!(1)), ("a", JsonValue::Null)]), expected);
}

#[test]
fn test_duplicate_path_last_write_wins() {
    let result = unflat(&[("a.b", json!(1)), ("a.b", json!(2))]);
    assert_eq!(result, json!({"a": {"b": 2}}));
}

#[test]
fn test_leading_zero_indices_collide() {
    let result = unflat(&[("a.00.b", json!(1)), ("a.0.c", json!(2))]);
    assert_eq!(result, json!({"a": [{"b": 1, "c": 2}]}));
}

#[test]
fn test_whitespace_and_empty_segments() {
    let result = unflat(&[(" a . b ", json!(1)), ("a..c", json!(2)), ("", json!(3))]);
    assert_eq!(result, json!({"a": {"b": 1, "c": 2}}));
}

// ============================================================================
// get_attribute_value
// ============================================================================

#[test]
fn test_get_attribute_value() {
    let tree = json!({"llm": {"token_count": {"prompt": 10}}, "docs": [{"a": 1}]});
    let attrs = tree.as_object().unwrap();

    assert_eq!(
        get_attribute_value(attrs, "llm.token_count.prompt", "."),
        Some(&json!(10))
    );
    assert_eq!(
        get_attribute_value(attrs, "llm.token_count", "."),
        Some(&json!({"prompt": 10}))
    );
    assert_eq!(get_attribute_value(attrs, "llm.missing", "."), None);
    assert_eq!(get_attribute_value(attrs, "docs.0.a", "."), None);
    assert_eq!(get_attribute_value(attrs, "llm..token_count", "."), None);
    assert_eq!(get_attribute_value(attrs, ".llm", "."), None);
    assert_eq!(get_attribute_value(attrs, "llm.", "."), None);
    assert_eq!(get_attribute_value(attrs, "", "."), None);
}
