//! Flatten/unflatten through the public attribute codec

use phoenix_engine::domain::traces::attributes::{
    DEFAULT_SEPARATOR, FlattenOptions, flatten, get_attribute_value, unflatten,
};
use serde_json::{Value as JsonValue, json};

#[test]
fn test_span_attributes_survive_a_round_trip() {
    let attributes = json!({
        "llm": {
            "model_name": "gpt-4",
            "input_messages": [
                {"message": {"role": "system", "content": "be brief"}},
                {"message": {"role": "user", "content": "hi"}}
            ]
        },
        "tag": {"tags": ["a", "b"]}
    });
    let options = FlattenOptions::default();
    let pairs: Vec<(String, JsonValue)> = flatten(&attributes, &options).collect();
    assert!(pairs.contains(&("llm.input_messages.1.message.role".to_string(), json!("user"))));
    assert!(pairs.contains(&("tag.tags".to_string(), json!(["a", "b"]))));

    let rebuilt = JsonValue::Object(unflatten(pairs, DEFAULT_SEPARATOR));
    assert_eq!(rebuilt, attributes);
}

#[test]
fn test_lookup_by_dotted_key() {
    let attributes = unflatten(
        [
            ("input.value", json!("question")),
            ("input.mime_type", json!("text/plain")),
        ],
        DEFAULT_SEPARATOR,
    );
    assert_eq!(
        get_attribute_value(&attributes, "input.value", DEFAULT_SEPARATOR),
        Some(&json!("question"))
    );
    assert_eq!(get_attribute_value(&attributes, "input..value", DEFAULT_SEPARATOR), None);
    assert_eq!(get_attribute_value(&attributes, "output.value", DEFAULT_SEPARATOR), None);
}
