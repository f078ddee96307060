use prost_reflect::{DynamicMessage, MessageDescriptor};
use serde_json::Value;

use crate::proto::RpcMethod;

pub(crate) type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("payload does not match input type {input}: {source}")]
    Mismatch {
        input: String,
        source: serde_json::Error,
    },
}

/// Builds the request message(s) for one call from the rendered payload
/// tree.
///
/// Client-streaming and bidi methods accept a top-level array as an
/// ordered message sequence; a single object is a one-element sequence.
/// Every other kind takes exactly one message. Unknown fields and type
/// mismatches are errors.
pub(crate) fn build_messages(method: &RpcMethod, data: &Value) -> Result<Vec<DynamicMessage>> {
    let input = method.input();

    match data {
        Value::Array(items) if method.kind().is_client_streaming() => items
            .iter()
            .map(|item| decode_message(&input, item))
            .collect(),
        other => Ok(vec![decode_message(&input, other)?]),
    }
}

fn decode_message(input: &MessageDescriptor, value: &Value) -> Result<DynamicMessage> {
    DynamicMessage::deserialize(input.clone(), value.clone()).map_err(|source| Error::Mismatch {
        input: input.full_name().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::Schema;

    fn method(name: &str) -> RpcMethod {
        Schema::from_pool(hammr_testserver::descriptor_pool())
            .method(&format!("hammr.test.EchoService/{name}"))
            .expect("test method resolves")
    }

    #[test]
    fn unary_object_builds_a_single_message() {
        let messages = build_messages(&method("Echo"), &serde_json::json!({ "message": "hi" }))
            .expect("payload matches");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn unary_array_is_rejected() {
        let err = build_messages(
            &method("Echo"),
            &serde_json::json!([{ "message": "a" }, { "message": "b" }]),
        )
        .expect_err("arrays are only valid for client-streaming kinds");
        assert!(matches!(err, Error::Mismatch { .. }));
    }

    #[test]
    fn unknown_field_is_rejected() {
        let err = build_messages(&method("Echo"), &serde_json::json!({ "bogus": 1 }))
            .expect_err("unknown fields fail the call");
        assert!(matches!(err, Error::Mismatch { .. }));
    }

    #[test]
    fn type_mismatch_is_rejected() {
        let err = build_messages(&method("Echo"), &serde_json::json!({ "message": {} }))
            .expect_err("an object is not a string");
        assert!(matches!(err, Error::Mismatch { .. }));
    }

    #[test]
    fn stream_array_builds_an_ordered_sequence() {
        let messages = build_messages(
            &method("Collect"),
            &serde_json::json!([
                { "message": "one" },
                { "message": "two" },
                { "message": "three" }
            ]),
        )
        .expect("payload matches");
        assert_eq!(messages.len(), 3);
    }

    #[test]
    fn stream_object_is_a_one_element_sequence() {
        let messages = build_messages(&method("Chat"), &serde_json::json!({ "message": "solo" }))
            .expect("payload matches");
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn empty_stream_array_builds_no_messages() {
        let messages =
            build_messages(&method("Collect"), &serde_json::json!([])).expect("payload matches");
        assert!(messages.is_empty());
    }
}
