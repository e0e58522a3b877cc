//! `chat.completion.chunk` decoding into `Delta`s.

use serde::Deserialize;

use crate::{AiError, Delta, ToolCallDelta};

#[derive(Debug, Deserialize)]
struct Chunk {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    delta: ChoiceDelta,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceDelta {
    content: Option<String>,
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireToolCall {
    #[serde(default)]
    index: usize,
    id: Option<String>,
    function: Option<WireFunction>,
}

#[derive(Debug, Deserialize)]
struct WireFunction {
    name: Option<String>,
    arguments: Option<String>,
}

fn error_message(error: &serde_json::Value) -> String {
    error
        .get("message")
        .and_then(|m| m.as_str())
        .or_else(|| error.as_str())
        .unwrap_or("An error occurred during streaming")
        .to_string()
}

/// Decode one SSE `data:` payload. Keep-alive chunks with no choices decode
/// to an empty list; an in-band `error` object becomes `AiError::ApiError`.
pub fn parse_chunk(data: &str) -> Result<Vec<Delta>, AiError> {
    let chunk: Chunk = serde_json::from_str(data)
        .map_err(|e| AiError::ParseError(format!("{e}, data: {data}")))?;

    if let Some(error) = chunk.error {
        return Err(AiError::ApiError(error_message(&error)));
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(Vec::new());
    };

    let mut deltas = Vec::new();
    if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
        deltas.push(Delta::Text(text));
    }
    for call in choice.delta.tool_calls.unwrap_or_default() {
        let (name, arguments) = match call.function {
            Some(f) => (f.name, f.arguments),
            None => (None, None),
        };
        deltas.push(Delta::ToolCall(ToolCallDelta {
            index: call.index,
            id: call.id,
            name,
            arguments,
        }));
    }
    Ok(deltas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_chunk() {
        let deltas = parse_chunk(
            r#"{"object":"chat.completion.chunk","choices":[{"index":0,"delta":{"content":"Hi"}}]}"#,
        )
        .unwrap();
        assert_eq!(deltas, vec![Delta::Text("Hi".into())]);
    }

    #[test]
    fn tool_call_chunk() {
        let deltas = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":1,"id":"call_9","type":"function","function":{"name":"get_xrefs","arguments":""}}]}}]}"#,
        )
        .unwrap();
        assert_eq!(
            deltas,
            vec![Delta::ToolCall(ToolCallDelta {
                index: 1,
                id: Some("call_9".into()),
                name: Some("get_xrefs".into()),
                arguments: Some(String::new()),
            })]
        );
    }

    #[test]
    fn argument_only_fragment() {
        let deltas = parse_chunk(
            r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"query\""}}]}}]}"#,
        )
        .unwrap();
        match &deltas[0] {
            Delta::ToolCall(d) => {
                assert_eq!(d.index, 0);
                assert!(d.name.is_none());
                assert_eq!(d.arguments.as_deref(), Some("{\"query\""));
            }
            other => panic!("unexpected delta {other:?}"),
        }
    }

    #[test]
    fn empty_choices_and_finish_chunks_yield_nothing() {
        assert!(parse_chunk(r#"{"choices":[],"usage":{"prompt_tokens":1}}"#)
            .unwrap()
            .is_empty());
        assert!(parse_chunk(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn in_band_errors() {
        let err = parse_chunk(r#"{"error":{"message":"provider error"}}"#).unwrap_err();
        assert!(matches!(err, AiError::ApiError(ref m) if m == "provider error"));

        let err = parse_chunk(r#"{"error":"plain"}"#).unwrap_err();
        assert!(matches!(err, AiError::ApiError(ref m) if m == "plain"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        assert!(matches!(
            parse_chunk("{not json").unwrap_err(),
            AiError::ParseError(_)
        ));
    }
}
