//! Completion-stream event model.
//!
//! Mirrors the Anthropic Messages streaming events closely enough to route
//! them; only the two delta kinds carry text the relay forwards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One event from the completion stream, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    MessageStart {
        #[serde(default)]
        message: Value,
    },
    ContentBlockStart {
        #[serde(default)]
        index: usize,
        #[serde(default)]
        content_block: Value,
    },
    ContentBlockDelta {
        #[serde(default)]
        index: usize,
        delta: Delta,
    },
    ContentBlockStop {
        #[serde(default)]
        index: usize,
    },
    MessageDelta {
        delta: Delta,
        #[serde(default)]
        usage: Option<Value>,
    },
    MessageStop,
    Ping,
    Error {
        #[serde(default)]
        error: Value,
    },
    #[serde(other)]
    Unknown,
}

impl StreamEvent {
    /// The delta payload of a content or message delta; `None` for every other event.
    pub fn delta(&self) -> Option<&Delta> {
        match self {
            StreamEvent::ContentBlockDelta { delta, .. } | StreamEvent::MessageDelta { delta, .. } => {
                Some(delta)
            }
            _ => None,
        }
    }

    /// Text to forward for this event, if it is a delta kind.
    pub fn text(&self) -> Option<String> {
        self.delta().map(Delta::extract_text)
    }
}

/// Delta payload. `text` and `content` are the fields searched for text;
/// everything else is kept so the payload can be stringified intact.
/// Both are loosely typed so an unexpected shape never fails decoding.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,

    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl Delta {
    /// A non-empty string `text` wins. Otherwise a string `content` is used
    /// as is, even when empty. Anything else yields the payload as compact
    /// JSON, so this always produces a string.
    pub fn extract_text(&self) -> String {
        if let Some(Value::String(text)) = &self.text {
            if !text.is_empty() {
                return text.clone();
            }
        }

        if let Some(Value::String(content)) = &self.content {
            return content.clone();
        }

        serde_json::to_string(self).unwrap_or_else(|_| format!("{self:?}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StreamEvent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_content_block_delta_text() {
        let event = parse(
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"def"}}"#,
        );
        assert_eq!(event.text().as_deref(), Some("def"));
    }

    #[test]
    fn test_text_takes_precedence_over_content() {
        let delta = Delta {
            text: Some(Value::from("primary")),
            content: Some(Value::from("secondary")),
            rest: Map::new(),
        };
        assert_eq!(delta.extract_text(), "primary");
    }

    #[test]
    fn test_content_used_when_text_absent() {
        let event = parse(r#"{"type":"message_delta","delta":{"content":"fallback"}}"#);
        assert_eq!(event.text().as_deref(), Some("fallback"));
    }

    #[test]
    fn test_empty_text_falls_through() {
        let delta = Delta {
            text: Some(Value::from("")),
            content: Some(Value::from("second")),
            rest: Map::new(),
        };
        assert_eq!(delta.extract_text(), "second");
    }

    #[test]
    fn test_empty_text_and_content_yield_empty_string() {
        let event = parse(
            r#"{"type":"content_block_delta","index":0,"delta":{"text":"","content":""}}"#,
        );
        assert_eq!(event.text().as_deref(), Some(""));
    }

    #[test]
    fn test_empty_text_without_content_is_stringified() {
        let event = parse(r#"{"type":"content_block_delta","index":0,"delta":{"text":""}}"#);
        assert_eq!(event.text().as_deref(), Some(r#"{"text":""}"#));
    }

    #[test]
    fn test_non_string_content_does_not_fail_decoding() {
        let event = parse(
            r#"{"type":"content_block_delta","index":0,"delta":{"content":[{"type":"text","text":"hi"}]}}"#,
        );
        let text = event.text().unwrap();
        let round: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(round["content"][0]["text"], "hi");
    }

    #[test]
    fn test_non_string_text_falls_through_to_content() {
        let event = parse(
            r#"{"type":"message_delta","delta":{"text":42,"content":"fallback"}}"#,
        );
        assert_eq!(event.text().as_deref(), Some("fallback"));
    }

    #[test]
    fn test_stringify_when_no_text_fields() {
        let event = parse(
            r#"{"type":"message_delta","delta":{"stop_reason":"end_turn","stop_sequence":null},"usage":{"output_tokens":15}}"#,
        );
        let text = event.text().unwrap();
        let round: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(round["stop_reason"], "end_turn");
        assert!(round["stop_sequence"].is_null());
    }

    #[test]
    fn test_non_delta_events_have_no_text() {
        for json in [
            r#"{"type":"message_start","message":{"id":"msg_1"}}"#,
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            r#"{"type":"content_block_stop","index":0}"#,
            r#"{"type":"message_stop"}"#,
            r#"{"type":"ping"}"#,
            r#"{"type":"something_new","payload":1}"#,
        ] {
            assert_eq!(parse(json).text(), None, "{json}");
        }
    }

    #[test]
    fn test_unknown_type_parses() {
        assert_eq!(parse(r#"{"type":"brand_new_event"}"#), StreamEvent::Unknown);
    }
}
