//! Inbound protocol messages
//!
//! Every inbound payload is a JSON object with a `type` discriminator:
//!
//! | `type`                                   | payload                      |
//! |------------------------------------------|------------------------------|
//! | `turn_end`                               | `transcript`                 |
//! | `tavily_result` / `search_result`        | optional `text`, `raw`       |
//! | `audio_chunk`                            | `data` (base64 PCM16 LE)     |
//! | `audio_end`                              |                              |
//! | `gemini_response` / `assistant_response` | `text`                       |
//! | `error`                                  | `message`                    |
//!
//! Unknown tags parse to [`ServerMessage::Unknown`] and are ignored.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ChannelError;

/// Messages received from the voice endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A finalized user transcript turn
    TurnEnd { transcript: String },

    /// Web search result for the last turn
    #[serde(rename = "tavily_result", alias = "search_result")]
    SearchResult(SearchResult),

    /// One segment of synthesized speech
    AudioChunk { data: String },

    /// End of the current playback burst
    AudioEnd,

    /// Generated assistant text
    #[serde(rename = "gemini_response", alias = "assistant_response")]
    AssistantResponse { text: String },

    /// Server-side failure report
    Error {
        #[serde(default)]
        message: String,
    },

    #[serde(other)]
    Unknown,
}

impl ServerMessage {
    /// Parse one inbound text payload
    pub fn parse(payload: &str) -> Result<Self, ChannelError> {
        serde_json::from_str(payload).map_err(|e| ChannelError::MalformedMessage(e.to_string()))
    }

    /// Wire tag, for logging
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::TurnEnd { .. } => "turn_end",
            ServerMessage::SearchResult(_) => "search_result",
            ServerMessage::AudioChunk { .. } => "audio_chunk",
            ServerMessage::AudioEnd => "audio_end",
            ServerMessage::AssistantResponse { .. } => "assistant_response",
            ServerMessage::Error { .. } => "error",
            ServerMessage::Unknown => "unknown",
        }
    }
}

/// Search result payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Short display text, when the server provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Raw search response; any other shape reads as absent
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_payload"
    )]
    pub raw: Option<SearchPayload>,
}

/// Keeps the hits of a `raw` object that has a `results` array and skips
/// entries that are not hit objects. Any other `raw` is treated as missing.
fn lenient_payload<'de, D>(deserializer: D) -> Result<Option<SearchPayload>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = serde_json::Value::deserialize(deserializer)?;
    let Some(results) = raw.get("results").and_then(|results| results.as_array()) else {
        return Ok(None);
    };
    let results = results
        .iter()
        .filter_map(|hit| SearchHit::deserialize(hit).ok())
        .collect();
    Ok(Some(SearchPayload { results }))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPayload {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl SearchResult {
    /// Display text, if it has any non-blank content
    pub fn display_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }

    /// Up to `limit` `(title, url)` pairs, with placeholders for missing fields
    pub fn sources(&self, limit: usize) -> impl Iterator<Item = (&str, &str)> {
        self.raw
            .iter()
            .flat_map(|raw| raw.results.iter())
            .take(limit)
            .map(|hit| {
                (
                    hit.title.as_deref().unwrap_or("Untitled"),
                    hit.url.as_deref().unwrap_or("#"),
                )
            })
    }

    /// Nothing worth showing
    pub fn is_empty(&self) -> bool {
        self.display_text().is_none() && self.sources(1).next().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_each_type() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"turn_end","transcript":"hello"}"#).unwrap(),
            ServerMessage::TurnEnd {
                transcript: "hello".to_string()
            }
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"audio_chunk","data":"AAA="}"#).unwrap(),
            ServerMessage::AudioChunk {
                data: "AAA=".to_string()
            }
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"audio_end"}"#).unwrap(),
            ServerMessage::AudioEnd
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"error","message":"AssemblyAI key missing"}"#).unwrap(),
            ServerMessage::Error {
                message: "AssemblyAI key missing".to_string()
            }
        );
    }

    #[test]
    fn test_aliases() {
        let tavily = ServerMessage::parse(r#"{"type":"tavily_result","text":"t"}"#).unwrap();
        let search = ServerMessage::parse(r#"{"type":"search_result","text":"t"}"#).unwrap();
        assert_eq!(tavily, search);

        let gemini = ServerMessage::parse(r#"{"type":"gemini_response","text":"hi"}"#).unwrap();
        let assistant =
            ServerMessage::parse(r#"{"type":"assistant_response","text":"hi"}"#).unwrap();
        assert_eq!(gemini, assistant);
        assert_eq!(assistant.kind(), "assistant_response");
    }

    #[test]
    fn test_unknown_type_is_not_an_error() {
        let msg = ServerMessage::parse(r#"{"type":"session_begin","id":"x"}"#).unwrap();
        assert_eq!(msg, ServerMessage::Unknown);
    }

    #[test]
    fn test_malformed_payloads() {
        for payload in [
            "not json",
            "{}",
            r#"{"transcript":"no tag"}"#,
            r#"{"type":"turn_end"}"#,
            r#"{"type":"audio_chunk","data":42}"#,
            "[1,2,3]",
        ] {
            let err = ServerMessage::parse(payload).unwrap_err();
            assert!(matches!(err, ChannelError::MalformedMessage(_)), "{}", payload);
        }
    }

    #[test]
    fn test_search_result_with_raw_payload() {
        let msg = ServerMessage::parse(
            r#"{
                "type": "tavily_result",
                "text": "Rust: a language",
                "raw": {
                    "query": "what is rust",
                    "results": [
                        {"title": "Rust", "url": "https://rust-lang.org", "content": "..."},
                        {"url": "https://example.com"},
                        {"title": null, "url": null},
                        {"title": "Fourth", "url": "https://four.example"}
                    ]
                }
            }"#,
        )
        .unwrap();

        let ServerMessage::SearchResult(result) = msg else {
            panic!("expected search result");
        };
        assert_eq!(result.display_text(), Some("Rust: a language"));
        let sources: Vec<_> = result.sources(3).collect();
        assert_eq!(
            sources,
            vec![
                ("Rust", "https://rust-lang.org"),
                ("Untitled", "https://example.com"),
                ("Untitled", "#"),
            ]
        );
    }

    #[test]
    fn test_search_text_survives_odd_raw() {
        for raw in [
            r#""plain string""#,
            "null",
            "[1, 2]",
            r#"{"results": "none"}"#,
            r#"{"answer": "no results key"}"#,
        ] {
            let payload = format!(r#"{{"type":"tavily_result","text":"kept","raw":{}}}"#, raw);
            let ServerMessage::SearchResult(result) = ServerMessage::parse(&payload).unwrap() else {
                panic!("expected search result for raw {}", raw);
            };
            assert_eq!(result.display_text(), Some("kept"));
            assert_eq!(result.sources(3).count(), 0, "{}", raw);
        }
    }

    #[test]
    fn test_search_hits_that_are_not_objects_are_skipped() {
        let msg = ServerMessage::parse(
            r#"{
                "type": "search_result",
                "raw": {"results": ["loose", 42, {"title": "Kept", "url": "https://kept.example"}, {"title": 7}]}
            }"#,
        )
        .unwrap();
        let ServerMessage::SearchResult(result) = msg else {
            panic!("expected search result");
        };
        let sources: Vec<_> = result.sources(3).collect();
        assert_eq!(sources, vec![("Kept", "https://kept.example")]);
        assert!(!result.is_empty());
    }

    #[test]
    fn test_empty_search_result() {
        let msg = ServerMessage::parse(r#"{"type":"tavily_result","text":"  "}"#).unwrap();
        let ServerMessage::SearchResult(result) = msg else {
            panic!("expected search result");
        };
        assert!(result.is_empty());
    }
}
