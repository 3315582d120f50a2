//! JSON frames exchanged over the chat socket.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// `{ "to": ..., "content": ... }`
    Chat { to: String, content: String },
    /// `{ "type": "typing", "to": ..., "isTyping": ... }`
    Typing { to: String, is_typing: bool },
}

/// Wire shape accepted from clients. Any `from`/`timestamp` fields a client
/// sends are not even read.
#[derive(Debug, Deserialize)]
struct RawInbound {
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    to: Option<String>,
    content: Option<String>,
    #[serde(rename = "isTyping", default)]
    is_typing: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary frame is not UTF-8")]
    NotUtf8,
    #[error("unknown frame type {0:?}")]
    UnknownType(String),
    #[error("chat frame without content")]
    MissingContent,
}

pub fn decode_inbound(text: &str) -> Result<Inbound, DecodeError> {
    let raw: RawInbound = serde_json::from_str(text)?;
    match raw.kind.as_deref() {
        None | Some("message") => Ok(Inbound::Chat {
            to: raw.to.unwrap_or_default(),
            content: raw.content.ok_or(DecodeError::MissingContent)?,
        }),
        Some("typing") => Ok(Inbound::Typing {
            to: raw.to.unwrap_or_default(),
            is_typing: raw.is_typing,
        }),
        Some(other) => Err(DecodeError::UnknownType(other.to_string())),
    }
}

pub fn decode_binary(data: &[u8]) -> Result<Inbound, DecodeError> {
    let text = std::str::from_utf8(data).map_err(|_| DecodeError::NotUtf8)?;
    decode_inbound(text)
}

/// `{ "type": "user_list", "users": [...] }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresenceFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub users: Vec<String>,
}

impl PresenceFrame {
    pub fn new(users: Vec<String>) -> Self {
        Self {
            kind: "user_list".to_string(),
            users,
        }
    }
}

/// `{ "type": "typing", "from", "to", "isTyping" }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TypingFrame {
    #[serde(rename = "type")]
    pub kind: String,
    pub from: String,
    pub to: String,
    #[serde(rename = "isTyping")]
    pub is_typing: bool,
}

impl TypingFrame {
    pub fn new(from: &str, to: &str, is_typing: bool) -> Self {
        Self {
            kind: "typing".to_string(),
            from: from.to_string(),
            to: to.to_string(),
            is_typing,
        }
    }
}

/// Serialize an outbound frame into a text message.
pub fn encode<T: Serialize>(frame: &T) -> Result<Message, serde_json::Error> {
    Ok(Message::Text(serde_json::to_string(frame)?.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_frame_ignores_client_sender_and_timestamp() {
        let frame = decode_inbound(
            r#"{"from":"mallory","to":"bob","content":"hi","timestamp":"1999-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        assert_eq!(
            frame,
            Inbound::Chat {
                to: "bob".into(),
                content: "hi".into()
            }
        );
    }

    #[test]
    fn test_typing_frame() {
        let frame = decode_inbound(r#"{"type":"typing","from":"x","to":"bob","isTyping":true}"#)
            .unwrap();
        assert_eq!(
            frame,
            Inbound::Typing {
                to: "bob".into(),
                is_typing: true
            }
        );
    }

    #[test]
    fn test_missing_receiver_decodes_as_empty() {
        // Empty receivers are a validation concern, not a decode failure.
        for text in [r#"{"content":"hi"}"#, r#"{"to":null,"content":"hi"}"#] {
            assert_eq!(
                decode_inbound(text).unwrap(),
                Inbound::Chat {
                    to: String::new(),
                    content: "hi".into()
                }
            );
        }
        assert_eq!(
            decode_inbound(r#"{"type":"typing","to":null,"isTyping":true}"#).unwrap(),
            Inbound::Typing {
                to: String::new(),
                is_typing: true
            }
        );
    }

    #[test]
    fn test_malformed_frames() {
        assert!(matches!(decode_inbound("{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(
            decode_inbound(r#"{"to":"bob"}"#),
            Err(DecodeError::MissingContent)
        ));
        assert!(matches!(
            decode_inbound(r#"{"type":"shout","to":"bob"}"#),
            Err(DecodeError::UnknownType(t)) if t == "shout"
        ));
        assert!(matches!(
            decode_binary(&[0xff, 0xfe]),
            Err(DecodeError::NotUtf8)
        ));
    }

    #[test]
    fn test_presence_frame_shape() {
        let json = serde_json::to_value(PresenceFrame::new(vec!["a".into(), "b".into()])).unwrap();
        assert_eq!(json, serde_json::json!({"type": "user_list", "users": ["a", "b"]}));
    }
}
