// src/message.rs
use serde::{Deserialize, Serialize};

/// Session id used when the caller does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            session_id: Some(session_id.into()),
        }
    }

    /// The session this request belongs to, falling back to the shared default.
    pub fn session(&self) -> &str {
        match self.session_id.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => DEFAULT_SESSION_ID,
        }
    }
}

/// Reply body of `POST /api/chat`.
///
/// `audio` is base64 encoded MPEG audio; the server sends `""` when no speech
/// was synthesized, older servers may omit it entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: String,
    #[serde(default)]
    pub expression: Option<String>,
    #[serde(default)]
    pub audio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_session_falls_back_to_default() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi","session_id":"  "}"#).unwrap();
        assert_eq!(req.session(), DEFAULT_SESSION_ID);

        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.session(), DEFAULT_SESSION_ID);
    }

    #[test]
    fn response_tolerates_missing_optional_fields() {
        let resp: ChatResponse = serde_json::from_str(r#"{"message":"hi there"}"#).unwrap();
        assert_eq!(resp.message, "hi there");
        assert!(resp.expression.is_none());
        assert!(resp.audio.is_none());

        let resp: ChatResponse =
            serde_json::from_str(r#"{"message":"x","expression":null,"audio":""}"#).unwrap();
        assert_eq!(resp.audio.as_deref(), Some(""));
    }
}
