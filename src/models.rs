use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl TryFrom<&str> for MessageRole {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(format!("Unknown role: {other}")),
        }
    }
}

/// One conversation turn as the client sends it.
///
/// The role is kept as the raw string so unrecognised roles reach the
/// upstream adapter untouched; only the shape (`role` and `content` strings)
/// is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self { role: role.as_str().to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    /// Parsed role, or `None` for a role string outside the known set.
    pub fn known_role(&self) -> Option<MessageRole> {
        MessageRole::try_from(self.role.as_str()).ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub conversation_history: Option<Vec<ChatMessage>>,
}

impl ChatRequest {
    /// Strictly parses a request body. Any shape mismatch, a missing
    /// `message`, or an empty `message` is a validation error.
    pub fn parse(body: &[u8]) -> Result<Self, AppError> {
        let request: ChatRequest = serde_json::from_slice(body)?;
        if request.message.is_empty() {
            return Err(AppError::empty_field("message"));
        }
        Ok(request)
    }

    /// The message list sent upstream: the history, in order, followed by the
    /// new user turn.
    pub fn into_messages(self) -> Vec<ChatMessage> {
        let mut messages = self.conversation_history.unwrap_or_default();
        messages.push(ChatMessage::user(self.message));
        messages
    }
}

// ── Outbound events ───────────────────────────────────────────────────────────

/// One frame of the outbound event stream.
///
/// Serialises to the `data:` payload, with `type` as the discriminator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RelayEvent {
    Start {
        timestamp: f64,
    },
    Content {
        content: String,
        timestamp: f64,
    },
    Done {
        #[serde(rename = "fullContent")]
        full_content: String,
        timestamp: f64,
    },
    Error {
        error: String,
        timestamp: f64,
    },
}

impl RelayEvent {
    pub fn start() -> Self {
        RelayEvent::Start { timestamp: now_timestamp() }
    }

    pub fn content(content: impl Into<String>) -> Self {
        RelayEvent::Content { content: content.into(), timestamp: now_timestamp() }
    }

    pub fn done(full_content: impl Into<String>) -> Self {
        RelayEvent::Done { full_content: full_content.into(), timestamp: now_timestamp() }
    }

    pub fn error(error: impl Into<String>) -> Self {
        RelayEvent::Error { error: error.into(), timestamp: now_timestamp() }
    }

    /// SSE `event:` name for this frame.
    pub fn event_name(&self) -> &'static str {
        match self {
            RelayEvent::Start { .. } => "start",
            RelayEvent::Content { .. } => "message",
            RelayEvent::Done { .. } => "done",
            RelayEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RelayEvent::Done { .. } | RelayEvent::Error { .. })
    }
}

/// Seconds since the Unix epoch, with sub-second precision.
pub fn now_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
