//! Chat messages exchanged with a backend.

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single conversation turn. Immutable once constructed.
///
/// [`Message::try_new`] and deserialization reject blank content. The
/// `system`/`user`/`assistant` shorthands do not check; a request holding a
/// blank message fails [`ChatRequest::validate`](crate::types::ChatRequest::validate),
/// which the client runs before contacting any backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawMessage")]
pub struct Message {
    role: MessageRole,
    content: String,
}

#[derive(Deserialize)]
struct RawMessage {
    role: MessageRole,
    content: String,
}

impl TryFrom<RawMessage> for Message {
    type Error = Error;

    fn try_from(raw: RawMessage) -> Result<Self> {
        Message::try_new(raw.role, raw.content)
    }
}

impl Message {
    /// Checked constructor; rejects blank content.
    pub fn try_new(role: MessageRole, content: impl Into<String>) -> Result<Self> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(Error::validation(
                format!("{} message content must not be empty", role),
                ErrorContext::new()
                    .with_field_path("message.content")
                    .with_source("message"),
            ));
        }
        Ok(Self { role, content })
    }

    /// Unchecked shorthand; see the type docs.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: text.into(),
        }
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_new_rejects_blank_content() {
        let err = Message::try_new(MessageRole::User, " \n").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Validation);
        assert!(Message::try_new(MessageRole::Assistant, "ok").is_ok());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn test_deserialize_rejects_blank_content() {
        let err = serde_json::from_str::<Message>(r#"{"role":"user","content":"   "}"#).unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
        let msg: Message = serde_json::from_str(r#"{"role":"system","content":"be brief"}"#).unwrap();
        assert_eq!(msg.role(), MessageRole::System);
    }
}
