use llm_provider::{Message, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRecordType {
    Session,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRecordType {
    Message,
}

/// First line of a session file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionHeader {
    #[serde(rename = "type")]
    pub record_type: SessionRecordType,
    pub version: u32,
    pub session_id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl SessionHeader {
    #[must_use]
    pub fn v1(
        session_id: impl Into<String>,
        name: impl Into<String>,
        created_at: impl Into<String>,
        updated_at: impl Into<String>,
    ) -> Self {
        Self {
            record_type: SessionRecordType::Session,
            version: 1,
            session_id: session_id.into(),
            name: name.into(),
            created_at: created_at.into(),
            updated_at: updated_at.into(),
        }
    }
}

/// One conversation message on its own line after the header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageRecord {
    #[serde(rename = "type")]
    pub record_type: MessageRecordType,
    pub role: Role,
    pub content: String,
}

impl MessageRecord {
    #[must_use]
    pub fn into_message(self) -> Message {
        Message {
            role: self.role,
            content: self.content,
        }
    }
}

impl From<&Message> for MessageRecord {
    fn from(message: &Message) -> Self {
        Self {
            record_type: MessageRecordType::Message,
            role: message.role,
            content: message.content.clone(),
        }
    }
}

/// A fully loaded session: header plus transcript in original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSession {
    pub header: SessionHeader,
    pub messages: Vec<MessageRecord>,
}

impl StoredSession {
    #[must_use]
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
            .into_iter()
            .map(MessageRecord::into_message)
            .collect()
    }
}
