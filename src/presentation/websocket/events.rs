//! WebSocket Event Frames
//!
//! Wire format for the discussion rooms. Every frame is JSON of the shape
//! `{"event": <name>, "data": <payload>}` in both directions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{ChatMessage, Participant};

/// Inbound event frames
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Join a discussion room
    Join(JoinPayload),
    /// Send a chat message to a room
    Message(MessagePayload),
    /// Author-only progress update, broadcast to the room
    DiscussionProgress(ProgressPayload),
    /// Request a membership/ban snapshot
    Status(StatusRequestPayload),
    /// Author-only: ban a nickname from the room
    Ban(ModerationPayload),
    /// Author-only: lift a ban
    Unban(ModerationPayload),
}

impl ClientEvent {
    /// Wire-level event name, for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Join(_) => "join",
            ClientEvent::Message(_) => "message",
            ClientEvent::DiscussionProgress(_) => "discussionProgress",
            ClientEvent::Status(_) => "status",
            ClientEvent::Ban(_) => "ban",
            ClientEvent::Unban(_) => "unban",
        }
    }

    /// The discussion the event targets.
    pub fn discussion_id(&self) -> i64 {
        match self {
            ClientEvent::Join(p) => p.discussion_id,
            ClientEvent::Message(p) => p.discussion_id,
            ClientEvent::DiscussionProgress(p) => p.discussion_id,
            ClientEvent::Status(p) => p.discussion_id,
            ClientEvent::Ban(p) => p.discussion_id,
            ClientEvent::Unban(p) => p.discussion_id,
        }
    }
}

/// join payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinPayload {
    pub discussion_id: i64,
}

/// message payload
///
/// The `jwt` field is accepted for wire compatibility with older clients
/// that re-sent their token per message; sender identity always comes from
/// the connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub discussion_id: i64,
    #[serde(default)]
    pub jwt: Option<String>,
    pub message: String,
}

/// discussionProgress payload (both directions)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressPayload {
    pub discussion_id: i64,
    pub progress: serde_json::Value,
}

/// status request payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRequestPayload {
    pub discussion_id: i64,
}

/// ban/unban payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationPayload {
    pub discussion_id: i64,
    pub nickname: String,
}

/// Outbound event frames
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Membership/ban snapshot
    Status(StatusPayload),
    /// Prior chat content placeholder, sent to a joining connection
    History(HistoryPayload),
    /// Informational notice
    Info(InfoPayload),
    /// Scoped error
    Error(ErrorPayload),
    /// Chat message broadcast
    Message(ChatMessagePayload),
    /// Progress broadcast
    DiscussionProgress(ProgressPayload),
}

impl ServerEvent {
    /// Build an info frame.
    pub fn info(message: impl Into<String>) -> Self {
        ServerEvent::Info(InfoPayload {
            message: message.into(),
        })
    }

    /// Build a scoped error frame.
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorPayload {
            message: message.into(),
        })
    }
}

/// status payload: known members and current bans
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusPayload {
    pub discussion_id: i64,
    pub members: Vec<Participant>,
    pub banned: Vec<Participant>,
}

/// history payload; message retrieval is not implemented at this layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPayload {
    pub messages: Vec<String>,
}

/// info payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InfoPayload {
    pub message: String,
}

/// error payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
}

/// message broadcast payload
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessagePayload {
    pub discussion_id: i64,
    pub message_id: String,
    pub nickname: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl From<ChatMessage> for ChatMessagePayload {
    fn from(message: ChatMessage) -> Self {
        Self {
            discussion_id: message.discussion_id,
            message_id: message.id.to_string(),
            nickname: message.nickname,
            message: message.content,
            created_at: message.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_join_frame_deserializes() {
        let frame = r#"{"event":"join","data":{"discussionId":42}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();

        match event {
            ClientEvent::Join(p) => assert_eq!(p.discussion_id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_progress_frame_uses_camel_case_name() {
        let frame = r#"{"event":"discussionProgress","data":{"discussionId":1,"progress":{"stage":2}}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();

        assert_eq!(event.name(), "discussionProgress");
        assert_eq!(event.discussion_id(), 1);
    }

    #[test]
    fn test_message_frame_jwt_is_optional() {
        let frame = r#"{"event":"message","data":{"discussionId":1,"message":"hi"}}"#;
        let event: ClientEvent = serde_json::from_str(frame).unwrap();

        match event {
            ClientEvent::Message(p) => {
                assert_eq!(p.message, "hi");
                assert!(p.jwt.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_error_frame_shape() {
        let event = ServerEvent::error("Discussion does not exist");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "event": "error",
                "data": {"message": "Discussion does not exist"}
            })
        );
    }

    #[test]
    fn test_status_frame_shape() {
        let event = ServerEvent::Status(StatusPayload {
            discussion_id: 7,
            members: vec![Participant {
                user_id: 1,
                nickname: "alice".into(),
            }],
            banned: vec![],
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "status");
        assert_eq!(json["data"]["discussionId"], 7);
        assert_eq!(json["data"]["members"][0]["nickname"], "alice");
    }
}
