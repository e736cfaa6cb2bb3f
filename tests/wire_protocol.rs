//! Wire Protocol Tests
//!
//! Contract tests for the WebSocket frame format: every frame is JSON of
//! the shape `{"event": <name>, "data": <payload>}` with camelCase keys.
//! These run against the crate's public event types, no live transport.

use chrono::Utc;
use pretty_assertions::assert_eq;
use serde_json::json;
use test_case::test_case;

use agora::domain::{ChatMessage, Participant};
use agora::presentation::websocket::events::{
    ChatMessagePayload, ClientEvent, HistoryPayload, ProgressPayload, ServerEvent, StatusPayload,
};

#[test_case(r#"{"event":"join","data":{"discussionId":1}}"#, "join")]
#[test_case(r#"{"event":"message","data":{"discussionId":1,"message":"hi"}}"#, "message")]
#[test_case(
    r#"{"event":"discussionProgress","data":{"discussionId":1,"progress":{}}}"#,
    "discussionProgress"
)]
#[test_case(r#"{"event":"status","data":{"discussionId":1}}"#, "status")]
#[test_case(r#"{"event":"ban","data":{"discussionId":1,"nickname":"bob"}}"#, "ban")]
#[test_case(r#"{"event":"unban","data":{"discussionId":1,"nickname":"bob"}}"#, "unban")]
fn every_inbound_event_name_parses(frame: &str, expected_name: &str) {
    let event: ClientEvent = serde_json::from_str(frame).unwrap();
    assert_eq!(event.name(), expected_name);
    assert_eq!(event.discussion_id(), 1);
}

#[test]
fn unknown_event_names_are_rejected() {
    let frame = r#"{"event":"shutdown","data":{}}"#;
    assert!(serde_json::from_str::<ClientEvent>(frame).is_err());
}

#[test]
fn message_frame_tolerates_legacy_jwt_field() {
    let frame = r#"{"event":"message","data":{"discussionId":3,"jwt":"abc.def.ghi","message":"hello"}}"#;
    let event: ClientEvent = serde_json::from_str(frame).unwrap();

    match event {
        ClientEvent::Message(payload) => {
            assert_eq!(payload.discussion_id, 3);
            assert_eq!(payload.jwt.as_deref(), Some("abc.def.ghi"));
            assert_eq!(payload.message, "hello");
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[test]
fn status_broadcast_uses_camel_case_keys() {
    let event = ServerEvent::Status(StatusPayload {
        discussion_id: 9,
        members: vec![Participant {
            user_id: 1,
            nickname: "alice".into(),
        }],
        banned: vec![Participant {
            user_id: 2,
            nickname: "bob".into(),
        }],
    });

    let frame = serde_json::to_value(&event).unwrap();

    assert_eq!(frame["event"], "status");
    assert_eq!(frame["data"]["discussionId"], 9);
    assert_eq!(frame["data"]["members"][0]["nickname"], "alice");
    assert_eq!(frame["data"]["banned"][0]["nickname"], "bob");
}

#[test]
fn error_frame_is_message_only() {
    let frame = serde_json::to_value(ServerEvent::error("Discussion does not exist")).unwrap();

    assert_eq!(
        frame,
        json!({
            "event": "error",
            "data": {"message": "Discussion does not exist"}
        })
    );
}

#[test]
fn history_frame_carries_a_message_list() {
    let frame = serde_json::to_value(ServerEvent::History(HistoryPayload {
        messages: Vec::new(),
    }))
    .unwrap();

    assert_eq!(frame["event"], "history");
    assert!(frame["data"]["messages"].as_array().unwrap().is_empty());
}

#[test]
fn message_broadcast_carries_persisted_fields() {
    let created_at = Utc::now();
    let payload: ChatMessagePayload = ChatMessage {
        id: 99,
        discussion_id: 5,
        user_id: 1,
        nickname: "alice".into(),
        content: "hello".into(),
        created_at,
    }
    .into();

    let frame = serde_json::to_value(ServerEvent::Message(payload)).unwrap();

    assert_eq!(frame["event"], "message");
    assert_eq!(frame["data"]["discussionId"], 5);
    assert_eq!(frame["data"]["messageId"], "99");
    assert_eq!(frame["data"]["nickname"], "alice");
    assert_eq!(frame["data"]["message"], "hello");
    assert!(frame["data"]["createdAt"].is_string());
}

#[test]
fn progress_frame_round_trips() {
    let inbound = r#"{"event":"discussionProgress","data":{"discussionId":4,"progress":{"stage":2,"topic":"closing"}}}"#;
    let event: ClientEvent = serde_json::from_str(inbound).unwrap();

    let progress = match event {
        ClientEvent::DiscussionProgress(p) => p,
        other => panic!("unexpected event: {:?}", other),
    };

    let outbound = serde_json::to_value(ServerEvent::DiscussionProgress(ProgressPayload {
        discussion_id: progress.discussion_id,
        progress: progress.progress,
    }))
    .unwrap();

    assert_eq!(outbound["event"], "discussionProgress");
    assert_eq!(outbound["data"]["discussionId"], 4);
    assert_eq!(outbound["data"]["progress"]["stage"], 2);
}
