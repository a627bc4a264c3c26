//! src/proto.rs — JSON 線上協定

use serde::{Deserialize, Serialize};

use crate::state::Message;

/* ---------------- client → hub ---------------- */
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    Join { username: String },
    Message { username: String, text: String },
    Leave { username: String },
    DeleteUserMessages { username: String },
    DeleteUserAccount { username: String },
}

/* ---------------- hub → client ---------------- */
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEvent {
    /// 只回給剛 join 的那條連線
    Init {
        messages: Vec<Message>,
        online: Vec<String>,
        known_users: Vec<String>,
    },
    Online {
        online: Vec<String>,
    },
    Message {
        message: Message,
    },
    /// 批次刪除後整份重播
    Messages {
        messages: Vec<Message>,
    },
    /// 需要確認的操作,結果只回呼叫端
    Ack {
        op: &'static str,
        ok: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        removed_count: Option<usize>,
        #[serde(skip_serializing_if = "Option::is_none")]
        err: Option<String>,
    },
}

impl ServerEvent {
    pub fn ack_ok(op: &'static str) -> Self {
        Self::Ack { op, ok: true, removed_count: None, err: None }
    }

    pub fn ack_removed(op: &'static str, removed_count: usize) -> Self {
        Self::Ack { op, ok: true, removed_count: Some(removed_count), err: None }
    }

    pub fn ack_err(op: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Ack { op, ok: false, removed_count: None, err: Some(err.to_string()) }
    }
}

/// 每條連線 outbound 佇列上的封包:事件,或要求 transport 收線
#[derive(Debug, Clone)]
pub enum Outbound {
    Event(ServerEvent),
    Close,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn client_events_decode_by_tag() {
        let ev: ClientEvent =
            serde_json::from_value(json!({"type": "join", "username": "bob"})).unwrap();
        assert!(matches!(ev, ClientEvent::Join { username } if username == "bob"));

        let ev: ClientEvent = serde_json::from_value(
            json!({"type": "delete_user_account", "username": "bob"}),
        )
        .unwrap();
        assert!(matches!(ev, ClientEvent::DeleteUserAccount { .. }));
    }

    #[test]
    fn ack_omits_empty_fields() {
        let frame = serde_json::to_value(ServerEvent::ack_ok("leave")).unwrap();
        assert_eq!(frame, json!({"type": "ack", "op": "leave", "ok": true}));

        let frame =
            serde_json::to_value(ServerEvent::ack_removed("delete_user_messages", 3)).unwrap();
        assert_eq!(
            frame,
            json!({"type": "ack", "op": "delete_user_messages", "ok": true, "removed_count": 3})
        );
    }

    #[test]
    fn server_events_tag_snake_case() {
        let frame = serde_json::to_value(ServerEvent::Online { online: vec!["bob".into()] }).unwrap();
        assert_eq!(frame, json!({"type": "online", "online": ["bob"]}));
    }
}
