//! routes/ws.rs
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket, WebSocketUpgrade},
        Extension,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn};

use crate::{
    hub::{OutboundTx, SharedHub},
    proto::{ClientEvent, Outbound, ServerEvent},
    state::ConnId,
};

pub fn router() -> Router {
    Router::new().route("/chat", get(ws_handler))
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    Extension(hub): Extension<SharedHub>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_session(socket, hub))
}

/* ---------------- per connection ---------------- */
async fn client_session(socket: WebSocket, hub: SharedHub) {
    let conn: ConnId = uuid::Uuid::new_v4();
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Outbound>();
    hub.attach(conn, tx.clone()).await;
    info!(%conn, "connected");

    /* outbound 佇列 → socket */
    let writer = tokio::spawn(async move {
        while let Some(out) = rx.recv().await {
            match out {
                Outbound::Event(ev) => {
                    let frame = match serde_json::to_string(&ev) {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(%e, "outbound frame lost");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(frame)).await.is_err() {
                        break;
                    }
                }
                Outbound::Close => {
                    sink.send(WsMessage::Close(None)).await.ok();
                    break;
                }
            }
        }
    });

    while let Some(Ok(WsMessage::Text(raw))) = stream.next().await {
        match serde_json::from_str::<ClientEvent>(&raw) {
            Ok(ev) => dispatch(&hub, conn, &tx, ev).await,
            Err(e) => warn!(%conn, %e, "unreadable frame dropped"),
        }
    }

    hub.disconnect(conn).await;
    writer.abort();
    info!(%conn, "closed");
}

async fn dispatch(hub: &SharedHub, conn: ConnId, tx: &OutboundTx, ev: ClientEvent) {
    match ev {
        ClientEvent::Join { username } => hub.join(conn, &username).await,
        ClientEvent::Message { username, text } => hub.chat_message(&username, &text).await,
        ClientEvent::Leave { username } => {
            let ack = match hub.leave(conn, &username).await {
                Ok(()) => ServerEvent::ack_ok("leave"),
                Err(e) => ServerEvent::ack_err("leave", e),
            };
            tx.send(Outbound::Event(ack)).ok();
        }
        ClientEvent::DeleteUserMessages { username } => {
            let ack = match hub.delete_user_messages(conn, &username).await {
                Ok(n) => ServerEvent::ack_removed("delete_user_messages", n),
                Err(e) => ServerEvent::ack_err("delete_user_messages", e),
            };
            tx.send(Outbound::Event(ack)).ok();
        }
        ClientEvent::DeleteUserAccount { username } => {
            // 呼叫端若正綁在這個帳號上,收線指令會排在 ack 前面
            let ack = match hub.delete_user_account(&username).await {
                Ok(n) => ServerEvent::ack_removed("delete_user_account", n),
                Err(e) => ServerEvent::ack_err("delete_user_account", e),
            };
            tx.send(Outbound::Event(ack)).ok();
        }
    }
}
