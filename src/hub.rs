//! src/hub.rs — 連線生命週期的協調中樞

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::{
    error::AppResult,
    persist::PersistQueue,
    proto::{Outbound, ServerEvent},
    state::{ConnId, ConnectionRegistry, KnownUsers, Message, MessageStore},
};

pub type OutboundTx = mpsc::UnboundedSender<Outbound>;
pub type SharedHub = Arc<Hub>;

/* ------------ 廣播群組 ------------ */
#[derive(Default)]
pub struct BroadcastGroup {
    members: HashMap<ConnId, OutboundTx>,
}

impl BroadcastGroup {
    pub fn register(&mut self, conn: ConnId, tx: OutboundTx) {
        self.members.insert(conn, tx);
    }

    pub fn remove(&mut self, conn: ConnId) {
        self.members.remove(&conn);
    }

    pub fn send_to(&self, conn: ConnId, event: ServerEvent) {
        if let Some(tx) = self.members.get(&conn) {
            tx.send(Outbound::Event(event)).ok();
        }
    }

    /// 逐一送給目前的成員;接收端已死就略過,不重送
    pub fn broadcast(&self, event: &ServerEvent) {
        for tx in self.members.values() {
            tx.send(Outbound::Event(event.clone())).ok();
        }
    }

    /// 要求 transport 收線,並立刻退出群組
    pub fn close(&mut self, conn: ConnId) {
        if let Some(tx) = self.members.remove(&conn) {
            tx.send(Outbound::Close).ok();
        }
    }
}

/* ------------ hub ------------ */

struct HubState {
    messages: MessageStore,
    known: KnownUsers,
    bindings: ConnectionRegistry,
    group: BroadcastGroup,
}

/// 協定事件都走這裡:同一事件的讀寫在一次鎖定內完成,
/// 落盤只丟快照進佇列,絕不在鎖內等 I/O。
pub struct Hub {
    state: RwLock<HubState>,
    persist: PersistQueue,
}

#[derive(Debug, Serialize)]
pub struct DebugState {
    pub messages: Vec<Message>,
    pub known_users: Vec<String>,
    pub online: Vec<String>,
}

impl Hub {
    pub fn shared(
        messages: Vec<Message>,
        known_users: HashSet<String>,
        persist: PersistQueue,
    ) -> SharedHub {
        Arc::new(Self {
            state: RwLock::new(HubState {
                messages: MessageStore::new(messages),
                known: KnownUsers::new(known_users),
                bindings: ConnectionRegistry::default(),
                group: BroadcastGroup::default(),
            }),
            persist,
        })
    }

    /// transport 建立連線後先掛進廣播群組,join 前就會收到廣播
    pub async fn attach(&self, conn: ConnId, tx: OutboundTx) {
        self.state.write().await.group.register(conn, tx);
    }

    /* ---------------- join ---------------- */
    pub async fn join(&self, conn: ConnId, username: &str) {
        let mut st = self.state.write().await;
        st.bindings.bind(conn, username);
        if st.known.add(username) {
            self.persist.submit_users(st.known.snapshot());
        }

        let init = ServerEvent::Init {
            messages: st.messages.snapshot(),
            online: st.bindings.online_usernames(),
            known_users: st.known.snapshot(),
        };
        st.group.send_to(conn, init);

        let online = st.bindings.online_usernames();
        st.group.broadcast(&ServerEvent::Online { online });
        self.push_system(&mut st, format!("{username} joined the chat"));
        info!(%conn, username, "joined");
    }

    /* ---------------- message ---------------- */
    /// 不檢查狀態機:沒 join 過的連線送訊息照收
    pub async fn chat_message(&self, username: &str, text: &str) {
        let mut st = self.state.write().await;
        let msg = Message::new(username, text);
        st.messages.append(msg.clone());
        self.persist.submit_messages(st.messages.snapshot());
        st.group.broadcast(&ServerEvent::Message { message: msg });
    }

    /* ---------------- leave ---------------- */
    /// 只解開這條連線,同名的其他裝置不動
    pub async fn leave(&self, conn: ConnId, username: &str) -> AppResult<()> {
        let mut st = self.state.write().await;
        st.bindings.unbind_connection(conn);
        let online = st.bindings.online_usernames();
        st.group.broadcast(&ServerEvent::Online { online });
        self.push_system(&mut st, format!("{username} left the chat"));
        info!(%conn, username, "left");
        Ok(())
    }

    /* ---------------- delete messages ---------------- */
    pub async fn delete_user_messages(&self, conn: ConnId, username: &str) -> AppResult<usize> {
        let mut st = self.state.write().await;
        let removed = st.messages.remove_by_author(username);
        st.bindings.unbind_connection(conn);

        let online = st.bindings.online_usernames();
        st.group.broadcast(&ServerEvent::Online { online });
        st.group.broadcast(&ServerEvent::Messages { messages: st.messages.snapshot() });
        self.persist.submit_messages(st.messages.snapshot());

        // 統計訊息排在落盤之後,跟著下一次 messages 持久化才進盤面
        let note = Message::system(format!("removed {removed} messages from {username}"));
        st.messages.append(note.clone());
        st.group.broadcast(&ServerEvent::Message { message: note });
        info!(username, removed, "user messages deleted");
        Ok(removed)
    }

    /* ---------------- delete account ---------------- */
    pub async fn delete_user_account(&self, username: &str) -> AppResult<usize> {
        let mut st = self.state.write().await;
        let removed = st.messages.remove_for_account(username);
        st.known.remove(username);
        self.persist.submit_messages(st.messages.snapshot());
        self.persist.submit_users(st.known.snapshot());

        // 同名的每條連線都踢掉;被踢的人收不到後面的廣播
        for conn in st.bindings.unbind_username(username) {
            st.group.close(conn);
        }

        let online = st.bindings.online_usernames();
        st.group.broadcast(&ServerEvent::Online { online });
        st.group.broadcast(&ServerEvent::Messages { messages: st.messages.snapshot() });
        self.push_system(&mut st, format!("{username} account removed, {removed} messages purged"));
        info!(username, removed, "account deleted");
        Ok(removed)
    }

    /* ---------------- disconnect ---------------- */
    pub async fn disconnect(&self, conn: ConnId) {
        let mut st = self.state.write().await;
        st.group.remove(conn);
        match st.bindings.unbind_connection(conn) {
            Some(username) => {
                let online = st.bindings.online_usernames();
                st.group.broadcast(&ServerEvent::Online { online });
                self.push_system(&mut st, format!("{username} left the chat"));
                info!(%conn, username, "disconnected");
            }
            // 沒表明過身分,安靜移除
            None => info!(%conn, "unidentified connection closed"),
        }
    }

    pub async fn debug_snapshot(&self) -> DebugState {
        let st = self.state.read().await;
        DebugState {
            messages: st.messages.snapshot(),
            known_users: st.known.snapshot(),
            online: st.bindings.online_usernames(),
        }
    }

    /// 系統訊息三連發:記錄、廣播、丟快照進落盤佇列
    fn push_system(&self, st: &mut HubState, text: String) {
        let msg = Message::system(text);
        st.messages.append(msg.clone());
        st.group.broadcast(&ServerEvent::Message { message: msg });
        self.persist.submit_messages(st.messages.snapshot());
    }
}
