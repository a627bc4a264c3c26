//! src/persist.rs — 全量覆寫的 JSON 落盤

use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
};
use tokio::{fs, sync::watch};
use tracing::{info, warn};

use crate::state::Message;

const MESSAGES_FILE: &str = "messages.json";
const USERS_FILE: &str = "users.json";

pub struct Gateway {
    dir: PathBuf,
}

impl Gateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /* ---------------- 載入 ---------------- */

    /// 檔案不在或壞掉一律退回空集合,啟動不會因此失敗
    pub async fn load_all(&self) -> (Vec<Message>, HashSet<String>) {
        (self.load_json(MESSAGES_FILE).await, self.load_json(USERS_FILE).await)
    }

    async fn load_json<T: serde::de::DeserializeOwned + Default>(&self, file: &str) -> T {
        let path = self.dir.join(file);
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) => {
                info!(path = %path.display(), %e, "no persisted record, starting empty");
                return T::default();
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(path = %path.display(), %e, "persisted record unreadable, starting empty");
                T::default()
            }
        }
    }

    /* ---------------- 全量覆寫 ---------------- */

    pub async fn save_messages(&self, log: &[Message]) -> anyhow::Result<()> {
        self.save_json(MESSAGES_FILE, &log).await
    }

    pub async fn save_known_users(&self, users: &[String]) -> anyhow::Result<()> {
        self.save_json(USERS_FILE, &users).await
    }

    async fn save_json<T: serde::Serialize>(&self, file: &str, value: &T) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).await?;
        let bytes = serde_json::to_vec_pretty(value)?;
        fs::write(self.dir.join(file), bytes).await?;
        Ok(())
    }
}

/* ---------------- 寫入佇列 ---------------- */

/// 每個 store 一條佇列:送出永不阻塞;寫入中又送來的快照只留最新一份
/// (last submitted wins)。寫失敗只記 log,盤面停在上一次成功為止。
#[derive(Clone)]
pub struct PersistQueue {
    messages: watch::Sender<Option<Vec<Message>>>,
    users: watch::Sender<Option<Vec<String>>>,
}

impl PersistQueue {
    pub fn submit_messages(&self, snapshot: Vec<Message>) {
        self.messages.send(Some(snapshot)).ok();
    }

    pub fn submit_users(&self, snapshot: Vec<String>) {
        self.users.send(Some(snapshot)).ok();
    }
}

pub fn spawn_writers(gateway: Arc<Gateway>) -> PersistQueue {
    let (msg_tx, mut msg_rx) = watch::channel(None::<Vec<Message>>);
    let (usr_tx, mut usr_rx) = watch::channel(None::<Vec<String>>);

    let gw = gateway.clone();
    tokio::spawn(async move {
        while msg_rx.changed().await.is_ok() {
            let snapshot = msg_rx.borrow_and_update().clone();
            let Some(snapshot) = snapshot else { continue };
            if let Err(e) = gw.save_messages(&snapshot).await {
                warn!(%e, "message log persist failed, disk stays stale");
            }
        }
    });

    let gw = gateway;
    tokio::spawn(async move {
        while usr_rx.changed().await.is_ok() {
            let snapshot = usr_rx.borrow_and_update().clone();
            let Some(snapshot) = snapshot else { continue };
            if let Err(e) = gw.save_known_users(&snapshot).await {
                warn!(%e, "known users persist failed, disk stays stale");
            }
        }
    });

    PersistQueue { messages: msg_tx, users: usr_tx }
}
