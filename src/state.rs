use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub type ConnId = uuid::Uuid;

pub const SYSTEM_USER: &str = "System";

/* ------------ 聊天訊息 ------------ */
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub username: String,
    pub text: String,
    pub ts: i64, // epoch millis
}

impl Message {
    pub fn new(username: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: nanoid::nanoid!(),
            username: username.into(),
            text: text.into(),
            ts: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(SYSTEM_USER, text)
    }

    pub fn is_system(&self) -> bool {
        self.username == SYSTEM_USER
    }
}

/* ------------ 訊息記錄 ------------ */
#[derive(Default)]
pub struct MessageStore {
    log: Vec<Message>, // 到達順序
}

impl MessageStore {
    pub fn new(log: Vec<Message>) -> Self {
        Self { log }
    }

    pub fn append(&mut self, msg: Message) {
        self.log.push(msg);
    }

    pub fn remove_by_author(&mut self, username: &str) -> usize {
        let before = self.log.len();
        self.log.retain(|m| m.username != username);
        before - self.log.len()
    }

    /// 清帳號用:作者本人的訊息,加上內文含該名字的系統訊息。
    /// 系統訊息用子字串比對:"jo" 也會掃掉 "jon joined the chat"。
    pub fn remove_for_account(&mut self, username: &str) -> usize {
        let before = self.log.len();
        self.log
            .retain(|m| m.username != username && !(m.is_system() && m.text.contains(username)));
        before - self.log.len()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.log.clone()
    }
}

/* ------------ 已知使用者 ------------ */
#[derive(Default)]
pub struct KnownUsers {
    names: HashSet<String>,
}

impl KnownUsers {
    pub fn new(names: HashSet<String>) -> Self {
        Self { names }
    }

    pub fn add(&mut self, username: &str) -> bool {
        self.names.insert(username.to_owned())
    }

    pub fn remove(&mut self, username: &str) -> bool {
        self.names.remove(username)
    }

    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<_> = self.names.iter().cloned().collect();
        names.sort();
        names
    }
}

/* ------------ 連線對名字 ------------ */
#[derive(Default)]
pub struct ConnectionRegistry {
    bound: Vec<(ConnId, String)>, // bind 順序
}

impl ConnectionRegistry {
    /// 同一條連線只留一筆,重綁直接蓋掉舊的
    pub fn bind(&mut self, conn: ConnId, username: &str) {
        self.bound.retain(|(id, _)| *id != conn);
        self.bound.push((conn, username.to_owned()));
    }

    pub fn unbind_connection(&mut self, conn: ConnId) -> Option<String> {
        let pos = self.bound.iter().position(|(id, _)| *id == conn)?;
        Some(self.bound.remove(pos).1)
    }

    /// 帳號刪除會動到同名的每一條連線
    pub fn unbind_username(&mut self, username: &str) -> Vec<ConnId> {
        let (gone, keep): (Vec<_>, Vec<_>) =
            self.bound.drain(..).partition(|(_, name)| name == username);
        self.bound = keep;
        gone.into_iter().map(|(id, _)| id).collect()
    }

    /// 一條活連線一個名字,多裝置同名就出現多次
    pub fn online_usernames(&self) -> Vec<String> {
        self.bound.iter().map(|(_, name)| name.clone()).collect()
    }
}
