//! In-memory test doubles for the client ports.

use std::sync::{
    atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    Mutex, MutexGuard,
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    domain::{ChatId, ChatInfo, ChatKind, EntityRef, MessageId, MessageInfo, MessageRef, UserId, UserInfo},
    errors::Error,
    ports::{ClientCapabilities, UserClient},
    Result,
};

/// `UserClient` backed by plain vectors.
///
/// Every call except `connect` fails with `Error::NotConnected` until the
/// client is connected, matching what a real session does.
pub struct MemoryUserClient {
    me: UserInfo,
    connected: AtomicBool,
    connect_calls: AtomicUsize,
    next_message_id: AtomicI32,
    chats: Mutex<Vec<ChatInfo>>,
    messages: Mutex<Vec<MessageInfo>>,
}

impl MemoryUserClient {
    pub fn new(me: UserInfo) -> Self {
        let own_chat = ChatInfo {
            id: ChatId(me.id.0),
            kind: ChatKind::Private,
            title: None,
            username: me.username.clone(),
        };
        Self {
            me,
            connected: AtomicBool::new(false),
            connect_calls: AtomicUsize::new(0),
            next_message_id: AtomicI32::new(1),
            chats: Mutex::new(vec![own_chat]),
            messages: Mutex::new(Vec::new()),
        }
    }

    /// A plausible user account for tests that do not care about identity.
    pub fn sample_user() -> UserInfo {
        UserInfo {
            id: UserId(279_058_397),
            first_name: "Vladislav".to_string(),
            last_name: Some("Kibenko".to_string()),
            username: Some("vdkfrost".to_string()),
            language_code: Some("ru".to_string()),
            is_premium: true,
            is_bot: false,
        }
    }

    pub fn with_chat(self, chat: ChatInfo) -> Self {
        self.add_chat(chat);
        self
    }

    pub fn add_chat(&self, chat: ChatInfo) {
        lock(&self.chats).push(chat);
    }

    /// Every message sent through this client, oldest first.
    pub fn sent(&self) -> Vec<MessageInfo> {
        lock(&self.messages).clone()
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn find_chat(&self, chat: &EntityRef) -> Result<ChatInfo> {
        lock(&self.chats)
            .iter()
            .find(|c| match chat {
                EntityRef::Id(id) => c.id == *id,
                EntityRef::Username(name) => c
                    .username
                    .as_deref()
                    .is_some_and(|u| u.eq_ignore_ascii_case(name)),
            })
            .cloned()
            .ok_or_else(|| Error::External(format!("entity not found: {chat}")))
    }
}

#[async_trait]
impl UserClient for MemoryUserClient {
    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            supports_history: true,
            is_bot: self.me.is_bot,
        }
    }

    async fn connect(&self) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn current_user(&self) -> Result<UserInfo> {
        self.ensure_connected()?;
        Ok(self.me.clone())
    }

    async fn send_message(&self, chat: &EntityRef, text: &str) -> Result<MessageInfo> {
        self.ensure_connected()?;
        let target = self.find_chat(chat)?;
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst);
        let msg = MessageInfo {
            message: MessageRef {
                chat_id: target.id,
                message_id: MessageId(id),
            },
            sender: Some(self.me.id),
            text: Some(text.to_string()),
            date: Utc::now(),
        };
        lock(&self.messages).push(msg.clone());
        Ok(msg)
    }

    async fn fetch_messages(&self, chat: &EntityRef, limit: usize) -> Result<Vec<MessageInfo>> {
        self.ensure_connected()?;
        let target = self.find_chat(chat)?;
        Ok(lock(&self.messages)
            .iter()
            .rev()
            .filter(|m| m.message.chat_id == target.id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn resolve_entity(&self, chat: &EntityRef) -> Result<ChatInfo> {
        self.ensure_connected()?;
        self.find_chat(chat)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> ChatInfo {
        ChatInfo {
            id: ChatId(-1001),
            kind: ChatKind::Supergroup,
            title: Some("QA".to_string()),
            username: Some("qa_lounge".to_string()),
        }
    }

    #[tokio::test]
    async fn calls_require_connection() {
        let client = MemoryUserClient::new(MemoryUserClient::sample_user());
        assert!(matches!(client.current_user().await, Err(Error::NotConnected)));

        client.connect().await.unwrap();
        assert_eq!(client.current_user().await.unwrap().id, UserId(279_058_397));

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn resolves_by_id_and_username() {
        let client = MemoryUserClient::new(MemoryUserClient::sample_user()).with_chat(group());
        client.connect().await.unwrap();

        let by_name = client
            .resolve_entity(&EntityRef::Username("QA_Lounge".to_string()))
            .await
            .unwrap();
        assert_eq!(by_name.id, ChatId(-1001));

        let me = client
            .resolve_entity(&EntityRef::Id(ChatId(279_058_397)))
            .await
            .unwrap();
        assert_eq!(me.kind, ChatKind::Private);

        let missing = client.resolve_entity(&EntityRef::Id(ChatId(5))).await;
        assert!(matches!(missing, Err(Error::External(_))));
    }

    #[tokio::test]
    async fn fetch_returns_newest_first_per_chat() {
        let client = MemoryUserClient::new(MemoryUserClient::sample_user()).with_chat(group());
        client.connect().await.unwrap();
        let qa = EntityRef::Id(ChatId(-1001));
        let me = EntityRef::Username("vdkfrost".to_string());

        client.send_message(&qa, "one").await.unwrap();
        client.send_message(&me, "note to self").await.unwrap();
        client.send_message(&qa, "two").await.unwrap();
        client.send_message(&qa, "three").await.unwrap();

        let texts: Vec<String> = client
            .fetch_messages(&qa, 2)
            .await
            .unwrap()
            .into_iter()
            .filter_map(|m| m.text)
            .collect();
        assert_eq!(texts, vec!["three", "two"]);
        assert_eq!(client.sent().len(), 4);
    }
}
