//! Telegram adapter (teloxide).
//!
//! Implements the `tma-core` `UserClient` port over the Bot API. A bot cannot
//! read chat history, so `fetch_messages` reports `Unsupported`.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use teloxide::{prelude::*, types::Recipient};
use tokio::{sync::RwLock, time::sleep};
use tracing::{debug, info};

use tma_core::{
    domain::{ChatId, ChatInfo, ChatKind, EntityRef, MessageId, MessageInfo, MessageRef, UserId, UserInfo},
    errors::Error,
    ports::{ClientCapabilities, UserClient},
    Result,
};

pub struct BotClient {
    bot: Bot,
    connected: AtomicBool,
    me: RwLock<Option<UserInfo>>,
}

impl BotClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::from_bot(Bot::new(token))
    }

    pub fn from_bot(bot: Bot) -> Self {
        Self {
            bot,
            connected: AtomicBool::new(false),
            me: RwLock::new(None),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    debug!(?d, "telegram asked to retry later");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }
}

#[async_trait]
impl UserClient for BotClient {
    fn capabilities(&self) -> ClientCapabilities {
        ClientCapabilities {
            supports_history: false,
            is_bot: true,
        }
    }

    async fn connect(&self) -> Result<()> {
        let me = self.with_retry(|| self.bot.get_me()).await?;
        let info = user_info(&me.user);
        info!(user_id = info.id.0, username = ?info.username, "connected to telegram");
        *self.me.write().await = Some(info);
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
        self.me.read().await.clone().ok_or(Error::NotConnected)
    }

    async fn send_message(&self, chat: &EntityRef, text: &str) -> Result<MessageInfo> {
        self.ensure_connected()?;
        let msg = self
            .with_retry(|| self.bot.send_message(recipient(chat), text.to_string()))
            .await?;
        Ok(message_info(&msg))
    }

    async fn fetch_messages(&self, _chat: &EntityRef, _limit: usize) -> Result<Vec<MessageInfo>> {
        Err(Error::Unsupported(
            "bot accounts cannot read chat history".to_string(),
        ))
    }

    async fn resolve_entity(&self, chat: &EntityRef) -> Result<ChatInfo> {
        self.ensure_connected()?;
        let tg = self.with_retry(|| self.bot.get_chat(recipient(chat))).await?;
        Ok(ChatInfo {
            id: ChatId(tg.id.0),
            kind: chat_kind(&tg),
            title: tg.title().map(str::to_string),
            username: tg.username().map(str::to_string),
        })
    }
}

fn recipient(chat: &EntityRef) -> Recipient {
    match chat {
        EntityRef::Id(id) => Recipient::Id(teloxide::types::ChatId(id.0)),
        EntityRef::Username(name) => Recipient::ChannelUsername(format!("@{name}")),
    }
}

fn chat_kind(chat: &teloxide::types::Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else if chat.is_channel() {
        ChatKind::Channel
    } else {
        ChatKind::Group
    }
}

fn user_info(u: &teloxide::types::User) -> UserInfo {
    UserInfo {
        id: UserId(u.id.0 as i64),
        first_name: u.first_name.clone(),
        last_name: u.last_name.clone(),
        username: u.username.clone(),
        language_code: u.language_code.clone(),
        is_premium: u.is_premium,
        is_bot: u.is_bot,
    }
}

fn message_info(m: &teloxide::types::Message) -> MessageInfo {
    MessageInfo {
        message: MessageRef {
            chat_id: ChatId(m.chat.id.0),
            message_id: MessageId(m.id.0),
        },
        sender: m.from().map(|u| UserId(u.id.0 as i64)),
        text: m.text().map(str::to_string),
        date: m.date,
    }
}
