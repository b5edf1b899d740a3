use async_trait::async_trait;

use crate::{
    domain::{ChatInfo, EntityRef, MessageInfo, UserInfo},
    Result,
};

/// Capabilities of a Telegram client implementation (user account, bot, fake).
#[derive(Clone, Copy, Debug)]
pub struct ClientCapabilities {
    /// Whether `fetch_messages` can read chat history.
    pub supports_history: bool,
    /// Whether the account is a bot (Bot API) rather than a user session.
    pub is_bot: bool,
}

/// Port for the session-bearing Telegram client.
///
/// Tests and launch flows only need identity, messaging, and entity lookup;
/// adapters (teloxide, in-memory) implement this and are injected by callers.
#[async_trait]
pub trait UserClient: Send + Sync {
    fn capabilities(&self) -> ClientCapabilities;

    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    fn is_connected(&self) -> bool;

    /// Identity of the logged-in account.
    async fn current_user(&self) -> Result<UserInfo>;

    async fn send_message(&self, chat: &EntityRef, text: &str) -> Result<MessageInfo>;

    /// Most recent messages first, at most `limit`.
    async fn fetch_messages(&self, chat: &EntityRef, limit: usize) -> Result<Vec<MessageInfo>>;

    async fn resolve_entity(&self, chat: &EntityRef) -> Result<ChatInfo>;
}
