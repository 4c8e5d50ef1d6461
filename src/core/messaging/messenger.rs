// Messaging port - the narrow interface to the external chat transport.
//
// The core never talks to the transport directly; the infra layer provides an
// implementation and the bot layer wraps calls with timeouts and logging.

use async_trait::async_trait;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MessagingError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rejected by platform: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participant {
    pub user_id: String,
    pub is_admin: bool,
    pub is_super_admin: bool,
}

impl Participant {
    pub fn has_admin_bit(&self) -> bool {
        self.is_admin || self.is_super_admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupInfo {
    pub group_id: String,
    pub name: String,
    pub topic: String,
    pub participants: Vec<Participant>,
}

impl GroupInfo {
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }
}

/// Phone-number part of an identity (`5511999@s.whatsapp.net` -> `5511999`).
pub fn user_number(user_id: &str) -> &str {
    user_id.split('@').next().unwrap_or(user_id)
}

/// `@number` text that renders as a mention when the id is passed alongside.
pub fn mention_tag(user_id: &str) -> String {
    format!("@{}", user_number(user_id))
}

// ============================================================================
// INBOUND EVENTS
// ============================================================================

/// A message someone wrote, in a group or a direct chat.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InboundMessage {
    pub chat_id: String,
    pub sender: String,
    #[serde(default)]
    pub is_group: bool,
    /// Message body, or the caption for media.
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub is_from_me: bool,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub quoted_sender: Option<String>,
}

impl InboundMessage {
    /// First mentioned user, falling back to the author of the quoted message.
    pub fn target(&self) -> Option<&str> {
        self.mentions
            .first()
            .map(String::as_str)
            .or(self.quoted_sender.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MembershipChange {
    pub chat_id: String,
    #[serde(default)]
    pub joined: Vec<String>,
    #[serde(default)]
    pub left: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundEvent {
    Message(InboundMessage),
    MembershipChanged(MembershipChange),
    BotJoined { chat_id: String },
}

/// Outbound actions and membership queries against the chat platform.
#[async_trait]
pub trait Messenger: Send + Sync {
    /// The bot's own identity, once the transport knows it.
    fn self_id(&self) -> Option<String>;

    async fn send_text(&self, chat_id: &str, text: &str) -> Result<(), MessagingError>;

    async fn send_mentions(
        &self,
        chat_id: &str,
        text: &str,
        mentions: &[String],
    ) -> Result<(), MessagingError>;

    async fn remove_members(&self, chat_id: &str, user_ids: &[String])
        -> Result<(), MessagingError>;

    async fn promote(&self, chat_id: &str, user_id: &str) -> Result<(), MessagingError>;

    async fn demote(&self, chat_id: &str, user_id: &str) -> Result<(), MessagingError>;

    async fn set_group_name(&self, chat_id: &str, name: &str) -> Result<(), MessagingError>;

    async fn set_group_topic(&self, chat_id: &str, topic: &str) -> Result<(), MessagingError>;

    /// `true` restricts sending to admins.
    async fn set_announce_mode(&self, chat_id: &str, admins_only: bool)
        -> Result<(), MessagingError>;

    async fn invite_link(&self, chat_id: &str) -> Result<String, MessagingError>;

    async fn group_info(&self, chat_id: &str) -> Result<GroupInfo, MessagingError>;

    /// Drop any cached participant list for `chat_id`. Called when membership changes.
    fn invalidate_group(&self, _chat_id: &str) {}
}

/// Run a messaging call with an upper bound on how long it may take.
pub async fn bounded<T>(
    limit: Duration,
    call: impl Future<Output = Result<T, MessagingError>>,
) -> Result<T, MessagingError> {
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(MessagingError::Timeout(limit)),
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================
