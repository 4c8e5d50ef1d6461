// Outbound actions with a timeout and a log line on failure. Nothing here ever touches
// the state store, so no lock is held while the gateway is slow.

use crate::core::authorization::AuthorizationService;
use crate::core::messaging::{bounded, MessagingError, Messenger};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const NEED_ADMIN_NOTICE: &str = "I need to be an admin to do that.";

pub struct Outbound {
    messenger: Arc<dyn Messenger>,
    auth: Arc<AuthorizationService>,
    timeout: Duration,
    bot_name: String,
}

impl Outbound {
    pub fn new(
        messenger: Arc<dyn Messenger>,
        auth: Arc<AuthorizationService>,
        timeout: Duration,
        bot_name: impl Into<String>,
    ) -> Self {
        Self {
            messenger,
            auth,
            timeout,
            bot_name: bot_name.into(),
        }
    }

    pub fn messenger(&self) -> &dyn Messenger {
        self.messenger.as_ref()
    }

    /// Prefix every notice with the bot's name tag.
    fn tagged(&self, text: &str) -> String {
        format!("*[{}]* {}", self.bot_name, text)
    }

    /// Run one gateway call under the timeout. Failures are logged and swallowed.
    pub async fn run<T>(
        &self,
        action: &'static str,
        chat_id: &str,
        call: impl Future<Output = Result<T, MessagingError>>,
    ) -> Option<T> {
        match bounded(self.timeout, call).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(action, chat = %chat_id, error = %e, "Gateway call failed");
                None
            }
        }
    }

    /// Same as `run` but hands the error back to the caller.
    pub async fn try_run<T>(
        &self,
        action: &'static str,
        chat_id: &str,
        call: impl Future<Output = Result<T, MessagingError>>,
    ) -> Result<T, MessagingError> {
        bounded(self.timeout, call).await.map_err(|e| {
            tracing::warn!(action, chat = %chat_id, error = %e, "Gateway call failed");
            e
        })
    }

    pub async fn say(&self, chat_id: &str, text: &str) -> bool {
        let text = self.tagged(text);
        self.run("send_text", chat_id, self.messenger.send_text(chat_id, &text))
            .await
            .is_some()
    }

    pub async fn mention(&self, chat_id: &str, text: &str, mentions: &[String]) -> bool {
        let text = self.tagged(text);
        self.run(
            "send_mentions",
            chat_id,
            self.messenger.send_mentions(chat_id, &text, mentions),
        )
        .await
        .is_some()
    }

    /// Text without the name tag, for hidetag and user-authored templates.
    pub async fn mention_raw(&self, chat_id: &str, text: &str, mentions: &[String]) -> bool {
        self.run(
            "send_mentions",
            chat_id,
            self.messenger.send_mentions(chat_id, text, mentions),
        )
        .await
        .is_some()
    }

    /// `true` if the bot can act as admin here; otherwise tells the group why not.
    pub async fn require_bot_admin(&self, chat_id: &str) -> bool {
        if self.auth.is_bot_admin(chat_id).await {
            return true;
        }
        tracing::info!(chat = %chat_id, "Skipping privileged action, bot is not admin");
        self.say(chat_id, NEED_ADMIN_NOTICE).await;
        false
    }

    /// Remove members after checking the bot's own admin bit.
    pub async fn remove(&self, chat_id: &str, user_ids: &[String]) -> bool {
        if user_ids.is_empty() || !self.require_bot_admin(chat_id).await {
            return false;
        }
        let removed = self
            .run(
                "remove_members",
                chat_id,
                self.messenger.remove_members(chat_id, user_ids),
            )
            .await
            .is_some();
        if removed {
            tracing::info!(chat = %chat_id, users = ?user_ids, "Removed members");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::messaging::testing::{RecordingMessenger, SentAction};
    use crate::core::state::state_store::testing::memory_store;

    const GROUP: &str = "g@g.us";

    fn outbound(messenger: Arc<RecordingMessenger>) -> Outbound {
        let (store, _) = memory_store();
        let auth = Arc::new(AuthorizationService::new(
            store,
            messenger.clone(),
            "owner",
            Duration::from_millis(200),
        ));
        Outbound::new(messenger, auth, Duration::from_millis(200), "OdinBOT")
    }

    #[tokio::test]
    async fn notices_carry_the_bot_tag() {
        let messenger = Arc::new(RecordingMessenger::new());
        assert!(outbound(messenger.clone()).say(GROUP, "hello").await);
        assert_eq!(messenger.texts(), vec!["*[OdinBOT]* hello".to_string()]);
    }

    #[tokio::test]
    async fn removal_without_admin_rights_sends_notice_instead() {
        let messenger = Arc::new(RecordingMessenger::new().with_group(GROUP, &[], &["u"], false));
        let out = outbound(messenger.clone());

        assert!(!out.remove(GROUP, &["u".to_string()]).await);
        assert!(messenger.removals().is_empty());
        assert!(messenger.texts()[0].contains(NEED_ADMIN_NOTICE));
    }

    #[tokio::test]
    async fn removal_with_admin_rights_goes_through() {
        let messenger = Arc::new(RecordingMessenger::new().with_group(GROUP, &[], &["u"], true));
        let out = outbound(messenger.clone());

        assert!(out.remove(GROUP, &["u".to_string()]).await);
        assert_eq!(
            messenger.actions(),
            vec![SentAction::Remove {
                chat: GROUP.into(),
                users: vec!["u".into()]
            }]
        );
    }

    #[tokio::test]
    async fn slow_calls_time_out_softly() {
        let messenger = Arc::new(RecordingMessenger::new());
        let out = outbound(messenger);
        let result = out
            .run("slow", GROUP, async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, MessagingError>(())
            })
            .await;
        assert!(result.is_none());
    }
}
