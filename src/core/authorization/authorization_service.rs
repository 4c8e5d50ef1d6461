// Authorization - who is talking, and are they allowed to be here at all.
//
// Two separate concerns live here:
// - `AuthorizationService` resolves owner/admin/member and consumes AFK state
// - `BlacklistGuard` answers "must this identity be removed on sight"
//
// Admin checks ask the messaging platform and fail closed: any query error means
// "not an admin", never an error bubbling up to the event path.

use crate::core::messaging::{bounded, user_number, Messenger};
use crate::core::state::{BlacklistEntry, StateStore};
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;

/// Authorization tier of a sender, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Member,
    GroupAdmin,
    Owner,
}

impl Role {
    /// Whether this role may run something that requires `required`.
    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

pub struct AuthorizationService {
    store: Arc<StateStore>,
    messenger: Arc<dyn Messenger>,
    owner_id: String,
    query_timeout: Duration,
}

impl AuthorizationService {
    pub fn new(
        store: Arc<StateStore>,
        messenger: Arc<dyn Messenger>,
        owner_id: impl Into<String>,
        query_timeout: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            owner_id: owner_id.into(),
            query_timeout,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Compares phone numbers, so a bare number and a full identity both match.
    pub fn is_owner(&self, user_id: &str) -> bool {
        user_number(user_id) == user_number(&self.owner_id)
    }

    /// Ask the platform whether `user_id` holds the admin bit in `chat_id`.
    pub async fn is_group_admin(&self, chat_id: &str, user_id: &str) -> bool {
        match bounded(self.query_timeout, self.messenger.group_info(chat_id)).await {
            Ok(info) => info
                .participant(user_id)
                .map(|p| p.has_admin_bit())
                .unwrap_or(false),
            Err(e) => {
                tracing::warn!(chat = %chat_id, user = %user_id, error = %e, "Admin check failed, treating as non-admin");
                false
            }
        }
    }

    /// Whether the bot itself can perform privileged group actions.
    pub async fn is_bot_admin(&self, chat_id: &str) -> bool {
        match self.messenger.self_id() {
            Some(bot_id) => self.is_group_admin(chat_id, &bot_id).await,
            None => false,
        }
    }

    /// Resolve the sender's tier. Outside groups nobody but the owner is privileged.
    pub async fn resolve_role(&self, chat_id: &str, user_id: &str, is_group: bool) -> Role {
        if self.is_owner(user_id) {
            Role::Owner
        } else if is_group && self.is_group_admin(chat_id, user_id).await {
            Role::GroupAdmin
        } else {
            Role::Member
        }
    }

    /// Clear a returning user's AFK status, handing back the reason they left.
    ///
    /// Only one caller can observe a given AFK entry: the removal happens under the
    /// store's write lock.
    pub async fn consume_afk(&self, chat_id: &str, user_id: &str) -> Option<String> {
        // Cheap shared check first so ordinary messages never trigger a snapshot write.
        if !self
            .store
            .read(|state| state.afk_users.contains_key(user_id))
            .await
        {
            return None;
        }

        let reason = self
            .store
            .write(|state| state.afk_users.remove(user_id))
            .await;
        if reason.is_some() {
            tracing::debug!(chat = %chat_id, user = %user_id, "AFK cleared");
        }
        reason
    }
}

/// The global "remove on sight" list, consulted by every inbound path.
pub struct BlacklistGuard {
    store: Arc<StateStore>,
}

impl BlacklistGuard {
    pub fn new(store: Arc<StateStore>) -> Self {
        Self { store }
    }

    pub async fn is_blacklisted(&self, user_id: &str) -> bool {
        self.store.read(|state| state.is_blacklisted(user_id)).await
    }

    /// Add or overwrite an entry.
    pub async fn add(&self, user_id: &str, reason: &str, added_by: &str, date: NaiveDate) {
        let entry = BlacklistEntry {
            number: user_id.to_string(),
            reason: reason.to_string(),
            date,
            added_by: added_by.to_string(),
        };
        self.store
            .write(|state| state.blacklist.insert(user_id.to_string(), entry))
            .await;
        tracing::info!(user = %user_id, added_by = %added_by, "Blacklisted");
    }

    /// Returns `true` if the user was on the list.
    pub async fn remove(&self, user_id: &str) -> bool {
        let removed = self
            .store
            .write(|state| state.blacklist.remove(user_id).is_some())
            .await;
        if removed {
            tracing::info!(user = %user_id, "Removed from blacklist");
        }
        removed
    }

    /// All entries, oldest first.
    pub async fn entries(&self) -> Vec<BlacklistEntry> {
        let mut entries: Vec<BlacklistEntry> = self
            .store
            .read(|state| state.blacklist.values().cloned().collect())
            .await;
        entries.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.number.cmp(&b.number)));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::messaging::testing::RecordingMessenger;
    use crate::core::state::state_store::testing::memory_store;

    const OWNER: &str = "5592999999999";
    const GROUP: &str = "1203@g.us";

    fn service(messenger: RecordingMessenger) -> (AuthorizationService, Arc<StateStore>) {
        let (store, _) = memory_store();
        let auth = AuthorizationService::new(
            Arc::clone(&store),
            Arc::new(messenger),
            OWNER,
            Duration::from_millis(200),
        );
        (auth, store)
    }

    #[tokio::test]
    async fn resolves_roles_in_order() {
        let messenger = RecordingMessenger::new().with_group(GROUP, &["admin"], &["member"], true);
        let (auth, _) = service(messenger);

        assert_eq!(auth.resolve_role(GROUP, OWNER, true).await, Role::Owner);
        assert!(auth.is_owner(&format!("{}@s.whatsapp.net", OWNER)));
        assert_eq!(auth.resolve_role(GROUP, "admin", true).await, Role::GroupAdmin);
        assert_eq!(auth.resolve_role(GROUP, "member", true).await, Role::Member);
        // Admin bits only count inside groups.
        assert_eq!(auth.resolve_role(GROUP, "admin", false).await, Role::Member);
    }

    #[tokio::test]
    async fn admin_check_fails_closed_on_error() {
        let mut messenger = RecordingMessenger::new().with_group(GROUP, &["admin"], &[], true);
        messenger.fail_queries = true;
        let (auth, _) = service(messenger);

        assert!(!auth.is_group_admin(GROUP, "admin").await);
    }

    #[tokio::test]
    async fn admin_check_fails_closed_on_timeout() {
        let mut messenger = RecordingMessenger::new().with_group(GROUP, &["admin"], &[], true);
        messenger.info_delay = Some(Duration::from_secs(5));
        let (auth, _) = service(messenger);

        assert!(!auth.is_group_admin(GROUP, "admin").await);
    }

    #[tokio::test]
    async fn bot_admin_uses_own_identity() {
        let messenger = RecordingMessenger::new().with_group(GROUP, &[], &[], false);
        let (auth, _) = service(messenger);
        assert!(!auth.is_bot_admin(GROUP).await);
    }

    #[tokio::test]
    async fn afk_is_consumed_exactly_once() {
        let (auth, store) = service(RecordingMessenger::new());
        store
            .write(|s| s.afk_users.insert("u".into(), "lunch".into()))
            .await;

        assert_eq!(auth.consume_afk(GROUP, "u").await.as_deref(), Some("lunch"));
        assert_eq!(auth.consume_afk(GROUP, "u").await, None);
    }

    #[tokio::test]
    async fn concurrent_afk_consumers_see_one_reason() {
        let (auth, store) = service(RecordingMessenger::new());
        let auth = Arc::new(auth);
        store
            .write(|s| s.afk_users.insert("u".into(), "gym".into()))
            .await;

        let mut handles = Vec::new();
        for _ in 0..8 {
            let auth = Arc::clone(&auth);
            handles.push(tokio::spawn(async move { auth.consume_afk(GROUP, "u").await }));
        }
        let mut hits = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                hits += 1;
            }
        }
        assert_eq!(hits, 1);
    }

    #[tokio::test]
    async fn blacklist_guard_add_and_remove() {
        let (store, _) = memory_store();
        let guard = BlacklistGuard::new(store);
        let today = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();

        guard.add("spammer", "manual", OWNER, today).await;
        assert!(guard.is_blacklisted("spammer").await);
        assert_eq!(guard.entries().await.len(), 1);

        assert!(guard.remove("spammer").await);
        assert!(!guard.remove("spammer").await);
        assert!(!guard.is_blacklisted("spammer").await);
    }
}
