// Policy engine - classifies message text and joins against a group's config.
//
// Rules for messages run in a fixed order and the first match wins:
// 1. link filter        -> remove the sender
// 2. banned-word filter -> counted warning
// 3. admin-only mode    -> silent drop
// Admin-only runs last so it never hides a violation that carries a penalty.

use crate::core::state::{GroupConfig, StateStore};
use std::sync::Arc;

/// Substrings that mark a message as carrying a link.
pub const LINK_MARKERS: &[&str] = &[
    "http://",
    "https://",
    "www.",
    "chat.whatsapp.com",
    ".com/",
    ".br/",
    ".net/",
    "bit.ly",
    "wa.me",
];

/// Media platforms whose links are always tolerated.
pub const ALLOWED_LINK_DOMAINS: &[&str] = &["youtube.com", "youtu.be", "instagram.com", "tiktok.com"];

/// Warning reason recorded for banned-word hits.
pub const BANNED_WORD_REASON: &str = "Banned word detected";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    /// Nothing to do, carry on with command processing.
    Allow,
    /// Link posted by a non-admin.
    RemoveForLink,
    /// Banned word matched; route to escalation.
    WarnForBannedWord { word: String },
    /// Admin-only mode swallows the message.
    SilentDrop,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinDecision {
    RemoveBlacklisted,
    RemoveForeign,
    Welcome,
    Ignore,
}

/// True if the text carries a link that is not from an allow-listed domain.
pub fn contains_link(text: &str) -> bool {
    let lower = text.to_lowercase();
    if !LINK_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return false;
    }
    !ALLOWED_LINK_DOMAINS.iter().any(|domain| lower.contains(domain))
}

/// First configured word that appears in the text, ignoring case.
pub fn find_banned_word<'a>(text: &str, words: &'a [String]) -> Option<&'a str> {
    let lower = text.to_lowercase();
    words
        .iter()
        .map(String::as_str)
        .filter(|w| !w.trim().is_empty())
        .find(|w| lower.contains(&w.to_lowercase()))
}

/// Numbers outside the home country code count as foreign.
pub fn is_foreign_number(user_id: &str, home_country_code: &str) -> bool {
    !user_id.starts_with(home_country_code)
}

/// Pure classification of one message from a non-privileged sender.
pub fn evaluate_message(config: &GroupConfig, banned_words: &[String], text: &str) -> PolicyDecision {
    if config.link_filter && contains_link(text) {
        return PolicyDecision::RemoveForLink;
    }

    if config.banned_word_filter {
        if let Some(word) = find_banned_word(text, banned_words) {
            return PolicyDecision::WarnForBannedWord {
                word: word.to_string(),
            };
        }
    }

    if config.admin_only {
        return PolicyDecision::SilentDrop;
    }

    PolicyDecision::Allow
}

/// Pure classification of one identity joining a group. The blacklist wins over
/// every group flag.
pub fn evaluate_join(
    config: &GroupConfig,
    user_id: &str,
    blacklisted: bool,
    home_country_code: &str,
) -> JoinDecision {
    if blacklisted {
        JoinDecision::RemoveBlacklisted
    } else if config.foreign_number_filter && is_foreign_number(user_id, home_country_code) {
        JoinDecision::RemoveForeign
    } else if config.welcome_enabled {
        JoinDecision::Welcome
    } else {
        JoinDecision::Ignore
    }
}

/// Store-backed front for the pure rules above.
pub struct PolicyService {
    store: Arc<StateStore>,
    home_country_code: String,
}

impl PolicyService {
    pub fn new(store: Arc<StateStore>, home_country_code: impl Into<String>) -> Self {
        Self {
            store,
            home_country_code: home_country_code.into(),
        }
    }

    /// Classify a message from a sender already known to be neither owner nor admin.
    pub async fn check_message(&self, group_id: &str, text: &str) -> PolicyDecision {
        let config = self.store.group_config(group_id).await;
        self.store
            .read(|state| {
                let words = state
                    .bad_words
                    .get(group_id)
                    .map(Vec::as_slice)
                    .unwrap_or(&[]);
                evaluate_message(&config, words, text)
            })
            .await
    }

    pub async fn check_join(&self, group_id: &str, user_id: &str) -> JoinDecision {
        let config = self.store.group_config(group_id).await;
        self.store
            .read(|state| {
                evaluate_join(
                    &config,
                    user_id,
                    state.is_blacklisted(user_id),
                    &self.home_country_code,
                )
            })
            .await
    }
}
