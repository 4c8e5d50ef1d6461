// Moderation state models - the aggregate that gets snapshotted to disk.
//
// These are pure domain types with no transport dependencies. Field names on disk are
// kept stable (serde renames) so older snapshots keep loading.

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashMap;

/// Issuer recorded on warnings the bot raises by itself (banned words, etc.).
pub const SYSTEM_ISSUER: &str = "system";
/// `added_by` value for blacklist entries created by the escalation engine.
pub const AUTO_ISSUER: &str = "auto";

pub const DEFAULT_WELCOME_MSG: &str = "Welcome to the group, {name}! Please read the rules.";
pub const DEFAULT_GOODBYE_MSG: &str = "See you later, {name}! We'll miss you.";

/// Per-group policy flags and templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    #[serde(rename = "jid")]
    pub group_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "welcome", default)]
    pub welcome_enabled: bool,
    #[serde(default)]
    pub welcome_msg: String,
    #[serde(rename = "goodbye", default)]
    pub goodbye_enabled: bool,
    #[serde(default)]
    pub goodbye_msg: String,
    #[serde(rename = "antilink", default)]
    pub link_filter: bool,
    #[serde(rename = "antifake", default)]
    pub foreign_number_filter: bool,
    #[serde(rename = "anti_palavrao", default)]
    pub banned_word_filter: bool,
    #[serde(rename = "only_adm", default)]
    pub admin_only: bool,
    #[serde(default)]
    pub auto_sticker: bool,
    #[serde(rename = "auto_dl", default)]
    pub auto_download: bool,
    #[serde(rename = "nsfw", default)]
    pub nsfw: bool,
    /// Kept for snapshot compatibility; flood detection is not enforced.
    #[serde(default)]
    pub antiflood: bool,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub active: bool,
}

impl GroupConfig {
    /// Fresh config for a group seen for the first time.
    pub fn with_defaults(group_id: &str, prefix: &str) -> Self {
        Self {
            group_id: group_id.to_string(),
            name: String::new(),
            welcome_enabled: true,
            welcome_msg: DEFAULT_WELCOME_MSG.to_string(),
            goodbye_enabled: true,
            goodbye_msg: DEFAULT_GOODBYE_MSG.to_string(),
            link_filter: false,
            foreign_number_filter: false,
            banned_word_filter: false,
            admin_only: false,
            auto_sticker: false,
            auto_download: false,
            nsfw: false,
            antiflood: false,
            prefix: prefix.to_string(),
            active: true,
        }
    }
}

/// Toggleable policy flags, addressed by commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyFlag {
    Welcome,
    Goodbye,
    LinkFilter,
    ForeignNumberFilter,
    BannedWordFilter,
    AdminOnly,
    AutoSticker,
    AutoDownload,
    Nsfw,
}

impl PolicyFlag {
    pub fn label(&self) -> &'static str {
        match self {
            PolicyFlag::Welcome => "Welcome",
            PolicyFlag::Goodbye => "Goodbye",
            PolicyFlag::LinkFilter => "Anti-link",
            PolicyFlag::ForeignNumberFilter => "Anti-fake",
            PolicyFlag::BannedWordFilter => "Banned-word filter",
            PolicyFlag::AdminOnly => "Admin-only mode",
            PolicyFlag::AutoSticker => "Auto-sticker",
            PolicyFlag::AutoDownload => "Auto-download",
            PolicyFlag::Nsfw => "NSFW",
        }
    }

    fn slot<'a>(&self, config: &'a mut GroupConfig) -> &'a mut bool {
        match self {
            PolicyFlag::Welcome => &mut config.welcome_enabled,
            PolicyFlag::Goodbye => &mut config.goodbye_enabled,
            PolicyFlag::LinkFilter => &mut config.link_filter,
            PolicyFlag::ForeignNumberFilter => &mut config.foreign_number_filter,
            PolicyFlag::BannedWordFilter => &mut config.banned_word_filter,
            PolicyFlag::AdminOnly => &mut config.admin_only,
            PolicyFlag::AutoSticker => &mut config.auto_sticker,
            PolicyFlag::AutoDownload => &mut config.auto_download,
            PolicyFlag::Nsfw => &mut config.nsfw,
        }
    }
}

/// A time-bounded subscription for a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rental {
    #[serde(rename = "group_jid")]
    pub group_id: String,
    pub group_name: String,
    #[serde(rename = "owner_number")]
    pub renter_id: String,
    #[serde(rename = "owner_name", default)]
    pub renter_name: String,
    pub plan: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub value: f64,
    pub active: bool,
    #[serde(default)]
    pub notes: String,
    /// Last time the scheduler sent a renewal reminder for this rental.
    #[serde(default)]
    pub last_reminded_at: Option<DateTime<Utc>>,
}

/// One issued warning. The list of these is the audit log; counts are derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Warning {
    #[serde(rename = "group_jid")]
    pub group_id: String,
    #[serde(rename = "user_jid")]
    pub user_id: String,
    pub reason: String,
    #[serde(rename = "date", deserialize_with = "lenient_timestamp")]
    pub issued_at: DateTime<Utc>,
    pub issued_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlacklistEntry {
    pub number: String,
    pub reason: String,
    pub date: NaiveDate,
    pub added_by: String,
}

/// Result of appending a warning while holding the write lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WarningTally {
    /// Warnings on record for (group, user) after the append.
    pub count: usize,
    /// The count is at or past the threshold, so the user must be removed.
    pub reached_limit: bool,
    /// True only for the append that moved the user onto the blacklist.
    pub promoted: bool,
}

/// Everything the bot remembers. Persisted as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModerationState {
    #[serde(default, deserialize_with = "null_as_default")]
    pub groups: HashMap<String, GroupConfig>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rentals: Vec<Rental>,
    /// group id -> warnings, in issue order
    #[serde(default, deserialize_with = "null_as_default")]
    pub warnings: HashMap<String, Vec<Warning>>,
    /// user id -> entry
    #[serde(default, deserialize_with = "null_as_default")]
    pub blacklist: HashMap<String, BlacklistEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub bad_words: HashMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notes: HashMap<String, Vec<String>>,
    /// group id -> user id -> muted
    #[serde(default, deserialize_with = "null_as_default")]
    pub muted_users: HashMap<String, HashMap<String, bool>>,
    /// user id -> AFK reason
    #[serde(default, deserialize_with = "null_as_default")]
    pub afk_users: HashMap<String, String>,
    /// group id -> user id -> role label
    #[serde(default, deserialize_with = "null_as_default")]
    pub roles: HashMap<String, HashMap<String, String>>,
}

impl ModerationState {
    pub fn is_blacklisted(&self, user_id: &str) -> bool {
        self.blacklist.contains_key(user_id)
    }

    pub fn warning_count(&self, group_id: &str, user_id: &str) -> usize {
        self.warnings
            .get(group_id)
            .map(|list| list.iter().filter(|w| w.user_id == user_id).count())
            .unwrap_or(0)
    }

    /// Append a warning, recount from history and blacklist the user once the
    /// count reaches `threshold`. Callers hold the write lock for the whole call.
    pub fn record_warning(&mut self, warning: Warning, threshold: usize) -> WarningTally {
        let group_id = warning.group_id.clone();
        let user_id = warning.user_id.clone();
        let date = warning.issued_at.date_naive();
        self.warnings.entry(group_id.clone()).or_default().push(warning);

        let count = self.warning_count(&group_id, &user_id);
        let reached_limit = count >= threshold;
        let mut promoted = false;
        if reached_limit && !self.blacklist.contains_key(&user_id) {
            self.blacklist.insert(
                user_id.clone(),
                BlacklistEntry {
                    number: user_id,
                    reason: format!("{} warnings", threshold),
                    date,
                    added_by: AUTO_ISSUER.to_string(),
                },
            );
            promoted = true;
        }

        WarningTally {
            count,
            reached_limit,
            promoted,
        }
    }

    /// Drop the most recent warning for a user. Returns the remaining count, or
    /// `None` if the user had none.
    pub fn remove_latest_warning(&mut self, group_id: &str, user_id: &str) -> Option<usize> {
        let list = self.warnings.get_mut(group_id)?;
        let idx = list.iter().rposition(|w| w.user_id == user_id)?;
        list.remove(idx);
        Some(self.warning_count(group_id, user_id))
    }

    /// Wipe every warning for a group. Returns how many were removed.
    pub fn clear_warnings(&mut self, group_id: &str) -> usize {
        self.warnings.remove(group_id).map(|l| l.len()).unwrap_or(0)
    }

    /// (user, count) pairs for a group, highest count first.
    pub fn warning_summary(&self, group_id: &str) -> Vec<(String, usize)> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        if let Some(list) = self.warnings.get(group_id) {
            for w in list {
                *counts.entry(w.user_id.as_str()).or_default() += 1;
            }
        }
        let mut summary: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(user, count)| (user.to_string(), count))
            .collect();
        summary.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        summary
    }

    pub fn warnings_for(&self, group_id: &str, user_id: &str) -> Vec<Warning> {
        self.warnings
            .get(group_id)
            .map(|list| list.iter().filter(|w| w.user_id == user_id).cloned().collect())
            .unwrap_or_default()
    }

    /// Flip a policy flag. Returns the new value, or `None` if the group is unknown.
    pub fn toggle_flag(&mut self, group_id: &str, flag: PolicyFlag) -> Option<bool> {
        let config = self.groups.get_mut(group_id)?;
        let slot = flag.slot(config);
        *slot = !*slot;
        Some(*slot)
    }

    pub fn is_muted(&self, group_id: &str, user_id: &str) -> bool {
        self.muted_users
            .get(group_id)
            .and_then(|m| m.get(user_id))
            .copied()
            .unwrap_or(false)
    }

    pub fn set_muted(&mut self, group_id: &str, user_id: &str, muted: bool) {
        if muted {
            self.muted_users
                .entry(group_id.to_string())
                .or_default()
                .insert(user_id.to_string(), true);
        } else if let Some(group) = self.muted_users.get_mut(group_id) {
            group.remove(user_id);
        }
    }

    pub fn add_bad_word(&mut self, group_id: &str, word: &str) -> bool {
        let words = self.bad_words.entry(group_id.to_string()).or_default();
        if words.iter().any(|w| w.eq_ignore_ascii_case(word)) {
            return false;
        }
        words.push(word.to_string());
        true
    }

    pub fn remove_bad_word(&mut self, group_id: &str, word: &str) -> bool {
        let Some(words) = self.bad_words.get_mut(group_id) else {
            return false;
        };
        match words.iter().position(|w| w.eq_ignore_ascii_case(word)) {
            Some(idx) => {
                words.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Remove a note by its 1-based position.
    pub fn remove_note(&mut self, group_id: &str, position: usize) -> Option<String> {
        let notes = self.notes.get_mut(group_id)?;
        if position == 0 || position > notes.len() {
            return None;
        }
        Some(notes.remove(position - 1))
    }

    pub fn role_of(&self, group_id: &str, user_id: &str) -> Option<&str> {
        self.roles
            .get(group_id)
            .and_then(|r| r.get(user_id))
            .map(String::as_str)
    }
}

/// Older snapshots wrote `null` for collections that were never filled.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts RFC 3339 as well as the `YYYY-MM-DD HH:MM` local-time form older
/// snapshots used for warning dates.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| {
        serde::de::Error::custom(format!("unrecognised timestamp {:?}", raw))
    })
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })?;
    Some(
        Local
            .from_local_datetime(&naive)
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    )
}
