use crate::core::state::{ModerationState, SnapshotStore, StoreError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SNAPSHOT_FILE: &str = "botdata.json";
const TEMP_FILE_SUFFIX: &str = ".tmp";
const QUARANTINE_SUFFIX: &str = ".corrupt-";

/// File-backed snapshot store. The whole aggregate lives in one pretty-printed JSON
/// document which is rewritten on every save.
pub struct JsonSnapshotStore {
    path: PathBuf,
}

impl JsonSnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/botdata.json`.
    pub fn in_dir(data_dir: impl AsRef<Path>) -> Self {
        Self::new(data_dir.as_ref().join(SNAPSHOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write to a sibling temp file, then rename over the target so a crash mid-write
    /// never leaves a truncated snapshot behind.
    async fn write_atomic(&self, bytes: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = PathBuf::from(format!("{}{}", self.path.display(), TEMP_FILE_SUFFIX));
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStore for JsonSnapshotStore {
    async fn load(&self) -> Result<Option<ModerationState>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let state: ModerationState = serde_json::from_slice(&bytes)?;
        Ok(Some(state))
    }

    async fn save(&self, state: &ModerationState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_atomic(&bytes).await
    }

    /// Rename the snapshot to `botdata.json.corrupt-<timestamp>` next to the original.
    async fn quarantine(&self) -> Result<(), StoreError> {
        let target = PathBuf::from(format!(
            "{}{}{}",
            self.path.display(),
            QUARANTINE_SUFFIX,
            chrono::Utc::now().format("%Y%m%d%H%M%S")
        ));
        match tokio::fs::rename(&self.path, &target).await {
            Ok(()) => {
                tracing::warn!(path = %target.display(), "Snapshot quarantined");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{
        BlacklistEntry, GroupConfig, Rental, StateStore, Warning, AUTO_ISSUER,
    };
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn sample_state() -> ModerationState {
        let mut state = ModerationState::default();
        state
            .groups
            .insert("g@g.us".into(), GroupConfig::with_defaults("g@g.us", "#"));
        state.rentals.push(Rental {
            group_id: "g@g.us".into(),
            group_name: "Group".into(),
            renter_id: "5511".into(),
            renter_name: "Ana".into(),
            plan: "mensal".into(),
            start_date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 2, 1).unwrap(),
            value: 30.0,
            active: true,
            notes: String::new(),
            last_reminded_at: None,
        });
        state.warnings.insert(
            "g@g.us".into(),
            vec![Warning {
                group_id: "g@g.us".into(),
                user_id: "5522".into(),
                reason: "spam".into(),
                issued_at: Utc.with_ymd_and_hms(2025, 1, 2, 10, 0, 0).unwrap(),
                issued_by: "5511".into(),
            }],
        );
        state.blacklist.insert(
            "5533".into(),
            BlacklistEntry {
                number: "5533".into(),
                reason: "3 warnings".into(),
                date: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
                added_by: AUTO_ISSUER.into(),
            },
        );
        state.add_bad_word("g@g.us", "heck");
        state.notes.insert("g@g.us".into(), vec!["be nice".into()]);
        state.set_muted("g@g.us", "5544", true);
        state.afk_users.insert("5555".into(), "lunch".into());
        state
    }

    #[tokio::test]
    async fn missing_file_loads_as_none() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::in_dir(dir.path());
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::in_dir(dir.path().join("nested"));
        let state = sample_state();

        store.save(&state).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, state);

        // Saving what was loaded produces the same document again.
        let first = std::fs::read_to_string(store.path()).unwrap();
        store.save(&loaded).await.unwrap();
        let second = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(first, second);
        assert!(!PathBuf::from(format!("{}.tmp", store.path().display())).exists());
    }

    #[tokio::test]
    async fn snapshot_uses_stable_field_names() {
        let dir = TempDir::new().unwrap();
        let store = JsonSnapshotStore::in_dir(dir.path());
        store.save(&sample_state()).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(store.path()).unwrap()).unwrap();
        for key in [
            "groups",
            "rentals",
            "warnings",
            "blacklist",
            "bad_words",
            "notes",
            "muted_users",
            "afk_users",
            "roles",
        ] {
            assert!(raw.get(key).is_some(), "missing key {}", key);
        }
        assert_eq!(raw["groups"]["g@g.us"]["antilink"], false);
        assert_eq!(raw["rentals"][0]["group_jid"], "g@g.us");
    }

    fn quarantined_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| name.starts_with("botdata.json.corrupt-"))
            })
            .collect()
    }

    #[tokio::test]
    async fn corrupt_file_is_kept_aside_and_store_starts_fresh() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonSnapshotStore::in_dir(dir.path()));
        std::fs::write(store.path(), b"{ not json").unwrap();

        assert!(matches!(store.load().await, Err(StoreError::Serialization(_))));

        let state = StateStore::open(store.clone(), "#").await.unwrap();
        assert_eq!(state.snapshot().await, ModerationState::default());

        // The first mutation writes a fresh file without touching the old one.
        state.write(|s| s.afk_users.insert("u".into(), String::new())).await;
        let aside = quarantined_files(dir.path());
        assert_eq!(aside.len(), 1);
        assert_eq!(std::fs::read(&aside[0]).unwrap(), b"{ not json");
        assert!(store.load().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn previous_bot_snapshot_loads_without_quarantine() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonSnapshotStore::in_dir(dir.path()));
        let raw = r#"{
            "groups": {},
            "rentals": null,
            "warnings": {"g@g.us": [{"group_jid": "g@g.us", "user_jid": "5522",
                "user_name": "Bob", "reason": "spam", "date": "2025-01-02 10:00",
                "issued_by": "5511"}]},
            "blacklist": {},
            "bad_words": {},
            "notes": {},
            "muted_users": {},
            "afk_users": {}
        }"#;
        std::fs::write(store.path(), raw).unwrap();

        let state = StateStore::open(store.clone(), "#").await.unwrap();
        assert_eq!(state.read(|s| s.warning_count("g@g.us", "5522")).await, 1);
        assert!(quarantined_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn state_store_writes_reach_disk() {
        let dir = TempDir::new().unwrap();
        let snapshots = Arc::new(JsonSnapshotStore::in_dir(dir.path()));
        let store = StateStore::open(snapshots.clone(), "#").await.unwrap();

        store
            .write(|s| s.afk_users.insert("u".into(), "gym".into()))
            .await;

        let reopened = StateStore::open(snapshots, "#").await.unwrap();
        assert_eq!(
            reopened.read(|s| s.afk_users.get("u").cloned()).await.as_deref(),
            Some("gym")
        );
    }
}
