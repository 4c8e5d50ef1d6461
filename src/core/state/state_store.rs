// The shared moderation state engine.
//
// One reader/writer lock guards the whole aggregate. Every mutation clones the aggregate
// while still holding the write lock, releases it, then hands the copy to the snapshot
// store. A revision counter keeps an older copy from overwriting a newer one on disk.

use super::state_models::{GroupConfig, ModerationState};
use async_trait::async_trait;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// ============================================================================
// STORAGE TRAIT (PORT)
// ============================================================================

/// Durable home for whole-state snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Load the last snapshot. `Ok(None)` means nothing has been saved yet.
    async fn load(&self) -> Result<Option<ModerationState>, StoreError>;

    /// Replace the stored snapshot with `state`.
    async fn save(&self, state: &ModerationState) -> Result<(), StoreError>;

    /// Move an unreadable snapshot out of the way so the next save cannot overwrite it.
    async fn quarantine(&self) -> Result<(), StoreError>;
}

// ============================================================================
// STATE STORE
// ============================================================================

pub struct StateStore {
    state: RwLock<ModerationState>,
    snapshots: Arc<dyn SnapshotStore>,
    default_prefix: String,
    /// Bumped under the write lock on every mutation.
    revision: AtomicU64,
    /// Highest revision handed to the snapshot store, saved or not. Held across the
    /// write so snapshot writes never interleave.
    persisted: Mutex<u64>,
}

impl StateStore {
    pub fn new(
        state: ModerationState,
        snapshots: Arc<dyn SnapshotStore>,
        default_prefix: impl Into<String>,
    ) -> Self {
        Self {
            state: RwLock::new(state),
            snapshots,
            default_prefix: default_prefix.into(),
            revision: AtomicU64::new(0),
            persisted: Mutex::new(0),
        }
    }

    /// Build a store from whatever the snapshot store holds. A missing snapshot starts
    /// from an empty aggregate. An unreadable one is set aside first, and if that fails
    /// too the store refuses to open rather than overwrite it.
    pub async fn open(
        snapshots: Arc<dyn SnapshotStore>,
        default_prefix: &str,
    ) -> Result<Self, StoreError> {
        let state = match snapshots.load().await {
            Ok(Some(state)) => {
                tracing::info!(
                    groups = state.groups.len(),
                    rentals = state.rentals.len(),
                    blacklisted = state.blacklist.len(),
                    "Loaded moderation snapshot"
                );
                state
            }
            Ok(None) => {
                tracing::info!("No saved snapshot found, starting fresh");
                ModerationState::default()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load snapshot");
                snapshots.quarantine().await?;
                tracing::warn!("Unreadable snapshot moved aside, starting fresh");
                ModerationState::default()
            }
        };

        Ok(Self::new(state, snapshots, default_prefix))
    }

    pub fn default_prefix(&self) -> &str {
        &self.default_prefix
    }

    /// Run `f` with shared access.
    pub async fn read<R>(&self, f: impl FnOnce(&ModerationState) -> R) -> R {
        let guard = self.state.read().await;
        f(&guard)
    }

    /// Run `f` with exclusive access, then persist the resulting state before returning.
    pub async fn write<R>(&self, f: impl FnOnce(&mut ModerationState) -> R) -> R {
        let (result, snapshot, revision) = {
            let mut guard = self.state.write().await;
            let result = f(&mut guard);
            let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
            (result, guard.clone(), revision)
        };

        self.persist(snapshot, revision).await;
        result
    }

    /// Current config for a group, creating it with defaults on first sight.
    pub async fn group_config(&self, group_id: &str) -> GroupConfig {
        if let Some(config) = self.state.read().await.groups.get(group_id) {
            return config.clone();
        }

        let (config, snapshot, revision) = {
            let mut guard = self.state.write().await;
            match guard.groups.entry(group_id.to_string()) {
                // Another task created it between our read and write.
                Entry::Occupied(existing) => return existing.get().clone(),
                Entry::Vacant(slot) => {
                    let config = slot
                        .insert(GroupConfig::with_defaults(group_id, &self.default_prefix))
                        .clone();
                    let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
                    (config, guard.clone(), revision)
                }
            }
        };

        tracing::debug!(group = %group_id, "Created default group config");
        self.persist(snapshot, revision).await;
        config
    }

    /// Command prefix for a chat, falling back to the default for unknown chats.
    pub async fn prefix_for(&self, chat_id: &str) -> String {
        self.read(|state| {
            state
                .groups
                .get(chat_id)
                .map(|c| c.prefix.clone())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| self.default_prefix.clone())
        })
        .await
    }

    /// Copy of the whole aggregate.
    pub async fn snapshot(&self) -> ModerationState {
        self.read(|state| state.clone()).await
    }

    async fn persist(&self, snapshot: ModerationState, revision: u64) {
        let mut persisted = self.persisted.lock().await;
        if revision <= *persisted {
            // A newer copy already reached disk.
            return;
        }

        // Marked before the outcome is known: a failed newer save must still keep an
        // older copy from landing after it.
        *persisted = revision;
        if let Err(e) = self.snapshots.save(&snapshot).await {
            // In-memory state stays authoritative; the next successful write catches up.
            tracing::error!(revision, error = %e, "Failed to persist snapshot");
        }
    }
}

// ============================================================================
// TEST SUPPORT
// ============================================================================
