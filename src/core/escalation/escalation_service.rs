// Escalation - warnings counted from history, promoting to the blacklist at a threshold.
//
// clean -> warned(1..threshold-1) -> blacklisted
//
// The append, the recount and the blacklist insert all happen inside one write
// acquisition of the state store, so concurrent warnings for the same user are
// serialized and the promotion fires exactly once. Removing the user from the group
// is the caller's job whenever `reached_limit` comes back true, even for users that
// were already blacklisted from another group.

use crate::core::state::{StateStore, Warning, WarningTally};
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub const DEFAULT_WARNING_THRESHOLD: usize = 3;

pub struct EscalationService {
    store: Arc<StateStore>,
    threshold: usize,
}

impl EscalationService {
    pub fn new(store: Arc<StateStore>, threshold: usize) -> Self {
        Self {
            store,
            threshold: threshold.max(1),
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Record a warning and promote to the blacklist if this one reaches the threshold.
    pub async fn issue_warning(
        &self,
        group_id: &str,
        user_id: &str,
        reason: &str,
        issued_by: &str,
        issued_at: DateTime<Utc>,
    ) -> WarningTally {
        let warning = Warning {
            group_id: group_id.to_string(),
            user_id: user_id.to_string(),
            reason: reason.to_string(),
            issued_at,
            issued_by: issued_by.to_string(),
        };
        let threshold = self.threshold;
        let tally = self
            .store
            .write(move |state| state.record_warning(warning, threshold))
            .await;

        tracing::info!(
            group = %group_id,
            user = %user_id,
            issued_by = %issued_by,
            count = tally.count,
            reached_limit = tally.reached_limit,
            promoted = tally.promoted,
            "Warning issued"
        );
        tally
    }

    /// Forget every warning in a group. Returns how many were dropped.
    pub async fn clear_group(&self, group_id: &str) -> usize {
        let cleared = self.store.write(|state| state.clear_warnings(group_id)).await;
        tracing::info!(group = %group_id, cleared, "Warnings cleared");
        cleared
    }

    /// Drop the user's most recent warning. `None` if they had none.
    pub async fn remove_latest(&self, group_id: &str, user_id: &str) -> Option<usize> {
        self.store
            .write(|state| state.remove_latest_warning(group_id, user_id))
            .await
    }

    pub async fn count(&self, group_id: &str, user_id: &str) -> usize {
        self.store
            .read(|state| state.warning_count(group_id, user_id))
            .await
    }

    /// Per-user counts for a group.
    pub async fn summary(&self, group_id: &str) -> Vec<(String, usize)> {
        self.store.read(|state| state.warning_summary(group_id)).await
    }

    /// Full records for one user, oldest first.
    pub async fn history(&self, group_id: &str, user_id: &str) -> Vec<Warning> {
        self.store
            .read(|state| state.warnings_for(group_id, user_id))
            .await
    }
}
