//! Aggregated outcome of one reconciliation pass.

use serde::{Deserialize, Serialize};

/// Counters returned by a full sync pass.
///
/// `total` is the number of input items; `success + skipped + failed` covers
/// the per-item phase, while `deleted` (and delete failures folded into
/// `failed`) covers the orphan-pruning phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    /// Items created or updated remotely.
    pub success: usize,
    /// Items left untouched because the remote copy was already current.
    pub skipped: usize,
    /// Orphaned remote events removed.
    pub deleted: usize,
    /// Per-item write failures plus delete failures.
    pub failed: usize,
    /// Number of items in the input set.
    pub total: usize,
}

impl SyncStats {
    /// Whether the pass completed without any absorbed failures.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl std::fmt::Display for SyncStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} synced, {} skipped, {} deleted, {} failed ({} total)",
            self.success, self.skipped, self.deleted, self.failed, self.total
        )
    }
}
