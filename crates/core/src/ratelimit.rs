//! Tenant concurrency snapshots.

use serde::{Deserialize, Serialize};

/// Point-in-time admission decision for one tenant.
///
/// Computed, never stored. The snapshot is advisory: it does not
/// reserve a slot, so concurrent creations can transiently exceed the
/// ceiling. The creation service enforces admission by refusing to
/// persist when `allowed` is false.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitSnapshot {
    /// Tenant the count was read for.
    pub tenant_id: String,
    /// Active (non-terminal) sessions at read time.
    pub current_count: u64,
    /// Configured ceiling.
    pub max_allowed: u64,
    /// Slots left, floored at zero.
    pub remaining: u64,
    /// Whether a new session may be admitted.
    pub allowed: bool,
}

impl RateLimitSnapshot {
    /// Compute a snapshot from a current count and the configured ceiling.
    pub fn compute(tenant_id: String, current_count: u64, max_allowed: u64) -> Self {
        Self {
            tenant_id,
            current_count,
            max_allowed,
            remaining: max_allowed.saturating_sub(current_count),
            allowed: current_count < max_allowed,
        }
    }
}
