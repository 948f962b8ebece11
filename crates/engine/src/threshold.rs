//! Boost milestone evaluation.
//!
//! A pure function of the configured ladder and a total count. Whether the
//! tier was already announced for a target is decided by the pipeline against
//! the notification store.

use walwal_common::types::BoostTier;

/// Ascending list of boost tiers.
#[derive(Debug, Clone)]
pub struct BoostLadder {
    tiers: Vec<BoostTier>,
}

impl BoostLadder {
    /// Build a ladder; tiers are sorted by threshold regardless of input order.
    pub fn new(mut tiers: Vec<BoostTier>) -> Self {
        tiers.sort_by_key(|t| t.threshold);
        Self { tiers }
    }

    pub fn tiers(&self) -> &[BoostTier] {
        &self.tiers
    }

    /// The highest tier whose threshold is at or below `total_count`.
    pub fn evaluate(&self, total_count: u64) -> Option<&BoostTier> {
        self.tiers
            .iter()
            .take_while(|tier| tier.threshold <= total_count)
            .last()
    }

    /// Position of `tier` in the ladder, used for ordering comparisons.
    pub fn rank(&self, tier: &BoostTier) -> Option<usize> {
        self.tiers.iter().position(|t| t.threshold == tier.threshold)
    }
}
