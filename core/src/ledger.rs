//! Collaborator contracts the engine needs from a data store.
//!
//! RULE: the engine never talks SQL. Everything it reads or writes goes
//! through these two traits, so any store that honors them can back it.

use crate::{
    error::PromoResult,
    types::{Coupon, NewRedemption, Player, PlayerId, Redemption, Reward, RewardId},
};
use chrono::{DateTime, Utc};

/// The append-only record of completed redemptions, as seen from inside
/// one atomic unit of work.
pub trait RedemptionLedger {
    /// Redemptions recorded against `reward_id`, ever.
    fn count_for_reward(&self, reward_id: RewardId) -> PromoResult<u64>;

    /// Redemptions against `reward_id` with `from <= redeemed_at < until`.
    fn count_for_reward_between(
        &self,
        reward_id: RewardId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> PromoResult<u64>;

    /// Lowest-id coupon of `reward_id` that no redemption references.
    fn first_unredeemed_coupon(&self, reward_id: RewardId) -> PromoResult<Option<Coupon>>;

    fn append(&self, redemption: &NewRedemption) -> PromoResult<Redemption>;
}

/// Catalog lookups plus the transaction boundary around the ledger.
pub trait PromoStore: Send + Sync {
    fn find_reward(&self, id: RewardId) -> PromoResult<Option<Reward>>;

    fn find_player(&self, id: PlayerId) -> PromoResult<Option<Player>>;

    /// Run `work` as one atomic unit. Commits when it returns `Ok`; when it
    /// returns `Err` (or unwinds) nothing it appended survives.
    ///
    /// Store-level contention surfaces as `PromoError::ConflictRetry`.
    fn in_ledger_transaction<T, F>(&self, work: F) -> PromoResult<T>
    where
        F: FnOnce(&dyn RedemptionLedger) -> PromoResult<T>;
}
