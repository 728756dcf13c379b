//! Coupon selection.

use crate::{
    error::{PromoError, PromoResult},
    ledger::RedemptionLedger,
    types::{Coupon, RewardId},
};

/// Pick the lowest-id coupon of `reward_id` that has never been redeemed.
///
/// An empty pool while limits still allow redemptions means the catalog was
/// under-provisioned, so it gets its own error instead of a limit error.
pub fn pick_coupon(ledger: &dyn RedemptionLedger, reward_id: RewardId) -> PromoResult<Coupon> {
    ledger
        .first_unredeemed_coupon(reward_id)?
        .ok_or(PromoError::NoCouponsAvailable { reward_id })
}
