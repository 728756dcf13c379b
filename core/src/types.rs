//! Shared primitive types and the entities the engine reads or writes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Catalog identifiers. Assigned by the store, opaque to the engine.
pub type RewardId = i64;
pub type CouponId = i64;
pub type PlayerId = i64;
pub type RedemptionId = i64;

/// A promotional campaign with a validity window and redemption ceilings.
/// Owned by the catalog; read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reward {
    pub id:            RewardId,
    pub name:          String,
    pub start_date:    DateTime<Utc>,
    pub end_date:      DateTime<Utc>,
    pub total_limit:   u32,
    pub per_day_limit: u32,
}

/// One redeemable code belonging to a reward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Coupon {
    pub id:        CouponId,
    pub reward_id: RewardId,
    pub code:      String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub id:   PlayerId,
    pub name: String,
}

/// A ledger entry. The only entity this crate creates, and it never
/// updates or deletes one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Redemption {
    pub id:          RedemptionId,
    pub player_id:   PlayerId,
    pub coupon_id:   CouponId,
    pub reward_id:   RewardId,
    pub redeemed_at: DateTime<Utc>,
}

/// A redemption about to be appended; the id is assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRedemption {
    pub player_id:   PlayerId,
    pub coupon_id:   CouponId,
    pub reward_id:   RewardId,
    pub redeemed_at: DateTime<Utc>,
}
