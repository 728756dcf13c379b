//! The redemption coordinator — the single entry point of the engine.
//!
//! STAGES (per attempt, in order, never reordered):
//!   1. Load reward and player          → NotFound
//!   2. Validity window                 → RewardExpiredOrNotStarted
//!   3. Total, then daily limit         → LimitExceeded
//!   4. Lowest unredeemed coupon        → NoCouponsAvailable
//!   5. Append to the ledger            → Committed
//!
//! RULES:
//!   - Stages 3–5 run under the reward's lock AND inside one store
//!     transaction. The engine never makes two rewards share a lock;
//!     whatever the store serializes underneath is the store's business.
//!   - Nothing is written before stage 5; a failure anywhere leaves the
//!     ledger untouched.
//!   - Store conflicts replay stages 3–5 a bounded number of times.

use crate::{
    allocator,
    clock::Clock,
    config::PromoConfig,
    error::{PromoError, PromoResult},
    ledger::PromoStore,
    limits::LimitEnforcer,
    types::{Coupon, NewRedemption, PlayerId, Reward, RewardId},
    validity,
};
use dashmap::DashMap;
use std::cell::Cell;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

/// Where an attempt got to. Logged on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    RewardLoaded,
    Validated,
    LimitsChecked,
    CouponAllocated,
    Committed,
}

/// One mutex per reward id, created on first use.
#[derive(Default)]
struct RewardLocks {
    locks: DashMap<RewardId, Arc<Mutex<()>>>,
}

impl RewardLocks {
    fn for_reward(&self, reward_id: RewardId) -> Arc<Mutex<()>> {
        // Clone out of the map so the shard guard is released before
        // the caller blocks on the mutex.
        Arc::clone(&self.locks.entry(reward_id).or_default())
    }
}

pub struct RedemptionCoordinator<S: PromoStore> {
    store:       S,
    clock:       Arc<dyn Clock>,
    limits:      LimitEnforcer,
    locks:       RewardLocks,
    max_retries: u32,
}

impl<S: PromoStore> RedemptionCoordinator<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, config: &PromoConfig) -> PromoResult<Self> {
        Ok(Self {
            store,
            clock,
            limits: LimitEnforcer::new(config.daily_zone()?),
            locks: RewardLocks::default(),
            max_retries: config.max_conflict_retries,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Redeem one coupon of `reward_id` for `player_id`.
    pub fn redeem_coupon(&self, player_id: PlayerId, reward_id: RewardId) -> PromoResult<Coupon> {
        let attempt = Uuid::new_v4();
        let stage = Cell::new(Stage::Started);

        let result = self.run(player_id, reward_id, &stage);
        match &result {
            Ok(coupon) => log::info!(
                "[{attempt}] player {player_id} redeemed coupon {} ({}) of reward {reward_id}",
                coupon.id,
                coupon.code
            ),
            Err(e) => log::warn!(
                "[{attempt}] player {player_id} could not redeem reward {reward_id} after {:?}: {e}",
                stage.get()
            ),
        }
        result
    }

    fn run(&self, player_id: PlayerId, reward_id: RewardId, stage: &Cell<Stage>) -> PromoResult<Coupon> {
        let reward = self
            .store
            .find_reward(reward_id)?
            .ok_or(PromoError::NotFound { entity: "reward", id: reward_id })?;
        let player = self
            .store
            .find_player(player_id)?
            .ok_or(PromoError::NotFound { entity: "player", id: player_id })?;
        stage.set(Stage::RewardLoaded);

        // Fail fast before queueing on the lock. Re-checked inside.
        if !validity::is_valid(&reward, self.clock.now()) {
            return Err(PromoError::RewardExpiredOrNotStarted { reward_id });
        }
        stage.set(Stage::Validated);

        let lock = self.locks.for_reward(reward.id);
        // The lock guards no data, so a poisoned one is still usable.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        // First try plus the configured replays.
        let budget = self.max_retries.saturating_add(1);
        for attempt in 1..=budget {
            match self.allocate(&reward, player.id, stage) {
                Err(PromoError::ConflictRetry) => {
                    log::debug!("Conflict on reward {reward_id} (attempt {attempt} of {budget})");
                }
                Ok(coupon) => {
                    stage.set(Stage::Committed);
                    return Ok(coupon);
                }
                Err(e) => return Err(e),
            }
        }
        Err(PromoError::RetriesExhausted { attempts: budget })
    }

    /// Stages 3–5 as one store transaction.
    fn allocate(&self, reward: &Reward, player_id: PlayerId, stage: &Cell<Stage>) -> PromoResult<Coupon> {
        self.store.in_ledger_transaction(|ledger| {
            let now = self.clock.now();
            if !validity::is_valid(reward, now) {
                return Err(PromoError::RewardExpiredOrNotStarted { reward_id: reward.id });
            }

            self.limits.check_limits(ledger, reward, now)?;
            stage.set(Stage::LimitsChecked);

            let coupon = allocator::pick_coupon(ledger, reward.id)?;
            stage.set(Stage::CouponAllocated);

            let redemption = ledger.append(&NewRedemption {
                player_id,
                coupon_id: coupon.id,
                reward_id: reward.id,
                redeemed_at: now,
            })?;
            log::debug!(
                "Redemption {} appended for coupon {} at {}",
                redemption.id,
                coupon.id,
                redemption.redeemed_at
            );
            Ok(coupon)
        })
    }
}
