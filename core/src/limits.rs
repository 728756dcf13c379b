//! Total and per-day ceilings.
//!
//! Counts come from the ledger handed in by the caller, which must be the
//! same transaction the redemption is later appended through.

use crate::{
    error::{LimitScope, PromoError, PromoResult},
    ledger::RedemptionLedger,
    types::Reward,
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

pub struct LimitEnforcer {
    zone: Tz,
}

impl LimitEnforcer {
    /// `zone` decides where a calendar day starts for the daily ceiling.
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    /// Fails with the first ceiling already reached. Total goes first.
    pub fn check_limits(
        &self,
        ledger: &dyn RedemptionLedger,
        reward: &Reward,
        now: DateTime<Utc>,
    ) -> PromoResult<()> {
        let total = ledger.count_for_reward(reward.id)?;
        if total >= u64::from(reward.total_limit) {
            return Err(PromoError::LimitExceeded {
                reward_id: reward.id,
                scope:     LimitScope::Total,
                limit:     reward.total_limit,
            });
        }

        let (from, until) = self.day_window(now)?;
        let today = ledger.count_for_reward_between(reward.id, from, until)?;
        if today >= u64::from(reward.per_day_limit) {
            return Err(PromoError::LimitExceeded {
                reward_id: reward.id,
                scope:     LimitScope::Daily,
                limit:     reward.per_day_limit,
            });
        }

        log::debug!(
            "Reward {} within limits: {total}/{} total, {today}/{} today",
            reward.id,
            reward.total_limit,
            reward.per_day_limit
        );
        Ok(())
    }

    /// Half-open UTC range `[start, end)` of the local calendar day
    /// containing `now`.
    pub fn day_window(&self, now: DateTime<Utc>) -> PromoResult<(DateTime<Utc>, DateTime<Utc>)> {
        let date = now.with_timezone(&self.zone).date_naive();
        let next = date.succ_opt().ok_or_else(|| {
            PromoError::Other(anyhow::anyhow!("no calendar day after {date}"))
        })?;
        Ok((self.start_of_day(date)?, self.start_of_day(next)?))
    }

    fn start_of_day(&self, date: NaiveDate) -> PromoResult<DateTime<Utc>> {
        // Zones that switch to DST at midnight skip it; the day then
        // begins at the first local time that exists.
        let midnight = date.and_time(NaiveTime::MIN);
        for step in 0..=8 {
            let local = midnight + Duration::minutes(15 * step);
            if let Some(start) = self.zone.from_local_datetime(&local).earliest() {
                return Ok(start.with_timezone(&Utc));
            }
        }
        Err(PromoError::Other(anyhow::anyhow!(
            "no valid start of {date} in {}",
            self.zone.name()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Coupon, NewRedemption, Redemption, RewardId};
    use std::cell::RefCell;

    /// Ledger holding only timestamps, enough to drive the counters.
    #[derive(Default)]
    struct StampLedger {
        stamps: RefCell<Vec<DateTime<Utc>>>,
    }

    impl RedemptionLedger for StampLedger {
        fn count_for_reward(&self, _: RewardId) -> PromoResult<u64> {
            Ok(self.stamps.borrow().len() as u64)
        }

        fn count_for_reward_between(
            &self,
            _: RewardId,
            from: DateTime<Utc>,
            until: DateTime<Utc>,
        ) -> PromoResult<u64> {
            Ok(self
                .stamps
                .borrow()
                .iter()
                .filter(|t| **t >= from && **t < until)
                .count() as u64)
        }

        fn first_unredeemed_coupon(&self, _: RewardId) -> PromoResult<Option<Coupon>> {
            Ok(None)
        }

        fn append(&self, r: &NewRedemption) -> PromoResult<Redemption> {
            self.stamps.borrow_mut().push(r.redeemed_at);
            Ok(Redemption {
                id:          self.stamps.borrow().len() as i64,
                player_id:   r.player_id,
                coupon_id:   r.coupon_id,
                reward_id:   r.reward_id,
                redeemed_at: r.redeemed_at,
            })
        }
    }

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn reward(total: u32, per_day: u32) -> Reward {
        Reward {
            id:            7,
            name:          "limits".into(),
            start_date:    at(2024, 1, 1, 0),
            end_date:      at(2024, 12, 31, 0),
            total_limit:   total,
            per_day_limit: per_day,
        }
    }

    fn ledger_with(stamps: &[DateTime<Utc>]) -> StampLedger {
        StampLedger { stamps: RefCell::new(stamps.to_vec()) }
    }

    #[test]
    fn total_is_checked_before_daily() {
        let enforcer = LimitEnforcer::new(Tz::UTC);
        let now = at(2024, 6, 1, 12);
        let ledger = ledger_with(&[now, now]);

        let err = enforcer.check_limits(&ledger, &reward(2, 1), now).unwrap_err();
        assert!(matches!(
            err,
            PromoError::LimitExceeded { scope: LimitScope::Total, limit: 2, .. }
        ));
    }

    #[test]
    fn daily_ceiling_only_counts_today() {
        let enforcer = LimitEnforcer::new(Tz::UTC);
        let now = at(2024, 6, 2, 9);
        let ledger = ledger_with(&[at(2024, 6, 1, 23), at(2024, 6, 2, 0)]);

        let err = enforcer.check_limits(&ledger, &reward(10, 1), now).unwrap_err();
        assert!(matches!(err, PromoError::LimitExceeded { scope: LimitScope::Daily, .. }));

        assert!(enforcer.check_limits(&ledger, &reward(10, 2), now).is_ok());
    }

    #[test]
    fn zero_limits_refuse_everything() {
        let enforcer = LimitEnforcer::new(Tz::UTC);
        let ledger = StampLedger::default();
        let now = at(2024, 6, 1, 12);
        assert!(enforcer.check_limits(&ledger, &reward(0, 5), now).is_err());
        assert!(enforcer.check_limits(&ledger, &reward(5, 0), now).is_err());
    }

    #[test]
    fn day_window_follows_configured_zone() {
        let tokyo = LimitEnforcer::new(chrono_tz::Asia::Tokyo);
        // 20:00 UTC on May 1st is already May 2nd in Tokyo.
        let (from, until) = tokyo.day_window(at(2024, 5, 1, 20)).unwrap();
        assert_eq!(from, at(2024, 5, 1, 15));
        assert_eq!(until, at(2024, 5, 2, 15));

        let utc = LimitEnforcer::new(Tz::UTC);
        let (from, until) = utc.day_window(at(2024, 5, 1, 20)).unwrap();
        assert_eq!(from, at(2024, 5, 1, 0));
        assert_eq!(until, at(2024, 5, 2, 0));
    }

    #[test]
    fn same_instants_land_on_different_days_per_zone() {
        // 23:00 and 01:00 UTC straddle UTC midnight but share a New York day.
        let stamps = [at(2024, 7, 1, 23)];
        let now = at(2024, 7, 2, 1);

        let utc = LimitEnforcer::new(Tz::UTC);
        assert!(utc.check_limits(&ledger_with(&stamps), &reward(10, 1), now).is_ok());

        let ny = LimitEnforcer::new(chrono_tz::America::New_York);
        assert!(ny.check_limits(&ledger_with(&stamps), &reward(10, 1), now).is_err());
    }
}
