//! Reward validity window.

use crate::types::Reward;
use chrono::{DateTime, Utc};

/// True iff `start_date <= now <= end_date`. Both bounds inclusive.
pub fn is_valid(reward: &Reward, now: DateTime<Utc>) -> bool {
    reward.start_date <= now && now <= reward.end_date
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn reward() -> Reward {
        Reward {
            id:            1,
            name:          "spring".into(),
            start_date:    Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap(),
            end_date:      Utc.with_ymd_and_hms(2024, 4, 30, 23, 59, 59).unwrap(),
            total_limit:   10,
            per_day_limit: 2,
        }
    }

    #[test]
    fn bounds_are_inclusive() {
        let r = reward();
        assert!(is_valid(&r, r.start_date));
        assert!(is_valid(&r, r.end_date));
        assert!(is_valid(&r, r.start_date + Duration::days(3)));
    }

    #[test]
    fn outside_window_is_invalid() {
        let r = reward();
        assert!(!is_valid(&r, r.start_date - Duration::milliseconds(1)));
        assert!(!is_valid(&r, r.end_date + Duration::milliseconds(1)));
    }
}
