use super::{classify, from_millis, to_millis, SqliteStore};
use crate::{
    error::{PromoError, PromoResult},
    ledger::RedemptionLedger,
    types::{Coupon, NewRedemption, Redemption, RewardId},
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

/// Ledger view over an open transaction. Borrowing the connection ties
/// every read and the append to that one transaction.
pub struct SqliteLedger<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteLedger<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl RedemptionLedger for SqliteLedger<'_> {
    fn count_for_reward(&self, reward_id: RewardId) -> PromoResult<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM redemption WHERE reward_id = ?1",
                params![reward_id],
                |row| row.get(0),
            )
            .map_err(classify)?;
        Ok(count as u64)
    }

    fn count_for_reward_between(
        &self,
        reward_id: RewardId,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> PromoResult<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM redemption
                 WHERE reward_id = ?1 AND redeemed_at >= ?2 AND redeemed_at < ?3",
                params![reward_id, to_millis(from), to_millis(until)],
                |row| row.get(0),
            )
            .map_err(classify)?;
        Ok(count as u64)
    }

    fn first_unredeemed_coupon(&self, reward_id: RewardId) -> PromoResult<Option<Coupon>> {
        self.conn
            .query_row(
                "SELECT c.id, c.reward_id, c.code
                 FROM coupon c
                 WHERE c.reward_id = ?1
                   AND c.id NOT IN (SELECT coupon_id FROM redemption)
                 ORDER BY c.id ASC
                 LIMIT 1",
                params![reward_id],
                |row| {
                    Ok(Coupon {
                        id:        row.get(0)?,
                        reward_id: row.get(1)?,
                        code:      row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(classify)
    }

    fn append(&self, redemption: &NewRedemption) -> PromoResult<Redemption> {
        // reward_id is copied from the coupon row, so a redemption can never
        // point at a coupon of another reward.
        let inserted = self
            .conn
            .execute(
                "INSERT INTO redemption (player_id, coupon_id, reward_id, redeemed_at)
                 SELECT ?1, id, reward_id, ?3 FROM coupon
                 WHERE id = ?2 AND reward_id = ?4",
                params![
                    redemption.player_id,
                    redemption.coupon_id,
                    to_millis(redemption.redeemed_at),
                    redemption.reward_id,
                ],
            )
            .map_err(classify)?;
        if inserted == 0 {
            return Err(PromoError::NotFound { entity: "coupon", id: redemption.coupon_id });
        }

        Ok(Redemption {
            id:          self.conn.last_insert_rowid(),
            player_id:   redemption.player_id,
            coupon_id:   redemption.coupon_id,
            reward_id:   redemption.reward_id,
            // Stored at millisecond precision; report what was stored.
            redeemed_at: from_millis(3, to_millis(redemption.redeemed_at))?,
        })
    }
}

fn redemption_from_row(row: &Row<'_>) -> rusqlite::Result<Redemption> {
    Ok(Redemption {
        id:          row.get(0)?,
        player_id:   row.get(1)?,
        coupon_id:   row.get(2)?,
        reward_id:   row.get(3)?,
        redeemed_at: from_millis(4, row.get(4)?)?,
    })
}

impl SqliteStore {
    /// Every ledger entry for a reward, oldest first.
    pub fn redemptions_for_reward(&self, reward_id: RewardId) -> PromoResult<Vec<Redemption>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, player_id, coupon_id, reward_id, redeemed_at
             FROM redemption WHERE reward_id = ?1
             ORDER BY id ASC",
        )?;
        let rows = stmt
            .query_map(params![reward_id], redemption_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
