use super::{from_millis, to_millis, SqliteStore};
use crate::{
    error::PromoResult,
    types::{Coupon, Player, PlayerId, Reward, RewardId},
};
use rusqlite::{params, Connection, OptionalExtension};

pub(super) fn find_reward(conn: &Connection, id: RewardId) -> PromoResult<Option<Reward>> {
    let reward = conn
        .query_row(
            "SELECT id, name, start_date, end_date, total_limit, per_day_limit
             FROM reward WHERE id = ?1",
            params![id],
            |row| {
                Ok(Reward {
                    id:            row.get(0)?,
                    name:          row.get(1)?,
                    start_date:    from_millis(2, row.get(2)?)?,
                    end_date:      from_millis(3, row.get(3)?)?,
                    total_limit:   row.get(4)?,
                    per_day_limit: row.get(5)?,
                })
            },
        )
        .optional()?;
    Ok(reward)
}

pub(super) fn find_player(conn: &Connection, id: PlayerId) -> PromoResult<Option<Player>> {
    let player = conn
        .query_row(
            "SELECT id, name FROM player WHERE id = ?1",
            params![id],
            |row| Ok(Player { id: row.get(0)?, name: row.get(1)? }),
        )
        .optional()?;
    Ok(player)
}

// ── Catalog fixtures ───────────────────────────────────────────
// Seeding for tests and local runs. Catalog management proper lives
// outside this crate.

impl SqliteStore {
    pub fn insert_player(&self, player: &Player) -> PromoResult<()> {
        self.conn().execute(
            "INSERT INTO player (id, name) VALUES (?1, ?2)",
            params![player.id, player.name],
        )?;
        Ok(())
    }

    pub fn insert_reward(&self, reward: &Reward) -> PromoResult<()> {
        self.conn().execute(
            "INSERT INTO reward (id, name, start_date, end_date, total_limit, per_day_limit)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                reward.id,
                reward.name,
                to_millis(reward.start_date),
                to_millis(reward.end_date),
                reward.total_limit,
                reward.per_day_limit,
            ],
        )?;
        Ok(())
    }

    pub fn insert_coupon(&self, coupon: &Coupon) -> PromoResult<()> {
        self.conn().execute(
            "INSERT INTO coupon (id, reward_id, code) VALUES (?1, ?2, ?3)",
            params![coupon.id, coupon.reward_id, coupon.code],
        )?;
        Ok(())
    }
}
