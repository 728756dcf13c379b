//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The engine reaches it through the `PromoStore` and `RedemptionLedger`
//! traits; it never executes SQL directly.

use crate::{
    config::PromoConfig,
    error::{PromoError, PromoResult},
    ledger::{PromoStore, RedemptionLedger},
    types::{Player, PlayerId, Reward, RewardId},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, TransactionBehavior};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use uuid::Uuid;

mod catalog;
mod ledger;

pub use ledger::SqliteLedger;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

/// Two connections to one database. `writer` runs every ledger transaction;
/// `reader` serves catalog lookups, so a lookup never queues behind a
/// transaction of another reward.
pub struct SqliteStore {
    writer:       Mutex<Connection>,
    reader:       Mutex<Connection>,
    path:         String, // file path, or a shared-cache memory URI
    busy_timeout: Duration,
}

impl SqliteStore {
    pub fn open(path: &str) -> PromoResult<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open `path` with the busy timeout taken from `config`.
    pub fn open_configured(path: &str, config: &PromoConfig) -> PromoResult<Self> {
        Self::open_with_timeout(path, config.busy_timeout())
    }

    /// Open an in-memory database (used in tests).
    ///
    /// Shared cache under a unique name, so both connections see the same
    /// data and no two stores ever do.
    pub fn in_memory() -> PromoResult<Self> {
        Self::open(&format!("file:promo-{}?mode=memory&cache=shared", Uuid::new_v4()))
    }

    /// Open another, independent store on the same database.
    pub fn reopen(&self) -> PromoResult<Self> {
        Self::open_with_timeout(&self.path, self.busy_timeout)
    }

    fn open_with_timeout(path: &str, busy_timeout: Duration) -> PromoResult<Self> {
        let writer = Self::connect(path, busy_timeout)?;
        // WAL mode only for real files (memory databases ignore it).
        // Under WAL the reader keeps reading while the writer holds its lock.
        let _ = writer.execute_batch("PRAGMA journal_mode=WAL;");
        let reader = Self::connect(path, busy_timeout)?;
        reader.execute_batch("PRAGMA query_only=ON;")?;
        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
            path: path.to_string(),
            busy_timeout,
        })
    }

    fn connect(path: &str, busy_timeout: Duration) -> PromoResult<Connection> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(busy_timeout)?;
        Ok(conn)
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PromoResult<()> {
        self.conn()
            .execute_batch(include_str!("../../../migrations/001_redemption.sql"))?;
        Ok(())
    }

    /// The write connection. Any transaction open when a holder panicked
    /// was rolled back on drop, so a poisoned guard is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn read_conn(&self) -> MutexGuard<'_, Connection> {
        self.reader.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl PromoStore for SqliteStore {
    fn find_reward(&self, id: RewardId) -> PromoResult<Option<Reward>> {
        catalog::find_reward(&self.read_conn(), id)
    }

    fn find_player(&self, id: PlayerId) -> PromoResult<Option<Player>> {
        catalog::find_player(&self.read_conn(), id)
    }

    fn in_ledger_transaction<T, F>(&self, work: F) -> PromoResult<T>
    where
        F: FnOnce(&dyn RedemptionLedger) -> PromoResult<T>,
    {
        let mut conn = self.conn();
        // IMMEDIATE takes the write lock up front, so the counts read below
        // cannot go stale before the insert from another connection.
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(classify)?;
        let out = work(&SqliteLedger::new(&tx))?;
        tx.commit().map_err(classify)?;
        Ok(out)
    }
}

/// Map contention to `ConflictRetry`; everything else stays a database error.
pub(crate) fn classify(err: rusqlite::Error) -> PromoError {
    match &err {
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(e.code, ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) =>
        {
            PromoError::ConflictRetry
        }
        // Another connection took the same coupon first.
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            PromoError::ConflictRetry
        }
        _ => PromoError::Database(err),
    }
}

fn to_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

fn from_millis(idx: usize, millis: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn busy_timeout_ms(conn: &Connection) -> i64 {
        conn.query_row("PRAGMA busy_timeout", [], |row| row.get(0)).unwrap()
    }

    #[test]
    fn configured_busy_timeout_reaches_both_connections() {
        let path = format!("file:promo-busy-{}?mode=memory&cache=shared", Uuid::new_v4());
        let config = PromoConfig { busy_timeout_ms: 1_250, ..PromoConfig::default_test() };

        let store = SqliteStore::open_configured(&path, &config).unwrap();
        assert_eq!(busy_timeout_ms(&store.conn()), 1_250);
        assert_eq!(busy_timeout_ms(&store.read_conn()), 1_250);

        let again = store.reopen().unwrap();
        assert_eq!(busy_timeout_ms(&again.conn()), 1_250);
    }

    #[test]
    fn in_memory_stores_are_isolated_but_share_between_connections() {
        let a = SqliteStore::in_memory().unwrap();
        a.migrate().unwrap();
        a.insert_player(&Player { id: 1, name: "solo".into() }).unwrap();

        // The lookup goes through the read connection.
        assert!(a.find_player(1).unwrap().is_some());
        assert!(a.reopen().unwrap().find_player(1).unwrap().is_some());

        let b = SqliteStore::in_memory().unwrap();
        b.migrate().unwrap();
        assert!(b.find_player(1).unwrap().is_none());
    }

    #[test]
    fn read_connection_refuses_writes() {
        let store = SqliteStore::in_memory().unwrap();
        store.migrate().unwrap();
        let err = store
            .read_conn()
            .execute("INSERT INTO player (id, name) VALUES (1, 'x')", [])
            .unwrap_err();
        assert!(matches!(err, rusqlite::Error::SqliteFailure(..)));
    }
}
