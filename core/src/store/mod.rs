//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! Ledger components call store methods and never execute SQL directly.

use crate::{
    error::{LedgerError, LedgerResult},
    event::{EventLogEntry, LedgerEvent},
    types::{format_ts, parse_ts, Timestamp},
};
use rusqlite::{params, types::Type, Connection, Row};
use std::cell::Cell;

mod group;
mod profile;
mod referral;
mod reward;
mod waitlist;

pub struct LedgerStore {
    pub(crate) conn: Connection,
    path:            Option<String>, // None for :memory:, Some(path) for file
    savepoint_depth: Cell<u32>,
}

impl LedgerStore {
    pub fn open(path: &str) -> LedgerResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
            savepoint_depth: Cell::new(0),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> LedgerResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None, savepoint_depth: Cell::new(0) })
    }

    /// Reopen a new connection to the same database.
    /// For in-memory databases, this returns a new in-memory database (isolated).
    /// For file-based and shared-cache URIs, this opens the same database.
    pub fn reopen(&self) -> LedgerResult<Self> {
        match &self.path {
            Some(p) => Self::open(p),
            None => Self::in_memory(),
        }
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> LedgerResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_referrals.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_groups.sql"))?;
        Ok(())
    }

    /// Run `f` inside a savepoint. Everything `f` writes is kept if it
    /// returns Ok and rolled back if it returns Err. Calls nest: an inner
    /// failure only unwinds the inner savepoint.
    pub fn atomically<T>(&self, f: impl FnOnce(&Self) -> LedgerResult<T>) -> LedgerResult<T> {
        let depth = self.savepoint_depth.get();
        let name = format!("ledger_sp_{depth}");
        self.conn.execute_batch(&format!("SAVEPOINT {name};"))?;
        self.savepoint_depth.set(depth + 1);

        let result = f(self);
        self.savepoint_depth.set(depth);

        match result {
            Ok(value) => {
                self.conn.execute_batch(&format!("RELEASE {name};"))?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = self
                    .conn
                    .execute_batch(&format!("ROLLBACK TO {name}; RELEASE {name};"))
                {
                    log::error!("Rollback of {name} failed: {rollback}");
                }
                Err(e)
            }
        }
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, event: &LedgerEvent, at: &Timestamp) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (entity_id, event_type, payload, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                event.entity_id(),
                event.type_name(),
                serde_json::to_string(event)?,
                format_ts(at),
            ],
        )?;
        Ok(())
    }

    pub fn events_for_entity(&self, entity_id: &str) -> LedgerResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, entity_id, event_type, payload, created_at
             FROM event_log WHERE entity_id = ?1
             ORDER BY id ASC",
        )?;
        let entries = stmt
            .query_map(params![entity_id], |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    entity_id:  row.get(1)?,
                    event_type: row.get(2)?,
                    payload:    row.get(3)?,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, event_type: &str) -> LedgerResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE event_type = ?1",
            params![event_type],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }
}

/// True when `err` is a UNIQUE index violation. The ledger treats these as
/// the authoritative duplicate signal rather than a prior read.
pub fn is_unique_violation(err: &LedgerError) -> bool {
    match err {
        LedgerError::Database(rusqlite::Error::SqliteFailure(e, _)) => {
            e.code == rusqlite::ErrorCode::ConstraintViolation
                && e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
        }
        _ => false,
    }
}

// ── Column helpers ─────────────────────────────────────────────

pub(crate) fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Timestamp> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Timestamp>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => parse_ts(&raw)
            .map(Some)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
        None => Ok(None),
    }
}

/// Store a closed string enum as TEXT via its `as_str()` / `FromStr` pair.
macro_rules! text_column {
    ($($ty:ty),* $(,)?) => {$(
        impl rusqlite::types::ToSql for $ty {
            fn to_sql(&self) -> rusqlite::Result<rusqlite::types::ToSqlOutput<'_>> {
                Ok(rusqlite::types::ToSqlOutput::from(self.as_str()))
            }
        }

        impl rusqlite::types::FromSql for $ty {
            fn column_result(
                value: rusqlite::types::ValueRef<'_>,
            ) -> rusqlite::types::FromSqlResult<Self> {
                value
                    .as_str()?
                    .parse::<$ty>()
                    .map_err(|e| rusqlite::types::FromSqlError::Other(e.into()))
            }
        }
    )*};
}

text_column!(
    crate::referral_ledger::ReferralStatus,
    crate::tier_rewards::RewardType,
    crate::tier_rewards::RewardStatus,
    crate::group_ledger::GroupStatus,
    crate::group_ledger::MemberStatus,
    crate::group_ledger::PaymentStatus,
    crate::group_ledger::ActivityKind,
    crate::group_ledger::WaitlistStatus,
);
