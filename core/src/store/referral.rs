use super::{opt_ts_col, ts_col, LedgerStore};
use crate::{
    error::LedgerResult,
    referral_ledger::{Referral, ReferralStatus},
    types::{format_ts, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

const REFERRAL_COLUMNS: &str =
    "id, referrer_id, referred_id, status, reward_amount, created_at, completed_at";

fn referral_from_row(row: &Row<'_>) -> rusqlite::Result<Referral> {
    Ok(Referral {
        id:            row.get(0)?,
        referrer_id:   row.get(1)?,
        referred_id:   row.get(2)?,
        status:        row.get(3)?,
        reward_amount: row.get(4)?,
        created_at:    ts_col(row, 5)?,
        completed_at:  opt_ts_col(row, 6)?,
    })
}

impl LedgerStore {
    // ── Referrals ─────────────────────────────────────────────────

    pub fn insert_referral(&self, r: &Referral) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO referrals (
                id, referrer_id, referred_id, status, reward_amount, created_at, completed_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                r.id,
                r.referrer_id,
                r.referred_id,
                r.status,
                r.reward_amount,
                format_ts(&r.created_at),
                r.completed_at.as_ref().map(format_ts),
            ],
        )?;
        Ok(())
    }

    pub fn referral(&self, referral_id: &str) -> LedgerResult<Option<Referral>> {
        let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE id = ?1");
        let referral = self
            .conn
            .query_row(&sql, params![referral_id], referral_from_row)
            .optional()?;
        Ok(referral)
    }

    pub fn referral_for_referred(&self, referred_id: &str) -> LedgerResult<Option<Referral>> {
        let sql = format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referred_id = ?1");
        let referral = self
            .conn
            .query_row(&sql, params![referred_id], referral_from_row)
            .optional()?;
        Ok(referral)
    }

    pub fn referrals_by_referrer(&self, referrer_id: &str) -> LedgerResult<Vec<Referral>> {
        let sql = format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![referrer_id], referral_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Pending → completed. Returns 0 if the referral is missing or was
    /// already completed, so a lost race is visible to the caller.
    pub fn mark_referral_completed(&self, referral_id: &str, at: &Timestamp) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE referrals SET status = ?1, completed_at = ?2
             WHERE id = ?3 AND status = ?4",
            params![
                ReferralStatus::Completed,
                format_ts(at),
                referral_id,
                ReferralStatus::Pending,
            ],
        )?;
        Ok(n)
    }

    pub fn referral_count(&self, referrer_id: &str) -> LedgerResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM referrals WHERE referrer_id = ?1",
            params![referrer_id],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }

    pub fn completed_referral_count(&self, referrer_id: &str) -> LedgerResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM referrals WHERE referrer_id = ?1 AND status = ?2",
            params![referrer_id, ReferralStatus::Completed],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }
}
