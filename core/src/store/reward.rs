use super::{opt_ts_col, ts_col, LedgerStore};
use crate::{
    error::LedgerResult,
    tier_rewards::{ReferralReward, RewardType},
    types::format_ts,
};
use rusqlite::{params, OptionalExtension, Row};

const REWARD_COLUMNS: &str =
    "id, user_id, referral_id, amount, reward_type, status, created_at, paid_at";

fn reward_from_row(row: &Row<'_>) -> rusqlite::Result<ReferralReward> {
    Ok(ReferralReward {
        id:          row.get(0)?,
        user_id:     row.get(1)?,
        referral_id: row.get(2)?,
        amount:      row.get(3)?,
        reward_type: row.get(4)?,
        status:      row.get(5)?,
        created_at:  ts_col(row, 6)?,
        paid_at:     opt_ts_col(row, 7)?,
    })
}

impl LedgerStore {
    // ── Referral rewards ──────────────────────────────────────────

    pub fn insert_reward(&self, r: &ReferralReward) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO referral_rewards (
                id, user_id, referral_id, amount, reward_type, status, created_at, paid_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                r.id,
                r.user_id,
                r.referral_id,
                r.amount,
                r.reward_type,
                r.status,
                format_ts(&r.created_at),
                r.paid_at.as_ref().map(format_ts),
            ],
        )?;
        Ok(())
    }

    /// Newest first.
    pub fn rewards_for_user(&self, user_id: &str) -> LedgerResult<Vec<ReferralReward>> {
        let sql = format!(
            "SELECT {REWARD_COLUMNS} FROM referral_rewards WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id], reward_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn reward_count(&self, user_id: &str, reward_type: RewardType) -> LedgerResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM referral_rewards WHERE user_id = ?1 AND reward_type = ?2",
            params![user_id, reward_type],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }

    pub fn signup_reward_for_referral(&self, referral_id: &str) -> LedgerResult<Option<ReferralReward>> {
        let sql = format!("SELECT {REWARD_COLUMNS} FROM referral_rewards WHERE referral_id = ?1");
        let reward = self
            .conn
            .query_row(&sql, params![referral_id], reward_from_row)
            .optional()?;
        Ok(reward)
    }
}
