use super::{ts_col, LedgerStore};
use crate::{
    error::LedgerResult,
    profile::Profile,
    types::{format_ts, Timestamp},
};
use rusqlite::{params, OptionalExtension, Row};

const PROFILE_COLUMNS: &str =
    "id, full_name, avatar_url, currency, referral_code, created_at, updated_at";

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id:            row.get(0)?,
        full_name:     row.get(1)?,
        avatar_url:    row.get(2)?,
        currency:      row.get(3)?,
        referral_code: row.get(4)?,
        created_at:    ts_col(row, 5)?,
        updated_at:    ts_col(row, 6)?,
    })
}

impl LedgerStore {
    // ── Profiles ──────────────────────────────────────────────────

    pub fn insert_profile(&self, p: &Profile) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO profiles (
                id, full_name, avatar_url, currency, referral_code, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                p.id,
                p.full_name,
                p.avatar_url,
                p.currency,
                p.referral_code,
                format_ts(&p.created_at),
                format_ts(&p.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn profile(&self, user_id: &str) -> LedgerResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ?1");
        let profile = self
            .conn
            .query_row(&sql, params![user_id], profile_from_row)
            .optional()?;
        Ok(profile)
    }

    pub fn profile_by_code(&self, code: &str) -> LedgerResult<Option<Profile>> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE referral_code = ?1");
        let profile = self
            .conn
            .query_row(&sql, params![code], profile_from_row)
            .optional()?;
        Ok(profile)
    }

    /// Writes the mutable profile columns. The referral code is never
    /// touched here.
    pub fn update_profile(&self, p: &Profile) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE profiles
             SET full_name = ?1, avatar_url = ?2, currency = ?3, updated_at = ?4
             WHERE id = ?5",
            params![p.full_name, p.avatar_url, p.currency, format_ts(&p.updated_at), p.id],
        )?;
        Ok(n)
    }

    /// Sets the referral code only if the profile has none yet.
    /// Returns the number of rows changed (0 when a code was already set
    /// or the profile does not exist).
    pub fn set_referral_code_if_absent(
        &self,
        user_id: &str,
        code: &str,
        at: &Timestamp,
    ) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE profiles SET referral_code = ?1, updated_at = ?2
             WHERE id = ?3 AND referral_code IS NULL",
            params![code, format_ts(at), user_id],
        )?;
        Ok(n)
    }

    pub fn profiles_without_code(&self) -> LedgerResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM profiles WHERE referral_code IS NULL ORDER BY created_at ASC, id ASC",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }
}
