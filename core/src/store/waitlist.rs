use super::{ts_col, LedgerStore};
use crate::{
    error::LedgerResult,
    group_ledger::{GuestContact, WaitlistEntry},
    types::format_ts,
};
use rusqlite::{params, OptionalExtension, Row};

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<WaitlistEntry> {
    let guest_name: Option<String> = row.get(5)?;
    let guest = match guest_name {
        Some(name) => Some(GuestContact {
            name,
            email: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            phone: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        }),
        None => None,
    };
    Ok(WaitlistEntry {
        id:          row.get(0)?,
        group_id:    row.get(1)?,
        user_id:     row.get(2)?,
        provider_id: row.get(3)?,
        plan_id:     row.get(4)?,
        guest,
        status:      row.get(8)?,
        created_at:  ts_col(row, 9)?,
    })
}

impl LedgerStore {
    // ── Waitlist ──────────────────────────────────────────────────

    pub fn insert_waitlist_entry(&self, e: &WaitlistEntry) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO subscription_waitlist (
                id, group_id, user_id, provider_id, plan_id,
                guest_name, guest_email, guest_phone, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                e.id,
                e.group_id,
                e.user_id,
                e.provider_id,
                e.plan_id,
                e.guest.as_ref().map(|g| g.name.as_str()),
                e.guest.as_ref().map(|g| g.email.as_str()),
                e.guest.as_ref().map(|g| g.phone.as_str()),
                e.status,
                format_ts(&e.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn waitlist_entry(&self, group_id: &str, user_id: &str) -> LedgerResult<Option<WaitlistEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT id, group_id, user_id, provider_id, plan_id,
                        guest_name, guest_email, guest_phone, status, created_at
                 FROM subscription_waitlist WHERE group_id = ?1 AND user_id = ?2",
                params![group_id, user_id],
                entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    pub fn waitlist_count(&self, group_id: &str) -> LedgerResult<u32> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM subscription_waitlist WHERE group_id = ?1",
            params![group_id],
            |row| row.get(0),
        )?;
        Ok(n as u32)
    }
}
