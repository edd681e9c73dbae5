use super::{ts_col, LedgerStore};
use crate::{
    error::LedgerResult,
    group_ledger::{Activity, MemberStatus, Payment, SubscriptionGroup, SubscriptionMember},
    types::format_ts,
};
use rusqlite::{params, OptionalExtension, Row};

const GROUP_COLUMNS: &str = "g.id, g.name, g.description, g.max_members, g.price, g.status,
     g.host_id, g.remaining_spaces, g.location, g.created_at, g.updated_at";

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriptionGroup> {
    Ok(SubscriptionGroup {
        id:               row.get(0)?,
        name:             row.get(1)?,
        description:      row.get(2)?,
        max_members:      row.get::<_, i64>(3)? as u32,
        price:            row.get(4)?,
        status:           row.get(5)?,
        host_id:          row.get(6)?,
        remaining_spaces: row.get::<_, i64>(7)? as u32,
        location:         row.get(8)?,
        created_at:       ts_col(row, 9)?,
        updated_at:       ts_col(row, 10)?,
    })
}

fn member_from_row(row: &Row<'_>) -> rusqlite::Result<SubscriptionMember> {
    Ok(SubscriptionMember {
        id:        row.get(0)?,
        user_id:   row.get(1)?,
        group_id:  row.get(2)?,
        share:     row.get(3)?,
        status:    row.get(4)?,
        joined_at: ts_col(row, 5)?,
    })
}

impl LedgerStore {
    // ── Groups ────────────────────────────────────────────────────

    pub fn insert_group(&self, g: &SubscriptionGroup) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO subscription_groups (
                id, name, description, max_members, price, status,
                host_id, remaining_spaces, location, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                g.id,
                g.name,
                g.description,
                g.max_members as i64,
                g.price,
                g.status,
                g.host_id,
                g.remaining_spaces as i64,
                g.location,
                format_ts(&g.created_at),
                format_ts(&g.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn group(&self, group_id: &str) -> LedgerResult<Option<SubscriptionGroup>> {
        let sql = format!("SELECT {GROUP_COLUMNS} FROM subscription_groups g WHERE g.id = ?1");
        let group = self
            .conn
            .query_row(&sql, params![group_id], group_from_row)
            .optional()?;
        Ok(group)
    }

    pub fn groups_for_member(&self, user_id: &str) -> LedgerResult<Vec<SubscriptionGroup>> {
        let sql = format!(
            "SELECT {GROUP_COLUMNS}
             FROM subscription_members m
             JOIN subscription_groups g ON g.id = m.group_id
             WHERE m.user_id = ?1 AND m.status = ?2
             ORDER BY m.joined_at ASC"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![user_id, MemberStatus::Active], group_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Claim one open seat. Returns 0 when the group is already full.
    pub fn take_space(&self, group_id: &str) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE subscription_groups SET remaining_spaces = remaining_spaces - 1
             WHERE id = ?1 AND remaining_spaces > 0",
            params![group_id],
        )?;
        Ok(n)
    }

    /// Return one seat, never above max_members - 1.
    pub fn release_space(&self, group_id: &str) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE subscription_groups SET remaining_spaces = remaining_spaces + 1
             WHERE id = ?1 AND remaining_spaces < max_members - 1",
            params![group_id],
        )?;
        Ok(n)
    }

    // ── Members ───────────────────────────────────────────────────

    pub fn insert_member(&self, m: &SubscriptionMember) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO subscription_members (id, user_id, group_id, share, status, joined_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![m.id, m.user_id, m.group_id, m.share, m.status, format_ts(&m.joined_at)],
        )?;
        Ok(())
    }

    pub fn deactivate_member(&self, user_id: &str, group_id: &str) -> LedgerResult<usize> {
        let n = self.conn.execute(
            "UPDATE subscription_members SET status = ?1
             WHERE user_id = ?2 AND group_id = ?3 AND status = ?4",
            params![MemberStatus::Inactive, user_id, group_id, MemberStatus::Active],
        )?;
        Ok(n)
    }

    pub fn active_members(&self, group_id: &str) -> LedgerResult<Vec<SubscriptionMember>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, group_id, share, status, joined_at
             FROM subscription_members WHERE group_id = ?1 AND status = ?2
             ORDER BY joined_at ASC",
        )?;
        let rows = stmt.query_map(params![group_id, MemberStatus::Active], member_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Payments ──────────────────────────────────────────────────

    pub fn insert_payment(&self, p: &Payment) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO payments (id, amount, status, user_id, group_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                p.id,
                p.amount,
                p.status,
                p.user_id,
                p.group_id,
                format_ts(&p.created_at),
                format_ts(&p.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn payments_for_group(&self, group_id: &str) -> LedgerResult<Vec<Payment>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, amount, status, user_id, group_id, created_at, updated_at
             FROM payments WHERE group_id = ?1
             ORDER BY created_at ASC",
        )?;
        let rows = stmt.query_map(params![group_id], |row| {
            Ok(Payment {
                id:         row.get(0)?,
                amount:     row.get(1)?,
                status:     row.get(2)?,
                user_id:    row.get(3)?,
                group_id:   row.get(4)?,
                created_at: ts_col(row, 5)?,
                updated_at: ts_col(row, 6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ── Activities ────────────────────────────────────────────────

    pub fn insert_activity(&self, a: &Activity) -> LedgerResult<()> {
        self.conn.execute(
            "INSERT INTO activities (id, kind, description, user_id, group_id, amount, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                a.id,
                a.kind,
                a.description,
                a.user_id,
                a.group_id,
                a.amount,
                format_ts(&a.created_at),
            ],
        )?;
        Ok(())
    }

    pub fn activities_for_user(&self, user_id: &str) -> LedgerResult<Vec<Activity>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, kind, description, user_id, group_id, amount, created_at
             FROM activities WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(Activity {
                id:          row.get(0)?,
                kind:        row.get(1)?,
                description: row.get(2)?,
                user_id:     row.get(3)?,
                group_id:    row.get(4)?,
                amount:      row.get(5)?,
                created_at:  ts_col(row, 6)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}
