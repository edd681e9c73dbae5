//! Audit events.
//!
//! RULE: every ledger state change appends exactly one LedgerEvent to
//! event_log, in the same transaction as the change itself.

use crate::types::{EntityId, UserId};
use serde::{Deserialize, Serialize};

/// Variants are append-only; stored payloads must keep deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    // ── Profiles ──────────────────────────────────
    ProfileCreated {
        user_id: UserId,
    },
    ProfileUpdated {
        user_id: UserId,
    },
    ReferralCodeIssued {
        user_id: UserId,
        code:    String,
    },

    // ── Referrals ─────────────────────────────────
    ReferralCreated {
        referral_id: EntityId,
        referrer_id: UserId,
        referred_id: UserId,
    },
    ReferralCompleted {
        referral_id: EntityId,
        referrer_id: UserId,
    },
    RewardIssued {
        reward_id:   EntityId,
        user_id:     UserId,
        reward_type: String,
        amount:      f64,
    },

    // ── Groups ────────────────────────────────────
    GroupCreated {
        group_id: EntityId,
        host_id:  UserId,
    },
    MemberJoined {
        group_id: EntityId,
        user_id:  UserId,
        share:    f64,
    },
    MemberLeft {
        group_id: EntityId,
        user_id:  UserId,
    },
    PaymentRecorded {
        payment_id: EntityId,
        group_id:   EntityId,
        amount:     f64,
    },
    ActivityRecorded {
        activity_id: EntityId,
        user_id:     UserId,
    },
    WaitlistJoined {
        entry_id: EntityId,
    },
}

impl LedgerEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ProfileCreated { .. }     => "profile_created",
            Self::ProfileUpdated { .. }     => "profile_updated",
            Self::ReferralCodeIssued { .. } => "referral_code_issued",
            Self::ReferralCreated { .. }    => "referral_created",
            Self::ReferralCompleted { .. }  => "referral_completed",
            Self::RewardIssued { .. }       => "reward_issued",
            Self::GroupCreated { .. }       => "group_created",
            Self::MemberJoined { .. }       => "member_joined",
            Self::MemberLeft { .. }         => "member_left",
            Self::PaymentRecorded { .. }    => "payment_recorded",
            Self::ActivityRecorded { .. }   => "activity_recorded",
            Self::WaitlistJoined { .. }     => "waitlist_joined",
        }
    }

    /// The row the event is filed under in event_log.
    pub fn entity_id(&self) -> &str {
        match self {
            Self::ProfileCreated { user_id }
            | Self::ProfileUpdated { user_id }
            | Self::ReferralCodeIssued { user_id, .. } => user_id,
            Self::ReferralCreated { referral_id, .. }
            | Self::ReferralCompleted { referral_id, .. } => referral_id,
            Self::RewardIssued { reward_id, .. } => reward_id,
            Self::GroupCreated { group_id, .. }
            | Self::MemberJoined { group_id, .. }
            | Self::MemberLeft { group_id, .. } => group_id,
            Self::PaymentRecorded { payment_id, .. } => payment_id,
            Self::ActivityRecorded { activity_id, .. } => activity_id,
            Self::WaitlistJoined { entry_id } => entry_id,
        }
    }
}

/// A persisted event_log row.
#[derive(Debug, Clone)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub entity_id:  EntityId,
    pub event_type: String,
    pub payload:    String,
    pub created_at: String,
}

impl EventLogEntry {
    pub fn decode(&self) -> serde_json::Result<LedgerEvent> {
        serde_json::from_str(&self.payload)
    }
}
