//! Referral ledger: referrer → referred relationships and their rewards.
//!
//! Lifecycle:
//!   pending → completed   (exactly once)
//!
//! Completing a referral writes three things in one savepoint: the status
//! change, the referrer's SIGNUP reward, and any tier bonus the new count
//! unlocks. A failure in any step leaves the referral pending.

use crate::{
    clock::Clock,
    config::ReferralProgramConfig,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{self, LedgerStore},
    tier_rewards::{NextTier, ReferralReward, RewardType, TierRewards},
    types::{new_id, EntityId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    Completed,
}

impl ReferralStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending   => "pending",
            Self::Completed => "completed",
        }
    }
}

impl FromStr for ReferralStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending"   => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown referral status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Referral {
    pub id:            EntityId,
    pub referrer_id:   UserId,
    pub referred_id:   UserId,
    pub status:        ReferralStatus,
    /// Fixed at creation from the program's signup reward amount.
    pub reward_amount: f64,
    pub created_at:    Timestamp,
    pub completed_at:  Option<Timestamp>,
}

/// Everything a successful completion wrote.
#[derive(Debug, Clone, Serialize)]
pub struct CompletedReferral {
    pub referral:      Referral,
    pub signup_reward: ReferralReward,
    pub tier_reward:   Option<ReferralReward>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralStats {
    pub total_referrals:     u32,
    pub completed_referrals: u32,
    pub pending_referrals:   u32,
    /// Pending and paid rewards alike.
    pub total_rewards:       f64,
    pub next_tier:           Option<NextTier>,
    /// Newest first.
    pub rewards:             Vec<ReferralReward>,
}

pub struct ReferralLedger<'a> {
    store:  &'a LedgerStore,
    config: &'a ReferralProgramConfig,
    clock:  &'a dyn Clock,
}

impl<'a> ReferralLedger<'a> {
    pub fn new(store: &'a LedgerStore, config: &'a ReferralProgramConfig, clock: &'a dyn Clock) -> Self {
        Self { store, config, clock }
    }

    fn tiers(&self) -> TierRewards<'a> {
        TierRewards::new(self.store, self.config, self.clock)
    }

    /// Resolve `code` to its owner and record a pending referral for
    /// `referred_id`.
    pub fn create_referral_from_code(&self, code: &str, referred_id: &str) -> LedgerResult<Referral> {
        let referrer = self
            .store
            .profile_by_code(code)?
            .ok_or_else(|| LedgerError::InvalidCode { code: code.to_string() })?;
        self.create_referral(&referrer.id, referred_id)
    }

    pub fn create_referral(&self, referrer_id: &str, referred_id: &str) -> LedgerResult<Referral> {
        if referrer_id == referred_id {
            return Err(LedgerError::SelfReferral { user_id: referred_id.to_string() });
        }

        let now = self.clock.now();
        let referral = Referral {
            id:            new_id(),
            referrer_id:   referrer_id.to_string(),
            referred_id:   referred_id.to_string(),
            status:        ReferralStatus::Pending,
            reward_amount: self.config.signup_reward_amount,
            created_at:    now,
            completed_at:  None,
        };

        self.store.atomically(|store| {
            match store.insert_referral(&referral) {
                Ok(()) => {}
                Err(e) if store::is_unique_violation(&e) => {
                    return Err(LedgerError::DuplicateReferral {
                        referred_id: referred_id.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
            store.append_event(
                &LedgerEvent::ReferralCreated {
                    referral_id: referral.id.clone(),
                    referrer_id: referral.referrer_id.clone(),
                    referred_id: referral.referred_id.clone(),
                },
                &now,
            )
        })?;

        log::info!("Referral {} created: {referrer_id} → {referred_id}", referral.id);
        Ok(referral)
    }

    pub fn complete_referral(&self, referral_id: &str) -> LedgerResult<CompletedReferral> {
        let completed = self.store.atomically(|store| {
            let mut referral = store
                .referral(referral_id)?
                .ok_or_else(|| LedgerError::not_found("Referral", referral_id))?;
            if referral.status == ReferralStatus::Completed {
                return Err(LedgerError::AlreadyCompleted { referral_id: referral_id.to_string() });
            }

            let now = self.clock.now();
            if store.mark_referral_completed(referral_id, &now)? == 0 {
                // Completed by another connection between the read and the write.
                return Err(LedgerError::AlreadyCompleted { referral_id: referral_id.to_string() });
            }
            referral.status = ReferralStatus::Completed;
            referral.completed_at = Some(now);
            store.append_event(
                &LedgerEvent::ReferralCompleted {
                    referral_id: referral.id.clone(),
                    referrer_id: referral.referrer_id.clone(),
                },
                &now,
            )?;

            let signup_reward = ReferralReward::pending(
                &referral.referrer_id,
                Some(&referral.id),
                referral.reward_amount,
                RewardType::Signup,
                now,
            );
            match store.insert_reward(&signup_reward) {
                Ok(()) => {}
                Err(e) if store::is_unique_violation(&e) => {
                    return Err(LedgerError::AlreadyCompleted { referral_id: referral_id.to_string() });
                }
                Err(e) => return Err(e),
            }
            store.append_event(
                &LedgerEvent::RewardIssued {
                    reward_id:   signup_reward.id.clone(),
                    user_id:     referral.referrer_id.clone(),
                    reward_type: RewardType::Signup.as_str().to_string(),
                    amount:      signup_reward.amount,
                },
                &now,
            )?;

            let tier_reward = self.tiers().check_and_award_tier_rewards(&referral.referrer_id)?;

            Ok(CompletedReferral { referral, signup_reward, tier_reward })
        })?;

        log::info!(
            "Referral {referral_id} completed; {} earned {:.2}",
            completed.referral.referrer_id,
            completed.signup_reward.amount
        );
        Ok(completed)
    }

    /// Complete the pending referral recorded for `referred_id`.
    pub fn complete_referral_for(&self, referred_id: &str) -> LedgerResult<CompletedReferral> {
        let referral = self
            .store
            .referral_for_referred(referred_id)?
            .ok_or_else(|| LedgerError::not_found("Referral for user", referred_id))?;
        self.complete_referral(&referral.id)
    }

    pub fn referrals_by_referrer(&self, referrer_id: &str) -> LedgerResult<Vec<Referral>> {
        self.store.referrals_by_referrer(referrer_id)
    }

    pub fn get_referral_stats(&self, user_id: &str) -> LedgerResult<ReferralStats> {
        let total = self.store.referral_count(user_id)?;
        let completed = self.store.completed_referral_count(user_id)?;
        let rewards = self.store.rewards_for_user(user_id)?;
        let total_rewards = rewards.iter().map(|r| r.amount).sum();
        log::debug!("{user_id}: {completed}/{total} referrals completed");

        Ok(ReferralStats {
            total_referrals:     total,
            completed_referrals: completed,
            pending_referrals:   total.saturating_sub(completed),
            total_rewards,
            next_tier:           self.tiers().next_tier(completed),
            rewards,
        })
    }
}
