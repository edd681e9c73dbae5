//! Tier reward engine: one-time bonuses for referral milestones.
//!
//! Policy: each evaluation attempts only the single highest tier the user
//! has reached. Lower tiers skipped over in one jump are never granted
//! afterwards (a count going 2 → 10 yields TIER_3 alone).
//!
//! Uniqueness of (user, tier) is enforced by idx_rewards_user_tier; a
//! violation of that index is the authoritative AlreadyAwarded signal.

use crate::{
    clock::Clock,
    config::{ReferralProgramConfig, TierRule},
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::{self, LedgerStore},
    types::{new_id, EntityId, Timestamp, UserId},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tier {
    #[serde(rename = "TIER_1")]
    Tier1,
    #[serde(rename = "TIER_2")]
    Tier2,
    #[serde(rename = "TIER_3")]
    Tier3,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tier1 => "TIER_1",
            Self::Tier2 => "TIER_2",
            Self::Tier3 => "TIER_3",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Tier1 => "Tier 1",
            Self::Tier2 => "Tier 2",
            Self::Tier3 => "Tier 3",
        }
    }

    pub fn reward_type(self) -> RewardType {
        match self {
            Self::Tier1 => RewardType::Tier1,
            Self::Tier2 => RewardType::Tier2,
            Self::Tier3 => RewardType::Tier3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardType {
    /// Paid once per completed referral.
    Signup,
    #[serde(rename = "TIER_1")]
    Tier1,
    #[serde(rename = "TIER_2")]
    Tier2,
    #[serde(rename = "TIER_3")]
    Tier3,
}

impl RewardType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Signup => "SIGNUP",
            Self::Tier1  => "TIER_1",
            Self::Tier2  => "TIER_2",
            Self::Tier3  => "TIER_3",
        }
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SIGNUP" => Ok(Self::Signup),
            "TIER_1" => Ok(Self::Tier1),
            "TIER_2" => Ok(Self::Tier2),
            "TIER_3" => Ok(Self::Tier3),
            other => Err(format!("unknown reward type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RewardStatus {
    Pending,
    Paid,
}

impl RewardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid    => "PAID",
        }
    }
}

impl FromStr for RewardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID"    => Ok(Self::Paid),
            other => Err(format!("unknown reward status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferralReward {
    pub id:          EntityId,
    pub user_id:     UserId,
    /// Originating referral; set for SIGNUP rewards only.
    pub referral_id: Option<EntityId>,
    pub amount:      f64,
    pub reward_type: RewardType,
    pub status:      RewardStatus,
    pub created_at:  Timestamp,
    pub paid_at:     Option<Timestamp>,
}

impl ReferralReward {
    pub fn pending(
        user_id: &str,
        referral_id: Option<&str>,
        amount: f64,
        reward_type: RewardType,
        now: Timestamp,
    ) -> Self {
        Self {
            id:          new_id(),
            user_id:     user_id.to_string(),
            referral_id: referral_id.map(str::to_string),
            amount,
            reward_type,
            status:      RewardStatus::Pending,
            created_at:  now,
            paid_at:     None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTier {
    pub tier:             Tier,
    pub display_name:     String,
    pub referrals_needed: u32,
}

/// The lowest tier whose threshold lies strictly above `completed`,
/// or None once the top tier is reached. `rules` must be ascending.
///
/// Thresholds compare with `>=`: at exactly 3 completions TIER_1 counts
/// as reached and the next target is TIER_2.
pub fn next_tier(completed: u32, rules: &[TierRule]) -> Option<NextTier> {
    rules
        .iter()
        .find(|rule| completed < rule.threshold)
        .map(|rule| NextTier {
            tier:             rule.tier,
            display_name:     rule.tier.display_name().to_string(),
            referrals_needed: rule.threshold - completed,
        })
}

/// The highest tier reached at `completed`, if any.
pub fn highest_reached(completed: u32, rules: &[TierRule]) -> Option<&TierRule> {
    rules.iter().rev().find(|rule| completed >= rule.threshold)
}

pub struct TierRewards<'a> {
    store:  &'a LedgerStore,
    config: &'a ReferralProgramConfig,
    clock:  &'a dyn Clock,
}

impl<'a> TierRewards<'a> {
    pub fn new(store: &'a LedgerStore, config: &'a ReferralProgramConfig, clock: &'a dyn Clock) -> Self {
        Self { store, config, clock }
    }

    pub fn next_tier(&self, completed: u32) -> Option<NextTier> {
        next_tier(completed, &self.config.tiers)
    }

    /// Recount the user's completed referrals and grant the highest tier
    /// reached, if it has not been granted yet.
    ///
    /// Returns the new reward, or None when no tier is reached or the
    /// reached tier was already granted.
    pub fn check_and_award_tier_rewards(&self, user_id: &str) -> LedgerResult<Option<ReferralReward>> {
        let completed = self.store.completed_referral_count(user_id)?;
        let Some(rule) = highest_reached(completed, &self.config.tiers) else {
            log::debug!("{user_id}: {completed} completed referrals, no tier reached");
            return Ok(None);
        };

        match self.award_tier_reward(user_id, rule.tier, rule.bonus_amount) {
            Ok(reward) => Ok(Some(reward)),
            Err(LedgerError::AlreadyAwarded { .. }) => {
                log::debug!(
                    "{user_id}: {completed} completed referrals, {} already granted",
                    rule.tier
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn award_tier_reward(&self, user_id: &str, tier: Tier, amount: f64) -> LedgerResult<ReferralReward> {
        let now = self.clock.now();
        let reward = ReferralReward::pending(user_id, None, amount, tier.reward_type(), now);

        let issued = self.store.atomically(|store| {
            store.insert_reward(&reward)?;
            store.append_event(
                &LedgerEvent::RewardIssued {
                    reward_id:   reward.id.clone(),
                    user_id:     user_id.to_string(),
                    reward_type: tier.as_str().to_string(),
                    amount,
                },
                &now,
            )
        });
        match issued {
            Ok(()) => {}
            Err(e) if store::is_unique_violation(&e) => {
                return Err(LedgerError::AlreadyAwarded {
                    user_id: user_id.to_string(),
                    tier:    tier.as_str().to_string(),
                });
            }
            Err(e) => return Err(e),
        }
        log::info!("{user_id}: awarded {tier} bonus of {amount:.2}");
        Ok(reward)
    }
}
