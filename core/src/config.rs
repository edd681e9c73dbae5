use crate::{catalog::ServiceProvider, tier_rewards::Tier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierRule {
    pub tier:         Tier,
    /// Completed referrals needed to reach this tier.
    pub threshold:    u32,
    pub bonus_amount: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralProgramConfig {
    /// Fixed onto every referral at creation and paid as the SIGNUP reward.
    pub signup_reward_amount: f64,
    pub code_length:          usize,
    /// Fresh codes drawn before giving up on a collision streak.
    pub code_attempts:        u32,
    /// Ascending by threshold.
    pub tiers:                Vec<TierRule>,
}

impl Default for ReferralProgramConfig {
    fn default() -> Self {
        Self {
            signup_reward_amount: 5.00,
            code_length:          6,
            code_attempts:        8,
            tiers: vec![
                TierRule { tier: Tier::Tier1, threshold: 3,  bonus_amount: 10.00 },
                TierRule { tier: Tier::Tier2, threshold: 5,  bonus_amount: 25.00 },
                TierRule { tier: Tier::Tier3, threshold: 10, bonus_amount: 50.00 },
            ],
        }
    }
}

impl ReferralProgramConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.signup_reward_amount >= 0.0,
            "signup_reward_amount must be non-negative, got {}",
            self.signup_reward_amount
        );
        anyhow::ensure!(self.code_length > 0, "code_length must be > 0");
        anyhow::ensure!(self.code_attempts > 0, "code_attempts must be > 0");
        anyhow::ensure!(!self.tiers.is_empty(), "at least one tier rule is required");
        for pair in self.tiers.windows(2) {
            anyhow::ensure!(
                pair[0].threshold < pair[1].threshold,
                "tier thresholds must be strictly ascending ({} then {})",
                pair[0].threshold,
                pair[1].threshold
            );
        }
        for (i, rule) in self.tiers.iter().enumerate() {
            anyhow::ensure!(
                !self.tiers[..i].iter().any(|r| r.tier == rule.tier),
                "tier {} listed twice",
                rule.tier.as_str()
            );
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    providers: Vec<ServiceProvider>,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub referral: ReferralProgramConfig,
    pub catalog:  Vec<ServiceProvider>,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let referral_path = format!("{data_dir}/referral/referral_program.json");
        let referral_content = std::fs::read_to_string(&referral_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {referral_path}: {e}"))?;
        let referral: ReferralProgramConfig = serde_json::from_str(&referral_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {referral_path}: {e}"))?;
        referral.validate()?;

        let catalog_path = format!("{data_dir}/catalog/service_providers.json");
        let catalog_content = std::fs::read_to_string(&catalog_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {catalog_path}: {e}"))?;
        let catalog_file: CatalogFile = serde_json::from_str(&catalog_content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {catalog_path}: {e}"))?;
        for provider in &catalog_file.providers {
            for plan in &provider.plans {
                anyhow::ensure!(
                    plan.max_members >= 2,
                    "plan {} must allow at least 2 members",
                    plan.id
                );
            }
        }

        log::info!(
            "Loaded referral program ({} tiers) and {} service providers from {data_dir}",
            referral.tiers.len(),
            catalog_file.providers.len()
        );

        Ok(Self { referral, catalog: catalog_file.providers })
    }

    /// Config with hardcoded defaults for use in unit tests.
    pub fn default_test() -> Self {
        Self {
            referral: ReferralProgramConfig::default(),
            catalog:  crate::catalog::test_catalog(),
        }
    }
}
