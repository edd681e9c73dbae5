//! The engine owns the store, configuration, clock and code RNG, and
//! hands out borrowed views of each ledger component.
//!
//! RULES:
//!   - Components never hold their own connection; they borrow the engine's.
//!   - All timestamps come from the engine's clock.
//!   - Multi-step flows (sign-up, profile completion) run in one savepoint.

use crate::{
    catalog::Catalog,
    clock::{Clock, ManualClock, SystemClock},
    config::EngineConfig,
    error::LedgerResult,
    event::EventLogEntry,
    group_ledger::GroupLedger,
    profile::{NewProfile, Profile, ProfileUpdate, Profiles},
    referral_code::ReferralCodeIssuer,
    referral_ledger::{CompletedReferral, Referral, ReferralLedger, ReferralStatus},
    rng::CodeRng,
    store::LedgerStore,
    tier_rewards::TierRewards,
};
use chrono::{TimeZone, Utc};
use serde::Serialize;
use std::{cell::RefCell, rc::Rc};

#[derive(Debug, Clone, Serialize)]
pub struct SignUp {
    pub profile:  Profile,
    pub referral: Option<Referral>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProfileCompletion {
    pub profile:   Profile,
    /// Set when completing the profile also completed the user's referral.
    pub completed: Option<CompletedReferral>,
}

pub struct SplitoraEngine {
    store:    LedgerStore,
    config:   EngineConfig,
    clock:    Rc<dyn Clock>,
    code_rng: RefCell<CodeRng>,
}

impl SplitoraEngine {
    pub fn new(store: LedgerStore, config: EngineConfig, clock: Rc<dyn Clock>, code_rng: CodeRng) -> Self {
        Self { store, config, clock, code_rng: RefCell::new(code_rng) }
    }

    /// Production wiring: migrated store, config from `data_dir`, system
    /// clock, entropy-seeded codes.
    pub fn build(store: LedgerStore, data_dir: &str) -> anyhow::Result<Self> {
        store.migrate()?;
        let config = EngineConfig::load(data_dir)?;
        Ok(Self::new(store, config, Rc::new(SystemClock), CodeRng::from_entropy()))
    }

    /// In-memory engine with test defaults, a manual clock starting at
    /// 2024-01-01 and seeded codes.
    pub fn build_test(seed: u64) -> LedgerResult<Self> {
        let store = LedgerStore::in_memory()?;
        store.migrate()?;
        let start = Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .ok_or_else(|| anyhow::anyhow!("invalid test clock start"))?;
        Ok(Self::new(
            store,
            EngineConfig::default_test(),
            Rc::new(ManualClock::new(start)),
            CodeRng::from_seed(seed),
        ))
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    // ── Components ─────────────────────────────────────────────────

    pub fn profiles(&self) -> Profiles<'_> {
        Profiles::new(&self.store, self.clock())
    }

    pub fn codes(&self) -> ReferralCodeIssuer<'_> {
        ReferralCodeIssuer::new(&self.store, &self.config.referral, self.clock(), &self.code_rng)
    }

    pub fn referrals(&self) -> ReferralLedger<'_> {
        ReferralLedger::new(&self.store, &self.config.referral, self.clock())
    }

    pub fn tiers(&self) -> TierRewards<'_> {
        TierRewards::new(&self.store, &self.config.referral, self.clock())
    }

    pub fn catalog(&self) -> Catalog<'_> {
        Catalog::new(&self.config.catalog)
    }

    pub fn groups(&self) -> GroupLedger<'_> {
        GroupLedger::new(&self.store, self.catalog(), self.clock())
    }

    // ── Flows ──────────────────────────────────────────────────────

    /// Create the profile, issue its own referral code, and record the
    /// referral when the user arrived with someone else's code. Nothing is
    /// kept if any step fails.
    pub fn sign_up(&self, user_id: &str, new: NewProfile, referral_code: Option<&str>) -> LedgerResult<SignUp> {
        let signed_up = self.store.atomically(|_| {
            self.profiles().create_profile(user_id, new)?;
            self.codes().get_or_create_referral_code(user_id)?;
            let referral = match referral_code.map(str::trim).filter(|c| !c.is_empty()) {
                Some(code) => Some(self.referrals().create_referral_from_code(code, user_id)?),
                None => None,
            };
            let profile = self.profiles().get_profile(user_id)?;
            Ok(SignUp { profile, referral })
        })?;
        log::info!(
            "{user_id} signed up{}",
            if signed_up.referral.is_some() { " via referral" } else { "" }
        );
        Ok(signed_up)
    }

    /// Apply the update and, if the user is still a pending referral,
    /// complete it.
    pub fn complete_profile(&self, user_id: &str, update: &ProfileUpdate) -> LedgerResult<ProfileCompletion> {
        self.store.atomically(|store| {
            let profile = self.profiles().update_profile(user_id, update)?;
            let completed = match store.referral_for_referred(user_id)? {
                Some(r) if r.status == ReferralStatus::Pending => {
                    Some(self.referrals().complete_referral(&r.id)?)
                }
                _ => None,
            };
            Ok(ProfileCompletion { profile, completed })
        })
    }

    pub fn events_for(&self, entity_id: &str) -> LedgerResult<Vec<EventLogEntry>> {
        self.store.events_for_entity(entity_id)
    }
}
