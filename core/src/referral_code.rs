//! Referral code issuer.
//!
//! One short alphanumeric code per profile, issued lazily and never
//! changed afterwards. idx_profiles_referral_code keeps codes unique; a
//! collision draws a fresh code.

use crate::{
    clock::Clock,
    config::ReferralProgramConfig,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    rng::CodeRng,
    store::{self, LedgerStore},
};
use std::cell::RefCell;

pub struct ReferralCodeIssuer<'a> {
    store:  &'a LedgerStore,
    config: &'a ReferralProgramConfig,
    clock:  &'a dyn Clock,
    rng:    &'a RefCell<CodeRng>,
}

impl<'a> ReferralCodeIssuer<'a> {
    pub fn new(
        store: &'a LedgerStore,
        config: &'a ReferralProgramConfig,
        clock: &'a dyn Clock,
        rng: &'a RefCell<CodeRng>,
    ) -> Self {
        Self { store, config, clock, rng }
    }

    /// The profile's code, issuing one first if it has none.
    pub fn get_or_create_referral_code(&self, user_id: &str) -> LedgerResult<String> {
        let profile = self
            .store
            .profile(user_id)?
            .ok_or_else(|| LedgerError::not_found("Profile", user_id))?;
        match profile.referral_code {
            Some(code) => Ok(code),
            None => self.issue(user_id),
        }
    }

    /// Issue codes to every profile that still lacks one.
    /// A profile that fails is logged and skipped; the rest still get codes.
    /// Returns how many profiles were updated.
    pub fn backfill_referral_codes(&self) -> LedgerResult<usize> {
        let missing = self.store.profiles_without_code()?;
        let mut updated = 0;
        for user_id in &missing {
            match self.issue(user_id) {
                Ok(code) => {
                    log::info!("Set referral code for user {user_id}: {code}");
                    updated += 1;
                }
                Err(e) => log::error!("Failed to set referral code for user {user_id}: {e}"),
            }
        }
        log::info!("Backfill done: {updated} of {} profiles updated", missing.len());
        Ok(updated)
    }

    fn issue(&self, user_id: &str) -> LedgerResult<String> {
        let attempts = self.config.code_attempts;
        for attempt in 1..=attempts {
            let code = self.rng.borrow_mut().next_code(self.config.code_length);
            let now = self.clock.now();

            let written = self.store.atomically(|store| {
                let n = store.set_referral_code_if_absent(user_id, &code, &now)?;
                if n == 1 {
                    store.append_event(
                        &LedgerEvent::ReferralCodeIssued {
                            user_id: user_id.to_string(),
                            code:    code.clone(),
                        },
                        &now,
                    )?;
                }
                Ok(n)
            });

            match written {
                Ok(1) => {
                    log::debug!("{user_id}: issued referral code {code} (attempt {attempt})");
                    return Ok(code);
                }
                Ok(_) => {
                    // Either a code appeared since the read or the profile vanished.
                    return self
                        .store
                        .profile(user_id)?
                        .and_then(|p| p.referral_code)
                        .ok_or_else(|| LedgerError::not_found("Profile", user_id));
                }
                Err(e) if store::is_unique_violation(&e) => {
                    log::warn!("{user_id}: referral code {code} already taken (attempt {attempt}/{attempts})");
                }
                Err(e) => return Err(e),
            }
        }
        Err(LedgerError::CodeSpaceExhausted { user_id: user_id.to_string(), attempts })
    }
}
