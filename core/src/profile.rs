//! User profile records.

use crate::{
    clock::Clock,
    error::{LedgerError, LedgerResult},
    event::LedgerEvent,
    store::LedgerStore,
    types::{Timestamp, UserId},
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id:            UserId,
    pub full_name:     Option<String>,
    pub avatar_url:    Option<String>,
    pub currency:      String,
    /// Issued lazily; immutable once set.
    pub referral_code: Option<String>,
    pub created_at:    Timestamp,
    pub updated_at:    Timestamp,
}

/// Fields supplied at sign-up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewProfile {
    pub full_name:  Option<String>,
    pub avatar_url: Option<String>,
    pub currency:   Option<String>,
}

/// Partial update. Never carries the referral code; only the code issuer
/// writes that column.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub full_name:  Option<String>,
    pub avatar_url: Option<String>,
    pub currency:   Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.avatar_url.is_none() && self.currency.is_none()
    }

    pub fn apply(&self, profile: &mut Profile, now: Timestamp) {
        if let Some(name) = &self.full_name {
            profile.full_name = Some(name.clone());
        }
        if let Some(url) = &self.avatar_url {
            profile.avatar_url = Some(url.clone());
        }
        if let Some(currency) = &self.currency {
            profile.currency = currency.clone();
        }
        profile.updated_at = now;
    }
}

pub struct Profiles<'a> {
    store: &'a LedgerStore,
    clock: &'a dyn Clock,
}

impl<'a> Profiles<'a> {
    pub fn new(store: &'a LedgerStore, clock: &'a dyn Clock) -> Self {
        Self { store, clock }
    }

    pub fn create_profile(&self, user_id: &str, new: NewProfile) -> LedgerResult<Profile> {
        let now = self.clock.now();
        let profile = Profile {
            id:            user_id.to_string(),
            full_name:     new.full_name,
            avatar_url:    new.avatar_url,
            currency:      new.currency.unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            referral_code: None,
            created_at:    now,
            updated_at:    now,
        };
        self.store.atomically(|store| {
            store.insert_profile(&profile)?;
            store.append_event(&LedgerEvent::ProfileCreated { user_id: profile.id.clone() }, &now)
        })?;
        log::info!("Profile {user_id} created");
        Ok(profile)
    }

    pub fn get_profile(&self, user_id: &str) -> LedgerResult<Profile> {
        self.store
            .profile(user_id)?
            .ok_or_else(|| LedgerError::not_found("Profile", user_id))
    }

    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> LedgerResult<Profile> {
        let mut profile = self.get_profile(user_id)?;
        if update.is_empty() {
            return Ok(profile);
        }
        let now = self.clock.now();
        update.apply(&mut profile, now);
        self.store.atomically(|store| {
            store.update_profile(&profile)?;
            store.append_event(&LedgerEvent::ProfileUpdated { user_id: profile.id.clone() }, &now)
        })?;
        Ok(profile)
    }
}
