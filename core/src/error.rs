use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid referral code '{code}'")]
    InvalidCode { code: String },

    #[error("User '{referred_id}' already has a referral")]
    DuplicateReferral { referred_id: String },

    #[error("User '{user_id}' cannot refer themselves")]
    SelfReferral { user_id: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("Referral '{referral_id}' already completed")]
    AlreadyCompleted { referral_id: String },

    #[error("Tier {tier} reward already awarded to '{user_id}'")]
    AlreadyAwarded { user_id: String, tier: String },

    #[error("No free referral code found for '{user_id}' after {attempts} attempts")]
    CodeSpaceExhausted { user_id: String, attempts: u32 },

    #[error("Invalid group: {reason}")]
    InvalidGroup { reason: String },

    #[error("Group '{group_id}' has no remaining spaces")]
    GroupFull { group_id: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    /// True for failures of the underlying table store rather than a
    /// business rule.
    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::Serialization(_) | Self::Other(_)
        )
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;
