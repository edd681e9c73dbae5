//! Splitora core: referral rewards and subscription cost-splitting over an
//! embedded SQLite ledger.

pub mod catalog;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod group_ledger;
pub mod profile;
pub mod referral_code;
pub mod referral_ledger;
pub mod rng;
pub mod store;
pub mod tier_rewards;
pub mod types;
