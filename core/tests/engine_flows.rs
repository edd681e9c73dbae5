use splitora_core::{
    engine::SplitoraEngine,
    error::LedgerError,
    profile::{NewProfile, ProfileUpdate},
    referral_ledger::ReferralStatus,
    tier_rewards::RewardType,
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn make_engine(seed: u64) -> SplitoraEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SplitoraEngine::build_test(seed).unwrap()
}

fn named(name: &str) -> NewProfile {
    NewProfile { full_name: Some(name.to_string()), ..NewProfile::default() }
}

fn code_of(engine: &SplitoraEngine, user_id: &str) -> String {
    engine.profiles().get_profile(user_id).unwrap().referral_code.unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn sign_up_with_code_records_pending_referral() {
    let engine = make_engine(31);
    engine.sign_up("alice", named("Alice"), None).unwrap();
    let code = code_of(&engine, "alice");

    let signed = engine.sign_up("bob", NewProfile::default(), Some(&code)).unwrap();
    let referral = signed.referral.expect("bob arrived with a code");
    assert_eq!(referral.referrer_id, "alice");
    assert_eq!(referral.status, ReferralStatus::Pending);
    assert_eq!(signed.profile.currency, "USD");
    assert!(signed.profile.referral_code.is_some(), "the referred user gets a code too");
}

#[test]
fn blank_code_is_ignored() {
    let engine = make_engine(32);
    let signed = engine.sign_up("bob", NewProfile::default(), Some("   ")).unwrap();
    assert!(signed.referral.is_none());
}

/// A bad code aborts the whole sign-up, profile included.
#[test]
fn sign_up_with_unknown_code_keeps_nothing() {
    let engine = make_engine(33);
    let err = engine.sign_up("bob", NewProfile::default(), Some("ZZZZZZ")).unwrap_err();
    assert!(matches!(err, LedgerError::InvalidCode { .. }), "got {err:?}");

    let lookup = engine.profiles().get_profile("bob").unwrap_err();
    assert!(matches!(lookup, LedgerError::NotFound { .. }), "profile should have been rolled back");
    assert_eq!(engine.store().event_count("profile_created").unwrap(), 0);
}

#[test]
fn signing_up_twice_fails() {
    let engine = make_engine(34);
    engine.sign_up("alice", NewProfile::default(), None).unwrap();
    assert!(engine.sign_up("alice", NewProfile::default(), None).is_err());
}

#[test]
fn own_code_is_self_referral() {
    let engine = make_engine(35);
    engine.sign_up("alice", NewProfile::default(), None).unwrap();
    let code = code_of(&engine, "alice");

    let err = engine.referrals().create_referral_from_code(&code, "alice").unwrap_err();
    assert!(matches!(err, LedgerError::SelfReferral { .. }), "got {err:?}");
}

#[test]
fn completing_profile_completes_referral_once() {
    let engine = make_engine(36);
    engine.sign_up("alice", NewProfile::default(), None).unwrap();
    let code = code_of(&engine, "alice");
    engine.sign_up("bob", NewProfile::default(), Some(&code)).unwrap();

    let update = ProfileUpdate { full_name: Some("Bob Builder".into()), ..ProfileUpdate::default() };
    let first = engine.complete_profile("bob", &update).unwrap();
    assert_eq!(first.profile.full_name.as_deref(), Some("Bob Builder"));
    let completed = first.completed.expect("pending referral should complete");
    assert_eq!(completed.referral.status, ReferralStatus::Completed);
    assert_eq!(completed.signup_reward.user_id, "alice");

    let update = ProfileUpdate { currency: Some("EUR".into()), ..ProfileUpdate::default() };
    let second = engine.complete_profile("bob", &update).unwrap();
    assert!(second.completed.is_none(), "referral is already complete");
    assert_eq!(second.profile.currency, "EUR");
    assert_eq!(engine.store().reward_count("alice", RewardType::Signup).unwrap(), 1);
}

#[test]
fn completing_profile_without_referral() {
    let engine = make_engine(37);
    engine.sign_up("solo", NewProfile::default(), None).unwrap();
    let done = engine.complete_profile("solo", &ProfileUpdate::default()).unwrap();
    assert!(done.completed.is_none());
}

#[test]
fn profile_update_leaves_code_untouched() {
    let engine = make_engine(38);
    engine.sign_up("alice", NewProfile::default(), None).unwrap();
    let code = code_of(&engine, "alice");

    let update = ProfileUpdate {
        full_name:  Some("Alice A.".into()),
        avatar_url: Some("https://example.test/a.png".into()),
        currency:   Some("GBP".into()),
    };
    let updated = engine.profiles().update_profile("alice", &update).unwrap();
    assert_eq!(updated.referral_code.as_deref(), Some(code.as_str()));
    assert!(updated.updated_at > updated.created_at);
    assert_eq!(engine.profiles().get_profile("alice").unwrap(), updated);
}
