use splitora_core::{
    clock::SystemClock,
    config::EngineConfig,
    engine::SplitoraEngine,
    error::LedgerError,
    profile::NewProfile,
    referral_ledger::ReferralStatus,
    rng::CodeRng,
    store::LedgerStore,
    tier_rewards::{RewardStatus, RewardType, Tier},
};
use std::rc::Rc;

// ── Test helpers ────────────────────────────────────────────────────────────

fn make_engine(seed: u64) -> SplitoraEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    SplitoraEngine::build_test(seed).unwrap()
}

/// Create a profile with a freshly issued code; returns the code.
fn user_with_code(engine: &SplitoraEngine, user_id: &str) -> String {
    engine.profiles().create_profile(user_id, NewProfile::default()).unwrap();
    engine.codes().get_or_create_referral_code(user_id).unwrap()
}

fn plain_user(engine: &SplitoraEngine, user_id: &str) {
    engine.profiles().create_profile(user_id, NewProfile::default()).unwrap();
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// A valid code produces exactly one pending referral carrying the fixed
/// 5.00 reward.
#[test]
fn valid_code_creates_one_pending_referral() {
    let engine = make_engine(1);
    let code = user_with_code(&engine, "alice");
    plain_user(&engine, "bob");

    let referral = engine.referrals().create_referral_from_code(&code, "bob").unwrap();

    assert_eq!(referral.referrer_id, "alice");
    assert_eq!(referral.referred_id, "bob");
    assert_eq!(referral.status, ReferralStatus::Pending);
    assert_eq!(referral.reward_amount, 5.00);
    assert!(referral.completed_at.is_none());

    let stored = engine.referrals().referrals_by_referrer("alice").unwrap();
    assert_eq!(stored.len(), 1, "expected exactly one referral row, got {stored:?}");
    assert_eq!(stored[0], referral);
}

#[test]
fn unknown_code_is_invalid() {
    let engine = make_engine(2);
    user_with_code(&engine, "alice");
    plain_user(&engine, "bob");

    let err = engine.referrals().create_referral_from_code("nope00", "bob").unwrap_err();
    assert!(matches!(err, LedgerError::InvalidCode { ref code } if code == "nope00"), "got {err:?}");
    assert_eq!(engine.store().referral_count("alice").unwrap(), 0);
}

/// A user can be referred at most once, whoever the second referrer is.
#[test]
fn second_referral_for_same_user_is_duplicate() {
    let engine = make_engine(3);
    let alice = user_with_code(&engine, "alice");
    let carol = user_with_code(&engine, "carol");
    plain_user(&engine, "bob");

    engine.referrals().create_referral_from_code(&alice, "bob").unwrap();

    let again = engine.referrals().create_referral_from_code(&alice, "bob").unwrap_err();
    assert!(matches!(again, LedgerError::DuplicateReferral { .. }), "got {again:?}");

    let other = engine.referrals().create_referral_from_code(&carol, "bob").unwrap_err();
    assert!(matches!(other, LedgerError::DuplicateReferral { .. }), "got {other:?}");

    assert_eq!(engine.store().referral_count("alice").unwrap(), 1);
    assert_eq!(engine.store().referral_count("carol").unwrap(), 0);
}

/// Completing twice fails the second time and leaves exactly one signup
/// reward behind.
#[test]
fn completion_is_once_only() {
    let engine = make_engine(4);
    let code = user_with_code(&engine, "alice");
    plain_user(&engine, "bob");
    let referral = engine.referrals().create_referral_from_code(&code, "bob").unwrap();

    let done = engine.referrals().complete_referral(&referral.id).unwrap();
    assert_eq!(done.referral.status, ReferralStatus::Completed);
    assert!(done.referral.completed_at.is_some());
    assert_eq!(done.signup_reward.reward_type, RewardType::Signup);
    assert_eq!(done.signup_reward.status, RewardStatus::Pending);
    assert_eq!(done.signup_reward.amount, 5.00);
    assert_eq!(done.signup_reward.referral_id.as_deref(), Some(referral.id.as_str()));
    assert!(done.tier_reward.is_none());

    let err = engine.referrals().complete_referral(&referral.id).unwrap_err();
    assert!(matches!(err, LedgerError::AlreadyCompleted { .. }), "got {err:?}");

    let signups = engine.store().reward_count("alice", RewardType::Signup).unwrap();
    assert_eq!(signups, 1, "expected one signup reward, got {signups}");
}

#[test]
fn completing_missing_referral_is_not_found() {
    let engine = make_engine(5);
    let err = engine.referrals().complete_referral("no-such-referral").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "Referral", .. }), "got {err:?}");
}

#[test]
fn complete_for_referred_user_resolves_referral() {
    let engine = make_engine(6);
    let code = user_with_code(&engine, "alice");
    plain_user(&engine, "bob");
    plain_user(&engine, "dave");
    let referral = engine.referrals().create_referral_from_code(&code, "bob").unwrap();

    let done = engine.referrals().complete_referral_for("bob").unwrap();
    assert_eq!(done.referral.id, referral.id);

    let err = engine.referrals().complete_referral_for("dave").unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }), "got {err:?}");
}

/// Totals count pending rewards; nothing here has been paid out.
#[test]
fn stats_sum_pending_rewards() {
    let engine = make_engine(7);
    let code = user_with_code(&engine, "alice");
    let mut referrals = Vec::new();
    for i in 0..3 {
        let friend = format!("friend-{i}");
        plain_user(&engine, &friend);
        referrals.push(engine.referrals().create_referral_from_code(&code, &friend).unwrap());
    }
    let extra = "friend-extra";
    plain_user(&engine, extra);
    engine.referrals().create_referral_from_code(&code, extra).unwrap();

    engine.referrals().complete_referral(&referrals[0].id).unwrap();
    let after_one = engine.referrals().get_referral_stats("alice").unwrap();
    assert_eq!(after_one.total_rewards, 5.00);

    engine.referrals().complete_referral(&referrals[1].id).unwrap();
    let third = engine.referrals().complete_referral(&referrals[2].id).unwrap();
    assert_eq!(third.tier_reward.as_ref().map(|r| r.reward_type), Some(RewardType::Tier1));

    let stats = engine.referrals().get_referral_stats("alice").unwrap();
    assert_eq!(stats.total_referrals, 4);
    assert_eq!(stats.completed_referrals, 3);
    assert_eq!(stats.pending_referrals, 1);
    // 3 × 5.00 signup + 10.00 TIER_1
    assert_eq!(stats.total_rewards, 25.00);
    assert_eq!(stats.rewards.len(), 4);
    let next = stats.next_tier.expect("TIER_2 should be next");
    assert_eq!(next.tier, Tier::Tier2);
    assert_eq!(next.referrals_needed, 2);

    // Newest first: the TIER_1 bonus was written last.
    assert_eq!(stats.rewards[0].reward_type, RewardType::Tier1);
}

/// One signup reward (5.00) plus one TIER_1 bonus (10.00) adds to 15.00.
#[test]
fn one_signup_plus_tier_one_totals_fifteen() {
    let engine = make_engine(8);
    let code = user_with_code(&engine, "alice");
    plain_user(&engine, "bob");
    let referral = engine.referrals().create_referral_from_code(&code, "bob").unwrap();
    engine.referrals().complete_referral(&referral.id).unwrap();
    engine.tiers().award_tier_reward("alice", Tier::Tier1, 10.00).unwrap();

    let stats = engine.referrals().get_referral_stats("alice").unwrap();
    assert_eq!(stats.total_rewards, 15.00, "got {stats:?}");
}

#[test]
fn stats_for_user_without_referrals() {
    let engine = make_engine(9);
    plain_user(&engine, "loner");

    let stats = engine.referrals().get_referral_stats("loner").unwrap();
    assert_eq!(stats.total_referrals, 0);
    assert_eq!(stats.pending_referrals, 0);
    assert_eq!(stats.total_rewards, 0.0);
    assert!(stats.rewards.is_empty());
    let next = stats.next_tier.unwrap();
    assert_eq!(next.tier, Tier::Tier1);
    assert_eq!(next.referrals_needed, 3);
}

/// Every state change leaves a trail in the event log.
#[test]
fn completion_is_audited() {
    let engine = make_engine(10);
    let code = user_with_code(&engine, "alice");
    plain_user(&engine, "bob");
    let referral = engine.referrals().create_referral_from_code(&code, "bob").unwrap();
    let done = engine.referrals().complete_referral(&referral.id).unwrap();

    let types: Vec<String> = engine
        .events_for(&referral.id)
        .unwrap()
        .into_iter()
        .map(|e| e.event_type)
        .collect();
    assert_eq!(types, vec!["referral_created", "referral_completed"]);

    let reward_events = engine.events_for(&done.signup_reward.id).unwrap();
    assert_eq!(reward_events.len(), 1);
    assert_eq!(reward_events[0].event_type, "reward_issued");
}

/// With the wall clock, records handed back match what was stored.
#[test]
fn system_clock_records_match_stored_rows() {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = LedgerStore::in_memory().unwrap();
    store.migrate().unwrap();
    let engine = SplitoraEngine::new(store, EngineConfig::default_test(), Rc::new(SystemClock), CodeRng::from_seed(12));
    plain_user(&engine, "alice");
    let bob = engine.profiles().create_profile("bob", NewProfile::default()).unwrap();
    assert_eq!(engine.profiles().get_profile("bob").unwrap(), bob);

    let created = engine.referrals().create_referral("alice", "bob").unwrap();
    assert_eq!(engine.referrals().referrals_by_referrer("alice").unwrap(), vec![created.clone()]);

    let done = engine.referrals().complete_referral(&created.id).unwrap();
    let stored = engine.referrals().referrals_by_referrer("alice").unwrap();
    assert_eq!(stored, vec![done.referral]);
    let stats = engine.referrals().get_referral_stats("alice").unwrap();
    assert_eq!(stats.rewards, vec![done.signup_reward]);
}
