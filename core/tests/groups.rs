use splitora_core::{
    engine::SplitoraEngine,
    error::LedgerError,
    group_ledger::{ActivityKind, GroupStatus, GuestContact, NewActivity, PaymentStatus, WaitlistStatus},
    profile::NewProfile,
};

// ── Test helpers ────────────────────────────────────────────────────────────

fn make_engine(seed: u64) -> SplitoraEngine {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = SplitoraEngine::build_test(seed).unwrap();
    for user in ["host", "ann", "ben", "cat", "dan"] {
        engine.profiles().create_profile(user, NewProfile::default()).unwrap();
    }
    engine
}

fn guest(email: &str) -> GuestContact {
    GuestContact { name: "Guest".into(), email: email.into(), phone: "+1 555 0100".into() }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn create_group_from_catalog_plan() {
    let engine = make_engine(41);
    let group = engine
        .groups()
        .create_group("host", "netflix", "netflix-premium", 3, "  Austin  ")
        .unwrap();

    assert_eq!(group.name, "Netflix Premium");
    assert_eq!(group.max_members, 4);
    assert_eq!(group.price, 22.99);
    assert_eq!(group.remaining_spaces, 3);
    assert_eq!(group.location, "Austin");
    assert_eq!(group.status, GroupStatus::Active);
    assert!(group.description.as_deref().unwrap().ends_with("(Location: Austin)"));
    assert_eq!(engine.groups().get_group(&group.id).unwrap(), group);

    let feed = engine.groups().user_activities("host").unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].kind, ActivityKind::Join);
}

#[test]
fn create_group_validates_input() {
    let engine = make_engine(42);
    let groups = engine.groups();

    let unknown = groups.create_group("host", "netflix", "netflix-ultra", 1, "Austin").unwrap_err();
    assert!(matches!(unknown, LedgerError::InvalidGroup { .. }), "got {unknown:?}");

    // Host keeps one of the four seats.
    let too_many = groups.create_group("host", "netflix", "netflix-premium", 4, "Austin").unwrap_err();
    assert!(matches!(too_many, LedgerError::InvalidGroup { .. }), "got {too_many:?}");

    let none = groups.create_group("host", "netflix", "netflix-premium", 0, "Austin").unwrap_err();
    assert!(matches!(none, LedgerError::InvalidGroup { .. }), "got {none:?}");

    let nowhere = groups.create_group("host", "netflix", "netflix-premium", 2, "   ").unwrap_err();
    assert!(matches!(nowhere, LedgerError::InvalidGroup { .. }), "got {nowhere:?}");

    assert_eq!(engine.store().event_count("group_created").unwrap(), 0);
}

#[test]
fn joining_fills_seats_until_full() {
    let engine = make_engine(43);
    let groups = engine.groups();
    let group = groups.create_group("host", "netflix", "netflix-premium", 2, "Austin").unwrap();
    let share = group.member_share();

    groups.join_group("ann", &group.id, share).unwrap();
    groups.join_group("ben", &group.id, share).unwrap();
    let err = groups.join_group("cat", &group.id, share).unwrap_err();
    assert!(matches!(err, LedgerError::GroupFull { .. }), "got {err:?}");

    assert_eq!(groups.get_group(&group.id).unwrap().remaining_spaces, 0);
    let members: Vec<_> = groups.group_members(&group.id).unwrap().into_iter().map(|m| m.user_id).collect();
    assert_eq!(members, vec!["ann", "ben"]);
}

#[test]
fn host_and_duplicate_members_rejected() {
    let engine = make_engine(44);
    let groups = engine.groups();
    let group = groups.create_group("host", "spotify", "spotify-family", 5, "Denver").unwrap();

    let host = groups.join_group("host", &group.id, 2.83).unwrap_err();
    assert!(matches!(host, LedgerError::InvalidGroup { .. }), "got {host:?}");

    groups.join_group("ann", &group.id, 2.83).unwrap();
    let twice = groups.join_group("ann", &group.id, 2.83).unwrap_err();
    assert!(matches!(twice, LedgerError::InvalidGroup { .. }), "got {twice:?}");

    assert_eq!(
        groups.get_group(&group.id).unwrap().remaining_spaces,
        4,
        "a rejected join must not consume a seat"
    );
}

#[test]
fn joining_missing_group_is_not_found() {
    let engine = make_engine(45);
    let err = engine.groups().join_group("ann", "no-group", 1.0).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "Group", .. }), "got {err:?}");
}

#[test]
fn leaving_frees_a_seat_and_allows_rejoin() {
    let engine = make_engine(46);
    let groups = engine.groups();
    let group = groups.create_group("host", "netflix", "netflix-standard-hd", 1, "Boise").unwrap();

    groups.join_group("ann", &group.id, 7.75).unwrap();
    assert_eq!(groups.user_groups("ann").unwrap().len(), 1);

    groups.leave_group("ann", &group.id).unwrap();
    assert!(groups.user_groups("ann").unwrap().is_empty(), "inactive memberships are not listed");
    assert_eq!(groups.get_group(&group.id).unwrap().remaining_spaces, 1);

    let err = groups.leave_group("ann", &group.id).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { entity: "Membership", .. }), "got {err:?}");

    groups.join_group("ann", &group.id, 7.75).unwrap();
    assert_eq!(groups.get_group(&group.id).unwrap().remaining_spaces, 0);

    let kinds: Vec<_> = groups.user_activities("ann").unwrap().into_iter().map(|a| a.kind).collect();
    // Newest first.
    assert_eq!(kinds, vec![ActivityKind::Join, ActivityKind::Leave, ActivityKind::Join]);
}

#[test]
fn payments_are_recorded_with_activity() {
    let engine = make_engine(47);
    let groups = engine.groups();
    let group = groups.create_group("host", "netflix", "netflix-premium", 3, "Austin").unwrap();
    groups.join_group("ann", &group.id, 5.75).unwrap();

    let paid = groups.create_payment("ann", &group.id, 5.75, PaymentStatus::Completed).unwrap();
    groups.create_payment("ann", &group.id, 5.75, PaymentStatus::Pending).unwrap();

    let payments = groups.group_payments(&group.id).unwrap();
    assert_eq!(payments.len(), 2);
    assert_eq!(payments[0], paid);
    assert_eq!(payments[1].status, PaymentStatus::Pending);

    let latest = &groups.user_activities("ann").unwrap()[0];
    assert_eq!(latest.kind, ActivityKind::Payment);
    assert_eq!(latest.amount, Some(5.75));

    let err = groups.create_payment("ann", "no-group", 1.0, PaymentStatus::Failed).unwrap_err();
    assert!(matches!(err, LedgerError::NotFound { .. }), "got {err:?}");
}

#[test]
fn manual_activity_appears_in_feed() {
    let engine = make_engine(48);
    let groups = engine.groups();
    groups
        .create_activity(NewActivity {
            kind:        ActivityKind::Invite,
            description: "Invited dan".into(),
            user_id:     "cat".into(),
            group_id:    None,
            amount:      None,
        })
        .unwrap();

    let feed = groups.user_activities("cat").unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].description, "Invited dan");
    assert!(groups.user_activities("dan").unwrap().is_empty());

    let events = engine.store().events_for_entity(&feed[0].id).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "activity_recorded");
}

#[test]
fn waitlist_join_is_idempotent() {
    let engine = make_engine(49);
    let groups = engine.groups();
    let group = groups.create_group("host", "netflix", "netflix-standard-hd", 1, "Boise").unwrap();

    assert_eq!(groups.waitlist_status(&group.id, "dan").unwrap(), None);
    let first = groups.join_waitlist(&group.id, "dan").unwrap();
    let again = groups.join_waitlist(&group.id, "dan").unwrap();
    assert_eq!(again.id, first.id);
    groups.join_waitlist(&group.id, "cat").unwrap();

    assert_eq!(groups.waitlist_count(&group.id).unwrap(), 2);
    assert_eq!(groups.waitlist_status(&group.id, "dan").unwrap(), Some(WaitlistStatus::Pending));
    assert_eq!(engine.store().event_count("waitlist_joined").unwrap(), 2);
}

#[test]
fn guest_waitlist_requires_known_plan_and_email() {
    let engine = make_engine(50);
    let groups = engine.groups();

    let entry = groups
        .register_guest_waitlist("spotify", "spotify-family", guest("guest@example.test"))
        .unwrap();
    assert_eq!(entry.plan_id.as_deref(), Some("spotify-family"));
    assert!(entry.group_id.is_none());
    assert_eq!(entry.guest.as_ref().map(|g| g.email.as_str()), Some("guest@example.test"));

    let bad_plan = groups.register_guest_waitlist("spotify", "spotify-duo", guest("g@example.test")).unwrap_err();
    assert!(matches!(bad_plan, LedgerError::InvalidGroup { .. }), "got {bad_plan:?}");

    let no_email = groups.register_guest_waitlist("spotify", "spotify-family", guest(" ")).unwrap_err();
    assert!(matches!(no_email, LedgerError::InvalidGroup { .. }), "got {no_email:?}");
}
