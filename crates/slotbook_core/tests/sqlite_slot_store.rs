use chrono::NaiveDate;
use rusqlite::Connection;
use slotbook_core::schedule::pattern::{default_day_hours, DEFAULT_CLOSING_TIME};
use slotbook_core::{
    ReplaceGuard, SlotId, SlotRepository, SlotTime, SqliteSlotRepository, StoreError,
    BLOCKED_SENTINEL,
};
use std::sync::Barrier;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
}

fn at(value: &str) -> SlotTime {
    value.parse().unwrap()
}

fn hours(values: &[&str]) -> Vec<SlotTime> {
    values.iter().map(|value| at(value)).collect()
}

fn listed_hours(repo: &SqliteSlotRepository, date: NaiveDate) -> Vec<String> {
    repo.list_day(date)
        .unwrap()
        .iter()
        .map(|slot| slot.hour.to_string())
        .collect()
}

#[test]
fn init_day_seeds_blocked_default_pattern_once() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    let defaults = default_day_hours(DEFAULT_CLOSING_TIME);

    assert!(repo.init_day(day(), &defaults).unwrap());
    let slots = repo.list_day(day()).unwrap();
    assert_eq!(
        slots.iter().map(|slot| slot.hour.to_string()).collect::<Vec<_>>(),
        vec!["12:00", "13:15", "14:30", "15:45", "17:00", "18:15", "19:30"]
    );
    assert!(slots.iter().all(|slot| slot.occupant_name == BLOCKED_SENTINEL));

    repo.replace_day_pattern(day(), &hours(&["10:00"]), ReplaceGuard::Force)
        .unwrap();
    assert!(!repo.init_day(day(), &defaults).unwrap());
    assert_eq!(listed_hours(&repo, day()), vec!["10:00"]);
}

#[test]
fn booking_an_available_slot_then_rebooking_is_rejected() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.replace_day_pattern(day(), &hours(&["10:00", "11:15"]), ReplaceGuard::Force)
        .unwrap();

    repo.book(day(), at("10:00"), "Ada", "+90 555 111 22 33")
        .unwrap();
    let err = repo.book(day(), at("10:00"), "Bob", "+905550000000").unwrap_err();
    assert!(matches!(err, StoreError::AlreadyTaken { .. }));

    let slot = repo.list_day(day()).unwrap().remove(0);
    assert_eq!(slot.occupant_name, "Ada");
    assert_eq!(slot.occupant_contact, "+905551112233");
}

#[test]
fn booking_missing_or_blocked_hours_fails_typed() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.init_day(day(), &hours(&["12:00"])).unwrap();

    let blocked = repo.book(day(), at("12:00"), "Ada", "555").unwrap_err();
    assert!(matches!(blocked, StoreError::AlreadyTaken { .. }));

    let missing = repo.book(day(), at("09:00"), "Ada", "555").unwrap_err();
    assert!(matches!(missing, StoreError::NotFound(_)));
}

#[test]
fn self_cancel_requires_matching_contact_and_an_occupant() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.replace_day_pattern(day(), &hours(&["10:00"]), ReplaceGuard::Force)
        .unwrap();

    let empty = repo.self_cancel(day(), at("10:00"), "555").unwrap_err();
    assert!(matches!(empty, StoreError::AlreadyEmpty { .. }));

    repo.book(day(), at("10:00"), "Ada", "+90 555").unwrap();
    let mismatch = repo.self_cancel(day(), at("10:00"), "+90556").unwrap_err();
    assert!(matches!(mismatch, StoreError::ContactMismatch { .. }));

    repo.self_cancel(day(), at("10:00"), "+90-555").unwrap();
    let slot = repo.list_day(day()).unwrap().remove(0);
    assert!(slot.is_available());
    assert!(slot.occupant_contact.is_empty());

    let again = repo.self_cancel(day(), at("10:00"), "+90555").unwrap_err();
    assert!(matches!(again, StoreError::AlreadyEmpty { .. }));
}

#[test]
fn blocked_slot_cannot_be_self_cancelled() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.init_day(day(), &hours(&["12:00"])).unwrap();

    let err = repo.self_cancel(day(), at("12:00"), "").unwrap_err();
    assert!(matches!(err, StoreError::ContactMismatch { .. }));
}

#[test]
fn admin_operations_use_listed_ids() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.init_day(day(), &hours(&["12:00", "13:15"])).unwrap();

    let first = repo.list_day(day()).unwrap().remove(0);
    repo.admin_set(&first.id, "Walk-in", "0555").unwrap();
    let updated = repo.list_day(day()).unwrap().remove(0);
    assert_eq!(updated.occupant_name, "Walk-in");
    assert_eq!(updated.occupant_contact, "0555");

    repo.admin_delete_hour(&first.id).unwrap();
    assert_eq!(listed_hours(&repo, day()), vec!["13:15"]);

    let gone = repo.admin_delete_hour(&first.id).unwrap_err();
    assert!(matches!(gone, StoreError::NotFound(_)));
    let gone = repo.admin_set(&first.id, "", "").unwrap_err();
    assert!(matches!(gone, StoreError::NotFound(_)));
}

#[test]
fn admin_operations_reject_composite_ids() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.init_day(day(), &hours(&["12:00"])).unwrap();

    let composite: SlotId = "2026-10-15|12:00".parse().unwrap();
    assert!(matches!(
        repo.admin_set(&composite, "Walk-in", "0555").unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        repo.admin_delete_hour(&composite).unwrap_err(),
        StoreError::NotFound(_)
    ));

    let slot = repo.list_day(day()).unwrap().remove(0);
    assert_eq!(slot.occupant_name, BLOCKED_SENTINEL);
}

#[test]
fn admin_add_hour_ignores_existing_hours() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.replace_day_pattern(day(), &hours(&["10:00"]), ReplaceGuard::Force)
        .unwrap();
    repo.book(day(), at("10:00"), "Ada", "555").unwrap();

    assert!(!repo.admin_add_hour(day(), at("10:00")).unwrap());
    assert!(repo.admin_add_hour(day(), at("09:30")).unwrap());

    let slots = repo.list_day(day()).unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].hour, at("09:30"));
    assert!(slots[0].is_available());
    assert_eq!(slots[1].occupant_name, "Ada");
}

#[test]
fn guarded_replace_refuses_live_bookings_but_ignores_blocked_slots() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    repo.init_day(day(), &hours(&["12:00", "13:15"])).unwrap();

    repo.replace_day_pattern(day(), &hours(&["10:00", "11:15"]), ReplaceGuard::RefuseIfBooked)
        .unwrap();
    repo.book(day(), at("11:15"), "Ada", "555").unwrap();

    let err = repo
        .replace_day_pattern(day(), &hours(&["14:00"]), ReplaceGuard::RefuseIfBooked)
        .unwrap_err();
    assert!(matches!(err, StoreError::DayHasBookings { booked: 1, .. }));
    assert_eq!(listed_hours(&repo, day()), vec!["10:00", "11:15"]);

    repo.replace_day_pattern(day(), &hours(&["14:00"]), ReplaceGuard::Force)
        .unwrap();
    assert_eq!(listed_hours(&repo, day()), vec!["14:00"]);
}

#[test]
fn replace_dedupes_hours_and_leaves_other_days_alone() {
    let repo = SqliteSlotRepository::open_in_memory().unwrap();
    let other = day().succ_opt().unwrap();
    repo.replace_day_pattern(other, &hours(&["09:00"]), ReplaceGuard::Force)
        .unwrap();

    repo.replace_day_pattern(
        day(),
        &hours(&["11:00", "10:00", "11:00"]),
        ReplaceGuard::Force,
    )
    .unwrap();

    assert_eq!(listed_hours(&repo, day()), vec!["10:00", "11:00"]);
    assert_eq!(listed_hours(&repo, other), vec!["09:00"]);
}

#[test]
fn failed_replace_rolls_back_to_previous_day() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");
    let repo = SqliteSlotRepository::open(&path).unwrap();
    repo.replace_day_pattern(day(), &hours(&["10:00", "11:15"]), ReplaceGuard::Force)
        .unwrap();
    repo.book(day(), at("10:00"), "Ada", "555").unwrap();

    let saboteur = Connection::open(&path).unwrap();
    saboteur
        .execute_batch(
            "CREATE TRIGGER fail_late_insert
             BEFORE INSERT ON slots
             WHEN NEW.hour = '15:00'
             BEGIN
                 SELECT RAISE(ABORT, 'injected failure');
             END;",
        )
        .unwrap();
    drop(saboteur);

    let err = repo
        .replace_day_pattern(day(), &hours(&["14:00", "15:00"]), ReplaceGuard::Force)
        .unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));

    let slots = repo.list_day(day()).unwrap();
    assert_eq!(
        slots.iter().map(|slot| slot.hour.to_string()).collect::<Vec<_>>(),
        vec!["10:00", "11:15"]
    );
    assert_eq!(slots[0].occupant_name, "Ada");
}

#[test]
fn concurrent_bookers_on_separate_connections_get_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");
    SqliteSlotRepository::open(&path)
        .unwrap()
        .replace_day_pattern(day(), &hours(&["10:00"]), ReplaceGuard::Force)
        .unwrap();

    const CONTENDERS: usize = 8;
    let barrier = Barrier::new(CONTENDERS);
    let outcomes: Vec<Result<(), StoreError>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|index| {
                let path = &path;
                let barrier = &barrier;
                scope.spawn(move || {
                    let repo = SqliteSlotRepository::open(path).unwrap();
                    barrier.wait();
                    repo.book(day(), at("10:00"), &format!("Client {index}"), "555")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let winners = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(outcomes
        .iter()
        .filter_map(|outcome| outcome.as_ref().err())
        .all(|err| matches!(err, StoreError::AlreadyTaken { .. })));

    let repo = SqliteSlotRepository::open(&path).unwrap();
    let slot = repo.list_day(day()).unwrap().remove(0);
    assert!(slot.occupant_name.starts_with("Client "));
}

#[test]
fn concurrent_cancels_succeed_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");
    let setup = SqliteSlotRepository::open(&path).unwrap();
    setup
        .replace_day_pattern(day(), &hours(&["10:00"]), ReplaceGuard::Force)
        .unwrap();
    setup.book(day(), at("10:00"), "Ada", "555").unwrap();
    drop(setup);

    const CONTENDERS: usize = 4;
    let barrier = Barrier::new(CONTENDERS);
    let successes = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..CONTENDERS)
            .map(|_| {
                let path = &path;
                let barrier = &barrier;
                scope.spawn(move || {
                    let repo = SqliteSlotRepository::open(path).unwrap();
                    barrier.wait();
                    repo.self_cancel(day(), at("10:00"), "555")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .filter(|outcome| outcome.is_ok())
            .count()
    });

    assert_eq!(successes, 1);
}

#[test]
fn concurrent_book_and_guarded_replace_never_interleave() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("schedule.db");

    for round in 1..=12 {
        let date = NaiveDate::from_ymd_opt(2026, 11, round).unwrap();
        SqliteSlotRepository::open(&path)
            .unwrap()
            .replace_day_pattern(date, &hours(&["10:00", "11:00"]), ReplaceGuard::Force)
            .unwrap();

        let barrier = Barrier::new(2);
        let (booked, replaced) = std::thread::scope(|scope| {
            let booker = scope.spawn(|| {
                let repo = SqliteSlotRepository::open(&path).unwrap();
                barrier.wait();
                repo.book(date, at("10:00"), "Ada", "555")
            });
            let replacer = scope.spawn(|| {
                let repo = SqliteSlotRepository::open(&path).unwrap();
                barrier.wait();
                repo.replace_day_pattern(date, &hours(&["14:00"]), ReplaceGuard::RefuseIfBooked)
            });
            (booker.join().unwrap(), replacer.join().unwrap())
        });

        let slots = SqliteSlotRepository::open(&path)
            .unwrap()
            .list_day(date)
            .unwrap();
        let final_day: Vec<_> = slots
            .iter()
            .map(|slot| (slot.hour.to_string(), slot.occupant_name.clone()))
            .collect();
        match (booked, replaced) {
            (Ok(()), Err(StoreError::DayHasBookings { booked: 1, .. })) => assert_eq!(
                final_day,
                vec![
                    ("10:00".to_string(), "Ada".to_string()),
                    ("11:00".to_string(), String::new()),
                ]
            ),
            (Err(StoreError::NotFound(_)), Ok(())) => {
                assert_eq!(final_day, vec![("14:00".to_string(), String::new())])
            }
            (booked, replaced) => {
                panic!("round {round}: book={booked:?} replace={replaced:?} day={final_day:?}")
            }
        }
    }
}
