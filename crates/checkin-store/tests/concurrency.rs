//! Multi-threaded tests against one shared store.

use std::sync::{Arc, Barrier};
use std::thread;

use checkin_store::*;

fn test_store(dir: &std::path::Path) -> Store {
    Store::open_dir(dir).unwrap()
}

fn test_event(store: &Store) -> String {
    store
        .create_scope(NewEvent {
            name: "Concurrency".into(),
            date: chrono::Utc::now(),
            location: "Hall".into(),
            description: None,
            created_by: None,
        })
        .unwrap()
        .id
}

fn round_table(seats: u32) -> NewTable {
    NewTable {
        shape: TableShape::Round,
        position: Position::new(0.0, 0.0),
        width: 150.0,
        height: 150.0,
        num_seats: seats,
        rotation: 0.0,
    }
}

/// Run `f(i)` on `n` threads released at the same moment.
fn race<T: Send + 'static>(n: usize, f: impl Fn(usize) -> T + Send + Sync + 'static) -> Vec<T> {
    let barrier = Arc::new(Barrier::new(n));
    let f = Arc::new(f);
    let handles: Vec<_> = (0..n)
        .map(|i| {
            let barrier = barrier.clone();
            let f = f.clone();
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

#[test]
fn concurrent_guest_creation_loses_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path());
    let event_id = test_event(&store);

    let s = store.clone();
    let e = event_id.clone();
    race(16, move |i| {
        s.create_guest(
            &e,
            NewGuest {
                full_name: format!("Guest {i}"),
                phone: format!("555{i:04}"),
                ..Default::default()
            },
        )
        .unwrap()
    });

    assert_eq!(store.list_guests(&event_id, &GuestFilter::default()).unwrap().len(), 16);
    let reopened = test_store(dir.path());
    assert_eq!(reopened.list_guests(&event_id, &GuestFilter::default()).unwrap().len(), 16);
}

#[test]
fn same_phone_race_has_one_winner() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path());
    let event_id = test_event(&store);

    let s = store.clone();
    let e = event_id.clone();
    let results = race(8, move |i| {
        s.create_guest(
            &e,
            NewGuest {
                full_name: format!("Claimant {i}"),
                phone: "5550000".into(),
                ..Default::default()
            },
        )
    });

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    assert!(
        results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| matches!(e, StoreError::Conflict(_)))
    );
}

#[test]
fn disjoint_assignments_all_land_consistently() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path());
    let event_id = test_event(&store);
    let (table, _) = store.add_table(&event_id, round_table(12), "admin").unwrap();
    let guests: Vec<Guest> = (0..12)
        .map(|i| {
            store
                .create_guest(
                    &event_id,
                    NewGuest {
                        full_name: format!("Guest {i}"),
                        phone: format!("555{i:04}"),
                        ..Default::default()
                    },
                )
                .unwrap()
        })
        .collect();

    let s = store.clone();
    let e = event_id.clone();
    let t = table.clone();
    let g = guests.clone();
    race(12, move |i| {
        s.assign(&e, &t.id, &t.seats[i].id, &g[i].id, "admin").unwrap()
    });

    let after = store.get_table(&event_id, &table.id).unwrap();
    assert_eq!(after.occupied_seats(), 12);
    assert!(store.check_integrity(&event_id).unwrap().is_empty());

    store.invalidate_all();
    assert!(store.check_integrity(&event_id).unwrap().is_empty());
    assert_eq!(store.event_summary(&event_id).unwrap().assigned_seats, 12);
}

#[test]
fn concurrent_check_ins_are_each_recorded_once() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path());
    let event_id = test_event(&store);
    let guest = store
        .create_guest(
            &event_id,
            NewGuest {
                full_name: "Popular".into(),
                phone: "5551234".into(),
                ..Default::default()
            },
        )
        .unwrap();

    let s = store.clone();
    let e = event_id.clone();
    let id = guest.id.clone();
    let results = race(6, move |i| s.check_in(&e, &id, &format!("door-{i}")));

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    let checked = store.get_guest(&event_id, &guest.id).unwrap();
    assert!(checked.checked_in);
    assert_eq!(store.event_summary(&event_id).unwrap().checked_in_count, 1);
}

#[test]
fn scope_delete_while_reading_never_serves_stale_data() {
    let dir = tempfile::tempdir().unwrap();
    let store = test_store(dir.path());

    for round in 0..5 {
        let event_id = test_event(&store);
        store.add_table(&event_id, round_table(4), "admin").unwrap();

        let s = store.clone();
        let e = event_id.clone();
        race(4, move |i| {
            if i == 0 {
                assert!(s.delete_scope(&e).unwrap());
            } else {
                for _ in 0..20 {
                    // Either the live layout or an empty one; never an error.
                    let _ = s.read::<Vec<Table>>(&Scope::event(e.clone())).unwrap();
                }
            }
        });

        assert!(
            store.read::<Vec<Table>>(&Scope::event(event_id.clone())).unwrap().is_empty(),
            "round {round}"
        );
        assert!(store.get_event(&event_id).unwrap_err().is_not_found());
    }
}
