//! Event scope lifecycle: create, look up, patch, duplicate, delete.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::collection::Scope;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{
    DuplicateRequest, Event, EventId, EventStatus, EventSummary, EventUpdate, Guest, GuestId,
    LayoutSettings, NewEvent, Table, User, find, new_record_id,
};

const ID_ATTEMPTS: usize = 8;

/// Child collections written when a scope is populated.
#[derive(Default)]
struct ScopeContents {
    tables: Vec<Table>,
    guests: Vec<Guest>,
    settings: LayoutSettings,
}

fn new_event_id() -> EventId {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("EV{}", hex[..8].to_uppercase())
}

impl Store {
    // ── Scope lifecycle ────────────────────────────────────────────

    /// Create a new event scope and return its event record.
    pub fn create_scope(&self, new: NewEvent) -> StoreResult<Event> {
        if new.name.trim().is_empty() {
            return Err(StoreError::Invalid("event name must not be empty".into()));
        }
        let now = self.now();
        let id = self.allocate_scope()?;
        let event = Event {
            id: id.clone(),
            name: new.name,
            date: new.date,
            location: new.location,
            description: new.description,
            status: EventStatus::Draft,
            created_by: new.created_by,
            floor_plan_url: None,
            created_at: now,
            updated_at: now,
        };
        self.populate_scope(event, ScopeContents::default())
    }

    /// Reserve a fresh scope directory.
    fn allocate_scope(&self) -> StoreResult<EventId> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let id = new_event_id();
            match self.create_scope_dir(&id) {
                Ok(_) => return Ok(id),
                Err(StoreError::Conflict(_)) if attempt < ID_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Write the child collections and then the event record. The scope is
    /// not listed until the event record exists; on failure the partial
    /// directory is removed.
    fn populate_scope(&self, event: Event, contents: ScopeContents) -> StoreResult<Event> {
        let id = event.id.clone();
        let scope = Scope::event(id.clone());
        let result = (|| -> StoreResult<()> {
            self.write(&scope, contents.tables)?;
            self.write(&scope, contents.guests)?;
            self.write(&scope, contents.settings)?;
            self.write(&scope, Some(event.clone()))?;
            Ok(())
        })();
        match result {
            Ok(()) => {
                info!(event_id = %id, name = %event.name, "event scope created");
                Ok(event)
            }
            Err(e) => {
                warn!(event_id = %id, error = %e, "event scope creation failed");
                self.discard_scope_dir(&id);
                Err(e)
            }
        }
    }

    /// Remove a scope and everything in it. Returns `false` if it did not
    /// exist. Staff assignments pointing at the event are dropped as well.
    pub fn delete_scope(&self, event_id: &str) -> StoreResult<bool> {
        if !self.remove_scope(event_id)? {
            return Ok(false);
        }
        let now = self.now();
        self.update(&Scope::Global, |users: &mut Vec<User>| {
            for user in users.iter_mut() {
                if user.assigned_events.iter().any(|e| e == event_id) {
                    user.assigned_events.retain(|e| e != event_id);
                    user.updated_at = now;
                }
            }
            Ok(())
        })?;
        Ok(true)
    }

    /// Clone an event scope under a new name and date.
    pub fn duplicate_scope(&self, source_id: &str, req: DuplicateRequest) -> StoreResult<Event> {
        if req.new_name.trim().is_empty() {
            return Err(StoreError::Invalid("event name must not be empty".into()));
        }
        let source = self.get_event(source_id)?;
        let scope = Scope::event(source_id);
        let mut contents = ScopeContents::default();
        if req.copy_layout {
            contents.tables = (*self.read::<Vec<Table>>(&scope)?).clone();
            contents.settings = (*self.read::<LayoutSettings>(&scope)?).clone();
        }
        let source_guests = if req.copy_guests {
            self.read::<Vec<Guest>>(&scope)?
        } else {
            Arc::new(Vec::new())
        };

        let now = self.now();
        let id = self.allocate_scope()?;
        let mut remap: HashMap<GuestId, GuestId> = HashMap::new();
        if req.copy_guests {
            contents.guests = source_guests
                .iter()
                .map(|g| {
                    let fresh = new_record_id();
                    remap.insert(g.id.clone(), fresh.clone());
                    let mut copy = g.clone();
                    copy.id = fresh;
                    copy.event_id = id.clone();
                    copy.checked_in = false;
                    copy.checked_in_at = None;
                    copy.checked_out_at = None;
                    copy.checked_in_by = None;
                    if !req.copy_layout {
                        copy.table_id = None;
                        copy.seat_id = None;
                    }
                    copy.created_at = now;
                    copy.updated_at = now;
                    copy
                })
                .collect();
        }

        for seat in contents.tables.iter_mut().flat_map(|t| t.seats.iter_mut()) {
            match seat.guest_id.as_ref().and_then(|g| remap.get(g)).cloned() {
                Some(fresh) => seat.occupy(&fresh, false),
                None => {
                    seat.vacate();
                }
            }
        }
        reconcile_placements(&mut contents.tables, &mut contents.guests, now);

        let event = Event {
            id,
            name: req.new_name,
            date: req.new_date,
            location: source.location.clone(),
            description: source.description.clone(),
            status: EventStatus::Draft,
            created_by: source.created_by.clone(),
            floor_plan_url: source.floor_plan_url.clone(),
            created_at: now,
            updated_at: now,
        };
        let event = self.populate_scope(event, contents)?;
        info!(source = source_id, event_id = %event.id, "event scope duplicated");
        Ok(event)
    }

    // ── Event record ───────────────────────────────────────────────

    pub fn get_event(&self, event_id: &str) -> StoreResult<Event> {
        (*self.read::<Option<Event>>(&Scope::event(event_id))?)
            .clone()
            .ok_or_else(|| StoreError::not_found("event", event_id))
    }

    /// All events, most recent date first.
    pub fn list_events(&self) -> StoreResult<Vec<Event>> {
        let mut events = Vec::new();
        for id in self.scope_ids()? {
            // Scopes still being created have no event record yet.
            if let Some(event) = &*self.read::<Option<Event>>(&Scope::event(id))? {
                events.push(event.clone());
            }
        }
        events.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(events)
    }

    pub fn update_event(&self, event_id: &str, patch: EventUpdate) -> StoreResult<Event> {
        if patch.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(StoreError::Invalid("event name must not be empty".into()));
        }
        let now = self.now();
        self.update(&Scope::event(event_id), |doc: &mut Option<Event>| {
            let event = doc
                .as_mut()
                .ok_or_else(|| StoreError::not_found("event", event_id))?;
            if let Some(name) = patch.name {
                event.name = name;
            }
            if let Some(date) = patch.date {
                event.date = date;
            }
            if let Some(location) = patch.location {
                event.location = location;
            }
            if let Some(description) = patch.description {
                event.description = Some(description);
            }
            if let Some(status) = patch.status {
                event.status = status;
            }
            event.updated_at = now;
            Ok(event.clone())
        })
    }

    pub(crate) fn require_event(&self, event_id: &str) -> StoreResult<()> {
        self.get_event(event_id).map(|_| ())
    }

    // ── Summaries ──────────────────────────────────────────────────

    pub fn event_summary(&self, event_id: &str) -> StoreResult<EventSummary> {
        let event = self.get_event(event_id)?;
        self.summarize(event)
    }

    pub fn list_summaries(&self) -> StoreResult<Vec<EventSummary>> {
        self.list_events()?
            .into_iter()
            .map(|event| self.summarize(event))
            .collect()
    }

    fn summarize(&self, event: Event) -> StoreResult<EventSummary> {
        let scope = Scope::event(event.id.clone());
        let guests: Arc<Vec<Guest>> = self.read(&scope)?;
        let tables: Arc<Vec<Table>> = self.read(&scope)?;
        Ok(EventSummary {
            total_guests: guests.len(),
            checked_in_count: guests.iter().filter(|g| g.checked_in).count(),
            checked_out_count: guests.iter().filter(|g| g.has_checked_out()).count(),
            total_tables: tables.len(),
            total_seats: tables.iter().map(|t| t.seats.len()).sum(),
            assigned_seats: tables.iter().map(|t| t.occupied_seats()).sum(),
            id: event.id,
            name: event.name,
            date: event.date,
            location: event.location,
            status: event.status,
        })
    }
}

/// Drop any seat/guest link that is not confirmed from both sides.
fn reconcile_placements(tables: &mut [Table], guests: &mut [Guest], now: DateTime<Utc>) {
    for table in tables.iter_mut() {
        let table_id = table.id.clone();
        for seat in table.seats.iter_mut() {
            let confirmed = seat
                .guest_id
                .as_deref()
                .and_then(|g| find(guests, g))
                .is_some_and(|g| g.is_seated_at(&table_id, &seat.id));
            if !confirmed {
                seat.vacate();
            }
        }
    }
    for guest in guests.iter_mut() {
        let confirmed = guest.placement().is_some_and(|(table_id, seat_id)| {
            find(tables, table_id)
                .and_then(|t| t.seat(seat_id))
                .is_some_and(|s| s.is_held_by(&guest.id))
        });
        if guest.placement().is_some() && !confirmed {
            guest.clear_placement(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{NewGuest, NewTable, Position, SeatStatus, TableShape};
    use std::path::Path;

    fn date(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn new_event(name: &str, when: &str) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            date: date(when),
            location: "Main Hall".to_string(),
            description: Some("Annual gala".to_string()),
            created_by: Some("admin".to_string()),
        }
    }

    fn new_guest(name: &str, phone: &str) -> NewGuest {
        NewGuest {
            full_name: name.to_string(),
            phone: phone.to_string(),
            ..Default::default()
        }
    }

    fn round_table() -> NewTable {
        NewTable {
            shape: TableShape::Round,
            position: Position::new(100.0, 100.0),
            width: 120.0,
            height: 120.0,
            num_seats: 4,
            rotation: 0.0,
        }
    }

    /// Event with one table, two guests, the first seated and checked in.
    fn seeded(store: &Store) -> (Event, Table, Guest, Guest) {
        let event = store
            .create_scope(new_event("Gala", "2026-06-01T18:00:00Z"))
            .unwrap();
        let (table, _) = store.add_table(&event.id, round_table(), "admin").unwrap();
        let g1 = store.create_guest(&event.id, new_guest("Ada", "5550001")).unwrap();
        let g2 = store.create_guest(&event.id, new_guest("Grace", "5550002")).unwrap();
        store
            .assign(&event.id, &table.id, &table.seats[0].id, &g1.id, "admin")
            .unwrap();
        store.check_in(&event.id, &g1.id, "door").unwrap();
        (event, table, g1, g2)
    }

    fn scope_files(root: &Path, id: &str) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(root.join("events").join(id))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    // ── Create / read ──────────────────────────────────────────────

    #[test]
    fn create_scope_writes_all_four_collections() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event = store
            .create_scope(new_event("Gala", "2026-06-01T18:00:00Z"))
            .unwrap();

        assert!(event.id.starts_with("EV"));
        assert_eq!(event.id.len(), 10);
        assert_eq!(event.status, EventStatus::Draft);
        assert_eq!(
            scope_files(dir.path(), &event.id),
            vec!["event.json", "guests.json", "layout_config.json", "tables.json"]
        );
        assert_eq!(store.get_event(&event.id).unwrap(), event);
    }

    #[test]
    fn create_scope_rejects_blank_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let err = store.create_scope(new_event("  ", "2026-06-01T18:00:00Z"));
        assert!(matches!(err, Err(StoreError::Invalid(_))));
        assert!(store.list_events().unwrap().is_empty());
    }

    #[test]
    fn list_events_newest_first_and_skips_incomplete_scopes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        store.create_scope(new_event("Old", "2025-01-01T00:00:00Z")).unwrap();
        store.create_scope(new_event("New", "2027-01-01T00:00:00Z")).unwrap();
        // A scope directory without its event record is not listed.
        std::fs::create_dir(dir.path().join("events").join("EVPARTIAL")).unwrap();

        let names: Vec<String> = store.list_events().unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["New", "Old"]);
    }

    #[test]
    fn get_missing_event_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        assert!(store.get_event("EVNOPE0000").unwrap_err().is_not_found());
    }

    #[test]
    fn update_event_patches_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event = store
            .create_scope(new_event("Gala", "2026-06-01T18:00:00Z"))
            .unwrap();

        let updated = store
            .update_event(
                &event.id,
                EventUpdate {
                    status: Some(EventStatus::Active),
                    location: Some("Rooftop".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.status, EventStatus::Active);
        assert_eq!(updated.location, "Rooftop");
        assert_eq!(updated.name, "Gala");
        assert!(store.update_event("EVNOPE0000", EventUpdate::default()).unwrap_err().is_not_found());
    }

    // ── Delete ─────────────────────────────────────────────────────

    #[test]
    fn delete_scope_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let (event, ..) = seeded(&store);

        assert!(store.delete_scope(&event.id).unwrap());
        assert!(!dir.path().join("events").join(&event.id).exists());
        assert!(store.get_event(&event.id).unwrap_err().is_not_found());
        assert!(store.read::<Vec<Guest>>(&Scope::event(event.id.clone())).unwrap().is_empty());
        assert!(store.read::<Vec<Table>>(&Scope::event(event.id.clone())).unwrap().is_empty());
        assert!(!store.delete_scope(&event.id).unwrap());
    }

    #[test]
    fn delete_scope_drops_staff_assignments() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event = store
            .create_scope(new_event("Gala", "2026-06-01T18:00:00Z"))
            .unwrap();
        let staff = store
            .create_user(crate::types::NewUser {
                email: "staff@example.com".into(),
                full_name: "Staff".into(),
                role: crate::types::UserRole::Staff,
                hashed_password: "h".into(),
            })
            .unwrap();
        store.set_staff_assignment(&event.id, &staff.id, true).unwrap();

        store.delete_scope(&event.id).unwrap();
        assert!(store.get_user(&staff.id).unwrap().assigned_events.is_empty());
    }

    #[test]
    fn writes_into_deleted_scope_fail_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event = store
            .create_scope(new_event("Gala", "2026-06-01T18:00:00Z"))
            .unwrap();
        store.delete_scope(&event.id).unwrap();

        let err = store
            .write(&Scope::event(event.id.clone()), Vec::<Guest>::new())
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!dir.path().join("events").join(&event.id).exists());
    }

    // ── Duplicate ──────────────────────────────────────────────────

    #[test]
    fn duplicate_guests_without_layout_clears_placement() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let (event, _, g1, _) = seeded(&store);

        let copy = store
            .duplicate_scope(
                &event.id,
                DuplicateRequest {
                    new_name: "Gala 2027".into(),
                    new_date: date("2027-06-01T18:00:00Z"),
                    copy_layout: false,
                    copy_guests: true,
                },
            )
            .unwrap();

        assert_ne!(copy.id, event.id);
        assert_eq!(copy.status, EventStatus::Draft);
        assert_eq!(copy.location, event.location);
        let guests = store.list_guests(&copy.id, &Default::default()).unwrap();
        assert_eq!(guests.len(), 2);
        for g in &guests {
            assert_ne!(g.id, g1.id);
            assert_eq!(g.event_id, copy.id);
            assert!(g.placement().is_none());
            assert!(!g.checked_in);
            assert!(g.checked_in_at.is_none() && g.checked_in_by.is_none());
        }
        assert!(store.get_layout(&copy.id).unwrap().tables.is_empty());
    }

    #[test]
    fn duplicate_layout_and_guests_remaps_seats() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let (event, table, _, _) = seeded(&store);

        let copy = store
            .duplicate_scope(
                &event.id,
                DuplicateRequest {
                    new_name: "Gala 2027".into(),
                    new_date: date("2027-06-01T18:00:00Z"),
                    copy_layout: true,
                    copy_guests: true,
                },
            )
            .unwrap();

        let tables = store.get_layout(&copy.id).unwrap().tables;
        assert_eq!(tables[0].id, table.id);
        assert_eq!(tables[0].seats[0].id, table.seats[0].id);
        let seated = store
            .list_guests(&copy.id, &Default::default())
            .unwrap()
            .into_iter()
            .find(|g| g.full_name == "Ada")
            .unwrap();
        assert_eq!(tables[0].seats[0].guest_id.as_deref(), Some(seated.id.as_str()));
        assert_eq!(tables[0].seats[0].status, SeatStatus::Assigned);
        assert!(seated.is_seated_at(&table.id, &table.seats[0].id));
        assert!(store.check_integrity(&copy.id).unwrap().is_empty());
    }

    #[test]
    fn duplicate_layout_only_leaves_seats_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let (event, ..) = seeded(&store);

        let copy = store
            .duplicate_scope(
                &event.id,
                DuplicateRequest {
                    new_name: "Gala 2027".into(),
                    new_date: date("2027-06-01T18:00:00Z"),
                    copy_layout: true,
                    copy_guests: false,
                },
            )
            .unwrap();

        let tables = store.get_layout(&copy.id).unwrap().tables;
        assert_eq!(tables.len(), 1);
        assert!(tables[0].seats.iter().all(|s| !s.is_occupied()));
        assert!(store.list_guests(&copy.id, &Default::default()).unwrap().is_empty());
    }

    #[test]
    fn duplicate_missing_source_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let err = store
            .duplicate_scope(
                "EVNOPE0000",
                DuplicateRequest {
                    new_name: "Copy".into(),
                    new_date: date("2027-06-01T18:00:00Z"),
                    copy_layout: true,
                    copy_guests: true,
                },
            )
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(store.list_events().unwrap().is_empty());
    }

    // ── Summaries ──────────────────────────────────────────────────

    #[test]
    fn summary_counts_guests_and_seats() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let (event, ..) = seeded(&store);

        let summary = store.event_summary(&event.id).unwrap();
        assert_eq!(summary.total_guests, 2);
        assert_eq!(summary.checked_in_count, 1);
        assert_eq!(summary.checked_out_count, 0);
        assert_eq!(summary.total_tables, 1);
        assert_eq!(summary.total_seats, 4);
        assert_eq!(summary.assigned_seats, 1);
        assert_eq!(store.list_summaries().unwrap(), vec![summary]);
    }
}
