//! Guest records and the check-in workflow.
//!
//! Guest placement (`table_id`/`seat_id`) is owned by [`crate::seating`];
//! the operations here only touch it when a guest is deleted, and then only
//! after the seat has been vacated.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::change::ChangeEvent;
use crate::collection::Scope;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{
    Guest, GuestFilter, GuestId, GuestUpdate, ImportRejection, ImportReport, NewGuest, SeatStatus,
    Table, find, find_mut, new_record_id,
};

/// Trimmed copy of a new guest, or the reason it is unusable.
fn normalize(new: NewGuest) -> Result<NewGuest, String> {
    let full_name = new.full_name.trim().to_string();
    let phone = new.phone.trim().to_string();
    if full_name.is_empty() {
        return Err("full_name is required".into());
    }
    if phone.is_empty() {
        return Err("phone is required".into());
    }
    let trimmed = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
    Ok(NewGuest {
        full_name,
        phone,
        company: trimmed(new.company),
        email: trimmed(new.email),
        notes: trimmed(new.notes),
    })
}

fn phone_taken(guests: &[Guest], phone: &str, except: Option<&str>) -> bool {
    guests
        .iter()
        .any(|g| g.phone == phone && Some(g.id.as_str()) != except)
}

impl Store {
    // ── CRUD ───────────────────────────────────────────────────────

    pub fn create_guest(&self, event_id: &str, new: NewGuest) -> StoreResult<Guest> {
        let new = normalize(new).map_err(StoreError::Invalid)?;
        self.require_event(event_id)?;
        let limit = self.limits().max_guests_per_event;
        let now = self.now();

        let guest = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            if phone_taken(guests, &new.phone, None) {
                return Err(StoreError::Conflict(format!(
                    "a guest with phone {} already exists",
                    new.phone
                )));
            }
            if guests.len() >= limit {
                return Err(StoreError::LimitExceeded {
                    what: "guests",
                    limit,
                });
            }
            let guest = new_guest(event_id, new, now);
            guests.push(guest.clone());
            Ok(guest)
        })?;
        debug!(event_id, guest_id = %guest.id, "guest created");
        Ok(guest)
    }

    pub fn get_guest(&self, event_id: &str, guest_id: &str) -> StoreResult<Guest> {
        let guests = self.read::<Vec<Guest>>(&Scope::event(event_id))?;
        find(&guests, guest_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("guest", guest_id))
    }

    /// Guests matching `filter`, in insertion order.
    pub fn list_guests(&self, event_id: &str, filter: &GuestFilter) -> StoreResult<Vec<Guest>> {
        self.require_event(event_id)?;
        let guests = self.read::<Vec<Guest>>(&Scope::event(event_id))?;
        Ok(guests.iter().filter(|g| filter.matches(g)).cloned().collect())
    }

    pub fn update_guest(
        &self,
        event_id: &str,
        guest_id: &str,
        patch: GuestUpdate,
        actor: &str,
    ) -> StoreResult<(Guest, ChangeEvent)> {
        if patch.full_name.as_deref().is_some_and(|n| n.trim().is_empty())
            || patch.phone.as_deref().is_some_and(|p| p.trim().is_empty())
        {
            return Err(StoreError::Invalid("name and phone must not be empty".into()));
        }
        let now = self.now();
        let guest = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            if let Some(phone) = &patch.phone {
                if phone_taken(guests, phone.trim(), Some(guest_id)) {
                    return Err(StoreError::Conflict(format!(
                        "a guest with phone {} already exists",
                        phone.trim()
                    )));
                }
            }
            let guest = find_mut(guests, guest_id)
                .ok_or_else(|| StoreError::not_found("guest", guest_id))?;
            patch.apply(guest);
            guest.full_name = guest.full_name.trim().to_string();
            guest.phone = guest.phone.trim().to_string();
            guest.updated_at = now;
            Ok(guest.clone())
        })?;

        let change = ChangeEvent::GuestUpdated {
            event_id: event_id.to_string(),
            guest: guest.clone(),
            updated_by: actor.to_string(),
            timestamp: now,
        };
        Ok((guest, change))
    }

    /// Delete a guest, vacating their seat first so no seat is left pointing
    /// at a guest that no longer exists.
    pub fn delete_guest(
        &self,
        event_id: &str,
        guest_id: &str,
        actor: &str,
    ) -> StoreResult<Vec<ChangeEvent>> {
        self.get_guest(event_id, guest_id)?;
        let scope = Scope::event(event_id);

        let vacated = self.update(&scope, |tables: &mut Vec<Table>| {
            let mut vacated = None;
            for table in tables.iter_mut() {
                for seat in table.seats.iter_mut().filter(|s| s.is_held_by(guest_id)) {
                    seat.vacate();
                    vacated = Some((table.id.clone(), seat.id.clone()));
                }
            }
            Ok(vacated)
        })?;

        self.update(&scope, |guests: &mut Vec<Guest>| {
            let before = guests.len();
            guests.retain(|g| g.id != guest_id);
            if guests.len() == before {
                return Err(StoreError::not_found("guest", guest_id));
            }
            Ok(())
        })?;

        let now = self.now();
        let mut changes = Vec::with_capacity(2);
        if let Some((table_id, seat_id)) = vacated {
            changes.push(ChangeEvent::SeatUnassigned {
                event_id: event_id.to_string(),
                guest_id: guest_id.to_string(),
                table_id,
                seat_id: Some(seat_id),
                unassigned_by: actor.to_string(),
                timestamp: now,
            });
        }
        changes.push(ChangeEvent::GuestDeleted {
            event_id: event_id.to_string(),
            guest_id: guest_id.to_string(),
            deleted_by: actor.to_string(),
            timestamp: now,
        });
        info!(event_id, guest_id, "guest deleted");
        Ok(changes)
    }

    // ── Bulk ───────────────────────────────────────────────────────

    /// Import many guests in one write. Rows without a name or phone, or
    /// whose phone is already used, are rejected individually; exceeding the
    /// guest limit fails the whole batch.
    pub fn bulk_create_guests(&self, event_id: &str, rows: Vec<NewGuest>) -> StoreResult<ImportReport> {
        self.require_event(event_id)?;
        let limit = self.limits().max_guests_per_event;
        let now = self.now();

        let report = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            let mut report = ImportReport::default();
            let mut phones: HashSet<String> = guests.iter().map(|g| g.phone.clone()).collect();
            for (i, row) in rows.into_iter().enumerate() {
                let row_no = i + 1;
                let new = match normalize(row) {
                    Ok(new) => new,
                    Err(reason) => {
                        report.rejected.push(ImportRejection { row: row_no, reason });
                        continue;
                    }
                };
                if !phones.insert(new.phone.clone()) {
                    report.rejected.push(ImportRejection {
                        row: row_no,
                        reason: format!("duplicate phone {}", new.phone),
                    });
                    continue;
                }
                report.created.push(new_guest(event_id, new, now));
            }
            if guests.len() + report.created.len() > limit {
                return Err(StoreError::LimitExceeded {
                    what: "guests",
                    limit,
                });
            }
            guests.extend(report.created.iter().cloned());
            Ok(report)
        })?;

        info!(
            event_id,
            created = report.created.len(),
            rejected = report.rejected.len(),
            "guest import finished"
        );
        Ok(report)
    }

    /// Apply several patches in one write. Unknown ids are skipped.
    pub fn bulk_update_guests(
        &self,
        event_id: &str,
        patches: Vec<(GuestId, GuestUpdate)>,
        actor: &str,
    ) -> StoreResult<(Vec<Guest>, Vec<ChangeEvent>)> {
        let now = self.now();
        let updated = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            let mut updated = Vec::new();
            for (guest_id, patch) in &patches {
                if let Some(guest) = find_mut(guests, guest_id) {
                    patch.apply(guest);
                    guest.updated_at = now;
                    updated.push(guest.id.clone());
                }
            }
            let mut phones = HashSet::new();
            if let Some(dup) = guests.iter().find(|g| !phones.insert(g.phone.as_str())) {
                return Err(StoreError::Conflict(format!(
                    "a guest with phone {} already exists",
                    dup.phone
                )));
            }
            Ok(updated
                .iter()
                .filter_map(|id| find(guests, id).cloned())
                .collect::<Vec<_>>())
        })?;

        let changes = updated
            .iter()
            .map(|guest| ChangeEvent::GuestUpdated {
                event_id: event_id.to_string(),
                guest: guest.clone(),
                updated_by: actor.to_string(),
                timestamp: now,
            })
            .collect();
        Ok((updated, changes))
    }

    // ── Check-in ───────────────────────────────────────────────────

    /// Mark a guest as arrived. A seated guest's seat moves to `checked_in`.
    pub fn check_in(&self, event_id: &str, guest_id: &str, actor: &str) -> StoreResult<(Guest, ChangeEvent)> {
        let now = self.now();
        let guest = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            let guest = find_mut(guests, guest_id)
                .ok_or_else(|| StoreError::not_found("guest", guest_id))?;
            if guest.checked_in {
                return Err(StoreError::Conflict(format!(
                    "guest {guest_id} is already checked in"
                )));
            }
            guest.checked_in = true;
            guest.checked_in_at = Some(now);
            guest.checked_in_by = Some(actor.to_string());
            guest.updated_at = now;
            Ok(guest.clone())
        })?;
        self.sync_seat_status(event_id, guest_id)?;

        info!(event_id, guest_id, actor, "guest checked in");
        let change = ChangeEvent::GuestCheckedIn {
            event_id: event_id.to_string(),
            guest: guest.clone(),
            timestamp: now,
        };
        Ok((guest, change))
    }

    /// Mark a checked-in guest as gone. Their seat stays reserved.
    pub fn check_out(&self, event_id: &str, guest_id: &str, actor: &str) -> StoreResult<(Guest, ChangeEvent)> {
        let now = self.now();
        let guest = self.update(&Scope::event(event_id), |guests: &mut Vec<Guest>| {
            let guest = find_mut(guests, guest_id)
                .ok_or_else(|| StoreError::not_found("guest", guest_id))?;
            if !guest.checked_in {
                return Err(StoreError::Conflict(format!(
                    "guest {guest_id} is not checked in"
                )));
            }
            guest.checked_in = false;
            guest.checked_out_at = Some(now);
            guest.updated_at = now;
            Ok(guest.clone())
        })?;
        self.sync_seat_status(event_id, guest_id)?;

        info!(event_id, guest_id, actor, "guest checked out");
        let change = ChangeEvent::GuestCheckedOut {
            event_id: event_id.to_string(),
            guest: guest.clone(),
            timestamp: now,
        };
        Ok((guest, change))
    }

    /// Set the status of a guest's seat from the guest's committed check-in
    /// state.
    ///
    /// The guest is re-read under the Tables lock, so whichever of two racing
    /// callers syncs last sees every Guests commit that preceded both.
    pub(crate) fn sync_seat_status(&self, event_id: &str, guest_id: &str) -> StoreResult<()> {
        let scope = Scope::event(event_id);
        self.update(&scope, |tables: &mut Vec<Table>| {
            let guests = self.read::<Vec<Guest>>(&scope)?;
            let Some(guest) = find(&guests, guest_id) else {
                return Ok(());
            };
            let Some((table_id, seat_id)) = guest.placement() else {
                return Ok(());
            };
            if let Some(seat) = find_mut(tables, table_id).and_then(|t| t.seat_mut(seat_id)) {
                if seat.is_held_by(guest_id) {
                    seat.status = if guest.checked_in {
                        SeatStatus::CheckedIn
                    } else {
                        SeatStatus::Assigned
                    };
                }
            }
            Ok(())
        })
    }
}

fn new_guest(event_id: &str, new: NewGuest, now: chrono::DateTime<chrono::Utc>) -> Guest {
    Guest {
        id: new_record_id(),
        event_id: event_id.to_string(),
        full_name: new.full_name,
        phone: new.phone,
        company: new.company,
        email: new.email,
        notes: new.notes,
        table_id: None,
        seat_id: None,
        checked_in: false,
        checked_in_at: None,
        checked_out_at: None,
        checked_in_by: None,
        created_at: now,
        updated_at: now,
    }
}
