//! Seat assignment protocol.
//!
//! Keeps seat occupancy (`Seat::guest_id`) and guest placement
//! (`Guest::table_id`/`seat_id`) in agreement. Every operation mutates the
//! Tables collection in one locked update, then the Guests collection in a
//! second one, and only builds its change events once both have committed.
//!
//! The two writes are not atomic with respect to each other. A crash or a
//! lock timeout between them leaves the Tables side ahead of the Guests
//! side until the operation is repeated; [`Store::check_integrity`] reports
//! any such leftovers.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::change::ChangeEvent;
use crate::collection::Scope;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{Guest, GuestId, SeatId, SeatStatus, Table, TableId, find, find_mut};

/// A seat address within an event.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SeatRef {
    pub table_id: TableId,
    pub seat_id: SeatId,
}

impl SeatRef {
    fn new(table_id: &str, seat_id: &str) -> Self {
        Self {
            table_id: table_id.to_string(),
            seat_id: seat_id.to_string(),
        }
    }
}

/// Result of [`Store::assign`].
#[derive(Debug, Clone, PartialEq)]
pub struct AssignOutcome {
    /// The assigned guest as committed.
    pub guest: Guest,
    /// Guests whose records claimed the target seat, now unseated.
    pub displaced: Vec<Guest>,
    /// Seat the guest held before, now vacated.
    pub previous: Option<SeatRef>,
    pub changes: Vec<ChangeEvent>,
}

/// Result of [`Store::unassign`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnassignOutcome {
    /// `false` when the pairing was already clear and nothing was written.
    pub changed: bool,
    pub guest: Guest,
    pub changes: Vec<ChangeEvent>,
}

/// Result of [`Store::delete_table`].
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeOutcome {
    /// The removed table, as it was before removal. `None` when an earlier
    /// attempt already removed it and only the guests were left to clear.
    pub table: Option<Table>,
    /// Guests whose placement pointed at the table, now cleared.
    pub unassigned: Vec<Guest>,
    pub changes: Vec<ChangeEvent>,
}

/// A disagreement between the Tables and Guests collections of one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// The seat names a guest that does not point back at it.
    SeatNotClaimed { seat: SeatRef, guest_id: GuestId },
    /// The guest points at a seat that does not name them.
    ClaimNotHeld { guest_id: GuestId, seat: SeatRef },
    /// Occupant and status disagree.
    SeatStatusMismatch { seat: SeatRef },
    /// The seat's `checked_in` status disagrees with its occupant's
    /// check-in state.
    CheckInMismatch { seat: SeatRef, guest_id: GuestId },
    /// The guest occupies more than one seat.
    MultipleSeats { guest_id: GuestId, seats: Vec<SeatRef> },
}

impl Store {
    /// Seat `guest_id` at `(table_id, seat_id)`.
    ///
    /// Any other seat the guest holds anywhere in the event is vacated. If
    /// the target seat holds someone else, that guest is displaced: the new
    /// guest always ends up with the seat.
    pub fn assign(
        &self,
        event_id: &str,
        table_id: &str,
        seat_id: &str,
        guest_id: &str,
        actor: &str,
    ) -> StoreResult<AssignOutcome> {
        let scope = Scope::event(event_id);
        let before = self.get_guest(event_id, guest_id)?;

        let vacated = self.update(&scope, |tables: &mut Vec<Table>| {
            let target = find(tables, table_id)
                .ok_or_else(|| StoreError::not_found("table", table_id))?;
            if target.seat(seat_id).is_none() {
                return Err(StoreError::not_found("seat", seat_id));
            }

            let mut vacated = None;
            for table in tables.iter_mut() {
                for seat in table.seats.iter_mut() {
                    let is_target = table.id == table_id && seat.id == seat_id;
                    if !is_target && seat.is_held_by(guest_id) {
                        seat.vacate();
                        vacated.get_or_insert_with(|| SeatRef::new(&table.id, &seat.id));
                    }
                }
            }

            let seat = find_mut(tables, table_id)
                .and_then(|t| t.seat_mut(seat_id))
                .ok_or_else(|| StoreError::not_found("seat", seat_id))?;
            seat.occupy(guest_id, before.checked_in);
            Ok(vacated)
        })?;

        // Every other guest whose record claims the target seat is unseated,
        // including one left behind by an earlier attempt.
        let now = self.now();
        let (guest, displaced) = self.update(&scope, |guests: &mut Vec<Guest>| {
            let mut displaced = Vec::new();
            for other in guests
                .iter_mut()
                .filter(|g| g.id != guest_id && g.is_seated_at(table_id, seat_id))
            {
                other.clear_placement(now);
                displaced.push(other.clone());
            }
            let guest = find_mut(guests, guest_id)
                .ok_or_else(|| StoreError::not_found("guest", guest_id))?;
            if !guest.is_seated_at(table_id, seat_id) {
                guest.place(table_id, seat_id, now);
            }
            Ok((guest.clone(), displaced))
        })?;
        self.sync_seat_status(event_id, guest_id)?;

        let previous = vacated.or_else(|| {
            // Guest record pointed elsewhere without a matching seat.
            before
                .placement()
                .filter(|&placed| placed != (table_id, seat_id))
                .map(|(t, s)| SeatRef::new(t, s))
        });
        let mut changes = Vec::with_capacity(displaced.len() + 1);
        for other in &displaced {
            changes.push(ChangeEvent::SeatUnassigned {
                event_id: event_id.to_string(),
                guest_id: other.id.clone(),
                table_id: table_id.to_string(),
                seat_id: Some(seat_id.to_string()),
                unassigned_by: actor.to_string(),
                timestamp: now,
            });
        }
        changes.push(ChangeEvent::SeatAssigned {
            event_id: event_id.to_string(),
            guest_id: guest_id.to_string(),
            table_id: table_id.to_string(),
            seat_id: seat_id.to_string(),
            previous: previous
                .as_ref()
                .map(|p| (p.table_id.clone(), p.seat_id.clone())),
            guest: guest.clone(),
            assigned_by: actor.to_string(),
            timestamp: now,
        });

        debug!(
            event_id,
            table_id,
            seat_id,
            guest_id,
            displaced = displaced.len(),
            "seat assigned"
        );
        Ok(AssignOutcome {
            guest,
            displaced,
            previous,
            changes,
        })
    }

    /// Clear the pairing between `guest_id` and `(table_id, seat_id)`.
    ///
    /// Each side is only cleared if it points at the other, so unassigning
    /// a pairing that is already clear changes nothing and is not an error,
    /// even when the table or seat is gone. Only a missing guest is
    /// `NotFound`.
    pub fn unassign(
        &self,
        event_id: &str,
        table_id: &str,
        seat_id: &str,
        guest_id: &str,
        actor: &str,
    ) -> StoreResult<UnassignOutcome> {
        let scope = Scope::event(event_id);
        self.get_guest(event_id, guest_id)?;

        // A table or seat that no longer exists holds nobody.
        let seat_cleared = self.update(&scope, |tables: &mut Vec<Table>| {
            Ok(find_mut(tables, table_id)
                .and_then(|t| t.seat_mut(seat_id))
                .is_some_and(|seat| seat.is_held_by(guest_id) && seat.vacate().is_some()))
        })?;

        let now = self.now();
        let (guest, guest_cleared) = self.update(&scope, |guests: &mut Vec<Guest>| {
            let guest = find_mut(guests, guest_id)
                .ok_or_else(|| StoreError::not_found("guest", guest_id))?;
            let cleared = guest.is_seated_at(table_id, seat_id);
            if cleared {
                guest.clear_placement(now);
            }
            Ok((guest.clone(), cleared))
        })?;

        let changed = seat_cleared || guest_cleared;
        let mut changes = Vec::new();
        if changed {
            changes.push(ChangeEvent::SeatUnassigned {
                event_id: event_id.to_string(),
                guest_id: guest_id.to_string(),
                table_id: table_id.to_string(),
                seat_id: Some(seat_id.to_string()),
                unassigned_by: actor.to_string(),
                timestamp: now,
            });
            debug!(event_id, table_id, seat_id, guest_id, "seat unassigned");
        }
        Ok(UnassignOutcome {
            changed,
            guest,
            changes,
        })
    }

    /// Remove a table and unseat every guest placed at it.
    ///
    /// The table is removed first so that a failure of the second write can
    /// only leave guests pointing at a table that no longer exists, never a
    /// seat pointing at a guest that was cleared. Repeating the call then
    /// clears those guests. `NotFound` only if neither the table nor any
    /// guest placed at it exists.
    pub fn delete_table(
        &self,
        event_id: &str,
        table_id: &str,
        actor: &str,
    ) -> StoreResult<CascadeOutcome> {
        let scope = Scope::event(event_id);

        let table = self.update(&scope, |tables: &mut Vec<Table>| {
            Ok(tables
                .iter()
                .position(|t| t.id == table_id)
                .map(|index| tables.remove(index)))
        })?;

        // Runs even if the table was already gone, so a retry finishes a
        // cascade whose Guests write failed.
        let now = self.now();
        let unassigned = self.update(&scope, |guests: &mut Vec<Guest>| {
            let mut before = Vec::new();
            for guest in guests
                .iter_mut()
                .filter(|g| g.table_id.as_deref() == Some(table_id))
            {
                before.push(guest.clone());
                guest.clear_placement(now);
            }
            if table.is_none() && before.is_empty() {
                return Err(StoreError::not_found("table", table_id));
            }
            Ok(before)
        })?;

        let mut changes: Vec<ChangeEvent> = unassigned
            .iter()
            .map(|g| ChangeEvent::SeatUnassigned {
                event_id: event_id.to_string(),
                guest_id: g.id.clone(),
                table_id: table_id.to_string(),
                seat_id: g.seat_id.clone(),
                unassigned_by: actor.to_string(),
                timestamp: now,
            })
            .collect();
        changes.push(self.layout_changed(event_id, actor));

        let unassigned = unassigned
            .into_iter()
            .map(|mut g| {
                g.clear_placement(now);
                g
            })
            .collect::<Vec<_>>();

        info!(event_id, table_id, unassigned = unassigned.len(), "table deleted");
        Ok(CascadeOutcome {
            table,
            unassigned,
            changes,
        })
    }

    /// Every disagreement between seats and guest placements in one event.
    pub fn check_integrity(&self, event_id: &str) -> StoreResult<Vec<IntegrityViolation>> {
        let scope = Scope::event(event_id);
        let tables = self.read::<Vec<Table>>(&scope)?;
        let guests = self.read::<Vec<Guest>>(&scope)?;
        Ok(integrity_violations(&tables, &guests))
    }
}

pub(crate) fn integrity_violations(tables: &[Table], guests: &[Guest]) -> Vec<IntegrityViolation> {
    let mut violations = Vec::new();

    for table in tables {
        for seat in &table.seats {
            let at = SeatRef::new(&table.id, &seat.id);
            let occupied = seat.guest_id.is_some();
            let unassigned = seat.status == SeatStatus::Unassigned;
            if occupied == unassigned {
                violations.push(IntegrityViolation::SeatStatusMismatch { seat: at.clone() });
            }
            if let Some(guest_id) = &seat.guest_id {
                let occupant = find(guests, guest_id);
                if occupant.is_some_and(|g| {
                    seat.status != SeatStatus::Unassigned
                        && g.checked_in != (seat.status == SeatStatus::CheckedIn)
                }) {
                    violations.push(IntegrityViolation::CheckInMismatch {
                        seat: at.clone(),
                        guest_id: guest_id.clone(),
                    });
                }
                let claimed = occupant.is_some_and(|g| g.is_seated_at(&table.id, &seat.id));
                if !claimed {
                    violations.push(IntegrityViolation::SeatNotClaimed {
                        seat: at,
                        guest_id: guest_id.clone(),
                    });
                }
            }
        }
    }

    for guest in guests {
        if let Some((table_id, seat_id)) = guest.placement() {
            let held = find(tables, table_id)
                .and_then(|t| t.seat(seat_id))
                .is_some_and(|s| s.is_held_by(&guest.id));
            if !held {
                violations.push(IntegrityViolation::ClaimNotHeld {
                    guest_id: guest.id.clone(),
                    seat: SeatRef::new(table_id, seat_id),
                });
            }
        }
        let seats: Vec<SeatRef> = tables
            .iter()
            .flat_map(|t| {
                t.seats
                    .iter()
                    .filter(|s| s.is_held_by(&guest.id))
                    .map(|s| SeatRef::new(&t.id, &s.id))
            })
            .collect();
        if seats.len() > 1 {
            violations.push(IntegrityViolation::MultipleSeats {
                guest_id: guest.id.clone(),
                seats,
            });
        }
    }

    violations
}
