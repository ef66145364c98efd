//! Post-commit change notifications.
//!
//! Store operations return the [`ChangeEvent`]s they caused alongside their
//! result. An event is only constructed after every write it describes has
//! been committed to disk, so a caller that forwards them to a broadcast
//! layer never announces state that was not persisted. Delivery is the
//! caller's business; the store performs no transport I/O.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::types::{EventId, Guest, GuestId, SeatId, TableId, UserId};

/// A committed change, addressed to observers of one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeEvent {
    SeatAssigned {
        event_id: EventId,
        guest_id: GuestId,
        table_id: TableId,
        seat_id: SeatId,
        /// Seat the guest held before this assignment, if any.
        previous: Option<(TableId, SeatId)>,
        guest: Guest,
        assigned_by: UserId,
        timestamp: DateTime<Utc>,
    },
    SeatUnassigned {
        event_id: EventId,
        guest_id: GuestId,
        table_id: TableId,
        seat_id: Option<SeatId>,
        unassigned_by: UserId,
        timestamp: DateTime<Utc>,
    },
    LayoutChanged {
        event_id: EventId,
        updated_by: UserId,
        timestamp: DateTime<Utc>,
    },
    GuestUpdated {
        event_id: EventId,
        guest: Guest,
        updated_by: UserId,
        timestamp: DateTime<Utc>,
    },
    GuestDeleted {
        event_id: EventId,
        guest_id: GuestId,
        deleted_by: UserId,
        timestamp: DateTime<Utc>,
    },
    GuestCheckedIn {
        event_id: EventId,
        guest: Guest,
        timestamp: DateTime<Utc>,
    },
    GuestCheckedOut {
        event_id: EventId,
        guest: Guest,
        timestamp: DateTime<Utc>,
    },
}

impl ChangeEvent {
    /// Broadcast room the change belongs to.
    pub fn event_id(&self) -> &str {
        match self {
            ChangeEvent::SeatAssigned { event_id, .. }
            | ChangeEvent::SeatUnassigned { event_id, .. }
            | ChangeEvent::LayoutChanged { event_id, .. }
            | ChangeEvent::GuestUpdated { event_id, .. }
            | ChangeEvent::GuestDeleted { event_id, .. }
            | ChangeEvent::GuestCheckedIn { event_id, .. }
            | ChangeEvent::GuestCheckedOut { event_id, .. } => event_id,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::SeatAssigned { .. } => "seat_assigned",
            ChangeEvent::SeatUnassigned { .. } => "seat_unassigned",
            ChangeEvent::LayoutChanged { .. } => "layout_changed",
            ChangeEvent::GuestUpdated { .. } => "guest_updated",
            ChangeEvent::GuestDeleted { .. } => "guest_deleted",
            ChangeEvent::GuestCheckedIn { .. } => "guest_checked_in",
            ChangeEvent::GuestCheckedOut { .. } => "guest_checked_out",
        }
    }

    /// Guest the change is about, if it concerns a single guest.
    pub fn guest_id(&self) -> Option<&str> {
        match self {
            ChangeEvent::SeatAssigned { guest_id, .. }
            | ChangeEvent::SeatUnassigned { guest_id, .. }
            | ChangeEvent::GuestDeleted { guest_id, .. } => Some(guest_id),
            ChangeEvent::GuestUpdated { guest, .. }
            | ChangeEvent::GuestCheckedIn { guest, .. }
            | ChangeEvent::GuestCheckedOut { guest, .. } => Some(&guest.id),
            ChangeEvent::LayoutChanged { .. } => None,
        }
    }
}

/// Receiver of committed changes (a websocket hub, a queue, a log).
pub trait ChangeSink: Send + Sync {
    fn publish(&self, change: &ChangeEvent);

    fn publish_all(&self, changes: &[ChangeEvent]) {
        for change in changes {
            self.publish(change);
        }
    }
}

impl<F> ChangeSink for F
where
    F: Fn(&ChangeEvent) + Send + Sync,
{
    fn publish(&self, change: &ChangeEvent) {
        self(change)
    }
}

/// In-memory sink that keeps everything it is handed, in order.
#[derive(Debug, Default)]
pub struct ChangeLog {
    entries: Mutex<Vec<ChangeEvent>>,
}

impl ChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take all recorded changes, leaving the log empty.
    pub fn drain(&self) -> Vec<ChangeEvent> {
        std::mem::take(&mut *self.entries.lock())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl ChangeSink for ChangeLog {
    fn publish(&self, change: &ChangeEvent) {
        self.entries.lock().push(change.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn layout_changed(event_id: &str) -> ChangeEvent {
        ChangeEvent::LayoutChanged {
            event_id: event_id.to_string(),
            updated_by: "admin".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn change_log_keeps_order_and_drains() {
        let log = ChangeLog::new();
        log.publish_all(&[layout_changed("EV1"), layout_changed("EV2")]);
        assert_eq!(log.len(), 2);

        let drained = log.drain();
        assert_eq!(drained[0].event_id(), "EV1");
        assert_eq!(drained[1].event_id(), "EV2");
        assert!(log.is_empty());
    }

    #[test]
    fn closures_are_sinks() {
        let seen = AtomicUsize::new(0);
        let sink = |_: &ChangeEvent| {
            seen.fetch_add(1, Ordering::Relaxed);
        };
        sink.publish(&layout_changed("EV1"));
        assert_eq!(seen.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn serializes_with_type_tag() {
        let json = serde_json::to_value(layout_changed("EV1")).unwrap();
        assert_eq!(json["type"], "layout_changed");
        assert_eq!(json["event_id"], "EV1");
        assert_eq!(layout_changed("EV1").name(), "layout_changed");
        assert_eq!(layout_changed("EV1").guest_id(), None);
    }
}
