//! Domain types for the check-in store.
//!
//! These types represent the persisted state of events, table layouts,
//! guests and users, plus the request/patch payloads accepted by the store
//! operations. All persisted types are serializable to/from JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for an event (`EV` + 8 hex characters).
pub type EventId = String;

/// Unique identifier for a table within an event.
pub type TableId = String;

/// Unique identifier for a seat within a table.
pub type SeatId = String;

/// Unique identifier for a guest within an event.
pub type GuestId = String;

/// Unique identifier for a user.
pub type UserId = String;

/// Anything stored in a collection sequence.
pub trait Record {
    fn id(&self) -> &str;
}

/// Find a record by id.
pub fn find<'a, R: Record>(records: &'a [R], id: &str) -> Option<&'a R> {
    records.iter().find(|r| r.id() == id)
}

/// Find a record by id, mutably.
pub fn find_mut<'a, R: Record>(records: &'a mut [R], id: &str) -> Option<&'a mut R> {
    records.iter_mut().find(|r| r.id() == id)
}

pub(crate) fn new_record_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ── Event ─────────────────────────────────────────────────────────

/// Publication state of an event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    #[default]
    Draft,
    Active,
    Archived,
}

/// The event record at the root of an event scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: EventId,
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    #[serde(default)]
    pub status: EventStatus,
    /// Opaque actor id of the creator.
    pub created_by: Option<UserId>,
    pub floor_plan_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating an event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewEvent {
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub created_by: Option<UserId>,
}

/// Partial event update; `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub status: Option<EventStatus>,
}

/// Parameters for cloning an event scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DuplicateRequest {
    pub new_name: String,
    pub new_date: DateTime<Utc>,
    pub copy_layout: bool,
    pub copy_guests: bool,
}

/// Aggregated counters for one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventSummary {
    pub id: EventId,
    pub name: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub status: EventStatus,
    pub total_guests: usize,
    pub checked_in_count: usize,
    /// Guests that checked in and later left.
    pub checked_out_count: usize,
    pub total_tables: usize,
    pub total_seats: usize,
    pub assigned_seats: usize,
}

// ── Layout ────────────────────────────────────────────────────────

/// 2D coordinates on the floor-plan canvas.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableShape {
    Round,
    Rectangular,
}

/// Occupancy state of a seat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatStatus {
    #[default]
    Unassigned,
    Assigned,
    CheckedIn,
}

/// A seat, positioned relative to its table's centre.
///
/// `guest_id.is_some()` holds exactly when `status != Unassigned`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Seat {
    pub id: SeatId,
    pub position: Position,
    #[serde(default)]
    pub rotation: f64,
    pub guest_id: Option<GuestId>,
    #[serde(default)]
    pub status: SeatStatus,
}

impl Seat {
    pub fn is_occupied(&self) -> bool {
        self.guest_id.is_some()
    }

    pub fn is_held_by(&self, guest_id: &str) -> bool {
        self.guest_id.as_deref() == Some(guest_id)
    }

    pub(crate) fn occupy(&mut self, guest_id: &str, checked_in: bool) {
        self.guest_id = Some(guest_id.to_string());
        self.status = if checked_in {
            SeatStatus::CheckedIn
        } else {
            SeatStatus::Assigned
        };
    }

    /// Clear the occupant, returning who was sitting here.
    pub(crate) fn vacate(&mut self) -> Option<GuestId> {
        self.status = SeatStatus::Unassigned;
        self.guest_id.take()
    }
}

impl Record for Seat {
    fn id(&self) -> &str {
        &self.id
    }
}

/// A table on the floor plan together with the seats it owns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub id: TableId,
    pub shape: TableShape,
    /// Absolute position on the canvas.
    pub position: Position,
    #[serde(default)]
    pub rotation: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub seats: Vec<Seat>,
}

impl Table {
    pub fn seat(&self, seat_id: &str) -> Option<&Seat> {
        find(&self.seats, seat_id)
    }

    pub fn seat_mut(&mut self, seat_id: &str) -> Option<&mut Seat> {
        find_mut(&mut self.seats, seat_id)
    }

    pub fn occupied_seats(&self) -> usize {
        self.seats.iter().filter(|s| s.is_occupied()).count()
    }
}

impl Record for Table {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Payload for adding a table; seats are generated from the shape.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTable {
    pub shape: TableShape,
    pub position: Position,
    pub width: f64,
    pub height: f64,
    pub num_seats: u32,
    #[serde(default)]
    pub rotation: f64,
}

/// Partial table update; seats are not touched.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableUpdate {
    pub position: Option<Position>,
    pub rotation: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
}

/// Canvas settings for the layout editor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutConfig {
    pub grid_size: u32,
    pub snap_to_grid: bool,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub show_grid: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            grid_size: 20,
            snap_to_grid: true,
            canvas_width: 2000,
            canvas_height: 1500,
            show_grid: true,
        }
    }
}

/// Contents of `layout_config.json`. Stored as-is; an absent file reads
/// as both fields unset.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutSettings {
    pub config: Option<LayoutConfig>,
    pub floor_plan_url: Option<String>,
}

/// Tables plus settings, as handed to layout editors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Layout {
    pub tables: Vec<Table>,
    pub settings: LayoutSettings,
}

/// Partial settings update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LayoutUpdate {
    pub config: Option<LayoutConfig>,
    pub floor_plan_url: Option<String>,
}

// ── Guest ─────────────────────────────────────────────────────────

/// A guest of one event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Guest {
    pub id: GuestId,
    pub event_id: EventId,
    pub full_name: String,
    /// Unique within the event.
    pub phone: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub table_id: Option<TableId>,
    pub seat_id: Option<SeatId>,
    #[serde(default)]
    pub checked_in: bool,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_out_at: Option<DateTime<Utc>>,
    /// Opaque actor id of whoever checked the guest in.
    pub checked_in_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Guest {
    /// `(table_id, seat_id)` if the guest is seated.
    pub fn placement(&self) -> Option<(&str, &str)> {
        match (&self.table_id, &self.seat_id) {
            (Some(table), Some(seat)) => Some((table, seat)),
            _ => None,
        }
    }

    pub fn is_seated_at(&self, table_id: &str, seat_id: &str) -> bool {
        self.placement() == Some((table_id, seat_id))
    }

    pub(crate) fn place(&mut self, table_id: &str, seat_id: &str, now: DateTime<Utc>) {
        self.table_id = Some(table_id.to_string());
        self.seat_id = Some(seat_id.to_string());
        self.updated_at = now;
    }

    pub(crate) fn clear_placement(&mut self, now: DateTime<Utc>) {
        self.table_id = None;
        self.seat_id = None;
        self.updated_at = now;
    }

    /// Checked in at some point and currently not.
    pub fn has_checked_out(&self) -> bool {
        !self.checked_in && self.checked_out_at.is_some()
    }
}

impl Record for Guest {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Payload for creating a guest.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewGuest {
    pub full_name: String,
    pub phone: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

/// Partial guest update. Placement and check-in state are owned by the
/// seating protocol and the check-in workflow and cannot be patched here.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GuestUpdate {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl GuestUpdate {
    pub(crate) fn apply(&self, guest: &mut Guest) {
        if let Some(name) = &self.full_name {
            guest.full_name = name.clone();
        }
        if let Some(phone) = &self.phone {
            guest.phone = phone.clone();
        }
        if let Some(company) = &self.company {
            guest.company = Some(company.clone());
        }
        if let Some(email) = &self.email {
            guest.email = Some(email.clone());
        }
        if let Some(notes) = &self.notes {
            guest.notes = Some(notes.clone());
        }
    }
}

/// Guest list filter.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GuestFilter {
    /// Case-insensitive substring of the name, or substring of the phone.
    pub search: Option<String>,
    pub checked_in: Option<bool>,
}

impl GuestFilter {
    pub fn matches(&self, guest: &Guest) -> bool {
        if let Some(checked_in) = self.checked_in {
            if guest.checked_in != checked_in {
                return false;
            }
        }
        match &self.search {
            Some(needle) => {
                let needle_lower = needle.to_lowercase();
                guest.full_name.to_lowercase().contains(&needle_lower)
                    || guest.phone.contains(needle.as_str())
            }
            None => true,
        }
    }
}

/// Result of a bulk guest import.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImportReport {
    pub created: Vec<Guest>,
    pub rejected: Vec<ImportRejection>,
}

/// A row that was not imported, with its 1-based position in the batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImportRejection {
    pub row: usize,
    pub reason: String,
}

// ── User ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    SuperAdmin,
    Admin,
    Staff,
}

/// An operator account. Credentials are produced elsewhere; the store only
/// keeps the opaque password hash.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    #[serde(default = "default_true")]
    pub is_active: bool,
    pub hashed_password: String,
    #[serde(default)]
    pub assigned_events: Vec<EventId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

impl Record for User {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Payload for creating a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewUser {
    pub email: String,
    pub full_name: String,
    pub role: UserRole,
    pub hashed_password: String,
}

/// Partial user update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub role: Option<UserRole>,
    pub hashed_password: Option<String>,
    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(name: &str, phone: &str) -> Guest {
        let now = Utc::now();
        Guest {
            id: new_record_id(),
            event_id: "EV1".to_string(),
            full_name: name.to_string(),
            phone: phone.to_string(),
            company: None,
            email: None,
            notes: None,
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

    #[test]
    fn seat_occupy_and_vacate_keep_status_in_step() {
        let mut seat = Seat {
            id: "s1".into(),
            position: Position::default(),
            rotation: 0.0,
            guest_id: None,
            status: SeatStatus::Unassigned,
        };
        seat.occupy("g1", false);
        assert_eq!(seat.status, SeatStatus::Assigned);
        assert!(seat.is_held_by("g1"));

        seat.occupy("g1", true);
        assert_eq!(seat.status, SeatStatus::CheckedIn);

        assert_eq!(seat.vacate().as_deref(), Some("g1"));
        assert_eq!(seat.status, SeatStatus::Unassigned);
        assert!(!seat.is_occupied());
    }

    #[test]
    fn guest_filter_matches_name_and_phone() {
        let g = guest("Ada Lovelace", "5550001111");
        let by_name = GuestFilter {
            search: Some("lovelace".into()),
            checked_in: None,
        };
        let by_phone = GuestFilter {
            search: Some("0001".into()),
            checked_in: None,
        };
        let checked = GuestFilter {
            search: None,
            checked_in: Some(true),
        };
        assert!(by_name.matches(&g));
        assert!(by_phone.matches(&g));
        assert!(!checked.matches(&g));
        assert!(GuestFilter::default().matches(&g));
    }

    #[test]
    fn guest_update_leaves_unset_fields() {
        let mut g = guest("Ada", "5550001111");
        GuestUpdate {
            company: Some("Analytical Engines".into()),
            ..Default::default()
        }
        .apply(&mut g);
        assert_eq!(g.full_name, "Ada");
        assert_eq!(g.company.as_deref(), Some("Analytical Engines"));
    }

    #[test]
    fn enums_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&SeatStatus::CheckedIn).unwrap(),
            "\"checked_in\""
        );
        assert_eq!(
            serde_json::to_string(&UserRole::SuperAdmin).unwrap(),
            "\"super_admin\""
        );
        assert_eq!(
            serde_json::to_string(&TableShape::Rectangular).unwrap(),
            "\"rectangular\""
        );
    }

    #[test]
    fn user_defaults_when_fields_missing() {
        let json = r#"{
            "id": "u1",
            "email": "staff@example.com",
            "full_name": "Staff",
            "role": "staff",
            "hashed_password": "x",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.is_active);
        assert!(user.assigned_events.is_empty());
    }
}
