//! checkin-store: embedded document store for event check-in.
//!
//! Persists each collection (users, or one event's event record, tables,
//! guests and layout settings) as a single JSON file, serves reads from an
//! in-memory cache of immutable snapshots, and serializes writers per
//! collection with a bounded-wait lock followed by an atomic file replace.
//!
//! # Architecture
//!
//! ```text
//! data/
//!   users.json
//!   events/{event_id}/event.json
//!   events/{event_id}/tables.json
//!   events/{event_id}/guests.json
//!   events/{event_id}/layout_config.json
//! ```
//!
//! All mutations go through [`Store::update`], which re-reads the current
//! snapshot under the collection lock, applies the change to a private copy,
//! commits it to disk and only then publishes it to the cache. Readers never
//! take collection locks and never observe partial state.
//!
//! On top of the raw collections sit the event scope lifecycle
//! (create/delete/duplicate), guest and user CRUD, table layout management,
//! and the seat-assignment protocol that keeps seat occupancy and guest
//! placement in agreement.
//!
//! The `Store` is `Clone` + `Send` + `Sync` (backed by an `Arc`) and can be
//! shared across threads.

pub mod cache;
pub mod change;
pub mod clock;
pub mod collection;
pub mod error;
pub mod events;
pub mod guests;
pub mod layout;
mod locks;
pub mod seats;
pub mod seating;
pub mod store;
pub mod types;
pub mod users;

pub use cache::CacheStats;
pub use change::{ChangeEvent, ChangeLog, ChangeSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use collection::{CollectionId, CollectionKind, Document, Scope};
pub use error::{StoreError, StoreResult};
pub use seating::{AssignOutcome, CascadeOutcome, IntegrityViolation, SeatRef, UnassignOutcome};
pub use store::Store;
pub use types::*;
