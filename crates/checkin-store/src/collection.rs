//! Collection identities and the documents stored under them.
//!
//! A collection is identified by `(Scope, CollectionKind)` and maps to
//! exactly one file below the data directory:
//!
//! | identity                     | file                               |
//! |------------------------------|------------------------------------|
//! | `(Global, Users)`            | `users.json`                       |
//! | `(Event(id), Event)`         | `events/{id}/event.json`           |
//! | `(Event(id), Tables)`        | `events/{id}/tables.json`          |
//! | `(Event(id), Guests)`        | `events/{id}/guests.json`          |
//! | `(Event(id), LayoutConfig)`  | `events/{id}/layout_config.json`   |

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StoreError, StoreResult};
use crate::types::{Event, EventId, Guest, LayoutSettings, Table, User};

/// Directory (below the data root) holding one sub-directory per event.
pub const EVENTS_DIR: &str = "events";

/// Namespace a collection belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Event(EventId),
}

impl Scope {
    pub fn event(id: impl Into<EventId>) -> Self {
        Scope::Event(id.into())
    }
}

/// Kind of records a collection holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionKind {
    Users,
    Event,
    Tables,
    Guests,
    LayoutConfig,
}

impl CollectionKind {
    /// The four kinds that make up an event scope, in lock order.
    pub const EVENT_SCOPED: [CollectionKind; 4] = [
        CollectionKind::Event,
        CollectionKind::Tables,
        CollectionKind::Guests,
        CollectionKind::LayoutConfig,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            CollectionKind::Users => "users.json",
            CollectionKind::Event => "event.json",
            CollectionKind::Tables => "tables.json",
            CollectionKind::Guests => "guests.json",
            CollectionKind::LayoutConfig => "layout_config.json",
        }
    }

    pub fn is_event_scoped(self) -> bool {
        !matches!(self, CollectionKind::Users)
    }

    pub fn label(self) -> &'static str {
        match self {
            CollectionKind::Users => "users",
            CollectionKind::Event => "event",
            CollectionKind::Tables => "tables",
            CollectionKind::Guests => "guests",
            CollectionKind::LayoutConfig => "layout_config",
        }
    }
}

/// Stable identity of one collection file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionId {
    scope: Scope,
    kind: CollectionKind,
}

impl CollectionId {
    pub fn new(scope: Scope, kind: CollectionKind) -> Self {
        Self { scope, kind }
    }

    pub fn users() -> Self {
        Self::new(Scope::Global, CollectionKind::Users)
    }

    pub fn for_event(event_id: &str, kind: CollectionKind) -> Self {
        Self::new(Scope::event(event_id), kind)
    }

    /// All collections of one event scope, in lock order.
    pub fn event_scope(event_id: &str) -> Vec<Self> {
        CollectionKind::EVENT_SCOPED
            .iter()
            .map(|kind| Self::for_event(event_id, *kind))
            .collect()
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// Path relative to the data root.
    ///
    /// Rejects scope/kind pairings that have no backing file and event ids
    /// that could escape the events directory.
    pub fn relative_path(&self) -> StoreResult<PathBuf> {
        match (&self.scope, self.kind.is_event_scoped()) {
            (Scope::Global, false) => Ok(PathBuf::from(self.kind.file_name())),
            (Scope::Event(id), true) => {
                if !is_valid_event_id(id) {
                    return Err(StoreError::Invalid(format!("invalid event id {id:?}")));
                }
                Ok(PathBuf::from(EVENTS_DIR)
                    .join(id)
                    .join(self.kind.file_name()))
            }
            _ => Err(StoreError::Invalid(format!(
                "collection {} does not belong to scope {:?}",
                self.kind.label(),
                self.scope
            ))),
        }
    }
}

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Scope::Global => write!(f, "{}", self.kind.label()),
            Scope::Event(id) => write!(f, "{EVENTS_DIR}/{id}/{}", self.kind.label()),
        }
    }
}

/// Event ids double as directory names.
pub fn is_valid_event_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 64
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// A decoded collection file.
///
/// `Default` is the "never written" value returned for absent files.
/// `PartialEq` lets [`crate::Store::update`] skip writes that change nothing.
pub trait Document:
    Serialize + DeserializeOwned + Clone + Default + PartialEq + Send + Sync + 'static
{
    const KIND: CollectionKind;
}

impl Document for Vec<User> {
    const KIND: CollectionKind = CollectionKind::Users;
}

impl Document for Option<Event> {
    const KIND: CollectionKind = CollectionKind::Event;
}

impl Document for Vec<Table> {
    const KIND: CollectionKind = CollectionKind::Tables;
}

impl Document for Vec<Guest> {
    const KIND: CollectionKind = CollectionKind::Guests;
}

impl Document for LayoutSettings {
    const KIND: CollectionKind = CollectionKind::LayoutConfig;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn identities_map_to_distinct_paths() {
        let mut paths = HashSet::new();
        paths.insert(CollectionId::users().relative_path().unwrap());
        for id in ["EV0001", "EV0002"] {
            for cid in CollectionId::event_scope(id) {
                assert!(paths.insert(cid.relative_path().unwrap()), "{cid} aliased");
            }
        }
        assert_eq!(paths.len(), 9);
    }

    #[test]
    fn event_paths_nest_under_events_dir() {
        let cid = CollectionId::for_event("EVABCD1234", CollectionKind::Guests);
        assert_eq!(
            cid.relative_path().unwrap(),
            PathBuf::from("events/EVABCD1234/guests.json")
        );
        assert_eq!(cid.to_string(), "events/EVABCD1234/guests");
    }

    #[test]
    fn rejects_traversal_and_mismatched_scope() {
        let cid = CollectionId::for_event("../etc", CollectionKind::Tables);
        assert!(matches!(cid.relative_path(), Err(StoreError::Invalid(_))));

        let cid = CollectionId::new(Scope::Global, CollectionKind::Guests);
        assert!(matches!(cid.relative_path(), Err(StoreError::Invalid(_))));

        let cid = CollectionId::new(Scope::event("EV1"), CollectionKind::Users);
        assert!(matches!(cid.relative_path(), Err(StoreError::Invalid(_))));
    }
}
