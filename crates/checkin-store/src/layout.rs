//! Table layout management.

use tracing::debug;

use crate::change::ChangeEvent;
use crate::collection::Scope;
use crate::error::{StoreError, StoreResult};
use crate::seats::generate_seats;
use crate::store::Store;
use crate::types::{
    Event, Layout, LayoutSettings, LayoutUpdate, NewTable, Table, TableUpdate, find, find_mut,
    new_record_id,
};

/// Seats a single table may be created with.
pub const MAX_SEATS_PER_TABLE: u32 = 20;

fn check_dimensions(width: f64, height: f64) -> StoreResult<()> {
    // Negated comparison also rejects NaN.
    if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
        return Err(StoreError::Invalid(format!(
            "table dimensions must be positive, got {width}x{height}"
        )));
    }
    Ok(())
}

impl Store {
    /// Add a table with freshly generated seats.
    pub fn add_table(
        &self,
        event_id: &str,
        new: NewTable,
        actor: &str,
    ) -> StoreResult<(Table, ChangeEvent)> {
        if !(1..=MAX_SEATS_PER_TABLE).contains(&new.num_seats) {
            return Err(StoreError::Invalid(format!(
                "a table needs between 1 and {MAX_SEATS_PER_TABLE} seats, got {}",
                new.num_seats
            )));
        }
        check_dimensions(new.width, new.height)?;
        self.require_event(event_id)?;

        let limits = self.limits().clone();
        let table = Table {
            id: new_record_id(),
            shape: new.shape,
            position: new.position,
            rotation: new.rotation,
            width: new.width,
            height: new.height,
            seats: generate_seats(new.num_seats, new.shape, new.width, new.height),
        };

        let table = self.update(&Scope::event(event_id), |tables: &mut Vec<Table>| {
            if tables.len() >= limits.max_tables_per_event {
                return Err(StoreError::LimitExceeded {
                    what: "tables",
                    limit: limits.max_tables_per_event,
                });
            }
            let seats: usize = tables.iter().map(|t| t.seats.len()).sum();
            if seats + table.seats.len() > limits.max_seats_per_event {
                return Err(StoreError::LimitExceeded {
                    what: "seats",
                    limit: limits.max_seats_per_event,
                });
            }
            tables.push(table.clone());
            Ok(table)
        })?;

        debug!(event_id, table_id = %table.id, seats = table.seats.len(), "table added");
        Ok((table, self.layout_changed(event_id, actor)))
    }

    /// Move, rotate or resize a table. Seats keep their relative positions.
    pub fn update_table(
        &self,
        event_id: &str,
        table_id: &str,
        patch: TableUpdate,
        actor: &str,
    ) -> StoreResult<(Table, ChangeEvent)> {
        if patch.width.is_some() || patch.height.is_some() {
            check_dimensions(patch.width.unwrap_or(1.0), patch.height.unwrap_or(1.0))?;
        }
        let table = self.update(&Scope::event(event_id), |tables: &mut Vec<Table>| {
            let table = find_mut(tables, table_id)
                .ok_or_else(|| StoreError::not_found("table", table_id))?;
            if let Some(position) = patch.position {
                table.position = position;
            }
            if let Some(rotation) = patch.rotation {
                table.rotation = rotation;
            }
            if let Some(width) = patch.width {
                table.width = width;
            }
            if let Some(height) = patch.height {
                table.height = height;
            }
            Ok(table.clone())
        })?;
        Ok((table, self.layout_changed(event_id, actor)))
    }

    pub fn get_table(&self, event_id: &str, table_id: &str) -> StoreResult<Table> {
        let tables = self.read::<Vec<Table>>(&Scope::event(event_id))?;
        find(&tables, table_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("table", table_id))
    }

    /// Tables and canvas settings of one event.
    pub fn get_layout(&self, event_id: &str) -> StoreResult<Layout> {
        self.require_event(event_id)?;
        let scope = Scope::event(event_id);
        let tables = self.read::<Vec<Table>>(&scope)?;
        let settings = self.read::<LayoutSettings>(&scope)?;
        Ok(Layout {
            tables: (*tables).clone(),
            settings: (*settings).clone(),
        })
    }

    /// Replace the canvas config and/or floor plan. The floor plan URL is
    /// mirrored onto the event record.
    pub fn update_layout_settings(
        &self,
        event_id: &str,
        patch: LayoutUpdate,
        actor: &str,
    ) -> StoreResult<(LayoutSettings, ChangeEvent)> {
        self.require_event(event_id)?;
        let scope = Scope::event(event_id);
        let floor_plan_url = patch.floor_plan_url.clone();

        let settings = self.update(&scope, |settings: &mut LayoutSettings| {
            if let Some(config) = patch.config {
                settings.config = Some(config);
            }
            if let Some(url) = patch.floor_plan_url {
                settings.floor_plan_url = Some(url);
            }
            Ok(settings.clone())
        })?;

        if let Some(url) = floor_plan_url {
            let now = self.now();
            self.update(&scope, |doc: &mut Option<Event>| {
                let event = doc
                    .as_mut()
                    .ok_or_else(|| StoreError::not_found("event", event_id))?;
                if event.floor_plan_url.as_deref() != Some(url.as_str()) {
                    event.floor_plan_url = Some(url);
                    event.updated_at = now;
                }
                Ok(())
            })?;
        }
        Ok((settings, self.layout_changed(event_id, actor)))
    }

    pub(crate) fn layout_changed(&self, event_id: &str, actor: &str) -> ChangeEvent {
        ChangeEvent::LayoutChanged {
            event_id: event_id.to_string(),
            updated_by: actor.to_string(),
            timestamp: self.now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LayoutConfig, NewEvent, Position, TableShape};
    use checkin_core::CheckinConfig;

    fn store_with_limits(dir: &std::path::Path, tables: usize, seats: usize) -> Store {
        let mut config = CheckinConfig::default();
        config.storage.data_dir = dir.to_path_buf();
        config.limits.max_tables_per_event = tables;
        config.limits.max_seats_per_event = seats;
        Store::open(&config).unwrap()
    }

    fn event(store: &Store) -> String {
        store
            .create_scope(NewEvent {
                name: "Gala".into(),
                date: chrono::Utc::now(),
                location: "Hall".into(),
                description: None,
                created_by: None,
            })
            .unwrap()
            .id
    }

    fn table(num_seats: u32) -> NewTable {
        NewTable {
            shape: TableShape::Rectangular,
            position: Position::new(400.0, 300.0),
            width: 200.0,
            height: 100.0,
            num_seats,
            rotation: 0.0,
        }
    }

    #[test]
    fn add_table_generates_seats_and_reports_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event_id = event(&store);

        let (t, change) = store.add_table(&event_id, table(8), "admin").unwrap();
        assert_eq!(t.seats.len(), 8);
        assert_eq!(change.name(), "layout_changed");
        assert_eq!(change.event_id(), event_id);
        assert_eq!(store.get_table(&event_id, &t.id).unwrap(), t);
    }

    #[test]
    fn add_table_validates_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event_id = event(&store);

        for n in [0, 21] {
            let err = store.add_table(&event_id, table(n), "admin").unwrap_err();
            assert!(matches!(err, StoreError::Invalid(_)), "n={n}");
        }
        let mut flat = table(4);
        flat.height = 0.0;
        assert!(matches!(
            store.add_table(&event_id, flat, "admin"),
            Err(StoreError::Invalid(_))
        ));
        assert!(store.add_table("EVNOPE0000", table(4), "admin").unwrap_err().is_not_found());
        assert!(store.get_layout(&event_id).unwrap().tables.is_empty());
    }

    #[test]
    fn per_event_limits_apply() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_with_limits(dir.path(), 2, 12);
        let event_id = event(&store);

        store.add_table(&event_id, table(6), "admin").unwrap();
        let err = store.add_table(&event_id, table(8), "admin").unwrap_err();
        assert!(matches!(err, StoreError::LimitExceeded { what: "seats", limit: 12 }));

        store.add_table(&event_id, table(6), "admin").unwrap();
        let err = store.add_table(&event_id, table(1), "admin").unwrap_err();
        assert!(matches!(err, StoreError::LimitExceeded { what: "tables", limit: 2 }));
    }

    #[test]
    fn update_table_moves_without_touching_seats() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event_id = event(&store);
        let (t, _) = store.add_table(&event_id, table(4), "admin").unwrap();

        let (moved, _) = store
            .update_table(
                &event_id,
                &t.id,
                TableUpdate {
                    position: Some(Position::new(10.0, 20.0)),
                    rotation: Some(45.0),
                    ..Default::default()
                },
                "admin",
            )
            .unwrap();
        assert_eq!(moved.position, Position::new(10.0, 20.0));
        assert_eq!(moved.rotation, 45.0);
        assert_eq!(moved.seats, t.seats);

        let err = store
            .update_table(&event_id, "missing", TableUpdate::default(), "admin")
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn layout_settings_round_trip_and_mirror_floor_plan() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open_dir(dir.path()).unwrap();
        let event_id = event(&store);
        assert_eq!(store.get_layout(&event_id).unwrap().settings, LayoutSettings::default());

        let config = LayoutConfig {
            grid_size: 10,
            ..Default::default()
        };
        let (settings, _) = store
            .update_layout_settings(
                &event_id,
                LayoutUpdate {
                    config: Some(config.clone()),
                    floor_plan_url: Some("/uploads/plan.png".into()),
                },
                "admin",
            )
            .unwrap();
        assert_eq!(settings.config, Some(config));
        assert_eq!(
            store.get_event(&event_id).unwrap().floor_plan_url.as_deref(),
            Some("/uploads/plan.png")
        );
        assert_eq!(store.get_layout(&event_id).unwrap().settings, settings);
    }
}
