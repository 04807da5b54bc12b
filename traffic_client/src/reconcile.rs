//! Reconciliation.
//!
//! Merges server snapshots into the entity store at tick boundaries:
//! - vehicles are upserted by id and removed when missing from a snapshot,
//! - traffic lights are upserted and never removed,
//! - static layouts are replaced wholesale by their one-shot loads.
//!
//! Every structural change is reported back so the caller can keep the
//! renderer's resources in step within the same pass.

use std::collections::{HashMap, HashSet};

use traffic_shared::{
    entity::{Category, EntityId, VehicleKind},
    net::{AgentRecord, LayoutRecord, LightRecord, Snapshot},
};

use crate::store::{EntityStore, StaticEntity, TrafficLight, Vehicle};

/// Structural change produced by a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    VehicleSpawned(EntityId),
    /// The renderer must drop the body and wheel resources of this vehicle.
    VehicleRemoved(EntityId),
    LightAdded(EntityId),
}

/// Merges a tick snapshot. `now` is wall-clock seconds, used by crash timers.
pub fn reconcile(store: &mut EntityStore, snapshot: &Snapshot, now: f64) -> Vec<Lifecycle> {
    let mut events = reconcile_vehicles(store, &snapshot.vehicles, now);
    events.extend(reconcile_lights(store, &snapshot.lights));
    events
}

/// Upserts every vehicle in `records` and removes the ones it does not mention.
///
/// When a record id repeats, the last occurrence wins.
pub fn reconcile_vehicles(store: &mut EntityStore, records: &[AgentRecord], now: f64) -> Vec<Lifecycle> {
    let latest: HashMap<EntityId, &AgentRecord> = records.iter().map(|r| (r.id, r)).collect();
    let mut events = Vec::new();

    let mut ids: Vec<EntityId> = latest.keys().copied().collect();
    ids.sort();
    for id in ids {
        let record = latest[&id];
        match store.vehicles.get_mut(&id) {
            Some(vehicle) => {
                vehicle.wheels.advance(vehicle.motion.tick_distance());
                vehicle.motion.advance_to(record.position());
                vehicle.crash.merge(record.crashed.unwrap_or(false), record.crash_timer, now);
                vehicle.set_kind(VehicleKind::from_wire(record.kind.as_deref()));
            }
            None => {
                store.vehicles.insert(id, Vehicle::spawn(record, now));
                events.push(Lifecycle::VehicleSpawned(id));
            }
        }
    }

    let present: HashSet<EntityId> = latest.into_keys().collect();
    let mut gone: Vec<EntityId> = store
        .vehicles
        .keys()
        .filter(|id| !present.contains(id))
        .copied()
        .collect();
    gone.sort();
    for id in gone {
        store.vehicles.remove(&id);
        events.push(Lifecycle::VehicleRemoved(id));
    }
    events
}

/// Upserts traffic lights; the set only grows.
pub fn reconcile_lights(store: &mut EntityStore, records: &[LightRecord]) -> Vec<Lifecycle> {
    let mut events = Vec::new();
    for record in records {
        match store.lights.get_mut(&record.id) {
            Some(light) => {
                light.motion.advance_to(record.position());
                light.signal = record.state;
            }
            None => {
                store.lights.insert(record.id, TrafficLight::spawn(record));
                events.push(Lifecycle::LightAdded(record.id));
            }
        }
    }
    events
}

/// Replaces one static layout from its one-shot fetch.
pub fn load_statics(store: &mut EntityStore, category: Category, records: &[LayoutRecord]) {
    let build: fn(&LayoutRecord) -> StaticEntity = match category {
        Category::Obstacle => StaticEntity::obstacle,
        Category::Road => StaticEntity::road,
        Category::Destination => StaticEntity::destination,
        Category::Vehicle | Category::TrafficLight => return,
    };
    store.replace_statics(category, records.iter().map(build).collect());
}

#[cfg(test)]
mod tests {
    use traffic_shared::{entity::SignalState, math::Vec3};

    use super::*;

    fn agent(id: u64, x: f32, z: f32) -> AgentRecord {
        AgentRecord {
            id: EntityId(id),
            x,
            y: 0.0,
            z,
            kind: None,
            crashed: None,
            crash_timer: None,
        }
    }

    fn light(id: u64, state: SignalState) -> LightRecord {
        LightRecord {
            id: EntityId(id),
            x: id as f32,
            y: 1.0,
            z: 0.0,
            state,
        }
    }

    #[test]
    fn snapshot_replaces_vehicle_set() {
        let mut store = EntityStore::default();
        reconcile_vehicles(&mut store, &[agent(1, 0.0, 0.0), agent(2, 1.0, 0.0), agent(4, 2.0, 0.0)], 0.0);

        let events = reconcile_vehicles(&mut store, &[agent(1, 0.0, 1.0), agent(2, 1.0, 1.0), agent(3, 5.0, 5.0)], 1.0);
        assert_eq!(store.vehicle_ids(), vec![EntityId(1), EntityId(2), EntityId(3)]);
        assert_eq!(
            events,
            vec![Lifecycle::VehicleSpawned(EntityId(3)), Lifecycle::VehicleRemoved(EntityId(4))]
        );

        let fresh = store.vehicle(EntityId(3)).unwrap();
        assert_eq!(fresh.motion.previous, fresh.motion.current);
        assert_eq!(fresh.motion.current, Vec3::new(5.0, 0.0, 5.0));

        let moved = store.vehicle(EntityId(1)).unwrap();
        assert_eq!(moved.motion.previous, Vec3::new(0.0, 0.0, 0.0));
        assert_eq!(moved.motion.current, Vec3::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn duplicate_ids_keep_the_last_record() {
        let mut store = EntityStore::default();
        reconcile_vehicles(&mut store, &[agent(7, 0.0, 0.0), agent(7, 3.0, 0.0)], 0.0);
        assert_eq!(store.vehicle_count(), 1);
        assert_eq!(store.vehicle(EntityId(7)).unwrap().motion.current.x, 3.0);
    }

    #[test]
    fn update_copies_kind_and_crash_fields() {
        let mut store = EntityStore::default();
        reconcile_vehicles(&mut store, &[agent(1, 0.0, 0.0)], 0.0);

        let mut rec = agent(1, 0.0, 1.0);
        rec.kind = Some("erratic".into());
        rec.crashed = Some(true);
        rec.crash_timer = Some(3.0);
        reconcile_vehicles(&mut store, &[rec], 1.0);

        let v = store.vehicle(EntityId(1)).unwrap();
        assert_eq!(v.kind, VehicleKind::Erratic);
        assert!(v.crash.is_crashed(1.0));

        let mut rec = agent(1, 0.0, 2.0);
        rec.kind = None;
        reconcile_vehicles(&mut store, &[rec], 2.0);
        let v = store.vehicle(EntityId(1)).unwrap();
        assert_eq!(v.kind, VehicleKind::Sedan);
        assert!(!v.crash.is_crashed(2.0));
    }

    #[test]
    fn odometer_commits_the_finished_tick() {
        let mut store = EntityStore::default();
        reconcile_vehicles(&mut store, &[agent(1, 0.0, 0.0)], 0.0);
        reconcile_vehicles(&mut store, &[agent(1, 0.0, 2.0)], 1.0);
        assert_eq!(store.vehicle(EntityId(1)).unwrap().wheels.odometer, 0.0);
        reconcile_vehicles(&mut store, &[agent(1, 0.0, 3.0)], 2.0);
        assert_eq!(store.vehicle(EntityId(1)).unwrap().wheels.odometer, 2.0);
    }

    #[test]
    fn lights_are_upserted_never_removed() {
        let mut store = EntityStore::default();
        let events = reconcile_lights(&mut store, &[light(1, SignalState::Red), light(2, SignalState::Green)]);
        assert_eq!(events.len(), 2);

        let events = reconcile_lights(&mut store, &[light(1, SignalState::Green)]);
        assert!(events.is_empty());
        assert_eq!(store.light_count(), 2);
        assert_eq!(store.light(EntityId(1)).unwrap().signal, SignalState::Green);
        assert_eq!(store.light(EntityId(2)).unwrap().signal, SignalState::Green);
    }

    #[test]
    fn empty_snapshot_clears_vehicles_only() {
        let mut store = EntityStore::default();
        reconcile(
            &mut store,
            &Snapshot {
                vehicles: vec![agent(1, 0.0, 0.0)],
                lights: vec![light(9, SignalState::Yellow)],
                ..Snapshot::default()
            },
            0.0,
        );
        let events = reconcile(&mut store, &Snapshot::default(), 1.0);
        assert_eq!(events, vec![Lifecycle::VehicleRemoved(EntityId(1))]);
        assert_eq!(store.light_count(), 1);
    }

    #[test]
    fn statics_load_into_their_category() {
        let mut store = EntityStore::default();
        let rec = LayoutRecord {
            id: EntityId(5),
            x: 1.0,
            y: 0.0,
            z: 2.0,
            direction: Some("Right".into()),
        };
        load_statics(&mut store, Category::Road, &[rec.clone()]);
        load_statics(&mut store, Category::TrafficLight, &[rec]);
        assert_eq!(store.static_count(Category::Road), 1);
        assert_eq!(store.statics(Category::Road)[0].yaw, std::f32::consts::FRAC_PI_2);
    }
}
