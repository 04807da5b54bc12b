//! Entity store.
//!
//! Holds every entity the client knows about, keyed by id per category.
//! The store is owned by the `Visualizer` and only the reconciler mutates the
//! dynamic categories, always at a tick boundary.

use std::collections::HashMap;

use traffic_shared::{
    entity::{Category, EntityId, RoadDirection, SignalState, VehicleKind},
    math::{Rgb, Vec3},
    net::{AgentRecord, LayoutRecord, LightRecord},
};

use crate::{crash::CrashTimer, wheels::WheelSet};

/// Ground displacement below which a tick does not change heading.
pub const HEADING_EPSILON: f32 = 1e-4;

/// Vehicle body scale.
pub const VEHICLE_SCALE: f32 = 0.35;

/// The (previous, current) pair the interpolator blends between.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Motion {
    pub previous: Vec3,
    pub current: Vec3,
    pub previous_yaw: f32,
    pub current_yaw: f32,
}

impl Motion {
    pub fn at_rest(position: Vec3, yaw: f32) -> Self {
        Self {
            previous: position,
            current: position,
            previous_yaw: yaw,
            current_yaw: yaw,
        }
    }

    /// Rotates the pair at a tick boundary: current becomes previous, `target` becomes current.
    ///
    /// The heading target follows the ground displacement unless the entity
    /// barely moved, in which case the last heading is held.
    pub fn advance_to(&mut self, target: Vec3) {
        self.previous = self.current;
        self.previous_yaw = self.current_yaw;
        let step = target.sub(self.previous);
        if step.ground_len() > HEADING_EPSILON {
            self.current_yaw = step.ground_yaw();
        }
        self.current = target;
    }

    /// Ground distance covered by the current tick.
    pub fn tick_distance(&self) -> f32 {
        self.previous.ground_distance(self.current)
    }
}

/// A moving agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Vehicle {
    pub id: EntityId,
    pub kind: VehicleKind,
    pub motion: Motion,
    pub scale: f32,
    pub color: Rgb,
    pub crash: CrashTimer,
    pub wheels: WheelSet,
}

impl Vehicle {
    /// Builds a vehicle first seen in a snapshot at wall-clock `now`.
    pub fn spawn(record: &AgentRecord, now: f64) -> Self {
        let kind = VehicleKind::from_wire(record.kind.as_deref());
        let mut crash = CrashTimer::default();
        crash.merge(record.crashed.unwrap_or(false), record.crash_timer, now);
        Self {
            id: record.id,
            kind,
            motion: Motion::at_rest(record.position(), 0.0),
            scale: VEHICLE_SCALE,
            color: kind.base_color(),
            crash,
            wheels: WheelSet::for_kind(kind),
        }
    }

    /// Changes archetype, keeping the odometer.
    pub fn set_kind(&mut self, kind: VehicleKind) {
        if kind != self.kind {
            self.kind = kind;
            self.color = kind.base_color();
            self.wheels.remount(kind);
        }
    }
}

/// A signal post.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficLight {
    pub id: EntityId,
    pub motion: Motion,
    pub signal: SignalState,
}

impl TrafficLight {
    pub fn spawn(record: &LightRecord) -> Self {
        Self {
            id: record.id,
            motion: Motion::at_rest(record.position(), 0.0),
            signal: record.state,
        }
    }
}

/// Obstacle, road or destination tile.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticEntity {
    pub id: EntityId,
    pub category: Category,
    pub position: Vec3,
    pub yaw: f32,
    pub scale: f32,
    pub color: Rgb,
}

impl StaticEntity {
    pub fn obstacle(record: &LayoutRecord) -> Self {
        Self::with_defaults(record, Category::Obstacle, 0.0, 0.5, Rgb::WHITE)
    }

    pub fn road(record: &LayoutRecord) -> Self {
        let yaw = RoadDirection::from_wire(record.direction.as_deref()).yaw();
        Self::with_defaults(record, Category::Road, yaw, 1.0, Rgb::WHITE)
    }

    pub fn destination(record: &LayoutRecord) -> Self {
        Self::with_defaults(record, Category::Destination, 0.0, 0.5, Rgb::new(0.0, 0.0, 1.0))
    }

    fn with_defaults(record: &LayoutRecord, category: Category, yaw: f32, scale: f32, color: Rgb) -> Self {
        Self {
            id: record.id,
            category,
            position: record.position(),
            yaw,
            scale,
            color,
        }
    }
}

/// Every entity currently known to the client.
#[derive(Debug, Default)]
pub struct EntityStore {
    pub(crate) vehicles: HashMap<EntityId, Vehicle>,
    pub(crate) lights: HashMap<EntityId, TrafficLight>,
    obstacles: HashMap<EntityId, StaticEntity>,
    roads: HashMap<EntityId, StaticEntity>,
    destinations: HashMap<EntityId, StaticEntity>,
}

impl EntityStore {
    pub fn vehicle(&self, id: EntityId) -> Option<&Vehicle> {
        self.vehicles.get(&id)
    }

    pub fn light(&self, id: EntityId) -> Option<&TrafficLight> {
        self.lights.get(&id)
    }

    /// Vehicles in ascending id order.
    pub fn vehicles(&self) -> Vec<&Vehicle> {
        let mut out: Vec<&Vehicle> = self.vehicles.values().collect();
        out.sort_by_key(|v| v.id);
        out
    }

    /// Traffic lights in ascending id order.
    pub fn lights(&self) -> Vec<&TrafficLight> {
        let mut out: Vec<&TrafficLight> = self.lights.values().collect();
        out.sort_by_key(|l| l.id);
        out
    }

    /// Static tiles of one category in ascending id order.
    pub fn statics(&self, category: Category) -> Vec<&StaticEntity> {
        let mut out: Vec<&StaticEntity> = match self.static_map(category) {
            Some(map) => map.values().collect(),
            None => Vec::new(),
        };
        out.sort_by_key(|s| s.id);
        out
    }

    pub fn vehicle_ids(&self) -> Vec<EntityId> {
        self.vehicles().into_iter().map(|v| v.id).collect()
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    pub fn static_count(&self, category: Category) -> usize {
        self.static_map(category).map_or(0, HashMap::len)
    }

    /// Replaces the whole layout of one static category.
    pub fn replace_statics(&mut self, category: Category, entities: Vec<StaticEntity>) {
        let Some(map) = self.static_map_mut(category) else {
            return;
        };
        map.clear();
        for entity in entities {
            map.insert(entity.id, entity);
        }
    }

    /// Drops everything; used by a full reset.
    pub fn clear(&mut self) {
        self.vehicles.clear();
        self.lights.clear();
        self.obstacles.clear();
        self.roads.clear();
        self.destinations.clear();
    }

    fn static_map(&self, category: Category) -> Option<&HashMap<EntityId, StaticEntity>> {
        match category {
            Category::Obstacle => Some(&self.obstacles),
            Category::Road => Some(&self.roads),
            Category::Destination => Some(&self.destinations),
            Category::Vehicle | Category::TrafficLight => None,
        }
    }

    fn static_map_mut(&mut self, category: Category) -> Option<&mut HashMap<EntityId, StaticEntity>> {
        match category {
            Category::Obstacle => Some(&mut self.obstacles),
            Category::Road => Some(&mut self.roads),
            Category::Destination => Some(&mut self.destinations),
            Category::Vehicle | Category::TrafficLight => None,
        }
    }
}
