//! Entity identity and category tags.
//!
//! Ids come from the simulation server and are only unique within a category.
//! Every tag here carries its documented default so construction sites never
//! have to guess.

use std::f32::consts::{FRAC_PI_2, PI};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::Rgb;

/// Server-assigned entity id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawId")]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ids arrive either as JSON numbers or as decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl TryFrom<RawId> for EntityId {
    type Error = String;

    fn try_from(raw: RawId) -> Result<Self, Self::Error> {
        match raw {
            RawId::Number(n) => Ok(EntityId(n)),
            RawId::Text(s) => s
                .trim()
                .parse()
                .map(EntityId)
                .map_err(|_| format!("invalid entity id {s:?}")),
        }
    }
}

/// Entity category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Vehicle,
    Obstacle,
    Road,
    Destination,
    TrafficLight,
}

/// Visual archetype of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VehicleKind {
    #[default]
    Sedan,
    SedanSport,
    Race,
    HatchbackSport,
    /// Erratic ("borrachito") driver.
    Erratic,
}

impl VehicleKind {
    /// Maps the optional wire `type` string; unknown or absent values fall back to the default.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("sedan") => VehicleKind::Sedan,
            Some("sedan_sport") => VehicleKind::SedanSport,
            Some("race") => VehicleKind::Race,
            Some("hatchback_sport") => VehicleKind::HatchbackSport,
            Some("erratic") | Some("borrachito") => VehicleKind::Erratic,
            _ => VehicleKind::default(),
        }
    }

    pub fn is_erratic(self) -> bool {
        self == VehicleKind::Erratic
    }

    /// Body color before any crash tint.
    pub fn base_color(self) -> Rgb {
        match self {
            VehicleKind::Erratic => Rgb::new(0.65, 1.0, 0.55),
            _ => Rgb::WHITE,
        }
    }
}

/// Traffic light signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalState {
    Red,
    Yellow,
    Green,
}

impl SignalState {
    /// Bulb color shown on the fixture.
    pub fn bulb_color(self) -> Rgb {
        match self {
            SignalState::Red => Rgb::new(1.0, 0.0, 0.0),
            SignalState::Yellow => Rgb::new(1.0, 1.0, 0.0),
            SignalState::Green => Rgb::new(0.0, 1.0, 0.0),
        }
    }
}

/// Travel direction of a road tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum RoadDirection {
    Up,
    Down,
    #[default]
    Left,
    Right,
}

impl RoadDirection {
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("up") => RoadDirection::Up,
            Some("down") => RoadDirection::Down,
            Some("right") => RoadDirection::Right,
            _ => RoadDirection::Left,
        }
    }

    /// Grid "up" is +z in world space.
    pub fn yaw(self) -> f32 {
        match self {
            RoadDirection::Up => 0.0,
            RoadDirection::Right => FRAC_PI_2,
            RoadDirection::Down => PI,
            RoadDirection::Left => -FRAC_PI_2,
        }
    }
}
