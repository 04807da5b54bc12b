//! Wire records exchanged with the simulation server.
//!
//! Goals:
//! - Mirror the server's JSON bodies exactly (field names are camelCase on the wire).
//! - Keep optional wire fields optional here; defaults are applied when records
//!   become entities, not at read sites.

use serde::{Deserialize, Serialize};

use crate::{entity::EntityId, entity::SignalState, math::Vec3};

/// Endpoint paths, relative to the server base URL.
pub mod endpoint {
    pub const INIT: &str = "init";
    pub const AGENTS: &str = "getAgents";
    pub const OBSTACLES: &str = "getObstacles";
    pub const ROADS: &str = "getRoads";
    pub const DESTINATIONS: &str = "getDestinations";
    pub const TRAFFIC_LIGHTS: &str = "getTlights";
    pub const UPDATE: &str = "update";
    pub const SPAWN_RATE: &str = "setCarSpawnRate";
    pub const ERRATIC_MODE: &str = "setBorrachitoMode";
}

/// `POST /init` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct InitRequest {
    pub agent_count: u32,
    pub grid_width: u32,
    pub grid_height: u32,
}

/// Generic `{ message }` reply.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct MessageReply {
    #[serde(default)]
    pub message: String,
}

/// `{ positions: [...] }` envelope used by every layout/snapshot endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Positions<T> {
    pub positions: Vec<T>,
}

/// One vehicle in a `getAgents` snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentRecord {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crashed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crash_timer: Option<f32>,
}

impl AgentRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// One static tile (obstacle, road, destination).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LayoutRecord {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<String>,
}

impl LayoutRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// One traffic light.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LightRecord {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub state: SignalState,
}

impl LightRecord {
    pub fn position(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

/// `GET /update` reply.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    #[serde(default)]
    pub current_step: u64,
    #[serde(default)]
    pub cars_spawned: u64,
    #[serde(default)]
    pub cars_arrived: u64,
}

impl StepReport {
    /// Share of spawned vehicles that reached a destination, in percent.
    pub fn arrival_rate(&self) -> Option<f64> {
        (self.cars_spawned > 0).then(|| self.cars_arrived as f64 / self.cars_spawned as f64 * 100.0)
    }
}

/// `POST /setCarSpawnRate` body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SpawnRateRequest {
    pub rate: u32,
}

/// `POST /setBorrachitoMode` body.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ErraticModeRequest {
    #[serde(rename = "borrachitoOn")]
    pub enabled: bool,
}

/// Dynamic state fetched at one tick boundary.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub step: StepReport,
    pub vehicles: Vec<AgentRecord>,
    pub lights: Vec<LightRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agent_record_accepts_minimal_and_full_shapes() {
        let body = r#"{"positions":[
            {"id":"3","x":1,"y":1,"z":4},
            {"id":9,"x":2.5,"y":0,"z":7,"type":"race","crashed":true,"crash_timer":4.5}
        ]}"#;
        let parsed: Positions<AgentRecord> = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.positions.len(), 2);
        assert_eq!(parsed.positions[0].id, EntityId(3));
        assert_eq!(parsed.positions[0].kind, None);
        assert_eq!(parsed.positions[1].kind.as_deref(), Some("race"));
        assert_eq!(parsed.positions[1].crash_timer, Some(4.5));
        assert_eq!(parsed.positions[1].position(), Vec3::new(2.5, 0.0, 7.0));
    }

    #[test]
    fn step_report_tolerates_missing_counters() {
        let body = r#"{"message":"Model updated to step 4.","currentStep":4}"#;
        let report: StepReport = serde_json::from_str(body).unwrap();
        assert_eq!(report.current_step, 4);
        assert_eq!(report.cars_spawned, 0);
        assert_eq!(report.arrival_rate(), None);
    }

    #[test]
    fn request_bodies_use_server_field_names() {
        let init = serde_json::to_value(InitRequest {
            agent_count: 20,
            grid_width: 28,
            grid_height: 28,
        })
        .unwrap();
        assert_eq!(init["agentCount"], 20);
        assert_eq!(init["gridWidth"], 28);

        let erratic = serde_json::to_value(ErraticModeRequest { enabled: true }).unwrap();
        assert_eq!(erratic["borrachitoOn"], true);
    }
}
