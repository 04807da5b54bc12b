//! Configuration system.
//!
//! Loads client configuration from JSON strings (file IO left to the binary).

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Simulation server base URL, e.g. `http://localhost:8585/`.
    #[serde(default = "default_server_url")]
    pub server_url: String,
    /// Real-time interval between snapshot fetches.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Render frame rate of the headless loop.
    #[serde(default = "default_frame_hz")]
    pub frame_hz: u32,
    /// Sent to `/init`.
    #[serde(default = "default_agent_count")]
    pub agent_count: u32,
    #[serde(default = "default_grid_size")]
    pub grid_width: u32,
    #[serde(default = "default_grid_size")]
    pub grid_height: u32,
    /// Per-request timeout.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Consecutive failed ticks before the client warns that it is frozen on stale state.
    #[serde(default = "default_stale_warn_after")]
    pub stale_warn_after: u32,
    /// Height vehicles are drawn at; `None` keeps the server's y.
    #[serde(default = "default_vehicle_ground_height")]
    pub vehicle_ground_height: Option<f32>,
    /// Wheel roll in radians per world unit travelled.
    #[serde(default = "default_rolling_rate")]
    pub rolling_rate: f32,
    #[serde(default)]
    pub lighting: LightingConfig,
}

/// Proximity lighting parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LightingConfig {
    /// Ground-plane radius inside which sources contribute.
    pub max_range: f32,
    /// Fixed number of light slots handed to the shading stage.
    pub count: usize,
    /// Sources closer than this are ignored.
    pub min_distance: f32,
    /// Multiplier applied to every contribution.
    pub intensity: f32,
}

impl Default for LightingConfig {
    fn default() -> Self {
        Self {
            max_range: 6.0,
            count: 4,
            min_distance: 0.05,
            intensity: 1.0,
        }
    }
}

fn default_server_url() -> String {
    "http://localhost:8585/".to_string()
}

fn default_tick_ms() -> u64 {
    1000
}

fn default_frame_hz() -> u32 {
    60
}

fn default_agent_count() -> u32 {
    20
}

fn default_grid_size() -> u32 {
    28
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_stale_warn_after() -> u32 {
    5
}

fn default_vehicle_ground_height() -> Option<f32> {
    Some(0.0)
}

fn default_rolling_rate() -> f32 {
    // One turn per metre for a wheel of radius ~0.16.
    6.0
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            tick_ms: default_tick_ms(),
            frame_hz: default_frame_hz(),
            agent_count: default_agent_count(),
            grid_width: default_grid_size(),
            grid_height: default_grid_size(),
            request_timeout_ms: default_request_timeout_ms(),
            stale_warn_after: default_stale_warn_after(),
            vehicle_ground_height: default_vehicle_ground_height(),
            rolling_rate: default_rolling_rate(),
            lighting: LightingConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1))
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_hz.max(1)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
