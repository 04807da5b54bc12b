//! `traffic_shared`
//!
//! Shared libraries used by the visualizer client and its tests.
//!
//! Design goals:
//! - Deterministic and small where practical.
//! - Wire records mirror the simulation server; entity tags carry their own defaults.
//! - The render boundary is a trait so the client stays headless-testable.
//! - No `unsafe`.

pub mod config;
pub mod entity;
pub mod math;
pub mod net;
pub mod render;
