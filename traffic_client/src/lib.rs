//! `traffic_client`
//!
//! Client-side systems:
//! - Snapshot fetching over HTTP with a typed failure taxonomy
//! - Reconciliation of snapshots into the entity store
//! - Interpolation, wheel kinematics and crash effects for presentation
//! - Proximity lighting
//! - The frame-driving `Visualizer` and its text control console

pub mod client;
pub mod clock;
pub mod console;
pub mod crash;
pub mod interp;
pub mod lights;
pub mod reconcile;
pub mod store;
pub mod visualizer;
pub mod wheels;

pub use client::{FetchError, HttpSnapshotClient, SnapshotSource};
pub use visualizer::Visualizer;
