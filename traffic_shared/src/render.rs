//! Rendering abstraction.
//!
//! This crate intentionally does not depend on a graphics backend.
//! The client builds fully-resolved per-frame records and hands them to a
//! `RenderBackend`; the backend owns meshes, textures and draw calls.

use crate::{
    entity::{Category, EntityId, SignalState, VehicleKind},
    math::{Rgb, Vec3},
};

/// Resolved transform and tint of one drawable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    /// Euler rotation in radians (x, y = yaw, z).
    pub rotation: Vec3,
    pub scale: f32,
    pub color: Rgb,
}

/// One wheel of a vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelPose {
    pub position: Vec3,
    pub yaw: f32,
    /// Rotation about the axle.
    pub roll: f32,
    pub scale: f32,
}

/// One light input for the shading stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSlot {
    pub position: Vec3,
    pub diffuse: Rgb,
    pub specular: Rgb,
}

impl LightSlot {
    /// Padding entry: far away and black.
    pub const SENTINEL: Self = Self {
        position: Vec3::new(1.0e6, 1.0e6, 1.0e6),
        diffuse: Rgb::BLACK,
        specular: Rgb::BLACK,
    };

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }
}

/// Obstacle, road or destination.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFrame {
    pub id: EntityId,
    pub category: Category,
    pub pose: Pose,
    pub lights: Vec<LightSlot>,
}

/// Traffic light fixture: pole plus colored bulb.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalFrame {
    pub id: EntityId,
    pub signal: SignalState,
    pub pole: Vec3,
    pub bulb: Vec3,
    pub bulb_color: Rgb,
}

/// Vehicle body with its derived wheels.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleFrame {
    pub id: EntityId,
    pub kind: VehicleKind,
    pub crashed: bool,
    pub pose: Pose,
    pub wheels: [WheelPose; 4],
    pub lights: Vec<LightSlot>,
}

/// A minimal rendering API.
pub trait RenderBackend: Send {
    /// `fraction` is the blend fraction the frame was built with.
    fn begin_frame(&mut self, fraction: f32);
    fn draw_static(&mut self, item: &StaticFrame);
    fn draw_signal(&mut self, item: &SignalFrame);
    fn draw_vehicle(&mut self, item: &VehicleFrame);
    /// Drops every draw resource tied to a vehicle (body and wheels).
    fn release_vehicle(&mut self, id: EntityId);
    fn end_frame(&mut self);
}

/// A no-op renderer useful for headless tests.
#[derive(Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn begin_frame(&mut self, _fraction: f32) {}
    fn draw_static(&mut self, _item: &StaticFrame) {}
    fn draw_signal(&mut self, _item: &SignalFrame) {}
    fn draw_vehicle(&mut self, _item: &VehicleFrame) {}
    fn release_vehicle(&mut self, _id: EntityId) {}
    fn end_frame(&mut self) {}
}
