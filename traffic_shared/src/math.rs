//! Math types.
//!
//! This module intentionally stays small and deterministic.
//! Angles are radians; yaw 0 faces +z and grows toward +x.

use std::f32::consts::{PI, TAU};

use serde::{Deserialize, Serialize};

/// 3D vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }

    pub fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }

    pub fn dot(self, rhs: Self) -> f32 {
        self.x * rhs.x + self.y * rhs.y + self.z * rhs.z
    }

    pub fn len_sq(self) -> f32 {
        self.dot(self)
    }

    /// Length of the projection onto the ground (x/z) plane.
    pub fn ground_len(self) -> f32 {
        self.x.hypot(self.z)
    }

    /// Distance on the ground plane, ignoring height.
    pub fn ground_distance(self, other: Self) -> f32 {
        other.sub(self).ground_len()
    }

    /// Linear blend written as `a·(1−t) + b·t` so both endpoints are exact.
    pub fn lerp(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let s = 1.0 - t;
        Self::new(
            self.x * s + to.x * t,
            self.y * s + to.y * t,
            self.z * s + to.z * t,
        )
    }

    /// Rotates about the vertical axis by `yaw`.
    pub fn rotate_y(self, yaw: f32) -> Self {
        let (sin, cos) = yaw.sin_cos();
        Self::new(
            self.x * cos + self.z * sin,
            self.y,
            -self.x * sin + self.z * cos,
        )
    }

    /// Heading of this vector on the ground plane (`atan2(x, z)`).
    pub fn ground_yaw(self) -> f32 {
        self.x.atan2(self.z)
    }
}

/// Normalizes an angle into (−π, π].
pub fn wrap_angle(angle: f32) -> f32 {
    let mut a = angle % TAU;
    if a > PI {
        a -= TAU;
    } else if a <= -PI {
        a += TAU;
    }
    a
}

/// Signed shortest rotation from `from` to `to`, in (−π, π].
pub fn shortest_angle_delta(from: f32, to: f32) -> f32 {
    wrap_angle(to - from)
}

/// Blends two angles along the shortest arc.
///
/// Endpoints are returned unchanged: `t <= 0` yields `from`, `t >= 1` yields `to`.
/// Intermediate values are normalized into (−π, π].
pub fn lerp_angle(from: f32, to: f32, t: f32) -> f32 {
    if t <= 0.0 {
        return from;
    }
    if t >= 1.0 {
        return to;
    }
    wrap_angle(from + shortest_angle_delta(from, to) * t)
}

/// Linear RGB color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn scale(self, s: f32) -> Self {
        Self::new(self.r * s, self.g * s, self.b * s)
    }

    pub fn mix(self, to: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        let s = 1.0 - t;
        Self::new(
            self.r * s + to.r * t,
            self.g * s + to.g * t,
            self.b * s + to.b * t,
        )
    }
}
