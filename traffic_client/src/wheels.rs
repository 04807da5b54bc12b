//! Wheel kinematics.
//!
//! Wheels are never authoritative. Their placement and steering come from the
//! parent vehicle's blended pose; their spin comes from an odometer that only
//! moves forward at tick boundaries.

use std::f32::consts::PI;

use traffic_shared::{
    entity::VehicleKind,
    math::{lerp_angle, wrap_angle, Vec3},
    render::WheelPose,
};

use crate::store::Motion;

/// Where a wheel attaches, in body mesh units.
///
/// `offset.x` is lateral (+x is the left side when facing +z), `offset.z` is
/// longitudinal (+z forward), `offset.y` is axle height.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelMount {
    pub offset: Vec3,
    /// Right-side wheel meshes are authored facing backwards.
    pub base_yaw: f32,
}

/// Front-left, front-right, rear-left, rear-right.
const fn axle_layout(half_track: f32, front: f32, rear: f32, axle_height: f32) -> [WheelMount; 4] {
    [
        WheelMount {
            offset: Vec3::new(half_track, axle_height, front),
            base_yaw: 0.0,
        },
        WheelMount {
            offset: Vec3::new(-half_track, axle_height, front),
            base_yaw: PI,
        },
        WheelMount {
            offset: Vec3::new(half_track, axle_height, rear),
            base_yaw: 0.0,
        },
        WheelMount {
            offset: Vec3::new(-half_track, axle_height, rear),
            base_yaw: PI,
        },
    ]
}

fn mounts_for(kind: VehicleKind) -> [WheelMount; 4] {
    match kind {
        VehicleKind::Sedan | VehicleKind::Erratic => axle_layout(0.9, 1.3, -1.2, 0.35),
        VehicleKind::SedanSport => axle_layout(0.92, 1.35, -1.25, 0.32),
        VehicleKind::Race => axle_layout(1.0, 1.55, -1.35, 0.3),
        VehicleKind::HatchbackSport => axle_layout(0.88, 1.15, -1.0, 0.34),
    }
}

/// The four wheels of one vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelSet {
    pub mounts: [WheelMount; 4],
    /// Ground distance of every committed tick.
    pub odometer: f32,
}

impl WheelSet {
    pub fn for_kind(kind: VehicleKind) -> Self {
        Self {
            mounts: mounts_for(kind),
            odometer: 0.0,
        }
    }

    pub fn remount(&mut self, kind: VehicleKind) {
        self.mounts = mounts_for(kind);
    }

    /// Commits a finished tick's travel.
    pub fn advance(&mut self, distance: f32) {
        if distance.is_finite() && distance > 0.0 {
            self.odometer += distance;
        }
    }

    /// Roll angle shown at blend fraction `f` of the current tick.
    ///
    /// At `f = 1` this equals the odometer after the next `advance`, so the
    /// spin does not jump when the next snapshot is merged.
    pub fn roll_at(&self, motion: &Motion, f: f32, rolling_rate: f32) -> f32 {
        (self.odometer + f.clamp(0.0, 1.0) * motion.tick_distance()) * rolling_rate.max(0.0)
    }
}

/// World placement of each wheel for a vehicle drawn at `body_position`.
pub fn wheel_poses(
    wheels: &WheelSet,
    motion: &Motion,
    body_position: Vec3,
    f: f32,
    scale: f32,
    rolling_rate: f32,
) -> [WheelPose; 4] {
    let body_yaw = lerp_angle(motion.previous_yaw, motion.current_yaw, f);
    let roll = wheels.roll_at(motion, f, rolling_rate);
    wheels.mounts.map(|mount| WheelPose {
        position: body_position.add(mount.offset.scale(scale).rotate_y(body_yaw)),
        yaw: lerp_angle(
            wrap_angle(motion.previous_yaw + mount.base_yaw),
            wrap_angle(motion.current_yaw + mount.base_yaw),
            f,
        ),
        roll,
        scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: f32 = 6.0;

    #[test]
    fn odometer_is_continuous_across_ticks() {
        let mut wheels = WheelSet::for_kind(VehicleKind::Sedan);
        let mut motion = Motion::at_rest(Vec3::ZERO, 0.0);
        let path = [1.0_f32, 2.5, 2.5, 4.0, 7.0];

        let mut last = 0.0_f32;
        for z in path {
            // Tick boundary: commit the finished tick, then rotate the pair.
            let before = wheels.roll_at(&motion, 1.0, RATE);
            wheels.advance(motion.tick_distance());
            motion.advance_to(Vec3::new(0.0, 0.0, z));
            let after = wheels.roll_at(&motion, 0.0, RATE);
            assert!((before - after).abs() < 1e-5, "jump at wraparound: {before} -> {after}");

            for i in 0..=10 {
                let roll = wheels.roll_at(&motion, i as f32 / 10.0, RATE);
                assert!(roll >= last, "roll went backwards");
                last = roll;
            }
        }
        assert!((last - 7.0 * RATE).abs() < 1e-4);
    }

    #[test]
    fn mounts_rotate_with_vehicle_heading() {
        let wheels = WheelSet::for_kind(VehicleKind::Sedan);
        let motion = Motion {
            previous: Vec3::ZERO,
            current: Vec3::new(1.0, 0.0, 0.0),
            previous_yaw: PI / 2.0,
            current_yaw: PI / 2.0,
        };
        let poses = wheel_poses(&wheels, &motion, Vec3::ZERO, 0.5, 1.0, RATE);
        // Facing +x, the front axle sits at positive x.
        assert!(poses[0].position.x > 0.0 && poses[1].position.x > 0.0);
        assert!(poses[2].position.x < 0.0 && poses[3].position.x < 0.0);
        // The left side ends up at negative z.
        assert!(poses[0].position.z < 0.0);
        assert!((poses[0].yaw - PI / 2.0).abs() < 1e-5);
        assert!((wrap_angle(poses[1].yaw - poses[0].yaw).abs() - PI).abs() < 1e-5);
    }

    #[test]
    fn wheel_steering_takes_shortest_arc() {
        let wheels = WheelSet::for_kind(VehicleKind::Race);
        let motion = Motion {
            previous: Vec3::ZERO,
            current: Vec3::ZERO,
            previous_yaw: 3.0,
            current_yaw: -3.0,
        };
        let poses = wheel_poses(&wheels, &motion, Vec3::ZERO, 0.5, 1.0, RATE);
        assert!((poses[0].yaw.abs() - PI).abs() < 1e-4);
    }

    #[test]
    fn remount_keeps_odometer() {
        let mut wheels = WheelSet::for_kind(VehicleKind::Sedan);
        wheels.advance(2.0);
        wheels.remount(VehicleKind::Race);
        assert_eq!(wheels.odometer, 2.0);
        assert_eq!(wheels.mounts, mounts_for(VehicleKind::Race));
    }
}
