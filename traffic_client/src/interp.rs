//! Interpolation.
//!
//! The server sends discrete snapshots at tick boundaries.
//! The client renders at its own rate and blends every moving entity between
//! the previous and current snapshot using the tick's blend fraction.

use traffic_shared::math::{lerp_angle, Vec3};

use crate::store::{Motion, TrafficLight, Vehicle};

/// Blended position and heading of a motion pair at fraction `f`.
///
/// Pure: the same `(motion, f)` always yields the same result. `f` outside
/// [0,1] is clamped.
pub fn interpolate(motion: &Motion, f: f32) -> (Vec3, f32) {
    let f = f.clamp(0.0, 1.0);
    (
        motion.previous.lerp(motion.current, f),
        lerp_angle(motion.previous_yaw, motion.current_yaw, f),
    )
}

/// Entities that move between snapshots.
pub trait Interpolate {
    fn motion(&self) -> &Motion;

    fn interpolate(&self, f: f32) -> (Vec3, f32) {
        interpolate(self.motion(), f)
    }
}

impl Interpolate for Vehicle {
    fn motion(&self) -> &Motion {
        &self.motion
    }
}

impl Interpolate for TrafficLight {
    fn motion(&self) -> &Motion {
        &self.motion
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::PI;

    use super::*;

    fn turning(previous_yaw: f32, current_yaw: f32) -> Motion {
        Motion {
            previous: Vec3::ZERO,
            current: Vec3::ZERO,
            previous_yaw,
            current_yaw,
        }
    }

    #[test]
    fn mid_tick_blend_follows_movement_direction() {
        let mut m = Motion::at_rest(Vec3::new(2.0, 0.0, 5.0), 0.0);
        m.advance_to(Vec3::new(2.0, 0.0, 7.0));
        let (pos, yaw) = interpolate(&m, 0.5);
        assert_eq!(pos, Vec3::new(2.0, 0.0, 6.0));
        assert_eq!(yaw, 0.0_f32.atan2(2.0));
    }

    #[test]
    fn position_stays_on_segment_and_hits_endpoints() {
        let m = Motion {
            previous: Vec3::new(0.1, 1.0, -2.7),
            current: Vec3::new(3.3, 1.0, 4.9),
            previous_yaw: 0.0,
            current_yaw: 0.0,
        };
        assert_eq!(interpolate(&m, 0.0).0, m.previous);
        assert_eq!(interpolate(&m, 1.0).0, m.current);

        let span = m.current.sub(m.previous);
        for i in 1..10 {
            let f = i as f32 / 10.0;
            let offset = interpolate(&m, f).0.sub(m.previous);
            // Collinear with the segment and within its length.
            let t = offset.dot(span) / span.len_sq();
            assert!((0.0..=1.0).contains(&t));
            assert!(offset.sub(span.scale(t)).len_sq() < 1e-8);
        }
    }

    #[test]
    fn heading_takes_the_short_way_round() {
        let m = turning(3.0, -3.0);
        assert_eq!(interpolate(&m, 0.0).1, 3.0);
        assert_eq!(interpolate(&m, 1.0).1, -3.0);

        let mut travelled = 0.0;
        let mut last = 3.0_f32;
        for i in 1..=20 {
            let yaw = interpolate(&m, i as f32 / 20.0).1;
            travelled += traffic_shared::math::shortest_angle_delta(last, yaw).abs();
            last = yaw;
        }
        assert!(travelled <= PI);
        assert!((travelled - (2.0 * PI - 6.0)).abs() < 1e-3, "travelled {travelled}");
        assert!((interpolate(&m, 0.5).1.abs() - PI).abs() < 1e-4);
    }

    #[test]
    fn interpolation_is_idempotent() {
        let m = Motion {
            previous: Vec3::new(1.0, 0.0, 1.0),
            current: Vec3::new(4.0, 0.0, -2.0),
            previous_yaw: -2.5,
            current_yaw: 2.9,
        };
        for f in [0.0, 0.13, 0.5, 0.77, 1.0] {
            assert_eq!(interpolate(&m, f), interpolate(&m, f));
        }
    }

    #[test]
    fn fraction_is_clamped() {
        let m = Motion {
            previous: Vec3::ZERO,
            current: Vec3::new(0.0, 0.0, 2.0),
            previous_yaw: 0.0,
            current_yaw: 0.0,
        };
        assert_eq!(interpolate(&m, 1.7).0, m.current);
        assert_eq!(interpolate(&m, -0.2).0, m.previous);
    }
}
