//! Proximity lighting.
//!
//! Every shaded object receives exactly `k` light slots built from the
//! nearest traffic lights, destinations and other vehicles. Selection is
//! recomputed each frame from the store and keeps no state of its own.

use std::cmp::Ordering;

use traffic_shared::{
    config::LightingConfig,
    entity::{Category, EntityId, SignalState},
    math::{Rgb, Vec3},
    render::LightSlot,
};

use crate::{interp::Interpolate, store::EntityStore};

bitflags::bitflags! {
    /// Which categories emit light.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LightSourceMask: u8 {
        const TRAFFIC_LIGHTS = 1 << 0;
        const DESTINATIONS = 1 << 1;
        const VEHICLES = 1 << 2;
    }
}

impl Default for LightSourceMask {
    fn default() -> Self {
        Self::all()
    }
}

/// A candidate light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSource {
    /// Set for vehicles so they can be excluded from lighting themselves.
    pub owner: Option<EntityId>,
    pub position: Vec3,
    pub diffuse: Rgb,
    pub specular: Rgb,
}

/// Diffuse and specular color of a traffic light.
pub fn signal_colors(signal: SignalState) -> (Rgb, Rgb) {
    match signal {
        SignalState::Red => (Rgb::new(1.0, 0.0, 0.0), Rgb::new(1.0, 0.35, 0.35)),
        SignalState::Yellow => (Rgb::new(1.0, 0.85, 0.0), Rgb::new(1.0, 1.0, 0.45)),
        SignalState::Green => (Rgb::new(0.0, 1.0, 0.0), Rgb::new(0.35, 1.0, 0.35)),
    }
}

/// Phosphorescent blue of destinations.
pub const DESTINATION_COLORS: (Rgb, Rgb) = (Rgb::new(0.1, 0.45, 1.0), Rgb::new(0.4, 0.7, 1.0));

/// Dim white of vehicles.
pub const VEHICLE_COLORS: (Rgb, Rgb) = (Rgb::new(0.3, 0.3, 0.3), Rgb::new(0.45, 0.45, 0.45));

/// Collects every light source in the store, with moving sources blended at `f`.
///
/// Order is deterministic: traffic lights, destinations, then vehicles, each by id.
pub fn collect_sources(store: &EntityStore, mask: LightSourceMask, f: f32) -> Vec<LightSource> {
    let mut sources = Vec::new();
    if mask.contains(LightSourceMask::TRAFFIC_LIGHTS) {
        for light in store.lights() {
            let (diffuse, specular) = signal_colors(light.signal);
            sources.push(LightSource {
                owner: None,
                position: light.interpolate(f).0,
                diffuse,
                specular,
            });
        }
    }
    if mask.contains(LightSourceMask::DESTINATIONS) {
        for destination in store.statics(Category::Destination) {
            sources.push(LightSource {
                owner: None,
                position: destination.position,
                diffuse: DESTINATION_COLORS.0,
                specular: DESTINATION_COLORS.1,
            });
        }
    }
    if mask.contains(LightSourceMask::VEHICLES) {
        for vehicle in store.vehicles() {
            sources.push(LightSource {
                owner: Some(vehicle.id),
                position: vehicle.interpolate(f).0,
                diffuse: VEHICLE_COLORS.0,
                specular: VEHICLE_COLORS.1,
            });
        }
    }
    sources
}

/// Picks the `cfg.count` nearest sources around `object_position`.
///
/// `viewer` is the shaded vehicle, if any; it never lights itself. Sources
/// beyond `cfg.max_range` or nearer than `cfg.min_distance` on the ground
/// plane are dropped. The result always has exactly `cfg.count` entries,
/// padded with [`LightSlot::SENTINEL`].
pub fn select_lights(
    object_position: Vec3,
    viewer: Option<EntityId>,
    sources: &[LightSource],
    cfg: &LightingConfig,
) -> Vec<LightSlot> {
    let mut near: Vec<(f32, &LightSource)> = sources
        .iter()
        .filter(|s| viewer.is_none() || s.owner != viewer)
        .map(|s| (object_position.ground_distance(s.position), s))
        .filter(|(d, _)| *d <= cfg.max_range && *d >= cfg.min_distance)
        .collect();
    near.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));

    let mut slots: Vec<LightSlot> = near
        .into_iter()
        .take(cfg.count)
        .map(|(_, s)| LightSlot {
            position: s.position,
            diffuse: s.diffuse.scale(cfg.intensity),
            specular: s.specular.scale(cfg.intensity),
        })
        .collect();
    slots.resize(cfg.count, LightSlot::SENTINEL);
    slots
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(owner: Option<u64>, x: f32, z: f32) -> LightSource {
        LightSource {
            owner: owner.map(EntityId),
            position: Vec3::new(x, 3.0, z),
            diffuse: Rgb::WHITE,
            specular: Rgb::WHITE,
        }
    }

    fn cfg(count: usize, max_range: f32) -> LightingConfig {
        LightingConfig {
            max_range,
            count,
            min_distance: 0.05,
            intensity: 1.0,
        }
    }

    #[test]
    fn nearest_first_and_padded_to_k() {
        let sources = [
            source(None, 3.0, 0.0),
            source(None, 1.0, 0.0),
            source(None, 9.0, 0.0),
            source(None, 0.0, 2.0),
        ];
        let slots = select_lights(Vec3::ZERO, None, &sources, &cfg(5, 5.0));
        assert_eq!(slots.len(), 5);

        let xs: Vec<f32> = slots.iter().take(3).map(|s| s.position.x).collect();
        assert_eq!(xs, vec![1.0, 0.0, 3.0]);
        assert!(slots[3].is_sentinel() && slots[4].is_sentinel());
        assert_eq!(slots[4].diffuse, Rgb::BLACK);
    }

    #[test]
    fn ordering_is_non_decreasing_and_sentinels_trail() {
        let sources: Vec<LightSource> = (0..12)
            .map(|i| source(None, ((i * 7) % 5) as f32 - 2.0, ((i * 3) % 4) as f32 - 1.5))
            .collect();
        let origin = Vec3::new(0.25, 0.0, -0.5);
        let slots = select_lights(origin, None, &sources, &cfg(8, 2.5));
        assert_eq!(slots.len(), 8);

        let mut seen_sentinel = false;
        let mut last = 0.0;
        for slot in &slots {
            if slot.is_sentinel() {
                seen_sentinel = true;
                continue;
            }
            assert!(!seen_sentinel, "real source after a sentinel");
            let d = origin.ground_distance(slot.position);
            assert!(d >= last);
            last = d;
        }
        assert_eq!(slots, select_lights(origin, None, &sources, &cfg(8, 2.5)));
    }

    #[test]
    fn range_ignores_height() {
        let mut tall = source(None, 1.0, 0.0);
        tall.position.y = 50.0;
        let slots = select_lights(Vec3::ZERO, None, &[tall], &cfg(1, 2.0));
        assert!(!slots[0].is_sentinel());
    }

    #[test]
    fn vehicles_do_not_light_themselves() {
        let sources = [source(Some(4), 0.5, 0.0), source(Some(5), 1.0, 0.0), source(None, 0.52, 0.0)];
        let slots = select_lights(Vec3::new(0.5, 0.0, 0.0), Some(EntityId(4)), &sources, &cfg(3, 5.0));
        assert_eq!(slots[0].position.x, 1.0);
        assert!(slots[1].is_sentinel());
        assert!(slots[2].is_sentinel());
    }

    #[test]
    fn intensity_scales_contributions() {
        let mut c = cfg(1, 5.0);
        c.intensity = 0.5;
        let slots = select_lights(Vec3::ZERO, None, &[source(None, 1.0, 0.0)], &c);
        assert_eq!(slots[0].diffuse, Rgb::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn mask_limits_categories() {
        let store = EntityStore::default();
        assert!(collect_sources(&store, LightSourceMask::empty(), 0.5).is_empty());
        assert_eq!(LightSourceMask::default(), LightSourceMask::all());
    }
}
