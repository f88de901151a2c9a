//! Containment queries over the arena geometry
//!
//! Every predicate takes the query point and the querying entity's
//! clearance radius. An entity too large for a shape is never inside it.
//! Unknown spawn-zone ids are simply "not contained".

use crate::game::map::{ArenaMap, Corridor, Hub, SpawnZone};
use crate::util::vec2::Vec2;

impl Hub {
    pub fn contains(&self, point: Vec2, radius: f32) -> bool {
        if self.radius <= radius {
            return false;
        }
        let allowed = self.radius - radius;
        point.distance_sq_to(self.center) <= allowed * allowed
    }
}

impl Corridor {
    pub fn contains(&self, point: Vec2, radius: f32, extra_margin: f32) -> bool {
        let width = self.half_width + extra_margin;
        if width <= radius {
            return false;
        }
        let allowed = width - radius;
        self.distance_sq_to(point) <= allowed * allowed
    }
}

impl SpawnZone {
    /// Circle or connector: an agent walking out along the connector is
    /// still in its zone until it reaches the open network.
    pub fn contains(&self, point: Vec2, radius: f32) -> bool {
        if self.radius > radius {
            let allowed = self.radius - radius;
            if point.distance_sq_to(self.center) <= allowed * allowed {
                return true;
            }
        }
        self.connector.contains(point, radius, 0.0)
    }
}

impl ArenaMap {
    pub fn is_inside_hub(&self, point: Vec2, radius: f32) -> bool {
        self.hubs().iter().any(|hub| hub.contains(point, radius))
    }

    pub fn is_inside_corridor(&self, point: Vec2, radius: f32, extra_margin: f32) -> bool {
        self.corridors()
            .iter()
            .any(|corridor| corridor.contains(point, radius, extra_margin))
    }

    pub fn is_inside_spawn_zone(&self, point: Vec2, radius: f32, zone_id: u8) -> bool {
        self.spawn_zone(zone_id)
            .is_some_and(|zone| zone.contains(point, radius))
    }

    /// Hubs, corridors and every spawn zone. Used for static placement.
    pub fn is_inside_playable_area(&self, point: Vec2, radius: f32) -> bool {
        self.is_inside_hub(point, radius)
            || self.is_inside_corridor(point, radius, 0.0)
            || self
                .spawn_zones()
                .iter()
                .any(|zone| zone.contains(point, radius))
    }

    /// Movement authority: hubs and corridors, plus the agent's own spawn
    /// zone only while the caller says it is still active.
    pub fn is_inside_map(
        &self,
        point: Vec2,
        radius: f32,
        spawn_zone_id: Option<u8>,
        spawn_zone_active: bool,
    ) -> bool {
        if self.is_inside_hub(point, radius) || self.is_inside_corridor(point, radius, 0.0) {
            return true;
        }
        match spawn_zone_id {
            Some(zone_id) if spawn_zone_active => self.is_inside_spawn_zone(point, radius, zone_id),
            _ => false,
        }
    }
}
