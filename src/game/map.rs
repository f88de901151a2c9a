//! Arcane Circuit map geometry
//!
//! Static description of hubs, corridors and spawn zones. Containment
//! predicates over this data live in `game::containment`.

use crate::game::constants::form;
use crate::game::constants::map::*;
use crate::game::nav::NavGraph;
use crate::util::vec2::Vec2;

/// Circular open area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hub {
    pub center: Vec2,
    pub radius: f32,
}

/// Straight fixed-width segment
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Corridor {
    pub start: Vec2,
    pub end: Vec2,
    pub half_width: f32,
}

impl Corridor {
    pub fn new(start: Vec2, end: Vec2) -> Self {
        Self {
            start,
            end,
            half_width: CORRIDOR_HALF_WIDTH,
        }
    }

    pub fn length(&self) -> f32 {
        self.start.distance_to(self.end)
    }

    /// Squared distance from `point` to the nearest point on the segment
    pub fn distance_sq_to(&self, point: Vec2) -> f32 {
        let ab = self.end - self.start;
        let ab_len_sq = ab.length_sq();
        if ab_len_sq == 0.0 {
            return point.distance_sq_to(self.start);
        }
        let t = ((point - self.start).dot(ab) / ab_len_sq).clamp(0.0, 1.0);
        point.distance_sq_to(self.start + ab * t)
    }
}

/// Protected spawn sanctuary outside the arena, joined to it by a connector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnZone {
    pub id: u8,
    /// Where the connector meets the arena (inside a hub)
    pub anchor: Vec2,
    pub center: Vec2,
    pub radius: f32,
    pub connector: Corridor,
}

impl SpawnZone {
    /// Zone placed `SPAWN_OFFSET` beyond `anchor`, pointing away from the origin
    pub fn from_anchor(id: u8, anchor: Vec2) -> Self {
        let center = anchor + anchor.normalize() * SPAWN_OFFSET;
        Self {
            id,
            anchor,
            center,
            radius: SPAWN_RADIUS,
            connector: Corridor::new(anchor, center),
        }
    }

    /// Point just past the arena mouth of the connector. Reaching it within
    /// `reach` puts an entity of radius `radius` outside the zone.
    pub fn exit_point(&self, radius: f32, reach: f32) -> Vec2 {
        let outward = (self.anchor - self.center).normalize();
        self.anchor + outward * (self.connector.half_width - radius + reach + 0.5).max(0.0)
    }
}

/// Layout invariant violations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MapError {
    #[error("corridor {0} has zero length")]
    DegenerateCorridor(usize),
    #[error("spawn zone {0} anchor is not inside any hub")]
    DetachedSpawnAnchor(u8),
    #[error("duplicate spawn zone id {0}")]
    DuplicateSpawnZone(u8),
    #[error("spawn zone {0} exit is not on playable ground")]
    BlockedSpawnExit(u8),
    #[error("navigation graph is disconnected")]
    Disconnected,
}

/// Full map description, read-only after construction
#[derive(Debug, Clone)]
pub struct ArenaMap {
    hubs: Vec<Hub>,
    corridors: Vec<Corridor>,
    spawn_zones: Vec<SpawnZone>,
}

impl ArenaMap {
    pub fn new(hubs: Vec<Hub>, corridors: Vec<Corridor>, spawn_zones: Vec<SpawnZone>) -> Self {
        Self {
            hubs,
            corridors,
            spawn_zones,
        }
    }

    /// The standard Rune Relic layout: five large hubs, four junctions,
    /// an outer ring and sixteen spawn sanctuaries.
    pub fn arcane_circuit() -> Self {
        let large = |x: f32, y: f32| Hub {
            center: Vec2::new(x, y),
            radius: LARGE_HUB_RADIUS,
        };
        let small = |x: f32, y: f32| Hub {
            center: Vec2::new(x, y),
            radius: SMALL_HUB_RADIUS,
        };
        let hubs = vec![
            large(0.0, 0.0),
            large(0.0, 90.0),
            large(0.0, -90.0),
            large(140.0, 0.0),
            large(-140.0, 0.0),
            small(70.0, 45.0),
            small(-70.0, 45.0),
            small(70.0, -45.0),
            small(-70.0, -45.0),
        ];

        let seg = |ax: f32, ay: f32, bx: f32, by: f32| {
            Corridor::new(Vec2::new(ax, ay), Vec2::new(bx, by))
        };
        let corridors = vec![
            // Inner spokes
            seg(0.0, 0.0, 70.0, 45.0),
            seg(0.0, 0.0, -70.0, 45.0),
            seg(0.0, 0.0, 70.0, -45.0),
            seg(0.0, 0.0, -70.0, -45.0),
            // Junction connectors
            seg(70.0, 45.0, 0.0, 90.0),
            seg(70.0, 45.0, 140.0, 0.0),
            seg(-70.0, 45.0, 0.0, 90.0),
            seg(-70.0, 45.0, -140.0, 0.0),
            seg(70.0, -45.0, 0.0, -90.0),
            seg(70.0, -45.0, 140.0, 0.0),
            seg(-70.0, -45.0, 0.0, -90.0),
            seg(-70.0, -45.0, -140.0, 0.0),
            // Outer ring, three segments per quadrant
            seg(0.0, 90.0, 0.0, 140.0),
            seg(0.0, 140.0, 140.0, 140.0),
            seg(140.0, 140.0, 140.0, 0.0),
            seg(140.0, 0.0, 140.0, -140.0),
            seg(140.0, -140.0, 0.0, -140.0),
            seg(0.0, -140.0, 0.0, -90.0),
            seg(0.0, -90.0, 0.0, -140.0),
            seg(0.0, -140.0, -140.0, -140.0),
            seg(-140.0, -140.0, -140.0, 0.0),
            seg(-140.0, 0.0, -140.0, 140.0),
            seg(-140.0, 140.0, 0.0, 140.0),
            seg(0.0, 140.0, 0.0, 90.0),
        ];

        let anchors = [
            (-20.0, 115.0),
            (20.0, 115.0),
            (-20.0, -115.0),
            (20.0, -115.0),
            (165.0, 20.0),
            (165.0, -20.0),
            (-165.0, 20.0),
            (-165.0, -20.0),
            // Diagonal sanctuaries hang off the junction hubs
            (78.0, 57.0),
            (84.0, 50.0),
            (-78.0, 57.0),
            (-84.0, 50.0),
            (78.0, -57.0),
            (84.0, -50.0),
            (-78.0, -57.0),
            (-84.0, -50.0),
        ];
        let spawn_zones = anchors
            .iter()
            .enumerate()
            .map(|(id, &(x, y))| SpawnZone::from_anchor(id as u8, Vec2::new(x, y)))
            .collect();

        Self::new(hubs, corridors, spawn_zones)
    }

    pub fn hubs(&self) -> &[Hub] {
        &self.hubs
    }

    pub fn corridors(&self) -> &[Corridor] {
        &self.corridors
    }

    pub fn spawn_zones(&self) -> &[SpawnZone] {
        &self.spawn_zones
    }

    pub fn spawn_zone(&self, id: u8) -> Option<&SpawnZone> {
        self.spawn_zones.iter().find(|zone| zone.id == id)
    }

    /// Hub whose interior contains `point`, preferring the nearest center
    pub fn hub_containing(&self, point: Vec2) -> Option<&Hub> {
        self.hubs
            .iter()
            .filter(|hub| point.distance_sq_to(hub.center) <= hub.radius * hub.radius)
            .min_by(|a, b| {
                let da = point.distance_sq_to(a.center);
                let db = point.distance_sq_to(b.center);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            })
    }

    /// Check the static layout invariants
    pub fn validate(&self) -> Result<(), MapError> {
        for (idx, corridor) in self.corridors.iter().enumerate() {
            if corridor.length() <= 0.0 {
                return Err(MapError::DegenerateCorridor(idx));
            }
        }
        for (idx, zone) in self.spawn_zones.iter().enumerate() {
            if self.spawn_zones[..idx].iter().any(|z| z.id == zone.id) {
                return Err(MapError::DuplicateSpawnZone(zone.id));
            }
            if self.hub_containing(zone.anchor).is_none() {
                return Err(MapError::DetachedSpawnAnchor(zone.id));
            }
            // A fresh spawn must be able to step out of the connector
            let radius = form::RADII[0];
            if !self.is_inside_playable_area(zone.exit_point(radius, 0.0), radius) {
                return Err(MapError::BlockedSpawnExit(zone.id));
            }
        }
        if !NavGraph::from_map(self).is_connected() {
            return Err(MapError::Disconnected);
        }
        Ok(())
    }
}

impl Default for ArenaMap {
    fn default() -> Self {
        Self::arcane_circuit()
    }
}
