//! Threat assessment and local steering
//!
//! Turns the path follower's desired direction into a heading that keeps
//! away from larger opponents and never steps off the playable area.

use std::f32::consts::FRAC_PI_4;

use tracing::trace;

use crate::config::BotConfig;
use crate::game::agent::SpawnStatus;
use crate::game::map::ArenaMap;
use crate::game::snapshot::{PlayerId, WorldSnapshot};
use crate::util::vec2::Vec2;

/// Aggregated repulsion from nearby larger opponents
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ThreatAssessment {
    /// Unnormalized sum of weighted escape directions
    pub vector: Vec2,
    pub panic: bool,
    /// Distance to the closest counted threat
    pub nearest: Option<f32>,
}

impl ThreatAssessment {
    #[inline]
    pub fn is_clear(&self) -> bool {
        self.nearest.is_none()
    }
}

pub fn assess_threats(
    self_id: PlayerId,
    position: Vec2,
    radius: f32,
    world: &WorldSnapshot,
    cfg: &BotConfig,
) -> ThreatAssessment {
    let mut result = ThreatAssessment::default();
    let awareness = cfg.awareness_radius;

    for opponent in world.opponents(self_id) {
        if !opponent.alive || opponent.radius <= radius + cfg.threat_size_tolerance {
            continue;
        }
        let predicted = opponent.predicted_position(cfg.lead_time);
        let (away, distance) = (position - predicted).normalize_with_length();
        if distance > awareness {
            continue;
        }
        let away = if distance > 0.0 {
            away
        } else {
            // Standing on the prediction: fall back to the live offset, else +X
            let raw = (position - opponent.position).normalize();
            if raw == Vec2::ZERO {
                Vec2::RIGHT
            } else {
                raw
            }
        };
        result.vector += away * (1.0 - distance / awareness);
        if result.nearest.map_or(true, |n| distance < n) {
            result.nearest = Some(distance);
        }
    }

    result.panic = result.nearest.is_some_and(|n| n <= cfg.danger_radius);
    result
}

/// Mix the desired direction with avoidance. Threats that cancel out
/// while one is in panic range turn the agent around instead of letting
/// it walk on between them.
pub fn blend(desired: Vec2, threat: &ThreatAssessment, avoidance_weight: f32) -> Vec2 {
    let avoid = threat.vector.normalize();
    if avoid == Vec2::ZERO {
        return if threat.panic { -desired } else { desired };
    }
    if threat.panic {
        return avoid;
    }
    (desired + avoid * avoidance_weight).normalize()
}

/// One-step containment check for candidate headings
#[derive(Clone, Copy)]
pub struct SafetyProbe<'a> {
    pub map: &'a ArenaMap,
    pub position: Vec2,
    pub radius: f32,
    pub speed: f32,
    pub dt: f32,
    pub spawn: SpawnStatus,
}

impl SafetyProbe<'_> {
    #[inline]
    pub fn is_safe(&self, heading: Vec2) -> bool {
        let next = self.position + heading * (self.speed * self.dt);
        self.map
            .is_inside_map(next, self.radius, self.spawn.zone_id, self.spawn.active)
    }

    fn sweep(&self, base: Vec2, step: f32, max_checks: u32) -> Option<Vec2> {
        if self.is_safe(base) {
            return Some(base);
        }
        for i in 1..=max_checks {
            let angle = step * i as f32;
            let left = base.rotate(angle);
            if self.is_safe(left) {
                return Some(left);
            }
            let right = base.rotate(-angle);
            if self.is_safe(right) {
                return Some(right);
            }
        }
        None
    }
}

/// Nearest safe heading to `blended`, left before right at each increment,
/// with a second sweep from 45 degrees over. `None` means hold position.
pub fn find_safe_heading(
    probe: &SafetyProbe,
    blended: Vec2,
    step_deg: f32,
    max_checks: u32,
) -> Option<Vec2> {
    let base = blended.normalize();
    if base == Vec2::ZERO {
        return None;
    }
    let step = step_deg.to_radians();
    let found = probe
        .sweep(base, step, max_checks)
        .or_else(|| probe.sweep(base.rotate(FRAC_PI_4), step, max_checks));
    if found.is_none() {
        trace!(position = ?probe.position, "No safe heading, holding");
    }
    found
}

/// Turn `current` toward `target` at `rate` per second
pub fn smooth_heading(current: Vec2, target: Vec2, rate: f32, dt: f32) -> Vec2 {
    current.slerp(target, (rate * dt).min(1.0))
}
