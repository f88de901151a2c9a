//! Local movement prediction
//!
//! Advances the bot's own position between authoritative snapshots with the
//! same contract the server applies to player input: quantized axes,
//! direction clamped to unit length, containment-gated steps.

use serde::{Deserialize, Serialize};

use crate::game::agent::Kinematics;
use crate::game::constants::input::{AXIS_MAX, NO_INPUT};
use crate::game::map::ArenaMap;
use crate::util::vec2::Vec2;

/// Two-axis stick value as sent on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveAxes {
    pub x: i8,
    pub y: i8,
}

impl MoveAxes {
    /// Stick released
    pub const NONE: MoveAxes = MoveAxes {
        x: NO_INPUT,
        y: NO_INPUT,
    };

    /// Quantize a heading; a zero heading is "no input", not "zero input"
    pub fn from_heading(heading: Vec2) -> Self {
        if heading == Vec2::ZERO {
            return Self::NONE;
        }
        let quantize = |v: f32| {
            let max = AXIS_MAX as f32;
            (v * max).round().clamp(-max, max) as i8
        };
        Self {
            x: quantize(heading.x),
            y: quantize(heading.y),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        self.x == NO_INPUT && self.y == NO_INPUT
    }

    /// Dequantize; the sentinel reads as zero and the result never exceeds
    /// unit length
    pub fn to_direction(self) -> Vec2 {
        let axis = |v: i8| {
            if v == NO_INPUT {
                0.0
            } else {
                v as f32 / AXIS_MAX as f32
            }
        };
        Vec2::new(axis(self.x), axis(self.y)).clamp_length(1.0)
    }
}

impl Default for MoveAxes {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// No directional input
    Idle,
    Moved,
    /// The step would have left the playable area; position unchanged
    Blocked,
}

/// Integrate one step. Leaving the spawn sanctuary clears its active flag
/// for good.
pub fn step(map: &ArenaMap, kinematics: &mut Kinematics, direction: Vec2, dt: f32) -> StepOutcome {
    if direction == Vec2::ZERO {
        return StepOutcome::Idle;
    }
    let candidate = kinematics.position + direction * (kinematics.speed * dt);
    let spawn = kinematics.spawn;
    if !map.is_inside_map(candidate, kinematics.radius, spawn.zone_id, spawn.active) {
        return StepOutcome::Blocked;
    }
    kinematics.position = candidate;
    if let (true, Some(zone_id)) = (spawn.active, spawn.zone_id) {
        if !map.is_inside_spawn_zone(candidate, kinematics.radius, zone_id) {
            kinematics.spawn.leave();
        }
    }
    StepOutcome::Moved
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Snapped,
    Blended,
}

/// Pull the prediction toward an authoritative position
pub fn reconcile(
    kinematics: &mut Kinematics,
    authoritative: Vec2,
    snap_distance: f32,
    blend: f32,
) -> ReconcileOutcome {
    let error = kinematics.position.distance_to(authoritative);
    if error > snap_distance {
        kinematics.position = authoritative;
        ReconcileOutcome::Snapped
    } else {
        kinematics.position = kinematics.position.lerp(authoritative, blend);
        ReconcileOutcome::Blended
    }
}
