//! Per-bot runtime state
//!
//! Exclusively owned by one `BotDriver`; nothing here is shared.

use std::f32::consts::TAU;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::SeedableRng;
use rustc_hash::FxHasher;

use crate::game::snapshot::{Form, PlayerId, RuneId, ShrineId};
use crate::game::systems::path::{PathFollower, StuckDetector};
use crate::util::vec2::Vec2;

/// High-level goal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Intent {
    #[default]
    None,
    Collect,
    ObjectiveCapture,
    Chase,
    Bait,
    Wander,
}

/// What the current target point refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetRef {
    #[default]
    Point,
    Collectible(RuneId),
    Objective(ShrineId),
    Player(PlayerId),
}

/// Spawn sanctuary membership
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpawnStatus {
    pub zone_id: Option<u8>,
    pub active: bool,
}

impl SpawnStatus {
    pub fn in_zone(zone_id: u8) -> Self {
        Self {
            zone_id: Some(zone_id),
            active: true,
        }
    }

    #[inline]
    pub fn is_protected(&self) -> bool {
        self.zone_id.is_some() && self.active
    }

    /// Leaving is one-way for the rest of the match
    #[inline]
    pub fn leave(&mut self) {
        self.active = false;
    }
}

/// Locally predicted movement state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Kinematics {
    pub position: Vec2,
    pub speed: f32,
    pub radius: f32,
    pub spawn: SpawnStatus,
}

impl Kinematics {
    pub fn new(position: Vec2, form: Form) -> Self {
        Self {
            position,
            speed: form.speed(),
            radius: form.radius(),
            spawn: SpawnStatus::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentState {
    pub id: PlayerId,
    pub kinematics: Kinematics,
    /// Seconds until the server lets the ability fire again
    pub ability_cooldown: f32,
    pub intent: Intent,
    pub target_ref: TargetRef,
    pub path: PathFollower,
    pub stuck: StuckDetector,
    /// Smoothed unit heading, zero before the first move
    pub heading: Vec2,
    pub threat_direction: Vec2,
    pub panic: bool,
    pub last_threat_at: Option<f32>,
    pub last_pick_at: Option<f32>,
    /// Desynchronizes periodic behavior across bots, in [0, TAU)
    pub phase_offset: f32,
    pub rng: StdRng,
    pub alive: bool,
    /// Seconds since the agent was created
    pub clock: f32,
}

/// Stable per-id hash, identical across runs
fn id_hash(id: &PlayerId) -> u64 {
    let mut hasher = FxHasher::default();
    id.hash(&mut hasher);
    hasher.finish()
}

impl AgentState {
    pub fn new(id: PlayerId, position: Vec2, form: Form) -> Self {
        let hash = id_hash(&id);
        let phase_offset = (hash % 1_000_000) as f32 / 1_000_000.0 * TAU;
        Self {
            id,
            kinematics: Kinematics::new(position, form),
            ability_cooldown: 0.0,
            intent: Intent::None,
            target_ref: TargetRef::Point,
            path: PathFollower::new(),
            stuck: StuckDetector::default(),
            heading: Vec2::ZERO,
            threat_direction: Vec2::ZERO,
            panic: false,
            last_threat_at: None,
            last_pick_at: None,
            phase_offset: phase_offset.min(TAU - f32::EPSILON),
            rng: StdRng::seed_from_u64(hash),
            alive: true,
            clock: 0.0,
        }
    }

    #[inline]
    pub fn position(&self) -> Vec2 {
        self.kinematics.position
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.kinematics.radius
    }

    #[inline]
    pub fn target(&self) -> Option<Vec2> {
        self.path.target()
    }

    /// Drop the target; the intent engine picks again on its next pass
    pub fn abandon_target(&mut self) {
        self.path.clear();
        self.intent = Intent::None;
        self.target_ref = TargetRef::Point;
    }

    /// Fresh start at the match placement, keeping identity, phase and rng
    pub fn place_at(&mut self, position: Vec2) {
        self.kinematics.position = position;
        self.abandon_target();
        self.heading = Vec2::ZERO;
        self.threat_direction = Vec2::ZERO;
        self.panic = false;
        self.last_threat_at = None;
        self.last_pick_at = None;
        self.stuck.reset(position, self.clock);
        self.alive = true;
    }
}
