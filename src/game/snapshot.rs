//! Perception snapshot
//!
//! The read-only view of the match a bot decides from. Snapshots are built
//! by an adapter (engine-driven or parsed from the wire), wrapped in an
//! `Arc` and replaced wholesale whenever new authoritative data arrives.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::form::*;
use crate::util::vec2::Vec2;

pub type PlayerId = Uuid;
pub type RuneId = u32;
pub type ShrineId = u32;

/// Evolution tier, smallest and fastest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub enum Form {
    #[default]
    Spark = 0,
    Glyph = 1,
    Ward = 2,
    Arcane = 3,
    Ancient = 4,
}

impl Form {
    pub const ALL: [Form; 5] = [Form::Spark, Form::Glyph, Form::Ward, Form::Arcane, Form::Ancient];

    /// Decode the wire byte; out-of-range values saturate to the largest form
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index as usize).min(Self::ALL.len() - 1)]
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn speed(self) -> f32 {
        SPEEDS[self.index()]
    }

    #[inline]
    pub fn radius(self) -> f32 {
        RADII[self.index()]
    }

    /// Ability cooldown in seconds
    #[inline]
    pub fn ability_cooldown(self) -> f32 {
        ABILITY_COOLDOWNS[self.index()]
    }

    /// Score required to leave this form; `None` for the final form
    pub fn score_to_evolve(self) -> Option<u32> {
        SCORE_TO_EVOLVE.get(self.index()).copied()
    }

    pub fn next(self) -> Option<Form> {
        Self::ALL.get(self.index() + 1).copied()
    }
}

/// Movement speed for a form with the two speed buffs applied
pub fn buffed_speed(form: Form, speed_buff: bool, shrine_speed: bool) -> f32 {
    let mut speed = form.speed();
    if speed_buff {
        speed *= SPEED_BUFF_MULT;
    }
    if shrine_speed {
        speed *= SHRINE_SPEED_MULT;
    }
    speed
}

/// Last known state of one participant (self included)
#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPlayer {
    pub id: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f32,
    pub form: Form,
    pub score: u32,
    pub alive: bool,
    pub spawn_zone_id: Option<u8>,
    pub spawn_zone_active: bool,
    /// Seconds until the ability is ready again
    pub ability_cooldown: f32,
    pub speed_buff: bool,
    pub shrine_speed_buff: bool,
}

impl ObservedPlayer {
    /// Minimal alive player of the given form, standing still
    pub fn new(id: PlayerId, position: Vec2, form: Form) -> Self {
        Self {
            id,
            position,
            velocity: Vec2::ZERO,
            radius: form.radius(),
            form,
            score: 0,
            alive: true,
            spawn_zone_id: None,
            spawn_zone_active: false,
            ability_cooldown: 0.0,
            speed_buff: false,
            shrine_speed_buff: false,
        }
    }

    /// Still sheltered inside its own spawn sanctuary
    #[inline]
    pub fn is_spawn_protected(&self) -> bool {
        self.spawn_zone_id.is_some() && self.spawn_zone_active
    }

    /// Linear extrapolation `lead` seconds ahead
    #[inline]
    pub fn predicted_position(&self, lead: f32) -> Vec2 {
        self.position + self.velocity * lead
    }

    pub fn speed(&self) -> f32 {
        buffed_speed(self.form, self.speed_buff, self.shrine_speed_buff)
    }
}

/// Rune on the floor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collectible {
    pub id: RuneId,
    pub position: Vec2,
    pub live: bool,
}

/// Shrine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Objective {
    pub id: ShrineId,
    pub shrine_type: u8,
    pub position: Vec2,
    pub active: bool,
}

/// One authoritative view of the match
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub tick: u32,
    /// Ticks left in the match
    pub time_remaining: u32,
    pub players: Vec<ObservedPlayer>,
    pub collectibles: Vec<Collectible>,
    pub objectives: Vec<Objective>,
}

impl WorldSnapshot {
    pub fn player(&self, id: PlayerId) -> Option<&ObservedPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    /// Everyone except `id`, dead or alive
    pub fn opponents(&self, id: PlayerId) -> impl Iterator<Item = &ObservedPlayer> {
        self.players.iter().filter(move |p| p.id != id)
    }

    pub fn live_collectibles(&self) -> impl Iterator<Item = &Collectible> {
        self.collectibles.iter().filter(|c| c.live)
    }

    pub fn active_objectives(&self) -> impl Iterator<Item = &Objective> {
        self.objectives.iter().filter(|o| o.active)
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }
}

/// Starting position of one participant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialPlacement {
    pub player_id: PlayerId,
    pub position: Vec2,
    pub color_index: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchStartInfo {
    pub match_id: Uuid,
    pub rng_seed: u64,
    pub start_tick: u32,
    pub players: Vec<InitialPlacement>,
}

/// Discrete match notifications
#[derive(Debug, Clone, PartialEq)]
pub enum MatchEvent {
    MatchStart(MatchStartInfo),
    Countdown { seconds: u32 },
    MatchStarted,
    RuneSpawned { rune_id: RuneId, position: Vec2 },
    RuneCollected { player_id: PlayerId, rune_id: RuneId, points: u32 },
    PlayerEvolved { player_id: PlayerId, old_form: Form, new_form: Form },
    PlayerEliminated { victim_id: PlayerId, killer_id: Option<PlayerId> },
    ShrineCaptured { player_id: PlayerId, shrine_id: ShrineId, shrine_type: u8 },
    MatchEnded { winner_id: Option<PlayerId> },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_tables() {
        assert_eq!(Form::Spark.speed(), 6.0);
        assert_eq!(Form::Ancient.radius(), 2.0);
        assert_eq!(Form::Ward.ability_cooldown(), 6.0);
        assert_eq!(Form::Arcane.score_to_evolve(), Some(1000));
        assert_eq!(Form::Ancient.score_to_evolve(), None);
        assert_eq!(Form::Glyph.next(), Some(Form::Ward));
        assert_eq!(Form::Ancient.next(), None);
    }

    #[test]
    fn test_form_from_index_saturates() {
        assert_eq!(Form::from_index(0), Form::Spark);
        assert_eq!(Form::from_index(3), Form::Arcane);
        assert_eq!(Form::from_index(250), Form::Ancient);
    }

    #[test]
    fn test_buffed_speed_is_multiplicative() {
        let base = Form::Ward.speed();
        assert_eq!(buffed_speed(Form::Ward, false, false), base);
        let both = buffed_speed(Form::Ward, true, true);
        assert!((both - base * 1.4 * 1.2).abs() < 1e-5);
    }

    #[test]
    fn test_spawn_protection_needs_known_zone() {
        let mut p = ObservedPlayer::new(Uuid::new_v4(), Vec2::ZERO, Form::Spark);
        p.spawn_zone_active = true;
        assert!(!p.is_spawn_protected());
        p.spawn_zone_id = Some(3);
        assert!(p.is_spawn_protected());
    }

    #[test]
    fn test_snapshot_queries() {
        let me = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut dead = ObservedPlayer::new(Uuid::new_v4(), Vec2::ZERO, Form::Spark);
        dead.alive = false;
        let world = WorldSnapshot {
            players: vec![
                ObservedPlayer::new(me, Vec2::ZERO, Form::Spark),
                ObservedPlayer::new(other, Vec2::new(5.0, 0.0), Form::Ward),
                dead,
            ],
            collectibles: vec![
                Collectible { id: 1, position: Vec2::ZERO, live: true },
                Collectible { id: 2, position: Vec2::ZERO, live: false },
            ],
            ..Default::default()
        };
        assert_eq!(world.opponents(me).count(), 2);
        assert_eq!(world.player(other).map(|p| p.form), Some(Form::Ward));
        assert_eq!(world.live_collectibles().count(), 1);
        assert_eq!(world.alive_count(), 2);
    }
}
