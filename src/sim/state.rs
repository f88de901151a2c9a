//! Local simulator entities

use hashbrown::HashMap;

use crate::game::constants::rune;
use crate::game::snapshot::{buffed_speed, Form, PlayerId, RuneId, ShrineId};
use crate::net::protocol::WireId;
use crate::util::vec2::Vec2;

/// Ticks for a duration in seconds at the simulator rate
#[inline]
pub fn secs_to_ticks(secs: f32, tick_rate: u32) -> u32 {
    (secs * tick_rate as f32).round() as u32
}

#[derive(Debug, Clone)]
pub struct SimPlayer {
    pub id: PlayerId,
    pub wire_id: WireId,
    pub color_index: u8,
    pub position: Vec2,
    pub velocity: Vec2,
    pub form: Form,
    pub score: u32,
    pub alive: bool,
    pub spawn_zone_id: u8,
    pub spawn_active: bool,
    /// Latest dequantized stick direction
    pub input: Vec2,
    pub ability_cooldown_ticks: u32,
    pub speed_buff_ticks: u32,
    /// Remaining ticks per shrine type
    pub shrine_buff_ticks: [u32; 4],
    pub eliminations: u32,
    pub runes_collected: u32,
    pub eliminated_at: Option<u32>,
}

impl SimPlayer {
    pub fn new(id: PlayerId, color_index: u8, zone_id: u8, position: Vec2) -> Self {
        Self {
            id,
            wire_id: *id.as_bytes(),
            color_index,
            position,
            velocity: Vec2::ZERO,
            form: Form::Spark,
            score: 0,
            alive: true,
            spawn_zone_id: zone_id,
            spawn_active: true,
            input: Vec2::ZERO,
            ability_cooldown_ticks: 0,
            speed_buff_ticks: 0,
            shrine_buff_ticks: [0; 4],
            eliminations: 0,
            runes_collected: 0,
            eliminated_at: None,
        }
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.form.radius()
    }

    #[inline]
    pub fn is_protected(&self) -> bool {
        self.spawn_active
    }

    pub fn speed(&self, speed_shrine: u8) -> f32 {
        let shrine = self
            .shrine_buff_ticks
            .get(speed_shrine as usize)
            .is_some_and(|&t| t > 0);
        buffed_speed(self.form, self.speed_buff_ticks > 0, shrine)
    }

    /// Shrine types whose buff is running
    pub fn active_shrine_buffs(&self) -> Vec<u8> {
        self.shrine_buff_ticks
            .iter()
            .enumerate()
            .filter(|(_, &t)| t > 0)
            .map(|(ty, _)| ty as u8)
            .collect()
    }

    /// Evolve through every threshold the score has passed. Returns the
    /// (old, new) forms when anything changed.
    pub fn evolve(&mut self) -> Option<(Form, Form)> {
        let old = self.form;
        while let (Some(threshold), Some(next)) = (self.form.score_to_evolve(), self.form.next()) {
            if self.score < threshold {
                break;
            }
            self.form = next;
        }
        (self.form != old).then_some((old, self.form))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimRune {
    pub id: RuneId,
    pub position: Vec2,
}

impl SimRune {
    #[inline]
    pub fn touches(&self, position: Vec2, radius: f32) -> bool {
        let reach = radius + rune::RADIUS;
        self.position.distance_sq_to(position) <= reach * reach
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimShrine {
    pub id: ShrineId,
    pub shrine_type: u8,
    pub position: Vec2,
    pub active: bool,
    pub cooldown_ticks: u32,
    /// Player index and uninterrupted channel ticks
    pub channel: Option<(usize, u32)>,
    pub controller: Option<WireId>,
}

impl SimShrine {
    pub fn new(id: ShrineId, shrine_type: u8, position: Vec2) -> Self {
        Self {
            id,
            shrine_type,
            position,
            active: true,
            cooldown_ticks: 0,
            channel: None,
            controller: None,
        }
    }
}

/// Lifecycle of a local match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchPhase {
    Playing,
    Ended,
}

/// Everything the simulator owns
#[derive(Debug, Clone)]
pub struct SimState {
    pub tick: u32,
    pub phase: MatchPhase,
    pub players: Vec<SimPlayer>,
    pub index: HashMap<WireId, usize>,
    pub runes: Vec<SimRune>,
    pub shrines: Vec<SimShrine>,
    pub next_rune_id: RuneId,
}

impl SimState {
    pub fn new(players: Vec<SimPlayer>) -> Self {
        let index = players
            .iter()
            .enumerate()
            .map(|(i, p)| (p.wire_id, i))
            .collect();
        Self {
            tick: 0,
            phase: MatchPhase::Playing,
            players,
            index,
            runes: Vec::new(),
            shrines: Vec::new(),
            next_rune_id: 1,
        }
    }

    pub fn player_index(&self, wire_id: &WireId) -> Option<usize> {
        self.index.get(wire_id).copied()
    }

    pub fn alive_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    pub fn alloc_rune_id(&mut self) -> RuneId {
        let id = self.next_rune_id;
        self.next_rune_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::shrine::SPEED_TYPE;
    use uuid::Uuid;

    #[test]
    fn test_evolve_skips_multiple_tiers() {
        let mut p = SimPlayer::new(Uuid::from_u128(1), 0, 0, Vec2::ZERO);
        p.score = 99;
        assert_eq!(p.evolve(), None);
        p.score = 310;
        assert_eq!(p.evolve(), Some((Form::Spark, Form::Ward)));
        p.score = 5000;
        assert_eq!(p.evolve(), Some((Form::Ward, Form::Ancient)));
        assert_eq!(p.evolve(), None);
    }

    #[test]
    fn test_speed_buffs() {
        let mut p = SimPlayer::new(Uuid::from_u128(1), 0, 0, Vec2::ZERO);
        assert_eq!(p.speed(SPEED_TYPE), 6.0);
        p.shrine_buff_ticks[SPEED_TYPE as usize] = 10;
        assert!((p.speed(SPEED_TYPE) - 7.2).abs() < 1e-5);
        assert_eq!(p.active_shrine_buffs(), vec![SPEED_TYPE]);
    }

    #[test]
    fn test_rune_touch() {
        let rune = SimRune {
            id: 1,
            position: Vec2::new(1.0, 0.0),
        };
        assert!(rune.touches(Vec2::new(0.3, 0.0), 0.5));
        assert!(!rune.touches(Vec2::new(-0.2, 0.0), 0.5));
    }

    #[test]
    fn test_state_index() {
        let a = SimPlayer::new(Uuid::from_u128(1), 0, 0, Vec2::ZERO);
        let b = SimPlayer::new(Uuid::from_u128(2), 1, 1, Vec2::ZERO);
        let wire = b.wire_id;
        let mut state = SimState::new(vec![a, b]);
        assert_eq!(state.player_index(&wire), Some(1));
        assert_eq!(state.player_index(&[0; 16]), None);
        assert_eq!(state.alloc_rune_id(), 1);
        assert_eq!(state.alloc_rune_id(), 2);
    }
}
