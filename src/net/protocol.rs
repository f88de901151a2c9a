//! Rune Relic wire protocol
//!
//! JSON text messages (`type`-tagged, snake_case) in both directions, plus a
//! compact bincode frame for the input uplink. Positions, velocities and
//! radii travel as Q16.16 fixed point; the ability cooldown is Q16.16 ticks.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::game::constants::input::{FLAG_ABILITY, FLAG_JUMP};
use crate::game::constants::shrine::SPEED_TYPE;
use crate::game::constants::timing::TICK_RATE;
use crate::game::snapshot::{
    Collectible, Form, InitialPlacement, MatchEvent, MatchStartInfo, Objective, ObservedPlayer,
};
use crate::game::systems::predictor::MoveAxes;
use crate::util::vec2::{Vec2, FIXED_SCALE};

/// Player and match ids as raw bytes
pub type WireId = [u8; 16];

#[inline]
pub fn wire_id(id: Uuid) -> WireId {
    *id.as_bytes()
}

#[inline]
pub fn from_wire_id(raw: WireId) -> Uuid {
    Uuid::from_bytes(raw)
}

/// Messages from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Ready,
    Input(InputRecord),
    Ping { timestamp: u64 },
    Leave,
}

/// Directional input for one send interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub tick: u32,
    /// -127..=127, or -128 for "stick released"
    pub move_x: i8,
    pub move_y: i8,
    pub flags: u8,
    /// Client wall clock, unix milliseconds
    pub timestamp: u64,
}

impl InputRecord {
    pub fn new(tick: u32, axes: MoveAxes, ability: bool, timestamp: u64) -> Self {
        Self {
            tick,
            move_x: axes.x,
            move_y: axes.y,
            flags: if ability { FLAG_ABILITY } else { 0 },
            timestamp,
        }
    }

    #[inline]
    pub fn axes(&self) -> MoveAxes {
        MoveAxes {
            x: self.move_x,
            y: self.move_y,
        }
    }

    #[inline]
    pub fn ability_pressed(&self) -> bool {
        self.flags & FLAG_ABILITY != 0
    }

    #[inline]
    pub fn jump_pressed(&self) -> bool {
        self.flags & FLAG_JUMP != 0
    }
}

/// Current unix time in milliseconds
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Binary uplink frame: one input record tagged with its sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UplinkFrame {
    pub player_id: WireId,
    pub record: InputRecord,
}

/// Messages from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    MatchStart(MatchStartMsg),
    State(StateUpdate),
    Event(WireEvent),
    MatchEnd(MatchEndMsg),
    InputAck { tick: u32, server_tick: u32 },
    Pong { timestamp: u64, server_time: u64 },
    Error { code: String, message: String },
    Shutdown { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchStartMsg {
    pub match_id: WireId,
    pub rng_seed: u64,
    pub start_tick: u32,
    pub players: Vec<InitialPlayerMsg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitialPlayerMsg {
    pub player_id: WireId,
    pub position: [i32; 2],
    pub color_index: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub tick: u32,
    /// Ticks left in the match
    pub time_remaining: u32,
    pub players: Vec<PlayerStateMsg>,
    /// Changed runes only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runes: Option<Vec<RuneUpdate>>,
    /// Changed shrines only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shrines: Option<Vec<ShrineUpdate>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStateMsg {
    #[serde(alias = "id")]
    pub player_id: WireId,
    pub position: [i32; 2],
    pub velocity: [i32; 2],
    pub form: u8,
    pub score: u32,
    pub alive: bool,
    /// -1 when the player has no spawn zone
    pub spawn_zone_id: i32,
    pub spawn_zone_active: bool,
    /// Zero when the server omits it; the form radius is used instead
    #[serde(default)]
    pub radius: i32,
    #[serde(default)]
    pub ability_cooldown: i32,
    #[serde(default)]
    pub buffs: PlayerBuffs,
}

/// Remaining buff ticks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerBuffs {
    pub speed: u32,
    pub shield: u32,
    pub invulnerable: u32,
    pub shrine_buffs: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuneUpdate {
    pub id: u32,
    pub rune_type: u8,
    pub position: [i32; 2],
    pub collected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShrineUpdate {
    pub id: u32,
    pub shrine_type: u8,
    pub position: [i32; 2],
    pub active: bool,
    #[serde(default)]
    pub controller: Option<WireId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WireEvent {
    Countdown {
        seconds: u32,
    },
    MatchStarted,
    RuneSpawned {
        tick: u32,
        rune_id: u32,
        rune_type: u8,
        position: [i32; 2],
    },
    RuneCollected {
        tick: u32,
        player_id: WireId,
        rune_id: u32,
        rune_type: u8,
        points: u32,
    },
    PlayerEvolved {
        tick: u32,
        player_id: WireId,
        old_form: u8,
        new_form: u8,
    },
    PlayerEliminated {
        tick: u32,
        victim_id: WireId,
        killer_id: Option<WireId>,
        victim_form: u8,
    },
    AbilityUsed {
        tick: u32,
        player_id: WireId,
        ability_type: u8,
    },
    ShrineCaptured {
        tick: u32,
        player_id: WireId,
        shrine_id: u32,
        shrine_type: u8,
    },
    ShrinePowerActivated {
        tick: u32,
        shrine_id: u32,
        shrine_type: u8,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchEndMsg {
    pub match_id: WireId,
    pub end_tick: u32,
    pub winner_id: Option<WireId>,
    pub placements: Vec<Placement>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub player_id: WireId,
    pub place: u8,
    pub score: u32,
    pub eliminations: u32,
    #[serde(default)]
    pub runes_collected: u32,
}

// Wire -> perception conversions

impl PlayerStateMsg {
    pub fn to_observed(&self) -> ObservedPlayer {
        let form = Form::from_index(self.form);
        let radius = if self.radius > 0 {
            self.radius as f32 / FIXED_SCALE
        } else {
            form.radius()
        };
        ObservedPlayer {
            id: from_wire_id(self.player_id),
            position: Vec2::from_fixed(self.position),
            velocity: Vec2::from_fixed(self.velocity),
            radius,
            form,
            score: self.score,
            alive: self.alive,
            spawn_zone_id: u8::try_from(self.spawn_zone_id).ok(),
            spawn_zone_active: self.spawn_zone_active,
            ability_cooldown: (self.ability_cooldown.max(0) as f32 / FIXED_SCALE) / TICK_RATE as f32,
            speed_buff: self.buffs.speed > 0,
            shrine_speed_buff: self.buffs.shrine_buffs.contains(&SPEED_TYPE),
        }
    }
}

impl RuneUpdate {
    pub fn to_collectible(&self) -> Collectible {
        Collectible {
            id: self.id,
            position: Vec2::from_fixed(self.position),
            live: !self.collected,
        }
    }
}

impl ShrineUpdate {
    pub fn to_objective(&self) -> Objective {
        Objective {
            id: self.id,
            shrine_type: self.shrine_type,
            position: Vec2::from_fixed(self.position),
            active: self.active,
        }
    }
}

impl MatchStartMsg {
    pub fn to_info(&self) -> MatchStartInfo {
        MatchStartInfo {
            match_id: from_wire_id(self.match_id),
            rng_seed: self.rng_seed,
            start_tick: self.start_tick,
            players: self
                .players
                .iter()
                .map(|p| InitialPlacement {
                    player_id: from_wire_id(p.player_id),
                    position: Vec2::from_fixed(p.position),
                    color_index: p.color_index,
                })
                .collect(),
        }
    }
}

impl WireEvent {
    /// Perception-level event; `None` for events bots do not react to
    pub fn to_match_event(&self) -> Option<MatchEvent> {
        let event = match *self {
            WireEvent::Countdown { seconds } => MatchEvent::Countdown { seconds },
            WireEvent::MatchStarted => MatchEvent::MatchStarted,
            WireEvent::RuneSpawned { rune_id, position, .. } => MatchEvent::RuneSpawned {
                rune_id,
                position: Vec2::from_fixed(position),
            },
            WireEvent::RuneCollected {
                player_id,
                rune_id,
                points,
                ..
            } => MatchEvent::RuneCollected {
                player_id: from_wire_id(player_id),
                rune_id,
                points,
            },
            WireEvent::PlayerEvolved {
                player_id,
                old_form,
                new_form,
                ..
            } => MatchEvent::PlayerEvolved {
                player_id: from_wire_id(player_id),
                old_form: Form::from_index(old_form),
                new_form: Form::from_index(new_form),
            },
            WireEvent::PlayerEliminated {
                victim_id,
                killer_id,
                ..
            } => MatchEvent::PlayerEliminated {
                victim_id: from_wire_id(victim_id),
                killer_id: killer_id.map(from_wire_id),
            },
            WireEvent::ShrineCaptured {
                player_id,
                shrine_id,
                shrine_type,
                ..
            } => MatchEvent::ShrineCaptured {
                player_id: from_wire_id(player_id),
                shrine_id,
                shrine_type,
            },
            WireEvent::AbilityUsed { .. } | WireEvent::ShrinePowerActivated { .. } => return None,
        };
        Some(event)
    }
}

/// Wire codec failures
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Decode error: {0}")]
    Decode(String),
}

pub fn encode_json<T: Serialize>(message: &T) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(message)?)
}

pub fn decode_server_json(text: &str) -> Result<ServerMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

pub fn decode_client_json(text: &str) -> Result<ClientMessage, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}

/// Encode a binary frame using bincode
/// Uses legacy config for fixed-size integers
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>, ProtocolError> {
    bincode::serde::encode_to_vec(message, bincode::config::legacy())
        .map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decode a binary frame using bincode
pub fn decode_frame<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    bincode::serde::decode_from_slice(data, bincode::config::legacy())
        .map(|(msg, _)| msg)
        .map_err(|e| ProtocolError::Decode(e.to_string()))
}
