//! Local match simulator
//!
//! A small stand-in for the Rune Relic server so a swarm of bots can play a
//! full match in-process. It follows the server's movement and scoring
//! contract closely enough to exercise every bot behavior; it is not the
//! authoritative simulation.

pub mod rules;
pub mod state;

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::HarnessConfig;
use crate::game::constants::{harness, shrine};
use crate::game::map::ArenaMap;
use crate::game::snapshot::{Collectible, Form, Objective, ObservedPlayer, PlayerId, WorldSnapshot};
use crate::net::protocol::{
    decode_frame, wire_id, InitialPlayerMsg, MatchEndMsg, MatchStartMsg, Placement, PlayerBuffs,
    PlayerStateMsg, ProtocolError, RuneUpdate, ServerMessage, ShrineUpdate, StateUpdate,
    UplinkFrame, WireEvent,
};
use crate::util::vec2::{Vec2, FIXED_SCALE};

use rules::{Dirty, ShrineTiming};
use state::{secs_to_ticks, MatchPhase, SimPlayer, SimShrine, SimState};

pub struct LocalMatch {
    map: Arc<ArenaMap>,
    match_id: Uuid,
    seed: u64,
    rng: StdRng,
    state: SimState,
    rune_target: usize,
    match_ticks: u32,
    tick_rate: u32,
    dt: f32,
    burst_ticks: u32,
    shrine_timing: ShrineTiming,
    dirty: Dirty,
    events: Vec<WireEvent>,
    inputs_rejected: u64,
}

impl LocalMatch {
    /// Players are placed round-robin over the spawn sanctuaries
    pub fn new(map: Arc<ArenaMap>, config: &HarnessConfig, player_ids: &[PlayerId]) -> Self {
        let seed = config.seed.unwrap_or_else(rand::random);
        let mut rng = StdRng::seed_from_u64(seed);
        let match_id = Uuid::from_u128(rng.gen());

        let zones = map.spawn_zones();
        let players = player_ids
            .iter()
            .enumerate()
            .filter_map(|(i, &id)| {
                let zone = zones.get(i % zones.len().max(1))?;
                Some(SimPlayer::new(id, i as u8, zone.id, zone.center))
            })
            .collect();
        let mut state = SimState::new(players);
        state.shrines = shrine::LAYOUT
            .iter()
            .enumerate()
            .map(|(i, &(x, y, ty))| SimShrine::new(i as u32 + 1, ty, Vec2::new(x, y)))
            .collect();

        let tick_rate = config.tick_rate;
        let mut sim = Self {
            map,
            match_id,
            seed,
            rng,
            state,
            rune_target: config.rune_count,
            match_ticks: config.match_ticks(),
            tick_rate,
            dt: config.dt(),
            burst_ticks: secs_to_ticks(harness::ABILITY_BURST_SECS, tick_rate),
            shrine_timing: ShrineTiming {
                channel: secs_to_ticks(shrine::CHANNEL_SECS, tick_rate),
                cooldown: secs_to_ticks(shrine::COOLDOWN_SECS, tick_rate),
                buff: secs_to_ticks(shrine::BUFF_SECS, tick_rate),
            },
            dirty: Dirty::default(),
            events: Vec::new(),
            inputs_rejected: 0,
        };
        // Every shrine goes out with the first broadcast
        sim.dirty.shrines.extend(0..sim.state.shrines.len());
        rules::refill_runes(
            &mut sim.state,
            &sim.map,
            &mut sim.rng,
            sim.rune_target,
            &mut sim.dirty,
        );
        info!(
            match_id = %sim.match_id,
            seed,
            players = sim.state.players.len(),
            runes = sim.state.runes.len(),
            "Local match created"
        );
        sim
    }

    pub fn match_start(&self) -> ServerMessage {
        ServerMessage::MatchStart(MatchStartMsg {
            match_id: wire_id(self.match_id),
            rng_seed: self.seed,
            start_tick: self.state.tick,
            players: self
                .state
                .players
                .iter()
                .map(|p| InitialPlayerMsg {
                    player_id: p.wire_id,
                    position: p.position.to_fixed(),
                    color_index: p.color_index,
                })
                .collect(),
        })
    }

    /// Decode and apply one binary uplink frame
    pub fn apply_frame(&mut self, bytes: &[u8]) -> Result<bool, ProtocolError> {
        let frame: UplinkFrame = decode_frame(bytes)?;
        Ok(self.apply_input(&frame))
    }

    /// Latest input wins until the next one arrives. Returns false for
    /// unknown or eliminated senders.
    pub fn apply_input(&mut self, frame: &UplinkFrame) -> bool {
        let tick = self.state.tick;
        let Some(index) = self.state.player_index(&frame.player_id) else {
            self.inputs_rejected += 1;
            debug!(tick, "Input from unknown player");
            return false;
        };
        let player = &mut self.state.players[index];
        if !player.alive {
            return false;
        }
        player.input = frame.record.axes().to_direction();
        if frame.record.ability_pressed() && player.ability_cooldown_ticks == 0 {
            player.speed_buff_ticks = self.burst_ticks;
            player.ability_cooldown_ticks =
                secs_to_ticks(player.form.ability_cooldown(), self.tick_rate);
            self.events.push(WireEvent::AbilityUsed {
                tick,
                player_id: player.wire_id,
                ability_type: player.form as u8,
            });
        }
        true
    }

    /// Advance one simulation tick
    pub fn step(&mut self) {
        if self.state.phase == MatchPhase::Ended {
            return;
        }
        self.state.tick += 1;
        let tick = self.state.tick;

        rules::apply_movement(&mut self.state, &self.map, self.dt);
        rules::collect_runes(&mut self.state, &mut self.events, &mut self.dirty);
        rules::resolve_eliminations(&mut self.state, &mut self.events);
        rules::update_shrines(&mut self.state, self.shrine_timing, &mut self.events, &mut self.dirty);
        rules::decay_timers(&mut self.state);

        let spawned = rules::refill_runes(
            &mut self.state,
            &self.map,
            &mut self.rng,
            self.rune_target,
            &mut self.dirty,
        );
        self.events.extend(spawned.into_iter().map(|r| WireEvent::RuneSpawned {
            tick,
            rune_id: r.id,
            rune_type: 0,
            position: r.position.to_fixed(),
        }));

        let alive = self.state.alive_count();
        let last_standing = self.state.players.len() > 1 && alive <= 1;
        if tick >= self.match_ticks || last_standing {
            self.state.phase = MatchPhase::Ended;
            info!(match_id = %self.match_id, tick, alive, "Local match ended");
        }
    }

    /// Full player list plus the runes and shrines changed since the last call
    pub fn state_message(&mut self) -> ServerMessage {
        let runes: Vec<RuneUpdate> = self
            .dirty
            .runes
            .drain(..)
            .map(|(r, collected)| RuneUpdate {
                id: r.id,
                rune_type: 0,
                position: r.position.to_fixed(),
                collected,
            })
            .collect();

        let mut indices = std::mem::take(&mut self.dirty.shrines);
        indices.sort_unstable();
        indices.dedup();
        let shrines: Vec<ShrineUpdate> = indices
            .into_iter()
            .filter_map(|i| self.state.shrines.get(i))
            .map(|s| ShrineUpdate {
                id: s.id,
                shrine_type: s.shrine_type,
                position: s.position.to_fixed(),
                active: s.active,
                controller: s.controller,
            })
            .collect();

        ServerMessage::State(StateUpdate {
            tick: self.state.tick,
            time_remaining: self.time_remaining(),
            players: self.state.players.iter().map(|p| self.player_message(p)).collect(),
            runes: (!runes.is_empty()).then_some(runes),
            shrines: (!shrines.is_empty()).then_some(shrines),
        })
    }

    fn player_message(&self, p: &SimPlayer) -> PlayerStateMsg {
        PlayerStateMsg {
            player_id: p.wire_id,
            position: p.position.to_fixed(),
            velocity: p.velocity.to_fixed(),
            form: p.form as u8,
            score: p.score,
            alive: p.alive,
            spawn_zone_id: p.spawn_zone_id as i32,
            spawn_zone_active: p.spawn_active,
            radius: (p.radius() * FIXED_SCALE) as i32,
            ability_cooldown: (p.ability_cooldown_ticks as f32 * FIXED_SCALE) as i32,
            buffs: PlayerBuffs {
                speed: p.speed_buff_ticks,
                shield: 0,
                invulnerable: 0,
                shrine_buffs: p.active_shrine_buffs(),
            },
        }
    }

    /// Full world view for the live adapter. Clears the pending deltas.
    pub fn take_snapshot(&mut self) -> WorldSnapshot {
        self.dirty.runes.clear();
        self.dirty.shrines.clear();
        let cooldown_secs = |ticks: u32| ticks as f32 / self.tick_rate as f32;
        WorldSnapshot {
            tick: self.state.tick,
            time_remaining: self.time_remaining(),
            players: self
                .state
                .players
                .iter()
                .map(|p| ObservedPlayer {
                    id: p.id,
                    position: p.position,
                    velocity: p.velocity,
                    radius: p.radius(),
                    form: p.form,
                    score: p.score,
                    alive: p.alive,
                    spawn_zone_id: Some(p.spawn_zone_id),
                    spawn_zone_active: p.spawn_active,
                    ability_cooldown: cooldown_secs(p.ability_cooldown_ticks),
                    speed_buff: p.speed_buff_ticks > 0,
                    shrine_speed_buff: p.active_shrine_buffs().contains(&shrine::SPEED_TYPE),
                })
                .collect(),
            collectibles: self
                .state
                .runes
                .iter()
                .map(|r| Collectible {
                    id: r.id,
                    position: r.position,
                    live: true,
                })
                .collect(),
            objectives: self
                .state
                .shrines
                .iter()
                .map(|s| Objective {
                    id: s.id,
                    shrine_type: s.shrine_type,
                    position: s.position,
                    active: s.active,
                })
                .collect(),
        }
    }

    pub fn drain_events(&mut self) -> Vec<WireEvent> {
        std::mem::take(&mut self.events)
    }

    /// Alive players first, then by score, then by how late they fell
    pub fn end_message(&self) -> MatchEndMsg {
        let mut order: Vec<&SimPlayer> = self.state.players.iter().collect();
        order.sort_by(|a, b| {
            b.alive
                .cmp(&a.alive)
                .then(b.score.cmp(&a.score))
                .then(b.eliminated_at.cmp(&a.eliminated_at))
        });
        let winner_id = order.first().filter(|p| p.alive).map(|p| p.wire_id);
        MatchEndMsg {
            match_id: wire_id(self.match_id),
            end_tick: self.state.tick,
            winner_id,
            placements: order
                .iter()
                .enumerate()
                .map(|(i, p)| Placement {
                    player_id: p.wire_id,
                    place: (i + 1) as u8,
                    score: p.score,
                    eliminations: p.eliminations,
                    runes_collected: p.runes_collected,
                })
                .collect(),
        }
    }

    fn time_remaining(&self) -> u32 {
        self.match_ticks.saturating_sub(self.state.tick)
    }

    pub fn tick(&self) -> u32 {
        self.state.tick
    }

    pub fn is_finished(&self) -> bool {
        self.state.phase == MatchPhase::Ended
    }

    pub fn alive_count(&self) -> usize {
        self.state.alive_count()
    }

    pub fn players(&self) -> &[SimPlayer] {
        &self.state.players
    }

    pub fn rune_count(&self) -> usize {
        self.state.runes.len()
    }

    pub fn inputs_rejected(&self) -> u64 {
        self.inputs_rejected
    }

    /// Largest form reached by anyone so far
    pub fn top_form(&self) -> Form {
        self.state
            .players
            .iter()
            .map(|p| p.form)
            .max()
            .unwrap_or_default()
    }
}
