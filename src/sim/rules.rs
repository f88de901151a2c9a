//! Per-tick rules of the local simulator
//!
//! Each function is one system over `SimState`, run in a fixed order by
//! `LocalMatch::step`. Events go to the caller's buffer; changed runes and
//! shrines are reported so state broadcasts can carry deltas only.

use rand::Rng;

use crate::game::constants::{form, rune, shrine};
use crate::game::map::ArenaMap;
use crate::net::protocol::WireEvent;
use crate::sim::state::{SimPlayer, SimRune, SimState};
use crate::util::vec2::Vec2;

/// Rune placement attempts before giving up for this tick
const PLACEMENT_ATTEMPTS: usize = 64;
/// Half extents of the box runes are sampled from
const SAMPLE_HALF_WIDTH: f32 = 175.0;
const SAMPLE_HALF_HEIGHT: f32 = 145.0;

/// Shrine durations in ticks
#[derive(Debug, Clone, Copy)]
pub struct ShrineTiming {
    pub channel: u32,
    pub cooldown: u32,
    pub buff: u32,
}

/// Changes that need to reach clients
#[derive(Debug, Default)]
pub struct Dirty {
    /// (rune, collected)
    pub runes: Vec<(SimRune, bool)>,
    /// Shrine indices
    pub shrines: Vec<usize>,
}

/// Server movement contract: clamp, scale by buffed speed, accept only
/// inside the map. Leaving the spawn zone is one-way.
pub fn apply_movement(state: &mut SimState, map: &ArenaMap, dt: f32) {
    for player in state.players.iter_mut().filter(|p| p.alive) {
        let previous = player.position;
        let direction = player.input.clamp_length(1.0);
        if direction != Vec2::ZERO {
            let candidate = previous + direction * (player.speed(shrine::SPEED_TYPE) * dt);
            let zone = Some(player.spawn_zone_id);
            if map.is_inside_map(candidate, player.radius(), zone, player.spawn_active) {
                player.position = candidate;
                if player.spawn_active
                    && !map.is_inside_spawn_zone(candidate, player.radius(), player.spawn_zone_id)
                {
                    player.spawn_active = false;
                }
            }
        }
        player.velocity = (player.position - previous) * (1.0 / dt);
    }
}

pub fn collect_runes(state: &mut SimState, events: &mut Vec<WireEvent>, dirty: &mut Dirty) {
    let tick = state.tick;
    for player in state.players.iter_mut().filter(|p| p.alive) {
        let mut i = 0;
        while i < state.runes.len() {
            if !state.runes[i].touches(player.position, player.radius()) {
                i += 1;
                continue;
            }
            let taken = state.runes.swap_remove(i);
            player.score += rune::SCORE;
            player.runes_collected += 1;
            events.push(WireEvent::RuneCollected {
                tick,
                player_id: player.wire_id,
                rune_id: taken.id,
                rune_type: 0,
                points: rune::SCORE,
            });
            dirty.runes.push((taken, true));
            push_evolution(player, tick, events);
        }
    }
}

/// Larger form eliminates smaller on overlap; equal forms bounce off
pub fn resolve_eliminations(state: &mut SimState, events: &mut Vec<WireEvent>) {
    let tick = state.tick;
    let count = state.players.len();
    for i in 0..count {
        for j in (i + 1)..count {
            let (a, b) = (&state.players[i], &state.players[j]);
            if !a.alive || !b.alive || a.is_protected() || b.is_protected() || a.form == b.form {
                continue;
            }
            let reach = a.radius() + b.radius();
            if a.position.distance_sq_to(b.position) >= reach * reach {
                continue;
            }
            let (killer, victim) = if a.form > b.form { (i, j) } else { (j, i) };

            let victim_form = state.players[victim].form;
            let victim_id = state.players[victim].wire_id;
            {
                let loser = &mut state.players[victim];
                loser.alive = false;
                loser.velocity = Vec2::ZERO;
                loser.eliminated_at = Some(tick);
            }
            let winner = &mut state.players[killer];
            winner.score += form::SCORE_PER_KILL;
            winner.eliminations += 1;
            events.push(WireEvent::PlayerEliminated {
                tick,
                victim_id,
                killer_id: Some(winner.wire_id),
                victim_form: victim_form as u8,
            });
            push_evolution(winner, tick, events);
        }
    }
}

fn push_evolution(player: &mut SimPlayer, tick: u32, events: &mut Vec<WireEvent>) {
    if let Some((old, new)) = player.evolve() {
        events.push(WireEvent::PlayerEvolved {
            tick,
            player_id: player.wire_id,
            old_form: old as u8,
            new_form: new as u8,
        });
    }
}

/// Channeling, capture and reactivation
pub fn update_shrines(
    state: &mut SimState,
    timing: ShrineTiming,
    events: &mut Vec<WireEvent>,
    dirty: &mut Dirty,
) {
    let tick = state.tick;
    let reach_sq = shrine::RADIUS * shrine::RADIUS;
    for (index, s) in state.shrines.iter_mut().enumerate() {
        if !s.active {
            s.cooldown_ticks = s.cooldown_ticks.saturating_sub(1);
            if s.cooldown_ticks == 0 {
                s.active = true;
                s.controller = None;
                dirty.shrines.push(index);
                events.push(WireEvent::ShrinePowerActivated {
                    tick,
                    shrine_id: s.id,
                    shrine_type: s.shrine_type,
                });
            }
            continue;
        }

        let on_shrine = |p: &SimPlayer| p.alive && p.position.distance_sq_to(s.position) <= reach_sq;
        s.channel = match s.channel {
            Some((who, ticks)) if on_shrine(&state.players[who]) => Some((who, ticks + 1)),
            _ => state
                .players
                .iter()
                .position(|p| on_shrine(p))
                .map(|who| (who, 1)),
        };

        let Some((who, ticks)) = s.channel else {
            continue;
        };
        if ticks < timing.channel {
            continue;
        }
        let player = &mut state.players[who];
        s.active = false;
        s.cooldown_ticks = timing.cooldown;
        s.channel = None;
        s.controller = Some(player.wire_id);
        if let Some(slot) = player.shrine_buff_ticks.get_mut(s.shrine_type as usize) {
            *slot = timing.buff;
        }
        dirty.shrines.push(index);
        events.push(WireEvent::ShrineCaptured {
            tick,
            player_id: player.wire_id,
            shrine_id: s.id,
            shrine_type: s.shrine_type,
        });
    }
}

pub fn decay_timers(state: &mut SimState) {
    for player in state.players.iter_mut() {
        player.ability_cooldown_ticks = player.ability_cooldown_ticks.saturating_sub(1);
        player.speed_buff_ticks = player.speed_buff_ticks.saturating_sub(1);
        for t in player.shrine_buff_ticks.iter_mut() {
            *t = t.saturating_sub(1);
        }
    }
}

/// Random point in the arena proper (never inside a sanctuary)
pub fn random_rune_position<R: Rng + ?Sized>(map: &ArenaMap, rng: &mut R) -> Option<Vec2> {
    (0..PLACEMENT_ATTEMPTS).find_map(|_| {
        let candidate = Vec2::new(
            rng.gen_range(-SAMPLE_HALF_WIDTH..=SAMPLE_HALF_WIDTH),
            rng.gen_range(-SAMPLE_HALF_HEIGHT..=SAMPLE_HALF_HEIGHT),
        );
        map.is_inside_map(candidate, rune::RADIUS, None, false)
            .then_some(candidate)
    })
}

/// Top the rune field back up to `target`. Returns the runes placed.
pub fn refill_runes<R: Rng + ?Sized>(
    state: &mut SimState,
    map: &ArenaMap,
    rng: &mut R,
    target: usize,
    dirty: &mut Dirty,
) -> Vec<SimRune> {
    let mut spawned = Vec::new();
    while state.runes.len() < target {
        let Some(position) = random_rune_position(map, rng) else {
            break;
        };
        let rune = SimRune {
            id: state.alloc_rune_id(),
            position,
        };
        state.runes.push(rune);
        dirty.runes.push((rune, false));
        spawned.push(rune);
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::snapshot::Form;
    use crate::sim::state::SimShrine;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use uuid::Uuid;

    const DT: f32 = 1.0 / 60.0;

    fn free_player(n: u128, position: Vec2) -> SimPlayer {
        let mut p = SimPlayer::new(Uuid::from_u128(n), n as u8, 0, position);
        p.spawn_active = false;
        p
    }

    fn timing() -> ShrineTiming {
        ShrineTiming {
            channel: 300,
            cooldown: 3600,
            buff: 1800,
        }
    }

    #[test]
    fn test_movement_gated_by_map() {
        let map = ArenaMap::arcane_circuit();
        let mut state = SimState::new(vec![free_player(1, Vec2::ZERO)]);
        state.players[0].input = Vec2::RIGHT;
        apply_movement(&mut state, &map, DT);
        assert!(state.players[0].position.approx_eq(Vec2::new(0.1, 0.0), 1e-5));
        assert!(state.players[0].velocity.approx_eq(Vec2::new(6.0, 0.0), 1e-3));

        state.players[0].position = Vec2::new(34.45, 0.0);
        apply_movement(&mut state, &map, DT);
        assert_eq!(state.players[0].position, Vec2::new(34.45, 0.0));
        assert_eq!(state.players[0].velocity, Vec2::ZERO);
    }

    #[test]
    fn test_overlong_input_is_clamped() {
        let map = ArenaMap::arcane_circuit();
        let mut state = SimState::new(vec![free_player(1, Vec2::ZERO)]);
        state.players[0].input = Vec2::new(1.0, 1.0);
        apply_movement(&mut state, &map, DT);
        assert!((state.players[0].position.length() - 0.1).abs() < 1e-4);
    }

    #[test]
    fn test_collect_and_evolve() {
        let mut state = SimState::new(vec![free_player(1, Vec2::ZERO)]);
        state.players[0].score = 95;
        state.runes.push(SimRune {
            id: 9,
            position: Vec2::new(0.2, 0.0),
        });
        let mut events = Vec::new();
        let mut dirty = Dirty::default();
        collect_runes(&mut state, &mut events, &mut dirty);

        assert!(state.runes.is_empty());
        assert_eq!(state.players[0].score, 105);
        assert_eq!(state.players[0].form, Form::Glyph);
        assert_eq!(dirty.runes.len(), 1);
        assert!(dirty.runes[0].1);
        assert!(matches!(events[0], WireEvent::RuneCollected { rune_id: 9, .. }));
        assert!(matches!(events[1], WireEvent::PlayerEvolved { new_form: 1, .. }));
    }

    #[test]
    fn test_larger_eliminates_smaller() {
        let mut big = free_player(1, Vec2::ZERO);
        big.form = Form::Ward;
        let small = free_player(2, Vec2::new(1.0, 0.0));
        let mut state = SimState::new(vec![small, big]);
        let mut events = Vec::new();
        resolve_eliminations(&mut state, &mut events);

        assert!(!state.players[0].alive);
        assert!(state.players[1].alive);
        assert_eq!(state.players[1].score, form::SCORE_PER_KILL);
        assert_eq!(state.players[1].form, Form::Ward);
        assert!(matches!(events[0], WireEvent::PlayerEliminated { victim_form: 0, .. }));
    }

    #[test]
    fn test_protected_and_equal_forms_survive() {
        // A larger player next to a sheltered one
        let mut a = free_player(1, Vec2::new(50.0, 0.0));
        a.form = Form::Ward;
        let mut b = free_player(2, Vec2::new(50.5, 0.0));
        b.spawn_active = true;
        // Two of the same form touching
        let c = free_player(3, Vec2::new(-0.5, 0.0));
        let d = free_player(4, Vec2::new(-0.6, 0.0));
        let mut state = SimState::new(vec![a, b, c, d]);
        let mut events = Vec::new();
        resolve_eliminations(&mut state, &mut events);
        assert!(events.is_empty());
        assert_eq!(state.alive_count(), 4);
    }

    #[test]
    fn test_shrine_capture_after_uninterrupted_channel() {
        let position = Vec2::new(70.0, -45.0);
        let mut state = SimState::new(vec![free_player(1, position)]);
        state.shrines.push(SimShrine::new(1, shrine::SPEED_TYPE, position));
        let mut events = Vec::new();
        let mut dirty = Dirty::default();

        for _ in 0..299 {
            update_shrines(&mut state, timing(), &mut events, &mut dirty);
        }
        assert!(state.shrines[0].active);
        update_shrines(&mut state, timing(), &mut events, &mut dirty);
        assert!(!state.shrines[0].active);
        assert_eq!(state.players[0].shrine_buff_ticks[shrine::SPEED_TYPE as usize], 1800);
        assert!(matches!(events.last(), Some(WireEvent::ShrineCaptured { shrine_id: 1, .. })));
        assert_eq!(dirty.shrines, vec![0]);
    }

    #[test]
    fn test_stepping_off_resets_channel() {
        let position = Vec2::new(70.0, -45.0);
        let mut state = SimState::new(vec![free_player(1, position)]);
        state.shrines.push(SimShrine::new(1, 0, position));
        let mut events = Vec::new();
        let mut dirty = Dirty::default();

        for _ in 0..200 {
            update_shrines(&mut state, timing(), &mut events, &mut dirty);
        }
        state.players[0].position = position + Vec2::new(5.0, 0.0);
        update_shrines(&mut state, timing(), &mut events, &mut dirty);
        assert_eq!(state.shrines[0].channel, None);
        state.players[0].position = position;
        for _ in 0..200 {
            update_shrines(&mut state, timing(), &mut events, &mut dirty);
        }
        assert!(state.shrines[0].active);
    }

    #[test]
    fn test_shrine_reactivates_after_cooldown() {
        let mut state = SimState::new(Vec::new());
        let mut s = SimShrine::new(2, 1, Vec2::ZERO);
        s.active = false;
        s.cooldown_ticks = 2;
        state.shrines.push(s);
        let mut events = Vec::new();
        let mut dirty = Dirty::default();
        update_shrines(&mut state, timing(), &mut events, &mut dirty);
        assert!(!state.shrines[0].active);
        update_shrines(&mut state, timing(), &mut events, &mut dirty);
        assert!(state.shrines[0].active);
        assert_eq!(dirty.shrines, vec![0]);
    }

    #[test]
    fn test_refill_places_runes_in_arena() {
        let map = ArenaMap::arcane_circuit();
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = SimState::new(Vec::new());
        let mut dirty = Dirty::default();
        let spawned = refill_runes(&mut state, &map, &mut rng, 40, &mut dirty);
        assert_eq!(spawned.len(), 40);
        assert_eq!(state.runes.len(), 40);
        for r in &state.runes {
            assert!(map.is_inside_map(r.position, rune::RADIUS, None, false));
        }
        assert!(refill_runes(&mut state, &map, &mut rng, 40, &mut dirty).is_empty());
    }

    #[test]
    fn test_timers_decay() {
        let mut state = SimState::new(vec![free_player(1, Vec2::ZERO)]);
        state.players[0].ability_cooldown_ticks = 1;
        state.players[0].speed_buff_ticks = 2;
        decay_timers(&mut state);
        decay_timers(&mut state);
        assert_eq!(state.players[0].ability_cooldown_ticks, 0);
        assert_eq!(state.players[0].speed_buff_ticks, 0);
    }
}
