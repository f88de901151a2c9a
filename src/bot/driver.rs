//! Per-bot tick driver
//!
//! One `BotDriver` owns one agent. Each call to `tick` runs the whole
//! pipeline once: perception, intent, path, steering, prediction, ability,
//! emission. Perception and emission go through the two adapter traits so
//! the same logic serves the live engine and the wire harness.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::BotConfig;
use crate::game::agent::{AgentState, SpawnStatus, TargetRef};
use crate::game::map::ArenaMap;
use crate::game::nav::{NavGraph, NavProvider};
use crate::game::snapshot::{Form, MatchEvent, PlayerId, WorldSnapshot};
use crate::game::systems::intent::{self, IntentContext};
use crate::game::systems::path::{FollowStatus, RouteKind};
use crate::game::systems::predictor::{self, MoveAxes, ReconcileOutcome};
use crate::game::systems::steering::{self, SafetyProbe};
use crate::net::protocol::{now_millis, InputRecord};
use crate::net::sink::SinkError;
use crate::util::vec2::Vec2;

/// Where a bot learns about the match
pub trait PerceptionSource {
    /// Append pending events to `events` and return a snapshot if a newer
    /// one arrived since the last call
    fn sync(&mut self, events: &mut Vec<MatchEvent>) -> Option<Arc<WorldSnapshot>>;
}

/// Where a bot's input goes
pub trait InputSink {
    fn send(&mut self, record: &InputRecord) -> Result<(), SinkError>;
}

/// Per-bot counters, folded into the swarm metrics by the harness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BotStats {
    pub ticks: u64,
    pub inputs_sent: u64,
    pub retargets: u64,
    pub path_fallbacks: u64,
    pub stuck_recoveries: u64,
    pub panics: u64,
    pub holds: u64,
    pub abilities_fired: u64,
    pub sink_errors: u64,
    pub snaps: u64,
}

impl BotStats {
    pub fn merge(&mut self, other: &BotStats) {
        self.ticks += other.ticks;
        self.inputs_sent += other.inputs_sent;
        self.retargets += other.retargets;
        self.path_fallbacks += other.path_fallbacks;
        self.stuck_recoveries += other.stuck_recoveries;
        self.panics += other.panics;
        self.holds += other.holds;
        self.abilities_fired += other.abilities_fired;
        self.sink_errors += other.sink_errors;
        self.snaps += other.snaps;
    }
}

pub struct BotDriver<P, S> {
    agent: AgentState,
    config: Arc<BotConfig>,
    map: Arc<ArenaMap>,
    graph: Option<Arc<NavGraph>>,
    /// Replaces the graph for routing when set
    provider: Option<Arc<dyn NavProvider>>,
    perception: P,
    sink: S,
    world: Arc<WorldSnapshot>,
    events: Vec<MatchEvent>,
    /// Server's view of our spawn status has been adopted
    spawn_known: bool,
    /// Seconds accumulated toward the next emission
    emit_accumulator: f32,
    ability_latched: bool,
    last_ability_at: Option<f32>,
    server_tick: u32,
    ticks_since_sync: u32,
    stats: BotStats,
    finished: bool,
}

impl<P: PerceptionSource, S: InputSink> BotDriver<P, S> {
    pub fn new(
        id: PlayerId,
        position: Vec2,
        config: Arc<BotConfig>,
        map: Arc<ArenaMap>,
        perception: P,
        sink: S,
    ) -> Self {
        let mut agent = AgentState::new(id, position, Form::default());
        agent.stuck.reset(position, 0.0);
        Self {
            agent,
            config,
            map,
            graph: None,
            provider: None,
            perception,
            sink,
            world: Arc::new(WorldSnapshot::default()),
            events: Vec::new(),
            spawn_known: false,
            emit_accumulator: 0.0,
            ability_latched: false,
            last_ability_at: None,
            server_tick: 0,
            ticks_since_sync: 0,
            stats: BotStats::default(),
            finished: false,
        }
    }

    pub fn with_graph(mut self, graph: Arc<NavGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    pub fn with_provider(mut self, provider: Arc<dyn NavProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn id(&self) -> PlayerId {
        self.agent.id
    }

    pub fn agent(&self) -> &AgentState {
        &self.agent
    }

    pub fn stats(&self) -> &BotStats {
        &self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn perception(&self) -> &P {
        &self.perception
    }

    pub fn is_alive(&self) -> bool {
        self.agent.alive
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Tear down and hand back the counters
    pub fn dispose(self) -> BotStats {
        debug!(bot = %self.agent.id, ticks = self.stats.ticks, "Bot disposed");
        self.stats
    }

    /// Advance the bot by `dt` seconds
    pub fn tick(&mut self, dt: f32) {
        self.sync();
        if self.finished || !self.agent.alive {
            return;
        }

        self.stats.ticks += 1;
        self.ticks_since_sync += 1;
        self.agent.clock += dt;

        self.update_intent();
        self.update_path();
        let heading = self.steer(dt);

        let axes = MoveAxes::from_heading(heading);
        predictor::step(&self.map, &mut self.agent.kinematics, axes.to_direction(), dt);

        self.agent.ability_cooldown = (self.agent.ability_cooldown - dt).max(0.0);
        self.update_ability();
        self.emit(axes, dt);
    }

    /// Pull events and the latest snapshot from perception
    fn sync(&mut self) {
        let mut events = std::mem::take(&mut self.events);
        let fresh = self.perception.sync(&mut events);
        for event in events.drain(..) {
            self.handle_event(event);
        }
        self.events = events;
        if let Some(world) = fresh {
            self.absorb_snapshot(&world);
            self.world = world;
        }
    }

    fn handle_event(&mut self, event: MatchEvent) {
        let id = self.agent.id;
        match event {
            MatchEvent::MatchStart(info) => {
                if let Some(placement) = info.players.iter().find(|p| p.player_id == id) {
                    self.agent.place_at(placement.position);
                    self.spawn_known = false;
                    self.server_tick = info.start_tick;
                    self.ticks_since_sync = 0;
                }
            }
            MatchEvent::PlayerEliminated { victim_id, killer_id } if victim_id == id => {
                info!(bot = %id, killer = ?killer_id, "Bot eliminated");
                self.agent.alive = false;
                self.agent.abandon_target();
            }
            MatchEvent::MatchEnded { winner_id } => {
                info!(bot = %id, won = winner_id == Some(id), "Match ended");
                self.finished = true;
            }
            MatchEvent::RuneCollected { rune_id, .. } => {
                if self.agent.target_ref == TargetRef::Collectible(rune_id) {
                    self.agent.abandon_target();
                }
            }
            _ => {}
        }
    }

    fn absorb_snapshot(&mut self, world: &WorldSnapshot) {
        self.server_tick = world.tick;
        self.ticks_since_sync = 0;
        let Some(me) = world.player(self.agent.id) else {
            return;
        };
        let kin = &mut self.agent.kinematics;
        kin.speed = me.speed();
        kin.radius = me.radius;
        self.agent.ability_cooldown = me.ability_cooldown;
        if !me.alive {
            self.agent.alive = false;
        }

        if !self.spawn_known {
            kin.spawn = SpawnStatus {
                zone_id: me.spawn_zone_id,
                active: me.spawn_zone_active,
            };
            kin.position = me.position;
            self.spawn_known = true;
            return;
        }
        // The server can only ever clear the flag
        if !me.spawn_zone_active {
            kin.spawn.leave();
        }
        let outcome = predictor::reconcile(
            kin,
            me.position,
            self.config.reconcile_snap_distance,
            self.config.reconcile_blend,
        );
        if outcome == ReconcileOutcome::Snapped {
            self.stats.snaps += 1;
        }
    }

    fn update_intent(&mut self) {
        let ctx = IntentContext {
            world: &self.world,
            map: &self.map,
            graph: self.graph.as_deref(),
            config: &self.config,
        };
        let Some(decision) = intent::evaluate(&mut self.agent, &ctx) else {
            return;
        };

        let epsilon = self.config.spawn_retarget_epsilon;
        let unchanged = decision.intent == self.agent.intent
            && decision.target_ref == self.agent.target_ref
            && self.agent.target().is_some_and(|t| t.distance_to(decision.target) <= epsilon);
        if unchanged {
            return;
        }

        let position = self.agent.position();
        let spacing = self.config.min_waypoint_spacing;
        let provider = match (&self.provider, &self.graph) {
            (Some(provider), _) => Some(provider.as_ref()),
            (None, Some(graph)) => Some(graph.as_ref() as &dyn NavProvider),
            (None, None) => None,
        };
        let spawn = self.agent.kinematics.spawn;
        let route = self
            .agent
            .path
            .set_target(position, decision.target, provider, spacing, spawn);
        if route == RouteKind::Fallback {
            self.stats.path_fallbacks += 1;
        }
        self.agent.intent = decision.intent;
        self.agent.target_ref = decision.target_ref;
        self.agent.stuck.reset(position, self.agent.clock);
        self.stats.retargets += 1;
    }

    fn update_path(&mut self) {
        let position = self.agent.position();
        let cfg = &self.config;
        if self.agent.path.advance(position, cfg.waypoint_reach, cfg.final_waypoint_reach)
            == FollowStatus::Arrived
        {
            debug!(bot = %self.agent.id, intent = ?self.agent.intent, "Target reached");
            self.agent.abandon_target();
            return;
        }
        if self.agent.target().is_none() {
            self.agent.stuck.reset(position, self.agent.clock);
            return;
        }
        if self.agent.stuck.check(
            position,
            self.agent.clock,
            cfg.stuck_min_progress,
            cfg.stuck_timeout,
        ) {
            debug!(bot = %self.agent.id, position = ?position, "Stuck, dropping target");
            self.agent.abandon_target();
            self.stats.stuck_recoveries += 1;
        }
    }

    /// Threat-aware heading for this tick; zero means hold
    fn steer(&mut self, dt: f32) -> Vec2 {
        let cfg = &self.config;
        let position = self.agent.position();
        let radius = self.agent.radius();
        let desired = self.agent.path.desired_direction(position);

        let threat = steering::assess_threats(self.agent.id, position, radius, &self.world, cfg);
        self.agent.threat_direction = threat.vector.normalize();
        if threat.panic {
            if !self.agent.panic {
                self.stats.panics += 1;
            }
            self.agent.last_threat_at = Some(self.agent.clock);
        }
        self.agent.panic = threat.panic;

        let blended = steering::blend(desired, &threat, cfg.avoidance_weight);
        if blended == Vec2::ZERO {
            self.agent.heading = Vec2::ZERO;
            return Vec2::ZERO;
        }

        let probe = SafetyProbe {
            map: &self.map,
            position,
            radius,
            speed: self.agent.kinematics.speed,
            dt,
            spawn: self.agent.kinematics.spawn,
        };
        match steering::find_safe_heading(&probe, blended, cfg.steer_step_deg, cfg.steer_max_checks) {
            Some(safe) => {
                self.agent.heading =
                    steering::smooth_heading(self.agent.heading, safe, cfg.heading_rate, dt);
            }
            None => {
                self.stats.holds += 1;
                self.agent.heading = Vec2::ZERO;
            }
        }
        self.agent.heading
    }

    fn update_ability(&mut self) {
        if self.ability_latched || !self.agent.panic || self.agent.ability_cooldown > 0.0 {
            return;
        }
        let ready = self
            .last_ability_at
            .map_or(true, |at| self.agent.clock - at >= self.config.ability_trigger_cooldown);
        if ready {
            self.ability_latched = true;
            self.last_ability_at = Some(self.agent.clock);
            self.stats.abilities_fired += 1;
            debug!(bot = %self.agent.id, "Ability triggered");
        }
    }

    fn emit(&mut self, axes: MoveAxes, dt: f32) {
        let interval = 1.0 / self.config.input_send_rate;
        self.emit_accumulator += dt;
        if self.emit_accumulator + 1e-6 < interval {
            return;
        }
        self.emit_accumulator = (self.emit_accumulator - interval).max(0.0);

        let tick = self.server_tick.wrapping_add(self.ticks_since_sync);
        let record = InputRecord::new(tick, axes, self.ability_latched, now_millis());
        match self.sink.send(&record) {
            Ok(()) => {
                self.ability_latched = false;
                self.stats.inputs_sent += 1;
            }
            Err(e) => {
                self.stats.sink_errors += 1;
                warn!(bot = %self.agent.id, error = %e, "Input dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::constants::timing::DT;
    use crate::game::snapshot::{Collectible, InitialPlacement, MatchStartInfo, ObservedPlayer};
    use crate::net::sink::VecSink;
    use std::collections::VecDeque;
    use uuid::Uuid;

    /// Hands out queued (events, snapshot) pairs, one per sync
    #[derive(Default)]
    struct Scripted {
        queue: VecDeque<(Vec<MatchEvent>, Option<WorldSnapshot>)>,
    }

    impl Scripted {
        fn once(world: WorldSnapshot) -> Self {
            let mut s = Self::default();
            s.queue.push_back((Vec::new(), Some(world)));
            s
        }

        fn push_event(&mut self, event: MatchEvent) {
            self.queue.push_back((vec![event], None));
        }
    }

    impl PerceptionSource for Scripted {
        fn sync(&mut self, events: &mut Vec<MatchEvent>) -> Option<Arc<WorldSnapshot>> {
            let (pending, world) = self.queue.pop_front()?;
            events.extend(pending);
            world.map(Arc::new)
        }
    }

    /// Fails the first `failures` sends
    struct Flaky {
        failures: u32,
        records: Vec<InputRecord>,
    }

    impl InputSink for Flaky {
        fn send(&mut self, record: &InputRecord) -> Result<(), SinkError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(SinkError::Full);
            }
            self.records.push(*record);
            Ok(())
        }
    }

    fn me() -> PlayerId {
        Uuid::from_u128(1)
    }

    fn world(players: Vec<ObservedPlayer>, collectibles: Vec<Collectible>) -> WorldSnapshot {
        WorldSnapshot {
            tick: 100,
            time_remaining: 5000,
            players,
            collectibles,
            objectives: Vec::new(),
        }
    }

    fn driver<P: PerceptionSource, S: InputSink>(perception: P, sink: S) -> BotDriver<P, S> {
        let map = Arc::new(ArenaMap::arcane_circuit());
        let graph = Arc::new(NavGraph::from_map(&map));
        BotDriver::new(me(), Vec2::ZERO, Arc::new(BotConfig::default()), map, perception, sink)
            .with_graph(graph)
    }

    fn threatened_world(self_cooldown: f32) -> WorldSnapshot {
        let mut bot = ObservedPlayer::new(me(), Vec2::ZERO, Form::Spark);
        bot.ability_cooldown = self_cooldown;
        let brute = ObservedPlayer::new(Uuid::from_u128(2), Vec2::new(3.0, 0.0), Form::Ancient);
        world(vec![bot, brute], Vec::new())
    }

    #[test]
    fn test_emission_throttle() {
        let mut bot = driver(Scripted::default(), VecSink::new());
        for _ in 0..60 {
            bot.tick(DT);
        }
        assert_eq!(bot.sink().records().len(), 20);
        assert_eq!(bot.stats().inputs_sent, 20);
    }

    #[test]
    fn test_walks_to_collectible() {
        let rune = Collectible {
            id: 7,
            position: Vec2::new(10.0, 0.0),
            live: true,
        };
        let snapshot = world(vec![ObservedPlayer::new(me(), Vec2::ZERO, Form::Spark)], vec![rune]);
        let mut bot = driver(Scripted::once(snapshot), VecSink::new());

        for _ in 0..120 {
            bot.tick(DT);
        }
        assert!(bot.agent().position().x > 7.0);
        assert!(bot.stats().retargets >= 1);
        let first = bot.sink().records()[0];
        assert!(first.move_x > 100);
        assert!(!first.ability_pressed());
    }

    fn closest_approach<P: PerceptionSource, S: InputSink>(
        bot: &mut BotDriver<P, S>,
        goal: Vec2,
        ticks: u32,
    ) -> f32 {
        let mut closest = f32::MAX;
        for _ in 0..ticks {
            bot.tick(DT);
            closest = closest.min(bot.agent().position().distance_to(goal));
        }
        closest
    }

    #[test]
    fn test_reaches_distant_collectible_across_hubs() {
        let goal = Vec2::new(70.0, 45.0);
        let rune = Collectible {
            id: 3,
            position: goal,
            live: true,
        };
        let snapshot = world(vec![ObservedPlayer::new(me(), Vec2::ZERO, Form::Spark)], vec![rune]);
        let mut bot = driver(Scripted::once(snapshot), VecSink::new());

        let closest = closest_approach(&mut bot, goal, 1800);
        assert!(closest < 2.5, "closest approach {closest}");
    }

    #[test]
    fn test_reaches_collectible_beside_foreign_sanctuary() {
        let goal = Vec2::new(-23.0, 140.0);
        let rune = Collectible {
            id: 4,
            position: goal,
            live: true,
        };
        let start = Vec2::new(0.0, 100.0);
        let snapshot = world(vec![ObservedPlayer::new(me(), start, Form::Spark)], vec![rune]);
        let mut bot = driver(Scripted::once(snapshot), VecSink::new());

        let closest = closest_approach(&mut bot, goal, 1800);
        assert!(closest < 2.5, "closest approach {closest}");
    }

    #[test]
    fn test_pinned_bot_gives_up_on_target() {
        let rune = Collectible {
            id: 9,
            position: Vec2::ZERO,
            live: true,
        };
        // Off the playable area every step is blocked
        let pinned = ObservedPlayer::new(me(), Vec2::new(0.0, 300.0), Form::Spark);
        let map = Arc::new(ArenaMap::arcane_circuit());
        let mut bot = BotDriver::new(
            me(),
            Vec2::ZERO,
            Arc::new(BotConfig::default()),
            map,
            Scripted::once(world(vec![pinned], vec![rune])),
            VecSink::new(),
        );

        for _ in 0..180 {
            bot.tick(DT);
        }
        assert!(bot.agent().position().distance_to(Vec2::new(0.0, 300.0)) < 0.01);
        assert!(bot.stats().stuck_recoveries >= 1);
    }

    #[test]
    fn test_input_ticks_follow_server_clock() {
        let snapshot = world(vec![ObservedPlayer::new(me(), Vec2::ZERO, Form::Spark)], Vec::new());
        let mut bot = driver(Scripted::once(snapshot), VecSink::new());
        for _ in 0..3 {
            bot.tick(DT);
        }
        assert_eq!(bot.sink().records()[0].tick, 103);
    }

    #[test]
    fn test_ability_latched_once_per_trigger_cooldown() {
        let mut bot = driver(Scripted::once(threatened_world(0.0)), VecSink::new());
        for _ in 0..59 {
            bot.tick(DT);
        }
        let fired = bot
            .sink()
            .records()
            .iter()
            .filter(|r| r.ability_pressed())
            .count();
        assert_eq!(fired, 1);
        assert!(bot.sink().records()[0].ability_pressed());
        assert_eq!(bot.stats().panics, 1);
        // Fled away from the larger opponent
        assert!(bot.agent().position().x < 0.0);
    }

    #[test]
    fn test_ability_waits_for_server_cooldown() {
        let mut bot = driver(Scripted::once(threatened_world(5.0)), VecSink::new());
        for _ in 0..60 {
            bot.tick(DT);
        }
        assert!(bot.sink().records().iter().all(|r| !r.ability_pressed()));
        assert_eq!(bot.stats().abilities_fired, 0);
    }

    #[test]
    fn test_ability_latch_survives_sink_error() {
        let sink = Flaky {
            failures: 1,
            records: Vec::new(),
        };
        let mut bot = driver(Scripted::once(threatened_world(0.0)), sink);
        for _ in 0..6 {
            bot.tick(DT);
        }
        assert_eq!(bot.stats().sink_errors, 1);
        assert_eq!(bot.sink().records.len(), 1);
        assert!(bot.sink().records[0].ability_pressed());
    }

    #[test]
    fn test_match_start_places_bot() {
        let mut feed = Scripted::default();
        feed.push_event(MatchEvent::MatchStart(MatchStartInfo {
            match_id: Uuid::nil(),
            rng_seed: 1,
            start_tick: 50,
            players: vec![InitialPlacement {
                player_id: me(),
                position: Vec2::new(0.0, 90.0),
                color_index: 0,
            }],
        }));
        let mut bot = driver(feed, VecSink::new());
        bot.tick(DT);
        assert!(bot.agent().position().distance_to(Vec2::new(0.0, 90.0)) < 1.0);
    }

    #[test]
    fn test_elimination_stops_input() {
        let mut feed = Scripted::default();
        feed.push_event(MatchEvent::PlayerEliminated {
            victim_id: me(),
            killer_id: None,
        });
        let mut bot = driver(feed, VecSink::new());
        for _ in 0..30 {
            bot.tick(DT);
        }
        assert!(!bot.is_alive());
        assert!(bot.sink().records().is_empty());
    }

    #[test]
    fn test_match_end_finishes() {
        let mut feed = Scripted::default();
        feed.push_event(MatchEvent::MatchEnded { winner_id: None });
        let mut bot = driver(feed, VecSink::new());
        bot.tick(DT);
        assert!(bot.is_finished());
        let stats = bot.dispose();
        assert_eq!(stats.ticks, 0);
    }

    #[test]
    fn test_spawn_flag_only_cleared_by_server() {
        let map = ArenaMap::arcane_circuit();
        let zone = *map.spawn_zone(0).unwrap();
        let mut inside = ObservedPlayer::new(me(), zone.center, Form::Spark);
        inside.spawn_zone_id = Some(0);
        inside.spawn_zone_active = true;

        let mut feed = Scripted::once(world(vec![inside.clone()], Vec::new()));
        let mut left = inside.clone();
        left.spawn_zone_active = false;
        feed.queue.push_back((Vec::new(), Some(world(vec![left], Vec::new()))));
        feed.queue.push_back((Vec::new(), Some(world(vec![inside], Vec::new()))));

        let mut bot = driver(feed, VecSink::new());
        bot.tick(DT);
        assert!(bot.agent().kinematics.spawn.is_protected());
        bot.tick(DT);
        assert!(!bot.agent().kinematics.spawn.active);
        bot.tick(DT);
        assert!(!bot.agent().kinematics.spawn.active);
    }

    #[test]
    fn test_stats_merge() {
        let mut a = BotStats {
            ticks: 2,
            holds: 1,
            ..Default::default()
        };
        a.merge(&BotStats {
            ticks: 3,
            snaps: 4,
            ..Default::default()
        });
        assert_eq!((a.ticks, a.holds, a.snaps), (5, 1, 4));
    }
}
