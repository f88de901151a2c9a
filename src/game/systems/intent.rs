//! Intent engine
//!
//! Chooses what a bot is trying to do and where it is going. Runs every
//! tick but only re-targets on the refresh timer, when the current target
//! is gone, or while the bot is still walking out of its spawn sanctuary.

use std::str::FromStr;

use rand::Rng;
use tracing::debug;

use crate::config::BotConfig;
use crate::game::agent::{AgentState, Intent, TargetRef};
use crate::game::map::ArenaMap;
use crate::game::nav::NavGraph;
use crate::game::snapshot::WorldSnapshot;
use crate::util::vec2::Vec2;

/// Fallback target selection once chase and objective rules pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    NearestCollectible,
    NearestObjective,
    CollectThenObjective,
    RandomNode,
}

impl FromStr for TargetMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nearest_collectible" | "collect" => Ok(Self::NearestCollectible),
            "nearest_objective" | "objective" => Ok(Self::NearestObjective),
            "collect_then_objective" => Ok(Self::CollectThenObjective),
            "random_node" | "wander" => Ok(Self::RandomNode),
            other => Err(format!("unknown target mode '{other}'")),
        }
    }
}

/// A new target chosen by the engine
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntentDecision {
    pub intent: Intent,
    pub target: Vec2,
    pub target_ref: TargetRef,
}

/// Shared read-only inputs for one evaluation
pub struct IntentContext<'a> {
    pub world: &'a WorldSnapshot,
    pub map: &'a ArenaMap,
    pub graph: Option<&'a NavGraph>,
    pub config: &'a BotConfig,
}

/// Run the transition rules. Returns a decision when the agent should
/// re-target; `None` keeps whatever it is doing.
pub fn evaluate(agent: &mut AgentState, ctx: &IntentContext) -> Option<IntentDecision> {
    let cfg = ctx.config;

    // Rule 1: walk out of the spawn sanctuary, nothing else
    let spawn = agent.kinematics.spawn;
    if let (true, Some(zone)) = (spawn.active, spawn.zone_id.and_then(|id| ctx.map.spawn_zone(id))) {
        let exit = zone.exit_point(agent.radius(), cfg.final_waypoint_reach);
        let on_track = agent.intent == Intent::Wander
            && agent
                .target()
                .is_some_and(|t| t.distance_to(exit) <= cfg.spawn_retarget_epsilon);
        if on_track {
            return None;
        }
        debug!(bot = %agent.id, zone = zone.id, "Leaving spawn sanctuary");
        return Some(IntentDecision {
            intent: Intent::Wander,
            target: exit,
            target_ref: TargetRef::Point,
        });
    }

    // Rule 2: hold the current plan while reacting to a threat
    if let Some(at) = agent.last_threat_at {
        if agent.clock - at < cfg.refresh_interval * 0.5 && agent.target().is_some() {
            return None;
        }
    }

    // Rule 3: refresh timer
    if agent.target().is_some() {
        if let Some(at) = agent.last_pick_at {
            if agent.clock - at < cfg.refresh_interval {
                return None;
            }
        }
    }

    // Rule 4: full re-evaluation
    agent.last_pick_at = Some(agent.clock);
    let decision = choose_chase(agent, ctx)
        .or_else(|| choose_objective(agent, ctx))
        .or_else(|| choose_by_mode(agent, ctx))
        .unwrap_or_else(|| choose_wander(agent, ctx));

    debug!(
        bot = %agent.id,
        intent = ?decision.intent,
        previous = ?agent.intent,
        target = ?decision.target,
        "Intent evaluated"
    );
    Some(decision)
}

fn choose_chase(agent: &AgentState, ctx: &IntentContext) -> Option<IntentDecision> {
    let cfg = ctx.config;
    let position = agent.position();
    // Own radius is current, the opponent's is whatever the last snapshot said
    let weaker_than = agent.radius() * cfg.weaker_ratio;
    let chase_sq = cfg.chase_radius * cfg.chase_radius;

    ctx.world
        .opponents(agent.id)
        .filter(|p| p.alive && !p.is_spawn_protected() && p.radius < weaker_than)
        .map(|p| {
            let predicted = p.predicted_position(cfg.lead_time);
            (p.id, predicted, predicted.distance_sq_to(position))
        })
        .filter(|&(_, _, d)| d <= chase_sq)
        .min_by(|a, b| a.2.total_cmp(&b.2))
        .map(|(id, predicted, _)| IntentDecision {
            intent: Intent::Chase,
            target: predicted,
            target_ref: TargetRef::Player(id),
        })
}

fn choose_objective(agent: &AgentState, ctx: &IntentContext) -> Option<IntentDecision> {
    let cfg = ctx.config;
    let position = agent.position();
    let (objective, dist_sq) = ctx
        .world
        .active_objectives()
        .map(|o| (o, o.position.distance_sq_to(position)))
        .filter(|&(_, d)| d <= cfg.denial_radius * cfg.denial_radius)
        .min_by(|a, b| a.1.total_cmp(&b.1))?;

    if dist_sq <= cfg.bait_radius * cfg.bait_radius && has_advantage(agent, ctx, objective.position) {
        let angle = agent.clock * cfg.orbit_speed + agent.phase_offset;
        return Some(IntentDecision {
            intent: Intent::Bait,
            target: objective.position + Vec2::from_angle(angle) * cfg.orbit_radius,
            target_ref: TargetRef::Objective(objective.id),
        });
    }

    Some(IntentDecision {
        intent: Intent::ObjectiveCapture,
        target: objective.position,
        target_ref: TargetRef::Objective(objective.id),
    })
}

/// No larger opponent near the objective, and at least one smaller one to lure
fn has_advantage(agent: &AgentState, ctx: &IntentContext, objective: Vec2) -> bool {
    let cfg = ctx.config;
    let zone = cfg.bait_radius * 1.5;
    let zone_sq = zone * zone;
    let own = agent.radius();

    let mut smaller_present = false;
    for p in ctx.world.opponents(agent.id).filter(|p| p.alive) {
        if p.position.distance_sq_to(objective) > zone_sq {
            continue;
        }
        if p.radius > own + cfg.threat_size_tolerance {
            return false;
        }
        if p.radius < own {
            smaller_present = true;
        }
    }
    smaller_present
}

fn nearest_collectible(agent: &AgentState, world: &WorldSnapshot) -> Option<IntentDecision> {
    let position = agent.position();
    world
        .live_collectibles()
        .min_by(|a, b| {
            a.position
                .distance_sq_to(position)
                .total_cmp(&b.position.distance_sq_to(position))
        })
        .map(|c| IntentDecision {
            intent: Intent::Collect,
            target: c.position,
            target_ref: TargetRef::Collectible(c.id),
        })
}

fn nearest_objective(agent: &AgentState, world: &WorldSnapshot) -> Option<IntentDecision> {
    let position = agent.position();
    world
        .active_objectives()
        .min_by(|a, b| {
            a.position
                .distance_sq_to(position)
                .total_cmp(&b.position.distance_sq_to(position))
        })
        .map(|o| IntentDecision {
            intent: Intent::ObjectiveCapture,
            target: o.position,
            target_ref: TargetRef::Objective(o.id),
        })
}

fn choose_by_mode(agent: &mut AgentState, ctx: &IntentContext) -> Option<IntentDecision> {
    match ctx.config.target_mode {
        TargetMode::NearestCollectible => nearest_collectible(agent, ctx.world),
        TargetMode::NearestObjective => nearest_objective(agent, ctx.world),
        TargetMode::CollectThenObjective => nearest_collectible(agent, ctx.world)
            .or_else(|| nearest_objective(agent, ctx.world)),
        TargetMode::RandomNode => Some(choose_wander(agent, ctx)),
    }
}

/// Random graph node, or a random nearby point when there is no graph
fn choose_wander(agent: &mut AgentState, ctx: &IntentContext) -> IntentDecision {
    let node = ctx
        .graph
        .filter(|graph| !graph.is_empty())
        .and_then(|graph| graph.random_node(&mut agent.rng));
    let target = match node {
        Some(point) => point,
        None => {
            let offset = ctx.config.wander_offset;
            let dx = agent.rng.gen_range(-offset..=offset);
            let dy = agent.rng.gen_range(-offset..=offset);
            agent.position() + Vec2::new(dx, dy)
        }
    };
    IntentDecision {
        intent: Intent::Wander,
        target,
        target_ref: TargetRef::Point,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::agent::SpawnStatus;
    use crate::game::snapshot::{Collectible, Form, Objective, ObservedPlayer};
    use uuid::Uuid;

    struct Fixture {
        map: ArenaMap,
        graph: NavGraph,
        config: BotConfig,
    }

    impl Fixture {
        fn new() -> Self {
            let map = ArenaMap::arcane_circuit();
            let graph = NavGraph::from_map(&map);
            Self {
                map,
                graph,
                config: BotConfig::default(),
            }
        }

        fn ctx<'a>(&'a self, world: &'a WorldSnapshot) -> IntentContext<'a> {
            IntentContext {
                world,
                map: &self.map,
                graph: Some(&self.graph),
                config: &self.config,
            }
        }
    }

    fn agent_at(position: Vec2, form: Form) -> AgentState {
        AgentState::new(Uuid::new_v4(), position, form)
    }

    fn apply(agent: &mut AgentState, decision: IntentDecision) {
        agent.intent = decision.intent;
        agent.target_ref = decision.target_ref;
        let position = agent.position();
        agent
            .path
            .set_target(position, decision.target, None, 1.0, SpawnStatus::default());
    }

    #[test]
    fn test_fresh_agent_picks_immediately() {
        let fx = Fixture::new();
        let world = WorldSnapshot::default();
        let mut agent = agent_at(Vec2::ZERO, Form::Spark);
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Wander);
        assert!(fx.graph.node_at(decision.target).is_some());
    }

    #[test]
    fn test_chase_nearest_weaker_predicted() {
        let fx = Fixture::new();
        let mut agent = agent_at(Vec2::ZERO, Form::Ancient);
        let mut near = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(10.0, 0.0), Form::Spark);
        near.velocity = Vec2::new(2.0, 0.0);
        let far = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(0.0, 25.0), Form::Spark);
        let world = WorldSnapshot {
            players: vec![near.clone(), far],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Chase);
        assert_eq!(decision.target_ref, TargetRef::Player(near.id));
        assert!(decision.target.approx_eq(Vec2::new(10.7, 0.0), 1e-4));
    }

    #[test]
    fn test_chase_skips_protected_and_equal() {
        let fx = Fixture::new();
        let mut agent = agent_at(Vec2::ZERO, Form::Ward);
        let mut protected = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(5.0, 0.0), Form::Spark);
        protected.spawn_zone_id = Some(0);
        protected.spawn_zone_active = true;
        let equal = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(6.0, 0.0), Form::Ward);
        let world = WorldSnapshot {
            players: vec![protected, equal],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_ne!(decision.intent, Intent::Chase);
    }

    #[test]
    fn test_chase_abandoned_when_prey_grows_or_dies() {
        let fx = Fixture::new();
        let mut agent = agent_at(Vec2::ZERO, Form::Arcane);
        let prey_id = Uuid::new_v4();
        let prey = ObservedPlayer::new(prey_id, Vec2::new(8.0, 0.0), Form::Spark);
        let world = WorldSnapshot {
            players: vec![prey.clone()],
            objectives: vec![Objective {
                id: 3,
                shrine_type: 0,
                position: Vec2::new(20.0, 0.0),
                active: true,
            }],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Chase);
        apply(&mut agent, decision);

        // Next refresh: the prey evolved past us
        agent.clock += fx.config.refresh_interval;
        let mut grown = prey.clone();
        grown.form = Form::Ancient;
        grown.radius = Form::Ancient.radius();
        let world = WorldSnapshot {
            players: vec![grown],
            objectives: world.objectives.clone(),
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::ObjectiveCapture);
        assert_eq!(decision.target_ref, TargetRef::Objective(3));
        apply(&mut agent, decision);

        // And on the one after, it died and the shrine went dark
        agent.clock += fx.config.refresh_interval;
        let mut dead = prey;
        dead.alive = false;
        let world = WorldSnapshot {
            players: vec![dead],
            collectibles: vec![Collectible {
                id: 11,
                position: Vec2::new(-5.0, 0.0),
                live: true,
            }],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Collect);
        assert_eq!(decision.target_ref, TargetRef::Collectible(11));
    }

    #[test]
    fn test_refresh_timer_keeps_target() {
        let fx = Fixture::new();
        let world = WorldSnapshot::default();
        let mut agent = agent_at(Vec2::ZERO, Form::Spark);
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        apply(&mut agent, decision);

        agent.clock += fx.config.refresh_interval * 0.5;
        assert!(evaluate(&mut agent, &fx.ctx(&world)).is_none());
        agent.clock += fx.config.refresh_interval * 0.5;
        assert!(evaluate(&mut agent, &fx.ctx(&world)).is_some());
    }

    #[test]
    fn test_recent_threat_suppresses_retarget() {
        let fx = Fixture::new();
        let world = WorldSnapshot::default();
        let mut agent = agent_at(Vec2::ZERO, Form::Spark);
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        apply(&mut agent, decision);

        agent.clock += fx.config.refresh_interval * 2.0;
        agent.last_threat_at = Some(agent.clock - 0.1);
        assert!(evaluate(&mut agent, &fx.ctx(&world)).is_none());
    }

    #[test]
    fn test_arrival_allows_immediate_pick() {
        let fx = Fixture::new();
        let world = WorldSnapshot::default();
        let mut agent = agent_at(Vec2::ZERO, Form::Spark);
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        apply(&mut agent, decision);
        agent.path.clear();
        agent.clock += 0.01;
        assert!(evaluate(&mut agent, &fx.ctx(&world)).is_some());
    }

    #[test]
    fn test_spawn_protected_targets_exit() {
        let fx = Fixture::new();
        let zone = *fx.map.spawn_zone(5).unwrap();
        let mut agent = agent_at(zone.center, Form::Spark);
        agent.kinematics.spawn = SpawnStatus::in_zone(5);
        let prey = ObservedPlayer::new(Uuid::new_v4(), zone.center + Vec2::new(1.0, 0.0), Form::Spark);
        let world = WorldSnapshot {
            players: vec![prey],
            ..Default::default()
        };

        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Wander);
        assert!(decision.target.distance_to(zone.anchor) < 7.0);
        apply(&mut agent, decision);

        // Same exit: keep it, even past the refresh interval
        agent.clock += 10.0;
        assert!(evaluate(&mut agent, &fx.ctx(&world)).is_none());
    }

    #[test]
    fn test_bait_when_holding_advantage() {
        let fx = Fixture::new();
        let mut agent = agent_at(Vec2::new(70.0, 40.0), Form::Ward);
        let shrine = Objective {
            id: 1,
            shrine_type: 2,
            position: Vec2::new(70.0, 45.0),
            active: true,
        };
        // Smaller opponent near the shrine but too far to chase profitably
        let mut small = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(75.0, 50.0), Form::Spark);
        small.spawn_zone_id = Some(0);
        small.spawn_zone_active = true;
        let world = WorldSnapshot {
            players: vec![small],
            objectives: vec![shrine],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::Bait);
        assert!((decision.target.distance_to(shrine.position) - fx.config.orbit_radius).abs() < 1e-3);
    }

    #[test]
    fn test_capture_when_larger_opponent_near_objective() {
        let fx = Fixture::new();
        let mut agent = agent_at(Vec2::new(70.0, 40.0), Form::Ward);
        let shrine = Objective {
            id: 1,
            shrine_type: 2,
            position: Vec2::new(70.0, 45.0),
            active: true,
        };
        let big = ObservedPlayer::new(Uuid::new_v4(), Vec2::new(60.0, 45.0), Form::Ancient);
        let world = WorldSnapshot {
            players: vec![big],
            objectives: vec![shrine],
            ..Default::default()
        };
        let decision = evaluate(&mut agent, &fx.ctx(&world)).unwrap();
        assert_eq!(decision.intent, Intent::ObjectiveCapture);
        assert_eq!(decision.target, shrine.position);
    }

    #[test]
    fn test_wander_without_graph_stays_local() {
        let fx = Fixture::new();
        let world = WorldSnapshot::default();
        let ctx = IntentContext {
            world: &world,
            map: &fx.map,
            graph: None,
            config: &fx.config,
        };
        let mut agent = agent_at(Vec2::new(3.0, 3.0), Form::Spark);
        let decision = evaluate(&mut agent, &ctx).unwrap();
        assert_eq!(decision.intent, Intent::Wander);
        let offset = decision.target - agent.position();
        assert!(offset.x.abs() <= fx.config.wander_offset);
        assert!(offset.y.abs() <= fx.config.wander_offset);
    }

    #[test]
    fn test_target_mode_parsing() {
        assert_eq!("random_node".parse::<TargetMode>(), Ok(TargetMode::RandomNode));
        assert_eq!(
            "Nearest_Objective".parse::<TargetMode>(),
            Ok(TargetMode::NearestObjective)
        );
        assert!("teleport".parse::<TargetMode>().is_err());
    }
}
