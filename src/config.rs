use std::str::FromStr;

use crate::game::constants::{bot, harness, timing};
use crate::game::systems::intent::TargetMode;

/// Invalid tunable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be {rule}")]
    OutOfRange {
        field: &'static str,
        rule: &'static str,
    },
    #[error("{0}")]
    Inconsistent(&'static str),
}

/// Override `slot` from env var `name` when it parses and passes `accept`.
/// Anything else is logged and ignored.
fn env_override<T: FromStr>(name: &str, slot: &mut T, accept: impl Fn(&T) -> bool, rule: &str) {
    let Ok(raw) = std::env::var(name) else {
        return;
    };
    match raw.parse::<T>() {
        Ok(parsed) if accept(&parsed) => *slot = parsed,
        Ok(_) => tracing::warn!("{} must be {}, using default", name, rule),
        Err(_) => tracing::warn!("Invalid {} '{}', using default", name, raw),
    }
}

fn positive(v: &f32) -> bool {
    *v > 0.0 && v.is_finite()
}

fn non_negative(v: &f32) -> bool {
    *v >= 0.0 && v.is_finite()
}

fn unit_interval(v: &f32) -> bool {
    (0.0..=1.0).contains(v)
}

/// Bot decision and steering tunables
#[derive(Debug, Clone, PartialEq)]
pub struct BotConfig {
    pub target_mode: TargetMode,
    /// Seconds between strategic re-targeting passes
    pub refresh_interval: f32,
    pub chase_radius: f32,
    pub lead_time: f32,
    pub weaker_ratio: f32,
    pub denial_radius: f32,
    pub bait_radius: f32,
    pub orbit_radius: f32,
    /// Radians per second
    pub orbit_speed: f32,
    pub awareness_radius: f32,
    pub danger_radius: f32,
    pub avoidance_weight: f32,
    pub threat_size_tolerance: f32,
    /// Degrees per safety-search increment
    pub steer_step_deg: f32,
    pub steer_max_checks: u32,
    pub heading_rate: f32,
    pub waypoint_reach: f32,
    pub final_waypoint_reach: f32,
    pub min_waypoint_spacing: f32,
    pub stuck_timeout: f32,
    pub stuck_min_progress: f32,
    pub ability_trigger_cooldown: f32,
    pub spawn_retarget_epsilon: f32,
    pub wander_offset: f32,
    pub reconcile_snap_distance: f32,
    pub reconcile_blend: f32,
    /// Input records per second
    pub input_send_rate: f32,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            target_mode: TargetMode::CollectThenObjective,
            refresh_interval: bot::REFRESH_INTERVAL,
            chase_radius: bot::CHASE_RADIUS,
            lead_time: bot::LEAD_TIME,
            weaker_ratio: bot::WEAKER_RATIO,
            denial_radius: bot::DENIAL_RADIUS,
            bait_radius: bot::BAIT_RADIUS,
            orbit_radius: bot::ORBIT_RADIUS,
            orbit_speed: bot::ORBIT_SPEED,
            awareness_radius: bot::AWARENESS_RADIUS,
            danger_radius: bot::DANGER_RADIUS,
            avoidance_weight: bot::AVOIDANCE_WEIGHT,
            threat_size_tolerance: bot::THREAT_SIZE_TOLERANCE,
            steer_step_deg: bot::STEER_STEP_DEG,
            steer_max_checks: bot::STEER_MAX_CHECKS,
            heading_rate: bot::HEADING_RATE,
            waypoint_reach: bot::WAYPOINT_REACH,
            final_waypoint_reach: bot::FINAL_WAYPOINT_REACH,
            min_waypoint_spacing: bot::MIN_WAYPOINT_SPACING,
            stuck_timeout: bot::STUCK_TIMEOUT,
            stuck_min_progress: bot::STUCK_MIN_PROGRESS,
            ability_trigger_cooldown: bot::ABILITY_TRIGGER_COOLDOWN,
            spawn_retarget_epsilon: bot::SPAWN_RETARGET_EPSILON,
            wander_offset: bot::WANDER_OFFSET,
            reconcile_snap_distance: bot::RECONCILE_SNAP_DISTANCE,
            reconcile_blend: bot::RECONCILE_BLEND,
            input_send_rate: timing::INPUT_SEND_RATE,
        }
    }
}

impl BotConfig {
    /// Load config from `BOT_*` environment variables or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("BOT_TARGET_MODE", &mut config.target_mode, |_| true, "a target mode");
        env_override("BOT_REFRESH_INTERVAL", &mut config.refresh_interval, positive, "> 0");
        env_override("BOT_CHASE_RADIUS", &mut config.chase_radius, non_negative, ">= 0");
        env_override("BOT_LEAD_TIME", &mut config.lead_time, non_negative, ">= 0");
        env_override("BOT_WEAKER_RATIO", &mut config.weaker_ratio, unit_interval, "0-1");
        env_override("BOT_DENIAL_RADIUS", &mut config.denial_radius, non_negative, ">= 0");
        env_override("BOT_BAIT_RADIUS", &mut config.bait_radius, non_negative, ">= 0");
        env_override("BOT_AWARENESS_RADIUS", &mut config.awareness_radius, positive, "> 0");
        env_override("BOT_DANGER_RADIUS", &mut config.danger_radius, non_negative, ">= 0");
        env_override("BOT_AVOIDANCE_WEIGHT", &mut config.avoidance_weight, non_negative, ">= 0");
        env_override(
            "BOT_STEER_MAX_CHECKS",
            &mut config.steer_max_checks,
            |v| (1..=32).contains(v),
            "1-32",
        );
        env_override("BOT_HEADING_RATE", &mut config.heading_rate, positive, "> 0");
        env_override("BOT_STUCK_TIMEOUT", &mut config.stuck_timeout, positive, "> 0");
        env_override(
            "BOT_ABILITY_COOLDOWN",
            &mut config.ability_trigger_cooldown,
            non_negative,
            ">= 0",
        );
        env_override(
            "BOT_INPUT_RATE",
            &mut config.input_send_rate,
            |v| *v > 0.0 && *v <= timing::TICK_RATE as f32,
            "1-60",
        );

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !positive(&self.refresh_interval) {
            return Err(ConfigError::OutOfRange {
                field: "refresh_interval",
                rule: "> 0",
            });
        }
        if !unit_interval(&self.weaker_ratio) {
            return Err(ConfigError::OutOfRange {
                field: "weaker_ratio",
                rule: "within 0-1",
            });
        }
        if !positive(&self.awareness_radius) {
            return Err(ConfigError::OutOfRange {
                field: "awareness_radius",
                rule: "> 0",
            });
        }
        if self.danger_radius > self.awareness_radius {
            return Err(ConfigError::Inconsistent(
                "danger_radius cannot exceed awareness_radius",
            ));
        }
        if self.bait_radius > self.denial_radius {
            return Err(ConfigError::Inconsistent(
                "bait_radius cannot exceed denial_radius",
            ));
        }
        if self.steer_max_checks == 0 || !positive(&self.steer_step_deg) {
            return Err(ConfigError::OutOfRange {
                field: "steer_max_checks/steer_step_deg",
                rule: "> 0",
            });
        }
        if self.final_waypoint_reach < self.waypoint_reach {
            return Err(ConfigError::Inconsistent(
                "final_waypoint_reach cannot be below waypoint_reach",
            ));
        }
        if !unit_interval(&self.reconcile_blend) {
            return Err(ConfigError::OutOfRange {
                field: "reconcile_blend",
                rule: "within 0-1",
            });
        }
        if !positive(&self.input_send_rate) {
            return Err(ConfigError::OutOfRange {
                field: "input_send_rate",
                rule: "> 0",
            });
        }
        Ok(())
    }
}

/// How harness bots perceive the simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdapterMode {
    /// Server JSON through per-bot queues
    #[default]
    Wire,
    /// Snapshots published into a shared cell
    Live,
}

impl FromStr for AdapterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wire" => Ok(Self::Wire),
            "live" | "shared" => Ok(Self::Live),
            other => Err(format!("unknown adapter '{other}'")),
        }
    }
}

/// Load-test harness configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub adapter: AdapterMode,
    pub bot_count: usize,
    /// Simulation ticks per second
    pub tick_rate: u32,
    /// State broadcasts per second
    pub snapshot_rate: u32,
    pub match_seconds: f32,
    /// Fixed seed for the simulator; random when unset
    pub seed: Option<u64>,
    pub rune_count: usize,
    pub report_interval_secs: u64,
    pub queue_capacity: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            adapter: AdapterMode::default(),
            bot_count: harness::BOT_COUNT,
            tick_rate: timing::TICK_RATE,
            snapshot_rate: timing::SNAPSHOT_RATE,
            match_seconds: harness::MATCH_SECONDS,
            seed: None,
            rune_count: harness::RUNE_COUNT,
            report_interval_secs: harness::REPORT_INTERVAL_SECS,
            queue_capacity: harness::QUEUE_CAPACITY,
        }
    }
}

impl HarnessConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        env_override("HARNESS_ADAPTER", &mut config.adapter, |_| true, "wire or live");
        env_override("BOT_COUNT", &mut config.bot_count, |v| (1..=16).contains(v), "1-16");
        env_override(
            "HARNESS_TICK_RATE",
            &mut config.tick_rate,
            |v| (1..=240).contains(v),
            "1-240",
        );
        env_override(
            "HARNESS_SNAPSHOT_RATE",
            &mut config.snapshot_rate,
            |v| (1..=60).contains(v),
            "1-60",
        );
        env_override("HARNESS_MATCH_SECONDS", &mut config.match_seconds, positive, "> 0");
        env_override("HARNESS_RUNE_COUNT", &mut config.rune_count, |v| *v <= 500, "0-500");
        env_override(
            "HARNESS_REPORT_INTERVAL",
            &mut config.report_interval_secs,
            |v| *v > 0,
            "> 0",
        );

        if let Ok(seed) = std::env::var("HARNESS_SEED") {
            if let Ok(parsed) = seed.parse::<u64>() {
                config.seed = Some(parsed);
            } else {
                tracing::warn!("Invalid HARNESS_SEED '{}', using random seed", seed);
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bot_count == 0 || self.bot_count > 16 {
            return Err(ConfigError::OutOfRange {
                field: "bot_count",
                rule: "1-16 (one per spawn zone)",
            });
        }
        if self.tick_rate == 0 {
            return Err(ConfigError::OutOfRange {
                field: "tick_rate",
                rule: "> 0",
            });
        }
        if self.snapshot_rate == 0 || self.snapshot_rate > self.tick_rate {
            return Err(ConfigError::Inconsistent(
                "snapshot_rate must be between 1 and tick_rate",
            ));
        }
        if !positive(&self.match_seconds) {
            return Err(ConfigError::OutOfRange {
                field: "match_seconds",
                rule: "> 0",
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                field: "queue_capacity",
                rule: "> 0",
            });
        }
        if self.report_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "report_interval_secs",
                rule: "> 0",
            });
        }
        Ok(())
    }

    /// Simulation step in seconds
    pub fn dt(&self) -> f32 {
        1.0 / self.tick_rate as f32
    }

    pub fn match_ticks(&self) -> u32 {
        (self.match_seconds * self.tick_rate as f32).round() as u32
    }

    /// Ticks between state broadcasts
    pub fn snapshot_interval(&self) -> u32 {
        (self.tick_rate / self.snapshot_rate.max(1)).max(1)
    }
}
