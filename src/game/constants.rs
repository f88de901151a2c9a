/// Simulation and wire timing
pub mod timing {
    /// Bot/predictor tick rate in Hz (matches the server simulation)
    pub const TICK_RATE: u32 = 60;
    /// Delta time per tick in seconds
    pub const DT: f32 = 1.0 / 60.0;
    /// Tick duration in milliseconds (rounded down)
    pub const TICK_DURATION_MS: u64 = 1000 / TICK_RATE as u64;
    /// Authoritative snapshot rate sent by the (local) server
    pub const SNAPSHOT_RATE: u32 = 20;
    /// Default directional input send rate
    pub const INPUT_SEND_RATE: f32 = 20.0;
}

/// Arcane Circuit geometry
pub mod map {
    /// Radius of the five large hubs
    pub const LARGE_HUB_RADIUS: f32 = 35.0;
    /// Radius of the four small junction hubs
    pub const SMALL_HUB_RADIUS: f32 = 18.0;
    /// Uniform corridor half-width (full width 7.0)
    pub const CORRIDOR_HALF_WIDTH: f32 = 3.5;
    /// Distance from a spawn anchor to its zone center, along the anchor direction
    pub const SPAWN_OFFSET: f32 = 20.0;
    /// Protective circle radius around a spawn zone center
    pub const SPAWN_RADIUS: f32 = 5.0;
}

/// Evolution forms (size tiers 1-5)
pub mod form {
    /// Movement speed per form, units/second
    pub const SPEEDS: [f32; 5] = [6.0, 5.5, 5.0, 4.5, 4.0];
    /// Collision radius per form
    pub const RADII: [f32; 5] = [0.5, 0.7, 1.0, 1.4, 2.0];
    /// Ability cooldown per form, seconds
    pub const ABILITY_COOLDOWNS: [f32; 5] = [3.0, 5.0, 6.0, 7.0, 8.0];
    /// Score needed to evolve out of forms 1-4
    pub const SCORE_TO_EVOLVE: [u32; 4] = [100, 300, 600, 1000];
    /// Temporary speed buff multiplier
    pub const SPEED_BUFF_MULT: f32 = 1.4;
    /// Speed shrine buff multiplier
    pub const SHRINE_SPEED_MULT: f32 = 1.2;
    /// Points per elimination
    pub const SCORE_PER_KILL: u32 = 100;
}

/// Collectible runes
pub mod rune {
    /// Pickup radius
    pub const RADIUS: f32 = 0.3;
    /// Points per rune
    pub const SCORE: u32 = 10;
}

/// Objective shrines
pub mod shrine {
    /// Channel radius around the shrine center
    pub const RADIUS: f32 = 3.0;
    /// Uninterrupted channel time to capture
    pub const CHANNEL_SECS: f32 = 5.0;
    /// Inactive time after a capture
    pub const COOLDOWN_SECS: f32 = 60.0;
    /// Buff duration granted on capture
    pub const BUFF_SECS: f32 = 30.0;
    /// Shrine type id of the speed shrine
    pub const SPEED_TYPE: u8 = 2;
    /// Shrine centers (the four junction hubs) and types:
    /// Wisdom 0, Power 1, Speed 2, Shield 3
    pub const LAYOUT: [(f32, f32, u8); 4] = [
        (70.0, 45.0, 0),
        (-70.0, 45.0, 1),
        (-70.0, -45.0, 2),
        (70.0, -45.0, 3),
    ];
}

/// Input wire encoding
pub mod input {
    /// Full deflection on one axis
    pub const AXIS_MAX: i8 = 127;
    /// Reserved "joystick released" value, distinct from zero
    pub const NO_INPUT: i8 = -128;
    /// Jump flag bit
    pub const FLAG_JUMP: u8 = 0x01;
    /// Ability flag bit
    pub const FLAG_ABILITY: u8 = 0x02;
}

/// Bot tuning defaults (overridable through `BotConfig`)
pub mod bot {
    /// Seconds between strategic re-targeting passes
    pub const REFRESH_INTERVAL: f32 = 0.75;
    /// Opponents whose predicted position is within this range can be chased
    pub const CHASE_RADIUS: f32 = 40.0;
    /// Seconds of velocity extrapolation applied to opponents
    pub const LEAD_TIME: f32 = 0.35;
    /// Opponent counts as weaker below own radius times this ratio
    pub const WEAKER_RATIO: f32 = 0.9;
    /// Objectives within this range are worth contesting
    pub const DENIAL_RADIUS: f32 = 30.0;
    /// Within this range of an objective the bot may bait instead
    pub const BAIT_RADIUS: f32 = 12.0;
    /// Radius of the bait orbit around an objective
    pub const ORBIT_RADIUS: f32 = 4.0;
    /// Angular speed of the bait orbit, radians/second
    pub const ORBIT_SPEED: f32 = 1.2;
    /// Range at which larger opponents start repelling
    pub const AWARENESS_RADIUS: f32 = 18.0;
    /// Range at which a larger opponent triggers panic
    pub const DANGER_RADIUS: f32 = 6.0;
    /// Weight of the avoidance direction when blending
    pub const AVOIDANCE_WEIGHT: f32 = 1.5;
    /// Opponents must exceed own radius by this much to be a threat
    pub const THREAT_SIZE_TOLERANCE: f32 = 0.05;
    /// Angular increment of the safe-heading search, degrees
    pub const STEER_STEP_DEG: f32 = 20.0;
    /// Increments tried per side before giving up on a heading
    pub const STEER_MAX_CHECKS: u32 = 8;
    /// Heading slerp rate, 1/seconds
    pub const HEADING_RATE: f32 = 10.0;
    /// Reach distance for intermediate waypoints
    pub const WAYPOINT_REACH: f32 = 1.5;
    /// Reach distance for the final waypoint
    pub const FINAL_WAYPOINT_REACH: f32 = 2.5;
    /// Waypoints closer than this to the previous one are coalesced
    pub const MIN_WAYPOINT_SPACING: f32 = 1.0;
    /// Seconds without progress before a target is abandoned
    pub const STUCK_TIMEOUT: f32 = 2.0;
    /// Distance that counts as progress
    pub const STUCK_MIN_PROGRESS: f32 = 0.75;
    /// Minimum seconds between ability triggers from the bot
    pub const ABILITY_TRIGGER_COOLDOWN: f32 = 1.0;
    /// Spawn anchor change that forces a re-target
    pub const SPAWN_RETARGET_EPSILON: f32 = 0.5;
    /// Random wander radius used when no graph exists
    pub const WANDER_OFFSET: f32 = 10.0;
    /// Prediction error beyond which the bot snaps to the server position
    pub const RECONCILE_SNAP_DISTANCE: f32 = 2.0;
    /// Fraction of the prediction error corrected per snapshot below the snap distance
    pub const RECONCILE_BLEND: f32 = 0.2;
}

/// Load-test harness defaults
pub mod harness {
    /// Bots spawned by default
    pub const BOT_COUNT: usize = 16;
    /// Match length in seconds (90 s at 60 Hz = 5400 ticks)
    pub const MATCH_SECONDS: f32 = 90.0;
    /// Runes kept alive on the map
    pub const RUNE_COUNT: usize = 60;
    /// Seconds between metrics summaries
    pub const REPORT_INTERVAL_SECS: u64 = 5;
    /// Capacity of each per-bot downlink and the shared uplink
    pub const QUEUE_CAPACITY: usize = 4096;
    /// Seconds an ability speed burst lasts in the local simulator
    pub const ABILITY_BURST_SECS: f32 = 0.33;
}
