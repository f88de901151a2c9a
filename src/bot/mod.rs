//! Bot runtime: one driver per agent, generic over perception and emission

pub mod driver;

pub use driver::{BotDriver, BotStats, InputSink, PerceptionSource};
