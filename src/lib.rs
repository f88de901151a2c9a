//! Rune Relic Bots
//!
//! Navigation and decision stack for Rune Relic arena bots, plus a local
//! match simulator and a swarm harness that drives many bots through it.
//!
//! # Features
//!
//! - `parallel` - Tick bots on the rayon pool in the swarm harness (enabled by default)

pub mod config;
pub mod util;
pub mod game;
pub mod net;
pub mod bot;
pub mod sim;
pub mod swarm;
pub mod metrics;
