//! Bot swarm harness
//!
//! Runs a `LocalMatch` with one `BotDriver` per player. In wire mode every
//! bot parses server JSON from its own queue and pushes bincode frames into
//! a shared uplink, the same path a networked client takes. In live mode
//! the simulator publishes snapshots directly and only inputs go through
//! frames.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bot::{BotDriver, BotStats, PerceptionSource};
use crate::config::{AdapterMode, BotConfig, ConfigError, HarnessConfig};
use crate::game::map::{ArenaMap, MapError};
use crate::game::nav::NavGraph;
use crate::game::snapshot::{MatchEvent, WorldSnapshot};
use crate::metrics::SwarmMetrics;
use crate::net::feed::{SharedFeed, SnapshotPublisher, WireFeed};
use crate::net::inbox::{Inbox, InboxSender};
use crate::net::protocol::{
    encode_json, from_wire_id, MatchEndMsg, ProtocolError, ServerMessage, WireEvent,
};
use crate::net::sink::FrameSink;
use crate::sim::LocalMatch;

#[derive(Debug, thiserror::Error)]
pub enum SwarmError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("invalid map: {0}")]
    Map(#[from] MapError),
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Either perception adapter, so one driver type serves both modes
pub enum SwarmFeed {
    Wire(WireFeed),
    Live(SharedFeed),
}

impl PerceptionSource for SwarmFeed {
    fn sync(&mut self, events: &mut Vec<MatchEvent>) -> Option<Arc<WorldSnapshot>> {
        match self {
            SwarmFeed::Wire(feed) => feed.sync(events),
            SwarmFeed::Live(feed) => feed.sync(events),
        }
    }
}

pub type SwarmBot = BotDriver<SwarmFeed, FrameSink>;

/// Final tallies of a finished run
#[derive(Debug, Clone)]
pub struct SwarmReport {
    pub ticks: u32,
    pub end: MatchEndMsg,
    pub stats: BotStats,
    pub survivors: usize,
}

pub struct Swarm {
    config: HarnessConfig,
    sim: LocalMatch,
    bots: Vec<SwarmBot>,
    uplink: Inbox<Vec<u8>>,
    downlinks: Vec<InboxSender<Arc<str>>>,
    publisher: Option<SnapshotPublisher>,
    metrics: Arc<SwarmMetrics>,
    started: bool,
    end_sent: bool,
}

impl Swarm {
    pub fn new(
        config: HarnessConfig,
        bot_config: Arc<BotConfig>,
        metrics: Arc<SwarmMetrics>,
    ) -> Result<Self, SwarmError> {
        config.validate()?;
        bot_config.validate()?;

        let map = Arc::new(ArenaMap::arcane_circuit());
        map.validate()?;
        let graph = Arc::new(NavGraph::from_map(&map));

        let ids: Vec<Uuid> = (0..config.bot_count).map(|_| Uuid::new_v4()).collect();
        let sim = LocalMatch::new(map.clone(), &config, &ids);

        let uplink = Inbox::new(config.queue_capacity);
        let publisher = match config.adapter {
            AdapterMode::Live => Some(SnapshotPublisher::new(config.queue_capacity)),
            AdapterMode::Wire => None,
        };

        let mut downlinks = Vec::new();
        let bots = sim
            .players()
            .iter()
            .map(|p| {
                let feed = match &publisher {
                    Some(publisher) => SwarmFeed::Live(publisher.subscribe()),
                    None => {
                        let feed = WireFeed::new(config.queue_capacity);
                        downlinks.push(feed.sender());
                        SwarmFeed::Wire(feed)
                    }
                };
                let sink = FrameSink::new(p.wire_id, uplink.sender());
                BotDriver::new(p.id, p.position, bot_config.clone(), map.clone(), feed, sink)
                    .with_graph(graph.clone())
            })
            .collect::<Vec<_>>();

        metrics.bots_total.store(bots.len() as u64, Ordering::Relaxed);
        metrics.bots_alive.store(bots.len() as u64, Ordering::Relaxed);
        info!(
            bots = bots.len(),
            adapter = ?config.adapter,
            nodes = graph.len(),
            "Swarm ready"
        );

        Ok(Self {
            config,
            sim,
            bots,
            uplink,
            downlinks,
            publisher,
            metrics,
            started: false,
            end_sent: false,
        })
    }

    /// Announce the match and push the initial world
    pub fn start(&mut self) -> Result<(), SwarmError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let start = self.sim.match_start();
        match self.publisher.clone() {
            Some(publisher) => {
                if let ServerMessage::MatchStart(msg) = &start {
                    publisher.publish_event(MatchEvent::MatchStart(msg.to_info()));
                }
                publisher.publish(self.sim.take_snapshot());
            }
            None => {
                self.broadcast(&start)?;
                let state = self.sim.state_message();
                self.broadcast(&state)?;
            }
        }
        Ok(())
    }

    /// One harness tick: inputs in, simulate, broadcast, bots think
    pub fn step(&mut self) -> Result<(), SwarmError> {
        if !self.started {
            self.start()?;
        }
        let started = Instant::now();

        for frame in self.uplink.drain() {
            match self.sim.apply_frame(&frame) {
                Ok(true) => {}
                Ok(false) => {
                    self.metrics.frames_rejected.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.metrics.frames_rejected.fetch_add(1, Ordering::Relaxed);
                    debug!("Rejected uplink frame: {}", e);
                }
            }
        }

        let was_finished = self.sim.is_finished();
        self.sim.step();
        let tick = self.sim.tick();

        let events = self.sim.drain_events();
        self.count_events(&events);
        self.broadcast_events(events)?;

        let snapshot_due = tick % self.config.snapshot_interval().max(1) == 0;
        if snapshot_due || (self.sim.is_finished() && !was_finished) {
            match &self.publisher {
                Some(publisher) => publisher.publish(self.sim.take_snapshot()),
                None => {
                    let state = self.sim.state_message();
                    self.broadcast(&state)?;
                }
            }
        }

        if self.sim.is_finished() && !self.end_sent {
            self.end_sent = true;
            let end = self.sim.end_message();
            info!(
                tick,
                winner = ?end.winner_id.map(from_wire_id),
                survivors = self.sim.alive_count(),
                "Match over"
            );
            match &self.publisher {
                Some(publisher) => publisher.publish_event(MatchEvent::MatchEnded {
                    winner_id: end.winner_id.map(from_wire_id),
                }),
                None => self.broadcast(&ServerMessage::MatchEnd(end))?,
            }
        }

        let dt = self.config.dt();
        #[cfg(feature = "parallel")]
        self.bots.par_iter_mut().for_each(|bot| bot.tick(dt));
        #[cfg(not(feature = "parallel"))]
        self.bots.iter_mut().for_each(|bot| bot.tick(dt));

        self.metrics.match_tick.store(tick as u64, Ordering::Relaxed);
        self.metrics
            .observe_bots(&self.totals(), self.bots.len(), self.sim.alive_count());
        self.metrics.record_tick_time(started.elapsed());
        Ok(())
    }

    /// Step until every bot has seen the match end
    pub fn run_to_completion(&mut self) -> Result<SwarmReport, SwarmError> {
        // Enough headroom for the end notice to reach every bot
        let limit = self.config.match_ticks() + self.config.tick_rate * 10;
        while !self.is_done() {
            if self.sim.tick() > limit {
                warn!(tick = self.sim.tick(), "Swarm did not settle, stopping");
                break;
            }
            self.step()?;
        }
        Ok(self.report())
    }

    /// Simulator finished and every bot has noticed
    pub fn is_done(&self) -> bool {
        self.sim.is_finished() && self.end_sent && self.bots.iter().all(|b| b.is_finished())
    }

    pub fn report(&self) -> SwarmReport {
        SwarmReport {
            ticks: self.sim.tick(),
            end: self.sim.end_message(),
            stats: self.totals(),
            survivors: self.sim.alive_count(),
        }
    }

    pub fn totals(&self) -> BotStats {
        self.bots.iter().fold(BotStats::default(), |mut acc, bot| {
            acc.merge(bot.stats());
            acc
        })
    }

    pub fn bots(&self) -> &[SwarmBot] {
        &self.bots
    }

    pub fn sim(&self) -> &LocalMatch {
        &self.sim
    }

    pub fn metrics(&self) -> &Arc<SwarmMetrics> {
        &self.metrics
    }

    fn count_events(&self, events: &[WireEvent]) {
        for event in events {
            let counter = match event {
                WireEvent::PlayerEliminated { .. } => &self.metrics.eliminations,
                WireEvent::RuneCollected { .. } => &self.metrics.runes_collected,
                WireEvent::ShrineCaptured { .. } => &self.metrics.shrines_captured,
                _ => continue,
            };
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn broadcast_events(&self, events: Vec<WireEvent>) -> Result<(), SwarmError> {
        match &self.publisher {
            Some(publisher) => {
                for event in events.iter().filter_map(WireEvent::to_match_event) {
                    publisher.publish_event(event);
                }
            }
            None => {
                for event in events {
                    self.broadcast(&ServerMessage::Event(event))?;
                }
            }
        }
        Ok(())
    }

    /// Encode once, queue for every bot. Full queues lose the message.
    fn broadcast(&self, message: &ServerMessage) -> Result<(), SwarmError> {
        let text: Arc<str> = encode_json(message)?.into();
        for tx in &self.downlinks {
            if tx.try_send(text.clone()).is_err() {
                self.metrics.downlink_drops.fetch_add(1, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn harness(adapter: AdapterMode, bots: usize, seconds: f32) -> HarnessConfig {
        HarnessConfig {
            adapter,
            bot_count: bots,
            match_seconds: seconds,
            seed: Some(42),
            rune_count: 30,
            ..Default::default()
        }
    }

    fn swarm(config: HarnessConfig) -> Swarm {
        Swarm::new(config, Arc::new(BotConfig::default()), Arc::new(SwarmMetrics::new()))
            .expect("valid swarm")
    }

    #[test]
    fn test_wire_match_runs_to_completion() {
        let mut swarm = swarm(harness(AdapterMode::Wire, 6, 8.0));
        let report = swarm.run_to_completion().unwrap();

        assert!(swarm.is_done());
        assert!(report.ticks <= 480);
        assert_eq!(report.end.placements.len(), 6);
        assert!(report.stats.inputs_sent > 0);
        assert!(report.stats.retargets > 0);
        assert_eq!(swarm.sim().inputs_rejected(), 0);
        assert_eq!(swarm.metrics().frames_rejected.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn test_bots_leave_their_sanctuaries() {
        let mut swarm = swarm(harness(AdapterMode::Wire, 4, 30.0));
        for _ in 0..600 {
            swarm.step().unwrap();
        }
        let left = swarm.sim().players().iter().filter(|p| !p.spawn_active).count();
        assert!(left > 0, "no bot walked out in ten seconds");
    }

    #[test]
    fn test_bots_collect_runes_within_half_a_minute() {
        let mut swarm = swarm(harness(AdapterMode::Wire, 6, 30.0));
        swarm.run_to_completion().unwrap();

        let collected: u32 = swarm.sim().players().iter().map(|p| p.runes_collected).sum();
        assert!(collected > 0, "no rune collected in thirty seconds");
        assert_eq!(
            swarm.metrics().runes_collected.load(Ordering::Relaxed),
            u64::from(collected)
        );
    }

    #[test]
    fn test_live_adapter_match() {
        let mut swarm = swarm(harness(AdapterMode::Live, 4, 5.0));
        let report = swarm.run_to_completion().unwrap();

        assert!(swarm.is_done());
        assert_eq!(report.end.placements.len(), 4);
        assert!(report.stats.inputs_sent > 0);
        assert!(swarm.downlinks.is_empty());
    }

    #[test]
    fn test_emission_rate_is_throttled() {
        let mut swarm = swarm(harness(AdapterMode::Wire, 2, 30.0));
        for _ in 0..60 {
            swarm.step().unwrap();
        }
        // Both bots alive for the whole second: 20 inputs each, give or take
        // the tick the accumulator crosses on
        let sent = swarm.totals().inputs_sent;
        assert!((38..=42).contains(&sent), "sent {}", sent);
    }

    #[test]
    fn test_metrics_follow_the_swarm() {
        let mut swarm = swarm(harness(AdapterMode::Wire, 3, 30.0));
        for _ in 0..30 {
            swarm.step().unwrap();
        }
        let metrics = swarm.metrics();
        assert_eq!(metrics.match_tick.load(Ordering::Relaxed), 30);
        assert_eq!(metrics.tick_count.load(Ordering::Relaxed), 30);
        assert_eq!(metrics.bots_total.load(Ordering::Relaxed), 3);
        assert_eq!(
            metrics.inputs_sent.load(Ordering::Relaxed),
            swarm.totals().inputs_sent
        );
        assert_eq!(swarm.bots().len(), 3);
    }
}
