//! Swarm metrics
//!
//! Atomic counters folded from the bots' own stats, rolling tick-time
//! percentiles, and Prometheus text output. `start_metrics_server` exposes
//! them over plain HTTP when the harness is given a port.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::bot::BotStats;

/// Tick samples kept for percentiles
const TICK_HISTORY: usize = 1000;

#[derive(Debug)]
pub struct SwarmMetrics {
    // Bot behavior (totals across the swarm)
    pub bot_ticks: AtomicU64,
    pub inputs_sent: AtomicU64,
    pub retargets: AtomicU64,
    pub path_fallbacks: AtomicU64,
    pub stuck_recoveries: AtomicU64,
    pub panics: AtomicU64,
    pub holds: AtomicU64,
    pub abilities_fired: AtomicU64,
    pub sink_errors: AtomicU64,
    pub snaps: AtomicU64,

    // Match
    pub bots_total: AtomicU64,
    pub bots_alive: AtomicU64,
    pub eliminations: AtomicU64,
    pub runes_collected: AtomicU64,
    pub shrines_captured: AtomicU64,
    pub match_tick: AtomicU64,

    // Transport
    pub frames_rejected: AtomicU64,
    pub downlink_drops: AtomicU64,

    // Harness tick timing (microseconds)
    pub tick_time_us: AtomicU64,
    pub tick_time_p95_us: AtomicU64,
    pub tick_time_p99_us: AtomicU64,
    pub tick_time_max_us: AtomicU64,
    pub tick_count: AtomicU64,

    start_time: Instant,
    tick_history: RwLock<VecDeque<u64>>,
}

impl SwarmMetrics {
    pub fn new() -> Self {
        Self {
            bot_ticks: AtomicU64::new(0),
            inputs_sent: AtomicU64::new(0),
            retargets: AtomicU64::new(0),
            path_fallbacks: AtomicU64::new(0),
            stuck_recoveries: AtomicU64::new(0),
            panics: AtomicU64::new(0),
            holds: AtomicU64::new(0),
            abilities_fired: AtomicU64::new(0),
            sink_errors: AtomicU64::new(0),
            snaps: AtomicU64::new(0),
            bots_total: AtomicU64::new(0),
            bots_alive: AtomicU64::new(0),
            eliminations: AtomicU64::new(0),
            runes_collected: AtomicU64::new(0),
            shrines_captured: AtomicU64::new(0),
            match_tick: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            downlink_drops: AtomicU64::new(0),
            tick_time_us: AtomicU64::new(0),
            tick_time_p95_us: AtomicU64::new(0),
            tick_time_p99_us: AtomicU64::new(0),
            tick_time_max_us: AtomicU64::new(0),
            tick_count: AtomicU64::new(0),
            start_time: Instant::now(),
            tick_history: RwLock::new(VecDeque::with_capacity(TICK_HISTORY)),
        }
    }

    /// Record a harness tick time and update percentiles
    pub fn record_tick_time(&self, duration: Duration) {
        let us = duration.as_micros() as u64;
        self.tick_time_us.store(us, Ordering::Relaxed);
        self.tick_count.fetch_add(1, Ordering::Relaxed);

        let mut history = self.tick_history.write();
        history.push_back(us);
        while history.len() > TICK_HISTORY {
            history.pop_front();
        }

        if history.len() >= 10 {
            let mut sorted: Vec<u64> = history.iter().copied().collect();
            sorted.sort_unstable();

            let p95_idx = (sorted.len() as f32 * 0.95) as usize;
            let p99_idx = (sorted.len() as f32 * 0.99) as usize;

            self.tick_time_p95_us.store(sorted[p95_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_p99_us.store(sorted[p99_idx.min(sorted.len() - 1)], Ordering::Relaxed);
            self.tick_time_max_us.store(sorted.last().copied().unwrap_or(0), Ordering::Relaxed);
        }
    }

    /// Overwrite the behavior counters with swarm-wide totals
    pub fn observe_bots(&self, totals: &BotStats, total: usize, alive: usize) {
        self.bot_ticks.store(totals.ticks, Ordering::Relaxed);
        self.inputs_sent.store(totals.inputs_sent, Ordering::Relaxed);
        self.retargets.store(totals.retargets, Ordering::Relaxed);
        self.path_fallbacks.store(totals.path_fallbacks, Ordering::Relaxed);
        self.stuck_recoveries.store(totals.stuck_recoveries, Ordering::Relaxed);
        self.panics.store(totals.panics, Ordering::Relaxed);
        self.holds.store(totals.holds, Ordering::Relaxed);
        self.abilities_fired.store(totals.abilities_fired, Ordering::Relaxed);
        self.sink_errors.store(totals.sink_errors, Ordering::Relaxed);
        self.snaps.store(totals.snaps, Ordering::Relaxed);
        self.bots_total.store(total as u64, Ordering::Relaxed);
        self.bots_alive.store(alive as u64, Ordering::Relaxed);
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// One line for the periodic log
    pub fn summary(&self) -> String {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        format!(
            "tick={} alive={}/{} inputs={} retargets={} fallbacks={} stuck={} panics={} holds={} abilities={} kills={} runes={} shrines={} tick_p95={}us tick_p99={}us",
            load(&self.match_tick),
            load(&self.bots_alive),
            load(&self.bots_total),
            load(&self.inputs_sent),
            load(&self.retargets),
            load(&self.path_fallbacks),
            load(&self.stuck_recoveries),
            load(&self.panics),
            load(&self.holds),
            load(&self.abilities_fired),
            load(&self.eliminations),
            load(&self.runes_collected),
            load(&self.shrines_captured),
            load(&self.tick_time_p95_us),
            load(&self.tick_time_p99_us),
        )
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(4096);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        // Bots
        metric!("rune_relic_bots_total", "Bots in the swarm", "gauge",
            self.bots_total.load(Ordering::Relaxed));
        metric!("rune_relic_bots_alive", "Bots still alive", "gauge",
            self.bots_alive.load(Ordering::Relaxed));
        metric!("rune_relic_bot_ticks_total", "Bot ticks executed", "counter",
            self.bot_ticks.load(Ordering::Relaxed));
        metric!("rune_relic_inputs_sent_total", "Input records emitted", "counter",
            self.inputs_sent.load(Ordering::Relaxed));
        metric!("rune_relic_retargets_total", "Intent re-targets", "counter",
            self.retargets.load(Ordering::Relaxed));
        metric!("rune_relic_path_fallbacks_total", "Targets routed directly after an empty path", "counter",
            self.path_fallbacks.load(Ordering::Relaxed));
        metric!("rune_relic_stuck_recoveries_total", "Targets dropped for lack of progress", "counter",
            self.stuck_recoveries.load(Ordering::Relaxed));
        metric!("rune_relic_panics_total", "Transitions into panic", "counter",
            self.panics.load(Ordering::Relaxed));
        metric!("rune_relic_holds_total", "Ticks with no safe heading", "counter",
            self.holds.load(Ordering::Relaxed));
        metric!("rune_relic_abilities_fired_total", "Ability triggers", "counter",
            self.abilities_fired.load(Ordering::Relaxed));
        metric!("rune_relic_sink_errors_total", "Inputs the transport refused", "counter",
            self.sink_errors.load(Ordering::Relaxed));
        metric!("rune_relic_reconcile_snaps_total", "Predictions snapped to the server position", "counter",
            self.snaps.load(Ordering::Relaxed));

        // Match
        metric!("rune_relic_match_tick", "Current simulator tick", "gauge",
            self.match_tick.load(Ordering::Relaxed));
        metric!("rune_relic_eliminations_total", "Players eliminated", "counter",
            self.eliminations.load(Ordering::Relaxed));
        metric!("rune_relic_runes_collected_total", "Runes collected", "counter",
            self.runes_collected.load(Ordering::Relaxed));
        metric!("rune_relic_shrines_captured_total", "Shrines captured", "counter",
            self.shrines_captured.load(Ordering::Relaxed));

        // Transport
        metric!("rune_relic_frames_rejected_total", "Uplink frames that failed to decode or apply", "counter",
            self.frames_rejected.load(Ordering::Relaxed));
        metric!("rune_relic_downlink_drops_total", "Server messages dropped on full bot queues", "counter",
            self.downlink_drops.load(Ordering::Relaxed));

        // Timing
        metric!("rune_relic_tick_time_microseconds", "Current harness tick time", "gauge",
            self.tick_time_us.load(Ordering::Relaxed));
        metric!("rune_relic_tick_time_p95_microseconds", "95th percentile harness tick time", "gauge",
            self.tick_time_p95_us.load(Ordering::Relaxed));
        metric!("rune_relic_tick_time_p99_microseconds", "99th percentile harness tick time", "gauge",
            self.tick_time_p99_us.load(Ordering::Relaxed));
        metric!("rune_relic_tick_time_max_microseconds", "Maximum harness tick time", "gauge",
            self.tick_time_max_us.load(Ordering::Relaxed));
        metric!("rune_relic_tick_count", "Harness ticks processed", "counter",
            self.tick_count.load(Ordering::Relaxed));
        metric!("rune_relic_uptime_seconds", "Harness uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }
}

impl Default for SwarmMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Serve `/metrics` and `/health` until the listener fails
pub async fn start_metrics_server(metrics: Arc<SwarmMetrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);
                    let response = if request.starts_with("GET /metrics") {
                        let body = metrics.to_prometheus();
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    } else if request.starts_with("GET /health") {
                        "HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 2\r\nConnection: close\r\n\r\nOK".to_string()
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
