use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rune_relic_bots::config::{BotConfig, HarnessConfig};
use rune_relic_bots::metrics::{self, SwarmMetrics};
use rune_relic_bots::net::protocol::from_wire_id;
use rune_relic_bots::swarm::Swarm;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize logging (RUST_LOG overrides)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .init();

    info!("Rune Relic bot harness v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let bot_config = BotConfig::load_or_default();
    bot_config.validate()?;
    let harness = HarnessConfig::load_or_default();
    harness.validate()?;
    info!(
        "Configuration loaded: bots={}, adapter={:?}, tick_rate={}, match={}s",
        harness.bot_count, harness.adapter, harness.tick_rate, harness.match_seconds
    );

    let metrics = Arc::new(SwarmMetrics::new());

    // Metrics endpoint only when a port is given
    if let Some(port) = std::env::var("METRICS_PORT").ok().and_then(|s| s.parse::<u16>().ok()) {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = metrics::start_metrics_server(metrics_clone, port).await {
                error!("Metrics server error: {}", e);
            }
        });
    }

    let mut swarm = Swarm::new(harness.clone(), Arc::new(bot_config), metrics.clone())?;
    swarm.start()?;

    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / harness.tick_rate as f64));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut report = tokio::time::interval(Duration::from_secs(harness.report_interval_secs));
    report.set_missed_tick_behavior(MissedTickBehavior::Skip);
    report.tick().await;

    // Shutdown signal handler
    let shutdown = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
        info!("Shutdown signal received");
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = swarm.step() {
                    error!("Harness error: {}", e);
                    break;
                }
                if swarm.is_done() {
                    break;
                }
            }
            _ = report.tick() => {
                info!("{}", metrics.summary());
            }
            _ = &mut shutdown => {
                info!("Shutting down...");
                break;
            }
        }
    }

    let result = swarm.report();
    info!("{}", metrics.summary());
    info!(
        "Match finished at tick {}: winner={:?}, survivors={}",
        result.ticks,
        result.end.winner_id.map(from_wire_id),
        result.survivors
    );
    for p in result.end.placements.iter().take(3) {
        info!(
            "#{} {} score={} eliminations={} runes={}",
            p.place,
            from_wire_id(p.player_id),
            p.score,
            p.eliminations,
            p.runes_collected
        );
    }
    info!(
        "Bots: inputs={} retargets={} fallbacks={} stuck={} panics={} holds={}",
        result.stats.inputs_sent,
        result.stats.retargets,
        result.stats.path_fallbacks,
        result.stats.stuck_recoveries,
        result.stats.panics,
        result.stats.holds
    );

    Ok(())
}
