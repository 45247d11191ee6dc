use std::collections::HashSet;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use fpl_core::config::{AppConfig, CacheConfig};
use fpl_core::models::{ElementId, EntryId, RoundId};
use fpl_core::{
    spawn_detector, CacheStore, ChangeDetector, ComparisonEngine, FplClient, FplError,
    LiveScoringEngine, MemoryStore, PollConfig, ResourceCache,
};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "fpl-watch", version, about)]
struct Cli {
    /// Overrides the upstream base URL from the config file.
    #[arg(long, env = "FPLWATCH_BASE_URL", global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Captain-aware live score for one entrant.
    Live {
        entry: EntryId,
        /// Defaults to the current round.
        #[arg(long)]
        round: Option<RoundId>,
    },
    /// Shared picks, differentials and captain swing between two entrants.
    Compare {
        entry_a: EntryId,
        entry_b: EntryId,
        #[arg(long)]
        round: Option<RoundId>,
    },
    /// Poll for player news changes and print them as JSON lines until interrupted.
    Watch,
    /// Print stored change events, newest first.
    Events {
        #[arg(long)]
        since_minutes: Option<i64>,
        #[arg(long = "player")]
        players: Vec<ElementId>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = AppConfig::load();
    if let Some(base_url) = cli.base_url {
        config.upstream.base_url = base_url;
    }

    let client = FplClient::new(&config.upstream.base_url, config.upstream.request_timeout())?;
    let store = build_store(&config.cache).await?;

    match cli.command {
        Command::Live { entry, round } => {
            let scoring = LiveScoringEngine::new(ResourceCache::new(store, client));
            let round = resolve_round(scoring.cache(), round).await?;
            let view = scoring.live_score_view(entry, round).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        Command::Compare {
            entry_a,
            entry_b,
            round,
        } => {
            let scoring = LiveScoringEngine::new(ResourceCache::new(store, client));
            let round = resolve_round(scoring.cache(), round).await?;
            let result = ComparisonEngine::new(scoring)
                .compare_entrants(entry_a, entry_b, round)
                .await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Watch => {
            let poll = config.detector.poll_config();
            watch(build_detector(&config, store, client), poll).await?
        }
        Command::Events {
            since_minutes,
            players,
        } => {
            if !store_is_shared(&config.cache) {
                warn!("cache.redis_url is not in use, so events logged by `watch` are not visible here");
            }
            let detector = build_detector(&config, store, client);
            let since = since_minutes.map(|m| chrono::Utc::now() - chrono::Duration::minutes(m));
            let events = if players.is_empty() {
                detector.get_events(since).await?
            } else {
                let players: HashSet<ElementId> = players.into_iter().collect();
                detector.get_events_for_entities(&players, since).await?
            };
            println!("{}", serde_json::to_string_pretty(&events)?);
        }
    }
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Whether this build talks to a store other processes can see.
fn store_is_shared(config: &CacheConfig) -> bool {
    cfg!(feature = "redis") && config.redis_url.is_some()
}

async fn build_store(config: &CacheConfig) -> Result<Arc<dyn CacheStore>, FplError> {
    match &config.redis_url {
        #[cfg(feature = "redis")]
        Some(url) => Ok(Arc::new(
            fpl_core::RedisStore::connect(url, &config.key_prefix).await?,
        )),
        #[cfg(not(feature = "redis"))]
        Some(_) => {
            warn!("redis_url is set but this build has no redis support, using memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        None => Ok(Arc::new(MemoryStore::new())),
    }
}

fn build_detector(
    config: &AppConfig,
    store: Arc<dyn CacheStore>,
    client: FplClient,
) -> ChangeDetector {
    let detector =
        ChangeDetector::new(store, client).with_retention(config.detector.retention());
    match config.detector.lease_ttl() {
        Some(ttl) => detector.with_lease(ttl),
        None => detector,
    }
}

async fn resolve_round(cache: &ResourceCache, round: Option<RoundId>) -> Result<RoundId, FplError> {
    if let Some(round) = round {
        return Ok(round);
    }
    let catalog = cache.bootstrap().await?;
    Ok(catalog.current_round().unwrap_or(1))
}

async fn watch(detector: ChangeDetector, poll: PollConfig) -> Result<(), FplError> {
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let poller = spawn_detector(Arc::new(detector), poll, events_tx);
    info!(
        interval_secs = poll.interval.as_secs(),
        "watching for player news changes"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received");
                break;
            }
            batch = events_rx.recv() => {
                let Some(batch) = batch else { break };
                for event in batch {
                    match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(err) => warn!(error = %err, "failed to encode change event"),
                    }
                }
            }
        }
    }
    poller.stop().await
}
