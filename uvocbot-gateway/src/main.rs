use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use uvocbot_gateway::census::{CensusClient, stream};
use uvocbot_gateway::circuit_breaker::CircuitBreaker;
use uvocbot_gateway::discord::{DiscordCaptureSink, start_discord_bot};
use uvocbot_gateway::facility_capture::{
    CaptureNotifier, CensusMapRegionResolver, FacilityCaptureService,
};
use uvocbot_gateway::population::PopulationService;
use uvocbot_gateway::server;
use uvocbot_gateway::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = uvocbot_core::Config::load()?;
    let settings = &config.settings;

    // Initialize tracing, RUST_LOG wins over the configured level
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.logging.level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded");

    // Initialize database
    let db = match &settings.database.path {
        Some(path) => uvocbot_db::SettingsDbPool::open(path.into()).await?,
        None => uvocbot_db::SettingsDbPool::new().await?,
    };
    info!("Settings database initialized at {}", db.path().display());

    // Upstream clients share one breaker, keyed by alias
    let breaker = Arc::new(CircuitBreaker::new(
        settings.census.failure_threshold,
        Duration::from_secs(settings.census.cooldown_seconds),
    ));
    let census = Arc::new(CensusClient::new(
        &settings.census,
        config.census_service_id(),
        Arc::clone(&breaker),
    )?);
    let population = Arc::new(PopulationService::from_settings(
        &settings.population,
        Arc::clone(&breaker),
    )?);

    let resolver = Arc::new(CensusMapRegionResolver::new(
        Arc::clone(&census),
        Duration::from_secs(settings.census.cache_ttl_minutes * 60),
    ));
    let facility_capture = Arc::new(FacilityCaptureService::from_settings(
        resolver,
        &settings.facility_capture,
    ));

    let state = Arc::new(AppState::new(
        db,
        Arc::clone(&census),
        population,
        Arc::clone(&facility_capture),
    ));

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    if settings.facility_capture.enabled {
        let service = Arc::clone(&facility_capture);
        let token = cancel.clone();
        tasks.push(tokio::spawn(async move {
            if let Err(e) = service.run(token).await {
                error!("Facility capture loop failed to start: {}", e);
            }
        }));
    } else {
        info!("Facility capture disabled in config");
    }

    // Start Discord bot if enabled and token is present
    let discord_token = config.discord_bot_token().map(|s| s.to_string());
    let discord_task = if config.discord_enabled() {
        match start_discord_bot(discord_token, Arc::clone(&state)).await? {
            Some(mut client) => {
                info!("Discord bot started");

                if settings.census.stream_enabled && settings.facility_capture.enabled {
                    let url = stream::stream_url(
                        &settings.census.streaming_url,
                        config.census_service_id(),
                    )?;
                    let events = stream::facility_control_events(
                        url,
                        Duration::from_secs(settings.census.reconnect_seconds),
                        cancel.clone(),
                    );
                    let notifier = CaptureNotifier::new(
                        Arc::clone(&facility_capture),
                        state.pool().clone(),
                        census,
                        Arc::new(DiscordCaptureSink::new(Arc::clone(&client.http))),
                    );
                    let token = cancel.clone();
                    tasks.push(tokio::spawn(async move {
                        notifier.consume(events, token).await;
                    }));
                }

                Some(tokio::spawn(async move {
                    if let Err(e) = client.start().await {
                        error!("Discord client error: {}", e);
                    }
                }))
            }
            None => {
                info!("Discord bot not started");
                None
            }
        }
    } else {
        info!("Discord bot not configured (set DISCORD_BOT_TOKEN and enable in config to enable)");
        None
    };

    if settings.gateway.host != "127.0.0.1" && settings.gateway.host != "localhost" {
        warn!(
            "API binding to non-localhost address: {}. Guild settings would be editable remotely.",
            settings.gateway.host
        );
    }

    let bind_addr = config.bind_addr();
    info!("Starting UVOCBot API on {}", bind_addr);

    let shutdown = {
        let cancel = cancel.clone();
        async move {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
                _ = cancel.cancelled() => {}
            }
        }
    };
    let server_result = server::run(state, &bind_addr, shutdown).await;

    // If we get here, the server stopped
    cancel.cancel();
    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task ended abnormally: {}", e);
        }
    }
    if let Some(task) = discord_task {
        task.abort();
    }

    server_result
}
