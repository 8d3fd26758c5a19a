//! Sam the Scraper
//!
//! Follows one Peoply organization and announces its new and changed events
//! in a Discord channel.

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::ConfigLoader;
use sam_core::events::poll_tick_channel;
use sam_core::processors::notifier::DEFAULT_GATEWAY_WAIT;
use sam_core::processors::{DiscordNotifier, PeoplyEventSource, PollDiffLoop, TickScheduler};
use sam_core::status::shared_loop_status;
use sam_core::store::{SeenEventStore, SqliteSeenEventStore};
use sam_sdk::client::{DiscordGateway, DiscordRest, GatewayOptions, PeoplyClient};
use sam_sdk::objects::discord::PresenceUpdate;
use server::{build_router, run_server};
use shutdown::shutdown_signal;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Presence shown under the bot's name.
const PRESENCE: &str = "Putting my nose to the scrapestone";

/// Sam the Scraper - Peoply event announcer for Discord
#[derive(Parser, Debug)]
#[command(name = "sam")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env = "SAM_CONFIG", default_value = "./sam-config.toml")]
    config: PathBuf,

    /// Override the status API listen address (e.g., 0.0.0.0:8080)
    #[arg(short, long)]
    listen: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine; the variables may come from the service manager.
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Logging settings live in the config file, so it is read first.
    let config = ConfigLoader::new(&args.config, args.listen).load()?;
    init_tracing(config.log_json);

    tracing::info!("Starting sam v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        organization = %config.source.organization,
        channel_id = %config.discord.channel_id,
        "Configuration loaded from {:?}",
        args.config
    );

    // Seen-event store: unreachable at startup is fatal.
    let store = Arc::new(
        SqliteSeenEventStore::connect(&config.store_path)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %config.store_path,
                    "Failed to open seen-event store"
                );
                e
            })?,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Discord gateway session
    let (gateway, mut gateway_task) = DiscordGateway::spawn(
        config.discord.token.clone(),
        GatewayOptions {
            presence: Some(PresenceUpdate::listening(PRESENCE)),
            ..Default::default()
        },
    );

    // Poll loop
    let source = PeoplyEventSource::new(PeoplyClient::public()?, &config.source);
    let notifier = DiscordNotifier::new(
        DiscordRest::public(config.discord.token.clone())?,
        config.discord.channel_id.clone(),
        config.display,
    )
    .with_gateway(gateway.clone(), DEFAULT_GATEWAY_WAIT)
    .with_budget(config.polling.notify_timeout);
    let status = shared_loop_status();
    let (tick_tx, tick_rx) = poll_tick_channel();

    let poll_loop = PollDiffLoop::new(
        source,
        notifier,
        store.clone(),
        config.polling,
        status.clone(),
    );
    let loop_task = tokio::spawn(poll_loop.run(tick_rx, shutdown_rx.clone()));
    let scheduler_task = tokio::spawn(
        TickScheduler::new(config.polling.interval).run(shutdown_rx.clone(), tick_tx),
    );

    // Status API
    let server_task = if config.status.enabled {
        let state = AppState::new(
            store.clone() as Arc<dyn SeenEventStore>,
            status,
            config.source.organization.clone(),
        );
        let router = build_router(state);
        let listen = config.status.listen;
        let server_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = run_server(router, listen, server_shutdown).await {
                tracing::error!(error = %e, %listen, "Status server failed");
            }
        }))
    } else {
        tracing::info!("Status API disabled");
        None
    };

    // Run until a signal arrives or Discord rejects the session.
    let (gateway_failure, gateway_done) = tokio::select! {
        _ = shutdown_signal() => (None, false),
        result = &mut gateway_task => match result {
            Ok(Ok(())) => (None, true),
            Ok(Err(e)) => (Some(anyhow::Error::new(e)), true),
            Err(e) => (Some(anyhow::Error::new(e)), true),
        },
    };
    if let Some(e) = &gateway_failure {
        tracing::error!(error = %e, "Discord gateway stopped, shutting down");
    }

    let _ = shutdown_tx.send(true);
    gateway.shutdown();

    if let Err(e) = loop_task.await {
        tracing::error!(error = %e, "Poll loop task failed");
    }
    if let Err(e) = scheduler_task.await {
        tracing::error!(error = %e, "Tick scheduler task failed");
    }
    if let Some(task) = server_task {
        let _ = task.await;
    }
    if !gateway_done {
        match gateway_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(error = %e, "Discord gateway stopped with an error"),
            Err(e) => tracing::error!(error = %e, "Discord gateway task failed"),
        }
    }

    tracing::info!("Closing seen-event store...");
    store.close().await;
    tracing::info!("Shutdown complete");

    match gateway_failure {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,tower_http=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
