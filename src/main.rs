use anyhow::Result;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info, warn};

mod audio;
mod bot;
mod config;
mod error;
mod health;
mod sources;

use crate::audio::{
    manager::{Collaborators, PlaybackManager, SessionSettings},
    stream::YtDlpStreamAdapter,
};
use crate::bot::{
    voice::{SerenityAnnouncer, SongbirdConnector},
    JukeboxBot,
};
use crate::config::Config;
use crate::sources::YtDlpResolver;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("guild_jukebox=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?),
        )
        .init();

    if std::env::args().any(|arg| arg == "--health-check") {
        return health_check().await;
    }

    info!("🎵 Starting guild-jukebox v{}", env!("CARGO_PKG_VERSION"));

    let config = match Config::load() {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!("❌ Invalid configuration: {:#}", e);
            std::process::exit(1);
        }
    };
    info!("{}", config.summary());

    match health::check_dependencies(&config.ytdlp_path).await {
        Ok(version) => info!("✅ {} {}", config.ytdlp_path, version),
        Err(e) => warn!("⚠️ Extractor unavailable, playback will fail: {:#}", e),
    }

    let songbird = Songbird::serenity();
    let http = Arc::new(Http::new(&config.discord_token));

    let manager = PlaybackManager::new(
        Collaborators {
            resolver: Arc::new(YtDlpResolver::new(config.ytdlp_path.clone())),
            adapter: Arc::new(YtDlpStreamAdapter::new(
                config.ytdlp_path.clone(),
                config.stream_bind_timeout(),
            )),
            connector: Arc::new(SongbirdConnector::new(songbird.clone())),
            announcer: Arc::new(SerenityAnnouncer::new(http)),
        },
        SessionSettings {
            default_volume: config.default_volume,
            max_queue_size: config.max_queue_size,
        },
    );

    if config.http_port != 0 {
        let port = config.http_port;
        tokio::spawn(async move {
            if let Err(e) = health::serve(port).await {
                error!("❌ Liveness endpoint stopped: {:#}", e);
            }
        });
    }

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(JukeboxBot::new(config.clone(), manager))
        .register_songbird_with(songbird)
        .await?;

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("⚠️ Shutdown signal received, closing...");
            shard_manager.shutdown_all().await;
        }
    });

    info!("🚀 Bot started");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}

async fn health_check() -> Result<()> {
    dotenvy::dotenv().ok();
    let ytdlp = std::env::var("YTDLP_PATH").unwrap_or_else(|_| "yt-dlp".to_string());
    let version = health::check_dependencies(&ytdlp).await?;
    println!("OK (yt-dlp {version})");
    Ok(())
}
