use anyhow::Result;
use parking_lot::RwLock;
use serenity::{http::Http, model::gateway::GatewayIntents, Client};
use songbird::{SerenityInit, Songbird};
use std::sync::Arc;
use tracing::{error, info};

mod audio;
mod bot;
mod config;
mod db;
mod error;
mod reload;
mod ui;

use crate::audio::backend::PlaybackBackend;
use crate::audio::lavalink::LavalinkBackend;
use crate::audio::player::PlayerRegistry;
use crate::bot::{events, RitmoBot};
use crate::config::Config;
use crate::db::SettingsStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Inicializar logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ritmo_bot=debug".parse()?)
                .add_directive("serenity=info".parse()?)
                .add_directive("songbird=info".parse()?)
                .add_directive("lavalink_rs=info".parse()?),
        )
        .init();

    info!("🎵 Iniciando Ritmo Bot v{}", env!("CARGO_PKG_VERSION"));

    // Cargar configuración
    let config = Config::load()?;
    info!("{}", config.summary());

    // Base de datos de prefijos por servidor
    let settings = Arc::new(SettingsStore::connect(&config.database_url).await?);

    // Intents mínimos necesarios
    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::GUILD_MESSAGE_REACTIONS;

    // El id propio hace falta antes de abrir el gateway para dar de
    // alta el nodo de audio
    let http = Http::new(&config.discord_token);
    let user_id = http.get_current_user().await?.id;

    // Voz por el gateway, audio en el nodo
    let songbird = Songbird::serenity();
    let (backend, playback_events) =
        LavalinkBackend::new(&config, user_id, songbird.clone()).await?;
    let backend: Arc<dyn PlaybackBackend> = Arc::new(backend);
    let registry = Arc::new(PlayerRegistry::new(backend.clone()));

    // Bucle que conduce los eventos del nodo a cada reproductor
    tokio::spawn(events::playback_event_loop(registry.clone(), playback_events));

    // Recarga en caliente solo en desarrollo
    let shared_config = Arc::new(RwLock::new(config.clone()));
    if config.dev_mode {
        reload::spawn_config_watcher(shared_config.clone())?;
    }

    let handler = RitmoBot::new(shared_config, settings, registry, backend);

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .register_songbird_with(songbird)
        .await?;

    // Manejar shutdown graceful
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Error al registrar Ctrl+C");
        info!("⚠️ Señal de apagado recibida, cerrando...");
        std::process::exit(0);
    });

    info!("🚀 Bot iniciado");
    if let Err(why) = client.start().await {
        error!("Error al ejecutar el cliente: {:?}", why);
    }

    Ok(())
}
