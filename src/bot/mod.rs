//! # Bot Module
//!
//! Serenity event handler for Ritmo Bot.
//!
//! The bot listens for three things:
//! - `ready`, to log the session
//! - `message`, to dispatch prefix commands (the prefix is per guild,
//!   backed by the settings store)
//! - `voice_state_update`, to tear a guild player down when the last
//!   human leaves its channel
//!
//! Typed domain errors come back as reply embeds; anything unexpected
//! is logged and escalated to the configured webhook.

use parking_lot::RwLock;
use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
    builder::{CreateMessage, ExecuteWebhook},
    model::webhook::Webhook,
};
use std::sync::Arc;
use tracing::{error, info};

pub mod commands;
pub mod events;
pub mod search;

use crate::{
    audio::{backend::PlaybackBackend, player::PlayerRegistry},
    config::Config,
    db::SettingsStore,
    error::MusicError,
    ui::embeds,
};

/// Manejador principal de eventos de Discord
pub struct RitmoBot {
    pub config: Arc<RwLock<Config>>,
    pub settings: Arc<SettingsStore>,
    pub registry: Arc<PlayerRegistry>,
    pub backend: Arc<dyn PlaybackBackend>,
    pub http_client: reqwest::Client,
}

impl RitmoBot {
    pub fn new(
        config: Arc<RwLock<Config>>,
        settings: Arc<SettingsStore>,
        registry: Arc<PlayerRegistry>,
        backend: Arc<dyn PlaybackBackend>,
    ) -> Self {
        Self {
            config,
            settings,
            registry,
            backend,
            http_client: reqwest::Client::new(),
        }
    }

    /// Prefijo vigente del servidor, con el de la config como repuesto
    async fn guild_prefix(&self, guild_id: u64) -> String {
        let default_prefix = self.config.read().default_prefix.clone();
        match self.settings.guild(guild_id, &default_prefix).await {
            Ok(settings) => settings.prefix,
            Err(e) => {
                error!("❌ No se pudo leer el prefijo de guild {}: {:?}", guild_id, e);
                default_prefix
            }
        }
    }

    /// Convierte el error en respuesta; lo inesperado sube al webhook
    async fn handle_command_error(&self, ctx: &Context, msg: &Message, err: anyhow::Error) {
        if let Some(music_err) = err.downcast_ref::<MusicError>() {
            let embed = embeds::error_embed(music_err);
            if let Err(e) = msg
                .channel_id
                .send_message(&ctx.http, CreateMessage::new().embed(embed))
                .await
            {
                error!("❌ No se pudo responder con el error: {:?}", e);
            }
            return;
        }

        error!("❌ Error inesperado en un comando: {:?}", err);
        let _ = msg
            .channel_id
            .send_message(
                &ctx.http,
                CreateMessage::new().embed(embeds::unexpected_error_embed()),
            )
            .await;
        self.report_to_webhook(ctx, msg, &format!("{err:?}")).await;
    }

    async fn report_to_webhook(&self, ctx: &Context, msg: &Message, detail: &str) {
        let Some(url) = self.config.read().log_webhook_url.clone() else {
            return;
        };

        let webhook = match Webhook::from_url(&ctx.http, &url).await {
            Ok(webhook) => webhook,
            Err(e) => {
                error!("❌ Webhook de logs inaccesible: {:?}", e);
                return;
            }
        };

        let report = ExecuteWebhook::new().embed(embeds::command_failure_report(msg, detail));
        if let Err(e) = webhook.execute(&ctx.http, false, report).await {
            error!("❌ No se pudo reportar al webhook: {:?}", e);
        }
    }
}

#[async_trait]
impl EventHandler for RitmoBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 Conectado como {}", ready.user.name);
    }

    async fn message(&self, ctx: Context, msg: Message) {
        if msg.author.bot {
            return;
        }
        // Los comandos de música no existen en DMs
        let Some(guild_id) = msg.guild_id else {
            return;
        };

        let prefix = self.guild_prefix(guild_id.get()).await;
        let bot_id = ctx.cache.current_user().id;
        let content = msg.content.trim();

        // Mención pelada: recordar el prefijo del servidor
        if content == format!("<@{bot_id}>") || content == format!("<@!{bot_id}>") {
            let _ = msg
                .channel_id
                .say(&ctx.http, format!("Mi prefijo aquí es `{prefix}`"))
                .await;
            return;
        }

        let Some(rest) = content.strip_prefix(&prefix) else {
            return;
        };

        let mut parts = rest.trim().splitn(2, char::is_whitespace);
        let Some(name) = parts.next().filter(|name| !name.is_empty()) else {
            return;
        };
        let args = parts.next().unwrap_or("").trim();

        if let Err(err) =
            commands::dispatch(&ctx, &msg, self, guild_id, &prefix, name, args).await
        {
            self.handle_command_error(&ctx, &msg, err).await;
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        // Solo interesa un humano abandonando un canal
        if new.member.as_ref().is_some_and(|m| m.user.bot) {
            return;
        }
        let Some(old) = old else { return };
        let Some(guild_id) = old.guild_id.or(new.guild_id) else {
            return;
        };
        let Some(channel_id) = old.channel_id else {
            return;
        };
        if new.channel_id == Some(channel_id) {
            return;
        }

        // Con la caché: ¿seguimos en ese canal y quedan humanos?
        let bot_id = ctx.cache.current_user().id;
        let (bot_in_channel, humans_left) = {
            let Some(guild) = ctx.cache.guild(guild_id) else {
                return;
            };

            let bot_in_channel = guild
                .voice_states
                .get(&bot_id)
                .and_then(|vs| vs.channel_id)
                == Some(channel_id);

            let humans_left = guild
                .voice_states
                .values()
                .filter(|vs| vs.channel_id == Some(channel_id) && vs.user_id != bot_id)
                .filter(|vs| {
                    guild
                        .members
                        .get(&vs.user_id)
                        .map(|member| !member.user.bot)
                        .unwrap_or(true)
                })
                .count();

            (bot_in_channel, humans_left)
        };

        if bot_in_channel && humans_left == 0 {
            info!("👋 Canal de voz sin humanos en guild {}, desconectando", guild_id);
            if let Err(e) = self.registry.remove(guild_id).await {
                error!("❌ Error al desmontar el reproductor de {}: {}", guild_id, e);
            }
        }
    }
}
