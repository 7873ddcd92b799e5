use async_trait::async_trait;
use lavalink_rs::{
    client::LavalinkClient,
    hook,
    model::{
        events::{self, TrackEndReason},
        http::UpdatePlayer,
        player::{Equalizer, Filters},
        track::{TrackData, TrackInfo, TrackLoadData},
    },
    node::NodeBuilder,
    prelude::{NodeDistributionStrategy, SearchEngines},
};
use serenity::model::id::{ChannelId, GuildId, UserId};
use songbird::Songbird;
use std::{fmt, sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        backend::{PlaybackBackend, PlaybackEvent, SearchResult, EQ_BANDS},
        track::Track,
    },
    config::Config,
    error::MusicError,
};

/// Adaptador de [`PlaybackBackend`] sobre un nodo Lavalink
///
/// La conexión de voz sale por el gateway vía songbird y se entrega al
/// nodo; los eventos de pista vuelven por un canal para que el bucle de
/// eventos los conduzca a cada reproductor.
pub struct LavalinkBackend {
    client: LavalinkClient,
    songbird: Arc<Songbird>,
}

/// Destino de los hooks del nodo, colgado del cliente
struct EventSink {
    tx: UnboundedSender<PlaybackEvent>,
}

impl LavalinkBackend {
    /// Conecta con el nodo y devuelve el backend junto al canal de eventos
    pub async fn new(
        config: &Config,
        user_id: UserId,
        songbird: Arc<Songbird>,
    ) -> anyhow::Result<(Self, UnboundedReceiver<PlaybackEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let node_events = events::Events {
            ready: Some(node_ready),
            track_end: Some(track_end),
            track_stuck: Some(track_stuck),
            track_exception: Some(track_exception),
            ..Default::default()
        };

        let node = NodeBuilder {
            hostname: format!("{}:{}", config.lavalink_host, config.lavalink_port),
            is_ssl: false,
            events: events::Events::default(),
            password: config.lavalink_password.clone(),
            user_id: user_id.into(),
            session_id: None,
        };

        info!(
            "🎼 Conectando al nodo Lavalink en {}:{}",
            config.lavalink_host, config.lavalink_port
        );

        let client = LavalinkClient::new_with_data(
            node_events,
            vec![node],
            NodeDistributionStrategy::round_robin(),
            Arc::new(EventSink { tx }),
        )
        .await;

        Ok((Self { client, songbird }, rx))
    }
}

#[async_trait]
impl PlaybackBackend for LavalinkBackend {
    async fn search(&self, guild_id: GuildId, query: &str) -> Result<SearchResult, MusicError> {
        // Las URL van tal cual; lo demás se convierte en una búsqueda
        let query = if url::Url::parse(query).is_ok() {
            query.to_string()
        } else {
            SearchEngines::YouTube.to_query(query).map_err(backend_err)?
        };

        let loaded = self
            .client
            .load_tracks(guild_id, &query)
            .await
            .map_err(backend_err)?;

        match loaded.data {
            Some(TrackLoadData::Track(track)) => {
                Ok(SearchResult::Tracks(vec![track_from_data(track)]))
            }
            Some(TrackLoadData::Search(tracks)) => Ok(SearchResult::Tracks(
                tracks.into_iter().map(track_from_data).collect(),
            )),
            Some(TrackLoadData::Playlist(playlist)) => Ok(SearchResult::Playlist {
                name: playlist.info.name,
                tracks: playlist.tracks.into_iter().map(track_from_data).collect(),
            }),
            Some(TrackLoadData::Error(e)) => {
                error!("❌ El nodo no pudo cargar `{}`: {}", query, e.message);
                Err(MusicError::Backend(e.message))
            }
            None => Ok(SearchResult::Tracks(Vec::new())),
        }
    }

    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), MusicError> {
        let (connection_info, _call) = self
            .songbird
            .join_gateway(guild_id, channel_id)
            .await
            .map_err(backend_err)?;

        self.client
            .create_player_context(guild_id, connection_info)
            .await
            .map_err(backend_err)?;

        Ok(())
    }

    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), MusicError> {
        let player = self.player_context(guild_id)?;
        player
            .play_now(&track_to_data(track))
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn stop(&self, guild_id: GuildId) -> Result<(), MusicError> {
        let player = self.player_context(guild_id)?;
        player.stop_now().await.map_err(backend_err)?;
        Ok(())
    }

    async fn set_pause(&self, guild_id: GuildId, pause: bool) -> Result<(), MusicError> {
        let player = self.player_context(guild_id)?;
        player.set_pause(pause).await.map_err(backend_err)?;
        Ok(())
    }

    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), MusicError> {
        let player = self.player_context(guild_id)?;
        player.set_volume(volume).await.map_err(backend_err)?;
        Ok(())
    }

    async fn set_equalizer(
        &self,
        guild_id: GuildId,
        levels: [f32; EQ_BANDS],
    ) -> Result<(), MusicError> {
        let bands = levels
            .iter()
            .enumerate()
            .map(|(band, gain)| Equalizer {
                band: band as u8,
                gain: f64::from(*gain),
            })
            .collect();

        let update = UpdatePlayer {
            filters: Some(Filters {
                equalizer: Some(bands),
                ..Default::default()
            }),
            ..Default::default()
        };

        let player = self.player_context(guild_id)?;
        player
            .update_player(&update, true)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), MusicError> {
        let update = UpdatePlayer {
            position: Some(position_ms),
            ..Default::default()
        };

        let player = self.player_context(guild_id)?;
        player
            .update_player(&update, true)
            .await
            .map_err(backend_err)?;
        Ok(())
    }

    async fn disconnect(&self, guild_id: GuildId) -> Result<(), MusicError> {
        // El nodo puede no tener ya la sesión; cuenta como desconectado
        if let Err(e) = self.client.delete_player(guild_id).await {
            debug!("delete_player ignorado en guild {}: {}", guild_id, e);
        }

        match self.songbird.remove(guild_id).await {
            Ok(()) | Err(songbird::error::JoinError::NoCall) => Ok(()),
            Err(e) => Err(backend_err(e)),
        }
    }
}

impl LavalinkBackend {
    fn player_context(
        &self,
        guild_id: GuildId,
    ) -> Result<lavalink_rs::player_context::PlayerContext, MusicError> {
        self.client
            .get_player_context(guild_id)
            .ok_or_else(|| MusicError::Backend("sin sesión de voz en el nodo".to_string()))
    }
}

fn backend_err(e: impl fmt::Display) -> MusicError {
    MusicError::Backend(e.to_string())
}

fn track_from_data(data: TrackData) -> Track {
    Track {
        encoded: data.encoded,
        identifier: data.info.identifier,
        title: data.info.title,
        author: data.info.author,
        length: Duration::from_millis(data.info.length),
        is_stream: data.info.is_stream,
        uri: data.info.uri,
        artwork_url: data.info.artwork_url,
        requested_by: None,
    }
}

fn track_to_data(track: &Track) -> TrackData {
    TrackData {
        encoded: track.encoded.clone(),
        info: TrackInfo {
            identifier: track.identifier.clone(),
            is_seekable: !track.is_stream,
            author: track.author.clone(),
            length: track.length.as_millis() as u64,
            is_stream: track.is_stream,
            position: 0,
            title: track.title.clone(),
            uri: track.uri.clone(),
            artwork_url: track.artwork_url.clone(),
            isrc: None,
            source_name: String::new(),
        },
        plugin_info: None,
        user_data: None,
    }
}

fn forward(client: &LavalinkClient, event: PlaybackEvent) {
    match client.data::<EventSink>() {
        Ok(sink) => {
            if sink.tx.send(event).is_err() {
                warn!("🎶 Bucle de eventos cerrado, evento descartado: {:?}", event);
            }
        }
        Err(e) => error!("❌ Hook sin acceso al canal de eventos: {}", e),
    }
}

#[hook]
async fn node_ready(_client: LavalinkClient, session_id: String, event: &events::Ready) {
    info!(
        "🎶 Nodo Lavalink listo (sesión {}, reanudado: {})",
        session_id, event.resumed
    );
}

#[hook]
async fn track_end(client: LavalinkClient, _session_id: String, event: &events::TrackEnd) {
    // Replaced/Cleanup llegan al sustituir la pista en curso; avanzar
    // ahí duplicaría el salto
    if matches!(event.reason, TrackEndReason::Replaced | TrackEndReason::Cleanup) {
        return;
    }

    forward(
        &client,
        PlaybackEvent::TrackEnd {
            guild_id: GuildId::new(event.guild_id.0),
        },
    );
}

#[hook]
async fn track_stuck(client: LavalinkClient, _session_id: String, event: &events::TrackStuck) {
    warn!(
        "⚠️ Pista atascada en guild {}: {}",
        event.guild_id.0, event.track.info.title
    );
    forward(
        &client,
        PlaybackEvent::TrackStuck {
            guild_id: GuildId::new(event.guild_id.0),
        },
    );
}

#[hook]
async fn track_exception(
    client: LavalinkClient,
    _session_id: String,
    event: &events::TrackException,
) {
    warn!(
        "⚠️ Excepción de pista en guild {}: {:?}",
        event.guild_id.0, event.exception.message
    );
    forward(
        &client,
        PlaybackEvent::TrackException {
            guild_id: GuildId::new(event.guild_id.0),
        },
    );
}
