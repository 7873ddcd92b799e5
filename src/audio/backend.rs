use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};

use crate::{audio::track::Track, error::MusicError};

/// Número de bandas del ecualizador del nodo
pub const EQ_BANDS: usize = 15;

/// Resultado de una búsqueda en el nodo de audio
#[derive(Debug, Clone)]
pub enum SearchResult {
    /// Pistas sueltas: una URL directa o resultados de búsqueda
    Tracks(Vec<Track>),
    /// Lista de reproducción completa
    Playlist { name: String, tracks: Vec<Track> },
}

impl SearchResult {
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Tracks(tracks) => tracks.is_empty(),
            Self::Playlist { tracks, .. } => tracks.is_empty(),
        }
    }
}

/// Eventos asíncronos que el nodo emite sobre la pista en curso
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEvent {
    TrackEnd { guild_id: GuildId },
    TrackStuck { guild_id: GuildId },
    TrackException { guild_id: GuildId },
}

impl PlaybackEvent {
    pub fn guild_id(&self) -> GuildId {
        match self {
            Self::TrackEnd { guild_id }
            | Self::TrackStuck { guild_id }
            | Self::TrackException { guild_id } => *guild_id,
        }
    }
}

/// Capacidades del nodo de audio externo
///
/// El reproductor guarda una referencia a esta interfaz y nunca al
/// cliente concreto. Los fallos del nodo no se reintentan: suben como
/// `MusicError::Backend` y terminan el intento de reproducción actual.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Resuelve una consulta o URL a pistas del nodo
    async fn search(&self, guild_id: GuildId, query: &str) -> Result<SearchResult, MusicError>;

    /// Abre la sesión de voz del servidor en el canal indicado
    async fn connect(&self, guild_id: GuildId, channel_id: ChannelId) -> Result<(), MusicError>;

    /// Reproduce la pista de inmediato, sustituyendo la actual
    async fn play(&self, guild_id: GuildId, track: &Track) -> Result<(), MusicError>;

    /// Detiene la pista actual sin tocar la sesión de voz
    async fn stop(&self, guild_id: GuildId) -> Result<(), MusicError>;

    async fn set_pause(&self, guild_id: GuildId, pause: bool) -> Result<(), MusicError>;

    /// Volumen en porcentaje
    async fn set_volume(&self, guild_id: GuildId, volume: u16) -> Result<(), MusicError>;

    /// Ganancias por banda en el rango [-1.0, 1.0]
    async fn set_equalizer(
        &self,
        guild_id: GuildId,
        levels: [f32; EQ_BANDS],
    ) -> Result<(), MusicError>;

    async fn seek(&self, guild_id: GuildId, position_ms: u64) -> Result<(), MusicError>;

    /// Cierra la sesión de voz; la ausencia de sesión no es un error
    async fn disconnect(&self, guild_id: GuildId) -> Result<(), MusicError>;
}
