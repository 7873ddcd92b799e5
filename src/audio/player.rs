use dashmap::DashMap;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    audio::{
        backend::{PlaybackBackend, EQ_BANDS},
        queue::{RepeatMode, TrackQueue},
        track::Track,
    },
    error::MusicError,
};

/// Volumen máximo permitido en porcentaje
pub const MAX_VOLUME: u16 = 150;
/// Volumen inicial de cada reproductor
pub const DEFAULT_VOLUME: u16 = 100;

/// Estado mutable del reproductor, siempre detrás del mutex
///
/// El mutex se retiene incluso durante las llamadas al nodo: así un
/// comando de usuario y un callback de fin de pista nunca avanzan la
/// misma cola a la vez, y el cursor puede revertirse si `play` falla.
struct PlayerState {
    queue: TrackQueue,
    channel_id: Option<ChannelId>,
    playing: bool,
    paused: bool,
    volume: u16,
    eq_levels: [f32; EQ_BANDS],
}

impl PlayerState {
    fn new() -> Self {
        Self {
            queue: TrackQueue::new(),
            channel_id: None,
            playing: false,
            paused: false,
            volume: DEFAULT_VOLUME,
            eq_levels: [0.0; EQ_BANDS],
        }
    }
}

/// Instantánea de la cola para la capa de comandos
#[derive(Debug, Clone)]
pub struct QueueSnapshot {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
    pub history_len: usize,
    pub length: usize,
    pub position: isize,
    pub repeat_mode: RepeatMode,
    pub playing: bool,
    pub paused: bool,
    pub volume: u16,
    pub connected_to: Option<ChannelId>,
}

/// Resultado de un alta de pistas
#[derive(Debug, Clone, Copy)]
pub struct AddOutcome {
    pub added: usize,
    pub started: bool,
}

/// Reproductor de un servidor
///
/// Media entre los comandos, la cola propia y el nodo de audio. Existe
/// a lo sumo una instancia viva por servidor, garantizado por el
/// [`PlayerRegistry`].
pub struct Player {
    guild_id: GuildId,
    backend: Arc<dyn PlaybackBackend>,
    state: Mutex<PlayerState>,
}

impl Player {
    pub fn new(guild_id: GuildId, backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            guild_id,
            backend,
            state: Mutex::new(PlayerState::new()),
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// Conecta al canal indicado
    ///
    /// El canal llega ya resuelto por la capa de comandos; sin canal no
    /// hay a dónde conectarse.
    pub async fn connect(&self, channel: Option<ChannelId>) -> Result<ChannelId, MusicError> {
        let mut state = self.state.lock().await;
        if state.channel_id.is_some() {
            return Err(MusicError::AlreadyConnected);
        }
        let channel = channel.ok_or(MusicError::NoVoiceChannel)?;

        self.backend.connect(self.guild_id, channel).await?;
        state.channel_id = Some(channel);
        info!("🔊 Conectado al canal {} en guild {}", channel, self.guild_id);
        Ok(channel)
    }

    /// Desconecta y descarta todo el estado; seguro de llamar dos veces
    pub async fn teardown(&self) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        state.queue.empty();
        state.playing = false;
        state.paused = false;
        state.channel_id = None;

        // El nodo puede no conocer ya la sesión; eso cuenta como hecho
        if let Err(e) = self.backend.disconnect(self.guild_id).await {
            debug!("Desconexión ignorada en guild {}: {}", self.guild_id, e);
        }
        Ok(())
    }

    /// Encola pistas y arranca la reproducción si no sonaba nada
    pub async fn add_tracks(&self, tracks: Vec<Track>) -> Result<AddOutcome, MusicError> {
        if tracks.is_empty() {
            return Err(MusicError::NoTracksFound);
        }

        let mut state = self.state.lock().await;
        let added = tracks.len();
        state.queue.add(tracks);

        let mut started = false;
        if !state.playing {
            started = self.start_locked(&mut state).await?;
        }

        Ok(AddOutcome { added, started })
    }

    /// Arranca la reproducción avanzando a la siguiente pista sin sonar
    pub async fn start_playback(&self) -> Result<bool, MusicError> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await
    }

    /// Avanza la cola; quedarse sin pistas no es un error
    pub async fn advance(&self) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        self.start_locked(&mut state).await.map(|_| ())
    }

    /// Vuelve a sonar la pista actual sin mover el cursor
    pub async fn repeat_track(&self) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        let Some(track) = state.queue.current_track().cloned() else {
            state.playing = false;
            return Ok(());
        };

        match self.backend.play(self.guild_id, &track).await {
            Ok(()) => {
                state.playing = true;
                state.paused = false;
                debug!("🔂 Repitiendo {} en guild {}", track.title, self.guild_id);
                Ok(())
            }
            Err(e) => {
                state.playing = false;
                Err(e)
            }
        }
    }

    /// Callback de fin de pista del nodo (fin, atasco o excepción)
    pub async fn handle_track_end(&self) -> Result<(), MusicError> {
        let repeat_one = {
            let state = self.state.lock().await;
            state.queue.repeat_mode() == RepeatMode::One
        };

        if repeat_one {
            self.repeat_track().await
        } else {
            self.advance().await
        }
    }

    /// Detiene la pista actual; el callback de fin hará el avance
    pub async fn stop(&self) -> Result<(), MusicError> {
        self.backend.stop(self.guild_id).await
    }

    /// Vacía la cola sin tocar la sesión de voz
    pub async fn clear_queue(&self) {
        let mut state = self.state.lock().await;
        state.queue.empty();
    }

    pub async fn set_pause(&self, pause: bool) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        if pause && state.paused {
            return Err(MusicError::AlreadyPaused);
        }
        self.backend.set_pause(self.guild_id, pause).await?;
        state.paused = pause;
        Ok(())
    }

    pub async fn set_volume(&self, volume: u16) -> Result<(), MusicError> {
        if volume > MAX_VOLUME {
            return Err(MusicError::VolumeOutOfRange);
        }
        let mut state = self.state.lock().await;
        self.backend.set_volume(self.guild_id, volume).await?;
        state.volume = volume;
        Ok(())
    }

    pub async fn volume(&self) -> u16 {
        self.state.lock().await.volume
    }

    /// Ajusta una banda (base 0) con la ganancia cruda en [-10, 10]
    ///
    /// La ganancia se guarda escalada a décimas, el rango que entiende
    /// el nodo.
    pub async fn set_eq_band(
        &self,
        band: usize,
        gain: f32,
    ) -> Result<[f32; EQ_BANDS], MusicError> {
        if band >= EQ_BANDS {
            return Err(MusicError::EqBandOutOfRange);
        }
        if gain.abs() > 10.0 {
            return Err(MusicError::EqGainOutOfRange);
        }

        let mut state = self.state.lock().await;
        let mut levels = state.eq_levels;
        levels[band] = gain / 10.0;
        self.backend.set_equalizer(self.guild_id, levels).await?;
        state.eq_levels = levels;
        Ok(levels)
    }

    /// Aplica un juego completo de ganancias (presets)
    pub async fn set_eq_levels(&self, levels: [f32; EQ_BANDS]) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        self.backend.set_equalizer(self.guild_id, levels).await?;
        state.eq_levels = levels;
        Ok(())
    }

    pub async fn seek(&self, position_ms: u64) -> Result<(), MusicError> {
        self.backend.seek(self.guild_id, position_ms).await
    }

    pub async fn shuffle(&self) -> Result<(), MusicError> {
        let mut state = self.state.lock().await;
        state.queue.shuffle()
    }

    pub async fn set_repeat_mode(&self, mode: RepeatMode) {
        let mut state = self.state.lock().await;
        state.queue.set_repeat_mode(mode);
    }

    /// Coloca el cursor justo antes de la pista deseada, para `stop`
    pub async fn set_cursor(&self, position: isize) {
        let mut state = self.state.lock().await;
        state.queue.set_position(position);
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.channel_id.is_some()
    }

    pub async fn snapshot(&self) -> QueueSnapshot {
        let state = self.state.lock().await;
        QueueSnapshot {
            current: state.queue.current_track().cloned(),
            upcoming: state.queue.upcoming().to_vec(),
            history_len: state.queue.history().len(),
            length: state.queue.len(),
            position: state.queue.position(),
            repeat_mode: state.queue.repeat_mode(),
            playing: state.playing,
            paused: state.paused,
            volume: state.volume,
            connected_to: state.channel_id,
        }
    }

    /// Avanza el cursor y reproduce lo que toque
    ///
    /// Si el nodo rechaza `play`, el cursor vuelve a donde estaba para
    /// no perder la pista fallida del frente de la cola.
    async fn start_locked(&self, state: &mut PlayerState) -> Result<bool, MusicError> {
        let previous = state.queue.position();
        let track = match state.queue.get_next_track() {
            Ok(track) => track.clone(),
            Err(MusicError::QueueEmpty) | Err(MusicError::NoMoreTracks) => {
                state.playing = false;
                state.paused = false;
                debug!("📭 Cola agotada en guild {}", self.guild_id);
                return Ok(false);
            }
            Err(e) => return Err(e),
        };

        match self.backend.play(self.guild_id, &track).await {
            Ok(()) => {
                state.playing = true;
                state.paused = false;
                info!("▶️ Reproduciendo {} en guild {}", track.title, self.guild_id);
                Ok(true)
            }
            Err(e) => {
                state.queue.set_position(previous);
                state.playing = false;
                Err(e)
            }
        }
    }
}

/// Registro global de reproductores, uno por servidor
///
/// La creación pasa por la entry API de DashMap, así dos primeros
/// accesos concurrentes nunca fabrican dos reproductores.
pub struct PlayerRegistry {
    players: DashMap<GuildId, Arc<Player>>,
    backend: Arc<dyn PlaybackBackend>,
}

impl PlayerRegistry {
    pub fn new(backend: Arc<dyn PlaybackBackend>) -> Self {
        Self {
            players: DashMap::new(),
            backend,
        }
    }

    /// Devuelve el reproductor del servidor, creándolo si hace falta
    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<Player> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| Arc::new(Player::new(guild_id, self.backend.clone())))
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<Player>> {
        self.players.get(&guild_id).map(|p| p.clone())
    }

    /// Retira el reproductor y lo desmonta; sin reproductor es un no-op
    pub async fn remove(&self, guild_id: GuildId) -> Result<(), MusicError> {
        if let Some((_, player)) = self.players.remove(&guild_id) {
            player.teardown().await?;
            info!("🗑️ Reproductor retirado para guild {}", guild_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::MockPlaybackBackend;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn track(id: &str) -> Track {
        Track {
            encoded: format!("enc:{id}"),
            identifier: id.to_string(),
            title: format!("Pista {id}"),
            author: "Autor".to_string(),
            length: Duration::from_secs(180),
            is_stream: false,
            uri: None,
            artwork_url: None,
            requested_by: None,
        }
    }

    fn player_with(mock: MockPlaybackBackend) -> Player {
        Player::new(GuildId::new(1), Arc::new(mock))
    }

    #[tokio::test]
    async fn first_add_starts_playback_on_first_track() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_play()
            .times(1)
            .withf(|_, track| track.identifier == "a")
            .returning(|_, _| Ok(()));

        let player = player_with(mock);
        let outcome = player.add_tracks(vec![track("a"), track("b")]).await.unwrap();

        assert_eq!(outcome.added, 2);
        assert!(outcome.started);
        let snapshot = player.snapshot().await;
        assert!(snapshot.playing);
        assert_eq!(snapshot.position, 0);
        assert_eq!(snapshot.current.unwrap().identifier, "a");
    }

    #[tokio::test]
    async fn add_with_no_tracks_is_rejected() {
        let player = player_with(MockPlaybackBackend::new());
        let err = player.add_tracks(Vec::new()).await.unwrap_err();
        assert!(matches!(err, MusicError::NoTracksFound));
    }

    #[tokio::test]
    async fn add_while_playing_does_not_restart() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_play().times(1).returning(|_, _| Ok(()));

        let player = player_with(mock);
        player.add_tracks(vec![track("a")]).await.unwrap();
        let outcome = player.add_tracks(vec![track("b")]).await.unwrap();

        assert!(!outcome.started);
        assert_eq!(player.snapshot().await.position, 0);
    }

    #[tokio::test]
    async fn track_end_with_repeat_one_replays_current() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_play()
            .times(2)
            .withf(|_, track| track.identifier == "a")
            .returning(|_, _| Ok(()));

        let player = player_with(mock);
        player.add_tracks(vec![track("a"), track("b")]).await.unwrap();
        player.set_repeat_mode(RepeatMode::One).await;
        player.handle_track_end().await.unwrap();

        assert_eq!(player.snapshot().await.position, 0);
    }

    #[tokio::test]
    async fn track_end_at_tail_just_stops() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_play().times(1).returning(|_, _| Ok(()));

        let player = player_with(mock);
        player.add_tracks(vec![track("a")]).await.unwrap();
        player.handle_track_end().await.unwrap();

        let snapshot = player.snapshot().await;
        assert!(!snapshot.playing);
        assert_eq!(snapshot.position, 0);
    }

    #[tokio::test]
    async fn track_end_with_repeat_all_wraps_around() {
        let mut mock = MockPlaybackBackend::new();
        let played = Arc::new(std::sync::Mutex::new(Vec::new()));
        let seen = played.clone();
        mock.expect_play().times(3).returning(move |_, track| {
            seen.lock().unwrap().push(track.identifier.clone());
            Ok(())
        });

        let player = player_with(mock);
        player.add_tracks(vec![track("a"), track("b")]).await.unwrap();
        player.set_repeat_mode(RepeatMode::All).await;
        player.handle_track_end().await.unwrap();
        player.handle_track_end().await.unwrap();

        assert_eq!(*played.lock().unwrap(), vec!["a", "b", "a"]);
        assert_eq!(player.snapshot().await.position, 0);
    }

    #[tokio::test]
    async fn failed_play_rolls_the_cursor_back() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_play()
            .times(1)
            .returning(|_, _| Err(MusicError::Backend("nodo caído".to_string())));

        let player = player_with(mock);
        let err = player.add_tracks(vec![track("a")]).await.unwrap_err();

        assert!(matches!(err, MusicError::Backend(_)));
        let snapshot = player.snapshot().await;
        assert_eq!(snapshot.position, -1);
        assert!(!snapshot.playing);
    }

    #[tokio::test]
    async fn volume_out_of_range_never_reaches_the_backend() {
        let player = player_with(MockPlaybackBackend::new());
        let err = player.set_volume(151).await.unwrap_err();
        assert!(matches!(err, MusicError::VolumeOutOfRange));
    }

    #[tokio::test]
    async fn eq_validation_rejects_bad_band_and_gain() {
        let player = player_with(MockPlaybackBackend::new());
        assert!(matches!(
            player.set_eq_band(15, 1.0).await.unwrap_err(),
            MusicError::EqBandOutOfRange
        ));
        assert!(matches!(
            player.set_eq_band(0, 10.5).await.unwrap_err(),
            MusicError::EqGainOutOfRange
        ));
    }

    #[tokio::test]
    async fn eq_band_scales_gain_to_tenths() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_set_equalizer()
            .times(1)
            .withf(|_, levels| (levels[3] - 0.5).abs() < f32::EPSILON)
            .returning(|_, _| Ok(()));

        let player = player_with(mock);
        let levels = player.set_eq_band(3, 5.0).await.unwrap();
        assert_eq!(levels[3], 0.5);
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_connect().times(1).returning(|_, _| Ok(()));

        let player = player_with(mock);
        player.connect(Some(ChannelId::new(7))).await.unwrap();
        let err = player.connect(Some(ChannelId::new(7))).await.unwrap_err();
        assert!(matches!(err, MusicError::AlreadyConnected));
    }

    #[tokio::test]
    async fn connect_without_channel_is_rejected() {
        let player = player_with(MockPlaybackBackend::new());
        let err = player.connect(None).await.unwrap_err();
        assert!(matches!(err, MusicError::NoVoiceChannel));
    }

    #[tokio::test]
    async fn teardown_twice_succeeds_even_if_the_node_forgot_us() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_connect().times(1).returning(|_, _| Ok(()));
        let mut calls = 0u32;
        mock.expect_disconnect().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(MusicError::Backend("sesión desconocida".to_string()))
            }
        });

        let player = player_with(mock);
        player.connect(Some(ChannelId::new(7))).await.unwrap();
        player.teardown().await.unwrap();
        player.teardown().await.unwrap();

        let snapshot = player.snapshot().await;
        assert!(snapshot.connected_to.is_none());
        assert_eq!(snapshot.length, 0);
    }

    #[tokio::test]
    async fn pause_twice_is_rejected() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_set_pause().times(1).returning(|_, _| Ok(()));

        let player = player_with(mock);
        player.set_pause(true).await.unwrap();
        let err = player.set_pause(true).await.unwrap_err();
        assert!(matches!(err, MusicError::AlreadyPaused));
    }

    #[tokio::test]
    async fn registry_returns_the_same_player_per_guild() {
        let backend: Arc<dyn PlaybackBackend> = Arc::new(MockPlaybackBackend::new());
        let registry = PlayerRegistry::new(backend);

        let first = registry.get_or_create(GuildId::new(9));
        let second = registry.get_or_create(GuildId::new(9));
        assert!(Arc::ptr_eq(&first, &second));

        let other = registry.get_or_create(GuildId::new(10));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn registry_remove_is_idempotent() {
        let mut mock = MockPlaybackBackend::new();
        mock.expect_disconnect().returning(|_| Ok(()));
        let registry = PlayerRegistry::new(Arc::new(mock));

        registry.get_or_create(GuildId::new(9));
        registry.remove(GuildId::new(9)).await.unwrap();
        registry.remove(GuildId::new(9)).await.unwrap();
        assert!(registry.get(GuildId::new(9)).is_none());
    }
}
