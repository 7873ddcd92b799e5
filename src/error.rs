use thiserror::Error;

/// Errores tipados del dominio musical
///
/// Todos son recuperables: la capa de comandos los convierte en un embed
/// de respuesta y el proceso sigue corriendo. El núcleo nunca redacta
/// mensajes hacia el usuario por su cuenta.
#[derive(Debug, Error)]
pub enum MusicError {
    #[error("La cola está vacía.")]
    QueueEmpty,

    #[error("No quedan más pistas en la cola.")]
    NoMoreTracks,

    #[error("No hay pistas anteriores en el historial.")]
    NoPreviousTracks,

    #[error("No se encontraron pistas para esa búsqueda.")]
    NoTracksFound,

    #[error("El modo de repetición debe ser `none`, `one` o `all`.")]
    InvalidRepeatMode,

    #[error("Ya estoy conectado a un canal de voz.")]
    AlreadyConnected,

    #[error("No hay canal de voz al que conectarse.")]
    NoVoiceChannel,

    #[error("El volumen debe estar entre 0 y 150.")]
    VolumeOutOfRange,

    #[error("Esa banda del ecualizador no existe.")]
    EqBandOutOfRange,

    #[error("La ganancia debe estar entre -10 y 10.")]
    EqGainOutOfRange,

    #[error("La reproducción ya está pausada.")]
    AlreadyPaused,

    #[error("El volumen ya está al máximo (150%).")]
    MaxVolume,

    #[error("El volumen ya está al mínimo (0%).")]
    MinVolume,

    #[error("No entiendo esa marca de tiempo. Usa `1:30`, `90s` o `2m`.")]
    InvalidTimeString,

    #[error("Ese preset de ecualizador no existe.")]
    InvalidEqPreset,

    #[error("No encontré la letra de esa canción.")]
    NoLyricsFound,

    #[error("El nodo de audio falló: {0}")]
    Backend(String),
}

impl MusicError {
    /// Título corto para el embed de error
    pub fn title(&self) -> &'static str {
        match self {
            Self::QueueEmpty => "Cola vacía",
            Self::NoMoreTracks => "Sin más pistas",
            Self::NoPreviousTracks => "Sin historial",
            Self::NoTracksFound => "Sin resultados",
            Self::InvalidRepeatMode => "Modo de repetición inválido",
            Self::AlreadyConnected => "Ya conectado",
            Self::NoVoiceChannel => "Sin canal de voz",
            Self::VolumeOutOfRange => "Volumen fuera de rango",
            Self::EqBandOutOfRange => "Banda inexistente",
            Self::EqGainOutOfRange => "Ganancia fuera de rango",
            Self::AlreadyPaused => "Ya en pausa",
            Self::MaxVolume => "Volumen al máximo",
            Self::MinVolume => "Volumen al mínimo",
            Self::InvalidTimeString => "Tiempo inválido",
            Self::InvalidEqPreset => "Preset inválido",
            Self::NoLyricsFound => "Sin letra",
            Self::Backend(_) => "Fallo del nodo de audio",
        }
    }
}
