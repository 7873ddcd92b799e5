use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

use crate::audio::{backend::PlaybackEvent, player::PlayerRegistry};

/// Bucle que consume los eventos del nodo y conduce cada cola
///
/// Fin normal, atasco y excepción reciben el mismo trato: repetir la
/// pista si el modo es `one`, avanzar en caso contrario. El avance real
/// queda serializado dentro del mutex de cada reproductor, así que un
/// comando `next` simultáneo nunca produce un doble salto.
pub async fn playback_event_loop(
    registry: Arc<PlayerRegistry>,
    mut events: UnboundedReceiver<PlaybackEvent>,
) {
    while let Some(event) = events.recv().await {
        let guild_id = event.guild_id();

        let Some(player) = registry.get(guild_id) else {
            // Puede pasar si el teardown ganó la carrera al evento
            warn!("🎶 Evento {:?} sin reproductor en guild {}", event, guild_id);
            continue;
        };

        if let PlaybackEvent::TrackStuck { .. } | PlaybackEvent::TrackException { .. } = event {
            warn!("⚠️ El nodo interrumpió la pista en guild {}", guild_id);
        }

        if let Err(e) = player.handle_track_end().await {
            error!("❌ No se pudo avanzar la cola en guild {}: {}", guild_id, e);
        }
    }

    info!("🛑 Canal de eventos del nodo cerrado");
}
