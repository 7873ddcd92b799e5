use serenity::{
    builder::CreateMessage,
    model::{channel::ReactionType, id::ChannelId, user::User},
    prelude::Context,
};
use std::time::Duration;
use tracing::debug;

use crate::{audio::track::Track, ui::embeds};

/// Marcadores de reacción para elegir entre resultados
pub const CHOICE_MARKERS: [&str; 5] = ["1️⃣", "2️⃣", "3️⃣", "4️⃣", "5️⃣"];
/// Máximo de candidatos mostrados en la invitación
pub const MAX_CHOICES: usize = 5;
/// Tiempo de espera de la elección
const CHOICE_TIMEOUT: Duration = Duration::from_secs(60);

/// Posición (base 0) que representa un marcador
pub fn marker_index(emoji: &str) -> Option<usize> {
    CHOICE_MARKERS.iter().position(|marker| *marker == emoji)
}

/// Limpia la consulta del usuario
///
/// Discord envuelve en `<>` los enlaces sin vista previa; el nodo los
/// quiere pelados.
pub fn normalize_query(raw: &str) -> &str {
    raw.trim().trim_matches(|c| c == '<' || c == '>').trim()
}

/// Invita al solicitante a elegir entre varios resultados
///
/// Espera hasta 60 segundos una reacción del propio solicitante sobre
/// el mensaje de la invitación con uno de los marcadores; cualquier
/// otra reacción se ignora y se sigue esperando. El marcador N escoge
/// el candidato N. Al expirar no se elige nada. La invitación se borra
/// en ambos casos.
pub async fn choose_track(
    ctx: &Context,
    channel_id: ChannelId,
    requester: &User,
    candidates: &[Track],
) -> anyhow::Result<Option<Track>> {
    let candidates = &candidates[..candidates.len().min(MAX_CHOICES)];

    let embed = embeds::choose_track_embed(candidates, requester);
    let prompt = channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;

    for marker in &CHOICE_MARKERS[..candidates.len()] {
        prompt
            .react(&ctx.http, ReactionType::Unicode((*marker).to_string()))
            .await?;
    }

    let reaction = prompt
        .await_reaction(&ctx.shard)
        .timeout(CHOICE_TIMEOUT)
        .author_id(requester.id)
        .filter(|reaction| {
            matches!(&reaction.emoji, ReactionType::Unicode(emoji) if marker_index(emoji).is_some())
        })
        .await;

    // La invitación se retira tanto al elegir como al agotar el tiempo
    prompt.delete(&ctx.http).await.ok();

    let Some(reaction) = reaction else {
        debug!("⏳ Elección de pista expirada para {}", requester.id);
        return Ok(None);
    };

    let selected = match &reaction.emoji {
        ReactionType::Unicode(emoji) => {
            marker_index(emoji).and_then(|index| candidates.get(index)).cloned()
        }
        _ => None,
    };

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn markers_map_one_to_one_to_positions() {
        assert_eq!(marker_index("1️⃣"), Some(0));
        assert_eq!(marker_index("2️⃣"), Some(1));
        assert_eq!(marker_index("5️⃣"), Some(4));
        assert_eq!(marker_index("🎵"), None);
    }

    #[test]
    fn queries_lose_their_link_wrappers() {
        assert_eq!(normalize_query("<https://ejemplo.com/cancion>"), "https://ejemplo.com/cancion");
        assert_eq!(normalize_query("  lofi para estudiar "), "lofi para estudiar");
    }
}
