use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
    model::{channel::Message, user::User},
};
use std::time::Duration;

use crate::{
    audio::{player::QueueSnapshot, queue::RepeatMode, track::Track},
    error::MusicError,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Ritmo Bot";

/// Embed para un error tipado del dominio
pub fn error_embed(error: &MusicError) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", error.title()))
        .description(error.to_string())
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed genérico cuando algo revienta de forma inesperada
pub fn unexpected_error_embed() -> CreateEmbed {
    CreateEmbed::default()
        .title("❌ Error")
        .description("Ocurrió un error desconocido y mi desarrollador ya fue notificado.")
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed para la canción en curso
pub fn now_playing_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("🎵 Reproduciendo Ahora")
        .description(format!("**{}**", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.author.clone(), true)
        .field("⏱️ Duración", length_field(track), true);

    if let Some(user_id) = track.requested_by {
        embed = embed.field("👤 Solicitado por", format!("<@{user_id}>"), true);
    }
    if let Some(thumbnail) = &track.artwork_url {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(uri) = &track.uri {
        embed = embed.url(uri);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed para confirmar que se agregó una canción
pub fn track_added_embed(track: &Track) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title("✅ Canción Agregada")
        .description(format!("**{}** se agregó a la cola", track.title))
        .color(colors::SUCCESS_GREEN)
        .field("🎤 Artista", track.author.clone(), true)
        .field("⏱️ Duración", length_field(track), true);

    if let Some(thumbnail) = &track.artwork_url {
        embed = embed.thumbnail(thumbnail);
    }
    if let Some(uri) = &track.uri {
        embed = embed.url(uri);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(
            "🎵 Se reproducirá sola si no hay música sonando",
        ))
}

/// Embed para una playlist completa
pub fn playlist_added_embed(count: usize, name: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("📋 Playlist Agregada")
        .description(format!(
            "Se agregaron **{} canciones** de **{}** a la cola",
            count, name
        ))
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed con la cola de reproducción
pub fn queue_embed(snapshot: &QueueSnapshot, show: usize) -> CreateEmbed {
    let repeat = match snapshot.repeat_mode {
        RepeatMode::None => "desactivada",
        RepeatMode::One => "una pista",
        RepeatMode::All => "toda la cola",
    };

    let mut embed = CreateEmbed::default()
        .title("📜 Cola de Reproducción")
        .description(format!(
            "Mostrando hasta las próximas {} pistas | Repetición: {}",
            show, repeat
        ))
        .color(colors::MUSIC_PURPLE)
        .field(
            "Sonando ahora",
            snapshot
                .current
                .as_ref()
                .map(|t| t.title.clone())
                .unwrap_or_else(|| "Nada por el momento.".to_string()),
            false,
        );

    if !snapshot.upcoming.is_empty() {
        let lines: Vec<String> = snapshot
            .upcoming
            .iter()
            .take(show)
            .enumerate()
            .map(|(i, t)| format!("**{}.** {}", i + 1, t.title))
            .collect();
        embed = embed.field("A continuación", lines.join("\n"), false);
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de elección entre varios resultados de búsqueda
pub fn choose_track_embed(tracks: &[Track], requester: &User) -> CreateEmbed {
    let lines: Vec<String> = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| {
            format!(
                "**{}.** {} ({})",
                i + 1,
                t.title,
                format_duration(t.length)
            )
        })
        .collect();

    CreateEmbed::default()
        .title("🔍 Elige una canción")
        .description(lines.join("\n"))
        .color(colors::INFO_BLUE)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(format!(
            "Pedido por {}",
            requester.name
        )))
}

/// Embed con la letra de una canción
pub fn lyrics_embed(title: &str, author: &str, lyrics: &str, thumbnail: Option<&str>) -> CreateEmbed {
    let mut embed = CreateEmbed::default()
        .title(title.to_string())
        .description(lyrics.to_string())
        .color(colors::INFO_BLUE)
        .field("🎤 Artista", author.to_string(), true);

    if let Some(thumbnail) = thumbnail {
        embed = embed.thumbnail(thumbnail.to_string());
    }

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de ayuda con la lista de comandos
pub fn help_embed(prefix: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("📖 Comandos")
        .color(colors::NEUTRAL_GRAY)
        .field(
            "Reproducción",
            format!(
                "`{p}play <búsqueda|url>` `{p}pause` `{p}stop` `{p}next` \
                 `{p}previous` `{p}seek <tiempo>` `{p}restart` `{p}skipto <n>`",
                p = prefix
            ),
            false,
        )
        .field(
            "Cola",
            format!(
                "`{p}queue [n]` `{p}shuffle` `{p}repeat <none|one|all>`",
                p = prefix
            ),
            false,
        )
        .field(
            "Audio",
            format!(
                "`{p}volume <0-150|up|down>` `{p}eq <preset>` `{p}adveq <banda> <ganancia>`",
                p = prefix
            ),
            false,
        )
        .field(
            "Otros",
            format!(
                "`{p}connect [canal]` `{p}disconnect` `{p}playing` `{p}lyrics [título]` \
                 `{p}prefix <nuevo>`",
                p = prefix
            ),
            false,
        )
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Embed de reporte para el webhook de errores
pub fn command_failure_report(msg: &Message, detail: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title("Error")
        .description(format!("```\n{}\n```", truncated(detail, 3500)))
        .color(colors::ERROR_RED)
        .field("Mensaje", truncated(&msg.content, 1000), false)
        .field(
            "Guild",
            msg.guild_id
                .map(|g| g.to_string())
                .unwrap_or_else(|| "ninguna".to_string()),
            true,
        )
        .field("Usuario", format!("{} ({})", msg.author.name, msg.author.id), true)
        .timestamp(Timestamp::now())
}

fn truncated(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max).collect();
    out.push('…');
    out
}

fn length_field(track: &Track) -> String {
    if track.is_stream {
        "🔴 En vivo".to_string()
    } else {
        format_duration(track.length)
    }
}

/// Formatea una duración como `m:ss` o `h:mm:ss`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn durations_format_like_a_player() {
        assert_eq!(format_duration(Duration::from_secs(0)), "0:00");
        assert_eq!(format_duration(Duration::from_secs(83)), "1:23");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
    }
}
