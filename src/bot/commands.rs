use regex::Regex;
use serenity::{
    builder::CreateMessage,
    model::{
        channel::Message,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use std::sync::{Arc, LazyLock};

use crate::{
    audio::{
        backend::{SearchResult, EQ_BANDS},
        player::{Player, MAX_VOLUME},
        queue::RepeatMode,
        track::Track,
    },
    bot::{search, RitmoBot},
    error::MusicError,
    ui::embeds,
};

/// API de letras; responde JSON con `lyrics`, `title`, `author` y enlaces
const LYRICS_URL: &str = "https://some-random-api.ml/lyrics?title=";

/// Frecuencias centrales aceptadas como alias de banda en `adveq`
const HZ_BANDS: [i64; EQ_BANDS] = [
    20, 40, 63, 100, 150, 250, 400, 450, 630, 1000, 1600, 2500, 4000, 10000, 16000,
];

/// Enruta un comando ya parseado a su manejador
pub async fn dispatch(
    ctx: &Context,
    msg: &Message,
    bot: &RitmoBot,
    guild_id: GuildId,
    prefix: &str,
    name: &str,
    args: &str,
) -> anyhow::Result<()> {
    let player = bot.registry.get_or_create(guild_id);

    match name {
        "connect" | "join" => connect(ctx, msg, guild_id, &player, args).await,
        "disconnect" | "leave" => disconnect(ctx, msg, bot, guild_id).await,
        "play" | "p" => play(ctx, msg, bot, guild_id, &player, args).await,
        "pause" => pause(ctx, msg, &player).await,
        "stop" => stop(ctx, msg, &player).await,
        "next" | "skip" => next(ctx, msg, &player).await,
        "previous" => previous(ctx, msg, &player).await,
        "shuffle" => shuffle(ctx, msg, &player).await,
        "repeat" => repeat(ctx, msg, &player, args).await,
        "queue" => queue(ctx, msg, &player, args).await,
        "volume" => volume(ctx, msg, &player, args).await,
        "lyrics" => lyrics(ctx, msg, bot, &player, args).await,
        "eq" => eq(ctx, msg, &player, args).await,
        "adveq" | "aeq" => adveq(ctx, msg, &player, args).await,
        "playing" | "np" => playing(ctx, msg, &player).await,
        "skipto" | "playindex" => skipto(ctx, msg, &player, args).await,
        "restart" => restart(ctx, msg, &player).await,
        "seek" => seek(ctx, msg, &player, args).await,
        "prefix" => set_prefix(ctx, msg, bot, guild_id, args).await,
        "help" => help(ctx, msg, prefix).await,
        // Comando desconocido: silencio, igual que un mensaje normal
        _ => Ok(()),
    }
}

// Conexión de voz

async fn connect(
    ctx: &Context,
    msg: &Message,
    guild_id: GuildId,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    // El canal del solicitante manda; el argumento es el repuesto
    let target =
        author_voice_channel(ctx, guild_id, msg.author.id).or_else(|| parse_channel_arg(args));
    let channel = player.connect(target).await?;

    msg.channel_id
        .say(&ctx.http, format!("🔊 Conectado a <#{channel}>."))
        .await?;
    Ok(())
}

async fn disconnect(
    ctx: &Context,
    msg: &Message,
    bot: &RitmoBot,
    guild_id: GuildId,
) -> anyhow::Result<()> {
    bot.registry.remove(guild_id).await?;
    msg.channel_id.say(&ctx.http, "👋 Desconectado.").await?;
    Ok(())
}

// Reproducción

async fn play(
    ctx: &Context,
    msg: &Message,
    bot: &RitmoBot,
    guild_id: GuildId,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    if !player.is_connected().await {
        let target = author_voice_channel(ctx, guild_id, msg.author.id);
        player.connect(target).await?;
    }

    if args.is_empty() {
        // Sin consulta: reanudar lo que estuviera pausado
        let snapshot = player.snapshot().await;
        if snapshot.length == 0 {
            return Err(MusicError::QueueEmpty.into());
        }
        player.set_pause(false).await?;
        msg.channel_id
            .say(&ctx.http, "▶️ Reproducción reanudada.")
            .await?;
        return Ok(());
    }

    let query = search::normalize_query(args);
    let result = bot.backend.search(guild_id, query).await?;

    match result {
        SearchResult::Playlist { name, tracks } => {
            let tracks: Vec<Track> = tracks
                .into_iter()
                .map(|t| t.with_requester(msg.author.id))
                .collect();
            let outcome = player.add_tracks(tracks).await?;
            msg.channel_id
                .send_message(
                    &ctx.http,
                    CreateMessage::new().embed(embeds::playlist_added_embed(outcome.added, &name)),
                )
                .await?;
        }
        SearchResult::Tracks(tracks) if tracks.len() > 1 => {
            let candidates: Vec<Track> = tracks
                .into_iter()
                .map(|t| t.with_requester(msg.author.id))
                .collect();

            // Si la invitación expira no se encola nada
            if let Some(track) =
                search::choose_track(ctx, msg.channel_id, &msg.author, &candidates).await?
            {
                let embed = embeds::track_added_embed(&track);
                player.add_tracks(vec![track]).await?;
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await?;
            }
        }
        SearchResult::Tracks(tracks) => {
            // Cero o una pista; con cero, add_tracks responde NoTracksFound
            let tracks: Vec<Track> = tracks
                .into_iter()
                .map(|t| t.with_requester(msg.author.id))
                .collect();
            let embed = tracks.first().map(embeds::track_added_embed);
            player.add_tracks(tracks).await?;
            if let Some(embed) = embed {
                msg.channel_id
                    .send_message(&ctx.http, CreateMessage::new().embed(embed))
                    .await?;
            }
        }
    }

    Ok(())
}

async fn pause(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    player.set_pause(true).await?;
    msg.channel_id
        .say(&ctx.http, "⏸️ Reproducción pausada.")
        .await?;
    Ok(())
}

async fn stop(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    player.clear_queue().await;
    player.stop().await?;
    msg.channel_id
        .say(&ctx.http, "⏹️ Reproducción detenida.")
        .await?;
    Ok(())
}

async fn next(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    let snapshot = player.snapshot().await;
    if snapshot.upcoming.is_empty() {
        return Err(MusicError::NoMoreTracks.into());
    }

    // El callback de fin de pista hace el avance real
    player.stop().await?;
    msg.channel_id
        .say(&ctx.http, "⏭️ Saltando a la siguiente pista.")
        .await?;
    Ok(())
}

async fn previous(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    let snapshot = player.snapshot().await;
    if snapshot.history_len == 0 {
        return Err(MusicError::NoPreviousTracks.into());
    }

    player.set_cursor(snapshot.position - 2).await;
    player.stop().await?;
    msg.channel_id
        .say(&ctx.http, "⏮️ Volviendo a la pista anterior.")
        .await?;
    Ok(())
}

// Cola

async fn shuffle(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    player.shuffle().await?;
    msg.channel_id.say(&ctx.http, "🔀 Cola mezclada.").await?;
    Ok(())
}

async fn repeat(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let token = args.split_whitespace().next().unwrap_or("");
    let mode = RepeatMode::parse(token)?;
    player.set_repeat_mode(mode).await;

    msg.channel_id
        .say(&ctx.http, format!("🔁 Modo de repetición: `{token}`."))
        .await?;
    Ok(())
}

async fn queue(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let show = args
        .split_whitespace()
        .next()
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(10);

    let snapshot = player.snapshot().await;
    if snapshot.length == 0 {
        return Err(MusicError::QueueEmpty.into());
    }

    msg.channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new().embed(embeds::queue_embed(&snapshot, show)),
        )
        .await?;
    Ok(())
}

// Audio

async fn volume(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let arg = args.split_whitespace().next().unwrap_or("");

    match arg {
        "up" => {
            let current = player.volume().await;
            if current == MAX_VOLUME {
                return Err(MusicError::MaxVolume.into());
            }
            let value = (current + 10).min(MAX_VOLUME);
            player.set_volume(value).await?;
            msg.channel_id
                .say(&ctx.http, format!("🔊 Volumen al {value}%."))
                .await?;
        }
        "down" => {
            let current = player.volume().await;
            if current == 0 {
                return Err(MusicError::MinVolume.into());
            }
            let value = current.saturating_sub(10);
            player.set_volume(value).await?;
            msg.channel_id
                .say(&ctx.http, format!("🔉 Volumen al {value}%."))
                .await?;
        }
        _ => {
            let Ok(value) = arg.parse::<i64>() else {
                msg.channel_id
                    .say(&ctx.http, "Uso: `volume <0-150|up|down>`.")
                    .await?;
                return Ok(());
            };
            if !(0..=i64::from(MAX_VOLUME)).contains(&value) {
                return Err(MusicError::VolumeOutOfRange.into());
            }
            player.set_volume(value as u16).await?;
            msg.channel_id
                .say(&ctx.http, format!("🔊 Volumen al {value}%."))
                .await?;
        }
    }

    Ok(())
}

async fn eq(ctx: &Context, msg: &Message, player: &Arc<Player>, args: &str) -> anyhow::Result<()> {
    let preset = args.split_whitespace().next().unwrap_or("");
    let levels = eq_preset(preset)?;
    player.set_eq_levels(levels).await?;

    msg.channel_id
        .say(&ctx.http, format!("🎚️ Ecualizador ajustado al preset `{preset}`."))
        .await?;
    Ok(())
}

async fn adveq(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let mut parts = args.split_whitespace();
    let (Some(band_raw), Some(gain_raw)) = (parts.next(), parts.next()) else {
        msg.channel_id
            .say(&ctx.http, "Uso: `adveq <banda 1-15|Hz> <ganancia -10..10>`.")
            .await?;
        return Ok(());
    };

    let band: i64 = band_raw.parse().map_err(|_| MusicError::EqBandOutOfRange)?;
    let gain: f32 = gain_raw.parse().map_err(|_| MusicError::EqGainOutOfRange)?;

    player.set_eq_band(resolve_band(band)?, gain).await?;
    msg.channel_id.say(&ctx.http, "🎚️ Ecualizador ajustado.").await?;
    Ok(())
}

async fn playing(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    let snapshot = player.snapshot().await;
    if !snapshot.playing {
        return Err(MusicError::AlreadyPaused.into());
    }
    let Some(track) = snapshot.current else {
        return Err(MusicError::QueueEmpty.into());
    };

    msg.channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new().embed(embeds::now_playing_embed(&track)),
        )
        .await?;
    Ok(())
}

async fn skipto(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let Some(index) = args
        .split_whitespace()
        .next()
        .and_then(|raw| raw.parse::<i64>().ok())
    else {
        msg.channel_id.say(&ctx.http, "Uso: `skipto <posición>`.").await?;
        return Ok(());
    };

    let snapshot = player.snapshot().await;
    if snapshot.length == 0 {
        return Err(MusicError::QueueEmpty.into());
    }
    if !(1..=snapshot.length as i64).contains(&index) {
        return Err(MusicError::NoMoreTracks.into());
    }

    player.set_cursor(index as isize - 2).await;
    player.stop().await?;
    msg.channel_id
        .say(&ctx.http, format!("⏭️ Saltando a la pista {index}."))
        .await?;
    Ok(())
}

async fn restart(ctx: &Context, msg: &Message, player: &Arc<Player>) -> anyhow::Result<()> {
    let snapshot = player.snapshot().await;
    if snapshot.length == 0 {
        return Err(MusicError::QueueEmpty.into());
    }

    player.seek(0).await?;
    msg.channel_id.say(&ctx.http, "🔁 Pista reiniciada.").await?;
    Ok(())
}

async fn seek(
    ctx: &Context,
    msg: &Message,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let snapshot = player.snapshot().await;
    if snapshot.length == 0 {
        return Err(MusicError::QueueEmpty.into());
    }

    let position_ms = parse_time_string(args.trim())?;
    player.seek(position_ms).await?;
    msg.channel_id.say(&ctx.http, "⏩ Posición actualizada.").await?;
    Ok(())
}

// Letras

async fn lyrics(
    ctx: &Context,
    msg: &Message,
    bot: &RitmoBot,
    player: &Arc<Player>,
    args: &str,
) -> anyhow::Result<()> {
    let name = if args.is_empty() {
        let snapshot = player.snapshot().await;
        snapshot
            .current
            .map(|t| t.title)
            .ok_or(MusicError::QueueEmpty)?
    } else {
        args.to_string()
    };

    let url = format!("{}{}", LYRICS_URL, urlencoding::encode(&name));
    let response = bot
        .http_client
        .get(&url)
        .send()
        .await
        .map_err(|_| MusicError::NoLyricsFound)?;
    if !response.status().is_success() {
        return Err(MusicError::NoLyricsFound.into());
    }

    let data: serde_json::Value = response
        .json()
        .await
        .map_err(|_| MusicError::NoLyricsFound)?;
    let lyrics = data["lyrics"].as_str().ok_or(MusicError::NoLyricsFound)?;

    // Demasiado largo para un embed: mejor el enlace pelado
    if lyrics.len() > 2000 {
        if let Some(link) = data["links"]["genius"].as_str() {
            msg.channel_id.say(&ctx.http, format!("<{link}>")).await?;
            return Ok(());
        }
    }

    let embed = embeds::lyrics_embed(
        data["title"].as_str().unwrap_or(&name),
        data["author"].as_str().unwrap_or("Desconocido"),
        lyrics,
        data["thumbnail"]["genius"].as_str(),
    );
    msg.channel_id
        .send_message(&ctx.http, CreateMessage::new().embed(embed))
        .await?;
    Ok(())
}

// Configuración

async fn set_prefix(
    ctx: &Context,
    msg: &Message,
    bot: &RitmoBot,
    guild_id: GuildId,
    args: &str,
) -> anyhow::Result<()> {
    let new_prefix = args.split_whitespace().next().unwrap_or("");
    if new_prefix.is_empty() || new_prefix.len() > 10 {
        msg.channel_id
            .say(&ctx.http, "El prefijo debe tener entre 1 y 10 caracteres.")
            .await?;
        return Ok(());
    }

    bot.settings.set_prefix(guild_id.get(), new_prefix).await?;
    msg.channel_id
        .say(&ctx.http, format!("✅ Prefijo actualizado a `{new_prefix}`."))
        .await?;
    Ok(())
}

async fn help(ctx: &Context, msg: &Message, prefix: &str) -> anyhow::Result<()> {
    msg.channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new().embed(embeds::help_embed(prefix)),
        )
        .await?;
    Ok(())
}

// Ayudantes

/// Canal de voz actual del autor, según la caché del gateway
fn author_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Option<ChannelId> {
    let guild = ctx.cache.guild(guild_id)?;
    guild.voice_states.get(&user_id).and_then(|vs| vs.channel_id)
}

/// Acepta `<#id>` o un id numérico pelado
fn parse_channel_arg(arg: &str) -> Option<ChannelId> {
    let raw = arg.trim();
    let raw = raw
        .strip_prefix("<#")
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw);
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .map(ChannelId::new)
}

/// Convierte banda 1-15 o frecuencia en Hz al índice base 0
fn resolve_band(band: i64) -> Result<usize, MusicError> {
    if (1..=EQ_BANDS as i64).contains(&band) {
        return Ok((band - 1) as usize);
    }
    HZ_BANDS
        .iter()
        .position(|hz| *hz == band)
        .ok_or(MusicError::EqBandOutOfRange)
}

/// Presets de ecualizador, ganancias ya en décimas
fn eq_preset(name: &str) -> Result<[f32; EQ_BANDS], MusicError> {
    match name {
        "flat" => Ok([0.0; EQ_BANDS]),
        "boost" => Ok([
            -0.075, 0.125, 0.125, 0.1, 0.1, 0.05, 0.075, 0.0, 0.0, 0.0, 0.0, 0.0, 0.125, 0.15,
            0.05,
        ]),
        "metal" => Ok([
            0.0, 0.1, 0.1, 0.15, 0.13, 0.1, 0.0, 0.125, 0.175, 0.175, 0.125, 0.125, 0.1, 0.075,
            0.0,
        ]),
        "piano" => Ok([
            -0.25, -0.25, -0.125, 0.0, 0.25, 0.25, 0.0, -0.25, -0.25, 0.0, 0.0, 0.5, 0.25, -0.025,
            0.0,
        ]),
        _ => Err(MusicError::InvalidEqPreset),
    }
}

static TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:(\d{1,3}):([0-5]\d)|(\d{1,3})m(?:([0-5]?\d)s?)?|(\d{1,3})s?)$")
        .expect("regex de tiempo inválida")
});

/// Parsea marcas como `1:23`, `45s`, `90`, `2m` o `2m30s` a milisegundos
pub fn parse_time_string(input: &str) -> Result<u64, MusicError> {
    let caps = TIME_RE.captures(input).ok_or(MusicError::InvalidTimeString)?;

    let number = |index: usize| -> Result<u64, MusicError> {
        caps.get(index)
            .map(|m| m.as_str().parse::<u64>().map_err(|_| MusicError::InvalidTimeString))
            .transpose()
            .map(|value| value.unwrap_or(0))
    };

    let seconds = if caps.get(1).is_some() {
        number(1)? * 60 + number(2)?
    } else if caps.get(3).is_some() {
        number(3)? * 60 + number(4)?
    } else if caps.get(5).is_some() {
        number(5)?
    } else {
        return Err(MusicError::InvalidTimeString);
    };

    Ok(seconds * 1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn time_strings_parse_to_millis() {
        assert_eq!(parse_time_string("1:23").unwrap(), 83_000);
        assert_eq!(parse_time_string("45s").unwrap(), 45_000);
        assert_eq!(parse_time_string("90").unwrap(), 90_000);
        assert_eq!(parse_time_string("2m").unwrap(), 120_000);
        assert_eq!(parse_time_string("2m30s").unwrap(), 150_000);
    }

    #[test]
    fn bad_time_strings_are_rejected() {
        assert!(parse_time_string("").is_err());
        assert!(parse_time_string("abc").is_err());
        assert!(parse_time_string("12:5").is_err());
        assert!(parse_time_string("1:99").is_err());
    }

    #[test]
    fn bands_resolve_by_index_or_frequency() {
        assert_eq!(resolve_band(1).unwrap(), 0);
        assert_eq!(resolve_band(15).unwrap(), 14);
        assert_eq!(resolve_band(1000).unwrap(), 9);
        assert!(matches!(resolve_band(16), Err(MusicError::EqBandOutOfRange)));
        assert!(matches!(resolve_band(0), Err(MusicError::EqBandOutOfRange)));
    }

    #[test]
    fn unknown_eq_preset_is_rejected() {
        assert!(eq_preset("flat").is_ok());
        assert!(matches!(eq_preset("dubstep"), Err(MusicError::InvalidEqPreset)));
    }

    #[test]
    fn channel_args_accept_mentions_and_ids() {
        assert_eq!(parse_channel_arg("<#123>"), Some(ChannelId::new(123)));
        assert_eq!(parse_channel_arg("456"), Some(ChannelId::new(456)));
        assert_eq!(parse_channel_arg("general"), None);
    }
}
