use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::{audio::track::Track, error::MusicError};

/// Política al terminar la pista actual
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    None,
    One,
    All,
}

impl RepeatMode {
    /// Parsea el token literal en minúsculas: `none`, `one` o `all`
    pub fn parse(token: &str) -> Result<Self, MusicError> {
        match token {
            "none" => Ok(Self::None),
            "one" => Ok(Self::One),
            "all" => Ok(Self::All),
            _ => Err(MusicError::InvalidRepeatMode),
        }
    }
}

/// Cola de reproducción de un servidor
///
/// Las pistas ya reproducidas se conservan antes del cursor para poder
/// volver atrás; el cursor arranca en -1 hasta que algo suena.
#[derive(Debug)]
pub struct TrackQueue {
    tracks: Vec<Track>,
    position: isize,
    repeat_mode: RepeatMode,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            position: -1,
            repeat_mode: RepeatMode::None,
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn position(&self) -> isize {
        self.position
    }

    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Pista bajo el cursor, si la reproducción ya comenzó
    pub fn current_track(&self) -> Option<&Track> {
        if self.position < 0 {
            return None;
        }
        self.tracks.get(self.position as usize)
    }

    /// Pistas ya reproducidas (antes del cursor)
    pub fn history(&self) -> &[Track] {
        let end = (self.position.max(0) as usize).min(self.tracks.len());
        &self.tracks[..end]
    }

    /// Pistas pendientes (después del cursor)
    pub fn upcoming(&self) -> &[Track] {
        let start = ((self.position + 1).max(0) as usize).min(self.tracks.len());
        &self.tracks[start..]
    }

    /// Agrega pistas al final; nunca inicia la reproducción
    pub fn add(&mut self, tracks: impl IntoIterator<Item = Track>) {
        for track in tracks {
            debug!("➕ En cola: {}", track.title);
            self.tracks.push(track);
        }
    }

    /// Avanza el cursor y devuelve la nueva pista actual
    ///
    /// En el último índice el comportamiento depende del modo: con `All`
    /// el cursor vuelve al 0, en caso contrario se queda donde está y
    /// se devuelve `NoMoreTracks`.
    pub fn get_next_track(&mut self) -> Result<&Track, MusicError> {
        if self.tracks.is_empty() {
            return Err(MusicError::QueueEmpty);
        }

        let next = self.position + 1;
        if next as usize >= self.tracks.len() {
            if self.repeat_mode == RepeatMode::All {
                self.position = 0;
            } else {
                return Err(MusicError::NoMoreTracks);
            }
        } else {
            self.position = next;
        }

        Ok(&self.tracks[self.position as usize])
    }

    /// Mezcla solo las pistas pendientes
    ///
    /// El historial y la pista actual no se tocan.
    pub fn shuffle(&mut self) -> Result<(), MusicError> {
        let start = ((self.position + 1).max(0) as usize).min(self.tracks.len());
        if start >= self.tracks.len() {
            return Err(MusicError::QueueEmpty);
        }

        let mut rng = rand::thread_rng();
        self.tracks[start..].shuffle(&mut rng);
        info!("🔀 {} pistas pendientes mezcladas", self.tracks.len() - start);
        Ok(())
    }

    pub fn set_repeat_mode(&mut self, mode: RepeatMode) {
        self.repeat_mode = mode;
    }

    /// Mueve el cursor directamente; los límites los valida el llamador
    pub fn set_position(&mut self, position: isize) {
        self.position = position;
    }

    /// Vacía la cola y regresa el cursor al estado inicial
    pub fn empty(&mut self) {
        self.tracks.clear();
        self.position = -1;
    }
}

impl Default for TrackQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.identifier.as_str()).collect()
    }

    #[test]
    fn add_keeps_order_and_length() {
        let mut queue = TrackQueue::new();
        queue.add([track("a"), track("b")]);
        queue.add([track("c")]);

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.current_track(), None);
        assert_eq!(ids(queue.upcoming()), vec!["a", "b", "c"]);
    }

    #[test]
    fn history_current_upcoming_partition_the_queue() {
        let mut queue = TrackQueue::new();
        queue.add([track("a"), track("b"), track("c")]);
        queue.get_next_track().unwrap();
        queue.get_next_track().unwrap();

        assert_eq!(ids(queue.history()), vec!["a"]);
        assert_eq!(queue.current_track().unwrap().identifier, "b");
        assert_eq!(ids(queue.upcoming()), vec!["c"]);
        assert_eq!(queue.history().len() + 1 + queue.upcoming().len(), queue.len());
    }

    #[test]
    fn next_on_empty_queue_fails() {
        let mut queue = TrackQueue::new();
        assert!(matches!(queue.get_next_track(), Err(MusicError::QueueEmpty)));
    }

    #[test]
    fn next_at_tail_without_repeat_leaves_cursor() {
        let mut queue = TrackQueue::new();
        queue.add([track("a")]);
        queue.get_next_track().unwrap();

        assert!(matches!(queue.get_next_track(), Err(MusicError::NoMoreTracks)));
        assert_eq!(queue.position(), 0);
        assert_eq!(queue.current_track().unwrap().identifier, "a");
    }

    #[test]
    fn next_at_tail_with_repeat_all_wraps_to_start() {
        let mut queue = TrackQueue::new();
        queue.add([track("a"), track("b")]);
        queue.set_repeat_mode(RepeatMode::All);
        queue.get_next_track().unwrap();
        queue.get_next_track().unwrap();

        let wrapped = queue.get_next_track().unwrap();
        assert_eq!(wrapped.identifier, "a");
        assert_eq!(queue.position(), 0);
    }

    #[test]
    fn shuffle_preserves_history_current_and_multiset() {
        let mut queue = TrackQueue::new();
        queue.add([track("a"), track("b"), track("c"), track("d"), track("e")]);
        queue.get_next_track().unwrap();
        queue.get_next_track().unwrap();

        let mut expected: Vec<String> =
            queue.upcoming().iter().map(|t| t.identifier.clone()).collect();
        queue.shuffle().unwrap();

        assert_eq!(ids(queue.history()), vec!["a"]);
        assert_eq!(queue.current_track().unwrap().identifier, "b");

        let mut after: Vec<String> =
            queue.upcoming().iter().map(|t| t.identifier.clone()).collect();
        expected.sort();
        after.sort();
        assert_eq!(after, expected);
    }

    #[test]
    fn shuffle_without_upcoming_fails() {
        let mut queue = TrackQueue::new();
        queue.add([track("a")]);
        queue.get_next_track().unwrap();

        assert!(matches!(queue.shuffle(), Err(MusicError::QueueEmpty)));
    }

    #[test]
    fn empty_resets_cursor_and_is_idempotent() {
        let mut queue = TrackQueue::new();
        queue.add([track("a"), track("b")]);
        queue.get_next_track().unwrap();

        queue.empty();
        queue.empty();

        assert!(queue.is_empty());
        assert_eq!(queue.position(), -1);
        assert_eq!(queue.current_track(), None);
    }

    #[test]
    fn repeat_mode_parses_only_exact_tokens() {
        assert_eq!(RepeatMode::parse("none").unwrap(), RepeatMode::None);
        assert_eq!(RepeatMode::parse("one").unwrap(), RepeatMode::One);
        assert_eq!(RepeatMode::parse("all").unwrap(), RepeatMode::All);
        assert!(matches!(RepeatMode::parse("ALL"), Err(MusicError::InvalidRepeatMode)));
        assert!(matches!(RepeatMode::parse("queue"), Err(MusicError::InvalidRepeatMode)));
    }
}
