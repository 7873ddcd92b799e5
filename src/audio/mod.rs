//! # Audio Module
//!
//! Playback core for Ritmo Bot.
//!
//! The subsystem is built around four pieces:
//!
//! ### [`queue`] - Queue Management
//! - Cursor-based history/upcoming model with repeat modes
//! - Suffix-only shuffle that never rewrites history
//!
//! ### [`player`] - Playback Controller
//! - One [`player::Player`] per guild, created lazily through the
//!   [`player::PlayerRegistry`]
//! - Serializes user commands against node callbacks per guild
//!
//! ### [`backend`] - Node Capability Interface
//! - [`backend::PlaybackBackend`] abstracts the audio node so the
//!   controller never depends on a concrete client
//!
//! ### [`lavalink`] - Lavalink Adapter
//! - The production backend: voice over the gateway, audio on the node

pub mod backend;
pub mod lavalink;
pub mod player;
pub mod queue;
pub mod track;
