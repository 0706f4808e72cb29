//! # Audio Module
//!
//! Per-guild playback queues and everything needed to drive them.
//!
//! ## Architecture
//!
//! ### [`manager`] - Playback Manager
//! - Entry point for every transport command (play, pause, resume, skip, stop, volume, queue)
//! - Reacts to player lifecycle events by advancing the queue
//! - Serializes work per guild through the session lock
//!
//! ### [`session`] - Playback Session
//! - One ordered queue, one player, one voice connection per guild
//! - `queue[0]` is the item being played until the player reports it finished
//!
//! ### [`registry`] - Session Registry
//! - Guild → session map with create-if-absent and identity-checked delete
//!
//! ### [`stream`] - Audio Stream Adapter
//! - Pipes `yt-dlp` stdout into the player, killing the process when playback ends
//!
//! ### [`link`] - Voice seams
//! - Traits for the voice connection/player, the connector and channel announcements
//!
//! ## Lifecycle
//!
//! ```text
//! play ─▶ registry.create_or_get ─▶ connect ─▶ play_current ─▶ Playing
//!                                                     ▲            │ Finished/Errored
//!                                                     └─ advance ◀─┘
//!                                              queue empty ─▶ teardown (release + delete)
//! ```

pub mod link;
pub mod manager;
pub mod registry;
pub mod session;
pub mod stream;

#[cfg(test)]
pub mod testing;
