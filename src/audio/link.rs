use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use tokio::sync::mpsc;

use crate::{
    audio::stream::ByteStream,
    error::{ConnectError, StreamOpenError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerEventKind {
    /// The resource finished or was stopped.
    Finished,
    /// The player gave up on the resource.
    Errored,
}

/// Lifecycle signal from a player. `generation` identifies the resource that
/// produced it, so events from replaced or stopped resources can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerEvent {
    pub guild_id: GuildId,
    pub generation: u64,
    pub kind: PlayerEventKind,
}

pub type EventSink = mpsc::UnboundedSender<PlayerEvent>;

/// One guild's live voice connection together with its player.
#[async_trait]
pub trait VoiceLink: Send + Sync {
    /// Replaces whatever is playing with `stream` at `volume`. Lifecycle events
    /// for this resource carry `generation`.
    async fn play(
        &self,
        stream: ByteStream,
        volume: f32,
        generation: u64,
    ) -> Result<(), StreamOpenError>;

    /// Returns false when no resource is attached.
    fn pause(&self) -> bool;

    fn resume(&self) -> bool;

    /// Stops the current resource. The player reports `Finished` afterwards.
    fn stop(&self);

    /// Applies gain to the attached resource. Returns false when there is none.
    fn set_volume(&self, volume: f32) -> bool;

    /// Whether the voice connection is still in a channel.
    async fn is_connected(&self) -> bool;

    /// Leaves the voice channel. Called once per link.
    async fn release(&self);
}

#[async_trait]
pub trait VoiceConnector: Send + Sync {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSink,
    ) -> Result<Box<dyn VoiceLink>, ConnectError>;
}

/// Posts unsolicited messages (now playing, skipped items) to a text channel.
#[async_trait]
pub trait Announcer: Send + Sync {
    async fn announce(&self, channel_id: ChannelId, content: String);
}
