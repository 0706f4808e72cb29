use serenity::model::id::{ChannelId, GuildId};
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{
    audio::{
        link::{PlayerEvent, VoiceLink},
        stream::StreamAdapter,
    },
    error::{PreconditionError, StateError, StreamOpenError},
    sources::PlayableItem,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Created, first item not yet handed to the player.
    Starting,
    Playing,
    Paused,
    /// Current item finished; the next one is being started.
    Advancing,
    /// Resources released. The session is no longer in the registry.
    Terminating,
}

/// Playback state for one guild.
///
/// `queue[0]` is the item being played; it stays in the queue until the
/// player reports it finished. Mutations go through the owning
/// [`SessionRegistry`](crate::audio::registry::SessionRegistry) entry's lock.
pub struct PlaybackSession {
    guild_id: GuildId,
    voice_channel: ChannelId,
    text_channel: ChannelId,
    link: Option<Box<dyn VoiceLink>>,
    queue: VecDeque<PlayableItem>,
    state: SessionState,
    volume: f32,
    generation: u64,
}

impl PlaybackSession {
    pub fn new(
        guild_id: GuildId,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        first: PlayableItem,
        volume: f32,
    ) -> Self {
        Self {
            guild_id,
            voice_channel,
            text_channel,
            link: None,
            queue: VecDeque::from([first]),
            state: SessionState::Starting,
            volume: volume.clamp(0.0, 1.0),
            generation: 0,
        }
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub fn voice_channel(&self) -> ChannelId {
        self.voice_channel
    }

    pub fn text_channel(&self) -> ChannelId {
        self.text_channel
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn queue(&self) -> &VecDeque<PlayableItem> {
        &self.queue
    }

    pub fn is_terminated(&self) -> bool {
        self.state == SessionState::Terminating
    }

    pub fn attach(&mut self, link: Box<dyn VoiceLink>) {
        self.link = Some(link);
    }

    pub async fn is_connected(&self) -> bool {
        match self.link.as_ref() {
            Some(link) => link.is_connected().await,
            None => false,
        }
    }

    /// Appends to the queue and returns the 1-based position.
    pub fn enqueue(
        &mut self,
        item: PlayableItem,
        max_size: usize,
    ) -> Result<usize, PreconditionError> {
        if self.queue.len() >= max_size {
            return Err(PreconditionError::QueueFull(max_size));
        }
        info!("➕ Queued in guild {}: {}", self.guild_id, item.title());
        self.queue.push_back(item);
        Ok(self.queue.len())
    }

    /// Opens `queue[0]` and hands it to the player. On failure the item stays
    /// at the front; the caller decides what to do with it. A tripped `cancel`
    /// abandons the open with [`StreamOpenError::Cancelled`].
    pub async fn play_current(
        &mut self,
        adapter: &dyn StreamAdapter,
        cancel: &CancellationToken,
    ) -> Result<PlayableItem, StreamOpenError> {
        let Some(item) = self.queue.front().cloned() else {
            return Err(StreamOpenError::Player("nothing queued".to_string()));
        };
        let Some(link) = self.link.as_ref() else {
            return Err(StreamOpenError::Player("no voice connection".to_string()));
        };

        self.generation += 1;
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StreamOpenError::Cancelled),
            opened = adapter.open(&item) => opened?,
        };
        link.play(stream, self.volume, self.generation).await?;

        self.state = SessionState::Playing;
        info!(
            "▶️ Playing in guild {} (generation {}): {}",
            self.guild_id,
            self.generation,
            item.title()
        );
        Ok(item)
    }

    /// Whether `event` refers to the resource this session is playing.
    pub fn accepts(&self, event: &PlayerEvent) -> bool {
        matches!(self.state, SessionState::Playing | SessionState::Paused)
            && event.generation == self.generation
    }

    /// Removes the finished item. Returns true when more items remain.
    pub fn advance(&mut self) -> bool {
        self.state = SessionState::Advancing;
        if let Some(done) = self.queue.pop_front() {
            debug!("⏭️ Finished in guild {}: {}", self.guild_id, done.title());
        }
        !self.queue.is_empty()
    }

    /// Drops `queue[0]` after it could not be started.
    pub fn drop_current(&mut self) -> Option<PlayableItem> {
        self.queue.pop_front()
    }

    pub fn pause_toggle(&mut self, to_pause: bool) -> Result<(), StateError> {
        let link = self.link.as_ref();
        match (to_pause, self.state) {
            (true, SessionState::Playing) => {
                if !link.is_some_and(|l| l.pause()) {
                    return Err(StateError::NothingToPause);
                }
                self.state = SessionState::Paused;
                Ok(())
            }
            (false, SessionState::Paused) => {
                if !link.is_some_and(|l| l.resume()) {
                    return Err(StateError::NothingToResume);
                }
                self.state = SessionState::Playing;
                Ok(())
            }
            (true, _) => Err(StateError::NothingToPause),
            (false, _) => Err(StateError::NothingToResume),
        }
    }

    /// Stops the current resource; the player's `Finished` event performs the
    /// actual advance.
    pub fn skip(&self) -> Result<PlayableItem, StateError> {
        let current = self.queue.front().cloned().ok_or(StateError::EmptyQueue)?;
        match (self.state, self.link.as_ref()) {
            (SessionState::Playing | SessionState::Paused, Some(link)) => {
                link.stop();
                Ok(current)
            }
            _ => Err(StateError::NothingPlaying),
        }
    }

    /// Validates a percentage and stores it as gain. Returns whether the
    /// change reached a live resource.
    pub fn set_volume(&mut self, percent: i64) -> Result<bool, PreconditionError> {
        if !(0..=100).contains(&percent) {
            return Err(PreconditionError::VolumeOutOfRange);
        }
        self.volume = percent as f32 / 100.0;
        let live = self.link.as_ref().is_some_and(|l| l.set_volume(self.volume));
        debug!(
            "🔊 Volume {}% in guild {} (live: {})",
            percent, self.guild_id, live
        );
        Ok(live)
    }

    /// Stops playback and releases the voice connection. Safe to call more
    /// than once; the link is released only the first time.
    pub async fn shutdown(&mut self) {
        self.state = SessionState::Terminating;
        // invalidate events from the resource being stopped
        self.generation += 1;
        self.queue.clear();
        if let Some(link) = self.link.take() {
            link.stop();
            link.release().await;
            info!("👋 Released voice connection in guild {}", self.guild_id);
        }
    }
}
