//! Songbird and HTTP implementations of the audio seams.

use async_trait::async_trait;
use parking_lot::Mutex as SyncMutex;
use serenity::{
    http::Http,
    model::id::{ChannelId, GuildId},
};
use songbird::{
    input::{AudioStream, Input, LiveInput},
    tracks::{Track, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::sync::Arc;
use symphonia::core::io::{MediaSource, ReadOnlySource};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        link::{Announcer, EventSink, PlayerEvent, PlayerEventKind, VoiceConnector, VoiceLink},
        stream::ByteStream,
    },
    error::{ConnectError, StreamOpenError},
};

/// Joins voice channels through the shared [`Songbird`] manager.
pub struct SongbirdConnector {
    manager: Arc<Songbird>,
}

impl SongbirdConnector {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self { manager }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        events: EventSink,
    ) -> Result<Box<dyn VoiceLink>, ConnectError> {
        let call = self
            .manager
            .join(guild_id, channel_id)
            .await
            .map_err(|e| ConnectError(e.to_string()))?;

        Ok(Box::new(SongbirdLink {
            guild_id,
            manager: self.manager.clone(),
            call,
            current: SyncMutex::new(None),
            events,
        }))
    }
}

/// A joined call plus the handle of the track it is playing.
pub struct SongbirdLink {
    guild_id: GuildId,
    manager: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    current: SyncMutex<Option<TrackHandle>>,
    events: EventSink,
}

impl SongbirdLink {
    fn with_track(&self, f: impl FnOnce(&TrackHandle) -> bool) -> bool {
        self.current.lock().as_ref().map(f).unwrap_or(false)
    }
}

#[async_trait]
impl VoiceLink for SongbirdLink {
    async fn play(
        &self,
        stream: ByteStream,
        volume: f32,
        generation: u64,
    ) -> Result<(), StreamOpenError> {
        let source: Box<dyn MediaSource> = Box::new(ReadOnlySource::new(stream));
        let input = Input::Live(
            LiveInput::Raw(AudioStream {
                input: source,
                hint: None,
            }),
            None,
        );

        let handle = {
            let mut call = self.call.lock().await;
            call.play_only(Track::from(input).volume(volume))
        };

        for (trigger, kind) in [
            (TrackEvent::End, PlayerEventKind::Finished),
            (TrackEvent::Error, PlayerEventKind::Errored),
        ] {
            let bridge = TrackEventBridge {
                event: PlayerEvent {
                    guild_id: self.guild_id,
                    generation,
                    kind,
                },
                sink: self.events.clone(),
            };
            handle
                .add_event(Event::Track(trigger), bridge)
                .map_err(|e| StreamOpenError::Player(e.to_string()))?;
        }

        *self.current.lock() = Some(handle);
        Ok(())
    }

    fn pause(&self) -> bool {
        self.with_track(|track| track.pause().is_ok())
    }

    fn resume(&self) -> bool {
        self.with_track(|track| track.play().is_ok())
    }

    fn stop(&self) {
        if let Some(track) = self.current.lock().as_ref() {
            if let Err(e) = track.stop() {
                debug!("Track already gone in guild {}: {}", self.guild_id, e);
            }
        }
    }

    fn set_volume(&self, volume: f32) -> bool {
        self.with_track(|track| track.set_volume(volume).is_ok())
    }

    async fn is_connected(&self) -> bool {
        self.call.lock().await.current_channel().is_some()
    }

    async fn release(&self) {
        self.current.lock().take();
        match self.manager.remove(self.guild_id).await {
            Ok(()) => info!("👋 Left voice in guild {}", self.guild_id),
            // already disconnected from outside
            Err(e) => debug!("Voice release in guild {}: {}", self.guild_id, e),
        }
    }
}

/// Forwards a songbird track event to the playback manager.
struct TrackEventBridge {
    event: PlayerEvent,
    sink: EventSink,
}

#[async_trait]
impl VoiceEventHandler for TrackEventBridge {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let (PlayerEventKind::Errored, EventContext::Track(tracks)) = (self.event.kind, ctx) {
            for (state, _) in *tracks {
                warn!(
                    "❌ Track error in guild {}: {:?}",
                    self.event.guild_id, state.playing
                );
            }
        }
        if self.sink.send(self.event).is_err() {
            debug!("Playback manager gone, dropping {:?}", self.event);
        }
        None
    }
}

/// Posts announcements with the bot's HTTP client.
pub struct SerenityAnnouncer {
    http: Arc<Http>,
}

impl SerenityAnnouncer {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Announcer for SerenityAnnouncer {
    async fn announce(&self, channel_id: ChannelId, content: String) {
        if let Err(e) = channel_id.say(&self.http, content).await {
            error!("Failed to announce in channel {}: {:?}", channel_id, e);
        }
    }
}
