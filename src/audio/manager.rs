use serenity::model::id::{ChannelId, GuildId};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

use crate::{
    audio::{
        link::{Announcer, EventSink, PlayerEvent, PlayerEventKind, VoiceConnector},
        registry::{SessionRegistry, SharedSession},
        session::{PlaybackSession, SessionState},
        stream::StreamAdapter,
    },
    error::{CommandError, PreconditionError, StateError, StreamOpenError},
    sources::{PlayableItem, Resolver},
};

/// External collaborators used by the manager.
pub struct Collaborators {
    pub resolver: Arc<dyn Resolver>,
    pub adapter: Arc<dyn StreamAdapter>,
    pub connector: Arc<dyn VoiceConnector>,
    pub announcer: Arc<dyn Announcer>,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub default_volume: f32,
    pub max_queue_size: usize,
}

/// Who asked for a song and where.
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub guild_id: GuildId,
    pub voice_channel: ChannelId,
    pub text_channel: ChannelId,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// A new session was created and this item started.
    Started(PlayableItem),
    /// Appended to an existing session at this 1-based position.
    Queued { item: PlayableItem, position: usize },
}

/// Point-in-time copy of a session's queue for listing.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    pub items: Vec<PlayableItem>,
    pub paused: bool,
    pub volume: f32,
}

/// Runs every per-guild playback operation.
///
/// Each session sits behind its own async mutex in the [`SessionRegistry`].
/// Commands and player events for a guild take that lock, then check that the
/// session is still registered and not torn down before touching it, so a
/// `stop` that wins the race turns any later event or continuation into a
/// no-op. Player events also carry the generation of the resource that
/// produced them and are dropped when stale.
pub struct PlaybackManager {
    registry: SessionRegistry,
    resolver: Arc<dyn Resolver>,
    adapter: Arc<dyn StreamAdapter>,
    connector: Arc<dyn VoiceConnector>,
    announcer: Arc<dyn Announcer>,
    settings: SessionSettings,
    events: EventSink,
}

impl PlaybackManager {
    /// Builds the manager and starts the task that feeds player events back
    /// into it.
    pub fn new(collaborators: Collaborators, settings: SessionSettings) -> Arc<Self> {
        let (events, rx) = mpsc::unbounded_channel();
        let manager = Arc::new(Self {
            registry: SessionRegistry::new(),
            resolver: collaborators.resolver,
            adapter: collaborators.adapter,
            connector: collaborators.connector,
            announcer: collaborators.announcer,
            settings,
            events,
        });

        tokio::spawn(pump_events(Arc::downgrade(&manager), rx));
        manager
    }

    pub fn active_sessions(&self) -> usize {
        self.registry.len()
    }

    /// Resolves the query, then either creates the guild's session and starts
    /// playback or appends to the existing queue.
    pub async fn play(&self, request: PlayRequest) -> Result<PlayOutcome, CommandError> {
        let query = request.query.trim();
        if query.is_empty() {
            return Err(PreconditionError::EmptyQuery.into());
        }

        let item = self.resolver.resolve(query).await?;

        loop {
            let (shared, created) = self.registry.create_or_get(request.guild_id, || {
                PlaybackSession::new(
                    request.guild_id,
                    request.voice_channel,
                    request.text_channel,
                    item.clone(),
                    self.settings.default_volume,
                )
            });
            let mut session = shared.lock().await;

            if session.is_terminated() {
                if created {
                    // a stop got the lock before this session could start
                    return Err(StateError::StoppedBeforeStart.into());
                }
                // stopped between lookup and lock; its entry is already gone
                continue;
            }

            if !created {
                let position = session.enqueue(item.clone(), self.settings.max_queue_size)?;
                return Ok(PlayOutcome::Queued { item, position });
            }

            return self
                .start_session(&shared, &mut session)
                .await
                .map(PlayOutcome::Started);
        }
    }

    async fn start_session(
        &self,
        shared: &SharedSession,
        session: &mut PlaybackSession,
    ) -> Result<PlayableItem, CommandError> {
        let guild_id = session.guild_id();

        match self
            .connector
            .connect(guild_id, session.voice_channel(), self.events.clone())
            .await
        {
            Ok(link) => session.attach(link),
            Err(e) => {
                error!("❌ Voice connect failed in guild {}: {}", guild_id, e);
                self.teardown(shared, session).await;
                return Err(e.into());
            }
        }

        info!("🔊 Connected to voice in guild {}", guild_id);
        match self.start_next(shared, session, false).await {
            Ok(item) => Ok(item),
            // the stop that cancelled us tears the session down
            Err(StreamOpenError::Cancelled) => Err(StateError::StoppedBeforeStart.into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Starts `queue[0]`, dropping items whose stream cannot be opened. Tears
    /// the session down when nothing playable is left. Returns at once with
    /// [`StreamOpenError::Cancelled`] when a `stop` is waiting for the lock.
    async fn start_next(
        &self,
        shared: &SharedSession,
        session: &mut PlaybackSession,
        announce: bool,
    ) -> Result<PlayableItem, StreamOpenError> {
        let mut last_error = None;

        while !session.queue().is_empty() {
            match session
                .play_current(self.adapter.as_ref(), shared.cancellation())
                .await
            {
                Ok(item) => {
                    if announce {
                        self.announcer
                            .announce(
                                session.text_channel(),
                                format!("🎶 Now playing: **{}**", item.title()),
                            )
                            .await;
                    }
                    return Ok(item);
                }
                Err(StreamOpenError::Cancelled) => {
                    debug!("Start cancelled in guild {}", session.guild_id());
                    return Err(StreamOpenError::Cancelled);
                }
                Err(e) => {
                    let failed = session.drop_current();
                    warn!(
                        "⚠️ Skipping unplayable item in guild {}: {} ({})",
                        session.guild_id(),
                        failed.as_ref().map(|i| i.title()).unwrap_or("unknown"),
                        e
                    );
                    if let (true, Some(failed)) = (announce, failed) {
                        self.announcer
                            .announce(
                                session.text_channel(),
                                format!("⚠️ Skipped **{}**: could not open audio stream", failed.title()),
                            )
                            .await;
                    }
                    last_error = Some(e);
                }
            }
        }

        self.teardown(shared, session).await;
        Err(last_error.unwrap_or_else(|| StreamOpenError::Player("nothing queued".to_string())))
    }

    async fn teardown(&self, shared: &SharedSession, session: &mut PlaybackSession) {
        let guild_id = session.guild_id();
        self.registry.delete(guild_id, shared);
        session.shutdown().await;
        info!("⏹️ Session ended in guild {}", guild_id);
    }

    /// Locks the guild's live session, if there is one.
    async fn live_session(
        &self,
        guild_id: GuildId,
    ) -> Option<(SharedSession, OwnedMutexGuard<PlaybackSession>)> {
        let shared = self.registry.get(guild_id)?;
        let session = shared.lock_owned().await;
        if session.is_terminated() || !self.registry.holds(guild_id, &shared) {
            return None;
        }
        Some((shared, session))
    }

    pub async fn pause(&self, guild_id: GuildId) -> Result<(), CommandError> {
        let (_, mut session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingToPause)?;
        session.pause_toggle(true)?;
        info!("⏸️ Paused in guild {}", guild_id);
        Ok(())
    }

    pub async fn resume(&self, guild_id: GuildId) -> Result<(), CommandError> {
        let (_, mut session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingToResume)?;
        session.pause_toggle(false)?;
        info!("▶️ Resumed in guild {}", guild_id);
        Ok(())
    }

    /// Stops the current item. The advance happens when the player reports it
    /// finished.
    pub async fn skip(&self, guild_id: GuildId) -> Result<PlayableItem, CommandError> {
        let (_, session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingPlaying)?;
        let skipped = session.skip()?;
        info!("⏭️ Skip requested in guild {}: {}", guild_id, skipped.title());
        Ok(skipped)
    }

    /// Ends the guild's session. A second call finds nothing to stop.
    ///
    /// The session's token is tripped before taking the lock, so a stream
    /// open in progress is abandoned instead of running to its timeout.
    pub async fn stop(&self, guild_id: GuildId) -> Result<(), CommandError> {
        if let Some(shared) = self.registry.get(guild_id) {
            shared.cancel();
        }
        let (shared, mut session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingPlaying)?;
        self.teardown(&shared, &mut session).await;
        Ok(())
    }

    /// Sets volume from a percentage. Out-of-range values are rejected before
    /// the session is looked at.
    pub async fn set_volume(&self, guild_id: GuildId, percent: i64) -> Result<(), CommandError> {
        if !(0..=100).contains(&percent) {
            return Err(PreconditionError::VolumeOutOfRange.into());
        }
        let (_, mut session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingPlaying)?;
        session.set_volume(percent)?;
        Ok(())
    }

    pub async fn volume(&self, guild_id: GuildId) -> Result<f32, CommandError> {
        let (_, session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::NothingPlaying)?;
        Ok(session.volume())
    }

    pub async fn queue(&self, guild_id: GuildId) -> Result<QueueSnapshot, CommandError> {
        let (_, session) = self
            .live_session(guild_id)
            .await
            .ok_or(StateError::EmptyQueue)?;
        if session.queue().is_empty() {
            return Err(StateError::EmptyQueue.into());
        }
        Ok(QueueSnapshot {
            items: session.queue().iter().cloned().collect(),
            paused: session.state() == SessionState::Paused,
            volume: session.volume(),
        })
    }

    /// The bot left voice in `guild_id`. Closes the session only if its own
    /// connection is gone; an update left over from a previous session's
    /// release is ignored.
    pub async fn handle_voice_disconnect(&self, guild_id: GuildId) {
        let Some((shared, mut session)) = self.live_session(guild_id).await else {
            return;
        };
        if session.state() == SessionState::Starting || session.is_connected().await {
            debug!("Ignoring stale voice disconnect in guild {}", guild_id);
            return;
        }
        shared.cancel();
        self.teardown(&shared, &mut session).await;
        info!("🔌 Voice disconnected externally, session closed in guild {}", guild_id);
    }

    /// Advances the queue when the current resource finishes or errors.
    pub async fn handle_player_event(&self, event: PlayerEvent) {
        let Some((shared, mut session)) = self.live_session(event.guild_id).await else {
            debug!("Ignoring {:?}: no live session", event);
            return;
        };
        if !session.accepts(&event) {
            debug!("Ignoring stale {:?}", event);
            return;
        }
        if event.kind == PlayerEventKind::Errored {
            warn!("❌ Player error in guild {}, advancing", event.guild_id);
        }

        if session.advance() {
            if let Err(e) = self.start_next(&shared, &mut session, true).await {
                debug!("Advance in guild {} ended without playback: {}", event.guild_id, e);
            }
        } else {
            self.teardown(&shared, &mut session).await;
        }
    }
}

async fn pump_events(manager: Weak<PlaybackManager>, mut rx: mpsc::UnboundedReceiver<PlayerEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(manager) = manager.upgrade() else {
            break;
        };
        // per-event task so a slow stream open in one guild does not hold up others
        tokio::spawn(async move {
            manager.handle_player_event(event).await;
        });
    }
}
