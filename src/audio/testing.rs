//! Recording fakes for the voice, stream and announcement seams.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId};
use std::{
    collections::{HashMap, HashSet},
    io::{Cursor, Read},
    sync::Arc,
    time::Duration,
};

use crate::{
    audio::{
        link::{Announcer, EventSink, VoiceConnector, VoiceLink},
        stream::{ByteStream, StreamAdapter},
    },
    error::{ConnectError, StreamOpenError},
    sources::PlayableItem,
};

#[derive(Debug, Default)]
pub struct LinkLog {
    /// (title read from the stream, volume, generation)
    pub played: Vec<(String, f32, u64)>,
    pub pauses: usize,
    pub resumes: usize,
    pub stops: usize,
    pub volumes: Vec<f32>,
    pub releases: usize,
    /// Set by tests to simulate the bot being kicked from voice.
    pub disconnected: bool,
}

pub type SharedLog = Arc<Mutex<LinkLog>>;

pub struct FakeLink {
    log: SharedLog,
}

impl FakeLink {
    pub fn new() -> (Self, SharedLog) {
        let log = SharedLog::default();
        (Self { log: log.clone() }, log)
    }

    fn attached(&self) -> bool {
        !self.log.lock().played.is_empty()
    }
}

#[async_trait]
impl VoiceLink for FakeLink {
    async fn play(
        &self,
        mut stream: ByteStream,
        volume: f32,
        generation: u64,
    ) -> Result<(), StreamOpenError> {
        let mut title = String::new();
        stream.read_to_string(&mut title)?;
        self.log.lock().played.push((title, volume, generation));
        Ok(())
    }

    fn pause(&self) -> bool {
        let attached = self.attached();
        if attached {
            self.log.lock().pauses += 1;
        }
        attached
    }

    fn resume(&self) -> bool {
        let attached = self.attached();
        if attached {
            self.log.lock().resumes += 1;
        }
        attached
    }

    fn stop(&self) {
        self.log.lock().stops += 1;
    }

    fn set_volume(&self, volume: f32) -> bool {
        let attached = self.attached();
        if attached {
            self.log.lock().volumes.push(volume);
        }
        attached
    }

    async fn is_connected(&self) -> bool {
        !self.log.lock().disconnected
    }

    async fn release(&self) {
        self.log.lock().releases += 1;
    }
}

/// Hands out [`FakeLink`]s and keeps every link's log by guild.
#[derive(Default)]
pub struct FakeConnector {
    pub connects: Mutex<Vec<(GuildId, ChannelId)>>,
    pub logs: Mutex<HashMap<GuildId, Vec<SharedLog>>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl FakeConnector {
    /// Log of the most recent link for `guild_id`.
    pub fn log(&self, guild_id: GuildId) -> SharedLog {
        self.logs
            .lock()
            .get(&guild_id)
            .and_then(|logs| logs.last().cloned())
            .unwrap_or_default()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().len()
    }
}

#[async_trait]
impl VoiceConnector for FakeConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        _events: EventSink,
    ) -> Result<Box<dyn VoiceLink>, ConnectError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.connects.lock().push((guild_id, channel_id));
        if self.fail {
            return Err(ConnectError("missing permissions".to_string()));
        }
        let (link, log) = FakeLink::new();
        self.logs.lock().entry(guild_id).or_default().push(log);
        Ok(Box::new(link))
    }
}

/// Streams the item title as bytes; titles listed in `failing` fail to open,
/// after `stall` if one is set.
#[derive(Default)]
pub struct FakeAdapter {
    pub failing: HashSet<String>,
    pub stall: Option<Duration>,
}

impl FakeAdapter {
    pub fn failing<const N: usize>(titles: [&str; N]) -> Self {
        Self {
            failing: titles.iter().map(|t| t.to_string()).collect(),
            stall: None,
        }
    }

    /// Like [`FakeAdapter::failing`], but each failure takes `stall` to surface.
    pub fn stalling<const N: usize>(titles: [&str; N], stall: Duration) -> Self {
        Self {
            stall: Some(stall),
            ..Self::failing(titles)
        }
    }
}

#[async_trait]
impl StreamAdapter for FakeAdapter {
    async fn open(&self, item: &PlayableItem) -> Result<ByteStream, StreamOpenError> {
        if self.failing.contains(item.title()) {
            if let Some(stall) = self.stall {
                tokio::time::sleep(stall).await;
            }
            return Err(StreamOpenError::EarlyExit("exit status: 1".to_string()));
        }
        Ok(ByteStream::new(Cursor::new(item.title().as_bytes().to_vec())))
    }
}

#[derive(Default)]
pub struct RecordingAnnouncer {
    pub messages: Mutex<Vec<(ChannelId, String)>>,
}

#[async_trait]
impl Announcer for RecordingAnnouncer {
    async fn announce(&self, channel_id: ChannelId, content: String) {
        self.messages.lock().push((channel_id, content));
    }
}
