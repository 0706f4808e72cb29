//! Error taxonomy for command handling.
//!
//! Every failure a chat command can hit is one of these types. They are all
//! caught at the command boundary and turned into a single reply through
//! [`CommandError::reply`]; none of them terminates the process.

use thiserror::Error;

/// A query could not be turned into a playable item.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("unsupported or malformed URL: {0}")]
    InvalidUrl(String),

    #[error("no results for query: {0}")]
    NoResults(String),

    #[error("search provider failed: {0}")]
    Provider(String),
}

/// The extraction process could not produce an audio stream.
#[derive(Debug, Error)]
pub enum StreamOpenError {
    #[error("failed to start extractor: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("extractor exited before producing audio ({0})")]
    EarlyExit(String),

    #[error("extractor produced no audio within {0:?}")]
    Timeout(std::time::Duration),

    #[error("player rejected the stream: {0}")]
    Player(String),

    #[error("stream open cancelled by stop")]
    Cancelled,
}

/// The caller's request is not acceptable, independent of session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PreconditionError {
    #[error("not in a voice channel")]
    NotInVoiceChannel,

    #[error("missing query")]
    EmptyQuery,

    #[error("volume must be an integer between 0 and 100")]
    VolumeOutOfRange,

    #[error("queue is full ({0} songs)")]
    QueueFull(usize),

    #[error("commands only work inside a server")]
    NotInGuild,
}

/// The command is not valid for the current session state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateError {
    #[error("nothing is playing")]
    NothingPlaying,

    #[error("nothing to pause")]
    NothingToPause,

    #[error("nothing to resume")]
    NothingToResume,

    #[error("no songs queued")]
    EmptyQueue,

    #[error("stopped before playback started")]
    StoppedBeforeStart,
}

/// Joining the caller's voice channel failed.
#[derive(Debug, Error)]
#[error("could not join voice channel: {0}")]
pub struct ConnectError(pub String);

#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    StreamOpen(#[from] StreamOpenError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error(transparent)]
    State(#[from] StateError),

    #[error(transparent)]
    Connect(#[from] ConnectError),
}

impl CommandError {
    /// Chat reply for this error.
    pub fn reply(&self) -> String {
        match self {
            Self::Resolution(_) => "❌ No match found for that query.".to_string(),
            Self::StreamOpen(_) => "❌ Could not open an audio stream for that song.".to_string(),
            Self::Precondition(err) => match err {
                PreconditionError::NotInVoiceChannel => {
                    "❌ You need to be in a voice channel first.".to_string()
                }
                PreconditionError::EmptyQuery => {
                    "❌ Give me a song name or a URL to play.".to_string()
                }
                PreconditionError::VolumeOutOfRange => {
                    "❌ Volume must be a whole number between 0 and 100.".to_string()
                }
                PreconditionError::QueueFull(max) => {
                    format!("❌ The queue is full (max {max} songs).")
                }
                PreconditionError::NotInGuild => {
                    "❌ Music commands only work inside a server.".to_string()
                }
            },
            Self::State(err) => match err {
                StateError::NothingPlaying => "❌ Nothing is playing.".to_string(),
                StateError::NothingToPause => "❌ Nothing to pause.".to_string(),
                StateError::NothingToResume => "❌ Nothing to resume.".to_string(),
                StateError::EmptyQueue => "📭 No songs queued.".to_string(),
                StateError::StoppedBeforeStart => {
                    "⏹️ Playback was stopped before it could start.".to_string()
                }
            },
            Self::Connect(_) => "❌ I couldn't join your voice channel.".to_string(),
        }
    }
}
