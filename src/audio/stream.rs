use async_trait::async_trait;
use songbird::input::ChildContainer;
use std::{
    io::{self, Cursor, Read},
    process::{Child, Command, Stdio},
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::{error::StreamOpenError, sources::PlayableItem};

/// Size of the first read used to confirm the extractor is producing audio.
const BIND_CHUNK: usize = 16 * 1024;

/// Encoded audio bytes handed to the player. Consumed exactly once; dropping
/// it releases whatever produces the bytes.
pub struct ByteStream {
    reader: Box<dyn Read + Send + Sync>,
}

impl ByteStream {
    pub fn new(reader: impl Read + Send + Sync + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }
}

impl Read for ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl std::fmt::Debug for ByteStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteStream").finish_non_exhaustive()
    }
}

/// Opens an audio byte stream for a resolved item.
#[async_trait]
pub trait StreamAdapter: Send + Sync {
    async fn open(&self, item: &PlayableItem) -> Result<ByteStream, StreamOpenError>;
}

/// Streams best-available audio from `yt-dlp` stdout.
pub struct YtDlpStreamAdapter {
    binary: String,
    bind_timeout: Duration,
}

impl YtDlpStreamAdapter {
    pub fn new(binary: impl Into<String>, bind_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            bind_timeout,
        }
    }

    fn command(&self, url: &str) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.args(stream_args(url));
        cmd
    }
}

#[async_trait]
impl StreamAdapter for YtDlpStreamAdapter {
    async fn open(&self, item: &PlayableItem) -> Result<ByteStream, StreamOpenError> {
        info!("🎵 Opening stream for: {}", item.title());
        spawn_and_bind(self.command(item.source_url()), self.bind_timeout).await
    }
}

fn stream_args(url: &str) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestaudio[ext=webm]/bestaudio/best".to_string(),
        "-o".to_string(),
        "-".to_string(),
        "--no-playlist".to_string(),
        "--no-part".to_string(),
        "--quiet".to_string(),
        "--no-warnings".to_string(),
        url.to_string(),
    ]
}

/// Spawns `cmd` with stdout piped and waits until it yields its first bytes.
///
/// The returned stream replays that first chunk, then reads the rest of
/// stdout through a [`ChildContainer`], which kills and reaps the extractor
/// once playback drops it.
async fn spawn_and_bind(
    mut cmd: Command,
    bind_timeout: Duration,
) -> Result<ByteStream, StreamOpenError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    let Some(mut stdout) = child.stdout.take() else {
        reap(&mut child);
        return Err(StreamOpenError::EarlyExit("stdout was not captured".to_string()));
    };

    let first_read = tokio::task::spawn_blocking(move || {
        let mut buf = vec![0u8; BIND_CHUNK];
        let result = stdout.read(&mut buf).map(|n| {
            buf.truncate(n);
            buf
        });
        (stdout, result)
    });

    let (stdout, result) = match tokio::time::timeout(bind_timeout, first_read).await {
        Ok(Ok(pair)) => pair,
        Ok(Err(join_err)) => {
            reap(&mut child);
            return Err(StreamOpenError::EarlyExit(join_err.to_string()));
        }
        Err(_) => {
            warn!("⏱️ Extractor produced nothing within {:?}", bind_timeout);
            // killing closes stdout, which unblocks the pending read
            reap(&mut child);
            return Err(StreamOpenError::Timeout(bind_timeout));
        }
    };

    match result {
        Ok(prefix) if !prefix.is_empty() => {
            debug!("🔗 Extractor pid {} bound", child.id());
            child.stdout = Some(stdout);
            let container = ChildContainer::from(child);
            Ok(ByteStream::new(Cursor::new(prefix).chain(container)))
        }
        Ok(_) => {
            let status = child
                .wait()
                .map_err(|e| StreamOpenError::EarlyExit(e.to_string()))?;
            Err(StreamOpenError::EarlyExit(status.to_string()))
        }
        Err(e) => {
            reap(&mut child);
            Err(StreamOpenError::EarlyExit(e.to_string()))
        }
    }
}

/// Kills an extractor that never got handed to the player.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[test]
    fn extractor_streams_best_audio_to_stdout() {
        let args = stream_args("https://x/foo");
        assert!(args.windows(2).any(|w| w[0] == "-o" && w[1] == "-"));
        assert!(args.iter().any(|a| a.starts_with("bestaudio")));
        assert_eq!(args.last().map(String::as_str), Some("https://x/foo"));
    }

    #[tokio::test]
    async fn bound_stream_replays_first_chunk() {
        let mut stream = spawn_and_bind(sh("printf 'hello world'"), Duration::from_secs(5))
            .await
            .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello world");
    }

    #[tokio::test]
    async fn output_after_first_chunk_is_read_from_the_child() {
        let mut stream = spawn_and_bind(
            sh("printf head; sleep 0.2; printf tail"),
            Duration::from_secs(5),
        )
        .await
        .unwrap();
        let mut out = String::new();
        stream.read_to_string(&mut out).unwrap();
        assert_eq!(out, "headtail");
    }

    #[tokio::test]
    async fn silent_exit_is_an_early_exit() {
        let err = spawn_and_bind(sh("exit 3"), Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamOpenError::EarlyExit(_)));
    }

    #[tokio::test]
    async fn no_output_within_timeout_fails() {
        let err = spawn_and_bind(sh("sleep 2"), Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamOpenError::Timeout(_)));
    }

    #[tokio::test]
    async fn missing_binary_fails_to_spawn() {
        let adapter = YtDlpStreamAdapter::new("/nonexistent/yt-dlp", Duration::from_secs(1));
        let err = adapter
            .open(&PlayableItem::new("Foo", "https://x/foo"))
            .await
            .unwrap_err();
        assert!(matches!(err, StreamOpenError::Spawn(_)));
    }
}
