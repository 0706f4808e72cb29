use async_process::Command;
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use super::{classify_query, PlayableItem, QueryKind, Resolver};
use crate::error::ResolutionError;

/// Resolver backed by `yt-dlp` search.
pub struct YtDlpResolver {
    binary: String,
    // Limit concurrent searches to avoid upstream rate limiting
    rate_limiter: Semaphore,
}

/// Fields read from `yt-dlp --dump-json --flat-playlist` search entries.
#[derive(Debug, Deserialize)]
struct SearchEntry {
    id: Option<String>,
    title: Option<String>,
    url: Option<String>,
    webpage_url: Option<String>,
}

impl SearchEntry {
    fn into_item(self) -> Option<PlayableItem> {
        let url = self
            .webpage_url
            .or(self.url)
            .or_else(|| self.id.map(|id| format!("https://www.youtube.com/watch?v={id}")))?;
        let title = self.title.unwrap_or_else(|| url.clone());
        Some(PlayableItem::new(title, url))
    }
}

impl YtDlpResolver {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
            rate_limiter: Semaphore::new(3),
        }
    }

    /// Runs a one-result search and returns the top hit.
    async fn search_top(&self, query: &str) -> Result<PlayableItem, ResolutionError> {
        let _permit = self
            .rate_limiter
            .acquire()
            .await
            .map_err(|e| ResolutionError::Provider(e.to_string()))?;

        info!("🔍 Searching: {}", query);

        let output = Command::new(&self.binary)
            .args(search_args(query))
            .output()
            .await
            .map_err(|e| ResolutionError::Provider(format!("failed to run yt-dlp: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("yt-dlp search failed: {}", stderr.trim());
            return Err(ResolutionError::Provider(stderr.trim().to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        first_result(&stdout).ok_or_else(|| ResolutionError::NoResults(query.to_string()))
    }
}

#[async_trait]
impl Resolver for YtDlpResolver {
    async fn resolve(&self, query: &str) -> Result<PlayableItem, ResolutionError> {
        match classify_query(query)? {
            QueryKind::Url(url) => {
                debug!("🔗 Direct URL, skipping search: {}", url);
                Ok(PlayableItem::new(query.trim(), url.as_str()))
            }
            QueryKind::Search(text) if text.is_empty() => Err(ResolutionError::NoResults(text)),
            QueryKind::Search(text) => self.search_top(&text).await,
        }
    }
}

fn search_args(query: &str) -> Vec<String> {
    vec![
        "--no-playlist".to_string(),
        "--dump-json".to_string(),
        "--flat-playlist".to_string(),
        "--skip-download".to_string(),
        "--no-warnings".to_string(),
        format!("ytsearch1:{query}"),
    ]
}

/// First parseable entry of newline-delimited yt-dlp JSON output.
fn first_result(stdout: &str) -> Option<PlayableItem> {
    stdout
        .lines()
        .filter_map(|line| serde_json::from_str::<SearchEntry>(line).ok())
        .find_map(SearchEntry::into_item)
}
