pub mod youtube;

use async_trait::async_trait;
use url::Url;

use crate::error::ResolutionError;

pub use youtube::YtDlpResolver;

/// A resolved song: what gets queued, listed and streamed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableItem {
    title: String,
    source_url: String,
}

impl PlayableItem {
    pub fn new(title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            source_url: source_url.into(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }
}

/// Turns a free-text query or a URL into a [`PlayableItem`].
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, query: &str) -> Result<PlayableItem, ResolutionError>;
}

/// How a `play` query should be handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryKind {
    /// Absolute http(s) URL, played as-is.
    Url(Url),
    /// Anything else goes through search.
    Search(String),
}

/// Classifies a query. Anything containing a scheme separator is held to URL
/// rules so that `ftp://...` or a broken link is rejected instead of searched.
pub fn classify_query(query: &str) -> Result<QueryKind, ResolutionError> {
    let query = query.trim();

    if !query.contains("://") {
        return Ok(QueryKind::Search(query.to_string()));
    }

    let url = Url::parse(query).map_err(|_| ResolutionError::InvalidUrl(query.to_string()))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(QueryKind::Url(url)),
        _ => Err(ResolutionError::InvalidUrl(query.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn plain_text_is_a_search() {
        assert_eq!(
            classify_query("  never gonna give you up ").unwrap(),
            QueryKind::Search("never gonna give you up".to_string())
        );
        // a colon alone does not make a URL
        assert_eq!(
            classify_query("artist: song").unwrap(),
            QueryKind::Search("artist: song".to_string())
        );
    }

    #[test]
    fn http_urls_are_used_directly() {
        let kind = classify_query("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        assert!(matches!(kind, QueryKind::Url(url) if url.host_str() == Some("www.youtube.com")));
    }

    #[test]
    fn unsupported_or_malformed_urls_are_rejected() {
        for query in ["ftp://files.example.com/song.mp3", "https://", "file:///etc/passwd"] {
            assert!(
                matches!(classify_query(query), Err(ResolutionError::InvalidUrl(_))),
                "{query} should be rejected"
            );
        }
    }
}
