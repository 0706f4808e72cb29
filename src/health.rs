//! Liveness endpoint and startup dependency probe.

use anyhow::{bail, Context, Result};
use axum::{routing::get, Router};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

pub fn router() -> Router {
    Router::new().route("/", get(|| async { "running" }))
}

/// Serves the liveness endpoint until the listener fails.
pub async fn serve(port: u16) -> Result<()> {
    let address = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("binding liveness endpoint on {address}"))?;
    info!("💓 Liveness endpoint listening on {}", address);
    axum::serve(listener, router()).await?;
    Ok(())
}

/// Checks that the extraction binary runs. Returns its version string.
pub async fn check_dependencies(ytdlp_path: &str) -> Result<String> {
    let output = async_process::Command::new(ytdlp_path)
        .arg("--version")
        .output()
        .await
        .with_context(|| format!("running {ytdlp_path}"))?;

    if !output.status.success() {
        bail!("{} --version exited with {}", ytdlp_path, output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn root_reports_running() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router()).await });

        let mut stream = tokio::net::TcpStream::connect(address).await.unwrap();
        stream
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"), "{response}");
        assert!(response.ends_with("running"), "{response}");
    }

    #[tokio::test]
    async fn missing_extractor_fails_the_probe() {
        let result = check_dependencies("/nonexistent/yt-dlp-binary").await;
        assert!(result.is_err());
    }
}
