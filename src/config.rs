use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub command_prefix: String,

    // Audio
    pub default_volume: f32,
    pub max_queue_size: usize,
    pub stream_bind_timeout_secs: u64,
    pub ytdlp_path: String,

    // Liveness endpoint, 0 disables it
    pub http_port: u16,
}

impl Config {
    /// Loads configuration from the environment, reading `.env` first if present.
    ///
    /// `DISCORD_TOKEN` is the only required variable. Everything else falls back
    /// to [`Config::default`].
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        let config = Self {
            discord_token: std::env::var("DISCORD_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty())
                .context("DISCORD_TOKEN is not set")?,
            command_prefix: std::env::var("COMMAND_PREFIX")
                .unwrap_or(defaults.command_prefix),

            default_volume: env_or("DEFAULT_VOLUME", defaults.default_volume)?,
            max_queue_size: env_or("MAX_QUEUE_SIZE", defaults.max_queue_size)?,
            stream_bind_timeout_secs: env_or(
                "STREAM_BIND_TIMEOUT_SECS",
                defaults.stream_bind_timeout_secs,
            )?,
            ytdlp_path: std::env::var("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),

            http_port: env_or("PORT", defaults.http_port)?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Sanity checks on values that would otherwise break sessions at runtime.
    ///
    /// - Volume must be between 0.0 and 1.0
    /// - Queue size and bind timeout must be greater than 0
    /// - Command prefix must not be blank
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.default_volume) {
            anyhow::bail!(
                "Default volume must be between 0.0 and 1.0, got: {}",
                self.default_volume
            );
        }

        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.stream_bind_timeout_secs == 0 {
            anyhow::bail!("Stream bind timeout must be greater than 0");
        }

        if self.command_prefix.trim().is_empty() {
            anyhow::bail!("Command prefix must not be empty");
        }

        Ok(())
    }

    pub fn stream_bind_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_bind_timeout_secs)
    }

    /// Summary of the loaded configuration without the token.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Commands: prefix '{}'\n  \
            Audio: {}% vol, {} max queue, {}s bind timeout, extractor '{}'\n  \
            Liveness: {}",
            self.command_prefix,
            (self.default_volume * 100.0).round() as u32,
            self.max_queue_size,
            self.stream_bind_timeout_secs,
            self.ytdlp_path,
            if self.http_port == 0 {
                "disabled".to_string()
            } else {
                format!("port {}", self.http_port)
            },
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            discord_token: String::new(),
            command_prefix: "!".to_string(),

            default_volume: 0.5,
            max_queue_size: 100,
            stream_bind_timeout_secs: 15,
            ytdlp_path: "yt-dlp".to_string(),

            http_port: 3000,
        }
    }
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(val) if !val.trim().is_empty() => val
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {key}: {val}")),
        _ => Ok(default),
    }
}
