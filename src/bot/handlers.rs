use serenity::model::id::{ChannelId, GuildId};
use tracing::info;

use crate::{
    audio::manager::{PlayOutcome, PlayRequest, PlaybackManager},
    bot::commands::{self, Command},
    error::{CommandError, PreconditionError},
};

/// Where a command came from, as read off the gateway message.
#[derive(Debug, Clone, Copy)]
pub struct Invocation {
    pub guild_id: Option<GuildId>,
    pub text_channel: ChannelId,
    /// Voice channel the author is in, if any.
    pub voice_channel: Option<ChannelId>,
}

/// Runs a command and returns the reply text. Every error becomes a reply.
pub async fn handle_command(
    manager: &PlaybackManager,
    invocation: Invocation,
    command: Command,
    prefix: &str,
) -> String {
    match execute(manager, invocation, command, prefix).await {
        Ok(reply) => reply,
        Err(e) => {
            info!("↩️ Command rejected: {}", e);
            e.reply()
        }
    }
}

async fn execute(
    manager: &PlaybackManager,
    invocation: Invocation,
    command: Command,
    prefix: &str,
) -> Result<String, CommandError> {
    if command == Command::Help {
        return Ok(commands::help_text(prefix));
    }

    let guild_id = invocation.guild_id.ok_or(PreconditionError::NotInGuild)?;

    match command {
        Command::Play(query) => {
            if query.trim().is_empty() {
                return Err(PreconditionError::EmptyQuery.into());
            }
            let voice_channel = invocation
                .voice_channel
                .ok_or(PreconditionError::NotInVoiceChannel)?;

            let outcome = manager
                .play(PlayRequest {
                    guild_id,
                    voice_channel,
                    text_channel: invocation.text_channel,
                    query,
                })
                .await?;

            Ok(match outcome {
                PlayOutcome::Started(item) => format!("▶️ Now playing: **{}**", item.title()),
                PlayOutcome::Queued { item, position } => {
                    format!("✅ Added to queue (#{}): **{}**", position, item.title())
                }
            })
        }
        Command::Pause => {
            manager.pause(guild_id).await?;
            Ok("⏸️ Paused.".to_string())
        }
        Command::Resume => {
            manager.resume(guild_id).await?;
            Ok("▶️ Resumed.".to_string())
        }
        Command::Skip => {
            let skipped = manager.skip(guild_id).await?;
            Ok(format!("⏭️ Skipped **{}**.", skipped.title()))
        }
        Command::Stop => {
            manager.stop(guild_id).await?;
            Ok("⏹️ Stopped and left the voice channel.".to_string())
        }
        Command::Queue => {
            let snapshot = manager.queue(guild_id).await?;
            Ok(commands::format_queue(&snapshot))
        }
        Command::Volume(arg) if arg.trim().is_empty() => {
            let volume = manager.volume(guild_id).await?;
            Ok(format!("🔊 Volume is {}%.", (volume * 100.0).round() as u32))
        }
        Command::Volume(arg) => {
            let percent = commands::parse_volume(&arg)?;
            manager.set_volume(guild_id, percent).await?;
            Ok(format!("🔊 Volume set to {}%.", percent))
        }
        Command::Help => Ok(commands::help_text(prefix)),
    }
}
