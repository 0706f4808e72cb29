//! # Bot Module
//!
//! Discord gateway glue for the jukebox.
//!
//! [`JukeboxBot`] implements Serenity's [`EventHandler`]. It turns prefixed
//! chat messages into [`commands::Command`]s, runs them through
//! [`handlers::handle_command`] and replies in the same channel. Voice state
//! updates for the bot itself close the guild's session when someone else
//! disconnects it.
//!
//! The songbird and HTTP implementations of the audio seams live in [`voice`].

use serenity::{
    all::{Context, EventHandler, Message, Ready, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info};

pub mod commands;
pub mod handlers;
pub mod voice;

use crate::{audio::manager::PlaybackManager, config::Config};
use handlers::Invocation;

pub struct JukeboxBot {
    config: Arc<Config>,
    manager: Arc<PlaybackManager>,
}

impl JukeboxBot {
    pub fn new(config: Arc<Config>, manager: Arc<PlaybackManager>) -> Self {
        Self { config, manager }
    }

    /// Voice channel the author is currently in, from the gateway cache.
    fn author_voice_channel(ctx: &Context, msg: &Message) -> Option<serenity::all::ChannelId> {
        let guild = ctx.cache.guild(msg.guild_id?)?;
        guild
            .voice_states
            .get(&msg.author.id)
            .and_then(|state| state.channel_id)
    }
}

#[async_trait]
impl EventHandler for JukeboxBot {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🤖 {} is online!", ready.user.name);
        info!("📊 Connected to {} servers", ready.guilds.len());
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // replying to other bots risks reply loops
        if msg.author.bot {
            return;
        }
        let Some(command) = commands::parse(&msg.content, &self.config.command_prefix) else {
            return;
        };

        debug!("📝 {:?} from {} in {:?}", command, msg.author.name, msg.guild_id);

        let invocation = Invocation {
            guild_id: msg.guild_id,
            text_channel: msg.channel_id,
            voice_channel: Self::author_voice_channel(&ctx, &msg),
        };
        let reply = handlers::handle_command(
            &self.manager,
            invocation,
            command,
            &self.config.command_prefix,
        )
        .await;

        if let Err(e) = msg.reply(&ctx.http, reply).await {
            error!("Failed to reply in channel {}: {:?}", msg.channel_id, e);
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        if new.user_id != ctx.cache.current_user().id {
            return;
        }
        if old.is_some() && new.channel_id.is_none() {
            if let Some(guild_id) = new.guild_id {
                info!("🔌 Bot disconnected from voice in guild {}", guild_id);
                self.manager.handle_voice_disconnect(guild_id).await;
            }
        }
    }
}
