use std::sync::Arc;

use serenity::async_trait;
use serenity::model::application::{Command, Interaction};
use serenity::model::gateway::Ready;
use serenity::model::guild::Member;
use serenity::model::id::GuildId;
use serenity::model::user::User;
use serenity::prelude::*;
use tracing::{error, info};

use super::{commands, members};
use crate::state::AppState;

/// Discord event handler. Command and button handling lives in
/// `interactions.rs`, member events in `members.rs`.
pub struct Bot {
    pub(super) state: Arc<AppState>,
}

impl Bot {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl EventHandler for Bot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!(
            "Discord bot connected as {} in {} guild(s)",
            ready.user.name,
            ready.guilds.len()
        );

        match Command::set_global_commands(&ctx.http, commands::definitions()).await {
            Ok(registered) => info!("Registered {} slash commands", registered.len()),
            Err(e) => error!("Failed to register slash commands: {}", e),
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        self.handle_interaction(ctx, interaction).await;
    }

    async fn guild_member_addition(&self, ctx: Context, new_member: Member) {
        members::on_member_join(&self.state, &ctx.http, &new_member).await;
    }

    async fn guild_member_removal(
        &self,
        ctx: Context,
        guild_id: GuildId,
        user: User,
        _member_data_if_available: Option<Member>,
    ) {
        members::on_member_leave(&self.state, &ctx.http, guild_id, &user).await;
    }
}
