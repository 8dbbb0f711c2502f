//! Member join and leave handling: welcome messages and admin logs.

use std::collections::HashMap;

use serenity::builder::{CreateEmbed, CreateEmbedFooter, CreateMessage};
use serenity::http::Http;
use serenity::model::guild::Member;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use serenity::model::user::User;
use tracing::{debug, warn};
use uvocbot_db::{
    AdminSettingsRepository, DbResult, LogType, WelcomeMessage, WelcomeMessageRepository,
};

use super::{embeds, snowflake};
use crate::state::AppState;

const JOIN_LOG_COLOR: u32 = 0x2E_CC_71;
const LEAVE_LOG_COLOR: u32 = 0xE6_7E_22;

pub async fn on_member_join(state: &AppState, http: &Http, member: &Member) {
    let guild_id = member.guild_id.get();

    match WelcomeMessageRepository::get(state.pool(), guild_id).await {
        Ok(welcome) if welcome.is_sendable() => {
            if let Err(e) = welcome_member(http, &welcome, member).await {
                warn!(
                    "Failed to welcome {} in guild {}: {}",
                    member.user.id, guild_id, e
                );
            }
        }
        Ok(_) => {}
        Err(e) => warn!("Failed to load welcome message for guild {}: {}", guild_id, e),
    }

    let embed = log_embed(
        "Member joined",
        &member.user,
        JOIN_LOG_COLOR,
        Some(format!("Account created <t:{}:R>", member.user.id.created_at().unix_timestamp())),
    );
    post_admin_log(state, http, guild_id, LogType::MEMBER_JOIN, embed).await;
}

pub async fn on_member_leave(state: &AppState, http: &Http, guild_id: GuildId, user: &User) {
    let embed = log_embed("Member left", user, LEAVE_LOG_COLOR, None);
    post_admin_log(state, http, guild_id.get(), LogType::MEMBER_LEAVE, embed).await;
}

async fn welcome_member(
    http: &Http,
    welcome: &WelcomeMessage,
    member: &Member,
) -> serenity::Result<()> {
    let Some(channel) = welcome.channel_id.and_then(snowflake::<ChannelId>) else {
        warn!("Guild {} has no valid welcome channel", member.guild_id);
        return Ok(());
    };
    let user_id = member.user.id.get();

    for role_id in &welcome.default_role_ids {
        let Some(role) = snowflake::<RoleId>(*role_id) else {
            warn!("Skipping invalid welcome role id {}", role_id);
            continue;
        };
        if let Err(e) = http
            .add_member_role(
                member.guild_id,
                member.user.id,
                role,
                Some("Welcome default role"),
            )
            .await
        {
            warn!("Failed to give role {} to {}: {}", role_id, user_id, e);
        }
    }

    let role_names = if welcome.alternate_role_ids.is_empty() {
        HashMap::new()
    } else {
        member
            .guild_id
            .roles(http)
            .await?
            .into_iter()
            .map(|(id, role)| (id.get(), role.name))
            .collect()
    };

    let components = embeds::welcome_components(welcome, user_id, &role_names);
    let content = welcome_text(welcome, user_id, !components.is_empty());

    channel
        .send_message(http, CreateMessage::new().content(content).components(components))
        .await?;
    debug!("Welcomed {} in guild {}", user_id, member.guild_id);
    Ok(())
}

/// The rendered welcome, with the alternate role prompt appended when
/// buttons are offered.
pub(crate) fn welcome_text(welcome: &WelcomeMessage, user_id: u64, has_buttons: bool) -> String {
    let mut text = welcome.render(&format!("<@{}>", user_id));
    if has_buttons && !welcome.alternate_roles_label.trim().is_empty() {
        text.push_str("\n\n");
        text.push_str(welcome.alternate_roles_label.trim());
    }
    text
}

/// Roles to add and remove when a welcomed member picks an alternate role.
/// Returns `None` if the role is not offered.
pub(crate) fn alternate_role_swap(
    welcome: &WelcomeMessage,
    picked: u64,
) -> Option<(u64, Vec<u64>)> {
    if !welcome.alternate_role_ids.contains(&picked) {
        return None;
    }
    let remove = welcome
        .default_role_ids
        .iter()
        .copied()
        .filter(|id| *id != picked)
        .collect();
    Some((picked, remove))
}

fn log_embed(title: &str, user: &User, color: u32, extra: Option<String>) -> CreateEmbed {
    let mut description = format!("<@{}> ({})", user.id, user.name);
    if let Some(extra) = extra {
        description.push('\n');
        description.push_str(&extra);
    }
    CreateEmbed::new()
        .title(title)
        .description(description)
        .color(color)
        .footer(CreateEmbedFooter::new(format!("User id {}", user.id)))
}

async fn post_admin_log(
    state: &AppState,
    http: &Http,
    guild_id: u64,
    event: LogType,
    embed: CreateEmbed,
) {
    let channel = match admin_log_channel(state, guild_id, event).await {
        Ok(Some(channel_id)) => match snowflake::<ChannelId>(channel_id) {
            Some(channel) => channel,
            None => {
                warn!("Guild {} has an invalid admin log channel", guild_id);
                return;
            }
        },
        Ok(None) => return,
        Err(e) => {
            warn!("Failed to load admin settings for guild {}: {}", guild_id, e);
            return;
        }
    };

    if let Err(e) = channel
        .send_message(http, CreateMessage::new().embed(embed))
        .await
    {
        warn!("Failed to write admin log in guild {}: {}", guild_id, e);
    }
}

async fn admin_log_channel(state: &AppState, guild_id: u64, event: LogType) -> DbResult<Option<u64>> {
    let settings = AdminSettingsRepository::get(state.pool(), guild_id).await?;
    Ok(settings.channel_for(event))
}

/// Give `add` to the member and drop the welcome default roles.
/// Zero ids are skipped.
pub(crate) async fn apply_alternate_role(
    http: &Http,
    guild_id: GuildId,
    user_id: UserId,
    add: u64,
    remove: &[u64],
) -> serenity::Result<()> {
    if let Some(role) = snowflake::<RoleId>(add) {
        http.add_member_role(guild_id, user_id, role, Some("Welcome alternate role"))
            .await?;
    }
    for role in remove.iter().filter_map(|id| snowflake::<RoleId>(*id)) {
        http.remove_member_role(guild_id, user_id, role, Some("Welcome alternate role"))
            .await?;
    }
    Ok(())
}
